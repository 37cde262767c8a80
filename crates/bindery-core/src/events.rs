//! # Subscriptions
//!
//! Who listens to which change notifications.
//!
//! Bindings do not register callbacks on the graphs. They are entered in
//! this registry under typed topics, and the exchange looks subscribers up
//! when it dispatches an event. Removing a binding's entries
//! ([`SubscriptionRegistry::unsubscribe_all`]) is part of its teardown, so no
//! notification can reach a disposed binding.

use crate::{BindingId, EntityId, GeometricReference, ModelId};
use std::collections::{BTreeMap, BTreeSet};

/// A category of notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Topic {
    /// The component is being deleted.
    EntityDeleting(EntityId),
    /// Attribute, topology or removal changes of one primitive.
    Geometry(GeometricReference),
    /// Name changes of one primitive.
    GeometryRenamed(GeometricReference),
    /// Every notification of a model, including its replacement.
    Model(ModelId),
}

/// A party that receives notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Subscriber {
    Descriptive(BindingId),
    /// The network mirror managing this model.
    Mirror(ModelId),
}

#[derive(Debug, Clone, Default)]
pub struct SubscriptionRegistry {
    topics: BTreeMap<Topic, BTreeSet<Subscriber>>,
}

impl SubscriptionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe; returns `false` if already subscribed.
    pub fn subscribe(&mut self, topic: Topic, subscriber: Subscriber) -> bool {
        self.topics.entry(topic).or_default().insert(subscriber)
    }

    /// Unsubscribe from one topic; returns whether it was subscribed.
    pub fn unsubscribe(&mut self, topic: Topic, subscriber: Subscriber) -> bool {
        let Some(subscribers) = self.topics.get_mut(&topic) else {
            return false;
        };
        let removed = subscribers.remove(&subscriber);
        if subscribers.is_empty() {
            self.topics.remove(&topic);
        }
        removed
    }

    /// Remove every subscription of `subscriber`. Returns how many there were.
    pub fn unsubscribe_all(&mut self, subscriber: Subscriber) -> usize {
        let mut removed = 0;
        self.topics.retain(|_, subscribers| {
            if subscribers.remove(&subscriber) {
                removed += 1;
            }
            !subscribers.is_empty()
        });
        removed
    }

    /// Subscribers of `topic`, in order.
    #[must_use]
    pub fn subscribers(&self, topic: Topic) -> Vec<Subscriber> {
        self.topics
            .get(&topic)
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn is_subscribed(&self, topic: Topic, subscriber: Subscriber) -> bool {
        self.topics
            .get(&topic)
            .is_some_and(|s| s.contains(&subscriber))
    }

    /// Topics `subscriber` is registered for.
    #[must_use]
    pub fn topics_of(&self, subscriber: Subscriber) -> Vec<Topic> {
        self.topics
            .iter()
            .filter(|(_, subscribers)| subscribers.contains(&subscriber))
            .map(|(topic, _)| *topic)
            .collect()
    }

    /// Total number of (topic, subscriber) entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.topics.values().map(BTreeSet::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }
}
