//! # Deferred Updates
//!
//! Debounced recomputation of derived parameters.
//!
//! A single geometric edit usually raises several change notifications in a
//! row. In asynchronous mode a binding only records the latest primitive and
//! (re)starts a single-shot timer; the update runs once, when no request has
//! arrived for the configured delay. In synchronous mode the scheduler is
//! bypassed and the update runs inline.

use crate::{BindingId, GeometryId};
use std::collections::BTreeMap;
use std::time::Duration;

// =============================================================================
// SCHEDULER
// =============================================================================

/// Single-shot, coalescing timer service keyed by binding.
pub trait Scheduler {
    /// Start the timer for `key`, replacing any pending one.
    fn schedule(&mut self, key: BindingId, delay: Duration);

    /// Stop the timer for `key`. Returns whether one was pending.
    fn cancel(&mut self, key: BindingId) -> bool;

    /// Whether a timer for `key` is pending.
    fn is_pending(&self, key: BindingId) -> bool;
}

/// A scheduler driven by an explicit virtual clock.
///
/// Nothing fires on its own; the owner calls [`ManualScheduler::advance`]
/// and receives the keys whose deadline passed.
#[derive(Debug, Clone, Default)]
pub struct ManualScheduler {
    now: Duration,
    deadlines: BTreeMap<BindingId, Duration>,
}

impl ManualScheduler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current virtual time.
    #[must_use]
    pub fn now(&self) -> Duration {
        self.now
    }

    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.deadlines.len()
    }

    /// Move the clock forward and return the due keys in deadline order.
    pub fn advance(&mut self, by: Duration) -> Vec<BindingId> {
        self.now = self.now.saturating_add(by);
        let now = self.now;
        let mut due: Vec<(Duration, BindingId)> = self
            .deadlines
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(key, deadline)| (*deadline, *key))
            .collect();
        due.sort();
        for (_, key) in &due {
            self.deadlines.remove(key);
        }
        due.into_iter().map(|(_, key)| key).collect()
    }

    /// Jump to the latest deadline and return every pending key.
    pub fn fire_all(&mut self) -> Vec<BindingId> {
        let latest = self.deadlines.values().max().copied().unwrap_or(self.now);
        let by = latest.saturating_sub(self.now);
        self.advance(by)
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&mut self, key: BindingId, delay: Duration) {
        self.deadlines.insert(key, self.now.saturating_add(delay));
    }

    fn cancel(&mut self, key: BindingId) -> bool {
        self.deadlines.remove(&key).is_some()
    }

    fn is_pending(&self, key: BindingId) -> bool {
        self.deadlines.contains_key(&key)
    }
}

// =============================================================================
// DEFERRED UPDATE
// =============================================================================

/// How parameter updates are delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateMode {
    pub asynchronous: bool,
    pub delay: Duration,
}

/// Per-binding debounce state: the latest primitive awaiting an update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeferredUpdate {
    pending: Option<GeometryId>,
}

impl DeferredUpdate {
    /// Request an update for `primitive`.
    ///
    /// Returns the primitive to update now (synchronous mode), or `None`
    /// after storing it and restarting the timer (asynchronous mode).
    pub fn request(
        &mut self,
        key: BindingId,
        primitive: GeometryId,
        mode: UpdateMode,
        scheduler: &mut dyn Scheduler,
    ) -> Option<GeometryId> {
        if mode.asynchronous {
            self.pending = Some(primitive);
            scheduler.schedule(key, mode.delay);
            None
        } else {
            self.pending = None;
            Some(primitive)
        }
    }

    /// Take the pending primitive once its timer fired.
    pub fn take_due(&mut self) -> Option<GeometryId> {
        self.pending.take()
    }

    #[must_use]
    pub fn pending(&self) -> Option<GeometryId> {
        self.pending
    }

    /// Drop the pending request and stop its timer.
    pub fn cancel(&mut self, key: BindingId, scheduler: &mut dyn Scheduler) {
        self.pending = None;
        scheduler.cancel(key);
    }
}

// =============================================================================
// TESTS
// =============================================================================
