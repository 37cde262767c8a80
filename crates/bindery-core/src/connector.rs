//! # Binding Base
//!
//! State shared by every binding between a semantic entity and a geometric
//! primitive: the two endpoints, whether the target is available, and how
//! fresh the synchronization is.
//!
//! Bindings never hold references into the graphs. Every operation receives
//! a [`SyncContext`] that lends them the collaborators for the duration of
//! the call.

use crate::config::ExchangeConfig;
use crate::deferred::Scheduler;
use crate::geometry::{GeometryModel, Primitive};
use crate::measure::Measurements;
use crate::proxy::AssetImporter;
use crate::semantic::SemanticGraph;
use crate::warnings::WarningSink;
use crate::{BinderyError, EntityId, GeometricReference};
use serde::{Deserialize, Serialize};

// =============================================================================
// STATES
// =============================================================================

/// Whether the target primitive exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TargetAvailability {
    #[default]
    Available,
    TargetMissing,
}

/// Freshness of a binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SynchronizationState {
    #[default]
    Unknown,
    Synchronized,
    /// The source no longer matches the target (e.g. inadmissible).
    SourceStale,
    /// The target could not be brought up to date.
    TargetStale,
    SourceDeleting,
    TargetDeleting,
}

/// Deletion notice raised by a binding for its owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    SourceDeleting(EntityId),
    TargetDeleting(GeometricReference),
}

// =============================================================================
// CONNECTOR
// =============================================================================

/// One association between a semantic entity and a geometric primitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connector {
    source: Option<EntityId>,
    target: GeometricReference,
    availability: TargetAvailability,
    state: SynchronizationState,
}

impl Connector {
    #[must_use]
    pub fn new(source: Option<EntityId>, target: GeometricReference) -> Self {
        Self {
            source,
            target,
            availability: TargetAvailability::Available,
            state: SynchronizationState::Unknown,
        }
    }

    #[must_use]
    pub fn source(&self) -> Option<EntityId> {
        self.source
    }

    pub fn set_source(&mut self, source: Option<EntityId>) {
        self.source = source;
    }

    #[must_use]
    pub fn target(&self) -> GeometricReference {
        self.target
    }

    /// Point the binding at another primitive. Its state becomes unknown.
    pub fn retarget(&mut self, target: GeometricReference) {
        if self.target != target {
            self.target = target;
            self.state = SynchronizationState::Unknown;
        }
    }

    #[must_use]
    pub fn availability(&self) -> TargetAvailability {
        self.availability
    }

    #[must_use]
    pub fn state(&self) -> SynchronizationState {
        self.state
    }

    pub fn set_state(&mut self, state: SynchronizationState) {
        self.state = state;
    }

    pub fn set_availability(&mut self, availability: TargetAvailability) {
        self.availability = availability;
    }

    /// Default synchronization: the binding is up to date when its target
    /// exists. Bindings that do structural work run it before calling this.
    pub fn synchronize_source_with_target(&mut self, primitive: Option<&Primitive>) {
        match primitive {
            Some(_) => {
                self.availability = TargetAvailability::Available;
                self.state = SynchronizationState::Synchronized;
            }
            None => {
                self.availability = TargetAvailability::TargetMissing;
                self.state = SynchronizationState::TargetStale;
            }
        }
    }

    pub fn on_source_deleting(&mut self) -> Option<LifecycleEvent> {
        self.state = SynchronizationState::SourceDeleting;
        self.source.map(LifecycleEvent::SourceDeleting)
    }

    pub fn on_target_deleting(&mut self) -> LifecycleEvent {
        self.state = SynchronizationState::TargetDeleting;
        self.availability = TargetAvailability::TargetMissing;
        LifecycleEvent::TargetDeleting(self.target)
    }

    #[must_use]
    pub fn is_deleting(&self) -> bool {
        matches!(
            self.state,
            SynchronizationState::SourceDeleting | SynchronizationState::TargetDeleting
        )
    }
}

// =============================================================================
// SYNC CONTEXT
// =============================================================================

/// Collaborators lent to a binding for one operation.
pub struct SyncContext<'a> {
    pub semantic: &'a mut SemanticGraph,
    pub model: &'a mut GeometryModel,
    pub measurements: &'a dyn Measurements,
    pub importer: &'a dyn AssetImporter,
    pub config: &'a ExchangeConfig,
    pub scheduler: &'a mut dyn Scheduler,
    pub warnings: &'a mut dyn WarningSink,
}

impl SyncContext<'_> {
    /// Run `f` inside one batch of the geometric model.
    ///
    /// The batch is released whether `f` succeeds or fails.
    pub fn batched<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, BinderyError>,
    ) -> Result<T, BinderyError> {
        self.model.start_batch_operation();
        let result = f(self);
        let released = self.model.end_batch_operation();
        let value = result?;
        released?;
        Ok(value)
    }
}

// =============================================================================
// TESTS
// =============================================================================
