//! # Exchange
//!
//! The orchestrator. Owns the semantic graph, the geometric models, the
//! flow-network mirrors, the descriptive bindings and every collaborator they
//! need, and routes change notifications between them.
//!
//! ## Event flow
//!
//! Graphs never call bindings. Each graph queues notifications in its
//! outbox; [`Exchange::pump`] drains every outbox, looks the subscribers up
//! in the [`SubscriptionRegistry`] and dispatches. Handlers may write to the
//! graphs again, so the pump repeats until all outboxes stay empty or the
//! configured round budget is exhausted.

use crate::admissibility::{ConnectionState, ExistingBinding, check_duplicates, evaluate};
use crate::config::ExchangeConfig;
use crate::connector::SyncContext;
use crate::deferred::ManualScheduler;
use crate::descriptive::{DescriptiveBinding, DescriptiveKind, placed_primitive};
use crate::events::{Subscriber, SubscriptionRegistry, Topic};
use crate::geometry::{GeometryEvent, GeometryEventKind, GeometryModel};
use crate::measure::{Measurements, PlanarMeasurements};
use crate::mirror::NetworkMirror;
use crate::network::{NetworkEvent, NetworkGraph};
use crate::proxy::{AssetImporter, FsAssetImporter};
use crate::semantic::{SemanticEvent, SemanticGraph};
use crate::warnings::WarningLog;
use crate::{BinderyError, BindingId, EntityId, GeometricReference, ModelId};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;
use tracing::{debug, info};

// =============================================================================
// WORKSPACE
// =============================================================================

/// Graphs and collaborators lent to bindings through a [`SyncContext`].
struct Workspace {
    config: ExchangeConfig,
    semantic: SemanticGraph,
    models: BTreeMap<ModelId, GeometryModel>,
    scheduler: ManualScheduler,
    warnings: WarningLog,
    measurements: Box<dyn Measurements>,
    importer: Box<dyn AssetImporter>,
}

impl Workspace {
    fn context(&mut self, model: ModelId) -> Result<SyncContext<'_>, BinderyError> {
        let geometry = self
            .models
            .get_mut(&model)
            .ok_or(BinderyError::ModelNotFound(model))?;
        Ok(SyncContext {
            semantic: &mut self.semantic,
            model: geometry,
            measurements: self.measurements.as_ref(),
            importer: self.importer.as_ref(),
            config: &self.config,
            scheduler: &mut self.scheduler,
            warnings: &mut self.warnings,
        })
    }
}

/// Why a descriptive binding is being torn down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Teardown {
    SourceDeleted,
    TargetDeleted,
    Disconnected,
}

// =============================================================================
// EXCHANGE
// =============================================================================

/// Keeps a semantic graph, its geometric models and their flow networks
/// consistent.
pub struct Exchange {
    workspace: Workspace,
    mirrors: BTreeMap<ModelId, NetworkMirror>,
    bindings: BTreeMap<BindingId, DescriptiveBinding>,
    subscriptions: SubscriptionRegistry,
    next_binding: u64,
}

impl Exchange {
    /// Create an exchange with the filesystem importer and planar
    /// measurements.
    pub fn new(config: ExchangeConfig) -> Result<Self, BinderyError> {
        let importer = FsAssetImporter::new(
            config.asset_root.clone(),
            &config.recognized_asset_extensions,
        );
        Self::with_collaborators(config, Box::new(PlanarMeasurements), Box::new(importer))
    }

    /// Create an exchange with custom measurement and import services.
    pub fn with_collaborators(
        config: ExchangeConfig,
        measurements: Box<dyn Measurements>,
        importer: Box<dyn AssetImporter>,
    ) -> Result<Self, BinderyError> {
        config.validate()?;
        Ok(Self {
            workspace: Workspace {
                config,
                semantic: SemanticGraph::new(),
                models: BTreeMap::new(),
                scheduler: ManualScheduler::new(),
                warnings: WarningLog::new(),
                measurements,
                importer,
            },
            mirrors: BTreeMap::new(),
            bindings: BTreeMap::new(),
            subscriptions: SubscriptionRegistry::new(),
            next_binding: 1,
        })
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    #[must_use]
    pub fn config(&self) -> &ExchangeConfig {
        &self.workspace.config
    }

    #[must_use]
    pub fn semantic(&self) -> &SemanticGraph {
        &self.workspace.semantic
    }

    /// Edit the semantic graph. Notifications are dispatched on the next
    /// [`Self::pump`].
    pub fn semantic_mut(&mut self) -> &mut SemanticGraph {
        &mut self.workspace.semantic
    }

    #[must_use]
    pub fn model(&self, id: ModelId) -> Option<&GeometryModel> {
        self.workspace.models.get(&id)
    }

    /// Edit a geometric model. Notifications are dispatched on the next
    /// [`Self::pump`].
    pub fn model_mut(&mut self, id: ModelId) -> Result<&mut GeometryModel, BinderyError> {
        self.workspace
            .models
            .get_mut(&id)
            .ok_or(BinderyError::ModelNotFound(id))
    }

    pub fn models(&self) -> impl Iterator<Item = &GeometryModel> {
        self.workspace.models.values()
    }

    #[must_use]
    pub fn mirror(&self, model: ModelId) -> Option<&NetworkMirror> {
        self.mirrors.get(&model)
    }

    pub fn mirrors(&self) -> impl Iterator<Item = &NetworkMirror> {
        self.mirrors.values()
    }

    /// Edit the network mirrored into `model`. Notifications are dispatched
    /// on the next [`Self::pump`].
    pub fn network_mut(&mut self, model: ModelId) -> Result<&mut NetworkGraph, BinderyError> {
        self.mirrors
            .get_mut(&model)
            .map(NetworkMirror::network_mut)
            .ok_or(BinderyError::ModelNotFound(model))
    }

    #[must_use]
    pub fn binding(&self, id: BindingId) -> Option<&DescriptiveBinding> {
        self.bindings.get(&id)
    }

    pub fn bindings(&self) -> impl Iterator<Item = &DescriptiveBinding> {
        self.bindings.values()
    }

    /// The descriptive binding whose source is `entity`.
    #[must_use]
    pub fn binding_of(&self, entity: EntityId) -> Option<BindingId> {
        self.bindings
            .values()
            .find(|binding| binding.source() == Some(entity))
            .map(DescriptiveBinding::id)
    }

    #[must_use]
    pub fn subscriptions(&self) -> &SubscriptionRegistry {
        &self.subscriptions
    }

    #[must_use]
    pub fn scheduler(&self) -> &ManualScheduler {
        &self.workspace.scheduler
    }

    /// Warnings reported since the last [`Self::take_warnings`].
    #[must_use]
    pub fn warnings(&self) -> &[String] {
        self.workspace.warnings.messages()
    }

    pub fn take_warnings(&mut self) -> Vec<String> {
        self.workspace.warnings.take()
    }

    // =========================================================================
    // MODELS
    // =========================================================================

    /// Register a geometric model. Its construction history is discarded.
    pub fn add_model(&mut self, mut model: GeometryModel) -> Result<(), BinderyError> {
        let id = model.id();
        if self.workspace.models.contains_key(&id) {
            return Err(BinderyError::InvalidTopology(format!(
                "{id} is already registered"
            )));
        }
        model.take_events();
        self.workspace.models.insert(id, model);
        debug!(model = %id, "model added");
        Ok(())
    }

    /// Swap `old` for a reloaded model. Mirrors and bindings follow it.
    pub fn replace_model(
        &mut self,
        old: ModelId,
        mut model: GeometryModel,
    ) -> Result<(), BinderyError> {
        if !self.workspace.models.contains_key(&old) {
            return Err(BinderyError::ModelNotFound(old));
        }
        let new = model.id();
        if new != old && self.workspace.models.contains_key(&new) {
            return Err(BinderyError::InvalidTopology(format!(
                "{new} is already registered"
            )));
        }
        self.workspace.models.remove(&old);
        model.take_events();
        model.notify_replaced(old);
        self.workspace.models.insert(new, model);
        info!(old = %old, new = %new, "model replaced");
        self.pump()?;
        Ok(())
    }

    // =========================================================================
    // DESCRIPTIVE BINDINGS
    // =========================================================================

    /// Evaluate a binding of `entity` to `reference` without creating it.
    pub fn check(
        &self,
        entity: EntityId,
        reference: GeometricReference,
    ) -> Result<ConnectionState, BinderyError> {
        self.assess(entity, reference).map(|(state, _)| state)
    }

    fn assess(
        &self,
        entity: EntityId,
        reference: GeometricReference,
    ) -> Result<(ConnectionState, Option<DescriptiveKind>), BinderyError> {
        let model = self
            .workspace
            .models
            .get(&reference.model)
            .ok_or(BinderyError::ModelNotFound(reference.model))?;
        let semantic = &self.workspace.semantic;
        let component = semantic
            .component(entity)
            .filter(|_| !semantic.is_deleting(entity));
        let primitive = model.geometry_from_id(reference.geometry);
        let parent = component.and_then(|_| semantic.parent_of(entity));
        let parent_primitive = parent.and_then(|p| placed_primitive(p, model));

        let mut state = evaluate(parent, parent_primitive, component, primitive);
        state |= check_duplicates(entity, reference, &self.existing_bindings());
        let kind = match (component, primitive) {
            (Some(component), Some(primitive)) => {
                DescriptiveKind::for_target(component.instance_type, primitive.kind())
            }
            _ => None,
        };
        if component.is_some() && primitive.is_some() && kind.is_none() {
            state |= ConnectionState::KIND_MISMATCH;
        }
        Ok((state, kind))
    }

    /// Evaluate a binding of `entity` to `reference` and create it when it is
    /// admissible.
    ///
    /// The returned state lists every problem found. Connecting a pair that
    /// is already bound creates nothing and reports the current state.
    pub fn connect(
        &mut self,
        entity: EntityId,
        reference: GeometricReference,
    ) -> Result<ConnectionState, BinderyError> {
        let (state, kind) = self.assess(entity, reference)?;

        if self
            .bindings
            .values()
            .any(|b| b.source() == Some(entity) && b.target() == reference)
        {
            return Ok(state);
        }
        let Some(kind) = kind.filter(|_| state.is_admissible()) else {
            debug!(
                entity = %entity,
                target = %reference,
                flags = ?state.describe(),
                "binding rejected"
            );
            return Ok(state);
        };

        let id = BindingId(self.next_binding);
        self.next_binding = self.next_binding.saturating_add(1);
        let mut binding = DescriptiveBinding::new(id, kind, entity, reference);
        binding.subscribe(&mut self.subscriptions);
        let synchronized = self
            .workspace
            .context(reference.model)
            .and_then(|mut cx| binding.synchronize_source_with_target(&mut cx));
        if let Err(error) = synchronized {
            binding.unsubscribe(&mut self.subscriptions);
            return Err(error);
        }
        self.bindings.insert(id, binding);
        info!(binding = id.0, entity = %entity, target = %reference, ?kind, "binding created");
        self.pump()?;
        Ok(state)
    }

    fn existing_bindings(&self) -> Vec<ExistingBinding> {
        let descriptive = self.bindings.values().filter_map(|binding| {
            binding.source().map(|entity| ExistingBinding {
                entity,
                target: binding.target(),
            })
        });
        let mirrored = self
            .mirrors
            .values()
            .flat_map(NetworkMirror::bound_content)
            .map(|(entity, target)| ExistingBinding { entity, target });
        descriptive.chain(mirrored).collect()
    }

    /// Remove a binding and the instance it placed.
    ///
    /// A placed instance that has gone missing is fatal.
    pub fn disconnect(&mut self, id: BindingId) -> Result<(), BinderyError> {
        self.dispose_binding(id, Teardown::Disconnected)?;
        self.pump()?;
        Ok(())
    }

    fn dispose_binding(&mut self, id: BindingId, cause: Teardown) -> Result<(), BinderyError> {
        let mut binding = self
            .bindings
            .remove(&id)
            .ok_or(BinderyError::BindingNotFound(id))?;
        let notice = match cause {
            Teardown::SourceDeleted => binding.on_source_deleting(),
            Teardown::TargetDeleted => Some(binding.on_target_deleting()),
            Teardown::Disconnected => None,
        };

        // The source is still present here, even when it is being deleted.
        let semantic = &mut self.workspace.semantic;
        if binding.has_placed_instance() {
            binding.remove_instance(semantic)?;
        }
        binding.before_deletion(
            semantic,
            &mut self.workspace.scheduler,
            &mut self.subscriptions,
        )?;
        info!(binding = id.0, ?cause, ?notice, "binding disposed");
        Ok(())
    }

    /// Delete a component (and its subtree) and let every binding react.
    pub fn delete_component(&mut self, entity: EntityId) -> Result<Vec<EntityId>, BinderyError> {
        let removed = self.workspace.semantic.delete_component(entity)?;
        self.pump()?;
        Ok(removed)
    }

    // =========================================================================
    // NETWORKS
    // =========================================================================

    /// Mirror `network` into `model` and keep it mirrored.
    pub fn attach_network(
        &mut self,
        model: ModelId,
        network: NetworkGraph,
    ) -> Result<(), BinderyError> {
        if self.mirrors.contains_key(&model) {
            return Err(BinderyError::InvalidTopology(format!(
                "{model} already mirrors a network"
            )));
        }
        let mut mirror = NetworkMirror::new(model, network);
        // The first update covers everything the construction announced.
        mirror.take_network_events();
        let mut cx = self.workspace.context(model)?;
        mirror.update(&mut cx)?;
        self.subscriptions
            .subscribe(Topic::Model(model), Subscriber::Mirror(model));
        self.mirrors.insert(model, mirror);
        self.pump()?;
        Ok(())
    }

    /// Stop mirroring into `model`. Content instances placed by the mirror
    /// are removed; the geometry is left as it is.
    pub fn detach_network(&mut self, model: ModelId) -> Result<NetworkGraph, BinderyError> {
        let mut mirror = self
            .mirrors
            .remove(&model)
            .ok_or(BinderyError::ModelNotFound(model))?;
        self.subscriptions.unsubscribe_all(Subscriber::Mirror(model));
        mirror.dispose(&mut self.workspace.semantic)?;
        self.pump()?;
        info!(model = %model, "network detached");
        Ok(mirror.network().clone())
    }

    // =========================================================================
    // DISPATCH
    // =========================================================================

    /// Drain every outbox and dispatch until nothing is left.
    ///
    /// Returns the number of rounds that carried notifications.
    pub fn pump(&mut self) -> Result<usize, BinderyError> {
        let limit = self.workspace.config.max_event_rounds;
        let mut rounds = 0;
        loop {
            let semantic = self.workspace.semantic.take_events();
            let geometry: Vec<GeometryEvent> = self
                .workspace
                .models
                .values_mut()
                .flat_map(GeometryModel::take_events)
                .collect();
            let network: Vec<(ModelId, Vec<NetworkEvent>)> = self
                .mirrors
                .iter_mut()
                .map(|(model, mirror)| (*model, mirror.take_network_events()))
                .filter(|(_, events)| !events.is_empty())
                .collect();

            if semantic.is_empty() && geometry.is_empty() && network.is_empty() {
                return Ok(rounds);
            }
            if rounds >= limit {
                return Err(BinderyError::EventLoopOverflow(rounds));
            }
            rounds += 1;

            for event in &semantic {
                self.dispatch_semantic(event)?;
            }
            for event in &geometry {
                self.dispatch_geometry(event)?;
            }
            for (model, events) in &network {
                self.dispatch_network(*model, events)?;
            }
        }
    }

    fn dispatch_semantic(&mut self, event: &SemanticEvent) -> Result<(), BinderyError> {
        match event {
            SemanticEvent::ComponentDeleting(entity) => {
                for subscriber in self.subscriptions.subscribers(Topic::EntityDeleting(*entity)) {
                    if let Subscriber::Descriptive(id) = subscriber {
                        if self.bindings.contains_key(&id) {
                            self.dispose_binding(id, Teardown::SourceDeleted)?;
                        }
                    }
                }
                for mirror in self.mirrors.values_mut() {
                    mirror.on_content_deleted(*entity)?;
                }
                self.workspace.semantic.release_deleted(*entity);
                Ok(())
            }
            SemanticEvent::InstanceTransformChanged {
                entity,
                reference,
                origin,
            } => {
                let Some(mirror) = self.mirrors.get_mut(&reference.model) else {
                    return Ok(());
                };
                let mut cx = self.workspace.context(reference.model)?;
                mirror.on_instance_transform_changed(&mut cx, *entity, *reference, *origin)
            }
            SemanticEvent::FilesChanged(entity) => {
                for (model, mirror) in &mut self.mirrors {
                    let mut cx = self.workspace.context(*model)?;
                    mirror.on_files_changed(&mut cx, *entity)?;
                }
                Ok(())
            }
        }
    }

    fn dispatch_geometry(&mut self, event: &GeometryEvent) -> Result<(), BinderyError> {
        if let GeometryEventKind::ModelReplaced { old, new } = event.kind {
            return self.on_model_replaced(old, new);
        }

        for subscriber in self.subscriptions.subscribers(Topic::Model(event.model)) {
            if let Subscriber::Mirror(model) = subscriber {
                if let Some(mirror) = self.mirrors.get_mut(&model) {
                    let mut cx = self.workspace.context(model)?;
                    mirror.handle_geometry_event(&mut cx, event)?;
                }
            }
        }

        let (ids, renamed) = match &event.kind {
            GeometryEventKind::GeometryChanged(ids)
            | GeometryEventKind::TopologyChanged(ids)
            | GeometryEventKind::Removed(ids) => (ids, false),
            GeometryEventKind::Renamed(ids) => (ids, true),
            GeometryEventKind::ModelReplaced { .. } => return Ok(()),
        };
        let targets: BTreeSet<BindingId> = ids
            .iter()
            .flat_map(|id| {
                let reference = GeometricReference::new(event.model, *id);
                self.subscriptions.subscribers(if renamed {
                    Topic::GeometryRenamed(reference)
                } else {
                    Topic::Geometry(reference)
                })
            })
            .filter_map(|subscriber| match subscriber {
                Subscriber::Descriptive(id) => Some(id),
                Subscriber::Mirror(_) => None,
            })
            .collect();

        for id in targets {
            if matches!(event.kind, GeometryEventKind::Removed(_)) {
                if self.bindings.contains_key(&id) {
                    self.dispose_binding(id, Teardown::TargetDeleted)?;
                }
                continue;
            }
            let Some(binding) = self.bindings.get_mut(&id) else {
                continue;
            };
            let mut cx = self.workspace.context(binding.target().model)?;
            if matches!(event.kind, GeometryEventKind::Renamed(_)) {
                binding.on_renamed(&mut cx)?;
            } else {
                binding.synchronize_source_with_target(&mut cx)?;
            }
        }
        Ok(())
    }

    fn on_model_replaced(&mut self, old: ModelId, new: ModelId) -> Result<(), BinderyError> {
        if let Some(mut mirror) = self.mirrors.remove(&old) {
            if old != new && self.mirrors.contains_key(&new) {
                return Err(BinderyError::InvalidTopology(format!(
                    "{new} already mirrors a network"
                )));
            }
            self.subscriptions.unsubscribe_all(Subscriber::Mirror(old));
            mirror.on_model_replaced(new)?;
            let mut cx = self.workspace.context(new)?;
            mirror.update(&mut cx)?;
            self.subscriptions
                .subscribe(Topic::Model(new), Subscriber::Mirror(new));
            self.mirrors.insert(new, mirror);
        }

        let moved: Vec<BindingId> = self
            .bindings
            .values()
            .filter(|binding| binding.target().model == old)
            .map(DescriptiveBinding::id)
            .collect();
        for id in moved {
            let Some(binding) = self.bindings.get_mut(&id) else {
                continue;
            };
            let target = GeometricReference::new(new, binding.target().geometry);
            binding.unsubscribe(&mut self.subscriptions);
            binding.retarget(
                &mut self.workspace.semantic,
                &mut self.workspace.scheduler,
                target,
            )?;
            binding.subscribe(&mut self.subscriptions);
            let mut cx = self.workspace.context(new)?;
            binding.synchronize_source_with_target(&mut cx)?;
        }
        Ok(())
    }

    fn dispatch_network(
        &mut self,
        model: ModelId,
        events: &[NetworkEvent],
    ) -> Result<(), BinderyError> {
        let Some(mirror) = self.mirrors.get_mut(&model) else {
            return Ok(());
        };
        let mut cx = self.workspace.context(model)?;
        mirror.handle_network_events(&mut cx, events)
    }

    // =========================================================================
    // DEFERRED UPDATES
    // =========================================================================

    /// Move the virtual clock and run the parameter updates that fell due.
    ///
    /// Returns the number of updates applied.
    pub fn advance_time(&mut self, by: Duration) -> Result<usize, BinderyError> {
        let due = self.workspace.scheduler.advance(by);
        self.run_timers(due)
    }

    /// Run every pending parameter update now.
    pub fn flush_deferred(&mut self) -> Result<usize, BinderyError> {
        let due = self.workspace.scheduler.fire_all();
        self.run_timers(due)
    }

    fn run_timers(&mut self, due: Vec<BindingId>) -> Result<usize, BinderyError> {
        let mut applied = 0;
        for id in due {
            let Some(binding) = self.bindings.get_mut(&id) else {
                continue;
            };
            let mut cx = self.workspace.context(binding.target().model)?;
            if binding.on_timer(&mut cx)? {
                applied += 1;
            }
        }
        self.pump()?;
        Ok(applied)
    }
}

// =============================================================================
// TESTS
// =============================================================================
