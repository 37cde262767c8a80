//! # Descriptive Bindings
//!
//! A descriptive binding ties a component to the primitive that describes
//! it (a room to its volume, a wall to its face) and keeps two things in
//! step:
//!
//! - **Structure**: the component carries exactly one instance placed at the
//!   primitive, marked available and valid, and links the primitive's model
//!   as an asset.
//! - **Derived parameters**: measurements of the primitive written back as
//!   generated parameters, optionally debounced (see [`crate::deferred`]).
//!
//! The per-kind behaviour is selected by [`DescriptiveKind`].

pub mod parameters;

use crate::admissibility::{InstanceType, evaluate};
use crate::connector::{
    Connector, LifecycleEvent, SyncContext, SynchronizationState, TargetAvailability,
};
use crate::deferred::{DeferredUpdate, Scheduler};
use crate::events::{Subscriber, SubscriptionRegistry, Topic};
use crate::geometry::topology::{face_boundary_points, loop_points};
use crate::geometry::{GeometryKind, GeometryModel, Primitive};
use crate::semantic::{Component, InstanceConnection, PlacementState, SemanticGraph};
use crate::{BinderyError, BindingId, EntityId, GeometricReference, GeometryId, ModelId, Vec3};
use parameters::{
    DerivedParameter, edge_loop_parameters, edge_parameters, face_parameters, volume_parameters,
};
use serde::{Deserialize, Serialize};

// =============================================================================
// KIND
// =============================================================================

/// Which primitive a descriptive binding describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DescriptiveKind {
    Vertex,
    Edge,
    EdgeLoop,
    Face,
    Volume,
    /// A volume treated as an architectural space.
    Space,
}

impl DescriptiveKind {
    /// The binding kind for a component of `instance_type` bound to a
    /// primitive of kind `geometry`.
    ///
    /// Polylines, proxy shapes and network components are bound by the
    /// network mirror instead.
    #[must_use]
    pub fn for_target(instance_type: InstanceType, geometry: GeometryKind) -> Option<Self> {
        if matches!(
            instance_type,
            InstanceType::NetworkNode | InstanceType::NetworkEdge
        ) {
            return None;
        }
        match geometry {
            GeometryKind::Vertex => Some(Self::Vertex),
            GeometryKind::Edge => Some(Self::Edge),
            GeometryKind::EdgeLoop => Some(Self::EdgeLoop),
            GeometryKind::Face => Some(Self::Face),
            GeometryKind::Volume if instance_type == InstanceType::Space => Some(Self::Space),
            GeometryKind::Volume => Some(Self::Volume),
            GeometryKind::Polyline | GeometryKind::ProxyShape => None,
        }
    }

    /// Whether this kind writes derived parameters.
    #[must_use]
    pub fn has_parameters(self) -> bool {
        !matches!(self, Self::Vertex | Self::Space)
    }

    /// Whether the instance name follows the primitive's name.
    #[must_use]
    pub fn tracks_renames(self) -> bool {
        self == Self::Face
    }
}

// =============================================================================
// BINDING
// =============================================================================

/// A binding between a component and the primitive that describes it.
#[derive(Debug, Clone)]
pub struct DescriptiveBinding {
    id: BindingId,
    kind: DescriptiveKind,
    connector: Connector,
    /// Bindings of geometrically nested sub-entities (composite hierarchies).
    children: Vec<BindingId>,
    /// Asset link added by this binding.
    linked: Option<ModelId>,
    /// Target of the last successful structural pass.
    synchronized_target: Option<GeometricReference>,
    deferred: DeferredUpdate,
    applied_updates: u64,
    last_applied: Option<GeometryId>,
}

impl DescriptiveBinding {
    #[must_use]
    pub fn new(
        id: BindingId,
        kind: DescriptiveKind,
        source: EntityId,
        target: GeometricReference,
    ) -> Self {
        Self {
            id,
            kind,
            connector: Connector::new(Some(source), target),
            children: Vec::new(),
            linked: None,
            synchronized_target: None,
            deferred: DeferredUpdate::default(),
            applied_updates: 0,
            last_applied: None,
        }
    }

    #[must_use]
    pub fn id(&self) -> BindingId {
        self.id
    }

    #[must_use]
    pub fn kind(&self) -> DescriptiveKind {
        self.kind
    }

    /// The described component.
    #[must_use]
    pub fn source(&self) -> Option<EntityId> {
        self.connector.source()
    }

    #[must_use]
    pub fn target(&self) -> GeometricReference {
        self.connector.target()
    }

    #[must_use]
    pub fn connector(&self) -> &Connector {
        &self.connector
    }

    #[must_use]
    pub fn state(&self) -> SynchronizationState {
        self.connector.state()
    }

    #[must_use]
    pub fn children(&self) -> &[BindingId] {
        &self.children
    }

    /// The model this binding linked to its component, if it added the link.
    #[must_use]
    pub fn linked_asset(&self) -> Option<ModelId> {
        self.linked
    }

    /// Number of parameter updates applied so far.
    #[must_use]
    pub fn applied_updates(&self) -> u64 {
        self.applied_updates
    }

    /// Primitive used by the most recent parameter update.
    #[must_use]
    pub fn last_applied(&self) -> Option<GeometryId> {
        self.last_applied
    }

    /// Primitive waiting for a debounced update.
    #[must_use]
    pub fn pending_update(&self) -> Option<GeometryId> {
        self.deferred.pending()
    }

    // =========================================================================
    // SUBSCRIPTIONS
    // =========================================================================

    fn topics(&self) -> Vec<Topic> {
        let target = self.target();
        let mut topics: Vec<Topic> = self
            .source()
            .map(Topic::EntityDeleting)
            .into_iter()
            .collect();
        topics.push(Topic::Geometry(target));
        if self.kind.tracks_renames() {
            topics.push(Topic::GeometryRenamed(target));
        }
        topics
    }

    pub fn subscribe(&self, registry: &mut SubscriptionRegistry) {
        for topic in self.topics() {
            registry.subscribe(topic, Subscriber::Descriptive(self.id));
        }
    }

    pub fn unsubscribe(&self, registry: &mut SubscriptionRegistry) {
        for topic in self.topics() {
            registry.unsubscribe(topic, Subscriber::Descriptive(self.id));
        }
    }

    // =========================================================================
    // SYNCHRONIZATION
    // =========================================================================

    /// Bring the component's instance, placement and asset link in line with
    /// the target.
    ///
    /// Returns `false` (and marks the binding `SourceStale`) when the target
    /// is missing or no longer admissible; parameters are left untouched.
    pub fn synchronize_structure(&mut self, cx: &mut SyncContext<'_>) -> Result<bool, BinderyError> {
        let target = self.target();
        let primitive = match cx.model.resolve(target) {
            Ok(primitive) => Some(primitive.clone()),
            Err(BinderyError::GeometryNotFound(_)) => None,
            Err(error) => return Err(error),
        };
        let Some(source) = self.source() else {
            self.mark_not_found(cx.semantic, primitive.is_none())?;
            return Ok(false);
        };

        let admissible = match (cx.semantic.component(source), primitive.as_ref()) {
            (Some(entity), Some(primitive)) => {
                let parent = cx.semantic.parent_of(source);
                let parent_primitive = parent.and_then(|p| placed_primitive(p, &*cx.model));
                let state = evaluate(parent, parent_primitive, Some(entity), Some(primitive));
                state.is_admissible()
                    && DescriptiveKind::for_target(entity.instance_type, primitive.kind())
                        == Some(self.kind)
            }
            _ => false,
        };

        if !admissible {
            self.mark_not_found(cx.semantic, primitive.is_none())?;
            return Ok(false);
        }
        let name = primitive.map(|p| p.name).unwrap_or_default();

        {
            let mut scope = cx.semantic.without_access_checks();
            if scope.get(source)?.instance_at(target).is_none() {
                scope.add_instance(source, name, target)?;
            }
            scope.set_instance_connection(source, target, InstanceConnection::Available)?;
            scope.set_placement_state(source, target, PlacementState::Valid)?;
        }

        if self.synchronized_target != Some(target) {
            let wanted = target.model;
            if self.linked != Some(wanted) {
                if let Some(old) = self.linked.take() {
                    cx.semantic.remove_asset(source, old)?;
                }
                if cx.semantic.add_asset(source, wanted)? {
                    self.linked = Some(wanted);
                }
            }
            self.synchronized_target = Some(target);
        }

        self.connector.set_availability(TargetAvailability::Available);
        Ok(true)
    }

    fn mark_not_found(
        &mut self,
        semantic: &mut SemanticGraph,
        target_missing: bool,
    ) -> Result<(), BinderyError> {
        let target = self.target();
        if let Some(source) = self.placed_source(semantic, target) {
            let mut scope = semantic.without_access_checks();
            scope.set_instance_connection(source, target, InstanceConnection::GeometryNotFound)?;
            if target_missing {
                scope.set_placement_state(source, target, PlacementState::TargetMissing)?;
            }
        }
        if target_missing {
            self.connector
                .set_availability(TargetAvailability::TargetMissing);
        }
        self.connector.set_state(SynchronizationState::SourceStale);
        tracing::debug!(
            binding = self.id.0,
            entity = ?self.source(),
            target = %target,
            "binding is stale"
        );
        Ok(())
    }

    /// Structural pass followed, on success, by a parameter update request.
    pub fn synchronize_source_with_target(
        &mut self,
        cx: &mut SyncContext<'_>,
    ) -> Result<bool, BinderyError> {
        if !self.synchronize_structure(cx)? {
            return Ok(false);
        }
        let target = self.target();
        self.connector
            .synchronize_source_with_target(cx.model.geometry_from_id(target.geometry));
        self.request_parameter_update(cx, target.geometry)?;
        Ok(true)
    }

    // =========================================================================
    // DEFERRED PARAMETERS
    // =========================================================================

    /// Apply now (synchronous mode) or restart the debounce timer.
    pub fn request_parameter_update(
        &mut self,
        cx: &mut SyncContext<'_>,
        primitive: GeometryId,
    ) -> Result<(), BinderyError> {
        let mode = cx.config.update_mode();
        if let Some(now) = self
            .deferred
            .request(self.id, primitive, mode, &mut *cx.scheduler)
        {
            self.apply_parameter_update(cx, now)?;
        }
        Ok(())
    }

    /// Called when this binding's timer fired. Returns whether an update ran.
    pub fn on_timer(&mut self, cx: &mut SyncContext<'_>) -> Result<bool, BinderyError> {
        match self.deferred.take_due() {
            Some(primitive) => {
                self.apply_parameter_update(cx, primitive)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Measure `primitive` and write the derived parameters.
    ///
    /// Measurement failures are reported as warnings and leave the binding
    /// `TargetStale`.
    pub fn apply_parameter_update(
        &mut self,
        cx: &mut SyncContext<'_>,
        primitive: GeometryId,
    ) -> Result<(), BinderyError> {
        self.applied_updates = self.applied_updates.saturating_add(1);
        self.last_applied = Some(primitive);
        let Some(source) = self.source().filter(|source| cx.semantic.contains(*source)) else {
            return Ok(());
        };
        if !self.kind.has_parameters() || !cx.model.contains(primitive) {
            return Ok(());
        }

        let (derived, path) = match self.measure(cx, primitive) {
            Ok(measured) => measured,
            Err(error) => {
                cx.warnings.report_warnings(&[format!(
                    "cannot measure {} for {source}: {error}",
                    cx.model.reference(primitive)
                )]);
                self.connector.set_state(SynchronizationState::TargetStale);
                return Ok(());
            }
        };

        let reference = cx.model.reference(primitive);
        let mut scope = cx.semantic.without_access_checks();
        for parameter in &derived {
            scope.set_generated_parameter(source, parameter.name, parameter.unit, parameter.value)?;
        }
        if let Some(path) = path {
            if scope.get(source)?.instance_at(reference).is_some() {
                scope.set_instance_path(source, reference, path)?;
            }
        }
        tracing::debug!(
            binding = self.id.0,
            entity = %source,
            parameters = derived.len(),
            "derived parameters written"
        );
        Ok(())
    }

    fn measure(
        &self,
        cx: &SyncContext<'_>,
        primitive: GeometryId,
    ) -> Result<(Vec<DerivedParameter>, Option<Vec<Vec3>>), BinderyError> {
        let reference_elevation = cx.config.reference_elevation;
        let model: &GeometryModel = &*cx.model;
        Ok(match self.kind {
            DescriptiveKind::Vertex | DescriptiveKind::Space => (Vec::new(), None),
            DescriptiveKind::Edge => (edge_parameters(&cx.measurements.edge(model, primitive)?), None),
            DescriptiveKind::EdgeLoop => (
                edge_loop_parameters(
                    &cx.measurements.edge_loop(model, primitive)?,
                    reference_elevation,
                ),
                Some(loop_points(model, primitive)?),
            ),
            DescriptiveKind::Face => (
                face_parameters(&cx.measurements.face(model, primitive)?, reference_elevation),
                Some(face_boundary_points(model, primitive)?),
            ),
            DescriptiveKind::Volume => (
                volume_parameters(&cx.measurements.volume(model, primitive)?, reference_elevation),
                None,
            ),
        })
    }

    // =========================================================================
    // NOTIFICATIONS
    // =========================================================================

    /// The target primitive was renamed.
    pub fn on_renamed(&mut self, cx: &mut SyncContext<'_>) -> Result<(), BinderyError> {
        if !self.kind.tracks_renames() {
            return Ok(());
        }
        let target = self.target();
        let Some(name) = cx.model.geometry_from_id(target.geometry).map(|p| p.name.clone()) else {
            return Ok(());
        };
        if let Some(source) = self.placed_source(cx.semantic, target) {
            cx.semantic.set_instance_name(source, target, &name)?;
        }
        Ok(())
    }

    /// Point the binding at another primitive (e.g. after a model reload).
    ///
    /// The instance at the old target is removed and a debounced update
    /// still waiting on the old primitive is dropped; the next structural
    /// pass places a new instance and requests a fresh update.
    pub fn retarget(
        &mut self,
        semantic: &mut SemanticGraph,
        scheduler: &mut dyn Scheduler,
        target: GeometricReference,
    ) -> Result<(), BinderyError> {
        let old = self.target();
        if old == target {
            return Ok(());
        }
        if let Some(source) = self.placed_source(semantic, old) {
            semantic.without_access_checks().remove_instance(source, old)?;
        }
        self.deferred.cancel(self.id, scheduler);
        self.synchronized_target = None;
        self.connector.retarget(target);
        Ok(())
    }

    /// The source, if it has an instance placed at `target`.
    fn placed_source(&self, semantic: &SemanticGraph, target: GeometricReference) -> Option<EntityId> {
        self.source().filter(|source| {
            semantic
                .component(*source)
                .is_some_and(|c| c.instance_at(target).is_some())
        })
    }

    /// Whether the last structural pass placed an instance at the current
    /// target.
    #[must_use]
    pub fn has_placed_instance(&self) -> bool {
        self.synchronized_target == Some(self.target())
    }

    pub fn on_source_deleting(&mut self) -> Option<LifecycleEvent> {
        self.connector.on_source_deleting()
    }

    pub fn on_target_deleting(&mut self) -> LifecycleEvent {
        self.connector.on_target_deleting()
    }

    /// Remove the placement this binding made, and with it the instance it
    /// placed.
    ///
    /// A missing placement means the graphs diverged and is fatal.
    pub fn remove_instance(&self, semantic: &mut SemanticGraph) -> Result<(), BinderyError> {
        let Some(source) = self.source() else {
            return Ok(());
        };
        semantic
            .without_access_checks()
            .remove_placement(source, self.target())?;
        Ok(())
    }

    /// Teardown: drop the asset link, detach every subscription and stop a
    /// pending timer.
    pub fn before_deletion(
        &mut self,
        semantic: &mut SemanticGraph,
        scheduler: &mut dyn Scheduler,
        registry: &mut SubscriptionRegistry,
    ) -> Result<(), BinderyError> {
        self.unsubscribe(registry);
        self.deferred.cancel(self.id, scheduler);
        if let Some(model) = self.linked.take() {
            if let Some(source) = self.source().filter(|source| semantic.contains(*source)) {
                semantic.remove_asset(source, model)?;
            }
        }
        Ok(())
    }
}

/// The primitive of `model` a component is placed at, if any.
pub(crate) fn placed_primitive<'m>(
    component: &Component,
    model: &'m GeometryModel,
) -> Option<&'m Primitive> {
    component
        .instances
        .iter()
        .flat_map(|instance| instance.placements.iter())
        .filter(|placement| placement.reference.model == model.id())
        .find_map(|placement| model.geometry_from_id(placement.reference.geometry))
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExchangeConfig;
    use crate::deferred::ManualScheduler;
    use crate::geometry::Orientation;
    use crate::geometry::build::add_polygon;
    use crate::measure::PlanarMeasurements;
    use crate::proxy::FsAssetImporter;
    use crate::warnings::WarningLog;

    struct Fixture {
        semantic: SemanticGraph,
        model: GeometryModel,
        config: ExchangeConfig,
        scheduler: ManualScheduler,
        warnings: WarningLog,
        importer: FsAssetImporter,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                semantic: SemanticGraph::new(),
                model: GeometryModel::new(ModelId(1), "geometry"),
                config: ExchangeConfig::default(),
                scheduler: ManualScheduler::new(),
                warnings: WarningLog::new(),
                importer: FsAssetImporter::new(None, &[]),
            }
        }

        fn cx(&mut self) -> SyncContext<'_> {
            SyncContext {
                semantic: &mut self.semantic,
                model: &mut self.model,
                measurements: &PlanarMeasurements,
                importer: &self.importer,
                config: &self.config,
                scheduler: &mut self.scheduler,
                warnings: &mut self.warnings,
            }
        }
    }

    fn wall(fixture: &mut Fixture) -> (EntityId, GeometricReference) {
        let entity = fixture
            .semantic
            .add_component("wall", InstanceType::Surface, None)
            .expect("component");
        let face = add_polygon(
            &mut fixture.model,
            "wall",
            &[
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(4.0, 0.0, 0.0),
                Vec3::new(4.0, 0.0, 3.0),
                Vec3::new(0.0, 0.0, 3.0),
            ],
        )
        .expect("face");
        (entity, fixture.model.reference(face))
    }

    #[test]
    fn structure_is_idempotent() {
        let mut fixture = Fixture::new();
        let (entity, target) = wall(&mut fixture);
        let mut binding = DescriptiveBinding::new(BindingId(1), DescriptiveKind::Face, entity, target);

        assert!(binding.synchronize_structure(&mut fixture.cx()).expect("first"));
        let once = fixture.semantic.get(entity).expect("entity").clone();
        assert!(binding.synchronize_structure(&mut fixture.cx()).expect("second"));
        let twice = fixture.semantic.get(entity).expect("entity");

        assert_eq!(twice.instances.len(), 1);
        assert_eq!(&once, twice);
        assert_eq!(binding.linked_asset(), Some(ModelId(1)));
        assert!(twice.assets.contains(&ModelId(1)));
    }

    #[test]
    fn face_parameters_and_path_are_written() {
        let mut fixture = Fixture::new();
        let (entity, target) = wall(&mut fixture);
        let mut binding = DescriptiveBinding::new(BindingId(1), DescriptiveKind::Face, entity, target);

        assert!(
            binding
                .synchronize_source_with_target(&mut fixture.cx())
                .expect("sync")
        );

        let component = fixture.semantic.get(entity).expect("entity");
        let value = |name: &str| component.parameter_value(name).expect(name);
        assert!((value("area") - 12.0).abs() < 1e-9);
        assert!((value("width") - 4.0).abs() < 1e-9);
        assert!((value("height") - 3.0).abs() < 1e-9);
        assert!(component.parameter("area").expect("area").generated);
        let instance = component.instance_at(target).expect("instance");
        assert_eq!(instance.path.len(), 4);
        assert_eq!(binding.state(), SynchronizationState::Synchronized);
    }

    #[test]
    fn reversed_face_path_follows_the_owning_volume() {
        let mut fixture = Fixture::new();
        let (entity, target) = wall(&mut fixture);
        fixture
            .model
            .add_volume("room", vec![(target.geometry, Orientation::Reversed)])
            .expect("volume");
        let mut binding = DescriptiveBinding::new(BindingId(1), DescriptiveKind::Face, entity, target);
        assert_eq!(binding.source(), Some(entity));

        assert!(
            binding
                .synchronize_source_with_target(&mut fixture.cx())
                .expect("sync")
        );

        let component = fixture.semantic.get(entity).expect("entity");
        assert_eq!(
            component.instance_at(target).expect("instance").path,
            vec![
                Vec3::new(0.0, 0.0, 3.0),
                Vec3::new(4.0, 0.0, 3.0),
                Vec3::new(4.0, 0.0, 0.0),
                Vec3::new(0.0, 0.0, 0.0),
            ]
        );
        let area = component.parameter_value("area").expect("area");
        assert!((area - 12.0).abs() < 1e-9);
    }

    #[test]
    fn missing_target_marks_the_instance() {
        let mut fixture = Fixture::new();
        let (entity, target) = wall(&mut fixture);
        let mut binding = DescriptiveBinding::new(BindingId(1), DescriptiveKind::Face, entity, target);
        binding.synchronize_structure(&mut fixture.cx()).expect("sync");

        fixture.model.remove(target.geometry).expect("remove face");
        let ok = binding.synchronize_structure(&mut fixture.cx()).expect("sync");

        assert!(!ok);
        assert_eq!(binding.state(), SynchronizationState::SourceStale);
        let instance = fixture
            .semantic
            .get(entity)
            .expect("entity")
            .instance_at(target)
            .expect("instance")
            .clone();
        assert_eq!(instance.connection, InstanceConnection::GeometryNotFound);
        assert_eq!(instance.placements[0].state, PlacementState::TargetMissing);
    }

    #[test]
    fn teardown_drops_link_and_subscriptions() {
        let mut fixture = Fixture::new();
        let (entity, target) = wall(&mut fixture);
        let mut registry = SubscriptionRegistry::new();
        let mut binding = DescriptiveBinding::new(BindingId(1), DescriptiveKind::Face, entity, target);
        binding.subscribe(&mut registry);
        assert_eq!(registry.len(), 3);
        binding.synchronize_structure(&mut fixture.cx()).expect("sync");

        binding
            .before_deletion(&mut fixture.semantic, &mut fixture.scheduler, &mut registry)
            .expect("teardown");

        assert!(registry.is_empty());
        assert!(fixture.semantic.get(entity).expect("entity").assets.is_empty());
        binding.remove_instance(&mut fixture.semantic).expect("remove");
        assert!(binding.remove_instance(&mut fixture.semantic).is_err());
    }

    #[test]
    fn kinds_follow_instance_type_and_geometry() {
        assert_eq!(
            DescriptiveKind::for_target(InstanceType::Space, GeometryKind::Volume),
            Some(DescriptiveKind::Space)
        );
        assert_eq!(
            DescriptiveKind::for_target(InstanceType::Volume, GeometryKind::Volume),
            Some(DescriptiveKind::Volume)
        );
        assert_eq!(
            DescriptiveKind::for_target(InstanceType::Line, GeometryKind::Polyline),
            None
        );
        assert_eq!(
            DescriptiveKind::for_target(InstanceType::NetworkNode, GeometryKind::Vertex),
            None
        );
    }
}
