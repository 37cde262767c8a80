//! # Semantic Graph
//!
//! Hierarchical components carrying named parameters, and the instances and
//! placements that record where a component is realised in geometry.
//!
//! Generated content (derived parameters, binding instances and their paths)
//! is guarded by access checking. Bindings write it through an
//! [`AccessScope`], which relaxes checking for its lifetime and restores the
//! previous state when dropped, on every exit path.

use crate::admissibility::InstanceType;
use crate::{BinderyError, EntityId, GeometricReference, ModelId, PropagationToken, Vec3};
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::ops::{Deref, DerefMut};

// =============================================================================
// PARAMETERS
// =============================================================================

bitflags! {
    /// Operations users may perform on a parameter.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct ParameterOps: u8 {
        const READ  = 1 << 0;
        const WRITE = 1 << 1;
    }
}

/// A named numeric value on a component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub unit: String,
    pub value: f64,
    /// Derived parameters are generated and overwritten on every pass.
    pub generated: bool,
    pub ops: ParameterOps,
}

// =============================================================================
// INSTANCES & PLACEMENTS
// =============================================================================

/// Identifier of an instance, unique within the semantic graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InstanceId(pub u64);

/// Whether an instance is realised by existing geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum InstanceConnection {
    #[default]
    Available,
    GeometryNotFound,
}

/// Validity of one placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PlacementState {
    #[default]
    Valid,
    TargetMissing,
}

/// Where an instance is placed in geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    pub reference: GeometricReference,
    pub state: PlacementState,
}

/// Size and rotation of an instance (mirrored into proxy shapes).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InstanceTransform {
    pub size: Vec3,
    pub rotation: Vec3,
}

impl Default for InstanceTransform {
    fn default() -> Self {
        Self {
            size: Vec3::ONE,
            rotation: Vec3::ZERO,
        }
    }
}

/// The semantic-side record of one binding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    pub id: InstanceId,
    pub name: String,
    pub connection: InstanceConnection,
    pub placements: Vec<Placement>,
    /// Ordered 3-D points (loop/face boundary or network edge path).
    pub path: Vec<Vec3>,
    pub transform: InstanceTransform,
    /// Incremented on every mutation of this instance.
    #[serde(default)]
    pub revision: u64,
}

impl Instance {
    /// Whether one of this instance's placements points at `reference`.
    #[must_use]
    pub fn is_placed_at(&self, reference: GeometricReference) -> bool {
        self.placements.iter().any(|p| p.reference == reference)
    }

    #[must_use]
    pub fn placement(&self, reference: GeometricReference) -> Option<&Placement> {
        self.placements.iter().find(|p| p.reference == reference)
    }

    fn touch(&mut self) {
        self.revision = self.revision.saturating_add(1);
    }
}

// =============================================================================
// COMPONENT
// =============================================================================

/// A node of the semantic graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    pub id: EntityId,
    pub name: String,
    pub instance_type: InstanceType,
    pub parent: Option<EntityId>,
    pub children: Vec<EntityId>,
    pub parameters: BTreeMap<String, Parameter>,
    pub instances: Vec<Instance>,
    /// Geometry files linked to this component by its bindings.
    pub assets: BTreeSet<ModelId>,
    /// Resource files referenced by the component (e.g. 3-D proxy assets).
    pub files: Vec<String>,
    /// Created automatically as part of a binding's generated substructure.
    pub generated: bool,
}

impl Component {
    #[must_use]
    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters.get(name)
    }

    #[must_use]
    pub fn parameter_value(&self, name: &str) -> Option<f64> {
        self.parameters.get(name).map(|p| p.value)
    }

    #[must_use]
    pub fn instance_at(&self, reference: GeometricReference) -> Option<&Instance> {
        self.instances.iter().find(|i| i.is_placed_at(reference))
    }

    fn instance_at_mut(&mut self, reference: GeometricReference) -> Option<&mut Instance> {
        self.instances.iter_mut().find(|i| i.is_placed_at(reference))
    }
}

// =============================================================================
// EVENTS
// =============================================================================

/// Change notification raised by the semantic graph.
#[derive(Debug, Clone, PartialEq)]
pub enum SemanticEvent {
    /// The component is about to be freed (raised children first). It is
    /// still present in the graph while the notification is handled.
    ComponentDeleting(EntityId),
    /// An instance's size or rotation changed.
    InstanceTransformChanged {
        entity: EntityId,
        reference: GeometricReference,
        origin: Option<PropagationToken>,
    },
    /// The component's referenced resource files changed.
    FilesChanged(EntityId),
}

// =============================================================================
// GRAPH
// =============================================================================

/// The semantic graph: an arena of components.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemanticGraph {
    components: BTreeMap<EntityId, Component>,
    next_entity_id: u64,
    next_instance_id: u64,
    access_checks: bool,
    #[serde(skip)]
    events: Vec<SemanticEvent>,
    /// Deleted components awaiting release.
    #[serde(skip)]
    deleting: BTreeSet<EntityId>,
}

impl Default for SemanticGraph {
    fn default() -> Self {
        Self {
            components: BTreeMap::new(),
            next_entity_id: 1,
            next_instance_id: 1,
            access_checks: true,
            events: Vec::new(),
            deleting: BTreeSet::new(),
        }
    }
}

impl SemanticGraph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a component, optionally as the last child of `parent`.
    pub fn add_component(
        &mut self,
        name: impl Into<String>,
        instance_type: InstanceType,
        parent: Option<EntityId>,
    ) -> Result<EntityId, BinderyError> {
        let id = EntityId(self.next_entity_id);
        self.insert_component(id, name, instance_type, parent)?;
        Ok(id)
    }

    /// Add a component under a caller-chosen identifier.
    pub fn insert_component(
        &mut self,
        id: EntityId,
        name: impl Into<String>,
        instance_type: InstanceType,
        parent: Option<EntityId>,
    ) -> Result<(), BinderyError> {
        if self.components.contains_key(&id) {
            return Err(BinderyError::Serialization(format!("{id} already exists")));
        }
        if let Some(parent) = parent {
            self.get_mut(parent)?.children.push(id);
        }
        self.components.insert(
            id,
            Component {
                id,
                name: name.into(),
                instance_type,
                parent,
                children: Vec::new(),
                parameters: BTreeMap::new(),
                instances: Vec::new(),
                assets: BTreeSet::new(),
                files: Vec::new(),
                generated: false,
            },
        );
        self.next_entity_id = self.next_entity_id.max(id.0.saturating_add(1));
        Ok(())
    }

    #[must_use]
    pub fn component(&self, id: EntityId) -> Option<&Component> {
        self.components.get(&id)
    }

    pub fn get(&self, id: EntityId) -> Result<&Component, BinderyError> {
        self.components
            .get(&id)
            .ok_or(BinderyError::EntityNotFound(id))
    }

    fn get_mut(&mut self, id: EntityId) -> Result<&mut Component, BinderyError> {
        self.components
            .get_mut(&id)
            .ok_or(BinderyError::EntityNotFound(id))
    }

    /// All components in identifier order.
    pub fn components(&self) -> impl Iterator<Item = &Component> {
        self.components.values()
    }

    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.components.contains_key(&id)
    }

    /// Parent component of `id`, if any.
    #[must_use]
    pub fn parent_of(&self, id: EntityId) -> Option<&Component> {
        self.components
            .get(&id)
            .and_then(|c| c.parent)
            .and_then(|parent| self.components.get(&parent))
    }

    /// Mark a component as generated substructure.
    pub fn set_generated(&mut self, id: EntityId, generated: bool) -> Result<(), BinderyError> {
        self.get_mut(id)?.generated = generated;
        Ok(())
    }

    // =========================================================================
    // ACCESS CONTROL
    // =========================================================================

    #[must_use]
    pub fn access_checks_enabled(&self) -> bool {
        self.access_checks
    }

    /// Relax access checking until the returned scope is dropped.
    pub fn without_access_checks(&mut self) -> AccessScope<'_> {
        let previous = self.access_checks;
        self.access_checks = false;
        AccessScope {
            graph: self,
            previous,
        }
    }

    fn check_generated_write(&self, entity: EntityId, what: &str) -> Result<(), BinderyError> {
        if self.access_checks {
            Err(BinderyError::AccessDenied {
                entity,
                parameter: what.to_string(),
            })
        } else {
            Ok(())
        }
    }

    // =========================================================================
    // PARAMETERS
    // =========================================================================

    /// User write: creates a writable parameter or updates a writable one.
    pub fn set_parameter(
        &mut self,
        entity: EntityId,
        name: &str,
        unit: &str,
        value: f64,
    ) -> Result<(), BinderyError> {
        let checks = self.access_checks;
        let component = self.get_mut(entity)?;
        match component.parameters.get_mut(name) {
            Some(parameter) => {
                if checks && !parameter.ops.contains(ParameterOps::WRITE) {
                    return Err(BinderyError::AccessDenied {
                        entity,
                        parameter: name.to_string(),
                    });
                }
                parameter.value = value;
            }
            None => {
                component.parameters.insert(
                    name.to_string(),
                    Parameter {
                        name: name.to_string(),
                        unit: unit.to_string(),
                        value,
                        generated: false,
                        ops: ParameterOps::READ | ParameterOps::WRITE,
                    },
                );
            }
        }
        Ok(())
    }

    /// Generated write: creates the parameter if absent, then overwrites it.
    ///
    /// Requires access checking to be relaxed.
    pub fn set_generated_parameter(
        &mut self,
        entity: EntityId,
        name: &str,
        unit: &str,
        value: f64,
    ) -> Result<(), BinderyError> {
        self.check_generated_write(entity, name)?;
        let component = self.get_mut(entity)?;
        let parameter = component
            .parameters
            .entry(name.to_string())
            .or_insert_with(|| Parameter {
                name: name.to_string(),
                unit: unit.to_string(),
                value,
                generated: true,
                ops: ParameterOps::READ,
            });
        parameter.value = value;
        parameter.unit = unit.to_string();
        parameter.generated = true;
        Ok(())
    }

    #[must_use]
    pub fn parameter_value(&self, entity: EntityId, name: &str) -> Option<f64> {
        self.components
            .get(&entity)
            .and_then(|c| c.parameter_value(name))
    }

    // =========================================================================
    // INSTANCES
    // =========================================================================

    /// Add an instance placed at `reference` (generated content).
    pub fn add_instance(
        &mut self,
        entity: EntityId,
        name: impl Into<String>,
        reference: GeometricReference,
    ) -> Result<(), BinderyError> {
        self.check_generated_write(entity, "instances")?;
        let id = InstanceId(self.next_instance_id);
        self.next_instance_id = self.next_instance_id.saturating_add(1);
        self.get_mut(entity)?.instances.push(Instance {
            id,
            name: name.into(),
            connection: InstanceConnection::Available,
            placements: vec![Placement {
                reference,
                state: PlacementState::Valid,
            }],
            path: Vec::new(),
            transform: InstanceTransform::default(),
            revision: 0,
        });
        Ok(())
    }

    /// Remove the instance placed at `reference`.
    ///
    /// A missing instance means the graphs have diverged and is fatal.
    pub fn remove_instance(
        &mut self,
        entity: EntityId,
        reference: GeometricReference,
    ) -> Result<Instance, BinderyError> {
        self.check_generated_write(entity, "instances")?;
        let component = self.get_mut(entity)?;
        let position = component
            .instances
            .iter()
            .position(|i| i.is_placed_at(reference))
            .ok_or(BinderyError::InstanceNotRemoved { entity, reference })?;
        Ok(component.instances.remove(position))
    }

    /// Remove one placement from the instance placed at `reference`.
    ///
    /// An instance left without placements is removed with it. A missing
    /// placement means the graphs have diverged and is fatal.
    pub fn remove_placement(
        &mut self,
        entity: EntityId,
        reference: GeometricReference,
    ) -> Result<Placement, BinderyError> {
        self.check_generated_write(entity, "placements")?;
        let missing = BinderyError::PlacementNotRemoved { entity, reference };
        let component = self.get_mut(entity)?;
        let (index, position) = component
            .instances
            .iter()
            .enumerate()
            .find_map(|(index, instance)| {
                instance
                    .placements
                    .iter()
                    .position(|p| p.reference == reference)
                    .map(|position| (index, position))
            })
            .ok_or_else(|| missing.clone())?;
        let instance = component.instances.get_mut(index).ok_or(missing)?;
        let placement = instance.placements.remove(position);
        if instance.placements.is_empty() {
            component.instances.remove(index);
        } else {
            instance.touch();
        }
        Ok(placement)
    }

    pub fn set_instance_connection(
        &mut self,
        entity: EntityId,
        reference: GeometricReference,
        connection: InstanceConnection,
    ) -> Result<(), BinderyError> {
        self.check_generated_write(entity, "instances")?;
        let instance = self.instance_mut(entity, reference)?;
        if instance.connection != connection {
            instance.connection = connection;
            instance.touch();
        }
        Ok(())
    }

    pub fn set_placement_state(
        &mut self,
        entity: EntityId,
        reference: GeometricReference,
        state: PlacementState,
    ) -> Result<(), BinderyError> {
        self.check_generated_write(entity, "placements")?;
        let instance = self.instance_mut(entity, reference)?;
        let mut changed = false;
        for placement in &mut instance.placements {
            if placement.reference == reference && placement.state != state {
                placement.state = state;
                changed = true;
            }
        }
        if changed {
            instance.touch();
        }
        Ok(())
    }

    pub fn set_instance_path(
        &mut self,
        entity: EntityId,
        reference: GeometricReference,
        path: Vec<Vec3>,
    ) -> Result<(), BinderyError> {
        self.check_generated_write(entity, "instance path")?;
        let instance = self.instance_mut(entity, reference)?;
        if instance.path != path {
            instance.path = path;
            instance.touch();
        }
        Ok(())
    }

    pub fn set_instance_name(
        &mut self,
        entity: EntityId,
        reference: GeometricReference,
        name: &str,
    ) -> Result<(), BinderyError> {
        let instance = self.instance_mut(entity, reference)?;
        if instance.name != name {
            instance.name = name.to_string();
            instance.touch();
        }
        Ok(())
    }

    /// Change an instance's size/rotation; a user-editable property.
    ///
    /// `origin` is copied onto the raised event.
    pub fn set_instance_transform(
        &mut self,
        entity: EntityId,
        reference: GeometricReference,
        transform: InstanceTransform,
        origin: Option<PropagationToken>,
    ) -> Result<(), BinderyError> {
        let instance = self.instance_mut(entity, reference)?;
        if instance.transform == transform {
            return Ok(());
        }
        instance.transform = transform;
        instance.touch();
        self.events.push(SemanticEvent::InstanceTransformChanged {
            entity,
            reference,
            origin,
        });
        Ok(())
    }

    fn instance_mut(
        &mut self,
        entity: EntityId,
        reference: GeometricReference,
    ) -> Result<&mut Instance, BinderyError> {
        self.get_mut(entity)?
            .instance_at_mut(reference)
            .ok_or(BinderyError::GeometryNotFound(reference))
    }

    // =========================================================================
    // ASSETS & FILES
    // =========================================================================

    /// Link a geometry file to a component. Returns `false` if already linked.
    pub fn add_asset(&mut self, entity: EntityId, model: ModelId) -> Result<bool, BinderyError> {
        Ok(self.get_mut(entity)?.assets.insert(model))
    }

    /// Unlink a geometry file. Returns `false` if it was not linked.
    pub fn remove_asset(&mut self, entity: EntityId, model: ModelId) -> Result<bool, BinderyError> {
        Ok(self.get_mut(entity)?.assets.remove(&model))
    }

    /// Replace the resource files referenced by a component.
    pub fn set_files(&mut self, entity: EntityId, files: Vec<String>) -> Result<(), BinderyError> {
        let component = self.get_mut(entity)?;
        if component.files != files {
            component.files = files;
            self.events.push(SemanticEvent::FilesChanged(entity));
        }
        Ok(())
    }

    // =========================================================================
    // DELETION & EVENTS
    // =========================================================================

    /// Delete a component and its subtree.
    ///
    /// `ComponentDeleting` is raised for every doomed component, children
    /// before their parent. The components stay readable until
    /// [`Self::release_deleted`] frees them, so handlers can still tear down
    /// what refers to them. Returns the doomed identifiers in event order.
    pub fn delete_component(&mut self, id: EntityId) -> Result<Vec<EntityId>, BinderyError> {
        if self.deleting.contains(&id) {
            return Err(BinderyError::EntityNotFound(id));
        }
        self.get(id)?;
        let mut order = Vec::new();
        self.collect_subtree(id, &mut order);
        order.retain(|doomed| !self.deleting.contains(doomed));
        for doomed in &order {
            self.events.push(SemanticEvent::ComponentDeleting(*doomed));
            self.deleting.insert(*doomed);
        }
        Ok(order)
    }

    /// Whether `id` has been deleted but not yet freed.
    #[must_use]
    pub fn is_deleting(&self, id: EntityId) -> bool {
        self.deleting.contains(&id)
    }

    /// Free a deleted component once its `ComponentDeleting` notification
    /// has been handled. Returns `false` if `id` was not awaiting release.
    pub fn release_deleted(&mut self, id: EntityId) -> bool {
        if !self.deleting.remove(&id) {
            return false;
        }
        let Some(component) = self.components.remove(&id) else {
            return false;
        };
        if let Some(parent) = component.parent.and_then(|p| self.components.get_mut(&p)) {
            parent.children.retain(|child| *child != id);
        }
        true
    }

    fn collect_subtree(&self, id: EntityId, order: &mut Vec<EntityId>) {
        if let Some(component) = self.components.get(&id) {
            for child in &component.children {
                self.collect_subtree(*child, order);
            }
            order.push(id);
        }
    }

    /// Drain the outbox.
    pub fn take_events(&mut self) -> Vec<SemanticEvent> {
        std::mem::take(&mut self.events)
    }

    #[must_use]
    pub fn has_pending_events(&self) -> bool {
        !self.events.is_empty()
    }
}

// =============================================================================
// ACCESS SCOPE
// =============================================================================

/// RAII acquisition that relaxes access checking on a [`SemanticGraph`].
#[derive(Debug)]
pub struct AccessScope<'a> {
    graph: &'a mut SemanticGraph,
    previous: bool,
}

impl Deref for AccessScope<'_> {
    type Target = SemanticGraph;

    fn deref(&self) -> &SemanticGraph {
        self.graph
    }
}

impl DerefMut for AccessScope<'_> {
    fn deref_mut(&mut self) -> &mut SemanticGraph {
        self.graph
    }
}

impl Drop for AccessScope<'_> {
    fn drop(&mut self) {
        self.graph.access_checks = self.previous;
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GeometryId;

    fn reference(id: u64) -> GeometricReference {
        GeometricReference::new(ModelId(1), GeometryId(id))
    }

    #[test]
    fn generated_parameters_need_relaxed_access() {
        let mut graph = SemanticGraph::new();
        let room = graph
            .add_component("room", InstanceType::Volume, None)
            .expect("add");

        let denied = graph.set_generated_parameter(room, "area", "m²", 4.0);
        assert!(matches!(denied, Err(BinderyError::AccessDenied { .. })));

        {
            let mut scope = graph.without_access_checks();
            scope
                .set_generated_parameter(room, "area", "m²", 4.0)
                .expect("relaxed");
        }
        assert!(graph.access_checks_enabled());

        let parameter = graph.get(room).expect("room").parameter("area").expect("area");
        assert!(parameter.generated);
        assert_eq!(parameter.value, 4.0);

        // Users cannot overwrite a generated parameter.
        assert!(graph.set_parameter(room, "area", "m²", 1.0).is_err());
    }

    #[test]
    fn nested_scopes_restore_previous_state() {
        let mut graph = SemanticGraph::new();
        {
            let mut outer = graph.without_access_checks();
            {
                let inner = outer.without_access_checks();
                assert!(!inner.access_checks_enabled());
            }
            assert!(!outer.access_checks_enabled());
        }
        assert!(graph.access_checks_enabled());
    }

    #[test]
    fn removing_a_missing_instance_is_fatal() {
        let mut graph = SemanticGraph::new();
        let wall = graph
            .add_component("wall", InstanceType::Surface, None)
            .expect("add");
        let mut scope = graph.without_access_checks();
        let error = scope
            .remove_instance(wall, reference(9))
            .expect_err("nothing to remove");
        assert!(error.is_fatal());

        scope.add_instance(wall, "wall", reference(9)).expect("add");
        scope.remove_instance(wall, reference(9)).expect("remove");
    }

    #[test]
    fn removing_the_last_placement_removes_the_instance() {
        let mut graph = SemanticGraph::new();
        let pipe = graph
            .add_component("pipe", InstanceType::Line, None)
            .expect("add");
        let mut scope = graph.without_access_checks();
        scope.add_instance(pipe, "pipe", reference(3)).expect("add");
        scope
            .get_mut(pipe)
            .expect("pipe")
            .instances[0]
            .placements
            .push(Placement {
                reference: reference(4),
                state: PlacementState::Valid,
            });

        let removed = scope.remove_placement(pipe, reference(3)).expect("first");
        assert_eq!(removed.reference, reference(3));
        let instance = &scope.get(pipe).expect("pipe").instances[0];
        assert!(!instance.is_placed_at(reference(3)));
        assert_eq!(instance.revision, 1);

        scope.remove_placement(pipe, reference(4)).expect("last");
        assert!(scope.get(pipe).expect("pipe").instances.is_empty());

        let error = scope
            .remove_placement(pipe, reference(4))
            .expect_err("nothing left");
        assert_eq!(
            error,
            BinderyError::PlacementNotRemoved {
                entity: pipe,
                reference: reference(4)
            }
        );
        assert!(error.is_fatal());
    }

    #[test]
    fn delete_component_reports_children_first() {
        let mut graph = SemanticGraph::new();
        let building = graph
            .add_component("building", InstanceType::None, None)
            .expect("add");
        let floor = graph
            .add_component("floor", InstanceType::Volume, Some(building))
            .expect("add");
        let room = graph
            .add_component("room", InstanceType::Volume, Some(floor))
            .expect("add");

        let doomed = graph.delete_component(floor).expect("delete");

        assert_eq!(doomed, vec![room, floor]);
        assert_eq!(
            graph.take_events(),
            vec![
                SemanticEvent::ComponentDeleting(room),
                SemanticEvent::ComponentDeleting(floor)
            ]
        );
        // Nothing is freed before the notifications are handled.
        assert!(graph.contains(room) && graph.is_deleting(room));
        assert_eq!(graph.get(building).expect("building").children, vec![floor]);

        assert!(graph.release_deleted(room));
        assert!(graph.release_deleted(floor));
        assert!(!graph.release_deleted(floor));
        assert!(!graph.contains(room) && !graph.contains(floor));
        assert!(graph.get(building).expect("building").children.is_empty());
    }

    #[test]
    fn deleting_twice_raises_once() {
        let mut graph = SemanticGraph::new();
        let floor = graph
            .add_component("floor", InstanceType::Volume, None)
            .expect("add");
        let room = graph
            .add_component("room", InstanceType::Volume, Some(floor))
            .expect("add");

        graph.delete_component(room).expect("room");
        assert_eq!(
            graph.delete_component(room),
            Err(BinderyError::EntityNotFound(room))
        );
        assert_eq!(graph.delete_component(floor).expect("floor"), vec![floor]);
        assert_eq!(graph.take_events().len(), 2);
        // Live components are never released.
        let other = graph
            .add_component("other", InstanceType::Volume, None)
            .expect("add");
        assert!(!graph.release_deleted(other));
    }

    #[test]
    fn transform_change_carries_origin_once() {
        let mut graph = SemanticGraph::new();
        let pump = graph
            .add_component("pump", InstanceType::NetworkNode, None)
            .expect("add");
        graph
            .without_access_checks()
            .add_instance(pump, "pump", reference(1))
            .expect("instance");

        let transform = InstanceTransform {
            size: Vec3::new(2.0, 1.0, 1.0),
            rotation: Vec3::ZERO,
        };
        graph
            .set_instance_transform(pump, reference(1), transform, None)
            .expect("set");
        graph
            .set_instance_transform(pump, reference(1), transform, None)
            .expect("same value");

        assert_eq!(graph.take_events().len(), 1);
    }
}
