//! # Geometric Model
//!
//! In-memory boundary-representation kernel: an arena of primitives keyed by
//! `GeometryId`, with referential integrity and a change-notification outbox.
//!
//! Mutations never call listeners directly. They append [`GeometryEvent`]s to
//! an outbox that the exchange drains and dispatches, so a listener can never
//! observe the model half-way through a mutation.
//!
//! Structural edits may be wrapped in a batch (see [`GeometryModel::batch`]).
//! Changes raised inside a batch are coalesced and published once, when the
//! outermost batch is released.

use super::primitive::{GeometryKind, Orientation, Primitive, Shape};
use crate::proxy::ProxyMesh;
use crate::{
    BinderyError, ColorSource, GeometricReference, GeometryId, ModelId, PropagationToken, Vec3,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::ops::{Deref, DerefMut};

// =============================================================================
// EVENTS
// =============================================================================

/// Category of a model change notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeometryEventKind {
    /// Attribute changes (positions, colors, proxy transforms), including
    /// every primitive that transitively depends on a changed one.
    GeometryChanged(Vec<GeometryId>),
    /// Structural changes (added primitives, rewired references).
    TopologyChanged(Vec<GeometryId>),
    /// Name changes.
    Renamed(Vec<GeometryId>),
    /// Removed primitives, in removal order.
    Removed(Vec<GeometryId>),
    /// The model replaced another one (e.g. the geometry file was reloaded).
    ModelReplaced { old: ModelId, new: ModelId },
}

/// A change notification raised by a [`GeometryModel`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeometryEvent {
    pub model: ModelId,
    pub kind: GeometryEventKind,
    /// Set when the write was performed on behalf of a propagation chain.
    pub origin: Option<PropagationToken>,
}

#[derive(Debug, Clone, Default)]
struct PendingChanges {
    geometry: BTreeSet<GeometryId>,
    topology: BTreeSet<GeometryId>,
    renamed: BTreeSet<GeometryId>,
    removed: Vec<GeometryId>,
}

impl PendingChanges {
    fn is_empty(&self) -> bool {
        self.geometry.is_empty()
            && self.topology.is_empty()
            && self.renamed.is_empty()
            && self.removed.is_empty()
    }
}

// =============================================================================
// MODEL
// =============================================================================

/// A geometric model (one geometry file).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeometryModel {
    id: ModelId,
    name: String,
    primitives: BTreeMap<GeometryId, Primitive>,
    next_id: u64,
    #[serde(skip)]
    batch_depth: usize,
    #[serde(skip)]
    pending: PendingChanges,
    #[serde(skip)]
    events: Vec<GeometryEvent>,
}

impl GeometryModel {
    /// Create an empty model.
    #[must_use]
    pub fn new(id: ModelId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            primitives: BTreeMap::new(),
            next_id: 1,
            batch_depth: 0,
            pending: PendingChanges::default(),
            events: Vec::new(),
        }
    }

    #[must_use]
    pub fn id(&self) -> ModelId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Reference to a primitive of this model.
    #[must_use]
    pub fn reference(&self, id: GeometryId) -> GeometricReference {
        GeometricReference::new(self.id, id)
    }

    /// Look up a primitive.
    #[must_use]
    pub fn geometry_from_id(&self, id: GeometryId) -> Option<&Primitive> {
        self.primitives.get(&id)
    }

    /// Look up a primitive, failing with `GeometryNotFound`.
    pub fn get(&self, id: GeometryId) -> Result<&Primitive, BinderyError> {
        self.primitives
            .get(&id)
            .ok_or(BinderyError::GeometryNotFound(self.reference(id)))
    }

    /// Resolve a reference, failing if it points into another model.
    pub fn resolve(&self, reference: GeometricReference) -> Result<&Primitive, BinderyError> {
        if reference.model != self.id {
            return Err(BinderyError::CrossModelReference {
                expected: self.id,
                found: reference.model,
            });
        }
        self.get(reference.geometry)
    }

    #[must_use]
    pub fn contains(&self, id: GeometryId) -> bool {
        self.primitives.contains_key(&id)
    }

    /// All primitives in identifier order.
    pub fn primitives(&self) -> impl Iterator<Item = &Primitive> {
        self.primitives.values()
    }

    /// Identifiers of all primitives of one kind, in identifier order.
    #[must_use]
    pub fn ids_of_kind(&self, kind: GeometryKind) -> Vec<GeometryId> {
        self.primitives
            .values()
            .filter(|p| p.kind() == kind)
            .map(|p| p.id)
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.primitives.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.primitives.is_empty()
    }

    /// Primitives that directly reference `id`.
    #[must_use]
    pub fn referrers(&self, id: GeometryId) -> Vec<GeometryId> {
        self.primitives
            .values()
            .filter(|p| p.references_id(id))
            .map(|p| p.id)
            .collect()
    }

    /// `id` plus every primitive that transitively depends on it.
    ///
    /// A vertex's proxy is attached to the vertex rather than built from it,
    /// so the walk does not climb from a proxy to its vertex.
    #[must_use]
    pub fn dependents_closure(&self, id: GeometryId) -> BTreeSet<GeometryId> {
        let mut seen = BTreeSet::new();
        let mut queue = VecDeque::from([id]);
        while let Some(current) = queue.pop_front() {
            if !seen.insert(current) {
                continue;
            }
            let is_proxy = self
                .primitives
                .get(&current)
                .is_some_and(|p| p.kind() == GeometryKind::ProxyShape);
            if is_proxy {
                continue;
            }
            queue.extend(self.referrers(current));
        }
        seen
    }

    // =========================================================================
    // CREATION
    // =========================================================================

    /// Add a vertex.
    pub fn add_vertex(&mut self, name: impl Into<String>, position: Vec3) -> GeometryId {
        self.insert(
            name.into(),
            Shape::Vertex {
                position,
                proxy: None,
            },
        )
    }

    /// Add an edge between two existing vertices.
    pub fn add_edge(
        &mut self,
        name: impl Into<String>,
        start: GeometryId,
        end: GeometryId,
    ) -> Result<GeometryId, BinderyError> {
        self.expect_kind(start, GeometryKind::Vertex)?;
        self.expect_kind(end, GeometryKind::Vertex)?;
        Ok(self.insert(name.into(), Shape::Edge { start, end }))
    }

    /// Add a closed loop over existing edges.
    pub fn add_edge_loop(
        &mut self,
        name: impl Into<String>,
        edges: Vec<GeometryId>,
    ) -> Result<GeometryId, BinderyError> {
        self.expect_all(&edges, GeometryKind::Edge)?;
        if edges.is_empty() {
            return Err(BinderyError::InvalidTopology(
                "an edge loop needs at least one edge".to_string(),
            ));
        }
        Ok(self.insert(name.into(), Shape::EdgeLoop { edges }))
    }

    /// Add a face bounded by an existing loop, with optional hole loops.
    pub fn add_face(
        &mut self,
        name: impl Into<String>,
        boundary: GeometryId,
        holes: Vec<GeometryId>,
    ) -> Result<GeometryId, BinderyError> {
        self.expect_kind(boundary, GeometryKind::EdgeLoop)?;
        self.expect_all(&holes, GeometryKind::EdgeLoop)?;
        Ok(self.insert(name.into(), Shape::Face { boundary, holes }))
    }

    /// Add a volume enclosed by existing faces.
    pub fn add_volume(
        &mut self,
        name: impl Into<String>,
        faces: Vec<(GeometryId, Orientation)>,
    ) -> Result<GeometryId, BinderyError> {
        let ids: Vec<_> = faces.iter().map(|(face, _)| *face).collect();
        self.expect_all(&ids, GeometryKind::Face)?;
        Ok(self.insert(name.into(), Shape::Volume { faces }))
    }

    /// Add an open polyline over existing edges.
    pub fn add_polyline(
        &mut self,
        name: impl Into<String>,
        edges: Vec<GeometryId>,
    ) -> Result<GeometryId, BinderyError> {
        self.expect_all(&edges, GeometryKind::Edge)?;
        if edges.is_empty() {
            return Err(BinderyError::InvalidTopology(
                "a polyline needs at least one edge".to_string(),
            ));
        }
        Ok(self.insert(name.into(), Shape::Polyline { edges }))
    }

    /// Add a proxy shape and attach it to `vertex`.
    ///
    /// A vertex carries at most one proxy.
    pub fn add_proxy(
        &mut self,
        name: impl Into<String>,
        vertex: GeometryId,
        size: Vec3,
        rotation: Vec3,
        mesh: ProxyMesh,
    ) -> Result<GeometryId, BinderyError> {
        if self.attached_proxy(vertex)?.is_some() {
            return Err(BinderyError::InvalidTopology(format!(
                "{vertex} already carries a proxy shape"
            )));
        }
        let proxy = self.insert(
            name.into(),
            Shape::ProxyShape {
                size,
                rotation,
                mesh,
            },
        );
        if let Some(Primitive {
            shape: Shape::Vertex { proxy: slot, .. },
            ..
        }) = self.primitives.get_mut(&vertex)
        {
            *slot = Some(proxy);
        }
        self.touch_topology(vertex);
        Ok(proxy)
    }

    /// Insert a fully-formed primitive under a caller-chosen identifier.
    ///
    /// Used when a model is loaded from a document; references must already
    /// resolve inside the model.
    pub fn insert_primitive(&mut self, primitive: Primitive) -> Result<(), BinderyError> {
        if self.primitives.contains_key(&primitive.id) {
            return Err(BinderyError::InvalidTopology(format!(
                "{} already exists in {}",
                primitive.id, self.id
            )));
        }
        for reference in primitive.references() {
            if !self.primitives.contains_key(&reference) {
                return Err(BinderyError::GeometryNotFound(self.reference(reference)));
            }
        }
        let id = primitive.id;
        self.next_id = self.next_id.max(id.0.saturating_add(1));
        self.primitives.insert(id, primitive);
        self.touch_topology(id);
        Ok(())
    }

    // =========================================================================
    // MUTATION
    // =========================================================================

    /// Remove a primitive that nothing references any more.
    pub fn remove(&mut self, id: GeometryId) -> Result<Primitive, BinderyError> {
        if !self.primitives.contains_key(&id) {
            return Err(BinderyError::GeometryNotFound(self.reference(id)));
        }
        let referrers = self.referrers(id);
        if !referrers.is_empty() {
            return Err(BinderyError::InvalidTopology(format!(
                "{id} is still referenced by {referrers:?}"
            )));
        }
        let removed = self
            .primitives
            .remove(&id)
            .ok_or(BinderyError::GeometryNotFound(self.reference(id)))?;
        self.pending.removed.push(id);
        self.publish_if_idle();
        Ok(removed)
    }

    /// Move a vertex; every dependent primitive is reported as changed.
    pub fn set_vertex_position(
        &mut self,
        vertex: GeometryId,
        position: Vec3,
    ) -> Result<(), BinderyError> {
        let reference = self.reference(vertex);
        match self.primitives.get_mut(&vertex) {
            Some(Primitive {
                shape: Shape::Vertex { position: slot, .. },
                ..
            }) => {
                if *slot == position {
                    return Ok(());
                }
                *slot = position;
            }
            Some(other) => return Err(kind_error(other, GeometryKind::Vertex)),
            None => return Err(BinderyError::GeometryNotFound(reference)),
        }
        self.touch_geometry(vertex, None);
        Ok(())
    }

    /// Rename a primitive.
    pub fn set_name(&mut self, id: GeometryId, name: impl Into<String>) -> Result<(), BinderyError> {
        let reference = self.reference(id);
        let primitive = self
            .primitives
            .get_mut(&id)
            .ok_or(BinderyError::GeometryNotFound(reference))?;
        let name = name.into();
        if primitive.name == name {
            return Ok(());
        }
        primitive.name = name;
        primitive.touch();
        self.pending.renamed.insert(id);
        self.publish_if_idle();
        Ok(())
    }

    /// Change how a primitive is colored.
    pub fn set_color(&mut self, id: GeometryId, color: ColorSource) -> Result<(), BinderyError> {
        let reference = self.reference(id);
        let primitive = self
            .primitives
            .get_mut(&id)
            .ok_or(BinderyError::GeometryNotFound(reference))?;
        if primitive.color == color {
            return Ok(());
        }
        primitive.color = color;
        primitive.touch();
        self.pending.geometry.insert(id);
        self.publish_if_idle();
        Ok(())
    }

    /// Change the size and rotation of a proxy shape.
    ///
    /// `origin` is copied onto the raised event so the initiating binding can
    /// recognise its own echo.
    pub fn set_proxy_transform(
        &mut self,
        proxy: GeometryId,
        size: Vec3,
        rotation: Vec3,
        origin: Option<PropagationToken>,
    ) -> Result<(), BinderyError> {
        let reference = self.reference(proxy);
        match self.primitives.get_mut(&proxy) {
            Some(Primitive {
                shape:
                    Shape::ProxyShape {
                        size: size_slot,
                        rotation: rotation_slot,
                        ..
                    },
                ..
            }) => {
                if *size_slot == size && *rotation_slot == rotation {
                    return Ok(());
                }
                *size_slot = size;
                *rotation_slot = rotation;
            }
            Some(other) => return Err(kind_error(other, GeometryKind::ProxyShape)),
            None => return Err(BinderyError::GeometryNotFound(reference)),
        }
        self.touch_geometry(proxy, origin);
        Ok(())
    }

    /// Replace the mesh carried by a proxy shape.
    pub fn set_proxy_mesh(&mut self, proxy: GeometryId, mesh: ProxyMesh) -> Result<(), BinderyError> {
        let reference = self.reference(proxy);
        match self.primitives.get_mut(&proxy) {
            Some(Primitive {
                shape: Shape::ProxyShape { mesh: slot, .. },
                ..
            }) => {
                if *slot == mesh {
                    return Ok(());
                }
                *slot = mesh;
            }
            Some(other) => return Err(kind_error(other, GeometryKind::ProxyShape)),
            None => return Err(BinderyError::GeometryNotFound(reference)),
        }
        self.touch_geometry(proxy, None);
        Ok(())
    }

    /// Rewire an edge onto two (possibly different) vertices.
    pub fn set_edge_endpoints(
        &mut self,
        edge: GeometryId,
        start: GeometryId,
        end: GeometryId,
    ) -> Result<(), BinderyError> {
        self.expect_kind(start, GeometryKind::Vertex)?;
        self.expect_kind(end, GeometryKind::Vertex)?;
        let reference = self.reference(edge);
        match self.primitives.get_mut(&edge) {
            Some(Primitive {
                shape:
                    Shape::Edge {
                        start: start_slot,
                        end: end_slot,
                    },
                ..
            }) => {
                if *start_slot == start && *end_slot == end {
                    return Ok(());
                }
                *start_slot = start;
                *end_slot = end;
            }
            Some(other) => return Err(kind_error(other, GeometryKind::Edge)),
            None => return Err(BinderyError::GeometryNotFound(reference)),
        }
        self.touch_topology(edge);
        Ok(())
    }

    /// Replace the edge sequence of a polyline.
    pub fn set_polyline_edges(
        &mut self,
        polyline: GeometryId,
        edges: Vec<GeometryId>,
    ) -> Result<(), BinderyError> {
        self.expect_all(&edges, GeometryKind::Edge)?;
        let reference = self.reference(polyline);
        match self.primitives.get_mut(&polyline) {
            Some(Primitive {
                shape: Shape::Polyline { edges: slot },
                ..
            }) => {
                if *slot == edges {
                    return Ok(());
                }
                *slot = edges;
            }
            Some(other) => return Err(kind_error(other, GeometryKind::Polyline)),
            None => return Err(BinderyError::GeometryNotFound(reference)),
        }
        self.touch_topology(polyline);
        Ok(())
    }

    /// Detach the proxy of a vertex without removing the proxy itself.
    pub fn detach_proxy(&mut self, vertex: GeometryId) -> Result<Option<GeometryId>, BinderyError> {
        let reference = self.reference(vertex);
        let detached = match self.primitives.get_mut(&vertex) {
            Some(Primitive {
                shape: Shape::Vertex { proxy, .. },
                ..
            }) => proxy.take(),
            Some(other) => return Err(kind_error(other, GeometryKind::Vertex)),
            None => return Err(BinderyError::GeometryNotFound(reference)),
        };
        if detached.is_some() {
            self.touch_topology(vertex);
        }
        Ok(detached)
    }

    /// The proxy shape attached to a vertex, if any.
    pub fn attached_proxy(&self, vertex: GeometryId) -> Result<Option<GeometryId>, BinderyError> {
        match self.get(vertex)? {
            Primitive {
                shape: Shape::Vertex { proxy, .. },
                ..
            } => Ok(*proxy),
            other => Err(kind_error(other, GeometryKind::Vertex)),
        }
    }

    // =========================================================================
    // BATCHING & EVENTS
    // =========================================================================

    /// Begin a batch; nested calls must be balanced by [`Self::end_batch_operation`].
    pub fn start_batch_operation(&mut self) {
        self.batch_depth = self.batch_depth.saturating_add(1);
    }

    /// End a batch; the outermost end publishes the coalesced changes.
    pub fn end_batch_operation(&mut self) -> Result<(), BinderyError> {
        if self.batch_depth == 0 {
            return Err(BinderyError::InvalidTopology(
                "batch operation ended without a matching start".to_string(),
            ));
        }
        self.batch_depth -= 1;
        self.publish_if_idle();
        Ok(())
    }

    /// Whether a batch is currently open.
    #[must_use]
    pub fn in_batch(&self) -> bool {
        self.batch_depth > 0
    }

    /// Open a scoped batch that is released when the returned guard drops,
    /// on every exit path.
    pub fn batch(&mut self) -> BatchScope<'_> {
        self.start_batch_operation();
        BatchScope { model: self }
    }

    /// Announce that this model took the place of `old`.
    pub fn notify_replaced(&mut self, old: ModelId) {
        self.events.push(GeometryEvent {
            model: self.id,
            kind: GeometryEventKind::ModelReplaced { old, new: self.id },
            origin: None,
        });
    }

    /// Drain the outbox.
    pub fn take_events(&mut self) -> Vec<GeometryEvent> {
        std::mem::take(&mut self.events)
    }

    #[must_use]
    pub fn has_pending_events(&self) -> bool {
        !self.events.is_empty()
    }

    fn insert(&mut self, name: String, shape: Shape) -> GeometryId {
        let id = GeometryId(self.next_id);
        self.next_id = self.next_id.saturating_add(1);
        self.primitives.insert(id, Primitive::new(id, name, shape));
        self.touch_topology(id);
        id
    }

    fn touch_topology(&mut self, id: GeometryId) {
        for affected in self.dependents_closure(id) {
            if let Some(primitive) = self.primitives.get_mut(&affected) {
                primitive.touch();
            }
            self.pending.topology.insert(affected);
        }
        self.publish_if_idle();
    }

    fn touch_geometry(&mut self, id: GeometryId, origin: Option<PropagationToken>) {
        for affected in self.dependents_closure(id) {
            if let Some(primitive) = self.primitives.get_mut(&affected) {
                primitive.touch();
            }
            self.pending.geometry.insert(affected);
        }
        if self.batch_depth == 0 && origin.is_some() {
            let ids = std::mem::take(&mut self.pending.geometry);
            self.events.push(GeometryEvent {
                model: self.id,
                kind: GeometryEventKind::GeometryChanged(ids.into_iter().collect()),
                origin,
            });
        }
        self.publish_if_idle();
    }

    fn publish_if_idle(&mut self) {
        if self.batch_depth > 0 || self.pending.is_empty() {
            return;
        }
        let pending = std::mem::take(&mut self.pending);
        let removed: BTreeSet<_> = pending.removed.iter().copied().collect();
        let live = |ids: BTreeSet<GeometryId>| -> Vec<GeometryId> {
            ids.into_iter().filter(|id| !removed.contains(id)).collect()
        };

        let mut publish = |kind: GeometryEventKind| {
            self.events.push(GeometryEvent {
                model: self.id,
                kind,
                origin: None,
            });
        };
        if !pending.removed.is_empty() {
            publish(GeometryEventKind::Removed(pending.removed));
        }
        let topology = live(pending.topology);
        if !topology.is_empty() {
            publish(GeometryEventKind::TopologyChanged(topology));
        }
        let geometry = live(pending.geometry);
        if !geometry.is_empty() {
            publish(GeometryEventKind::GeometryChanged(geometry));
        }
        let renamed = live(pending.renamed);
        if !renamed.is_empty() {
            publish(GeometryEventKind::Renamed(renamed));
        }
    }

    fn expect_kind(&self, id: GeometryId, kind: GeometryKind) -> Result<(), BinderyError> {
        let primitive = self.get(id)?;
        if primitive.kind() == kind {
            Ok(())
        } else {
            Err(kind_error(primitive, kind))
        }
    }

    fn expect_all(&self, ids: &[GeometryId], kind: GeometryKind) -> Result<(), BinderyError> {
        ids.iter().try_for_each(|id| self.expect_kind(*id, kind))
    }
}

fn kind_error(primitive: &Primitive, expected: GeometryKind) -> BinderyError {
    BinderyError::InvalidTopology(format!(
        "{} is a {:?}, expected a {:?}",
        primitive.id,
        primitive.kind(),
        expected
    ))
}

// =============================================================================
// BATCH SCOPE
// =============================================================================

/// RAII batch acquisition returned by [`GeometryModel::batch`].
///
/// Dereferences to the model; dropping it ends the batch.
#[derive(Debug)]
pub struct BatchScope<'a> {
    model: &'a mut GeometryModel,
}

impl Deref for BatchScope<'_> {
    type Target = GeometryModel;

    fn deref(&self) -> &GeometryModel {
        self.model
    }
}

impl DerefMut for BatchScope<'_> {
    fn deref_mut(&mut self) -> &mut GeometryModel {
        self.model
    }
}

impl Drop for BatchScope<'_> {
    fn drop(&mut self) {
        // The scope was opened by `batch()`, so the depth is at least one.
        let _ = self.model.end_batch_operation();
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn square(model: &mut GeometryModel) -> (Vec<GeometryId>, GeometryId) {
        let corners = [
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(1.0, 1.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
        ];
        let vertices: Vec<_> = corners
            .iter()
            .map(|c| model.add_vertex("v", *c))
            .collect();
        let edges: Vec<_> = (0..4)
            .map(|i| {
                model
                    .add_edge("e", vertices[i], vertices[(i + 1) % 4])
                    .expect("edge")
            })
            .collect();
        let edge_loop = model.add_edge_loop("loop", edges).expect("loop");
        (vertices, edge_loop)
    }

    #[test]
    fn referenced_primitive_cannot_be_removed() {
        let mut model = GeometryModel::new(ModelId(1), "m");
        let (vertices, edge_loop) = square(&mut model);

        let result = model.remove(vertices[0]);
        assert!(matches!(result, Err(BinderyError::InvalidTopology(_))));

        model.remove(edge_loop).expect("loop is unreferenced");
        assert!(!model.contains(edge_loop));
    }

    #[test]
    fn moving_a_vertex_reports_its_dependents() {
        let mut model = GeometryModel::new(ModelId(1), "m");
        let (vertices, edge_loop) = square(&mut model);
        model.take_events();

        model
            .set_vertex_position(vertices[0], Vec3::new(-1.0, 0.0, 0.0))
            .expect("move");

        let events = model.take_events();
        assert_eq!(events.len(), 1);
        let GeometryEventKind::GeometryChanged(ids) = &events[0].kind else {
            unreachable!("expected a geometry change");
        };
        assert!(ids.contains(&vertices[0]));
        assert!(ids.contains(&edge_loop));
    }

    #[test]
    fn batch_coalesces_notifications() {
        let mut model = GeometryModel::new(ModelId(1), "m");
        {
            let mut batch = model.batch();
            let a = batch.add_vertex("a", Vec3::ZERO);
            let b = batch.add_vertex("b", Vec3::ONE);
            {
                let mut nested = batch.batch();
                nested.add_edge("ab", a, b).expect("edge");
            }
            assert!(!batch.has_pending_events());
        }
        let events = model.take_events();
        assert_eq!(events.len(), 1);
        assert!(matches!(
            &events[0].kind,
            GeometryEventKind::TopologyChanged(ids) if ids.len() == 3
        ));
        assert!(!model.in_batch());
    }

    #[test]
    fn unbalanced_batch_end_is_rejected() {
        let mut model = GeometryModel::new(ModelId(1), "m");
        assert!(model.end_batch_operation().is_err());
    }

    #[test]
    fn resolve_rejects_foreign_references() {
        let mut model = GeometryModel::new(ModelId(1), "m");
        let v = model.add_vertex("v", Vec3::ZERO);
        let foreign = GeometricReference::new(ModelId(2), v);
        assert!(matches!(
            model.resolve(foreign),
            Err(BinderyError::CrossModelReference { .. })
        ));
    }

    #[test]
    fn proxy_transform_event_carries_origin() {
        use crate::{ElementId, PropagationDirection};

        let mut model = GeometryModel::new(ModelId(1), "m");
        let v = model.add_vertex("v", Vec3::ZERO);
        let proxy = model
            .add_proxy("p", v, Vec3::ONE, Vec3::ZERO, ProxyMesh::cube())
            .expect("proxy");
        model.take_events();

        let token = PropagationToken::new(ElementId(4), PropagationDirection::InstanceToProxy);
        model
            .set_proxy_transform(proxy, Vec3::new(2.0, 2.0, 2.0), Vec3::ZERO, Some(token))
            .expect("transform");

        let events = model.take_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].origin, Some(token));

        // Writing the same values again is not a change.
        model
            .set_proxy_transform(proxy, Vec3::new(2.0, 2.0, 2.0), Vec3::ZERO, None)
            .expect("transform");
        assert!(model.take_events().is_empty());
    }
}
