//! # Network Mirror
//!
//! Represents one flow network inside one geometric model.
//!
//! Every node gets a vertex (with a proxy shape), every edge a polyline over
//! its own edge primitive. The mirror owns a binding per element, keyed by
//! the primitive it owns, and rebuilds the whole representation in
//! [`NetworkMirror::update`]:
//!
//! 1. Snapshot the bindings and clear the live map.
//! 2. Resolve or create a vertex for every node, recursively through nested
//!    sub-networks, carrying bindings over from the snapshot.
//! 3. The same for every edge, between the vertices of its resolved ends.
//! 4. Purge geometry no binding reaches, in dependency order.
//! 5. Dispose the bindings left in the snapshot.
//!
//! Steps 2–4 run inside one model batch, so listeners see one coalesced
//! notification per pass.

use crate::connector::SyncContext;
use crate::element::{EdgeBinding, ElementBinding, NodeBinding};
use crate::geometry::topology::{edge_endpoints, polyline_edges};
use crate::geometry::{GeometryEvent, GeometryEventKind, GeometryKind};
use crate::network::{ElementKind, NetworkEvent, NetworkEventKind, NetworkGraph};
use crate::semantic::SemanticGraph;
use crate::{
    BinderyError, ElementId, EntityId, GeometricReference, GeometryId, ModelId, PropagationToken,
    Vec3,
};
use std::collections::{BTreeMap, BTreeSet};
use tracing::info;

// =============================================================================
// MIRROR
// =============================================================================

/// Keeps a [`NetworkGraph`] represented in one geometric model.
#[derive(Debug)]
pub struct NetworkMirror {
    model: ModelId,
    network: NetworkGraph,
    bindings: BTreeMap<GeometryId, ElementBinding>,
    by_element: BTreeMap<ElementId, GeometryId>,
    /// Networks whose notifications this mirror reacts to.
    watched: BTreeSet<ElementId>,
    passes: u64,
}

/// Working state of one [`NetworkMirror::update`] pass.
#[derive(Default)]
struct Pass {
    snapshot: BTreeMap<ElementId, ElementBinding>,
    warnings: Vec<String>,
}

impl NetworkMirror {
    /// Create a mirror. Nothing is built until the first [`Self::update`].
    #[must_use]
    pub fn new(model: ModelId, network: NetworkGraph) -> Self {
        Self {
            model,
            network,
            bindings: BTreeMap::new(),
            by_element: BTreeMap::new(),
            watched: BTreeSet::new(),
            passes: 0,
        }
    }

    #[must_use]
    pub fn model(&self) -> ModelId {
        self.model
    }

    #[must_use]
    pub fn network(&self) -> &NetworkGraph {
        &self.network
    }

    /// Edit the network. Changes take effect when the exchange next pumps
    /// the network's notifications.
    pub fn network_mut(&mut self) -> &mut NetworkGraph {
        &mut self.network
    }

    /// Bindings keyed by the primitive they own.
    #[must_use]
    pub fn bindings(&self) -> &BTreeMap<GeometryId, ElementBinding> {
        &self.bindings
    }

    #[must_use]
    pub fn binding_for_element(&self, element: ElementId) -> Option<&ElementBinding> {
        self.by_element
            .get(&element)
            .and_then(|primitive| self.bindings.get(primitive))
    }

    #[must_use]
    pub fn node_binding(&self, element: ElementId) -> Option<&NodeBinding> {
        match self.binding_for_element(element) {
            Some(ElementBinding::Node(binding)) => Some(binding),
            _ => None,
        }
    }

    /// Number of completed [`Self::update`] passes.
    #[must_use]
    pub fn passes(&self) -> u64 {
        self.passes
    }

    #[must_use]
    pub fn watched_networks(&self) -> &BTreeSet<ElementId> {
        &self.watched
    }

    /// Drain the network's outbox.
    pub fn take_network_events(&mut self) -> Vec<NetworkEvent> {
        self.network.take_events()
    }

    /// (content, primitive) pairs currently bound by this mirror.
    #[must_use]
    pub fn bound_content(&self) -> Vec<(EntityId, GeometricReference)> {
        self.bindings
            .values()
            .filter_map(|binding| {
                let connector = binding.connector();
                connector.source().map(|entity| (entity, connector.target()))
            })
            .collect()
    }

    // =========================================================================
    // FULL UPDATE
    // =========================================================================

    /// Rebuild the representation of the whole network.
    ///
    /// Import failures and unresolvable sub-network boundaries are reported
    /// once, as one batch of warnings, when the pass ends.
    pub fn update(&mut self, cx: &mut SyncContext<'_>) -> Result<(), BinderyError> {
        if cx.model.id() != self.model {
            return Err(BinderyError::CrossModelReference {
                expected: self.model,
                found: cx.model.id(),
            });
        }

        let mut pass = Pass::default();
        for (_, binding) in std::mem::take(&mut self.bindings) {
            pass.snapshot.insert(binding.element(), binding);
        }
        self.by_element.clear();

        let root = self.network.root();
        cx.batched(|cx| {
            self.ensure_nodes(cx, &mut pass, root)?;
            self.ensure_edges(cx, &mut pass, root)?;
            self.purge(cx)
        })?;

        for (_, mut binding) in std::mem::take(&mut pass.snapshot) {
            binding.before_deletion(cx.semantic)?;
        }

        if !pass.warnings.is_empty() {
            cx.warnings.report_warnings(&pass.warnings);
        }
        self.watched = self.network.networks().into_iter().collect();
        self.passes = self.passes.saturating_add(1);
        info!(
            model = %self.model,
            bindings = self.bindings.len(),
            primitives = cx.model.len(),
            warnings = pass.warnings.len(),
            "network mirrored"
        );
        Ok(())
    }

    fn ensure_nodes(
        &mut self,
        cx: &mut SyncContext<'_>,
        pass: &mut Pass,
        network: ElementId,
    ) -> Result<(), BinderyError> {
        let children = self.network.get(network)?.children().to_vec();
        for child in children {
            match self.network.get(child)?.kind() {
                ElementKind::Node => self.ensure_node(cx, pass, child)?,
                ElementKind::Network => self.ensure_nodes(cx, pass, child)?,
                ElementKind::Edge => {}
            }
        }
        Ok(())
    }

    fn ensure_node(
        &mut self,
        cx: &mut SyncContext<'_>,
        pass: &mut Pass,
        node: ElementId,
    ) -> Result<(), BinderyError> {
        let element = self.network.get(node)?;
        let position = element.position().unwrap_or(Vec3::ZERO) * cx.config.network_scale;
        let name = element.name.clone();

        let vertex = match self.reusable(cx, element.representation, GeometryKind::Vertex)? {
            Some(vertex) => {
                cx.model.set_vertex_position(vertex, position)?;
                vertex
            }
            None => cx.model.add_vertex(name, position),
        };
        let reference = cx.model.reference(vertex);
        self.network.set_representation(node, Some(reference))?;

        let mut binding = match pass.snapshot.remove(&node) {
            Some(ElementBinding::Node(mut binding)) => {
                binding.retarget(cx.semantic, reference)?;
                binding
            }
            other => {
                if let Some(mut stale) = other {
                    stale.before_deletion(cx.semantic)?;
                }
                NodeBinding::new(node, reference)
            }
        };
        let warnings = binding.synchronize(cx, &self.network)?;
        pass.warnings.extend(warnings);

        self.bindings.insert(vertex, ElementBinding::Node(binding));
        self.by_element.insert(node, vertex);
        Ok(())
    }

    fn ensure_edges(
        &mut self,
        cx: &mut SyncContext<'_>,
        pass: &mut Pass,
        network: ElementId,
    ) -> Result<(), BinderyError> {
        let children = self.network.get(network)?.children().to_vec();
        for child in children {
            match self.network.get(child)?.kind() {
                ElementKind::Edge => self.ensure_edge(cx, pass, child)?,
                ElementKind::Network => self.ensure_edges(cx, pass, child)?,
                ElementKind::Node => {}
            }
        }
        Ok(())
    }

    fn ensure_edge(
        &mut self,
        cx: &mut SyncContext<'_>,
        pass: &mut Pass,
        edge: ElementId,
    ) -> Result<(), BinderyError> {
        let element = self.network.get(edge)?;
        let name = element.name.clone();
        let representation = element.representation;

        let (start, end) = match self.edge_vertices(edge) {
            Ok(vertices) => vertices,
            Err(BinderyError::InvalidTopology(reason)) => {
                pass.warnings
                    .push(format!("edge '{name}' is not represented: {reason}"));
                self.network.set_representation(edge, None)?;
                return Ok(());
            }
            Err(error) => return Err(error),
        };

        let polyline = match self.reusable(cx, representation, GeometryKind::Polyline)? {
            Some(polyline) => polyline,
            None => {
                let segment = cx.model.add_edge(format!("{name} segment"), start, end)?;
                cx.model.add_polyline(name, vec![segment])?
            }
        };
        let reference = cx.model.reference(polyline);
        self.network.set_representation(edge, Some(reference))?;

        let mut binding = match pass.snapshot.remove(&edge) {
            Some(ElementBinding::Edge(mut binding)) => {
                binding.retarget(cx.semantic, reference)?;
                binding
            }
            other => {
                if let Some(mut stale) = other {
                    stale.before_deletion(cx.semantic)?;
                }
                EdgeBinding::new(edge, reference)
            }
        };
        binding.synchronize(cx, &self.network, start, end)?;

        self.bindings.insert(polyline, ElementBinding::Edge(binding));
        self.by_element.insert(edge, polyline);
        Ok(())
    }

    /// Vertices an edge runs between, through sub-network boundaries.
    fn edge_vertices(&self, edge: ElementId) -> Result<(GeometryId, GeometryId), BinderyError> {
        let (start, end) = self.network.get(edge)?.endpoints().ok_or_else(|| {
            BinderyError::InvalidTopology(format!("{edge} is not an edge"))
        })?;
        let start = self.network.resolve_start(start)?;
        let end = self.network.resolve_end(end)?;
        let vertex = |node: ElementId| {
            self.by_element.get(&node).copied().ok_or_else(|| {
                BinderyError::InvalidTopology(format!("{node} has no vertex"))
            })
        };
        Ok((vertex(start)?, vertex(end)?))
    }

    /// The primitive an element's representation points at, if it can be
    /// reused: it lives in this model, has the expected kind and is not
    /// owned by another binding yet.
    ///
    /// A representation inside another model is fatal.
    fn reusable(
        &self,
        cx: &SyncContext<'_>,
        representation: Option<GeometricReference>,
        kind: GeometryKind,
    ) -> Result<Option<GeometryId>, BinderyError> {
        let Some(reference) = representation else {
            return Ok(None);
        };
        if reference.model != self.model {
            return Err(BinderyError::CrossModelReference {
                expected: self.model,
                found: reference.model,
            });
        }
        let fits = cx
            .model
            .geometry_from_id(reference.geometry)
            .is_some_and(|p| p.kind() == kind)
            && !self.bindings.contains_key(&reference.geometry);
        Ok(fits.then_some(reference.geometry))
    }

    /// Remove every primitive no binding reaches.
    ///
    /// Volumes, faces and loops are never produced by the mirror and always
    /// go. The rest is removed top-down: polylines, then the edges they used,
    /// then vertices, then proxies attached to removed vertices.
    fn purge(&mut self, cx: &mut SyncContext<'_>) -> Result<(), BinderyError> {
        for kind in [GeometryKind::Volume, GeometryKind::Face, GeometryKind::EdgeLoop] {
            for id in cx.model.ids_of_kind(kind) {
                cx.model.remove(id)?;
            }
        }

        let mut live_polylines = BTreeSet::new();
        let mut live_vertices = BTreeSet::new();
        for (primitive, binding) in &self.bindings {
            match binding {
                ElementBinding::Node(_) => live_vertices.insert(*primitive),
                ElementBinding::Edge(_) => live_polylines.insert(*primitive),
            };
        }
        let mut live_edges = BTreeSet::new();
        for polyline in &live_polylines {
            for edge in polyline_edges(&*cx.model, *polyline)? {
                let (start, end) = edge_endpoints(&*cx.model, edge)?;
                live_vertices.insert(start);
                live_vertices.insert(end);
                live_edges.insert(edge);
            }
        }
        let mut live_proxies = BTreeSet::new();
        for vertex in &live_vertices {
            if let Some(proxy) = cx.model.attached_proxy(*vertex)? {
                live_proxies.insert(proxy);
            }
        }

        let stages = [
            (GeometryKind::Polyline, &live_polylines),
            (GeometryKind::Edge, &live_edges),
            (GeometryKind::Vertex, &live_vertices),
            (GeometryKind::ProxyShape, &live_proxies),
        ];
        let mut removed = 0usize;
        for (kind, live) in stages {
            for id in cx.model.ids_of_kind(kind) {
                if !live.contains(&id) {
                    cx.model.remove(id)?;
                    removed += 1;
                }
            }
        }
        if removed > 0 {
            tracing::debug!(model = %self.model, removed, "unreferenced geometry purged");
        }
        Ok(())
    }

    // =========================================================================
    // TARGETED UPDATES
    // =========================================================================

    /// React to the network's own notifications.
    ///
    /// Structural changes rebuild everything; redirects, content and name
    /// changes resynchronize just the element.
    pub fn handle_network_events(
        &mut self,
        cx: &mut SyncContext<'_>,
        events: &[NetworkEvent],
    ) -> Result<(), BinderyError> {
        let mut rebuild = false;
        let mut touched = BTreeSet::new();
        for event in events {
            if !self.watched.contains(&event.network) {
                continue;
            }
            match event.kind {
                NetworkEventKind::ElementAdded(_)
                | NetworkEventKind::ElementDeleted(_)
                | NetworkEventKind::TopologyChanged(_) => rebuild = true,
                NetworkEventKind::EdgeRedirected(id)
                | NetworkEventKind::ContentChanged(id)
                | NetworkEventKind::Renamed(id) => {
                    touched.insert(id);
                }
            }
        }
        if rebuild {
            return self.update(cx);
        }
        for element in touched {
            self.synchronize_element(cx, element)?;
        }
        Ok(())
    }

    /// Resynchronize one element; falls back to a full update when the
    /// element has no usable binding.
    fn synchronize_element(
        &mut self,
        cx: &mut SyncContext<'_>,
        element: ElementId,
    ) -> Result<(), BinderyError> {
        if !self.network.contains(element) {
            return Ok(());
        }
        let vertices = match self.network.get(element)?.kind() {
            ElementKind::Edge => match self.edge_vertices(element) {
                Ok(vertices) => Some(vertices),
                Err(BinderyError::InvalidTopology(_)) => return self.update(cx),
                Err(error) => return Err(error),
            },
            _ => None,
        };
        let Some(primitive) = self.by_element.get(&element).copied() else {
            return self.update(cx);
        };

        let network = &self.network;
        let Some(binding) = self.bindings.get_mut(&primitive) else {
            return Ok(());
        };
        let warnings = cx.batched(|cx| match (binding, vertices) {
            (ElementBinding::Node(node), _) => node.synchronize(cx, network),
            (ElementBinding::Edge(edge), Some((start, end))) => {
                edge.synchronize(cx, network, start, end)?;
                Ok(Vec::new())
            }
            (ElementBinding::Edge(_), None) => Ok(Vec::new()),
        })?;
        if !warnings.is_empty() {
            cx.warnings.report_warnings(&warnings);
        }
        Ok(())
    }

    /// React to a notification of the managed model.
    pub fn handle_geometry_event(
        &mut self,
        cx: &mut SyncContext<'_>,
        event: &GeometryEvent,
    ) -> Result<(), BinderyError> {
        if event.model != self.model {
            return Ok(());
        }
        match &event.kind {
            GeometryEventKind::GeometryChanged(ids) | GeometryEventKind::TopologyChanged(ids) => {
                for id in ids {
                    self.on_primitive_changed(cx, *id, event.origin)?;
                }
                Ok(())
            }
            GeometryEventKind::Removed(ids) => {
                if ids.iter().any(|id| self.bindings.contains_key(id)) {
                    self.update(cx)
                } else {
                    Ok(())
                }
            }
            GeometryEventKind::Renamed(_) | GeometryEventKind::ModelReplaced { .. } => Ok(()),
        }
    }

    fn on_primitive_changed(
        &mut self,
        cx: &mut SyncContext<'_>,
        id: GeometryId,
        origin: Option<PropagationToken>,
    ) -> Result<(), BinderyError> {
        if let Some(ElementBinding::Edge(edge)) = self.bindings.get_mut(&id) {
            return edge.refresh(cx);
        }
        for binding in self.bindings.values_mut() {
            if let ElementBinding::Node(node) = binding {
                if node.proxy() == Some(id) {
                    node.on_proxy_changed(cx, origin)?;
                }
            }
        }
        Ok(())
    }

    /// An instance's size or rotation changed in the semantic graph.
    pub fn on_instance_transform_changed(
        &mut self,
        cx: &mut SyncContext<'_>,
        entity: EntityId,
        reference: GeometricReference,
        origin: Option<PropagationToken>,
    ) -> Result<(), BinderyError> {
        if reference.model != self.model {
            return Ok(());
        }
        if let Some(ElementBinding::Node(node)) = self.bindings.get_mut(&reference.geometry) {
            if node.connector().source() == Some(entity) {
                node.on_instance_transform_changed(cx, origin)?;
            }
        }
        Ok(())
    }

    /// A component's resource files changed: re-import the proxies of the
    /// nodes it is the content of.
    pub fn on_files_changed(
        &mut self,
        cx: &mut SyncContext<'_>,
        entity: EntityId,
    ) -> Result<(), BinderyError> {
        let network = &self.network;
        let mut warnings = Vec::new();
        cx.batched(|cx| {
            for binding in self.bindings.values_mut() {
                if let ElementBinding::Node(node) = binding {
                    if node.connector().source() == Some(entity) {
                        warnings.extend(node.synchronize(cx, network)?);
                    }
                }
            }
            Ok(())
        })?;
        if !warnings.is_empty() {
            cx.warnings.report_warnings(&warnings);
        }
        Ok(())
    }

    /// A component was deleted: clear it from every element it was the
    /// content of. The resulting content notifications resynchronize them.
    pub fn on_content_deleted(&mut self, entity: EntityId) -> Result<(), BinderyError> {
        let holders: Vec<ElementId> = self
            .network
            .elements()
            .filter(|element| element.content == Some(entity))
            .map(|element| element.id)
            .collect();
        for element in holders {
            self.network.set_content(element, None)?;
        }
        Ok(())
    }

    /// The managed model was replaced by `model` (e.g. a reload). Element
    /// representations are moved over; the next update re-targets bindings.
    pub fn on_model_replaced(&mut self, model: ModelId) -> Result<(), BinderyError> {
        let moved: Vec<(ElementId, GeometricReference)> = self
            .network
            .elements()
            .filter_map(|element| {
                element
                    .representation
                    .filter(|reference| reference.model == self.model)
                    .map(|reference| {
                        (element.id, GeometricReference::new(model, reference.geometry))
                    })
            })
            .collect();
        for (element, reference) in moved {
            self.network.set_representation(element, Some(reference))?;
        }
        info!(old = %self.model, new = %model, "mirror moved to replacement model");
        self.model = model;
        Ok(())
    }

    /// Tear down every binding.
    pub fn dispose(&mut self, semantic: &mut SemanticGraph) -> Result<(), BinderyError> {
        for (_, mut binding) in std::mem::take(&mut self.bindings) {
            binding.before_deletion(semantic)?;
        }
        self.by_element.clear();
        self.watched.clear();
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
