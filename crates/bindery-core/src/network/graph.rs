//! The flow-network arena and its change outbox.

use super::element::{ElementKind, ElementShape, NetworkElement};
use crate::{BinderyError, ElementId, EntityId, GeometricReference, Vec3};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// EVENTS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkEventKind {
    ElementAdded(ElementId),
    ElementDeleted(ElementId),
    /// An edge now connects different endpoints.
    EdgeRedirected(ElementId),
    /// Layout or boundary nodes changed.
    TopologyChanged(ElementId),
    ContentChanged(ElementId),
    Renamed(ElementId),
}

/// A change notification, tagged with the network that owns the element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkEvent {
    pub network: ElementId,
    pub kind: NetworkEventKind,
}

// =============================================================================
// GRAPH
// =============================================================================

/// A hierarchical flow network: a flat arena of elements under one root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkGraph {
    root: ElementId,
    elements: BTreeMap<ElementId, NetworkElement>,
    next_id: u64,
    #[serde(skip)]
    events: Vec<NetworkEvent>,
}

impl NetworkGraph {
    /// Create a network containing only its root.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let root = ElementId(1);
        let mut elements = BTreeMap::new();
        elements.insert(
            root,
            NetworkElement {
                id: root,
                name: name.into(),
                parent: None,
                content: None,
                representation: None,
                shape: ElementShape::Network {
                    children: Vec::new(),
                    entry: None,
                    exit: None,
                },
            },
        );
        Self {
            root,
            elements,
            next_id: 2,
            events: Vec::new(),
        }
    }

    #[must_use]
    pub fn root(&self) -> ElementId {
        self.root
    }

    #[must_use]
    pub fn element(&self, id: ElementId) -> Option<&NetworkElement> {
        self.elements.get(&id)
    }

    pub fn get(&self, id: ElementId) -> Result<&NetworkElement, BinderyError> {
        self.elements
            .get(&id)
            .ok_or(BinderyError::ElementNotFound(id))
    }

    fn get_mut(&mut self, id: ElementId) -> Result<&mut NetworkElement, BinderyError> {
        self.elements
            .get_mut(&id)
            .ok_or(BinderyError::ElementNotFound(id))
    }

    #[must_use]
    pub fn contains(&self, id: ElementId) -> bool {
        self.elements.contains_key(&id)
    }

    /// All elements in identifier order, root included.
    pub fn elements(&self) -> impl Iterator<Item = &NetworkElement> {
        self.elements.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Whether the network holds nothing but its root.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.elements.len() <= 1
    }

    /// Identifiers of every element of `kind`, in identifier order.
    #[must_use]
    pub fn ids_of_kind(&self, kind: ElementKind) -> Vec<ElementId> {
        self.elements
            .values()
            .filter(|e| e.kind() == kind)
            .map(|e| e.id)
            .collect()
    }

    /// The root plus every nested sub-network, parents before children.
    #[must_use]
    pub fn networks(&self) -> Vec<ElementId> {
        let mut out = Vec::new();
        self.collect_networks(self.root, &mut out);
        out
    }

    fn collect_networks(&self, network: ElementId, out: &mut Vec<ElementId>) {
        out.push(network);
        if let Some(element) = self.elements.get(&network) {
            for child in element.children() {
                let is_network = self
                    .elements
                    .get(child)
                    .is_some_and(|c| c.kind() == ElementKind::Network);
                if is_network {
                    self.collect_networks(*child, out);
                }
            }
        }
    }

    /// Edges that start or end at `id`.
    #[must_use]
    pub fn incident_edges(&self, id: ElementId) -> Vec<ElementId> {
        self.elements
            .values()
            .filter(|e| {
                e.endpoints()
                    .is_some_and(|(start, end)| start == id || end == id)
            })
            .map(|e| e.id)
            .collect()
    }

    /// The node an edge leaving `endpoint` actually starts at.
    ///
    /// A sub-network endpoint resolves to its exit node.
    pub fn resolve_start(&self, endpoint: ElementId) -> Result<ElementId, BinderyError> {
        self.resolve_endpoint(endpoint, |entry, exit| exit.or(entry))
    }

    /// The node an edge entering `endpoint` actually ends at.
    ///
    /// A sub-network endpoint resolves to its entry node.
    pub fn resolve_end(&self, endpoint: ElementId) -> Result<ElementId, BinderyError> {
        self.resolve_endpoint(endpoint, |entry, exit| entry.or(exit))
    }

    fn resolve_endpoint(
        &self,
        endpoint: ElementId,
        pick: impl Fn(Option<ElementId>, Option<ElementId>) -> Option<ElementId>,
    ) -> Result<ElementId, BinderyError> {
        let element = self.get(endpoint)?;
        match &element.shape {
            ElementShape::Node { .. } => Ok(endpoint),
            ElementShape::Network { entry, exit, .. } => {
                let boundary = pick(*entry, *exit).ok_or_else(|| {
                    BinderyError::InvalidTopology(format!(
                        "sub-network {endpoint} has no boundary node"
                    ))
                })?;
                match self.get(boundary)?.kind() {
                    ElementKind::Node => Ok(boundary),
                    _ => Err(BinderyError::InvalidTopology(format!(
                        "boundary {boundary} of {endpoint} is not a node"
                    ))),
                }
            }
            ElementShape::Edge { .. } => Err(BinderyError::InvalidTopology(format!(
                "{endpoint} is an edge and cannot be an edge endpoint"
            ))),
        }
    }

    /// The network that owns `id` (the root owns itself).
    #[must_use]
    pub fn owning_network(&self, id: ElementId) -> ElementId {
        self.elements
            .get(&id)
            .and_then(|e| e.parent)
            .unwrap_or(self.root)
    }

    // =========================================================================
    // CREATION
    // =========================================================================

    pub fn add_node(
        &mut self,
        network: ElementId,
        name: impl Into<String>,
        position: Vec3,
    ) -> Result<ElementId, BinderyError> {
        self.insert(network, name.into(), ElementShape::Node { position })
    }

    pub fn add_network(
        &mut self,
        network: ElementId,
        name: impl Into<String>,
    ) -> Result<ElementId, BinderyError> {
        self.insert(
            network,
            name.into(),
            ElementShape::Network {
                children: Vec::new(),
                entry: None,
                exit: None,
            },
        )
    }

    /// Add an edge between two nodes or sub-networks.
    pub fn add_edge(
        &mut self,
        network: ElementId,
        name: impl Into<String>,
        start: ElementId,
        end: ElementId,
    ) -> Result<ElementId, BinderyError> {
        self.check_endpoint(start)?;
        self.check_endpoint(end)?;
        self.insert(network, name.into(), ElementShape::Edge { start, end })
    }

    fn check_endpoint(&self, endpoint: ElementId) -> Result<(), BinderyError> {
        let element = self.get(endpoint)?;
        if element.kind() == ElementKind::Edge || endpoint == self.root {
            return Err(BinderyError::InvalidTopology(format!(
                "{endpoint} cannot be an edge endpoint"
            )));
        }
        Ok(())
    }

    fn insert(
        &mut self,
        network: ElementId,
        name: String,
        shape: ElementShape,
    ) -> Result<ElementId, BinderyError> {
        let id = ElementId(self.next_id);
        match &mut self.get_mut(network)?.shape {
            ElementShape::Network { children, .. } => children.push(id),
            _ => {
                return Err(BinderyError::InvalidTopology(format!(
                    "{network} is not a network"
                )));
            }
        }
        self.next_id = self.next_id.saturating_add(1);
        self.elements.insert(
            id,
            NetworkElement {
                id,
                name,
                parent: Some(network),
                content: None,
                representation: None,
                shape,
            },
        );
        self.emit(network, NetworkEventKind::ElementAdded(id));
        Ok(id)
    }

    // =========================================================================
    // MUTATION
    // =========================================================================

    /// Choose the entry and exit nodes of a sub-network.
    ///
    /// Both must be direct child nodes of `network`.
    pub fn set_boundary(
        &mut self,
        network: ElementId,
        entry: Option<ElementId>,
        exit: Option<ElementId>,
    ) -> Result<(), BinderyError> {
        for node in entry.iter().chain(exit.iter()) {
            let element = self.get(*node)?;
            if element.kind() != ElementKind::Node || element.parent != Some(network) {
                return Err(BinderyError::InvalidTopology(format!(
                    "{node} is not a node of {network}"
                )));
            }
        }
        match &mut self.get_mut(network)?.shape {
            ElementShape::Network {
                entry: entry_slot,
                exit: exit_slot,
                ..
            } => {
                *entry_slot = entry;
                *exit_slot = exit;
            }
            _ => {
                return Err(BinderyError::InvalidTopology(format!(
                    "{network} is not a network"
                )));
            }
        }
        let owner = self.owning_network(network);
        self.emit(owner, NetworkEventKind::TopologyChanged(network));
        Ok(())
    }

    /// Move a node in the network layout.
    pub fn set_node_position(&mut self, node: ElementId, position: Vec3) -> Result<(), BinderyError> {
        match &mut self.get_mut(node)?.shape {
            ElementShape::Node { position: slot } => {
                if *slot == position {
                    return Ok(());
                }
                *slot = position;
            }
            _ => {
                return Err(BinderyError::InvalidTopology(format!("{node} is not a node")));
            }
        }
        let owner = self.owning_network(node);
        self.emit(owner, NetworkEventKind::TopologyChanged(node));
        Ok(())
    }

    /// Connect an edge to different endpoints.
    pub fn redirect_edge(
        &mut self,
        edge: ElementId,
        start: ElementId,
        end: ElementId,
    ) -> Result<(), BinderyError> {
        self.check_endpoint(start)?;
        self.check_endpoint(end)?;
        match &mut self.get_mut(edge)?.shape {
            ElementShape::Edge {
                start: start_slot,
                end: end_slot,
            } => {
                if *start_slot == start && *end_slot == end {
                    return Ok(());
                }
                *start_slot = start;
                *end_slot = end;
            }
            _ => {
                return Err(BinderyError::InvalidTopology(format!("{edge} is not an edge")));
            }
        }
        let owner = self.owning_network(edge);
        self.emit(owner, NetworkEventKind::EdgeRedirected(edge));
        Ok(())
    }

    /// Assign (or clear) the semantic content of an element.
    pub fn set_content(
        &mut self,
        id: ElementId,
        content: Option<EntityId>,
    ) -> Result<(), BinderyError> {
        let element = self.get_mut(id)?;
        if element.content == content {
            return Ok(());
        }
        element.content = content;
        let owner = self.owning_network(id);
        self.emit(owner, NetworkEventKind::ContentChanged(id));
        Ok(())
    }

    pub fn rename(&mut self, id: ElementId, name: impl Into<String>) -> Result<(), BinderyError> {
        let name = name.into();
        let element = self.get_mut(id)?;
        if element.name == name {
            return Ok(());
        }
        element.name = name;
        let owner = self.owning_network(id);
        self.emit(owner, NetworkEventKind::Renamed(id));
        Ok(())
    }

    /// Record the geometric counterpart of an element. Raises no event.
    pub fn set_representation(
        &mut self,
        id: ElementId,
        representation: Option<GeometricReference>,
    ) -> Result<(), BinderyError> {
        self.get_mut(id)?.representation = representation;
        Ok(())
    }

    /// Delete an element.
    ///
    /// Edges attached to a deleted node or sub-network are deleted first, and
    /// a sub-network takes its whole subtree with it. Returns the removed
    /// identifiers in deletion order.
    pub fn delete(&mut self, id: ElementId) -> Result<Vec<ElementId>, BinderyError> {
        if id == self.root {
            return Err(BinderyError::InvalidTopology(
                "the root network cannot be deleted".to_string(),
            ));
        }
        self.get(id)?;
        let mut removed = Vec::new();
        self.delete_recursive(id, &mut removed);
        Ok(removed)
    }

    fn delete_recursive(&mut self, id: ElementId, removed: &mut Vec<ElementId>) {
        let Some(element) = self.elements.get(&id) else {
            return;
        };
        let children = element.children().to_vec();
        for child in children {
            self.delete_recursive(child, removed);
        }
        if self.elements.get(&id).is_some_and(|e| e.kind() != ElementKind::Edge) {
            for edge in self.incident_edges(id) {
                self.delete_recursive(edge, removed);
            }
        }

        let Some(element) = self.elements.remove(&id) else {
            return;
        };
        let owner = element.parent.unwrap_or(self.root);
        if let Some(ElementShape::Network {
            children,
            entry,
            exit,
        }) = self.elements.get_mut(&owner).map(|p| &mut p.shape)
        {
            children.retain(|child| *child != id);
            if *entry == Some(id) {
                *entry = None;
            }
            if *exit == Some(id) {
                *exit = None;
            }
        }
        removed.push(id);
        self.emit(owner, NetworkEventKind::ElementDeleted(id));
    }

    // =========================================================================
    // EVENTS
    // =========================================================================

    fn emit(&mut self, network: ElementId, kind: NetworkEventKind) {
        self.events.push(NetworkEvent { network, kind });
    }

    /// Drain the outbox.
    pub fn take_events(&mut self) -> Vec<NetworkEvent> {
        std::mem::take(&mut self.events)
    }

    #[must_use]
    pub fn has_pending_events(&self) -> bool {
        !self.events.is_empty()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deleting_a_node_removes_incident_edges_first() {
        let mut net = NetworkGraph::new("heating");
        let root = net.root();
        let a = net.add_node(root, "boiler", Vec3::ZERO).expect("node");
        let b = net.add_node(root, "radiator", Vec3::new(4.0, 0.0, 0.0)).expect("node");
        let c = net.add_node(root, "valve", Vec3::new(0.0, 4.0, 0.0)).expect("node");
        let ab = net.add_edge(root, "supply", a, b).expect("edge");
        let ca = net.add_edge(root, "return", c, a).expect("edge");
        net.take_events();

        let removed = net.delete(a).expect("delete");

        assert_eq!(removed, vec![ab, ca, a]);
        assert!(!net.contains(ab) && !net.contains(ca));
        assert_eq!(net.get(root).expect("root").children(), [b, c]);
        let kinds: Vec<_> = net.take_events().into_iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                NetworkEventKind::ElementDeleted(ab),
                NetworkEventKind::ElementDeleted(ca),
                NetworkEventKind::ElementDeleted(a),
            ]
        );
    }

    #[test]
    fn sub_network_endpoints_resolve_to_boundary_nodes() {
        let mut net = NetworkGraph::new("plant");
        let root = net.root();
        let sub = net.add_network(root, "loop").expect("network");
        let inlet = net.add_node(sub, "inlet", Vec3::ZERO).expect("node");
        let outlet = net.add_node(sub, "outlet", Vec3::ONE).expect("node");

        assert!(matches!(
            net.resolve_end(sub),
            Err(BinderyError::InvalidTopology(_))
        ));

        net.set_boundary(sub, Some(inlet), Some(outlet)).expect("boundary");
        assert_eq!(net.resolve_end(sub).expect("entry"), inlet);
        assert_eq!(net.resolve_start(sub).expect("exit"), outlet);
        assert_eq!(net.networks(), vec![root, sub]);
    }

    #[test]
    fn events_are_tagged_with_the_owning_network() {
        let mut net = NetworkGraph::new("plant");
        let root = net.root();
        let sub = net.add_network(root, "loop").expect("network");
        let node = net.add_node(sub, "pump", Vec3::ZERO).expect("node");

        let events = net.take_events();
        assert_eq!(events[0].network, root);
        assert_eq!(events[1].network, sub);
        assert_eq!(events[1].kind, NetworkEventKind::ElementAdded(node));
    }

    #[test]
    fn deleting_a_sub_network_takes_its_subtree_and_attached_edges() {
        let mut net = NetworkGraph::new("plant");
        let root = net.root();
        let source = net.add_node(root, "source", Vec3::ZERO).expect("node");
        let sub = net.add_network(root, "loop").expect("network");
        let inner = net.add_node(sub, "inner", Vec3::ONE).expect("node");
        net.set_boundary(sub, Some(inner), Some(inner)).expect("boundary");
        let feed = net.add_edge(root, "feed", source, sub).expect("edge");

        let removed = net.delete(sub).expect("delete");

        assert_eq!(removed, vec![inner, feed, sub]);
        assert_eq!(net.len(), 2);
    }

    #[test]
    fn root_and_edges_are_not_endpoints() {
        let mut net = NetworkGraph::new("plant");
        let root = net.root();
        let a = net.add_node(root, "a", Vec3::ZERO).expect("node");
        let b = net.add_node(root, "b", Vec3::ONE).expect("node");
        let ab = net.add_edge(root, "ab", a, b).expect("edge");

        assert!(net.add_edge(root, "bad", a, root).is_err());
        assert!(net.add_edge(root, "bad", ab, b).is_err());
        assert!(net.delete(root).is_err());
    }
}
