//! # Project Documents
//!
//! A project is a JSON document naming geometric models, semantic
//! components, the bindings requested between them and the flow networks to
//! mirror. Everything is referred to by name; [`Project`] resolves the names
//! and owns the resulting [`Exchange`].

use bindery_core::geometry::build::{add_box, add_polygon};
use bindery_core::{
    BinderyError, ConnectionState, ElementId, EntityId, Exchange, ExchangeConfig,
    GeometricReference, GeometryModel, InstanceType, ModelId, NetworkGraph, Vec3,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

/// Maximum project document size (50 MB).
const MAX_PROJECT_FILE_SIZE: u64 = 50 * 1024 * 1024;

// =============================================================================
// DOCUMENT
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProjectDocument {
    pub models: Vec<ModelDocument>,
    pub components: Vec<ComponentDocument>,
    pub bindings: Vec<BindingDocument>,
    pub networks: Vec<NetworkDocument>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelDocument {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub polygons: Vec<PolygonDocument>,
    #[serde(default)]
    pub boxes: Vec<BoxDocument>,
}

/// A planar face through the given points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolygonDocument {
    pub name: String,
    pub points: Vec<[f64; 3]>,
}

/// An axis-aligned box volume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BoxDocument {
    pub name: String,
    pub min: [f64; 3],
    pub max: [f64; 3],
}

/// A semantic component. Parents must be listed before their children.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ComponentDocument {
    pub key: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type", default)]
    pub instance_type: InstanceType,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub files: Vec<String>,
}

/// A requested binding of a component to a named primitive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BindingDocument {
    pub component: String,
    pub model: u64,
    pub primitive: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NetworkDocument {
    /// Model the network is mirrored into; created empty if not listed.
    pub model: u64,
    pub name: String,
    #[serde(default)]
    pub nodes: Vec<NodeDocument>,
    #[serde(default)]
    pub groups: Vec<GroupDocument>,
    #[serde(default)]
    pub edges: Vec<EdgeDocument>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeDocument {
    pub name: String,
    pub position: [f64; 3],
    #[serde(default)]
    pub content: Option<String>,
}

/// A sub-network entered at `entry` and left at `exit`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GroupDocument {
    pub name: String,
    #[serde(default)]
    pub nodes: Vec<NodeDocument>,
    #[serde(default)]
    pub edges: Vec<EdgeDocument>,
    #[serde(default)]
    pub entry: Option<String>,
    #[serde(default)]
    pub exit: Option<String>,
}

/// An edge between two nodes or groups, named by their `name`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EdgeDocument {
    pub name: String,
    pub start: String,
    pub end: String,
    #[serde(default)]
    pub content: Option<String>,
}

impl ProjectDocument {
    /// Read a project document from disk.
    pub fn load(path: &Path) -> Result<Self, BinderyError> {
        let metadata = std::fs::metadata(path)
            .map_err(|e| BinderyError::Io(format!("cannot read '{}': {}", path.display(), e)))?;
        if metadata.len() > MAX_PROJECT_FILE_SIZE {
            return Err(BinderyError::Serialization(format!(
                "project size {} bytes exceeds maximum allowed {} bytes",
                metadata.len(),
                MAX_PROJECT_FILE_SIZE
            )));
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| BinderyError::Io(format!("cannot read '{}': {}", path.display(), e)))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, BinderyError> {
        serde_json::from_str(content)
            .map_err(|e| BinderyError::Serialization(format!("invalid project document: {e}")))
    }
}

fn point([x, y, z]: [f64; 3]) -> Vec3 {
    Vec3::new(x, y, z)
}

// =============================================================================
// PROJECT
// =============================================================================

/// A requested binding with its names resolved.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BindingRequest<'a> {
    pub document: &'a BindingDocument,
    pub entity: EntityId,
    pub reference: Option<GeometricReference>,
}

/// A loaded project: models and components live in the exchange, bindings
/// and networks are applied on demand.
pub struct Project {
    document: ProjectDocument,
    exchange: Exchange,
    components: BTreeMap<String, EntityId>,
}

impl Project {
    pub fn load(path: &Path, config: ExchangeConfig) -> Result<Self, BinderyError> {
        Self::from_document(ProjectDocument::load(path)?, config)
    }

    /// Build models and components; nothing is bound yet.
    pub fn from_document(
        document: ProjectDocument,
        config: ExchangeConfig,
    ) -> Result<Self, BinderyError> {
        let mut exchange = Exchange::new(config)?;

        for model in &document.models {
            let mut geometry = GeometryModel::new(ModelId(model.id), model.name.as_str());
            for polygon in &model.polygons {
                let points: Vec<_> = polygon.points.iter().copied().map(point).collect();
                add_polygon(&mut geometry, &polygon.name, &points)?;
            }
            for cuboid in &model.boxes {
                add_box(&mut geometry, &cuboid.name, point(cuboid.min), point(cuboid.max))?;
            }
            exchange.add_model(geometry)?;
        }

        let mut components = BTreeMap::new();
        for component in &document.components {
            if components.contains_key(&component.key) {
                return Err(BinderyError::Serialization(format!(
                    "component '{}' is declared twice",
                    component.key
                )));
            }
            let parent = component
                .parent
                .as_deref()
                .map(|key| lookup(&components, key))
                .transpose()?;
            let name = component.name.as_deref().unwrap_or(&component.key);
            let semantic = exchange.semantic_mut();
            let id = semantic.add_component(name, component.instance_type, parent)?;
            if !component.files.is_empty() {
                semantic.set_files(id, component.files.clone())?;
            }
            components.insert(component.key.clone(), id);
        }
        exchange.pump()?;

        debug!(
            models = document.models.len(),
            components = components.len(),
            "project loaded"
        );
        Ok(Self {
            document,
            exchange,
            components,
        })
    }

    pub fn document(&self) -> &ProjectDocument {
        &self.document
    }

    pub fn exchange(&self) -> &Exchange {
        &self.exchange
    }

    pub fn exchange_mut(&mut self) -> &mut Exchange {
        &mut self.exchange
    }

    /// Component identifiers by document key.
    pub fn components(&self) -> &BTreeMap<String, EntityId> {
        &self.components
    }

    /// Resolve every requested binding.
    ///
    /// An unknown component or model is an error; an unknown primitive name
    /// leaves the reference empty so the evaluator reports it.
    pub fn requests(&self) -> Result<Vec<BindingRequest<'_>>, BinderyError> {
        self.document
            .bindings
            .iter()
            .map(|document| {
                let entity = lookup(&self.components, &document.component)?;
                let model_id = ModelId(document.model);
                let model = self
                    .exchange
                    .model(model_id)
                    .ok_or(BinderyError::ModelNotFound(model_id))?;
                let reference = model
                    .primitives()
                    .find(|p| p.name == document.primitive)
                    .map(|p| model.reference(p.id));
                Ok(BindingRequest {
                    document,
                    entity,
                    reference,
                })
            })
            .collect()
    }

    /// Evaluate one request against the current exchange state.
    pub fn check(&self, request: &BindingRequest<'_>) -> Result<ConnectionState, BinderyError> {
        match request.reference {
            Some(reference) => self.exchange.check(request.entity, reference),
            None => Ok(ConnectionState::TARGET_MISSING),
        }
    }

    /// Connect every requested binding, in document order.
    pub fn connect_all(&mut self) -> Result<Vec<(BindingDocument, ConnectionState)>, BinderyError> {
        let resolved: Vec<_> = self
            .requests()?
            .into_iter()
            .map(|request| (request.document.clone(), request.entity, request.reference))
            .collect();
        let mut outcomes = Vec::with_capacity(resolved.len());
        for (document, entity, reference) in resolved {
            let state = match reference {
                Some(reference) => self.exchange.connect(entity, reference)?,
                None => ConnectionState::TARGET_MISSING,
            };
            outcomes.push((document, state));
        }
        Ok(outcomes)
    }

    /// Build every network and attach it to its model.
    pub fn attach_networks(&mut self) -> Result<Vec<ModelId>, BinderyError> {
        let mut attached = Vec::new();
        for document in &self.document.networks {
            let model = ModelId(document.model);
            if self.exchange.model(model).is_none() {
                self.exchange
                    .add_model(GeometryModel::new(model, document.name.as_str()))?;
            }
            let network = build_network(document, &self.components)?;
            self.exchange.attach_network(model, network)?;
            attached.push(model);
        }
        Ok(attached)
    }
}

fn lookup(components: &BTreeMap<String, EntityId>, key: &str) -> Result<EntityId, BinderyError> {
    components
        .get(key)
        .copied()
        .ok_or_else(|| BinderyError::Serialization(format!("unknown component '{key}'")))
}

fn build_network(
    document: &NetworkDocument,
    components: &BTreeMap<String, EntityId>,
) -> Result<NetworkGraph, BinderyError> {
    let mut network = NetworkGraph::new(document.name.as_str());
    let root = network.root();
    let mut names: BTreeMap<&str, ElementId> = BTreeMap::new();

    add_nodes(&mut network, root, &document.nodes, components, &mut names)?;
    for group in &document.groups {
        let sub = network.add_network(root, group.name.as_str())?;
        let mut local = BTreeMap::new();
        add_nodes(&mut network, sub, &group.nodes, components, &mut local)?;
        add_edges(&mut network, sub, &group.edges, components, &local)?;
        let boundary = |name: &Option<String>| {
            name.as_deref().map(|n| element(&local, n)).transpose()
        };
        network.set_boundary(sub, boundary(&group.entry)?, boundary(&group.exit)?)?;
        names.insert(group.name.as_str(), sub);
    }
    add_edges(&mut network, root, &document.edges, components, &names)?;
    Ok(network)
}

fn add_nodes<'d>(
    network: &mut NetworkGraph,
    parent: ElementId,
    nodes: &'d [NodeDocument],
    components: &BTreeMap<String, EntityId>,
    names: &mut BTreeMap<&'d str, ElementId>,
) -> Result<(), BinderyError> {
    for node in nodes {
        let id = network.add_node(parent, node.name.as_str(), point(node.position))?;
        if let Some(key) = &node.content {
            network.set_content(id, Some(lookup(components, key)?))?;
        }
        names.insert(node.name.as_str(), id);
    }
    Ok(())
}

fn add_edges(
    network: &mut NetworkGraph,
    parent: ElementId,
    edges: &[EdgeDocument],
    components: &BTreeMap<String, EntityId>,
    names: &BTreeMap<&str, ElementId>,
) -> Result<(), BinderyError> {
    for edge in edges {
        let start = element(names, &edge.start)?;
        let end = element(names, &edge.end)?;
        let id = network.add_edge(parent, edge.name.as_str(), start, end)?;
        if let Some(key) = &edge.content {
            network.set_content(id, Some(lookup(components, key)?))?;
        }
    }
    Ok(())
}

fn element(names: &BTreeMap<&str, ElementId>, name: &str) -> Result<ElementId, BinderyError> {
    names
        .get(name)
        .copied()
        .ok_or_else(|| BinderyError::Serialization(format!("unknown network element '{name}'")))
}
