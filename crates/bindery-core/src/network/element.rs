//! Elements of a flow network.

use crate::{ElementId, EntityId, GeometricReference, Vec3};
use serde::{Deserialize, Serialize};

/// The structural kind of a network element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ElementKind {
    Node,
    Edge,
    Network,
}

/// Kind-specific payload of a network element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ElementShape {
    /// A node at a layout position (network units).
    Node { position: Vec3 },
    /// A directed connection; each end is a node or a sub-network.
    Edge { start: ElementId, end: ElementId },
    /// A (sub-)network. Edges attached to it enter at `entry` and leave
    /// from `exit`.
    Network {
        children: Vec<ElementId>,
        entry: Option<ElementId>,
        exit: Option<ElementId>,
    },
}

/// One node, edge or sub-network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkElement {
    pub id: ElementId,
    pub name: String,
    /// Owning network; `None` only for the root.
    pub parent: Option<ElementId>,
    /// Semantic component realised by this element.
    pub content: Option<EntityId>,
    /// Geometric counterpart maintained by the mirror.
    pub representation: Option<GeometricReference>,
    pub shape: ElementShape,
}

impl NetworkElement {
    #[must_use]
    pub fn kind(&self) -> ElementKind {
        match self.shape {
            ElementShape::Node { .. } => ElementKind::Node,
            ElementShape::Edge { .. } => ElementKind::Edge,
            ElementShape::Network { .. } => ElementKind::Network,
        }
    }

    /// Layout position of a node.
    #[must_use]
    pub fn position(&self) -> Option<Vec3> {
        match self.shape {
            ElementShape::Node { position } => Some(position),
            _ => None,
        }
    }

    /// Start and end of an edge.
    #[must_use]
    pub fn endpoints(&self) -> Option<(ElementId, ElementId)> {
        match self.shape {
            ElementShape::Edge { start, end } => Some((start, end)),
            _ => None,
        }
    }

    /// Direct children of a network.
    #[must_use]
    pub fn children(&self) -> &[ElementId] {
        match &self.shape {
            ElementShape::Network { children, .. } => children,
            _ => &[],
        }
    }
}
