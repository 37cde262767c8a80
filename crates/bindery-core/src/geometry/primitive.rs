//! Boundary-representation primitives stored in a [`GeometryModel`](super::GeometryModel).

use crate::proxy::ProxyMesh;
use crate::{ColorSource, GeometryId, Vec3};
use serde::{Deserialize, Serialize};

/// The structural kind of a primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum GeometryKind {
    Vertex,
    Edge,
    EdgeLoop,
    Face,
    Volume,
    Polyline,
    ProxyShape,
}

/// Orientation of a face as used by its owning volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Orientation {
    #[default]
    Forward,
    Reversed,
}

/// Kind-specific payload of a primitive.
///
/// References point "downwards": edges use vertices, loops and polylines use
/// edges, faces use loops, volumes use faces, and a vertex owns at most one
/// attached proxy shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Shape {
    Vertex {
        position: Vec3,
        proxy: Option<GeometryId>,
    },
    Edge {
        start: GeometryId,
        end: GeometryId,
    },
    EdgeLoop {
        edges: Vec<GeometryId>,
    },
    Face {
        boundary: GeometryId,
        holes: Vec<GeometryId>,
    },
    Volume {
        faces: Vec<(GeometryId, Orientation)>,
    },
    Polyline {
        edges: Vec<GeometryId>,
    },
    ProxyShape {
        size: Vec3,
        rotation: Vec3,
        mesh: ProxyMesh,
    },
}

/// One primitive of a geometric model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Primitive {
    pub id: GeometryId,
    pub name: String,
    pub color: ColorSource,
    pub shape: Shape,
    /// Incremented on every attribute or topology mutation of this primitive.
    #[serde(default)]
    pub revision: u64,
}

impl Primitive {
    #[must_use]
    pub fn new(id: GeometryId, name: impl Into<String>, shape: Shape) -> Self {
        Self {
            id,
            name: name.into(),
            color: ColorSource::default(),
            shape,
            revision: 0,
        }
    }

    #[must_use]
    pub fn kind(&self) -> GeometryKind {
        match self.shape {
            Shape::Vertex { .. } => GeometryKind::Vertex,
            Shape::Edge { .. } => GeometryKind::Edge,
            Shape::EdgeLoop { .. } => GeometryKind::EdgeLoop,
            Shape::Face { .. } => GeometryKind::Face,
            Shape::Volume { .. } => GeometryKind::Volume,
            Shape::Polyline { .. } => GeometryKind::Polyline,
            Shape::ProxyShape { .. } => GeometryKind::ProxyShape,
        }
    }

    /// Primitives this one structurally depends on.
    #[must_use]
    pub fn references(&self) -> Vec<GeometryId> {
        match &self.shape {
            Shape::Vertex { proxy, .. } => proxy.iter().copied().collect(),
            Shape::Edge { start, end } => vec![*start, *end],
            Shape::EdgeLoop { edges } | Shape::Polyline { edges } => edges.clone(),
            Shape::Face { boundary, holes } => {
                let mut refs = Vec::with_capacity(holes.len() + 1);
                refs.push(*boundary);
                refs.extend(holes.iter().copied());
                refs
            }
            Shape::Volume { faces } => faces.iter().map(|(face, _)| *face).collect(),
            Shape::ProxyShape { .. } => Vec::new(),
        }
    }

    #[must_use]
    pub fn references_id(&self, id: GeometryId) -> bool {
        self.references().contains(&id)
    }

    pub(crate) fn touch(&mut self) {
        self.revision = self.revision.saturating_add(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn face_references_boundary_then_holes() {
        let face = Primitive::new(
            GeometryId(10),
            "face",
            Shape::Face {
                boundary: GeometryId(1),
                holes: vec![GeometryId(2), GeometryId(3)],
            },
        );
        assert_eq!(face.kind(), GeometryKind::Face);
        assert_eq!(
            face.references(),
            vec![GeometryId(1), GeometryId(2), GeometryId(3)]
        );
    }

    #[test]
    fn vertex_references_only_its_proxy() {
        let bare = Primitive::new(
            GeometryId(1),
            "v",
            Shape::Vertex {
                position: Vec3::ZERO,
                proxy: None,
            },
        );
        assert!(bare.references().is_empty());

        let with_proxy = Primitive::new(
            GeometryId(1),
            "v",
            Shape::Vertex {
                position: Vec3::ZERO,
                proxy: Some(GeometryId(9)),
            },
        );
        assert!(with_proxy.references_id(GeometryId(9)));
    }
}
