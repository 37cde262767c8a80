//! Read-side walks over model topology: vertex chains of loops and
//! polylines, face boundaries, and polyline reorientation.

use super::model::GeometryModel;
use super::primitive::{GeometryKind, Orientation, Primitive, Shape};
use crate::{BinderyError, GeometryId, Vec3};

/// Start and end vertex of an edge.
pub fn edge_endpoints(
    model: &GeometryModel,
    edge: GeometryId,
) -> Result<(GeometryId, GeometryId), BinderyError> {
    match model.get(edge)? {
        Primitive {
            shape: Shape::Edge { start, end },
            ..
        } => Ok((*start, *end)),
        other => Err(unexpected(other, GeometryKind::Edge)),
    }
}

/// Position of a vertex.
pub fn vertex_position(model: &GeometryModel, vertex: GeometryId) -> Result<Vec3, BinderyError> {
    match model.get(vertex)? {
        Primitive {
            shape: Shape::Vertex { position, .. },
            ..
        } => Ok(*position),
        other => Err(unexpected(other, GeometryKind::Vertex)),
    }
}

/// Chain a sequence of edges into the sequence of vertices it visits.
///
/// The first edge is flipped when necessary so that it connects to the
/// second one. Fails when consecutive edges share no vertex.
pub fn chain_vertices(
    model: &GeometryModel,
    edges: &[GeometryId],
) -> Result<Vec<GeometryId>, BinderyError> {
    let Some((first, rest)) = edges.split_first() else {
        return Ok(Vec::new());
    };
    let (a, b) = edge_endpoints(model, *first)?;
    let mut chain = match rest.first() {
        Some(next) => {
            let (c, d) = edge_endpoints(model, *next)?;
            if a == c || a == d { vec![b, a] } else { vec![a, b] }
        }
        None => vec![a, b],
    };
    for edge in rest {
        let (c, d) = edge_endpoints(model, *edge)?;
        let last = chain[chain.len() - 1];
        if c == last {
            chain.push(d);
        } else if d == last {
            chain.push(c);
        } else {
            return Err(BinderyError::InvalidTopology(format!(
                "{edge} is not connected to {last}"
            )));
        }
    }
    Ok(chain)
}

/// Vertices of a closed loop, without repeating the first one at the end.
pub fn loop_vertices(
    model: &GeometryModel,
    edge_loop: GeometryId,
) -> Result<Vec<GeometryId>, BinderyError> {
    let edges = match model.get(edge_loop)? {
        Primitive {
            shape: Shape::EdgeLoop { edges },
            ..
        } => edges.clone(),
        other => return Err(unexpected(other, GeometryKind::EdgeLoop)),
    };
    let mut chain = chain_vertices(model, &edges)?;
    if chain.len() > 1 && chain.first() == chain.last() {
        chain.pop();
    }
    Ok(chain)
}

/// 3-D points of a closed loop.
pub fn loop_points(model: &GeometryModel, edge_loop: GeometryId) -> Result<Vec<Vec3>, BinderyError> {
    positions(model, &loop_vertices(model, edge_loop)?)
}

/// Vertices of a polyline from its first to its last point.
pub fn polyline_vertices(
    model: &GeometryModel,
    polyline: GeometryId,
) -> Result<Vec<GeometryId>, BinderyError> {
    chain_vertices(model, &polyline_edges(model, polyline)?)
}

/// 3-D points of a polyline.
pub fn polyline_points(
    model: &GeometryModel,
    polyline: GeometryId,
) -> Result<Vec<Vec3>, BinderyError> {
    positions(model, &polyline_vertices(model, polyline)?)
}

/// Edge sequence of a polyline.
pub fn polyline_edges(
    model: &GeometryModel,
    polyline: GeometryId,
) -> Result<Vec<GeometryId>, BinderyError> {
    match model.get(polyline)? {
        Primitive {
            shape: Shape::Polyline { edges },
            ..
        } => Ok(edges.clone()),
        other => Err(unexpected(other, GeometryKind::Polyline)),
    }
}

/// Boundary and hole loops of a face.
pub fn face_loops(
    model: &GeometryModel,
    face: GeometryId,
) -> Result<(GeometryId, Vec<GeometryId>), BinderyError> {
    match model.get(face)? {
        Primitive {
            shape: Shape::Face { boundary, holes },
            ..
        } => Ok((*boundary, holes.clone())),
        other => Err(unexpected(other, GeometryKind::Face)),
    }
}

/// Faces of a volume together with the orientation the volume uses them in.
pub fn volume_faces(
    model: &GeometryModel,
    volume: GeometryId,
) -> Result<Vec<(GeometryId, Orientation)>, BinderyError> {
    match model.get(volume)? {
        Primitive {
            shape: Shape::Volume { faces },
            ..
        } => Ok(faces.clone()),
        other => Err(unexpected(other, GeometryKind::Volume)),
    }
}

/// Orientation of a face relative to the (first) volume that owns it.
///
/// Faces that belong to no volume are `Forward`.
pub fn face_orientation(model: &GeometryModel, face: GeometryId) -> Orientation {
    model
        .primitives()
        .find_map(|primitive| match &primitive.shape {
            Shape::Volume { faces } => faces
                .iter()
                .find(|(candidate, _)| *candidate == face)
                .map(|(_, orientation)| *orientation),
            _ => None,
        })
        .unwrap_or_default()
}

/// Boundary points of a face as seen from its owning volume.
pub fn face_boundary_points(
    model: &GeometryModel,
    face: GeometryId,
) -> Result<Vec<Vec3>, BinderyError> {
    let (boundary, _) = face_loops(model, face)?;
    let mut points = loop_points(model, boundary)?;
    if face_orientation(model, face) == Orientation::Reversed {
        points.reverse();
    }
    Ok(points)
}

/// Make a polyline run from `start` to `end`.
///
/// A polyline that runs backwards is flipped by reversing its edge sequence
/// and swapping every edge's own endpoints. A polyline whose ends are not the
/// requested vertices at all is rewired at its outer edges. Returns whether
/// anything changed.
pub fn reorient_polyline(
    model: &mut GeometryModel,
    polyline: GeometryId,
    start: GeometryId,
    end: GeometryId,
) -> Result<bool, BinderyError> {
    let edges = polyline_edges(model, polyline)?;
    let chain = chain_vertices(model, &edges)?;
    let (Some(&first), Some(&last)) = (chain.first(), chain.last()) else {
        return Ok(false);
    };
    if first == start && last == end {
        return Ok(false);
    }

    if first == end && last == start {
        for edge in &edges {
            let (a, b) = edge_endpoints(model, *edge)?;
            model.set_edge_endpoints(*edge, b, a)?;
        }
        let reversed: Vec<_> = edges.iter().rev().copied().collect();
        model.set_polyline_edges(polyline, reversed)?;
        return Ok(true);
    }

    if let [only] = edges.as_slice() {
        model.set_edge_endpoints(*only, start, end)?;
        return Ok(true);
    }

    let (head, tail) = (edges[0], edges[edges.len() - 1]);
    let (a, b) = edge_endpoints(model, head)?;
    if a == first {
        model.set_edge_endpoints(head, start, b)?;
    } else {
        model.set_edge_endpoints(head, a, start)?;
    }
    let (c, d) = edge_endpoints(model, tail)?;
    if d == last {
        model.set_edge_endpoints(tail, c, end)?;
    } else {
        model.set_edge_endpoints(tail, end, d)?;
    }
    Ok(true)
}

fn positions(model: &GeometryModel, vertices: &[GeometryId]) -> Result<Vec<Vec3>, BinderyError> {
    vertices
        .iter()
        .map(|vertex| vertex_position(model, *vertex))
        .collect()
}

fn unexpected(primitive: &Primitive, expected: GeometryKind) -> BinderyError {
    BinderyError::InvalidTopology(format!(
        "{} is a {:?}, expected a {:?}",
        primitive.id,
        primitive.kind(),
        expected
    ))
}
