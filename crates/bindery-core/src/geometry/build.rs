//! Convenience constructors for common shapes.
//!
//! Used by project documents and tests that describe geometry by points
//! instead of by individual primitives. Edges between the same pair of
//! vertices are shared.

use super::model::GeometryModel;
use super::primitive::Orientation;
use crate::{BinderyError, GeometryId, Vec3};
use std::collections::BTreeMap;

/// Edges already created, keyed by their unordered vertex pair.
#[derive(Debug, Default)]
pub struct EdgeCache {
    edges: BTreeMap<(GeometryId, GeometryId), GeometryId>,
}

impl EdgeCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reuse the edge between `a` and `b`, or create it.
    pub fn edge(
        &mut self,
        model: &mut GeometryModel,
        a: GeometryId,
        b: GeometryId,
    ) -> Result<GeometryId, BinderyError> {
        let key = if a <= b { (a, b) } else { (b, a) };
        if let Some(edge) = self.edges.get(&key) {
            return Ok(*edge);
        }
        let edge = model.add_edge(format!("edge {}-{}", a.0, b.0), a, b)?;
        self.edges.insert(key, edge);
        Ok(edge)
    }
}

/// Add a closed loop through existing vertices.
pub fn add_loop_through(
    model: &mut GeometryModel,
    cache: &mut EdgeCache,
    name: &str,
    vertices: &[GeometryId],
) -> Result<GeometryId, BinderyError> {
    if vertices.len() < 3 {
        return Err(BinderyError::InvalidTopology(format!(
            "loop '{name}' needs at least three vertices"
        )));
    }
    let mut edges = Vec::with_capacity(vertices.len());
    for (i, vertex) in vertices.iter().enumerate() {
        let next = vertices[(i + 1) % vertices.len()];
        edges.push(cache.edge(model, *vertex, next)?);
    }
    model.add_edge_loop(name, edges)
}

/// Add a planar face through fresh vertices at `points`.
pub fn add_polygon(
    model: &mut GeometryModel,
    name: &str,
    points: &[Vec3],
) -> Result<GeometryId, BinderyError> {
    let vertices: Vec<_> = points
        .iter()
        .enumerate()
        .map(|(i, p)| model.add_vertex(format!("{name} v{i}"), *p))
        .collect();
    let mut cache = EdgeCache::new();
    let boundary = add_loop_through(model, &mut cache, &format!("{name} boundary"), &vertices)?;
    model.add_face(name, boundary, Vec::new())
}

/// Add an axis-aligned box as a closed volume with outward-facing faces.
pub fn add_box(
    model: &mut GeometryModel,
    name: &str,
    min: Vec3,
    max: Vec3,
) -> Result<GeometryId, BinderyError> {
    let corners = [
        Vec3::new(min.x, min.y, min.z),
        Vec3::new(max.x, min.y, min.z),
        Vec3::new(max.x, max.y, min.z),
        Vec3::new(min.x, max.y, min.z),
        Vec3::new(min.x, min.y, max.z),
        Vec3::new(max.x, min.y, max.z),
        Vec3::new(max.x, max.y, max.z),
        Vec3::new(min.x, max.y, max.z),
    ];
    let v: Vec<_> = corners
        .iter()
        .enumerate()
        .map(|(i, p)| model.add_vertex(format!("{name} v{i}"), *p))
        .collect();

    // Counter-clockwise when seen from outside.
    let sides: [(&str, [usize; 4]); 6] = [
        ("floor", [0, 3, 2, 1]),
        ("ceiling", [4, 5, 6, 7]),
        ("south", [0, 1, 5, 4]),
        ("east", [1, 2, 6, 5]),
        ("north", [2, 3, 7, 6]),
        ("west", [3, 0, 4, 7]),
    ];
    let mut cache = EdgeCache::new();
    let mut faces = Vec::with_capacity(sides.len());
    for (side, corners) in sides {
        let ring: Vec<_> = corners.iter().map(|i| v[*i]).collect();
        let boundary = add_loop_through(model, &mut cache, &format!("{name} {side} loop"), &ring)?;
        let face = model.add_face(format!("{name} {side}"), boundary, Vec::new())?;
        faces.push((face, Orientation::Forward));
    }
    model.add_volume(name, faces)
}
