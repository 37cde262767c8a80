//! # Measurements
//!
//! Geometric quantities consumed by descriptive bindings.
//!
//! Bindings only depend on the [`Measurements`] trait. [`PlanarMeasurements`]
//! derives every quantity from vertex positions and is what the exchange uses
//! unless a caller injects something more elaborate.
//!
//! Widths and heights are bounding extents inside the face plane: the height
//! axis is world Z projected into the plane (world Y for horizontal faces),
//! and the width axis is perpendicular to it.

use crate::geometry::topology::{
    edge_endpoints, face_loops, loop_points, vertex_position, volume_faces,
};
use crate::geometry::{GeometryModel, Orientation};
use crate::{BinderyError, GeometryId, Vec3};

/// A quantity with lower, reference and upper values.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Extent {
    pub min: f64,
    pub reference: f64,
    pub max: f64,
}

impl Extent {
    /// An extent whose three values coincide.
    #[must_use]
    pub const fn uniform(value: f64) -> Self {
        Self {
            min: value,
            reference: value,
            max: value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EdgeMetrics {
    pub length: Extent,
}

/// Metrics of an edge loop or face.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SurfaceMetrics {
    pub area: Extent,
    pub width: Extent,
    pub height: Extent,
    /// Absolute elevation of the lowest point.
    pub floor_elevation: f64,
    /// Absolute elevation of the highest point.
    pub ceiling_elevation: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct VolumeMetrics {
    pub floor_elevation: f64,
    pub ceiling_elevation: f64,
    pub height_net: f64,
    pub height_gross: f64,
    pub height_ref: f64,
    pub perimeter: f64,
    pub area_gross: f64,
    pub area_net: f64,
    pub area_ref: f64,
    pub volume_gross: f64,
    pub volume_net: f64,
    pub volume_netnet: f64,
    pub volume_ref: f64,
}

/// Measurement algorithms over a geometric model.
pub trait Measurements {
    fn edge(&self, model: &GeometryModel, edge: GeometryId) -> Result<EdgeMetrics, BinderyError>;

    fn edge_loop(
        &self,
        model: &GeometryModel,
        edge_loop: GeometryId,
    ) -> Result<SurfaceMetrics, BinderyError>;

    fn face(&self, model: &GeometryModel, face: GeometryId) -> Result<SurfaceMetrics, BinderyError>;

    fn volume(
        &self,
        model: &GeometryModel,
        volume: GeometryId,
    ) -> Result<VolumeMetrics, BinderyError>;
}

/// Measurements computed directly from vertex positions.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlanarMeasurements;

const FLAT_TOLERANCE: f64 = 1e-6;

impl Measurements for PlanarMeasurements {
    fn edge(&self, model: &GeometryModel, edge: GeometryId) -> Result<EdgeMetrics, BinderyError> {
        let (start, end) = edge_endpoints(model, edge)?;
        let length = (vertex_position(model, end)? - vertex_position(model, start)?).length();
        Ok(EdgeMetrics {
            length: Extent::uniform(length),
        })
    }

    fn edge_loop(
        &self,
        model: &GeometryModel,
        edge_loop: GeometryId,
    ) -> Result<SurfaceMetrics, BinderyError> {
        let points = loop_points(model, edge_loop)?;
        Ok(surface_metrics(&points, 0.0))
    }

    fn face(&self, model: &GeometryModel, face: GeometryId) -> Result<SurfaceMetrics, BinderyError> {
        let (boundary, holes) = face_loops(model, face)?;
        let outer = loop_points(model, boundary)?;
        let mut hole_area = 0.0;
        for hole in holes {
            hole_area += polygon_area(&loop_points(model, hole)?);
        }
        Ok(surface_metrics(&outer, hole_area))
    }

    fn volume(
        &self,
        model: &GeometryModel,
        volume: GeometryId,
    ) -> Result<VolumeMetrics, BinderyError> {
        let mut shells = Vec::new();
        for (face, orientation) in volume_faces(model, volume)? {
            let (boundary, holes) = face_loops(model, face)?;
            let mut outer = loop_points(model, boundary)?;
            if orientation == Orientation::Reversed {
                outer.reverse();
            }
            let mut hole_area = 0.0;
            for hole in holes {
                hole_area += polygon_area(&loop_points(model, hole)?);
            }
            shells.push((outer, hole_area));
        }

        let all_z = shells.iter().flat_map(|(points, _)| points.iter().map(|p| p.z));
        let (floor, ceiling) = min_max(all_z).unwrap_or((0.0, 0.0));
        let height = ceiling - floor;

        let signed: f64 = shells.iter().map(|(points, _)| signed_volume(points)).sum();
        let volume_gross = signed.abs();

        let mut area_gross = 0.0;
        let mut area_net = 0.0;
        let mut perimeter = 0.0;
        for (points, hole_area) in &shells {
            let lies_on_floor = points.iter().all(|p| (p.z - floor).abs() <= FLAT_TOLERANCE);
            if points.len() >= 3 && lies_on_floor {
                let area = polygon_area(points);
                area_gross += area;
                area_net += area - hole_area;
                perimeter += polygon_perimeter(points);
            }
        }
        if area_gross <= 0.0 && height > FLAT_TOLERANCE {
            area_gross = volume_gross / height;
            area_net = area_gross;
        }

        Ok(VolumeMetrics {
            floor_elevation: floor,
            ceiling_elevation: ceiling,
            height_net: height,
            height_gross: height,
            height_ref: height,
            perimeter,
            area_gross,
            area_net,
            area_ref: area_net,
            volume_gross,
            volume_net: volume_gross,
            volume_netnet: area_net * height,
            volume_ref: volume_gross,
        })
    }
}

fn surface_metrics(points: &[Vec3], hole_area: f64) -> SurfaceMetrics {
    let outer_area = polygon_area(points);
    let (width, height) = in_plane_extents(points);
    let (floor, ceiling) = min_max(points.iter().map(|p| p.z)).unwrap_or((0.0, 0.0));
    let net = (outer_area - hole_area).max(0.0);
    SurfaceMetrics {
        area: Extent {
            min: net,
            reference: net,
            max: outer_area,
        },
        width: Extent::uniform(width),
        height: Extent::uniform(height),
        floor_elevation: floor,
        ceiling_elevation: ceiling,
    }
}

/// Newell normal of a polygon; its length is twice the polygon area.
fn newell_normal(points: &[Vec3]) -> Vec3 {
    let mut normal = Vec3::ZERO;
    for (i, current) in points.iter().enumerate() {
        let next = points[(i + 1) % points.len()];
        normal = normal + current.cross(next);
    }
    normal
}

fn polygon_area(points: &[Vec3]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    newell_normal(points).length() * 0.5
}

fn polygon_perimeter(points: &[Vec3]) -> f64 {
    points
        .iter()
        .enumerate()
        .map(|(i, p)| (points[(i + 1) % points.len()] - *p).length())
        .sum()
}

/// Signed contribution of one planar face to the enclosed volume.
fn signed_volume(points: &[Vec3]) -> f64 {
    let Some((origin, rest)) = points.split_first() else {
        return 0.0;
    };
    rest.windows(2)
        .map(|pair| origin.dot(pair[0].cross(pair[1])) / 6.0)
        .sum()
}

fn in_plane_extents(points: &[Vec3]) -> (f64, f64) {
    let Some(normal) = newell_normal(points).normalized() else {
        let xs = min_max(points.iter().map(|p| p.x)).unwrap_or((0.0, 0.0));
        let ys = min_max(points.iter().map(|p| p.y)).unwrap_or((0.0, 0.0));
        let zs = min_max(points.iter().map(|p| p.z)).unwrap_or((0.0, 0.0));
        let horizontal = (xs.1 - xs.0).max(ys.1 - ys.0);
        return (horizontal, zs.1 - zs.0);
    };
    let up = Vec3::new(0.0, 0.0, 1.0);
    let projected_up = up - normal * normal.dot(up);
    let height_axis = projected_up.normalized().unwrap_or_else(|| {
        let north = Vec3::new(0.0, 1.0, 0.0);
        (north - normal * normal.dot(north))
            .normalized()
            .unwrap_or(north)
    });
    let width_axis = height_axis.cross(normal);
    let span = |axis: Vec3| {
        min_max(points.iter().map(|p| p.dot(axis)))
            .map(|(lo, hi)| hi - lo)
            .unwrap_or(0.0)
    };
    (span(width_axis), span(height_axis))
}

fn min_max(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    values.fold(None, |acc, v| match acc {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ModelId;

    const EPS: f64 = 1e-9;

    fn quad(model: &mut GeometryModel, corners: [Vec3; 4]) -> GeometryId {
        let vertices: Vec<_> = corners.iter().map(|c| model.add_vertex("v", *c)).collect();
        let edges: Vec<_> = (0..4)
            .map(|i| model.add_edge("e", vertices[i], vertices[(i + 1) % 4]).expect("edge"))
            .collect();
        model.add_edge_loop("loop", edges).expect("loop")
    }

    #[test]
    fn vertical_wall_measures_width_and_height() {
        let mut model = GeometryModel::new(ModelId(1), "m");
        let boundary = quad(
            &mut model,
            [
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(4.0, 0.0, 0.0),
                Vec3::new(4.0, 0.0, 3.0),
                Vec3::new(0.0, 0.0, 3.0),
            ],
        );
        let face = model.add_face("wall", boundary, vec![]).expect("face");

        let metrics = PlanarMeasurements.face(&model, face).expect("measure");

        assert!((metrics.area.reference - 12.0).abs() < EPS);
        assert!((metrics.width.reference - 4.0).abs() < EPS);
        assert!((metrics.height.reference - 3.0).abs() < EPS);
        assert!((metrics.ceiling_elevation - 3.0).abs() < EPS);
    }

    #[test]
    fn holes_reduce_the_net_area() {
        let mut model = GeometryModel::new(ModelId(1), "m");
        let outer = quad(
            &mut model,
            [
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(4.0, 0.0, 0.0),
                Vec3::new(4.0, 4.0, 0.0),
                Vec3::new(0.0, 4.0, 0.0),
            ],
        );
        let hole = quad(
            &mut model,
            [
                Vec3::new(1.0, 1.0, 0.0),
                Vec3::new(2.0, 1.0, 0.0),
                Vec3::new(2.0, 2.0, 0.0),
                Vec3::new(1.0, 2.0, 0.0),
            ],
        );
        let face = model.add_face("slab", outer, vec![hole]).expect("face");

        let metrics = PlanarMeasurements.face(&model, face).expect("measure");

        assert!((metrics.area.max - 16.0).abs() < EPS);
        assert!((metrics.area.min - 15.0).abs() < EPS);
    }

    #[test]
    fn edge_length_is_euclidean() {
        let mut model = GeometryModel::new(ModelId(1), "m");
        let a = model.add_vertex("a", Vec3::ZERO);
        let b = model.add_vertex("b", Vec3::new(3.0, 4.0, 0.0));
        let edge = model.add_edge("ab", a, b).expect("edge");

        let metrics = PlanarMeasurements.edge(&model, edge).expect("measure");
        assert!((metrics.length.reference - 5.0).abs() < EPS);
    }

    #[test]
    fn box_volume_metrics() {
        let mut model = GeometryModel::new(ModelId(1), "m");
        let volume = crate::geometry::build::add_box(
            &mut model,
            "room",
            Vec3::new(0.0, 0.0, 1.0),
            Vec3::new(5.0, 4.0, 4.0),
        )
        .expect("box");

        let metrics = PlanarMeasurements.volume(&model, volume).expect("measure");

        assert!((metrics.floor_elevation - 1.0).abs() < EPS);
        assert!((metrics.ceiling_elevation - 4.0).abs() < EPS);
        assert!((metrics.height_gross - 3.0).abs() < EPS);
        assert!((metrics.area_gross - 20.0).abs() < EPS);
        assert!((metrics.perimeter - 18.0).abs() < EPS);
        assert!((metrics.volume_gross - 60.0).abs() < EPS);
        assert!((metrics.volume_netnet - 60.0).abs() < EPS);
    }
}
