//! Derived parameters per primitive kind.
//!
//! Names are reserved: they are created as generated, read-only parameters
//! on first write and overwritten on every later pass.

use crate::measure::{EdgeMetrics, SurfaceMetrics, VolumeMetrics};

pub const UNIT_LENGTH: &str = "m";
pub const UNIT_AREA: &str = "m²";
pub const UNIT_VOLUME: &str = "m³";

/// One derived value ready to be written.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DerivedParameter {
    pub name: &'static str,
    pub unit: &'static str,
    pub value: f64,
}

const fn derived(name: &'static str, unit: &'static str, value: f64) -> DerivedParameter {
    DerivedParameter { name, unit, value }
}

#[must_use]
pub fn edge_parameters(metrics: &EdgeMetrics) -> Vec<DerivedParameter> {
    vec![
        derived("length", UNIT_LENGTH, metrics.length.reference),
        derived("length_min", UNIT_LENGTH, metrics.length.min),
        derived("length_max", UNIT_LENGTH, metrics.length.max),
    ]
}

#[must_use]
pub fn edge_loop_parameters(
    metrics: &SurfaceMetrics,
    reference_elevation: f64,
) -> Vec<DerivedParameter> {
    vec![
        derived("area", UNIT_AREA, metrics.area.reference),
        derived("area_min", UNIT_AREA, metrics.area.min),
        derived("area_max", UNIT_AREA, metrics.area.max),
        derived("width", UNIT_LENGTH, metrics.width.reference),
        derived("height", UNIT_LENGTH, metrics.height.reference),
        derived(
            "floor_elevation_ref",
            UNIT_LENGTH,
            metrics.floor_elevation - reference_elevation,
        ),
        derived(
            "ceiling_elevation_ref",
            UNIT_LENGTH,
            metrics.ceiling_elevation - reference_elevation,
        ),
    ]
}

#[must_use]
pub fn face_parameters(metrics: &SurfaceMetrics, reference_elevation: f64) -> Vec<DerivedParameter> {
    vec![
        derived("area", UNIT_AREA, metrics.area.reference),
        derived("area_min", UNIT_AREA, metrics.area.min),
        derived("area_max", UNIT_AREA, metrics.area.max),
        derived("width_min", UNIT_LENGTH, metrics.width.min),
        derived("width", UNIT_LENGTH, metrics.width.reference),
        derived("width_max", UNIT_LENGTH, metrics.width.max),
        derived("height_min", UNIT_LENGTH, metrics.height.min),
        derived("height", UNIT_LENGTH, metrics.height.reference),
        derived("height_max", UNIT_LENGTH, metrics.height.max),
        derived(
            "floor_elevation_ref",
            UNIT_LENGTH,
            metrics.floor_elevation - reference_elevation,
        ),
        derived(
            "ceiling_elevation_ref",
            UNIT_LENGTH,
            metrics.ceiling_elevation - reference_elevation,
        ),
    ]
}

#[must_use]
pub fn volume_parameters(metrics: &VolumeMetrics, reference_elevation: f64) -> Vec<DerivedParameter> {
    vec![
        derived("floor_elevation_abs", UNIT_LENGTH, metrics.floor_elevation),
        derived("ceiling_elevation_abs", UNIT_LENGTH, metrics.ceiling_elevation),
        derived(
            "floor_elevation_ref",
            UNIT_LENGTH,
            metrics.floor_elevation - reference_elevation,
        ),
        derived(
            "ceiling_elevation_ref",
            UNIT_LENGTH,
            metrics.ceiling_elevation - reference_elevation,
        ),
        derived("height_net", UNIT_LENGTH, metrics.height_net),
        derived("height_gross", UNIT_LENGTH, metrics.height_gross),
        derived("height_ref", UNIT_LENGTH, metrics.height_ref),
        derived("perimeter", UNIT_LENGTH, metrics.perimeter),
        derived("area_gross", UNIT_AREA, metrics.area_gross),
        derived("area_net", UNIT_AREA, metrics.area_net),
        derived("area_ref", UNIT_AREA, metrics.area_ref),
        derived("volume_gross", UNIT_VOLUME, metrics.volume_gross),
        derived("volume_net", UNIT_VOLUME, metrics.volume_net),
        derived("volume_netnet", UNIT_VOLUME, metrics.volume_netnet),
        derived("volume_ref", UNIT_VOLUME, metrics.volume_ref),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::measure::Extent;

    #[test]
    fn reference_elevations_are_relative() {
        let metrics = SurfaceMetrics {
            area: Extent::uniform(6.0),
            width: Extent::uniform(3.0),
            height: Extent::uniform(2.0),
            floor_elevation: 10.0,
            ceiling_elevation: 12.0,
        };
        let params = edge_loop_parameters(&metrics, 9.5);
        let floor = params
            .iter()
            .find(|p| p.name == "floor_elevation_ref")
            .expect("floor");
        assert_eq!(floor.value, 0.5);
        assert_eq!(params.len(), 7);
    }

    #[test]
    fn volume_names_are_unique() {
        let params = volume_parameters(&VolumeMetrics::default(), 0.0);
        let mut names: Vec<_> = params.iter().map(|p| p.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), 15);
    }
}
