//! # Core Type Definitions
//!
//! Identifiers, small value types and the error enum shared by every module:
//! - Graph identifiers (`EntityId`, `GeometryId`, `ModelId`, `ElementId`, `BindingId`)
//! - Cross-graph references (`GeometricReference`)
//! - Geometry values (`Vec3`, `Color`, `ColorSource`)
//! - Reentrancy tokens (`PropagationToken`)
//! - Error types (`BinderyError`)
//!
//! ## Determinism Guarantees
//!
//! All identifiers implement `Ord` so that every arena in the crate can be a
//! `BTreeMap` and every pass visits entities in the same order.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Mul, Sub};
use thiserror::Error;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Identifier of a component in the semantic graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(pub u64);

/// Identifier of a primitive, scoped to one geometric model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GeometryId(pub u64);

/// Identifier of a geometric model (the geometry file).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ModelId(pub u64);

/// Identifier of a flow-network element (node, edge or sub-network).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ElementId(pub u64);

/// Identifier of a descriptive binding owned by the exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BindingId(pub u64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entity#{}", self.0)
    }
}

impl fmt::Display for GeometryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "geometry#{}", self.0)
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "model#{}", self.0)
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "element#{}", self.0)
    }
}

/// Reference from the semantic or network side to one geometric primitive.
///
/// An absent reference is modelled as `Option<GeometricReference>`; there is
/// no "empty" sentinel value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GeometricReference {
    /// The geometry file the primitive lives in.
    pub model: ModelId,
    /// The model-local primitive identifier.
    pub geometry: GeometryId,
}

impl GeometricReference {
    /// Create a new reference.
    #[must_use]
    pub const fn new(model: ModelId, geometry: GeometryId) -> Self {
        Self { model, geometry }
    }
}

impl fmt::Display for GeometricReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.model, self.geometry)
    }
}

// =============================================================================
// GEOMETRY VALUES
// =============================================================================

/// A point or direction in model space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);
    pub const ONE: Self = Self::new(1.0, 1.0, 1.0);

    #[must_use]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    #[must_use]
    pub fn dot(self, other: Self) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    #[must_use]
    pub fn cross(self, other: Self) -> Self {
        Self::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    #[must_use]
    pub fn length(self) -> f64 {
        self.dot(self).sqrt()
    }

    /// Unit vector in the same direction, or `None` for a (near) zero vector.
    #[must_use]
    pub fn normalized(self) -> Option<Self> {
        let len = self.length();
        if len <= f64::EPSILON {
            None
        } else {
            Some(self * (1.0 / len))
        }
    }

    /// Component-wise comparison with an absolute tolerance.
    #[must_use]
    pub fn approx_eq(self, other: Self, tolerance: f64) -> bool {
        (self.x - other.x).abs() <= tolerance
            && (self.y - other.y).abs() <= tolerance
            && (self.z - other.z).abs() <= tolerance
    }
}

impl Add for Vec3 {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vec3 {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f64> for Vec3 {
    type Output = Self;

    fn mul(self, rhs: f64) -> Self {
        Self::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

/// An RGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    #[must_use]
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// How a primitive obtains its display color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ColorSource {
    /// Inherit the color of the owning layer/parent.
    #[default]
    FromParent,
    /// Use this exact color.
    Explicit(Color),
}

// =============================================================================
// PROPAGATION TOKENS
// =============================================================================

/// Direction of a transform push performed by a node binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PropagationDirection {
    /// Semantic instance size/rotation written into the proxy shape.
    InstanceToProxy,
    /// Proxy shape size/rotation written into the semantic instance.
    ProxyToInstance,
}

/// Marks a write as the echo of one specific propagation chain.
///
/// The graph that performs the write copies the token onto the change event
/// it raises; the originating binding ignores exactly that event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PropagationToken {
    /// The network element whose binding initiated the write.
    pub element: ElementId,
    pub direction: PropagationDirection,
}

impl PropagationToken {
    #[must_use]
    pub const fn new(element: ElementId, direction: PropagationDirection) -> Self {
        Self { element, direction }
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur while synchronizing the graphs.
///
/// Advisory conditions (inadmissible bindings, stale state) are *not* errors;
/// they are reported through `ConnectionState` and `SynchronizationState`.
/// Use [`BinderyError::is_fatal`] to tell the aborting classes apart from the
/// recoverable ones.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BinderyError {
    /// The requested component does not exist in the semantic graph.
    #[error("Component not found: {0}")]
    EntityNotFound(EntityId),

    /// The requested primitive does not exist in its model.
    #[error("Geometry not found: {0}")]
    GeometryNotFound(GeometricReference),

    /// The requested geometric model is not registered.
    #[error("Geometric model not found: {0}")]
    ModelNotFound(ModelId),

    /// The requested flow-network element does not exist.
    #[error("Network element not found: {0}")]
    ElementNotFound(ElementId),

    /// The requested binding does not exist.
    #[error("Binding not found: {0:?}")]
    BindingNotFound(BindingId),

    /// A binding expected an instance on its source that is not there.
    #[error("Instance could not be removed: {entity} has no instance placed at {reference}")]
    InstanceNotRemoved {
        entity: EntityId,
        reference: GeometricReference,
    },

    /// A binding expected a placement on its instance that is not there.
    #[error("Placement could not be removed: {entity} has no placement at {reference}")]
    PlacementNotRemoved {
        entity: EntityId,
        reference: GeometricReference,
    },

    /// A primitive or element from another model was handed to a binding.
    #[error("Cross-model reference: expected {expected}, found {found}")]
    CrossModelReference { expected: ModelId, found: ModelId },

    /// A write to a guarded parameter while access checking is enabled.
    #[error("Access denied: parameter '{parameter}' of {entity} is not writable")]
    AccessDenied { entity: EntityId, parameter: String },

    /// An asset file referenced by a component does not exist.
    #[error("File not found: {0}")]
    FileNotFound(String),

    /// An asset file exists but could not be imported.
    #[error("Import failed for '{file}': {reason}")]
    ImportFailed { file: String, reason: String },

    /// A geometric or network topology rule was violated.
    #[error("Invalid topology: {0}")]
    InvalidTopology(String),

    /// Event dispatch did not become quiescent.
    #[error("Event loop did not settle after {0} rounds")]
    EventLoopOverflow(usize),

    /// Invalid configuration value.
    #[error("Configuration error: {0}")]
    Config(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(String),

    /// A serialization or deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl BinderyError {
    /// Whether this error means the graphs can no longer be mirrored safely.
    ///
    /// Fatal errors abort a synchronization pass and propagate to the caller;
    /// the remaining ones are turned into warnings where they occur.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::InstanceNotRemoved { .. }
                | Self::PlacementNotRemoved { .. }
                | Self::CrossModelReference { .. }
                | Self::InvalidTopology(_)
                | Self::EventLoopOverflow(_)
        )
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vec3_cross_follows_right_hand_rule() {
        let x = Vec3::new(1.0, 0.0, 0.0);
        let y = Vec3::new(0.0, 1.0, 0.0);
        assert!(x.cross(y).approx_eq(Vec3::new(0.0, 0.0, 1.0), 1e-12));
    }

    #[test]
    fn zero_vector_has_no_direction() {
        assert!(Vec3::ZERO.normalized().is_none());
        let unit = Vec3::new(3.0, 0.0, 4.0).normalized().expect("direction");
        assert!((unit.length() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn fatal_classification() {
        let reference = GeometricReference::new(ModelId(1), GeometryId(2));
        assert!(
            BinderyError::InstanceNotRemoved {
                entity: EntityId(1),
                reference
            }
            .is_fatal()
        );
        assert!(
            BinderyError::CrossModelReference {
                expected: ModelId(1),
                found: ModelId(2)
            }
            .is_fatal()
        );
        assert!(!BinderyError::FileNotFound("a.obj".into()).is_fatal());
        assert!(
            !BinderyError::ImportFailed {
                file: "a.obj".into(),
                reason: "empty".into()
            }
            .is_fatal()
        );
    }

    #[test]
    fn reference_display_names_both_sides() {
        let reference = GeometricReference::new(ModelId(3), GeometryId(7));
        assert_eq!(reference.to_string(), "model#3/geometry#7");
    }
}
