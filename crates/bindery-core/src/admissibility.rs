//! # Admissibility Evaluator
//!
//! Classifies a candidate (component, primitive) pairing, together with both
//! parents, into a set of problem flags.
//!
//! The evaluator is pure and total: it never fails, never short-circuits, and
//! reports every problem at once so a caller can display all of them.
//!
//! ## Rules
//!
//! | Instance type | Allowed primitives |
//! |---------------|--------------------|
//! | Volume, Space | Volume |
//! | Surface | Face, EdgeLoop, Edge, Vertex |
//! | Line | Edge, Polyline |
//! | Point | Vertex |
//! | NetworkNode | Vertex |
//! | NetworkEdge | Polyline, Edge |
//! | None | nothing |

use crate::geometry::{GeometryKind, Primitive};
use crate::semantic::Component;
use crate::{EntityId, GeometricReference};
use bitflags::bitflags;
use serde::{Deserialize, Serialize};

// =============================================================================
// INSTANCE TYPE
// =============================================================================

/// What kind of geometry a component may be bound to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub enum InstanceType {
    /// Not bindable; as a parent it accepts any child.
    #[default]
    None,
    /// Described by a volume.
    Volume,
    /// A volume treated as an architectural space (aggregate).
    Space,
    /// Described by a face, edge loop, edge or vertex.
    Surface,
    /// Described by an edge or polyline.
    Line,
    /// Described by a vertex.
    Point,
    /// Realised by a flow-network node.
    NetworkNode,
    /// Realised by a flow-network edge.
    NetworkEdge,
}

impl InstanceType {
    /// Primitive kinds a component of this type may be bound to.
    #[must_use]
    pub fn allowed_kinds(self) -> &'static [GeometryKind] {
        use GeometryKind as K;
        match self {
            Self::None => &[],
            Self::Volume | Self::Space => &[K::Volume],
            Self::Surface => &[K::Face, K::EdgeLoop, K::Edge, K::Vertex],
            Self::Line => &[K::Edge, K::Polyline],
            Self::Point | Self::NetworkNode => &[K::Vertex],
            Self::NetworkEdge => &[K::Polyline, K::Edge],
        }
    }

    #[must_use]
    pub fn accepts(self, kind: GeometryKind) -> bool {
        self.allowed_kinds().contains(&kind)
    }

    /// Whether a child of type `child` may live under a parent of this type.
    #[must_use]
    pub fn accepts_child(self, child: Self) -> bool {
        match self {
            Self::None => true,
            Self::Volume | Self::Space => matches!(child, Self::Volume | Self::Space),
            Self::Surface => matches!(child, Self::Surface | Self::Line | Self::Point),
            Self::Line => matches!(child, Self::Line | Self::Point),
            Self::Point => child == Self::Point,
            Self::NetworkNode | Self::NetworkEdge => {
                matches!(child, Self::NetworkNode | Self::NetworkEdge)
            }
        }
    }

    /// Whether components of this type take part in geometric bindings.
    #[must_use]
    pub fn is_bindable(self) -> bool {
        self != Self::None
    }
}

/// Whether a primitive of kind `child` may be nested in one of kind `parent`.
#[must_use]
pub fn geometry_contains(parent: GeometryKind, child: GeometryKind) -> bool {
    use GeometryKind as K;
    matches!(
        (parent, child),
        (K::Volume, K::Volume | K::Face | K::Edge | K::Vertex) | (K::Face, K::Face | K::EdgeLoop)
    )
}

// =============================================================================
// CONNECTION STATE
// =============================================================================

bitflags! {
    /// Problems found for a candidate binding. Empty means `Ok`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct ConnectionState: u32 {
        const SOURCE_MISSING                  = 1 << 0;
        const TARGET_MISSING                  = 1 << 1;
        const KIND_MISMATCH                   = 1 << 2;
        const PARENT_INSTANCE_MISMATCH        = 1 << 3;
        const PARENT_GEOMETRY_MISMATCH        = 1 << 4;
        const PARENT_GEOMETRY_MISSING         = 1 << 5;
        const PARENT_ENTITY_MISSING           = 1 << 6;
        const DUPLICATE_ENTITY_BINDING        = 1 << 7;
        const DUPLICATE_GEOMETRY_BINDING      = 1 << 8;
        const GENERATED_SUBSTRUCTURE_LEFTOVER = 1 << 9;
    }
}

impl ConnectionState {
    /// The empty set.
    pub const OK: Self = Self::empty();

    /// Flags that are advisory and do not block a binding.
    pub const WARNINGS: Self = Self::GENERATED_SUBSTRUCTURE_LEFTOVER;

    /// True when no blocking flag is set.
    #[must_use]
    pub fn is_admissible(self) -> bool {
        self.difference(Self::WARNINGS).is_empty()
    }

    /// Human-readable names of the set flags.
    #[must_use]
    pub fn describe(self) -> Vec<&'static str> {
        self.iter_names().map(|(name, _)| name).collect()
    }
}

// =============================================================================
// EVALUATION
// =============================================================================

/// Evaluate a candidate binding.
///
/// Nullness of each side contributes independently; kind and parent checks
/// run whenever their inputs are present. All applicable bits are OR-ed.
#[must_use]
pub fn evaluate(
    parent_entity: Option<&Component>,
    parent_primitive: Option<&Primitive>,
    entity: Option<&Component>,
    primitive: Option<&Primitive>,
) -> ConnectionState {
    let mut state = ConnectionState::OK;

    if entity.is_none() {
        state |= ConnectionState::SOURCE_MISSING;
    }
    if primitive.is_none() {
        state |= ConnectionState::TARGET_MISSING;
    }
    if let (Some(entity), Some(primitive)) = (entity, primitive) {
        if !entity.instance_type.accepts(primitive.kind()) {
            state |= ConnectionState::KIND_MISMATCH;
        }
    }

    if let (Some(parent), Some(entity)) = (parent_entity, entity) {
        if !parent.instance_type.accepts_child(entity.instance_type) {
            state |= ConnectionState::PARENT_INSTANCE_MISMATCH;
        }
    }

    if let (Some(parent), Some(primitive)) = (parent_primitive, primitive) {
        if !geometry_contains(parent.kind(), primitive.kind()) {
            state |= ConnectionState::PARENT_GEOMETRY_MISMATCH;
        }
    }

    match (parent_entity, parent_primitive) {
        (Some(parent), None) if parent.instance_type.is_bindable() => {
            state |= ConnectionState::PARENT_GEOMETRY_MISSING;
        }
        (None, Some(_)) => state |= ConnectionState::PARENT_ENTITY_MISSING,
        _ => {}
    }

    if entity.is_some_and(has_leftover_generated_content) {
        state |= ConnectionState::GENERATED_SUBSTRUCTURE_LEFTOVER;
    }

    state
}

/// One existing binding, as seen by the duplicate check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExistingBinding {
    pub entity: EntityId,
    pub target: GeometricReference,
}

/// Check a candidate against the bindings that already exist.
#[must_use]
pub fn check_duplicates(
    entity: EntityId,
    target: GeometricReference,
    existing: &[ExistingBinding],
) -> ConnectionState {
    let mut state = ConnectionState::OK;
    for binding in existing {
        if binding.entity == entity && binding.target != target {
            state |= ConnectionState::DUPLICATE_ENTITY_BINDING;
        }
        if binding.target == target && binding.entity != entity {
            state |= ConnectionState::DUPLICATE_GEOMETRY_BINDING;
        }
    }
    state
}

/// Generated parameters on an entity without any instance were left behind
/// by an earlier binding.
fn has_leftover_generated_content(entity: &Component) -> bool {
    entity.instances.is_empty() && entity.parameters.values().any(|p| p.generated)
}

// =============================================================================
// TESTS
// =============================================================================
