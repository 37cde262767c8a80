//! # Geometric Graph
//!
//! The boundary-representation side of the exchange: primitives, the model
//! arena that owns them, topology walks over it, and shape builders.

pub mod build;
pub mod model;
pub mod primitive;
pub mod topology;

pub use model::{BatchScope, GeometryEvent, GeometryEventKind, GeometryModel};
pub use primitive::{GeometryKind, Orientation, Primitive, Shape};
