//! # Flow Network
//!
//! Hierarchical graph of nodes, edges and nested sub-networks describing a
//! piping or energy system. Elements may carry semantic content and record
//! the geometric primitive that represents them.

pub mod element;
pub mod graph;

pub use element::{ElementKind, ElementShape, NetworkElement};
pub use graph::{NetworkEvent, NetworkEventKind, NetworkGraph};
