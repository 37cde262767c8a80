//! # bindery-core
//!
//! The synchronization engine for Bindery - THE LOGIC.
//!
//! Binds three independently editable graphs together:
//! - the semantic graph of hierarchical, parameterized components
//! - the boundary-representation geometry of one or more models
//! - flow networks (nodes, edges, nested sub-networks) mirrored into geometry
//!
//! ## Layout
//!
//! - `admissibility` judges candidate bindings
//! - `descriptive` derives parameters from geometry and writes them back
//! - `mirror` and `element` keep a flow network represented as vertices,
//!   polylines and proxy shapes
//! - `exchange` owns everything and routes change notifications
//!
//! ## Architectural Constraints
//!
//! - Single-threaded and synchronous; debounced updates run on a virtual
//!   clock (`deferred::ManualScheduler`)
//! - Deterministic: `BTreeMap` arenas, every pass visits entities in
//!   identifier order
//! - No I/O besides reading asset files in `proxy::FsAssetImporter`
//! - Never installs a tracing subscriber

// =============================================================================
// MODULES
// =============================================================================

pub mod admissibility;
pub mod config;
pub mod connector;
pub mod deferred;
pub mod descriptive;
pub mod element;
pub mod events;
pub mod exchange;
pub mod geometry;
pub mod measure;
pub mod mirror;
pub mod network;
pub mod proxy;
pub mod semantic;
pub mod types;
pub mod warnings;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    BinderyError, BindingId, Color, ColorSource, ElementId, EntityId, GeometricReference,
    GeometryId, ModelId, PropagationDirection, PropagationToken, Vec3,
};

// =============================================================================
// RE-EXPORTS: Engine
// =============================================================================

pub use admissibility::{ConnectionState, InstanceType, check_duplicates, evaluate};
pub use config::ExchangeConfig;
pub use connector::{Connector, SyncContext, SynchronizationState, TargetAvailability};
pub use descriptive::{DescriptiveBinding, DescriptiveKind};
pub use exchange::Exchange;
pub use mirror::NetworkMirror;

// =============================================================================
// RE-EXPORTS: Collaborators
// =============================================================================

pub use deferred::{ManualScheduler, Scheduler};
pub use geometry::{GeometryEvent, GeometryEventKind, GeometryKind, GeometryModel, Primitive, Shape};
pub use measure::{Measurements, PlanarMeasurements};
pub use network::{ElementKind, NetworkGraph};
pub use proxy::{AssetImporter, FsAssetImporter};
pub use semantic::{Component, SemanticGraph};
pub use warnings::{WarningLog, WarningSink};
