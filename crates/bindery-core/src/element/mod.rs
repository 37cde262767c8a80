//! # Network Element Bindings
//!
//! One binding per network node or edge, owned by the
//! [`NetworkMirror`](crate::mirror::NetworkMirror). The connector's target is
//! the element's vertex (nodes) or polyline (edges); its source is the
//! element's semantic content, when it has any.

pub mod edge;
pub mod node;

use crate::connector::{Connector, SyncContext, TargetAvailability};
use crate::semantic::{InstanceConnection, PlacementState, SemanticGraph};
use crate::{BinderyError, ColorSource, ElementId, EntityId, GeometricReference, GeometryId};

pub use edge::EdgeBinding;
pub use node::NodeBinding;

/// The binding of one network element.
#[derive(Debug, Clone)]
pub enum ElementBinding {
    Node(NodeBinding),
    Edge(EdgeBinding),
}

impl ElementBinding {
    #[must_use]
    pub fn element(&self) -> ElementId {
        match self {
            Self::Node(binding) => binding.element(),
            Self::Edge(binding) => binding.element(),
        }
    }

    #[must_use]
    pub fn connector(&self) -> &Connector {
        match self {
            Self::Node(binding) => binding.connector(),
            Self::Edge(binding) => binding.connector(),
        }
    }

    /// The vertex or polyline this binding owns.
    #[must_use]
    pub fn primitive(&self) -> GeometryId {
        self.connector().target().geometry
    }

    /// Point the binding at another primitive.
    pub fn retarget(
        &mut self,
        semantic: &mut SemanticGraph,
        target: GeometricReference,
    ) -> Result<(), BinderyError> {
        match self {
            Self::Node(binding) => binding.retarget(semantic, target),
            Self::Edge(binding) => binding.retarget(semantic, target),
        }
    }

    /// Teardown: remove the content instance this binding placed.
    pub fn before_deletion(&mut self, semantic: &mut SemanticGraph) -> Result<(), BinderyError> {
        let connector = match self {
            Self::Node(binding) => binding.connector_mut(),
            Self::Edge(binding) => binding.connector_mut(),
        };
        connector.on_target_deleting();
        release_content(connector, semantic)
    }
}

// =============================================================================
// SHARED HELPERS
// =============================================================================

/// Remove the instance the connector's source has at its target, if any.
///
/// The content may already be gone (it is deleted before its bindings are
/// told), so a missing entity or instance is not an error here.
pub(crate) fn release_content(
    connector: &Connector,
    semantic: &mut SemanticGraph,
) -> Result<(), BinderyError> {
    let Some(entity) = connector.source() else {
        return Ok(());
    };
    let target = connector.target();
    let placed = semantic
        .component(entity)
        .is_some_and(|c| c.instance_at(target).is_some());
    if placed {
        semantic
            .without_access_checks()
            .remove_instance(entity, target)?;
    }
    Ok(())
}

/// Move the connector's source to `content` and make sure the content has
/// one valid instance at the target.
///
/// Returns `true` when the instance had to be created.
pub(crate) fn sync_content(
    connector: &mut Connector,
    cx: &mut SyncContext<'_>,
    content: Option<EntityId>,
    name: &str,
) -> Result<bool, BinderyError> {
    let content = content.filter(|entity| cx.semantic.contains(*entity));
    if connector.source() != content {
        release_content(connector, cx.semantic)?;
        connector.set_source(content);
    }
    let Some(entity) = content else {
        return Ok(false);
    };

    let target = connector.target();
    let mut scope = cx.semantic.without_access_checks();
    let created = scope.get(entity)?.instance_at(target).is_none();
    if created {
        scope.add_instance(entity, name, target)?;
    }
    scope.set_instance_connection(entity, target, InstanceConnection::Available)?;
    scope.set_placement_state(entity, target, PlacementState::Valid)?;
    connector.set_availability(TargetAvailability::Available);
    Ok(created)
}

/// Color of an element's primitives: inherited when it has content,
/// highlighted when it is empty.
pub(crate) fn content_color(cx: &SyncContext<'_>, content: Option<EntityId>) -> ColorSource {
    match content {
        Some(_) => ColorSource::FromParent,
        None => ColorSource::Explicit(cx.config.empty_content_color),
    }
}
