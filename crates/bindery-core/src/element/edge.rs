//! Edge bindings: a network edge's polyline, kept running from the start
//! node's vertex to the end node's vertex.

use super::{content_color, release_content, sync_content};
use crate::connector::{Connector, SyncContext, SynchronizationState};
use crate::geometry::topology::{polyline_points, reorient_polyline};
use crate::network::NetworkGraph;
use crate::semantic::SemanticGraph;
use crate::{BinderyError, ElementId, GeometricReference, GeometryId};

#[derive(Debug, Clone)]
pub struct EdgeBinding {
    element: ElementId,
    connector: Connector,
}

impl EdgeBinding {
    #[must_use]
    pub fn new(element: ElementId, polyline: GeometricReference) -> Self {
        Self {
            element,
            connector: Connector::new(None, polyline),
        }
    }

    #[must_use]
    pub fn element(&self) -> ElementId {
        self.element
    }

    #[must_use]
    pub fn connector(&self) -> &Connector {
        &self.connector
    }

    pub(crate) fn connector_mut(&mut self) -> &mut Connector {
        &mut self.connector
    }

    #[must_use]
    pub fn polyline(&self) -> GeometryId {
        self.connector.target().geometry
    }

    pub fn retarget(
        &mut self,
        semantic: &mut SemanticGraph,
        polyline: GeometricReference,
    ) -> Result<(), BinderyError> {
        if self.connector.target() != polyline {
            release_content(&self.connector, semantic)?;
            self.connector.retarget(polyline);
        }
        Ok(())
    }

    /// Bring the polyline's direction, name, content instance, path and
    /// color in line with the network edge.
    pub fn synchronize(
        &mut self,
        cx: &mut SyncContext<'_>,
        network: &NetworkGraph,
        start: GeometryId,
        end: GeometryId,
    ) -> Result<(), BinderyError> {
        let element = network.get(self.element)?;
        self.on_edge_redirected(cx, start, end)?;
        cx.model.set_name(self.polyline(), element.name.as_str())?;
        sync_content(&mut self.connector, cx, element.content, &element.name)?;
        self.refresh(cx)?;
        self.connector.set_state(SynchronizationState::Synchronized);
        Ok(())
    }

    /// The edge now connects other vertices: rewire the polyline so it runs
    /// from `start` to `end`. The network edge itself is left alone.
    pub fn on_edge_redirected(
        &mut self,
        cx: &mut SyncContext<'_>,
        start: GeometryId,
        end: GeometryId,
    ) -> Result<bool, BinderyError> {
        let changed = reorient_polyline(cx.model, self.polyline(), start, end)?;
        if changed {
            tracing::debug!(
                element = %self.element,
                polyline = %self.polyline(),
                "polyline reoriented"
            );
        }
        Ok(changed)
    }

    /// Re-derive the content instance's path and the polyline color.
    pub fn refresh(&mut self, cx: &mut SyncContext<'_>) -> Result<(), BinderyError> {
        let polyline = self.polyline();
        if !cx.model.contains(polyline) {
            return Ok(());
        }
        let content = self.connector.source();
        if let Some(entity) = content {
            let target = self.connector.target();
            let placed = cx
                .semantic
                .component(entity)
                .is_some_and(|c| c.instance_at(target).is_some());
            if placed {
                let path = polyline_points(&*cx.model, polyline)?;
                cx.semantic
                    .without_access_checks()
                    .set_instance_path(entity, target, path)?;
            }
        }
        let color = content_color(cx, content);
        cx.model.set_color(polyline, color)
    }
}
