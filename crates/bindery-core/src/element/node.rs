//! Node bindings: a network node's vertex, its proxy shape, and the
//! two-way size/rotation link between the proxy and the content instance.

use super::{content_color, release_content, sync_content};
use crate::connector::{Connector, SyncContext, SynchronizationState};
use crate::geometry::{GeometryModel, Primitive, Shape};
use crate::network::NetworkGraph;
use crate::proxy::{generate_cube, update_cube, update_proxy_combined};
use crate::semantic::{InstanceTransform, SemanticGraph};
use crate::{
    BinderyError, ElementId, GeometricReference, GeometryId, PropagationDirection,
    PropagationToken, Vec3,
};

#[derive(Debug, Clone)]
pub struct NodeBinding {
    element: ElementId,
    connector: Connector,
    proxy: Option<GeometryId>,
    /// Writes pushed from the instance into the proxy.
    proxy_pushes: u64,
    /// Writes pushed from the proxy into the instance.
    instance_pushes: u64,
}

impl NodeBinding {
    #[must_use]
    pub fn new(element: ElementId, vertex: GeometricReference) -> Self {
        Self {
            element,
            connector: Connector::new(None, vertex),
            proxy: None,
            proxy_pushes: 0,
            instance_pushes: 0,
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
    pub fn vertex(&self) -> GeometryId {
        self.connector.target().geometry
    }

    #[must_use]
    pub fn proxy(&self) -> Option<GeometryId> {
        self.proxy
    }

    #[must_use]
    pub fn proxy_pushes(&self) -> u64 {
        self.proxy_pushes
    }

    #[must_use]
    pub fn instance_pushes(&self) -> u64 {
        self.instance_pushes
    }

    fn token(&self, direction: PropagationDirection) -> PropagationToken {
        PropagationToken::new(self.element, direction)
    }

    /// Move the binding onto another vertex; the proxy is picked up again on
    /// the next synchronization.
    pub fn retarget(
        &mut self,
        semantic: &mut SemanticGraph,
        vertex: GeometricReference,
    ) -> Result<(), BinderyError> {
        if self.connector.target() != vertex {
            release_content(&self.connector, semantic)?;
            self.connector.retarget(vertex);
            self.proxy = None;
        }
        Ok(())
    }

    /// Bring vertex name, content instance, proxy shape and colors in line
    /// with the network node.
    ///
    /// Returns the asset import failures as warning messages.
    pub fn synchronize(
        &mut self,
        cx: &mut SyncContext<'_>,
        network: &NetworkGraph,
    ) -> Result<Vec<String>, BinderyError> {
        let element = network.get(self.element)?;
        let vertex = self.vertex();
        cx.model.set_name(vertex, element.name.as_str())?;
        let created = sync_content(&mut self.connector, cx, element.content, &element.name)?;
        let content = self.connector.source();

        let proxy = match cx.model.attached_proxy(vertex)? {
            Some(proxy) => proxy,
            None => generate_cube(
                cx.model,
                cx.importer,
                vertex,
                &format!("{} proxy", element.name),
                cx.config.default_proxy_size,
            )?,
        };
        self.proxy = Some(proxy);

        let files: Vec<String> = content
            .and_then(|entity| cx.semantic.component(entity))
            .map(|component| {
                component
                    .files
                    .iter()
                    .filter(|file| cx.importer.is_recognized(file))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        let instance = self.instance_transform(&*cx.semantic);
        let desired = match instance {
            Some(transform) if !created => transform,
            _ => {
                let (size, rotation) = proxy_transform(&*cx.model, proxy)?;
                InstanceTransform { size, rotation }
            }
        };

        let mut warnings = Vec::new();
        if files.is_empty() {
            update_cube(cx.model, cx.importer, proxy, desired.size, desired.rotation)?;
        } else {
            warnings = update_proxy_combined(cx.model, cx.importer, proxy, &files)?
                .into_iter()
                .map(|failure| format!("{}: {failure}", element.name))
                .collect();
            cx.model
                .set_proxy_transform(proxy, desired.size, desired.rotation, None)?;
        }

        // A fresh instance adopts the proxy's transform.
        if created {
            if let Some(entity) = content {
                cx.semantic.set_instance_transform(
                    entity,
                    self.connector.target(),
                    desired,
                    Some(self.token(PropagationDirection::ProxyToInstance)),
                )?;
            }
        }

        let color = content_color(cx, content);
        cx.model.set_color(vertex, color)?;
        cx.model.set_color(proxy, color)?;
        self.connector.set_state(SynchronizationState::Synchronized);
        tracing::debug!(
            element = %self.element,
            vertex = %vertex,
            proxy = %proxy,
            "node synchronized"
        );
        Ok(warnings)
    }

    fn instance_transform(&self, semantic: &SemanticGraph) -> Option<InstanceTransform> {
        let entity = self.connector.source()?;
        semantic
            .component(entity)?
            .instance_at(self.connector.target())
            .map(|instance| instance.transform)
    }

    /// The content instance's size or rotation changed: push it into the
    /// proxy. Returns whether a write happened.
    pub fn on_instance_transform_changed(
        &mut self,
        cx: &mut SyncContext<'_>,
        origin: Option<PropagationToken>,
    ) -> Result<bool, BinderyError> {
        if origin == Some(self.token(PropagationDirection::ProxyToInstance)) {
            return Ok(false);
        }
        let (Some(proxy), Some(transform)) = (self.proxy, self.instance_transform(&*cx.semantic))
        else {
            return Ok(false);
        };
        if !cx.model.contains(proxy) {
            return Ok(false);
        }
        if proxy_transform(&*cx.model, proxy)? == (transform.size, transform.rotation) {
            return Ok(false);
        }
        cx.model.set_proxy_transform(
            proxy,
            transform.size,
            transform.rotation,
            Some(self.token(PropagationDirection::InstanceToProxy)),
        )?;
        self.proxy_pushes = self.proxy_pushes.saturating_add(1);
        Ok(true)
    }

    /// The proxy's size or rotation changed: push it into the content
    /// instance. Returns whether a write happened.
    pub fn on_proxy_changed(
        &mut self,
        cx: &mut SyncContext<'_>,
        origin: Option<PropagationToken>,
    ) -> Result<bool, BinderyError> {
        if origin == Some(self.token(PropagationDirection::InstanceToProxy)) {
            return Ok(false);
        }
        let (Some(proxy), Some(entity)) = (self.proxy, self.connector.source()) else {
            return Ok(false);
        };
        let Some(current) = self.instance_transform(&*cx.semantic) else {
            return Ok(false);
        };
        if !cx.model.contains(proxy) {
            return Ok(false);
        }
        let (size, rotation) = proxy_transform(&*cx.model, proxy)?;
        let wanted = InstanceTransform { size, rotation };
        if current == wanted {
            return Ok(false);
        }
        cx.semantic.set_instance_transform(
            entity,
            self.connector.target(),
            wanted,
            Some(self.token(PropagationDirection::ProxyToInstance)),
        )?;
        self.instance_pushes = self.instance_pushes.saturating_add(1);
        Ok(true)
    }
}

/// Size and rotation of a proxy shape.
fn proxy_transform(
    model: &GeometryModel,
    proxy: GeometryId,
) -> Result<(Vec3, Vec3), BinderyError> {
    match model.get(proxy)? {
        Primitive {
            shape: Shape::ProxyShape { size, rotation, .. },
            ..
        } => Ok((*size, *rotation)),
        other => Err(BinderyError::InvalidTopology(format!(
            "{} is not a proxy shape",
            other.id
        ))),
    }
}
