//! # Exchange Configuration
//!
//! Project-wide settings read by the exchange and its bindings.
//!
//! Every field has a default, so a partial document (or none at all) is a
//! valid configuration.

use crate::deferred::UpdateMode;
use crate::{BinderyError, Color, Vec3};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Settings of one exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExchangeConfig {
    /// Debounce derived-parameter updates instead of applying them inline.
    pub enable_async_updates: bool,
    /// Debounce delay in milliseconds.
    pub update_delay_ms: u64,
    /// Dispatch rounds `Exchange::pump` may run before giving up.
    pub max_event_rounds: usize,
    /// Factor from network layout coordinates to model units.
    pub network_scale: f64,
    /// Elevation subtracted from absolute elevations to obtain reference
    /// elevations.
    pub reference_elevation: f64,
    /// Color of network elements without semantic content. Elements with
    /// content inherit their parent's color.
    pub empty_content_color: Color,
    /// Size of generated proxy cubes.
    pub default_proxy_size: Vec3,
    /// File extensions recognised as 3-D assets (lowercase, without dot).
    pub recognized_asset_extensions: Vec<String>,
    /// Directory that relative asset paths are resolved against.
    pub asset_root: Option<PathBuf>,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            enable_async_updates: false,
            update_delay_ms: 1000,
            max_event_rounds: 64,
            network_scale: 1.0,
            reference_elevation: 0.0,
            empty_content_color: Color::rgb(255, 0, 0),
            default_proxy_size: Vec3::ONE,
            recognized_asset_extensions: ["obj", "stl", "ply", "fbx", "gltf", "glb", "3ds"]
                .iter()
                .map(|ext| (*ext).to_string())
                .collect(),
            asset_root: None,
        }
    }
}

impl ExchangeConfig {
    /// Reject values the engine cannot work with.
    pub fn validate(&self) -> Result<(), BinderyError> {
        if self.max_event_rounds == 0 {
            return Err(BinderyError::Config(
                "max_event_rounds must be at least 1".to_string(),
            ));
        }
        if !self.network_scale.is_finite() || self.network_scale <= 0.0 {
            return Err(BinderyError::Config(format!(
                "network_scale must be a positive number, got {}",
                self.network_scale
            )));
        }
        if !self.reference_elevation.is_finite() {
            return Err(BinderyError::Config(
                "reference_elevation must be finite".to_string(),
            ));
        }
        let size = self.default_proxy_size;
        if [size.x, size.y, size.z].iter().any(|v| !v.is_finite() || *v <= 0.0) {
            return Err(BinderyError::Config(
                "default_proxy_size must be positive in every axis".to_string(),
            ));
        }
        if let Some(ext) = self
            .recognized_asset_extensions
            .iter()
            .find(|ext| ext.is_empty() || ext.starts_with('.'))
        {
            return Err(BinderyError::Config(format!(
                "invalid asset extension '{ext}' (expected e.g. \"obj\")"
            )));
        }
        Ok(())
    }

    /// How bindings deliver derived-parameter updates.
    #[must_use]
    pub fn update_mode(&self) -> UpdateMode {
        UpdateMode {
            asynchronous: self.enable_async_updates,
            delay: Duration::from_millis(self.update_delay_ms),
        }
    }

    pub fn update_delay(&self) -> Duration {
        Duration::from_millis(self.update_delay_ms)
    }
}
