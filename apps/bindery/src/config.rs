//! # Configuration Loading
//!
//! Finds and reads the TOML file holding the [`ExchangeConfig`].
//!
//! Search order:
//! 1. The explicit `--config` path, which must exist
//! 2. `bindery.toml` in the working directory
//! 3. Defaults

use bindery_core::{BinderyError, ExchangeConfig};
use std::path::Path;
use tracing::{debug, info};

/// File looked up in the working directory when no path is given.
pub const LOCAL_CONFIG: &str = "bindery.toml";

/// Load the exchange configuration.
pub fn load_config(explicit_path: Option<&Path>) -> Result<ExchangeConfig, BinderyError> {
    if let Some(path) = explicit_path {
        info!(path = %path.display(), "loading configuration from explicit path");
        if !path.exists() {
            return Err(BinderyError::Config(format!(
                "missing configuration file: {}",
                path.display()
            )));
        }
        return load_config_file(path);
    }

    let local = Path::new(LOCAL_CONFIG);
    if local.exists() {
        info!(path = %local.display(), "loading configuration from local path");
        return load_config_file(local);
    }

    debug!("no configuration file found, using defaults");
    Ok(ExchangeConfig::default())
}

/// Read and validate one TOML configuration file.
pub fn load_config_file(path: &Path) -> Result<ExchangeConfig, BinderyError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| BinderyError::Io(format!("cannot read '{}': {}", path.display(), e)))?;
    parse_config(&content)
}

/// Parse a TOML document; missing keys take their defaults.
pub fn parse_config(content: &str) -> Result<ExchangeConfig, BinderyError> {
    let config: ExchangeConfig = toml::from_str(content)
        .map_err(|e| BinderyError::Config(format!("failed to parse TOML configuration: {e}")))?;
    config.validate()?;
    Ok(config)
}
