// Configuration module for the parameter listener
//
// Provides:
// - YAML configuration file loading
// - Environment variable substitution
// - Side-effect free validation
// - Default values

pub mod types;
mod loader;

pub use types::*;
pub use loader::{validate, ConfigLoader};

use anyhow::{Context, Result};
use std::path::Path;

/// Load configuration from a YAML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<ListenerConfig> {
    let path = path.as_ref();
    ConfigLoader::load(path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))
}
