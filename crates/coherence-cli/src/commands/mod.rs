//! Subcommand handlers

pub mod check_config;
pub mod serve;
pub mod simulate;

use anyhow::{Context, Result};
use coherence_core::CoherenceConfig;
use std::path::Path;

/// Configuration from `path`, or defaults with environment overrides applied
pub fn load_config(path: Option<&Path>) -> Result<CoherenceConfig> {
    match path {
        Some(path) => CoherenceConfig::load_from_file(path)
            .with_context(|| format!("loading configuration from {}", path.display())),
        None => {
            let mut config = CoherenceConfig::default();
            config.merge_with_env()?;
            config.validate()?;
            Ok(config)
        }
    }
}
