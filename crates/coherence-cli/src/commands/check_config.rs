//! `coherence check-config`

use anyhow::{Context, Result};
use coherence_core::CoherenceConfig;
use std::path::Path;

/// Validate `file` and print the effective configuration
pub fn run(file: &Path) -> Result<()> {
    let config = CoherenceConfig::load_from_file(file)
        .with_context(|| format!("invalid configuration in {}", file.display()))?;
    let rendered = toml::to_string_pretty(&config).context("rendering configuration")?;
    println!("# {} is valid", file.display());
    print!("{rendered}");
    Ok(())
}
