//! Simulation configuration loader.

use std::path::Path;

use combat_core::SimConfig;

use crate::loaders::{LoadResult, read_file};

/// Loader for simulation configuration from TOML files.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load and validate a `SimConfig` from a TOML file.
    ///
    /// Missing fields take their defaults, so an empty file is a valid config.
    pub fn load(path: &Path) -> LoadResult<SimConfig> {
        let content = read_file(path)?;
        Self::parse(&content)
            .map_err(|e| anyhow::anyhow!("{} ({})", e, path.display()))
    }

    /// Parse and validate a `SimConfig` from TOML text.
    pub fn parse(content: &str) -> LoadResult<SimConfig> {
        let config: SimConfig = toml::from_str(content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config TOML: {}", e))?;

        config
            .validate()
            .map_err(|e| anyhow::anyhow!("Invalid simulation config: {}", e))?;

        tracing::debug!(
            target: "combat::content",
            seed = config.run_seed,
            step_ms = config.fixed_step_ms,
            "loaded simulation config"
        );
        Ok(config)
    }
}
