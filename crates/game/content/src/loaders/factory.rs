//! Content factory for loading everything from one data directory.

use std::path::{Path, PathBuf};

use combat_core::SimConfig;

use crate::catalog::ActorCatalog;
use crate::loaders::{ActorLoader, ConfigLoader, LoadResult};

/// Content factory that loads simulation content from a data directory.
///
/// # Directory Structure
///
/// ```text
/// data_dir/
/// ├── sim.toml
/// ├── actors.ron
/// └── scenarios/
///     └── skirmish.ron
/// ```
pub struct ContentFactory {
    data_dir: PathBuf,
}

impl ContentFactory {
    /// Creates a new content factory pointing to a data directory.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// Load simulation configuration from `sim.toml`.
    pub fn load_config(&self) -> LoadResult<SimConfig> {
        ConfigLoader::load(&self.data_dir.join("sim.toml"))
    }

    /// Load the actor catalog from `actors.ron`.
    pub fn load_actors(&self) -> LoadResult<ActorCatalog> {
        ActorLoader::load(&self.data_dir.join("actors.ron"))
    }

    /// Path of `scenarios/{name}.ron`. Scenarios are parsed by the runtime.
    pub fn scenario_path(&self, name: &str) -> PathBuf {
        self.data_dir.join("scenarios").join(format!("{}.ron", name))
    }

    /// Returns the data directory path.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}
