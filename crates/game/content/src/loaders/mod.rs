//! Content loaders for reading simulation data from files.
//!
//! TOML carries the simulation config, RON carries the actor catalog.

pub mod actors;
pub mod config;
pub mod factory;

pub use actors::ActorLoader;
pub use config::ConfigLoader;
pub use factory::ContentFactory;

use std::path::Path;

/// Common result type for loaders.
pub type LoadResult<T> = anyhow::Result<T>;

/// Helper function to read file contents.
pub(crate) fn read_file(path: &Path) -> LoadResult<String> {
    std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read file {}: {}", path.display(), e))
}
