//! Harness configuration read from the process environment.
use std::env;
use std::path::PathBuf;

/// Paths and overrides for a `combat-sim` run.
#[derive(Clone, Debug, PartialEq)]
pub struct HarnessConfig {
    pub config_path: PathBuf,
    pub catalog_path: PathBuf,
    pub scenario_path: PathBuf,
    /// Replaces the scenario and config seeds when set.
    pub seed: Option<u64>,
    /// Pretty-print the JSON summary.
    pub pretty: bool,
}

impl HarnessConfig {
    /// Directory holding the bundled data files.
    pub fn default_data_dir() -> PathBuf {
        PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/data"))
    }

    /// Configuration pointing at the bundled data files.
    pub fn bundled() -> Self {
        let data_dir = Self::default_data_dir();
        Self {
            config_path: data_dir.join("sim.toml"),
            catalog_path: data_dir.join("actors.ron"),
            scenario_path: data_dir.join("scenarios").join("skirmish.ron"),
            seed: None,
            pretty: true,
        }
    }

    /// Construct configuration from process environment variables.
    ///
    /// Environment variables:
    /// - `COMBAT_CONFIG` - Simulation config TOML (default: bundled `sim.toml`)
    /// - `COMBAT_CATALOG` - Actor catalog RON (default: bundled `actors.ron`)
    /// - `COMBAT_SCENARIO` - Scenario RON (default: bundled `scenarios/skirmish.ron`)
    /// - `COMBAT_SEED` - Run seed override (default: scenario or config seed)
    /// - `COMBAT_PRETTY` - Pretty-print the summary (default: true)
    pub fn from_env() -> Self {
        let mut config = Self::bundled();

        if let Some(path) = read_env::<PathBuf>("COMBAT_CONFIG") {
            config.config_path = path;
        }
        if let Some(path) = read_env::<PathBuf>("COMBAT_CATALOG") {
            config.catalog_path = path;
        }
        if let Some(path) = read_env::<PathBuf>("COMBAT_SCENARIO") {
            config.scenario_path = path;
        }

        config.seed = read_env::<u64>("COMBAT_SEED");

        if let Some(pretty) = read_env::<bool>("COMBAT_PRETTY") {
            config.pretty = pretty;
        }

        config
    }
}

fn read_env<T>(key: &str) -> Option<T>
where
    T: std::str::FromStr,
{
    env::var(key).ok()?.parse().ok()
}
