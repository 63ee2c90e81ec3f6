//! Headless harness: runs one scenario and prints a JSON summary.
use anyhow::{Context, Result};
use combat_content::{ActorLoader, ConfigLoader};
use combat_runtime::{HarnessConfig, Scenario, Session, logging};

fn main() -> Result<()> {
    // Load .env file if it exists (silently ignore if not found)
    let _ = dotenvy::dotenv();

    logging::init()?;

    let harness = HarnessConfig::from_env();
    tracing::info!(
        config = %harness.config_path.display(),
        catalog = %harness.catalog_path.display(),
        scenario = %harness.scenario_path.display(),
        "starting combat-sim"
    );

    let config = ConfigLoader::load(&harness.config_path)?;
    let catalog = ActorLoader::load(&harness.catalog_path)?;
    let scenario = Scenario::load_from_file(&harness.scenario_path)?;

    let mut builder = Session::builder()
        .config(config)
        .catalog(catalog)
        .scenario(scenario);
    if let Some(seed) = harness.seed {
        builder = builder.seed(seed);
    }

    let mut session = builder.build().context("failed to build session")?;
    let summary = session.run()?;

    let json = if harness.pretty {
        serde_json::to_string_pretty(&summary)?
    } else {
        serde_json::to_string(&summary)?
    };
    println!("{json}");

    Ok(())
}
