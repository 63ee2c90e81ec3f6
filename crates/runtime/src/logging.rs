//! Tracing subscriber setup for binaries and tests.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::api::{Result, RuntimeError};

/// Directive used when `RUST_LOG` is unset or unparsable.
pub const DEFAULT_DIRECTIVE: &str = "info";

/// Install a stderr `fmt` subscriber filtered by `RUST_LOG`, defaulting to
/// [`DEFAULT_DIRECTIVE`].
///
/// Fails if a global subscriber is already installed.
pub fn init() -> Result<()> {
    init_with(DEFAULT_DIRECTIVE)
}

/// Same as [`init`] with a caller-chosen fallback directive.
pub fn init_with(default_directive: &str) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .try_init()
        .map_err(RuntimeError::Logging)?;

    tracing::debug!(target: "combat::runtime", "logging initialized");
    Ok(())
}
