//! Unified error types surfaced by the runtime API.
//!
//! Wraps failures from core construction, content lookups and scenario files
//! so the harness can bubble them up with consistent context.
use std::path::PathBuf;

use thiserror::Error;

use combat_content::CatalogError;
use combat_core::{ConfigError, ErrorSeverity, RequestError, SimError};

pub type Result<T> = std::result::Result<T, RuntimeError>;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("invalid simulation config")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("invalid scripted damage")]
    Request(#[from] RequestError),

    #[error("session requires an actor catalog before building")]
    MissingCatalog,

    #[error("failed to read {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse scenario {}", path.display())]
    ScenarioParse {
        path: PathBuf,
        #[source]
        source: ron::error::SpannedError,
    },

    #[error("invalid scenario: {0}")]
    InvalidScenario(String),

    #[error("failed to install tracing subscriber")]
    Logging(#[source] tracing_subscriber::util::TryInitError),
}

impl SimError for RuntimeError {
    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Config(err) => err.severity(),
            Self::Request(err) => err.severity(),
            Self::Catalog(_) | Self::InvalidScenario(_) | Self::ScenarioParse { .. } => {
                ErrorSeverity::Validation
            }
            Self::MissingCatalog | Self::Io { .. } | Self::Logging(_) => ErrorSeverity::Fatal,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::Config(err) => err.error_code(),
            Self::Request(err) => err.error_code(),
            Self::Catalog(_) => "CATALOG",
            Self::MissingCatalog => "MISSING_CATALOG",
            Self::Io { .. } => "IO",
            Self::ScenarioParse { .. } => "SCENARIO_PARSE",
            Self::InvalidScenario(_) => "INVALID_SCENARIO",
            Self::Logging(_) => "LOGGING",
        }
    }
}
