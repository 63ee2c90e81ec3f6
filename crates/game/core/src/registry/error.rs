//! Registry errors.

use crate::actor::{ActorId, ActorKind};
use crate::error::{ErrorSeverity, SimError};
use crate::pool::PoolError;

/// Errors raised by registry operations.
///
/// None of these abort a tick; callers log them and move on.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum RegistryError {
    /// No live record exists for this id.
    #[error("unknown actor {id}")]
    UnknownActor { id: ActorId },

    /// The kind's pool had no free slot.
    #[error("spawn refused: {0}")]
    SpawnRefused(#[from] PoolError),

    /// Spawn data failed validation before a slot was taken.
    #[error("invalid {kind} spawn: {reason}")]
    InvalidSpawn {
        kind: ActorKind,
        reason: &'static str,
    },

    /// Setter value was NaN or infinite.
    #[error("non-finite value written to {id}")]
    NonFinite { id: ActorId },
}

impl SimError for RegistryError {
    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::UnknownActor { .. } | Self::SpawnRefused(_) => ErrorSeverity::Recoverable,
            Self::InvalidSpawn { .. } | Self::NonFinite { .. } => ErrorSeverity::Validation,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::UnknownActor { .. } => "UNKNOWN_ACTOR",
            Self::SpawnRefused(_) => "SPAWN_REFUSED",
            Self::InvalidSpawn { .. } => "INVALID_SPAWN",
            Self::NonFinite { .. } => "NON_FINITE",
        }
    }
}
