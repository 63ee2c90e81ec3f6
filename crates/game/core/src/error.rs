//! Common error infrastructure for combat-core.
//!
//! Component errors (`PoolError`, `RegistryError`, `ConfigError`, ...) live next
//! to the component that raises them. This module provides the shared
//! classification every one of them implements.
//!
//! # Design Principles
//!
//! - **Local recovery**: per-request and per-entity errors are handled inside
//!   the component that raised them and only surface through logging
//! - **Severity Classification**: errors are categorized so callers can pick a
//!   log level and decide whether to keep going
//! - **Fail fast on construction**: only misconfiguration is fatal

/// Severity level of an error, used for categorization and recovery strategies.
///
/// - **Recoverable**: the request is refused but the simulation continues
/// - **Validation**: invalid input that should be rejected without retry
/// - **Benign**: expected during teardown, logged at debug level only
/// - **Fatal**: the simulation cannot be constructed
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ErrorSeverity {
    /// Request refused; the simulation continues at reduced capacity.
    ///
    /// Examples: pool exhausted, damage aimed at an unknown entity
    Recoverable,

    /// Invalid input, should not retry without changes.
    ///
    /// Examples: negative damage, spawn with zero max health
    Validation,

    /// Idempotent no-op, expected under overlapping teardown paths.
    ///
    /// Examples: double release, double unregistration
    Benign,

    /// Misconfiguration detected at construction time.
    ///
    /// Examples: non-positive fixed step
    Fatal,
}

impl ErrorSeverity {
    /// Returns a human-readable description of this severity level.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Recoverable => "recoverable",
            Self::Validation => "validation",
            Self::Benign => "benign",
            Self::Fatal => "fatal",
        }
    }

    /// Returns true if the simulation may keep running after this error.
    pub const fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Fatal)
    }
}

/// Common trait for all combat-core errors.
///
/// # Implementation Guidelines
///
/// - Use `#[derive(thiserror::Error)]` for Display/Error impl
/// - Classify severity based on recoverability, not impact
pub trait SimError: core::fmt::Display + core::fmt::Debug {
    /// Returns the severity level of this error.
    fn severity(&self) -> ErrorSeverity;

    /// Returns a static string identifier for this error variant.
    ///
    /// Useful for metrics, log fields and assertions in tests.
    fn error_code(&self) -> &'static str {
        core::any::type_name::<Self>()
    }
}
