//! Types downstream callers interact with.
mod errors;

pub use errors::{Result, RuntimeError};
