//! Data-driven content definitions and loaders.
//!
//! This crate houses the actor catalog and provides loaders for RON/TOML data files:
//! - Simulation configuration (data-driven via TOML)
//! - Actor templates (data-driven via RON)
//!
//! Templates never appear in simulation state; the catalog turns a template
//! name and a position into an [`combat_core::ActorSpawn`].

pub mod catalog;

#[cfg(feature = "loaders")]
pub mod loaders;

pub use catalog::{ActorCatalog, ActorTemplate, CatalogError};

#[cfg(feature = "loaders")]
pub use loaders::{ActorLoader, ConfigLoader, ContentFactory, LoadResult};
