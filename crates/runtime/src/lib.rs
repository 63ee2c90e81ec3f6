//! Runtime wiring for the combat simulation.
//!
//! This crate joins `combat-core` with the content loaded by `combat-content`
//! and adds what a process needs around a simulation: a session builder,
//! scripted scenarios, run digests for determinism checks, logging setup and
//! environment-driven harness configuration.
//!
//! Modules are organized by responsibility:
//! - [`session`] hosts the session and its builder
//! - [`scenario`] loads and replays scripted runs
//! - [`systems`] provides template-driven gameplay systems
//! - [`digest`] fingerprints a run
//! - [`api`] exposes the error types downstream callers interact with
pub mod api;
pub mod config;
pub mod digest;
pub mod logging;
pub mod scenario;
pub mod session;
pub mod systems;

pub use api::{Result, RuntimeError};
pub use config::HarnessConfig;
pub use digest::RunDigest;
pub use scenario::{HitTarget, Scenario, ScriptedDamage, ScriptedHit, ScriptedSpawns, SpawnWave};
pub use session::{EventTally, RunSummary, Session, SessionBuilder};
pub use systems::{AiSettings, MeleeSystem, PursuitSystem};
