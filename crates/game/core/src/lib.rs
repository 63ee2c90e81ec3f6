//! Deterministic real-time combat simulation core.
//!
//! `combat-core` owns the rules of a run: a fixed-timestep [`Scheduler`]
//! drives phase systems over an [`EntityRegistry`] backed by a bounded
//! [`ObjectPool`], resolves queued [`DamageRequest`]s through the
//! [`DamagePipeline`], and reports outcomes on a synchronous [`EventBus`].
//! Every random roll comes from named [`RngStreams`] derived from one run
//! seed, so identical seeds and inputs replay bit-identically.
//!
//! The crate performs no I/O; content loading and process wiring live in
//! `combat-content` and `combat-runtime`.
pub mod actor;
pub mod config;
pub mod damage;
pub mod error;
pub mod events;
pub mod pool;
pub mod registry;
pub mod rng;
pub mod scheduler;

pub use actor::{Actor, ActorId, ActorKind, ActorSpawn, Tick};
pub use config::{CombatTuning, ConfigError, SimConfig};
pub use damage::{
    DamageBatch, DamagePipeline, DamageRequest, DamageResult, DamageTags, GroupKey, PipelineStats,
    RequestError, calculate_damage,
};
pub use error::{ErrorSeverity, SimError};
pub use events::{
    BusError, EventBus, EventKind, KillReport, SimEvent, SpawnReport, StepReport,
    SubscriptionHandle,
};
pub use pool::{ObjectPool, PoolCapacities, PoolError, PoolStats, SlotHandle};
pub use registry::{ActorView, EntityRegistry, HealthChange, RegistryError, Snapshot};
pub use rng::{CRIT_STREAM, DEFAULT_STREAM, RngStreams, StreamRng, derive_stream_seed};
pub use scheduler::{AdvanceReport, Phase, Scheduler, TickContext, TickSystem};

// Math types used throughout the public API.
pub use glam::{IVec2, Vec2};
