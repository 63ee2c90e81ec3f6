//! Phase systems and the context they run with.

use std::time::Duration;

use crate::actor::{ActorSpawn, Tick};
use crate::config::CombatTuning;
use crate::damage::{DamagePipeline, DamageRequest};
use crate::events::EventBus;
use crate::registry::EntityRegistry;
use crate::rng::RngStreams;

/// Ordered stages of one tick.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    strum::EnumCount,
    strum::EnumIter,
    strum::EnumString,
    strum::IntoStaticStr,
    strum::Display,
)]
#[strum(serialize_all = "snake_case")]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Phase {
    /// Queued spawns are registered at the end of this phase.
    Spawn,
    /// Movement, targeting and ability logic. Writes intents and queues damage.
    Ai,
    /// Queued damage is resolved at the end of this phase.
    Damage,
    /// Dead actors are reaped at the end of this phase.
    Cleanup,
}

impl Phase {
    #[inline]
    pub(crate) const fn index(self) -> usize {
        self as usize
    }
}

/// A unit of gameplay logic driven by the scheduler.
///
/// Systems of the same phase run in registration order.
pub trait TickSystem {
    /// Name used in logs.
    fn name(&self) -> &str;

    fn phase(&self) -> Phase;

    fn run(&mut self, ctx: &mut TickContext<'_>);
}

/// Everything a system may touch during its phase.
///
/// The registry is exposed for queries and setters only: actors enter through
/// [`spawn`](Self::spawn) and leave through cleanup, so pool slots are never
/// handed to systems.
pub struct TickContext<'a> {
    pub tick: Tick,
    /// Fixed step length.
    pub delta: Duration,
    pub registry: &'a mut EntityRegistry,
    pub rng: &'a mut RngStreams,
    pub bus: &'a mut EventBus,
    pub(crate) spawns: &'a mut Vec<ActorSpawn>,
    pub(crate) damage: &'a mut DamagePipeline,
    pub(crate) tuning: &'a CombatTuning,
}

impl TickContext<'_> {
    /// Queues a spawn. Spawns queued after the spawn phase land next tick.
    pub fn spawn(&mut self, spawn: ActorSpawn) {
        self.spawns.push(spawn);
    }

    /// Queues a damage request. Requests queued after the damage phase are
    /// resolved next tick.
    pub fn submit_damage(&mut self, request: DamageRequest) {
        self.damage.submit(request);
    }

    pub fn pending_spawns(&self) -> usize {
        self.spawns.len()
    }

    pub fn pending_damage(&self) -> usize {
        self.damage.pending()
    }

    pub fn tuning(&self) -> &CombatTuning {
        self.tuning
    }

    /// Fixed step in seconds, for integrating velocities.
    pub fn delta_secs(&self) -> f32 {
        self.delta.as_secs_f32()
    }
}
