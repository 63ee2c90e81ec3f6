//! Event payloads published on the bus.

use std::time::Duration;

use glam::Vec2;

use crate::actor::{ActorId, ActorKind, Tick};
use crate::damage::{DamageBatch, DamageResult};

/// Event names. Subscriptions are keyed by kind.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
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
pub enum EventKind {
    DamageApplied,
    DamageBatched,
    EntitySpawned,
    EntityKilled,
    StepAdvanced,
}

impl EventKind {
    #[inline]
    pub(crate) const fn index(self) -> usize {
        self as usize
    }
}

/// An actor entered the registry.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SpawnReport {
    pub id: ActorId,
    pub kind: ActorKind,
    pub position: Vec2,
    pub tick: Tick,
}

/// An actor's health reached zero.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct KillReport {
    pub id: ActorId,
    pub kind: ActorKind,
    /// Source of the killing blow.
    pub killer: ActorId,
    /// Reward carried over from the actor's template.
    pub bounty: u32,
    pub position: Vec2,
    pub tick: Tick,
}

/// Tick boundary marker, published after cleanup.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StepReport {
    pub tick: Tick,
    pub delta: Duration,
}

/// Everything the core publishes.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SimEvent {
    DamageApplied(DamageResult),
    DamageBatched(DamageBatch),
    EntitySpawned(SpawnReport),
    EntityKilled(KillReport),
    StepAdvanced(StepReport),
}

impl SimEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            SimEvent::DamageApplied(_) => EventKind::DamageApplied,
            SimEvent::DamageBatched(_) => EventKind::DamageBatched,
            SimEvent::EntitySpawned(_) => EventKind::EntitySpawned,
            SimEvent::EntityKilled(_) => EventKind::EntityKilled,
            SimEvent::StepAdvanced(_) => EventKind::StepAdvanced,
        }
    }
}
