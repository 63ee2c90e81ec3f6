//! Actor value types shared by every component.

use std::fmt;
use std::sync::Arc;

use glam::{IVec2, Vec2};

use crate::pool::SlotHandle;

/// Stable handle for a registered actor.
///
/// Handles are allocated monotonically by the registry and never reused within
/// a run, so a stale handle can only ever miss, never alias a newer actor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ActorId(pub u32);

impl ActorId {
    /// Source used for environmental damage that has no owning actor.
    pub const WORLD: Self = Self(u32::MAX);

    /// Returns true if this is the environment pseudo-source.
    #[inline]
    pub const fn is_world(self) -> bool {
        self.0 == Self::WORLD.0
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_world() {
            write!(f, "#world")
        } else {
            write!(f, "#{}", self.0)
        }
    }
}

/// Category of simulated entity. Each kind has its own pool lane and view.
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
pub enum ActorKind {
    Player,
    Enemy,
    Projectile,
    Boss,
}

impl ActorKind {
    /// Dense index used by per-kind tables.
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Discrete simulation step counter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Tick(pub u64);

impl Tick {
    pub const ZERO: Self = Self(0);

    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for Tick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

/// Everything needed to bring an actor to life.
///
/// Spawns are produced by content templates or gameplay systems and handed to
/// [`EntityRegistry::register`](crate::EntityRegistry::register).
#[derive(Clone, Debug, PartialEq)]
pub struct ActorSpawn {
    pub kind: ActorKind,
    pub position: Vec2,
    pub health_max: f32,
    /// Starting health; `None` spawns at full health.
    pub health: Option<f32>,
    /// Reward reported on the kill event.
    pub bounty: u32,
    /// Content template name, carried for presentation and logs.
    pub template: Option<Arc<str>>,
}

impl ActorSpawn {
    pub fn new(kind: ActorKind, position: Vec2, health_max: f32) -> Self {
        Self {
            kind,
            position,
            health_max,
            health: None,
            bounty: 0,
            template: None,
        }
    }

    pub fn with_health(mut self, health: f32) -> Self {
        self.health = Some(health);
        self
    }

    pub fn with_bounty(mut self, bounty: u32) -> Self {
        self.bounty = bounty;
        self
    }

    pub fn with_template(mut self, template: impl Into<Arc<str>>) -> Self {
        self.template = Some(template.into());
        self
    }
}

/// Canonical actor record owned by the registry.
///
/// Fields are read-only outside the registry; every mutation goes through a
/// registry setter so the health and liveness invariants hold:
///
/// - `0 <= health <= health_max`
/// - `health == 0` implies `!alive`
/// - `alive` flips from true to false at most once
#[derive(Clone, Debug, PartialEq)]
pub struct Actor {
    pub(crate) id: ActorId,
    pub(crate) kind: ActorKind,
    pub(crate) slot: SlotHandle,
    pub(crate) position: Vec2,
    /// Grid cell derived from `position`; owned by the spatial index.
    pub(crate) cell: IVec2,
    pub(crate) velocity: Vec2,
    pub(crate) health: f32,
    pub(crate) health_max: f32,
    pub(crate) alive: bool,
    pub(crate) bounty: u32,
    pub(crate) template: Option<Arc<str>>,
    /// Index of this actor inside its kind view.
    pub(crate) kind_index: usize,
}

impl Actor {
    pub fn id(&self) -> ActorId {
        self.id
    }

    pub fn kind(&self) -> ActorKind {
        self.kind
    }

    pub fn slot(&self) -> SlotHandle {
        self.slot
    }

    pub fn position(&self) -> Vec2 {
        self.position
    }

    pub fn spatial_cell(&self) -> IVec2 {
        self.cell
    }

    pub fn velocity(&self) -> Vec2 {
        self.velocity
    }

    pub fn health(&self) -> f32 {
        self.health
    }

    pub fn health_max(&self) -> f32 {
        self.health_max
    }

    /// Current health as a fraction of maximum, in `[0, 1]`.
    pub fn health_fraction(&self) -> f32 {
        if self.health_max > 0.0 {
            self.health / self.health_max
        } else {
            0.0
        }
    }

    #[inline]
    pub fn is_alive(&self) -> bool {
        self.alive
    }

    pub fn bounty(&self) -> u32 {
        self.bounty
    }

    pub fn template(&self) -> Option<&str> {
        self.template.as_deref()
    }
}
