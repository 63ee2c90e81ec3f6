//! Fixed-capacity slot pools, one lane per actor kind.
//!
//! Capacity is fixed when the pool is built and never grows. Running out of
//! slots is reported as [`PoolError::Exhausted`], which callers treat as a
//! refused spawn rather than a failure.

use strum::EnumCount;

use crate::actor::ActorKind;
use crate::error::{ErrorSeverity, SimError};

/// Per-kind slot capacities.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PoolCapacities {
    pub player: u16,
    pub enemy: u16,
    pub projectile: u16,
    pub boss: u16,
}

impl PoolCapacities {
    pub const fn new(player: u16, enemy: u16, projectile: u16, boss: u16) -> Self {
        Self {
            player,
            enemy,
            projectile,
            boss,
        }
    }

    pub const fn get(&self, kind: ActorKind) -> u16 {
        match kind {
            ActorKind::Player => self.player,
            ActorKind::Enemy => self.enemy,
            ActorKind::Projectile => self.projectile,
            ActorKind::Boss => self.boss,
        }
    }

    /// Returns a copy with the capacity for `kind` replaced.
    pub const fn with(mut self, kind: ActorKind, capacity: u16) -> Self {
        match kind {
            ActorKind::Player => self.player = capacity,
            ActorKind::Enemy => self.enemy = capacity,
            ActorKind::Projectile => self.projectile = capacity,
            ActorKind::Boss => self.boss = capacity,
        }
        self
    }

    /// Sum of all lane capacities.
    pub const fn total(&self) -> usize {
        self.player as usize + self.enemy as usize + self.projectile as usize + self.boss as usize
    }
}

impl Default for PoolCapacities {
    fn default() -> Self {
        Self::new(4, 512, 1024, 8)
    }
}

/// Reservation of one pool slot.
///
/// The generation distinguishes successive occupants of the same index, so a
/// handle kept past its release can never free the next occupant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SlotHandle {
    pub kind: ActorKind,
    pub index: u16,
    pub generation: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SlotState {
    Free,
    Acquired,
}

/// Lifetime counters for one lane.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PoolStats {
    pub capacity: u16,
    pub acquired: u64,
    pub released: u64,
}

impl PoolStats {
    /// Slots currently held.
    pub fn live(&self) -> u64 {
        self.acquired - self.released
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PoolError {
    /// Every slot of the lane is in use.
    #[error("{kind} pool exhausted (capacity: {capacity})")]
    Exhausted { kind: ActorKind, capacity: u16 },
}

impl SimError for PoolError {
    fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::Recoverable
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::Exhausted { .. } => "POOL_EXHAUSTED",
        }
    }
}

#[derive(Clone, Debug)]
struct Lane {
    kind: ActorKind,
    states: Vec<SlotState>,
    generations: Vec<u32>,
    /// Free indices in descending order, popped from the back, so the lowest
    /// free index is always handed out first.
    free: Vec<u16>,
    stats: PoolStats,
}

impl Lane {
    fn new(kind: ActorKind, capacity: u16) -> Self {
        let len = capacity as usize;
        Self {
            kind,
            states: vec![SlotState::Free; len],
            generations: vec![0; len],
            free: (0..capacity).rev().collect(),
            stats: PoolStats {
                capacity,
                ..PoolStats::default()
            },
        }
    }
}

/// Bounded slot allocator for every actor kind.
#[derive(Clone, Debug)]
pub struct ObjectPool {
    lanes: [Lane; ActorKind::COUNT],
}

impl ObjectPool {
    /// Builds every lane up front; no allocation happens after this.
    pub fn new(capacities: PoolCapacities) -> Self {
        let lanes = [
            ActorKind::Player,
            ActorKind::Enemy,
            ActorKind::Projectile,
            ActorKind::Boss,
        ]
        .map(|kind| Lane::new(kind, capacities.get(kind)));

        Self { lanes }
    }

    /// Reserve a slot for `kind`.
    pub fn acquire(&mut self, kind: ActorKind) -> Result<SlotHandle, PoolError> {
        let lane = &mut self.lanes[kind.index()];
        let Some(index) = lane.free.pop() else {
            return Err(PoolError::Exhausted {
                kind,
                capacity: lane.stats.capacity,
            });
        };

        let slot = index as usize;
        lane.states[slot] = SlotState::Acquired;
        lane.stats.acquired += 1;

        Ok(SlotHandle {
            kind,
            index,
            generation: lane.generations[slot],
        })
    }

    /// Return a slot to the free list.
    ///
    /// Releasing a slot twice, or with a handle from an older generation, is a
    /// logged no-op and returns `false`.
    pub fn release(&mut self, handle: SlotHandle) -> bool {
        let lane = &mut self.lanes[handle.kind.index()];
        let slot = handle.index as usize;

        let current = slot < lane.states.len()
            && lane.states[slot] == SlotState::Acquired
            && lane.generations[slot] == handle.generation;

        if !current {
            tracing::debug!(
                target: "combat::pool",
                kind = %lane.kind,
                index = handle.index,
                generation = handle.generation,
                "ignoring release of a slot that is not held"
            );
            return false;
        }

        lane.states[slot] = SlotState::Free;
        lane.generations[slot] = lane.generations[slot].wrapping_add(1);
        // Capacity was reserved at construction, so the insert never reallocates.
        let at = lane.free.partition_point(|&free| free > handle.index);
        lane.free.insert(at, handle.index);
        lane.stats.released += 1;
        true
    }

    /// Returns true if `handle` still refers to a held slot.
    pub fn is_held(&self, handle: SlotHandle) -> bool {
        let lane = &self.lanes[handle.kind.index()];
        let slot = handle.index as usize;
        slot < lane.states.len()
            && lane.states[slot] == SlotState::Acquired
            && lane.generations[slot] == handle.generation
    }

    pub fn stats(&self, kind: ActorKind) -> PoolStats {
        self.lanes[kind.index()].stats
    }

    pub fn capacity(&self, kind: ActorKind) -> u16 {
        self.lanes[kind.index()].stats.capacity
    }

    /// Slots still available for `kind`.
    pub fn available(&self, kind: ActorKind) -> usize {
        self.lanes[kind.index()].free.len()
    }
}
