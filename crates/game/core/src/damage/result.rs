//! Resolved damage, as reported on the bus.

use super::request::{DamageTags, GroupKey};
use crate::actor::ActorId;

/// Outcome of one resolved request.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DamageResult {
    pub source_id: ActorId,
    pub target_id: ActorId,
    /// Health actually removed, after multipliers and clamping.
    pub final_amount: f32,
    pub is_crit: bool,
    pub tags: DamageTags,
    /// This hit took the target to zero.
    pub killed: bool,
    pub group: Option<GroupKey>,
}

/// Simultaneous hits from one source sharing a group key.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DamageBatch {
    pub source_id: ActorId,
    pub group: GroupKey,
    /// Member results in submission order.
    pub entries: Vec<DamageResult>,
}

impl DamageBatch {
    pub fn total(&self) -> f32 {
        self.entries.iter().map(|entry| entry.final_amount).sum()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Per-tick pipeline counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PipelineStats {
    /// Requests collected for the tick.
    pub submitted: usize,
    /// `damage_applied` events emitted.
    pub applied: usize,
    /// `damage_batched` events emitted.
    pub batches: usize,
    /// Requests reported inside batches.
    pub batched: usize,
    /// Requests aimed at ids the registry does not know.
    pub discarded_unknown: usize,
    /// Requests aimed at targets already dead.
    pub discarded_dead: usize,
    /// Requests whose health write the registry refused.
    pub rejected: usize,
    pub kills: usize,
}

impl PipelineStats {
    /// Requests that produced a result.
    pub fn resolved(&self) -> usize {
        self.applied + self.batched
    }
}
