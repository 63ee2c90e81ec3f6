//! Simulation configuration and tunable parameters.

use std::collections::BTreeMap;
use std::time::Duration;

use crate::error::{ErrorSeverity, SimError};
use crate::pool::PoolCapacities;

/// Top-level configuration for one simulation run.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SimConfig {
    /// Seed every random stream of the run is derived from.
    pub run_seed: u64,
    /// Length of one tick in milliseconds. Must be positive.
    pub fixed_step_ms: f64,
    /// Most ticks a single `advance` call may run before discarding backlog.
    pub max_steps_per_advance: u32,
    /// Edge length of a spatial grid cell, in world units.
    pub cell_size: f32,
    /// Slot capacity per actor kind.
    pub pools: PoolCapacities,
    pub combat: CombatTuning,
}

impl SimConfig {
    // ===== runtime-tunable defaults =====
    pub const DEFAULT_FIXED_STEP_MS: f64 = 1000.0 / 60.0;
    pub const DEFAULT_MAX_STEPS_PER_ADVANCE: u32 = 5;
    pub const DEFAULT_CELL_SIZE: f32 = 8.0;

    pub fn new() -> Self {
        Self {
            run_seed: 0,
            fixed_step_ms: Self::DEFAULT_FIXED_STEP_MS,
            max_steps_per_advance: Self::DEFAULT_MAX_STEPS_PER_ADVANCE,
            cell_size: Self::DEFAULT_CELL_SIZE,
            pools: PoolCapacities::default(),
            combat: CombatTuning::default(),
        }
    }

    pub fn with_seed(mut self, run_seed: u64) -> Self {
        self.run_seed = run_seed;
        self
    }

    pub fn with_pools(mut self, pools: PoolCapacities) -> Self {
        self.pools = pools;
        self
    }

    pub fn with_combat(mut self, combat: CombatTuning) -> Self {
        self.combat = combat;
        self
    }

    /// The fixed step as a `Duration`, validated.
    pub fn fixed_step(&self) -> Result<Duration, ConfigError> {
        if !self.fixed_step_ms.is_finite() || self.fixed_step_ms <= 0.0 {
            return Err(ConfigError::NonPositiveStep {
                step_ms: self.fixed_step_ms,
            });
        }
        match Duration::try_from_secs_f64(self.fixed_step_ms / 1000.0) {
            Ok(step) if !step.is_zero() => Ok(step),
            _ => Err(ConfigError::NonPositiveStep {
                step_ms: self.fixed_step_ms,
            }),
        }
    }

    /// Checks every field. Construction of a scheduler fails on the first error.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.fixed_step()?;
        if self.max_steps_per_advance == 0 {
            return Err(ConfigError::ZeroStepCap);
        }
        if !self.cell_size.is_finite() || self.cell_size <= 0.0 {
            return Err(ConfigError::InvalidCellSize {
                cell_size: self.cell_size,
            });
        }
        self.combat.validate()
    }
}

impl Default for SimConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Balance parameters used by the damage pipeline.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct CombatTuning {
    /// Probability in `[0, 1]` that a resolved hit is critical.
    pub crit_chance: f32,
    /// Factor applied to critical hits, after tag multipliers.
    pub crit_multiplier: f32,
    /// Per-tag damage factors, applied in tag name order.
    pub tag_multipliers: BTreeMap<String, f32>,
}

impl CombatTuning {
    pub const DEFAULT_CRIT_CHANCE: f32 = 0.05;
    pub const DEFAULT_CRIT_MULTIPLIER: f32 = 2.0;

    /// Tuning with crits disabled and no tag multipliers.
    pub fn flat() -> Self {
        Self {
            crit_chance: 0.0,
            crit_multiplier: 1.0,
            tag_multipliers: BTreeMap::new(),
        }
    }

    pub fn with_crit(mut self, chance: f32, multiplier: f32) -> Self {
        self.crit_chance = chance;
        self.crit_multiplier = multiplier;
        self
    }

    pub fn with_tag_multiplier(mut self, tag: impl Into<String>, multiplier: f32) -> Self {
        self.tag_multipliers.insert(tag.into(), multiplier);
        self
    }

    pub fn multiplier(&self, tag: &str) -> Option<f32> {
        self.tag_multipliers.get(tag).copied()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.crit_chance) {
            return Err(ConfigError::InvalidTuning {
                field: "crit_chance".into(),
                value: self.crit_chance,
            });
        }
        if !self.crit_multiplier.is_finite() || self.crit_multiplier < 0.0 {
            return Err(ConfigError::InvalidTuning {
                field: "crit_multiplier".into(),
                value: self.crit_multiplier,
            });
        }
        for (tag, &value) in &self.tag_multipliers {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidTuning {
                    field: format!("tag_multipliers.{tag}"),
                    value,
                });
            }
        }
        Ok(())
    }
}

impl Default for CombatTuning {
    fn default() -> Self {
        Self {
            crit_chance: Self::DEFAULT_CRIT_CHANCE,
            crit_multiplier: Self::DEFAULT_CRIT_MULTIPLIER,
            tag_multipliers: BTreeMap::new(),
        }
    }
}

/// Misconfiguration detected while building a simulation.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("fixed step must be positive and finite (got {step_ms} ms)")]
    NonPositiveStep { step_ms: f64 },

    #[error("max_steps_per_advance must be at least 1")]
    ZeroStepCap,

    #[error("cell_size must be positive and finite (got {cell_size})")]
    InvalidCellSize { cell_size: f32 },

    #[error("invalid combat tuning: {field} = {value}")]
    InvalidTuning { field: String, value: f32 },
}

impl SimError for ConfigError {
    fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::Fatal
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::NonPositiveStep { .. } => "NON_POSITIVE_STEP",
            Self::ZeroStepCap => "ZERO_STEP_CAP",
            Self::InvalidCellSize { .. } => "INVALID_CELL_SIZE",
            Self::InvalidTuning { .. } => "INVALID_TUNING",
        }
    }
}
