//! Damage calculation.

use super::request::DamageTags;
use crate::config::CombatTuning;

/// Calculate the damage of one hit before clamping to remaining health.
///
/// # Formula
///
/// ```text
/// amount = base
/// for tag in tags (lexicographic):
///     amount *= tag_multiplier[tag]     (tags without a multiplier are skipped)
/// if critical:
///     amount *= crit_multiplier
/// ```
///
/// The operations and their order never vary, so the result is bit-identical
/// across runs.
pub fn calculate_damage(base: f32, tags: &DamageTags, is_critical: bool, tuning: &CombatTuning) -> f32 {
    let mut amount = base;

    for tag in tags.iter() {
        if let Some(multiplier) = tuning.multiplier(tag) {
            amount *= multiplier;
        }
    }

    if is_critical {
        amount *= tuning.crit_multiplier;
    }

    // Overflowing multipliers saturate instead of producing infinity.
    amount.max(0.0).min(f32::MAX)
}
