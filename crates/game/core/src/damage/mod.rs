//! Damage requests, modifiers and per-tick resolution.
mod modifiers;
mod pipeline;
mod request;
mod result;

pub use modifiers::calculate_damage;
pub use pipeline::DamagePipeline;
pub use request::{DamageRequest, DamageTags, GroupKey, MAX_TAG_LEN, MAX_TAGS, RequestError, Tag};
pub use result::{DamageBatch, DamageResult, PipelineStats};
