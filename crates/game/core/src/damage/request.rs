//! Damage requests and their tag sets.

use arrayvec::{ArrayString, ArrayVec};
use glam::Vec2;

use crate::actor::ActorId;
use crate::error::{ErrorSeverity, SimError};

/// Most tags a single request may carry.
pub const MAX_TAGS: usize = 8;

/// Longest tag name, in bytes.
pub const MAX_TAG_LEN: usize = 24;

pub type Tag = ArrayString<MAX_TAG_LEN>;

/// Validation failures while building a request.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum RequestError {
    #[error("base amount must be finite and non-negative (got {0})")]
    InvalidAmount(f32),

    #[error("tag '{0}' is empty or longer than {MAX_TAG_LEN} bytes")]
    InvalidTag(String),

    #[error("more than {MAX_TAGS} tags")]
    TooManyTags,
}

impl SimError for RequestError {
    fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::Validation
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidAmount(_) => "INVALID_AMOUNT",
            Self::InvalidTag(_) => "INVALID_TAG",
            Self::TooManyTags => "TOO_MANY_TAGS",
        }
    }
}

/// Sorted, deduplicated set of short tags such as `melee` or `fire`.
///
/// Stored inline, so copying a request never allocates. Iteration order is
/// lexicographic, which is also the order multipliers are applied in.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "Vec<String>", into = "Vec<String>"))]
pub struct DamageTags {
    tags: ArrayVec<Tag, MAX_TAGS>,
}

impl DamageTags {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a set from names. Duplicates collapse.
    pub fn from_names<'a>(names: impl IntoIterator<Item = &'a str>) -> Result<Self, RequestError> {
        let mut tags = Self::new();
        for name in names {
            tags.insert(name)?;
        }
        Ok(tags)
    }

    /// Adds a tag. Returns false if it was already present.
    pub fn insert(&mut self, name: &str) -> Result<bool, RequestError> {
        if name.is_empty() {
            return Err(RequestError::InvalidTag(name.to_owned()));
        }
        let tag = Tag::from(name).map_err(|_| RequestError::InvalidTag(name.to_owned()))?;

        match self.tags.binary_search(&tag) {
            Ok(_) => Ok(false),
            Err(position) => {
                self.tags
                    .try_insert(position, tag)
                    .map_err(|_| RequestError::TooManyTags)?;
                Ok(true)
            }
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tags.iter().any(|tag| tag.as_str() == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.tags.iter().map(|tag| tag.as_str())
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

impl TryFrom<Vec<String>> for DamageTags {
    type Error = RequestError;

    fn try_from(names: Vec<String>) -> Result<Self, Self::Error> {
        Self::from_names(names.iter().map(String::as_str))
    }
}

impl From<DamageTags> for Vec<String> {
    fn from(tags: DamageTags) -> Self {
        tags.iter().map(str::to_owned).collect()
    }
}

/// Grouping key for coalescing simultaneous hits into one batch event.
pub type GroupKey = u32;

/// One hit to resolve, produced and consumed within a single tick.
#[derive(Clone, Debug, PartialEq)]
pub struct DamageRequest {
    pub source_id: ActorId,
    pub target_id: ActorId,
    base_amount: f32,
    pub tags: DamageTags,
    /// Displacement applied to a surviving target.
    pub knockback: Option<Vec2>,
    /// Requests sharing `(source_id, group)` within a tick are reported as one batch.
    pub group: Option<GroupKey>,
}

impl DamageRequest {
    pub fn new(source_id: ActorId, target_id: ActorId, base_amount: f32) -> Result<Self, RequestError> {
        if !base_amount.is_finite() || base_amount < 0.0 {
            return Err(RequestError::InvalidAmount(base_amount));
        }
        Ok(Self {
            source_id,
            target_id,
            base_amount,
            tags: DamageTags::new(),
            knockback: None,
            group: None,
        })
    }

    pub fn with_tag(mut self, name: &str) -> Result<Self, RequestError> {
        self.tags.insert(name)?;
        Ok(self)
    }

    pub fn with_tags(mut self, tags: DamageTags) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_knockback(mut self, knockback: Vec2) -> Self {
        self.knockback = Some(knockback);
        self
    }

    pub fn in_group(mut self, group: GroupKey) -> Self {
        self.group = Some(group);
        self
    }

    pub fn base_amount(&self) -> f32 {
        self.base_amount
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_are_sorted_and_deduplicated() {
        let tags = DamageTags::from_names(["melee", "fire", "melee", "aoe"]).unwrap();
        assert_eq!(tags.iter().collect::<Vec<_>>(), vec!["aoe", "fire", "melee"]);
        assert!(tags.contains("fire"));
        assert!(!tags.contains("cold"));
    }

    #[test]
    fn tag_limits_are_enforced() {
        assert!(matches!(
            DamageTags::from_names([""]),
            Err(RequestError::InvalidTag(_))
        ));
        assert!(matches!(
            DamageTags::from_names(["x".repeat(MAX_TAG_LEN + 1).as_str()]),
            Err(RequestError::InvalidTag(_))
        ));

        let names: Vec<String> = (0..=MAX_TAGS).map(|i| format!("t{i}")).collect();
        assert_eq!(
            DamageTags::from_names(names.iter().map(String::as_str)),
            Err(RequestError::TooManyTags)
        );
    }

    #[test]
    fn negative_or_nan_amounts_are_rejected() {
        assert!(DamageRequest::new(ActorId(0), ActorId(1), -1.0).is_err());
        assert!(DamageRequest::new(ActorId(0), ActorId(1), f32::NAN).is_err());
        assert_eq!(
            DamageRequest::new(ActorId(0), ActorId(1), 0.0).unwrap().base_amount(),
            0.0
        );
    }
}
