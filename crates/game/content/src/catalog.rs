//! Actor templates and the catalog that turns them into spawns.

use std::collections::BTreeMap;
use std::sync::Arc;

use combat_core::{ActorKind, ActorSpawn, Vec2};

/// Static description of an actor type.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ActorTemplate {
    pub kind: ActorKind,
    pub health: f32,
    /// Movement speed in world units per second.
    #[cfg_attr(feature = "serde", serde(default))]
    pub speed: f32,
    /// Base damage of the actor's attack.
    #[cfg_attr(feature = "serde", serde(default))]
    pub damage: f32,
    /// Reward reported when the actor is killed.
    #[cfg_attr(feature = "serde", serde(default))]
    pub bounty: u32,
    /// Tags attached to the actor's attacks.
    #[cfg_attr(feature = "serde", serde(default))]
    pub tags: Vec<String>,
}

impl ActorTemplate {
    pub fn new(kind: ActorKind, health: f32) -> Self {
        Self {
            kind,
            health,
            speed: 0.0,
            damage: 0.0,
            bounty: 0,
            tags: Vec::new(),
        }
    }

    pub fn with_speed(mut self, speed: f32) -> Self {
        self.speed = speed;
        self
    }

    pub fn with_damage(mut self, damage: f32) -> Self {
        self.damage = damage;
        self
    }

    pub fn with_bounty(mut self, bounty: u32) -> Self {
        self.bounty = bounty;
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    fn validate(&self) -> Result<(), &'static str> {
        if !self.health.is_finite() || self.health <= 0.0 {
            return Err("health must be positive and finite");
        }
        if !self.speed.is_finite() || self.speed < 0.0 {
            return Err("speed must be non-negative and finite");
        }
        if !self.damage.is_finite() || self.damage < 0.0 {
            return Err("damage must be non-negative and finite");
        }
        Ok(())
    }
}

/// Errors raised while building or querying a catalog.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum CatalogError {
    #[error("unknown actor template '{0}'")]
    UnknownTemplate(String),

    #[error("duplicate actor template '{0}'")]
    DuplicateTemplate(String),

    #[error("invalid actor template '{name}': {reason}")]
    InvalidTemplate { name: String, reason: &'static str },
}

/// Named actor templates, iterated in name order.
#[derive(Clone, Debug, Default)]
pub struct ActorCatalog {
    templates: BTreeMap<Arc<str>, ActorTemplate>,
}

impl ActorCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a template. Names must be unique and templates valid.
    pub fn insert(
        &mut self,
        name: impl Into<Arc<str>>,
        template: ActorTemplate,
    ) -> Result<(), CatalogError> {
        let name = name.into();
        if self.templates.contains_key(&name) {
            return Err(CatalogError::DuplicateTemplate(name.to_string()));
        }
        template
            .validate()
            .map_err(|reason| CatalogError::InvalidTemplate {
                name: name.to_string(),
                reason,
            })?;
        self.templates.insert(name, template);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ActorTemplate> {
        self.templates.get(name)
    }

    /// Builds a spawn for template `name` at `position`.
    ///
    /// The spawn carries the template name, so the registered actor can be
    /// traced back to its template.
    pub fn spawn(&self, name: &str, position: Vec2) -> Result<ActorSpawn, CatalogError> {
        let (key, template) = self
            .templates
            .get_key_value(name)
            .ok_or_else(|| CatalogError::UnknownTemplate(name.to_owned()))?;

        Ok(ActorSpawn::new(template.kind, position, template.health)
            .with_bounty(template.bounty)
            .with_template(Arc::clone(key)))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.templates.keys().map(|name| &**name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ActorTemplate)> {
        self.templates.iter().map(|(name, template)| (&**name, template))
    }

    /// Templates of one kind, in name order.
    pub fn of_kind(&self, kind: ActorKind) -> impl Iterator<Item = (&str, &ActorTemplate)> {
        self.iter().filter(move |(_, template)| template.kind == kind)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}
