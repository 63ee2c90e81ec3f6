//! Built-in gameplay systems driven by catalog templates.
//!
//! Enemies and bosses chase the nearest player inside their aggro radius at
//! their template speed and strike players within reach for their template
//! damage. Without a target they wander, steered by the `ai.wander` stream.
//! Both systems only use registry queries, setters and the damage queue.

use std::collections::BTreeMap;
use std::f32::consts::TAU;

use rand::Rng;
use serde::{Deserialize, Serialize};

use combat_content::ActorCatalog;
use combat_core::{
    ActorId, ActorKind, DamageRequest, DamageTags, EntityRegistry, Phase, TickContext, TickSystem,
    Vec2,
};

use crate::api::Result;

/// RNG stream used for idle wandering.
pub const WANDER_STREAM: &str = "ai.wander";

const HOSTILE: [ActorKind; 2] = [ActorKind::Enemy, ActorKind::Boss];

/// Tuning for the built-in pursuit and melee systems.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiSettings {
    /// Distance at which a hostile notices a player.
    pub aggro_radius: f32,
    /// Melee reach.
    pub reach: f32,
    /// Ticks between two strikes of the same attacker.
    pub cooldown_ticks: u64,
    /// Fraction of template speed used while wandering.
    pub wander_factor: f32,
}

impl AiSettings {
    pub const DEFAULT_AGGRO_RADIUS: f32 = 12.0;
    pub const DEFAULT_REACH: f32 = 1.5;
    pub const DEFAULT_COOLDOWN_TICKS: u64 = 30;
    pub const DEFAULT_WANDER_FACTOR: f32 = 0.25;
}

impl Default for AiSettings {
    fn default() -> Self {
        Self {
            aggro_radius: Self::DEFAULT_AGGRO_RADIUS,
            reach: Self::DEFAULT_REACH,
            cooldown_ticks: Self::DEFAULT_COOLDOWN_TICKS,
            wander_factor: Self::DEFAULT_WANDER_FACTOR,
        }
    }
}

/// Nearest living player within `radius` of `position`; ties go to the lower id.
fn nearest_player(
    registry: &EntityRegistry,
    position: Vec2,
    radius: f32,
    scratch: &mut Vec<ActorId>,
) -> Option<(ActorId, Vec2)> {
    registry.query_radius_into(position, radius, scratch);
    scratch
        .iter()
        .filter_map(|&id| registry.get(id))
        .filter(|actor| actor.kind() == ActorKind::Player)
        .map(|actor| (actor.id(), actor.position()))
        .min_by(|(_, a), (_, b)| {
            a.distance_squared(position)
                .total_cmp(&b.distance_squared(position))
        })
}

/// Moves hostile actors toward players (AI phase).
pub struct PursuitSystem {
    settings: AiSettings,
    speeds: BTreeMap<String, f32>,
    movers: Vec<ActorId>,
    scratch: Vec<ActorId>,
}

impl PursuitSystem {
    pub fn new(catalog: &ActorCatalog, settings: AiSettings) -> Self {
        let speeds = catalog
            .iter()
            .map(|(name, template)| (name.to_owned(), template.speed))
            .collect();
        Self {
            settings,
            speeds,
            movers: Vec::new(),
            scratch: Vec::new(),
        }
    }
}

impl TickSystem for PursuitSystem {
    fn name(&self) -> &str {
        "pursuit"
    }

    fn phase(&self) -> Phase {
        Phase::Ai
    }

    fn run(&mut self, ctx: &mut TickContext<'_>) {
        let dt = ctx.delta_secs();

        self.movers.clear();
        for kind in HOSTILE {
            self.movers.extend_from_slice(ctx.registry.view(kind));
        }
        self.movers.sort_unstable();

        for &id in &self.movers {
            let Some(actor) = ctx.registry.get(id) else {
                continue;
            };
            if !actor.is_alive() {
                continue;
            }
            let speed = actor
                .template()
                .and_then(|name| self.speeds.get(name))
                .copied()
                .unwrap_or(0.0);
            if speed <= 0.0 {
                continue;
            }
            let position = actor.position();

            let velocity = match nearest_player(
                ctx.registry,
                position,
                self.settings.aggro_radius,
                &mut self.scratch,
            ) {
                Some((_, target)) => {
                    let offset = target - position;
                    // stop at reach instead of stacking on the target
                    if offset.length() <= self.settings.reach {
                        Vec2::ZERO
                    } else {
                        offset.normalize_or_zero() * speed
                    }
                }
                None => {
                    let angle: f32 = ctx.rng.stream(WANDER_STREAM).gen_range(0.0..TAU);
                    Vec2::from_angle(angle) * speed * self.settings.wander_factor
                }
            };

            if let Err(err) = ctx.registry.set_velocity(id, velocity) {
                tracing::debug!(target: "combat::runtime", %id, %err, "velocity rejected");
                continue;
            }
            if let Err(err) = ctx.registry.set_position(id, position + velocity * dt) {
                tracing::debug!(target: "combat::runtime", %id, %err, "move rejected");
            }
        }
    }
}

struct AttackProfile {
    damage: f32,
    tags: DamageTags,
}

/// Hostile actors strike players within reach (damage phase).
pub struct MeleeSystem {
    settings: AiSettings,
    profiles: BTreeMap<String, AttackProfile>,
    last_strike: BTreeMap<ActorId, u64>,
    attackers: Vec<ActorId>,
    scratch: Vec<ActorId>,
}

impl MeleeSystem {
    /// Fails if a template carries tags that do not fit a damage request.
    pub fn new(catalog: &ActorCatalog, settings: AiSettings) -> Result<Self> {
        let mut profiles = BTreeMap::new();
        for (name, template) in catalog.iter() {
            if template.damage <= 0.0 {
                continue;
            }
            let tags = DamageTags::from_names(template.tags.iter().map(String::as_str))?;
            profiles.insert(
                name.to_owned(),
                AttackProfile {
                    damage: template.damage,
                    tags,
                },
            );
        }

        Ok(Self {
            settings,
            profiles,
            last_strike: BTreeMap::new(),
            attackers: Vec::new(),
            scratch: Vec::new(),
        })
    }

    fn ready(&self, id: ActorId, tick: u64) -> bool {
        self.last_strike
            .get(&id)
            .is_none_or(|&last| tick.saturating_sub(last) >= self.settings.cooldown_ticks)
    }
}

impl TickSystem for MeleeSystem {
    fn name(&self) -> &str {
        "melee"
    }

    fn phase(&self) -> Phase {
        Phase::Damage
    }

    fn run(&mut self, ctx: &mut TickContext<'_>) {
        let tick = ctx.tick.0;

        // forget attackers that have been reaped
        self.last_strike.retain(|id, _| ctx.registry.contains(*id));

        self.attackers.clear();
        for kind in HOSTILE {
            self.attackers.extend_from_slice(ctx.registry.view(kind));
        }
        self.attackers.sort_unstable();

        for index in 0..self.attackers.len() {
            let id = self.attackers[index];
            let Some(actor) = ctx.registry.get(id) else {
                continue;
            };
            if !actor.is_alive() || !self.ready(id, tick) {
                continue;
            }
            let Some(profile) = actor.template().and_then(|name| self.profiles.get(name)) else {
                continue;
            };

            let Some((target, _)) =
                nearest_player(ctx.registry, actor.position(), self.settings.reach, &mut self.scratch)
            else {
                continue;
            };

            let Ok(request) = DamageRequest::new(id, target, profile.damage) else {
                continue;
            };
            ctx.submit_damage(request.with_tags(profile.tags.clone()));
            self.last_strike.insert(id, tick);
        }
    }
}

#[cfg(test)]
mod tests {
    use combat_content::ActorTemplate;
    use combat_core::{Scheduler, SimConfig};

    use super::*;

    fn catalog() -> ActorCatalog {
        let mut catalog = ActorCatalog::new();
        catalog
            .insert(
                "grunt",
                ActorTemplate::new(ActorKind::Enemy, 30.0)
                    .with_speed(6.0)
                    .with_damage(4.0)
                    .with_tag("melee"),
            )
            .unwrap();
        catalog
            .insert("hero", ActorTemplate::new(ActorKind::Player, 100.0))
            .unwrap();
        catalog
    }

    fn scheduler(catalog: &ActorCatalog) -> Scheduler {
        let config = SimConfig::default()
            .with_seed(11)
            .with_combat(combat_core::CombatTuning::flat());
        let mut scheduler = Scheduler::new(config).unwrap();
        scheduler.add_system(PursuitSystem::new(catalog, AiSettings::default()));
        scheduler.add_system(MeleeSystem::new(catalog, AiSettings::default()).unwrap());
        scheduler
    }

    #[test]
    fn hostiles_close_in_and_strike_on_cooldown() {
        let catalog = catalog();
        let mut scheduler = scheduler(&catalog);
        scheduler.submit_spawn(catalog.spawn("hero", Vec2::ZERO).unwrap());
        scheduler.submit_spawn(catalog.spawn("grunt", Vec2::new(8.0, 0.0)).unwrap());

        for _ in 0..240 {
            scheduler.step();
        }

        let registry = scheduler.registry();
        let hero = registry.view(ActorKind::Player)[0];
        let grunt = registry.view(ActorKind::Enemy)[0];
        let gap = registry.get(grunt).unwrap().position().distance(Vec2::ZERO);
        assert!(gap <= AiSettings::DEFAULT_REACH + 0.2, "gap {gap}");

        let health = registry.get(hero).unwrap().health();
        assert!(health < 100.0);
        // at most one strike per cooldown window
        let strikes = (100.0 - health) / 4.0;
        assert!(strikes <= (240 / AiSettings::DEFAULT_COOLDOWN_TICKS + 1) as f32);
    }

    #[test]
    fn wandering_is_seeded() {
        let catalog = catalog();
        let run = || {
            let mut scheduler = scheduler(&catalog);
            scheduler.submit_spawn(catalog.spawn("grunt", Vec2::ZERO).unwrap());
            for _ in 0..30 {
                scheduler.step();
            }
            let registry = scheduler.registry();
            registry.get(registry.view(ActorKind::Enemy)[0]).unwrap().position()
        };

        let first = run();
        assert_ne!(first, Vec2::ZERO);
        assert_eq!(first, run());
    }

    #[test]
    fn extreme_speed_never_leaves_a_non_finite_position() {
        let mut catalog = catalog();
        catalog
            .insert(
                "streak",
                ActorTemplate::new(ActorKind::Enemy, 10.0).with_speed(f32::MAX),
            )
            .unwrap();

        let mut scheduler = scheduler(&catalog);
        scheduler.submit_spawn(catalog.spawn("streak", Vec2::ZERO).unwrap());
        for _ in 0..600 {
            scheduler.step();
        }

        let registry = scheduler.registry();
        let streak = registry.get(registry.view(ActorKind::Enemy)[0]).unwrap();
        assert!(streak.position().is_finite());
        assert!(streak.velocity().is_finite());
        assert_ne!(streak.position(), Vec2::ZERO);
    }

    #[test]
    fn invalid_template_tags_fail_construction() {
        let mut catalog = ActorCatalog::new();
        catalog
            .insert(
                "spiky",
                ActorTemplate::new(ActorKind::Enemy, 10.0)
                    .with_damage(1.0)
                    .with_tag("x".repeat(40)),
            )
            .unwrap();
        assert!(MeleeSystem::new(&catalog, AiSettings::default()).is_err());
    }
}
