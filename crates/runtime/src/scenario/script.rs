//! Tick systems replaying a compiled scenario.

use combat_core::{
    ActorId, ActorSpawn, DamageRequest, Phase, TickContext, TickSystem, Vec2,
};

use super::HitTarget;

pub(super) struct PreparedHit {
    pub tick: u64,
    pub target: HitTarget,
    /// Request with a placeholder target, cloned per resolved target.
    pub prototype: DamageRequest,
    pub repeat: u32,
}

/// Submits scripted spawn waves during the spawn phase of their tick.
pub struct ScriptedSpawns {
    /// `(tick, spawns)` sorted by tick; waves sharing a tick keep script order.
    waves: Vec<(u64, Vec<ActorSpawn>)>,
    cursor: usize,
}

impl ScriptedSpawns {
    pub(super) fn new(mut waves: Vec<(u64, Vec<ActorSpawn>)>) -> Self {
        waves.sort_by_key(|(tick, _)| *tick);
        Self { waves, cursor: 0 }
    }

    /// Waves not yet submitted.
    pub fn remaining(&self) -> usize {
        self.waves.len() - self.cursor
    }
}

impl TickSystem for ScriptedSpawns {
    fn name(&self) -> &str {
        "scripted-spawns"
    }

    fn phase(&self) -> Phase {
        Phase::Spawn
    }

    fn run(&mut self, ctx: &mut TickContext<'_>) {
        while let Some((tick, spawns)) = self.waves.get(self.cursor) {
            if *tick > ctx.tick.0 {
                break;
            }
            if *tick < ctx.tick.0 {
                tracing::warn!(
                    target: "combat::runtime",
                    wave_tick = *tick,
                    tick = ctx.tick.0,
                    "scripted wave missed its tick, submitting late"
                );
            }
            for spawn in spawns {
                ctx.spawn(spawn.clone());
            }
            self.cursor += 1;
        }
    }
}

/// Submits scripted damage during the damage phase of its tick.
///
/// Area targets are resolved against the registry at that moment, so they hit
/// whoever is alive inside the area, in id order.
pub struct ScriptedDamage {
    hits: Vec<PreparedHit>,
    cursor: usize,
    targets: Vec<ActorId>,
}

impl ScriptedDamage {
    pub(super) fn new(mut hits: Vec<PreparedHit>) -> Self {
        hits.sort_by_key(|hit| hit.tick);
        Self {
            hits,
            cursor: 0,
            targets: Vec::new(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.hits.len() - self.cursor
    }
}

impl TickSystem for ScriptedDamage {
    fn name(&self) -> &str {
        "scripted-damage"
    }

    fn phase(&self) -> Phase {
        Phase::Damage
    }

    fn run(&mut self, ctx: &mut TickContext<'_>) {
        while let Some(hit) = self.hits.get(self.cursor) {
            if hit.tick > ctx.tick.0 {
                break;
            }

            self.targets.clear();
            match hit.target {
                HitTarget::Actor(id) => self.targets.push(ActorId(id)),
                HitTarget::Radius { center, radius } => {
                    ctx.registry
                        .query_radius_into(Vec2::from(center), radius, &mut self.targets);
                }
                HitTarget::Cone {
                    origin,
                    direction,
                    half_angle_deg,
                    range,
                } => {
                    ctx.registry.query_cone_into(
                        Vec2::from(origin),
                        Vec2::from(direction),
                        half_angle_deg.to_radians(),
                        range,
                        &mut self.targets,
                    );
                }
            }

            tracing::trace!(
                target: "combat::runtime",
                tick = ctx.tick.0,
                targets = self.targets.len(),
                repeat = hit.repeat,
                "scripted hit"
            );

            for &target in &self.targets {
                for _ in 0..hit.repeat {
                    let mut request = hit.prototype.clone();
                    request.target_id = target;
                    ctx.submit_damage(request);
                }
            }
            self.cursor += 1;
        }
    }
}
