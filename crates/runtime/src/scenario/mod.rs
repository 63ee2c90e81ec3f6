//! Scripted scenarios for harness runs and regression tests.
//!
//! A scenario fixes everything a run depends on besides content: the seed,
//! the frame deltas fed to the scheduler, spawn waves and scripted damage.
//! Scripted input is compiled into [`TickSystem`](combat_core::TickSystem)s so
//! it enters the simulation through the same phases as gameplay logic.
//!
//! ```ron
//! (
//!     name: "skirmish",
//!     seed: Some(7),
//!     frame_ms: Some(16.0),
//!     frames: 120,
//!     waves: [
//!         (tick: 1, template: "grunt", count: 4, at: (10.0, 0.0), spacing: (0.0, 2.0)),
//!     ],
//!     hits: [
//!         (tick: 30, target: Radius(center: (10.0, 3.0), radius: 4.0), amount: 12.0, group: Some(1)),
//!     ],
//! )
//! ```

mod script;

pub use script::{ScriptedDamage, ScriptedSpawns};

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use combat_content::ActorCatalog;
use combat_core::{ActorId, DamageRequest, DamageTags, Vec2};

use crate::api::{Result, RuntimeError};
use crate::systems::AiSettings;

/// Who a scripted hit lands on.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum HitTarget {
    /// One actor by raw id. Ids are handed out from 0 in spawn order.
    Actor(u32),
    /// Every live actor within `radius` of `center`, in id order.
    Radius { center: (f32, f32), radius: f32 },
    /// Every live actor inside the cone, in id order.
    Cone {
        origin: (f32, f32),
        direction: (f32, f32),
        half_angle_deg: f32,
        range: f32,
    },
}

/// Actors spawned from one template at a given tick.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpawnWave {
    pub tick: u64,
    pub template: String,
    #[serde(default = "one")]
    pub count: u32,
    /// Position of the first actor.
    pub at: (f32, f32),
    /// Offset between consecutive actors of the wave.
    #[serde(default)]
    pub spacing: (f32, f32),
}

fn one() -> u32 {
    1
}

/// Damage injected at a given tick.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScriptedHit {
    pub tick: u64,
    /// Source actor id; `None` is environmental damage.
    #[serde(default)]
    pub source: Option<u32>,
    pub target: HitTarget,
    pub amount: f32,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub group: Option<u32>,
    #[serde(default)]
    pub knockback: Option<(f32, f32)>,
    /// Number of identical requests submitted back to back.
    #[serde(default = "one")]
    pub repeat: u32,
}

/// A complete scripted run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub name: String,
    /// Overrides the config's run seed.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Wall-clock delta fed per frame; defaults to the fixed step.
    #[serde(default)]
    pub frame_ms: Option<f64>,
    pub frames: u32,
    #[serde(default)]
    pub waves: Vec<SpawnWave>,
    #[serde(default)]
    pub hits: Vec<ScriptedHit>,
    /// Enables the built-in pursuit and melee systems.
    #[serde(default)]
    pub ai: Option<AiSettings>,
}

impl Scenario {
    /// Load scenario from a RON file.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| RuntimeError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let scenario: Scenario =
            ron::from_str(&content).map_err(|source| RuntimeError::ScenarioParse {
                path: path.to_path_buf(),
                source,
            })?;

        tracing::debug!(
            target: "combat::runtime",
            name = %scenario.name,
            frames = scenario.frames,
            waves = scenario.waves.len(),
            hits = scenario.hits.len(),
            "loaded scenario"
        );
        Ok(scenario)
    }

    /// Frame delta, falling back to `fixed_step` when unset.
    pub fn frame_delta(&self, fixed_step: Duration) -> Result<Duration> {
        let Some(frame_ms) = self.frame_ms else {
            return Ok(fixed_step);
        };
        if !frame_ms.is_finite() || frame_ms <= 0.0 {
            return Err(RuntimeError::InvalidScenario(format!(
                "frame_ms must be positive (got {frame_ms})"
            )));
        }
        Duration::try_from_secs_f64(frame_ms / 1000.0).map_err(|_| {
            RuntimeError::InvalidScenario(format!("frame_ms out of range (got {frame_ms})"))
        })
    }

    /// Resolves templates and validates every hit, producing the systems that
    /// replay the script.
    pub fn compile(&self, catalog: &ActorCatalog) -> Result<(ScriptedSpawns, ScriptedDamage)> {
        let mut waves = Vec::with_capacity(self.waves.len());
        for wave in &self.waves {
            if wave.tick == 0 {
                return Err(RuntimeError::InvalidScenario(format!(
                    "wave '{}' is scheduled at tick 0; the first tick is 1",
                    wave.template
                )));
            }
            let origin = Vec2::from(wave.at);
            let spacing = Vec2::from(wave.spacing);
            let spawns = (0..wave.count)
                .map(|i| catalog.spawn(&wave.template, origin + spacing * i as f32))
                .collect::<std::result::Result<Vec<_>, _>>()?;
            waves.push((wave.tick, spawns));
        }

        let mut hits = Vec::with_capacity(self.hits.len());
        for hit in &self.hits {
            if hit.tick == 0 {
                return Err(RuntimeError::InvalidScenario(
                    "hit is scheduled at tick 0; the first tick is 1".into(),
                ));
            }
            let source = hit.source.map_or(ActorId::WORLD, ActorId);
            let tags = DamageTags::from_names(hit.tags.iter().map(String::as_str))?;
            let mut request = DamageRequest::new(source, ActorId::WORLD, hit.amount)?.with_tags(tags);
            request.knockback = hit.knockback.map(Vec2::from);
            request.group = hit.group;

            hits.push(script::PreparedHit {
                tick: hit.tick,
                target: hit.target.clone(),
                prototype: request,
                repeat: hit.repeat,
            });
        }

        Ok((ScriptedSpawns::new(waves), ScriptedDamage::new(hits)))
    }
}
