//! Session orchestration around one [`Scheduler`].
//!
//! [`SessionBuilder`] collects config, catalog, an optional scenario and extra
//! systems; [`Session`] owns the resulting scheduler together with a
//! [`RunDigest`] and an event tally for the run summary.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use combat_content::ActorCatalog;
use combat_core::{
    ActorKind, AdvanceReport, DamageRequest, EventKind, Scheduler, SimConfig, SimEvent, Snapshot,
    Tick, TickSystem, Vec2,
};
use strum::IntoEnumIterator;

use crate::api::{Result, RuntimeError};
use crate::digest::RunDigest;
use crate::scenario::Scenario;
use crate::systems::{AiSettings, MeleeSystem, PursuitSystem};

/// Counters folded from the event stream.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct EventTally {
    pub spawned: u64,
    pub kills: u64,
    pub damage_events: u64,
    pub batches: u64,
    pub crits: u64,
    pub total_damage: f64,
    pub bounty: u64,
}

impl EventTally {
    fn absorb(&mut self, event: &SimEvent) {
        match event {
            SimEvent::EntitySpawned(_) => self.spawned += 1,
            SimEvent::EntityKilled(kill) => {
                self.kills += 1;
                self.bounty += u64::from(kill.bounty);
            }
            SimEvent::DamageApplied(result) => {
                self.damage_events += 1;
                self.crits += u64::from(result.is_crit);
                self.total_damage += f64::from(result.final_amount);
            }
            SimEvent::DamageBatched(batch) => {
                self.batches += 1;
                self.damage_events += batch.len() as u64;
                self.crits += batch.entries.iter().filter(|entry| entry.is_crit).count() as u64;
                self.total_damage += f64::from(batch.total());
            }
            SimEvent::StepAdvanced(_) => {}
        }
    }
}

/// Machine-readable outcome of a run.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RunSummary {
    pub scenario: String,
    pub seed: u64,
    pub frames: u32,
    pub ticks: u64,
    pub discarded_steps: u64,
    #[serde(flatten)]
    pub tally: EventTally,
    /// Registered actors per kind at the end of the run.
    pub survivors: BTreeMap<String, usize>,
    pub digest: String,
}

/// Builder for [`Session`].
pub struct SessionBuilder {
    config: SimConfig,
    catalog: Option<Arc<ActorCatalog>>,
    seed: Option<u64>,
    scenario: Option<Scenario>,
    ai: Option<AiSettings>,
    systems: Vec<Box<dyn TickSystem>>,
}

impl SessionBuilder {
    fn new() -> Self {
        Self {
            config: SimConfig::default(),
            catalog: None,
            seed: None,
            scenario: None,
            ai: None,
            systems: Vec::new(),
        }
    }

    /// Override simulation configuration
    pub fn config(mut self, config: SimConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the required actor catalog
    pub fn catalog(mut self, catalog: impl Into<Arc<ActorCatalog>>) -> Self {
        self.catalog = Some(catalog.into());
        self
    }

    /// Override the run seed. Takes precedence over config and scenario.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Replay a scenario. Its seed applies unless [`seed`](Self::seed) is set.
    pub fn scenario(mut self, scenario: Scenario) -> Self {
        self.scenario = Some(scenario);
        self
    }

    /// Enable the built-in pursuit and melee systems.
    pub fn ai(mut self, settings: AiSettings) -> Self {
        self.ai = Some(settings);
        self
    }

    /// Add a gameplay system; systems run after scripted input of the same phase.
    pub fn system(mut self, system: impl TickSystem + 'static) -> Self {
        self.systems.push(Box::new(system));
        self
    }

    /// Build the session
    pub fn build(self) -> Result<Session> {
        let catalog = self.catalog.ok_or(RuntimeError::MissingCatalog)?;

        let mut config = self.config;
        if let Some(seed) = self
            .seed
            .or_else(|| self.scenario.as_ref().and_then(|scenario| scenario.seed))
        {
            config.run_seed = seed;
        }

        let mut scheduler = Scheduler::new(config)?;

        let mut frames = None;
        let mut name = String::from("interactive");
        let mut ai = self.ai;
        if let Some(scenario) = &self.scenario {
            let (spawns, damage) = scenario.compile(&catalog)?;
            scheduler.add_system(spawns);
            scheduler.add_system(damage);
            frames = Some(FramePlan {
                delta: scenario.frame_delta(scheduler.fixed_step())?,
                count: scenario.frames,
            });
            if !scenario.name.is_empty() {
                name = scenario.name.clone();
            }
            ai = ai.or_else(|| scenario.ai.clone());
        }

        if let Some(settings) = ai {
            scheduler.add_system(PursuitSystem::new(&catalog, settings.clone()));
            scheduler.add_system(MeleeSystem::new(&catalog, settings)?);
        }

        for system in self.systems {
            scheduler.add_boxed_system(system);
        }

        let digest = RunDigest::attach(scheduler.bus_mut());
        let tally = Rc::new(RefCell::new(EventTally::default()));
        for kind in EventKind::iter().filter(|kind| *kind != EventKind::StepAdvanced) {
            let tally = Rc::clone(&tally);
            scheduler
                .bus_mut()
                .subscribe(kind, move |event, _| tally.borrow_mut().absorb(event));
        }

        tracing::info!(
            target: "combat::runtime",
            session = %name,
            seed = scheduler.config().run_seed,
            templates = catalog.len(),
            "session ready"
        );

        Ok(Session {
            scheduler,
            catalog,
            digest,
            tally,
            frames,
            name,
            frames_run: 0,
            discarded: 0,
        })
    }
}

#[derive(Clone, Copy, Debug)]
struct FramePlan {
    delta: Duration,
    count: u32,
}

/// A running simulation with its bookkeeping.
pub struct Session {
    scheduler: Scheduler,
    catalog: Arc<ActorCatalog>,
    digest: RunDigest,
    tally: Rc<RefCell<EventTally>>,
    frames: Option<FramePlan>,
    name: String,
    frames_run: u32,
    discarded: u64,
}

impl Session {
    /// Create a new session builder
    pub fn builder() -> SessionBuilder {
        SessionBuilder::new()
    }

    /// Queue a spawn of catalog template `template` for the next tick.
    pub fn spawn(&mut self, template: &str, position: Vec2) -> Result<()> {
        let spawn = self.catalog.spawn(template, position)?;
        self.scheduler.submit_spawn(spawn);
        Ok(())
    }

    /// Queue damage for the next tick.
    pub fn submit_damage(&mut self, request: DamageRequest) {
        self.scheduler.submit_damage(request);
    }

    /// Feed one frame of wall-clock time.
    pub fn advance(&mut self, wall_delta: Duration) -> AdvanceReport {
        let report = self.scheduler.advance(wall_delta);
        self.frames_run = self.frames_run.saturating_add(1);
        self.discarded += report.discarded;
        report
    }

    /// Run exactly one tick.
    pub fn step(&mut self) -> Tick {
        self.scheduler.step()
    }

    /// Run the scenario's frame plan to completion and summarize.
    pub fn run(&mut self) -> Result<RunSummary> {
        let plan = self.frames.take().ok_or_else(|| {
            RuntimeError::InvalidScenario("session was built without a scenario".into())
        })?;

        let _span = tracing::info_span!(target: "combat::runtime", "run", session = %self.name).entered();
        for _ in 0..plan.count {
            self.advance(plan.delta);
        }

        let summary = self.summary();
        tracing::info!(
            target: "combat::runtime",
            ticks = summary.ticks,
            kills = summary.tally.kills,
            digest = %summary.digest,
            "run complete"
        );
        Ok(summary)
    }

    /// Summary of everything run so far.
    pub fn summary(&self) -> RunSummary {
        let registry = self.scheduler.registry();
        let survivors = ActorKind::iter()
            .map(|kind| (kind.to_string(), registry.view(kind).len()))
            .collect();

        RunSummary {
            scenario: self.name.clone(),
            seed: self.scheduler.config().run_seed,
            frames: self.frames_run,
            ticks: self.scheduler.tick().0,
            discarded_steps: self.discarded,
            tally: self.tally.borrow().clone(),
            survivors,
            digest: self.digest(),
        }
    }

    /// Hex digest of the damage stream so far plus current actor state.
    pub fn digest(&self) -> String {
        self.digest.finish(self.scheduler.registry())
    }

    pub fn tally(&self) -> EventTally {
        self.tally.borrow().clone()
    }

    pub fn snapshot(&self) -> &Snapshot {
        self.scheduler.snapshot()
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Mutable access for subscribing, pausing or submitting directly.
    pub fn scheduler_mut(&mut self) -> &mut Scheduler {
        &mut self.scheduler
    }

    pub fn catalog(&self) -> &ActorCatalog {
        &self.catalog
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("name", &self.name)
            .field("scheduler", &self.scheduler)
            .field("digest", &self.digest)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use combat_content::ActorTemplate;

    use super::*;

    fn catalog() -> ActorCatalog {
        let mut catalog = ActorCatalog::new();
        catalog
            .insert("grunt", ActorTemplate::new(ActorKind::Enemy, 20.0).with_bounty(2))
            .unwrap();
        catalog
    }

    #[test]
    fn build_requires_a_catalog() {
        assert!(matches!(
            Session::builder().build(),
            Err(RuntimeError::MissingCatalog)
        ));
    }

    #[test]
    fn invalid_config_surfaces_as_config_error() {
        let config = SimConfig {
            max_steps_per_advance: 0,
            ..SimConfig::default()
        };
        let err = Session::builder()
            .config(config)
            .catalog(catalog())
            .build()
            .unwrap_err();
        assert!(matches!(err, RuntimeError::Config(_)));
    }

    #[test]
    fn seed_precedence_is_builder_then_scenario_then_config() {
        let scenario = Scenario {
            name: "s".into(),
            seed: Some(2),
            frame_ms: None,
            frames: 1,
            waves: Vec::new(),
            hits: Vec::new(),
            ai: None,
        };
        let config = SimConfig::default().with_seed(1);

        let session = Session::builder()
            .config(config.clone())
            .catalog(catalog())
            .scenario(scenario.clone())
            .build()
            .unwrap();
        assert_eq!(session.summary().seed, 2);

        let session = Session::builder()
            .config(config)
            .catalog(catalog())
            .scenario(scenario)
            .seed(3)
            .build()
            .unwrap();
        assert_eq!(session.summary().seed, 3);
    }

    #[test]
    fn interactive_session_tallies_events() {
        let mut session = Session::builder()
            .config(SimConfig::default().with_combat(combat_core::CombatTuning::flat()))
            .catalog(catalog())
            .build()
            .unwrap();
        session.spawn("grunt", Vec2::ZERO).unwrap();
        assert!(session.spawn("dragon", Vec2::ZERO).is_err());
        session.step();

        let id = session.scheduler().registry().view(ActorKind::Enemy)[0];
        session.submit_damage(DamageRequest::new(combat_core::ActorId::WORLD, id, 25.0).unwrap());
        session.step();

        let tally = session.tally();
        assert_eq!(tally.spawned, 1);
        assert_eq!(tally.kills, 1);
        assert_eq!(tally.bounty, 2);
        assert_eq!(tally.total_damage, 20.0);

        let summary = session.summary();
        assert_eq!(summary.survivors["enemy"], 0);
        assert_eq!(summary.ticks, 2);
        assert!(session.run().is_err());
    }
}
