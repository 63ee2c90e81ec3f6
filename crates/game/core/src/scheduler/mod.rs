//! Fixed-timestep tick driver.
//!
//! The [`Scheduler`] owns every simulation component and is the only place a
//! tick is run from. Wall-clock time enters through [`Scheduler::advance`],
//! which feeds an accumulator and runs whole fixed steps out of it, so the
//! sequence of ticks never depends on frame timing.
//!
//! # Tick
//!
//! ```text
//! Spawn    systems ─► register queued spawns ─► entity_spawned
//! Ai       systems
//! Damage   systems ─► resolve queued damage  ─► damage_applied / damage_batched / entity_killed
//! Cleanup  systems ─► snapshot ─► reap dead  ─► conservation check ─► step_advanced
//! ```

mod system;

pub use system::{Phase, TickContext, TickSystem};

use std::time::Duration;

use strum::{EnumCount, IntoEnumIterator};

use crate::actor::{ActorKind, ActorSpawn, Tick};
use crate::config::{ConfigError, SimConfig};
use crate::damage::{DamagePipeline, DamageRequest, PipelineStats};
use crate::error::SimError;
use crate::events::{EventBus, SimEvent, SpawnReport, StepReport};
use crate::pool::ObjectPool;
use crate::registry::{EntityRegistry, Snapshot};
use crate::rng::RngStreams;

/// What one [`Scheduler::advance`] call did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AdvanceReport {
    /// Ticks run.
    pub ticks: u32,
    /// Whole steps dropped because the per-call cap was reached.
    pub discarded: u64,
}

/// Drives the simulation in fixed steps.
pub struct Scheduler {
    config: SimConfig,
    fixed_step: Duration,
    accumulator: Duration,
    paused: bool,
    tick: Tick,

    registry: EntityRegistry,
    pool: ObjectPool,
    bus: EventBus,
    rng: RngStreams,
    pipeline: DamagePipeline,

    systems: [Vec<Box<dyn TickSystem>>; Phase::COUNT],
    spawns: Vec<ActorSpawn>,
    snapshot: Snapshot,
}

impl Scheduler {
    /// Builds a scheduler and every component it owns.
    ///
    /// Fails on a non-positive fixed step, a zero step cap or unusable
    /// tuning; nothing is constructed in that case.
    pub fn new(config: SimConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let fixed_step = config.fixed_step()?;

        let capacity = config.pools.total();
        tracing::debug!(
            target: "combat::scheduler",
            step_ms = config.fixed_step_ms,
            cap = config.max_steps_per_advance,
            seed = config.run_seed,
            capacity,
            "scheduler created"
        );

        Ok(Self {
            fixed_step,
            accumulator: Duration::ZERO,
            paused: false,
            tick: Tick::ZERO,
            registry: EntityRegistry::new(config.cell_size, capacity),
            pool: ObjectPool::new(config.pools),
            bus: EventBus::new(),
            rng: RngStreams::seed_run(config.run_seed),
            pipeline: DamagePipeline::new(),
            systems: std::array::from_fn(|_| Vec::new()),
            spawns: Vec::new(),
            snapshot: Snapshot::default(),
            config,
        })
    }

    /// Adds a system to the end of its phase.
    pub fn add_system(&mut self, system: impl TickSystem + 'static) {
        self.add_boxed_system(Box::new(system));
    }

    pub fn add_boxed_system(&mut self, system: Box<dyn TickSystem>) {
        tracing::debug!(
            target: "combat::scheduler",
            name = system.name(),
            phase = %system.phase(),
            "system added"
        );
        self.systems[system.phase().index()].push(system);
    }

    /// Feeds wall-clock time and runs every whole step it covers, up to the
    /// per-call cap.
    ///
    /// Steps beyond the cap are dropped rather than carried over, so a long
    /// stall never turns into a burst of catch-up ticks. The sub-step
    /// remainder is kept.
    pub fn advance(&mut self, wall_delta: Duration) -> AdvanceReport {
        let mut report = AdvanceReport::default();
        if self.paused {
            return report;
        }

        self.accumulator = self.accumulator.saturating_add(wall_delta);

        while self.accumulator >= self.fixed_step {
            if report.ticks >= self.config.max_steps_per_advance {
                report.discarded = self.discard_backlog();
                break;
            }
            self.accumulator -= self.fixed_step;
            self.run_tick();
            report.ticks += 1;
        }

        report
    }

    fn discard_backlog(&mut self) -> u64 {
        let step = self.fixed_step.as_nanos();
        let pending = self.accumulator.as_nanos();
        let whole = pending / step;
        // remainder < step, which itself fits in a Duration
        self.accumulator = Duration::from_nanos(u64::try_from(pending % step).unwrap_or(0));

        let discarded = u64::try_from(whole).unwrap_or(u64::MAX);
        tracing::warn!(
            target: "combat::scheduler",
            tick = self.tick.0,
            discarded,
            cap = self.config.max_steps_per_advance,
            "step cap reached, dropping backlog"
        );
        discarded
    }

    /// Runs exactly one tick regardless of the accumulator or pause state.
    ///
    /// Returns the index of the tick that ran.
    pub fn step(&mut self) -> Tick {
        self.run_tick()
    }

    pub fn pause(&mut self) {
        if !self.paused {
            tracing::debug!(target: "combat::scheduler", tick = self.tick.0, "paused");
        }
        self.paused = true;
    }

    pub fn resume(&mut self) {
        if self.paused {
            tracing::debug!(target: "combat::scheduler", tick = self.tick.0, "resumed");
        }
        self.paused = false;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Queues a spawn for the next spawn phase.
    pub fn submit_spawn(&mut self, spawn: ActorSpawn) {
        self.spawns.push(spawn);
    }

    /// Queues a damage request for the next damage phase.
    pub fn submit_damage(&mut self, request: DamageRequest) {
        self.pipeline.submit(request);
    }

    // ===== accessors =====

    /// Number of ticks run so far.
    pub fn tick(&self) -> Tick {
        self.tick
    }

    pub fn fixed_step(&self) -> Duration {
        self.fixed_step
    }

    pub fn accumulated(&self) -> Duration {
        self.accumulator
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    pub fn pool(&self) -> &ObjectPool {
        &self.pool
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Mutable bus access for subscribing between ticks.
    pub fn bus_mut(&mut self) -> &mut EventBus {
        &mut self.bus
    }

    pub fn rng(&self) -> &RngStreams {
        &self.rng
    }

    pub fn rng_mut(&mut self) -> &mut RngStreams {
        &mut self.rng
    }

    /// View of the last completed tick. Dead actors of that tick are included
    /// with `alive == false`.
    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    /// Pipeline counters of the last completed tick.
    pub fn last_damage_stats(&self) -> PipelineStats {
        self.pipeline.last_stats()
    }

    /// Live actors of `kind` according to the registry.
    pub fn live_actor_count(&self, kind: ActorKind) -> usize {
        self.registry.live_count(kind)
    }

    // ===== tick =====

    fn run_tick(&mut self) -> Tick {
        let tick = self.tick.next();
        self.tick = tick;
        let _span = tracing::debug_span!(target: "combat::scheduler", "tick", tick = tick.0).entered();

        for phase in Phase::iter() {
            self.run_systems(phase, tick);
            match phase {
                Phase::Spawn => self.flush_spawns(tick),
                Phase::Ai => {}
                Phase::Damage => {
                    self.pipeline.resolve(
                        tick,
                        &mut self.registry,
                        &mut self.rng,
                        &self.config.combat,
                        &mut self.bus,
                    );
                }
                Phase::Cleanup => self.cleanup(tick),
            }
        }

        self.bus.publish(SimEvent::StepAdvanced(StepReport {
            tick,
            delta: self.fixed_step,
        }));
        tick
    }

    fn run_systems(&mut self, phase: Phase, tick: Tick) {
        let Self {
            systems,
            registry,
            rng,
            bus,
            spawns,
            pipeline,
            config,
            fixed_step,
            ..
        } = self;

        let mut ctx = TickContext {
            tick,
            delta: *fixed_step,
            registry,
            rng,
            bus,
            spawns,
            damage: pipeline,
            tuning: &config.combat,
        };

        for system in systems[phase.index()].iter_mut() {
            let _span = tracing::trace_span!(
                target: "combat::scheduler",
                "system",
                name = system.name(),
                %phase
            )
            .entered();
            system.run(&mut ctx);
        }
    }

    fn flush_spawns(&mut self, tick: Tick) {
        let mut spawns = std::mem::take(&mut self.spawns);
        for spawn in spawns.drain(..) {
            let kind = spawn.kind;
            let position = spawn.position;
            match self.registry.register(&mut self.pool, spawn) {
                Ok(id) => {
                    self.bus.publish(SimEvent::EntitySpawned(SpawnReport {
                        id,
                        kind,
                        position,
                        tick,
                    }));
                }
                Err(err) => {
                    tracing::warn!(
                        target: "combat::scheduler",
                        tick = tick.0,
                        %kind,
                        code = err.error_code(),
                        severity = err.severity().as_str(),
                        "spawn refused: {err}"
                    );
                }
            }
        }
        self.spawns = spawns;
    }

    fn cleanup(&mut self, tick: Tick) {
        self.registry.snapshot_into(tick, &mut self.snapshot);

        let reaped = self.registry.reap_dead(&mut self.pool);
        if reaped > 0 {
            tracing::debug!(target: "combat::scheduler", tick = tick.0, reaped, "released dead actors");
        }

        self.check_conservation(tick);
    }

    /// Per kind, slots acquired minus slots released must equal registered actors.
    fn check_conservation(&self, tick: Tick) {
        for kind in ActorKind::iter() {
            let live = self.pool.stats(kind).live();
            let registered = self.registry.view(kind).len() as u64;
            if live != registered {
                tracing::error!(
                    target: "combat::scheduler",
                    tick = tick.0,
                    %kind,
                    live,
                    registered,
                    "pool conservation violated"
                );
                debug_assert_eq!(live, registered, "pool conservation violated for {kind}");
            }
        }
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("tick", &self.tick)
            .field("fixed_step", &self.fixed_step)
            .field("accumulator", &self.accumulator)
            .field("paused", &self.paused)
            .field("actors", &self.registry.len())
            .field("systems", &self.systems.iter().map(Vec::len).sum::<usize>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use glam::Vec2;

    use super::*;
    use crate::actor::ActorId;
    use crate::events::EventKind;
    use crate::pool::PoolCapacities;

    fn scheduler() -> Scheduler {
        let config = SimConfig::default()
            .with_seed(7)
            .with_combat(crate::config::CombatTuning::flat());
        Scheduler::new(config).unwrap()
    }

    fn record(scheduler: &mut Scheduler, kind: EventKind) -> Rc<RefCell<Vec<SimEvent>>> {
        let sink = Rc::new(RefCell::new(Vec::new()));
        let writer = Rc::clone(&sink);
        scheduler
            .bus_mut()
            .subscribe(kind, move |event, _| writer.borrow_mut().push(event.clone()));
        sink
    }

    struct Recorder {
        name: &'static str,
        phase: Phase,
        log: Rc<RefCell<Vec<&'static str>>>,
    }

    impl TickSystem for Recorder {
        fn name(&self) -> &str {
            self.name
        }

        fn phase(&self) -> Phase {
            self.phase
        }

        fn run(&mut self, _ctx: &mut TickContext<'_>) {
            self.log.borrow_mut().push(self.name);
        }
    }

    #[test]
    fn invalid_config_fails_fast() {
        let config = SimConfig {
            fixed_step_ms: 0.0,
            ..SimConfig::default()
        };
        assert!(matches!(
            Scheduler::new(config),
            Err(ConfigError::NonPositiveStep { .. })
        ));

        let config = SimConfig {
            max_steps_per_advance: 0,
            ..SimConfig::default()
        };
        assert_eq!(Scheduler::new(config).unwrap_err(), ConfigError::ZeroStepCap);
    }

    #[test]
    fn accumulator_runs_whole_steps_only() {
        let mut scheduler = scheduler();
        let step = scheduler.fixed_step();

        assert_eq!(scheduler.advance(step / 2).ticks, 0);
        assert_eq!(scheduler.advance(step - step / 2).ticks, 1);
        assert_eq!(scheduler.tick(), Tick(1));

        let report = scheduler.advance(step * 3 + step / 4);
        assert_eq!(report, AdvanceReport { ticks: 3, discarded: 0 });
        assert_eq!(scheduler.accumulated(), step / 4);
    }

    #[test]
    fn sixty_frames_run_sixty_ticks() {
        let mut scheduler = scheduler();
        let step = scheduler.fixed_step();
        let ticks: u32 = (0..60).map(|_| scheduler.advance(step).ticks).sum();
        assert_eq!(ticks, 60);
        assert_eq!(scheduler.tick(), Tick(60));
    }

    #[test]
    fn step_cap_discards_backlog_and_keeps_remainder() {
        let mut scheduler = scheduler();
        let step = scheduler.fixed_step();

        let report = scheduler.advance(step * 12 + step / 3);
        assert_eq!(report.ticks, SimConfig::DEFAULT_MAX_STEPS_PER_ADVANCE);
        assert_eq!(report.discarded, 7);
        assert_eq!(scheduler.accumulated(), step / 3);
    }

    #[test]
    fn paused_scheduler_neither_accumulates_nor_ticks() {
        let mut scheduler = scheduler();
        let step = scheduler.fixed_step();

        scheduler.pause();
        assert!(scheduler.is_paused());
        assert_eq!(scheduler.advance(step * 3), AdvanceReport::default());
        assert_eq!(scheduler.accumulated(), Duration::ZERO);

        scheduler.resume();
        assert_eq!(scheduler.advance(step).ticks, 1);
    }

    #[test]
    fn step_ignores_pause() {
        let mut scheduler = scheduler();
        scheduler.pause();
        assert_eq!(scheduler.step(), Tick(1));
        assert_eq!(scheduler.step(), Tick(2));
    }

    #[test]
    fn phases_run_in_order_and_systems_in_registration_order() {
        let mut scheduler = scheduler();
        let log = Rc::new(RefCell::new(Vec::new()));
        for (name, phase) in [
            ("cleanup", Phase::Cleanup),
            ("ai-1", Phase::Ai),
            ("damage", Phase::Damage),
            ("ai-2", Phase::Ai),
            ("spawn", Phase::Spawn),
        ] {
            scheduler.add_system(Recorder {
                name,
                phase,
                log: Rc::clone(&log),
            });
        }

        scheduler.step();
        assert_eq!(
            *log.borrow(),
            vec!["spawn", "ai-1", "ai-2", "damage", "cleanup"]
        );
    }

    #[test]
    fn spawn_phase_requests_land_same_tick_later_ones_next_tick() {
        struct LateSpawner;

        impl TickSystem for LateSpawner {
            fn name(&self) -> &str {
                "late"
            }

            fn phase(&self) -> Phase {
                Phase::Ai
            }

            fn run(&mut self, ctx: &mut TickContext<'_>) {
                if ctx.tick == Tick(1) {
                    ctx.spawn(ActorSpawn::new(ActorKind::Enemy, Vec2::ZERO, 10.0));
                }
            }
        }

        let mut scheduler = scheduler();
        scheduler.add_system(LateSpawner);

        scheduler.step();
        assert_eq!(scheduler.registry().len(), 0);
        scheduler.step();
        assert_eq!(scheduler.registry().len(), 1);
    }

    #[test]
    fn idle_tick_leaves_actors_untouched() {
        let mut scheduler = scheduler();
        for i in 0..100 {
            scheduler.submit_spawn(ActorSpawn::new(
                ActorKind::Enemy,
                Vec2::new(i as f32, 0.0),
                50.0,
            ));
        }
        scheduler.step();
        scheduler.step();

        assert_eq!(scheduler.live_actor_count(ActorKind::Enemy), 100);
        assert_eq!(scheduler.pool().stats(ActorKind::Enemy).live(), 100);
        assert!(scheduler.registry().iter().all(|actor| actor.health() == 50.0));
    }

    #[test]
    fn killed_actor_is_released_only_after_cleanup() {
        struct SlotWatcher {
            target: ActorId,
            seen: Rc<RefCell<Vec<bool>>>,
        }

        impl TickSystem for SlotWatcher {
            fn name(&self) -> &str {
                "slot-watcher"
            }

            fn phase(&self) -> Phase {
                Phase::Cleanup
            }

            fn run(&mut self, ctx: &mut TickContext<'_>) {
                // cleanup systems run before the reap
                self.seen
                    .borrow_mut()
                    .push(ctx.registry.contains(self.target));
            }
        }

        let mut scheduler = scheduler();
        scheduler.submit_spawn(ActorSpawn::new(ActorKind::Enemy, Vec2::ZERO, 300.0));
        scheduler.step();
        let target = scheduler.registry().view(ActorKind::Enemy)[0];

        let seen = Rc::new(RefCell::new(Vec::new()));
        scheduler.add_system(SlotWatcher {
            target,
            seen: Rc::clone(&seen),
        });
        let kills = record(&mut scheduler, EventKind::EntityKilled);

        for _ in 0..50 {
            scheduler.submit_damage(DamageRequest::new(ActorId::WORLD, target, 10.0).unwrap());
        }
        scheduler.step();

        assert_eq!(*seen.borrow(), vec![true]);
        assert_eq!(kills.borrow().len(), 1);
        assert!(!scheduler.registry().contains(target));
        assert_eq!(scheduler.pool().stats(ActorKind::Enemy).live(), 0);

        let view = scheduler.snapshot().get(target).copied().unwrap();
        assert!(!view.alive);
        assert_eq!(view.health_fraction, 0.0);
    }

    #[test]
    fn exhausted_lane_refuses_the_overflow_spawn() {
        let config = SimConfig::default().with_pools(PoolCapacities::default().with(ActorKind::Enemy, 10));
        let mut scheduler = Scheduler::new(config).unwrap();
        let spawned = record(&mut scheduler, EventKind::EntitySpawned);

        for _ in 0..11 {
            scheduler.submit_spawn(ActorSpawn::new(ActorKind::Enemy, Vec2::ZERO, 5.0));
        }
        scheduler.step();

        assert_eq!(spawned.borrow().len(), 10);
        assert_eq!(scheduler.live_actor_count(ActorKind::Enemy), 10);
        assert_eq!(scheduler.pool().available(ActorKind::Enemy), 0);
    }

    #[test]
    fn step_advanced_closes_every_tick() {
        let mut scheduler = scheduler();
        let steps = record(&mut scheduler, EventKind::StepAdvanced);
        let step = scheduler.fixed_step();

        scheduler.advance(step * 3);

        let ticks: Vec<Tick> = steps
            .borrow()
            .iter()
            .map(|event| match event {
                SimEvent::StepAdvanced(report) => {
                    assert_eq!(report.delta, step);
                    report.tick
                }
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(ticks, vec![Tick(1), Tick(2), Tick(3)]);
    }
}
