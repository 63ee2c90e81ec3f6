//! Per-tick damage resolution.

use super::modifiers::calculate_damage;
use super::request::{DamageRequest, GroupKey};
use super::result::{DamageBatch, DamageResult, PipelineStats};
use crate::actor::{ActorId, Tick};
use crate::config::CombatTuning;
use crate::events::{EventBus, KillReport, SimEvent};
use crate::registry::EntityRegistry;
use crate::rng::{CRIT_STREAM, RngStreams};

/// Collects the requests of one tick and resolves them in submission order.
///
/// # Stages
///
/// ```text
/// Requested ──resolve──► Resolved ──apply──► Applied
///                                      └───► Batched   (≥2 hits sharing source + group)
/// ```
///
/// Submission order is the only tie-break: two hits on the same target always
/// resolve in the order they were submitted, so replays agree on which hit
/// lands the kill and which crit rolls were spent.
///
/// Buffers are reused between ticks.
#[derive(Debug, Default)]
pub struct DamagePipeline {
    queue: Vec<DamageRequest>,
    results: Vec<DamageResult>,
    kills: Vec<KillReport>,
    emitted_groups: Vec<(ActorId, GroupKey)>,
    last_stats: PipelineStats,
}

impl DamagePipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a request for the next resolution.
    pub fn submit(&mut self, request: DamageRequest) {
        self.queue.push(request);
    }

    /// Requests waiting for resolution.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Results of the most recent resolution, in submission order.
    pub fn last_results(&self) -> &[DamageResult] {
        &self.results
    }

    pub fn last_stats(&self) -> PipelineStats {
        self.last_stats
    }

    /// Resolves every queued request, applies it to the registry and publishes
    /// the outcome.
    ///
    /// Unknown targets are logged at warn level and discarded; hits on dead
    /// targets are discarded silently. Neither aborts the batch. Amounts are
    /// finite by the time they reach the registry, so a rejected write is
    /// logged and counted rather than expected.
    pub fn resolve(
        &mut self,
        tick: Tick,
        registry: &mut EntityRegistry,
        rng: &mut RngStreams,
        tuning: &CombatTuning,
        bus: &mut EventBus,
    ) -> PipelineStats {
        let _span = tracing::debug_span!(target: "combat::damage", "resolve", tick = tick.0).entered();

        self.results.clear();
        self.kills.clear();
        let mut stats = PipelineStats {
            submitted: self.queue.len(),
            ..PipelineStats::default()
        };

        let mut queue = std::mem::take(&mut self.queue);
        for request in queue.drain(..) {
            self.resolve_one(tick, request, registry, rng, tuning, &mut stats);
        }
        self.queue = queue;

        self.emit(bus, &mut stats);

        if stats.submitted > 0 {
            tracing::debug!(
                target: "combat::damage",
                tick = tick.0,
                submitted = stats.submitted,
                resolved = stats.resolved(),
                unknown = stats.discarded_unknown,
                dead = stats.discarded_dead,
                kills = stats.kills,
                "damage resolved"
            );
        }

        self.last_stats = stats;
        stats
    }

    fn resolve_one(
        &mut self,
        tick: Tick,
        request: DamageRequest,
        registry: &mut EntityRegistry,
        rng: &mut RngStreams,
        tuning: &CombatTuning,
        stats: &mut PipelineStats,
    ) {
        let target_id = request.target_id;
        let Some(target) = registry.get(target_id) else {
            tracing::warn!(
                target: "combat::damage",
                source = %request.source_id,
                target = %target_id,
                "damage request for unknown entity discarded"
            );
            stats.discarded_unknown += 1;
            return;
        };

        if !target.is_alive() {
            tracing::trace!(target: "combat::damage", target = %target_id, "target already dead");
            stats.discarded_dead += 1;
            return;
        }

        let kind = target.kind();
        let bounty = target.bounty();
        let position = target.position();

        let is_crit = rng.stream(CRIT_STREAM).chance(tuning.crit_chance);
        let amount = calculate_damage(request.base_amount(), &request.tags, is_crit, tuning);

        let change = match registry.apply_damage(target_id, amount) {
            Ok(change) => change,
            Err(err) => {
                tracing::warn!(
                    target: "combat::damage",
                    source = %request.source_id,
                    target = %target_id,
                    amount,
                    "damage write rejected: {err}"
                );
                stats.rejected += 1;
                return;
            }
        };

        if change.died {
            stats.kills += 1;
            self.kills.push(KillReport {
                id: target_id,
                kind,
                killer: request.source_id,
                bounty,
                position,
                tick,
            });
        } else if let Some(knockback) = request.knockback {
            if registry.set_position(target_id, position + knockback).is_err() {
                tracing::debug!(target: "combat::damage", target = %target_id, "knockback rejected");
            }
        }

        self.results.push(DamageResult {
            source_id: request.source_id,
            target_id,
            final_amount: change.dealt(),
            is_crit,
            tags: request.tags,
            killed: change.died,
            group: request.group,
        });
    }

    /// Publishes results in submission order, then kills in death order.
    fn emit(&mut self, bus: &mut EventBus, stats: &mut PipelineStats) {
        self.emitted_groups.clear();

        for (index, result) in self.results.iter().enumerate() {
            let Some(group) = result.group else {
                stats.applied += 1;
                bus.publish(SimEvent::DamageApplied(result.clone()));
                continue;
            };

            let key = (result.source_id, group);
            if self.emitted_groups.contains(&key) {
                continue;
            }

            let members = self.results[index..]
                .iter()
                .filter(|other| other.source_id == key.0 && other.group == Some(group));

            if members.clone().nth(1).is_none() {
                stats.applied += 1;
                bus.publish(SimEvent::DamageApplied(result.clone()));
                continue;
            }

            self.emitted_groups.push(key);
            let entries: Vec<DamageResult> = members.cloned().collect();
            stats.batches += 1;
            stats.batched += entries.len();
            bus.publish(SimEvent::DamageBatched(DamageBatch {
                source_id: key.0,
                group,
                entries,
            }));
        }

        for kill in &self.kills {
            bus.publish(SimEvent::EntityKilled(kill.clone()));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use glam::Vec2;

    use super::*;
    use crate::actor::{ActorKind, ActorSpawn};
    use crate::events::EventKind;
    use crate::pool::{ObjectPool, PoolCapacities};

    struct Harness {
        registry: EntityRegistry,
        pool: ObjectPool,
        rng: RngStreams,
        bus: EventBus,
        pipeline: DamagePipeline,
        events: Rc<RefCell<Vec<SimEvent>>>,
    }

    impl Harness {
        fn new() -> Self {
            let capacities = PoolCapacities::new(1, 16, 16, 1);
            let mut bus = EventBus::new();
            let events = Rc::new(RefCell::new(Vec::new()));
            for kind in [
                EventKind::DamageApplied,
                EventKind::DamageBatched,
                EventKind::EntityKilled,
            ] {
                let sink = Rc::clone(&events);
                bus.subscribe(kind, move |event, _| sink.borrow_mut().push(event.clone()));
            }
            Self {
                registry: EntityRegistry::new(4.0, capacities.total()),
                pool: ObjectPool::new(capacities),
                rng: RngStreams::seed_run(1234),
                bus,
                pipeline: DamagePipeline::new(),
                events,
            }
        }

        fn spawn(&mut self, health: f32) -> ActorId {
            self.registry
                .register(
                    &mut self.pool,
                    ActorSpawn::new(ActorKind::Enemy, Vec2::ZERO, health).with_bounty(5),
                )
                .unwrap()
        }

        fn resolve(&mut self, tuning: &CombatTuning) -> PipelineStats {
            self.pipeline.resolve(
                Tick(1),
                &mut self.registry,
                &mut self.rng,
                tuning,
                &mut self.bus,
            )
        }
    }

    fn hit(source: ActorId, target: ActorId, amount: f32) -> DamageRequest {
        DamageRequest::new(source, target, amount).unwrap()
    }

    #[test]
    fn overkill_stops_at_first_lethal_hit() {
        let mut h = Harness::new();
        let target = h.spawn(300.0);
        for _ in 0..50 {
            h.pipeline.submit(hit(ActorId::WORLD, target, 10.0));
        }

        let stats = h.resolve(&CombatTuning::flat());

        assert_eq!(stats.submitted, 50);
        assert_eq!(stats.applied, 30);
        assert_eq!(stats.discarded_dead, 20);
        assert_eq!(stats.kills, 1);

        let actor = h.registry.get(target).expect("kept until cleanup");
        assert_eq!(actor.health(), 0.0);
        assert!(!actor.is_alive());

        let events = h.events.borrow();
        let kills: Vec<_> = events
            .iter()
            .filter(|event| event.kind() == EventKind::EntityKilled)
            .collect();
        assert_eq!(kills.len(), 1);
        assert!(matches!(events.last(), Some(SimEvent::EntityKilled(kill)) if kill.bounty == 5));
    }

    #[test]
    fn final_hit_is_clamped_to_remaining_health() {
        let mut h = Harness::new();
        let target = h.spawn(25.0);
        h.pipeline.submit(hit(ActorId(7), target, 10.0));
        h.pipeline.submit(hit(ActorId(7), target, 10.0));
        h.pipeline.submit(hit(ActorId(7), target, 10.0));

        h.resolve(&CombatTuning::flat());

        let amounts: Vec<f32> = h
            .pipeline
            .last_results()
            .iter()
            .map(|result| result.final_amount)
            .collect();
        assert_eq!(amounts, vec![10.0, 10.0, 5.0]);
        assert!(h.pipeline.last_results()[2].killed);
    }

    #[test]
    fn unknown_target_is_discarded_without_side_effects() {
        let mut h = Harness::new();
        let bystander = h.spawn(40.0);
        h.pipeline.submit(hit(ActorId::WORLD, ActorId(999), 10.0));

        let stats = h.resolve(&CombatTuning::default());

        assert_eq!(stats.discarded_unknown, 1);
        assert_eq!(stats.resolved(), 0);
        assert!(h.events.borrow().is_empty());
        assert_eq!(h.registry.get(bystander).unwrap().health(), 40.0);
    }

    #[test]
    fn overflowing_crit_still_lands_and_kills() {
        let mut h = Harness::new();
        let target = h.spawn(50.0);
        h.pipeline.submit(hit(ActorId::WORLD, target, f32::MAX));

        let stats = h.resolve(&CombatTuning::flat().with_crit(1.0, 4.0));

        assert_eq!(stats.applied, 1);
        assert_eq!(stats.kills, 1);
        assert_eq!(stats.rejected, 0);
        assert!(!h.registry.is_alive(target));

        let result = &h.pipeline.last_results()[0];
        assert!(result.is_crit);
        assert!(result.killed);
        assert_eq!(result.final_amount, 50.0);
        assert_eq!(h.events.borrow().len(), 2);
    }

    #[test]
    fn grouped_hits_coalesce_into_one_batch() {
        let mut h = Harness::new();
        let a = h.spawn(100.0);
        let b = h.spawn(100.0);
        let c = h.spawn(100.0);
        let caster = ActorId(50);

        h.pipeline.submit(hit(caster, a, 10.0).in_group(1));
        h.pipeline.submit(hit(ActorId::WORLD, c, 1.0));
        h.pipeline.submit(hit(caster, b, 10.0).in_group(1));
        h.pipeline.submit(hit(caster, c, 10.0).in_group(2));

        let stats = h.resolve(&CombatTuning::flat());
        assert_eq!(stats.batches, 1);
        assert_eq!(stats.batched, 2);
        assert_eq!(stats.applied, 2);

        let events = h.events.borrow();
        assert_eq!(events.len(), 3);
        match &events[0] {
            SimEvent::DamageBatched(batch) => {
                assert_eq!(batch.group, 1);
                let targets: Vec<_> = batch.entries.iter().map(|entry| entry.target_id).collect();
                assert_eq!(targets, vec![a, b]);
                assert_eq!(batch.total(), 20.0);
            }
            other => panic!("expected batch first, got {other:?}"),
        }
        assert!(matches!(&events[1], SimEvent::DamageApplied(result) if result.target_id == c && result.final_amount == 1.0));
        assert!(matches!(&events[2], SimEvent::DamageApplied(result) if result.group == Some(2)));
    }

    #[test]
    fn crits_come_from_the_crit_stream() {
        let tuning = CombatTuning::flat().with_crit(0.5, 3.0);

        let run = || {
            let mut h = Harness::new();
            let target = h.spawn(10_000.0);
            for _ in 0..64 {
                h.pipeline.submit(hit(ActorId::WORLD, target, 1.0));
            }
            h.resolve(&tuning);
            h.pipeline
                .last_results()
                .iter()
                .map(|result| (result.is_crit, result.final_amount.to_bits()))
                .collect::<Vec<_>>()
        };

        let first = run();
        assert_eq!(first, run());
        assert!(first.iter().any(|(crit, _)| *crit));
        assert!(first.iter().any(|(crit, _)| !*crit));
        assert!(first
            .iter()
            .all(|&(crit, bits)| f32::from_bits(bits) == if crit { 3.0 } else { 1.0 }));
    }

    #[test]
    fn knockback_moves_surviving_targets_only() {
        let mut h = Harness::new();
        let survivor = h.spawn(100.0);
        let victim = h.spawn(5.0);

        h.pipeline
            .submit(hit(ActorId::WORLD, survivor, 1.0).with_knockback(Vec2::new(3.0, 0.0)));
        h.pipeline
            .submit(hit(ActorId::WORLD, victim, 50.0).with_knockback(Vec2::new(3.0, 0.0)));
        h.resolve(&CombatTuning::flat());

        assert_eq!(h.registry.get(survivor).unwrap().position(), Vec2::new(3.0, 0.0));
        assert_eq!(h.registry.get(victim).unwrap().position(), Vec2::ZERO);
    }

    #[test]
    fn queue_is_empty_after_resolution() {
        let mut h = Harness::new();
        let target = h.spawn(10.0);
        h.pipeline.submit(hit(ActorId::WORLD, target, 1.0));
        assert_eq!(h.pipeline.pending(), 1);

        h.resolve(&CombatTuning::flat());
        assert_eq!(h.pipeline.pending(), 0);

        let stats = h.resolve(&CombatTuning::flat());
        assert_eq!(stats, PipelineStats::default());
    }
}
