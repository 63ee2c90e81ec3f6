//! Canonical actor store with kind views and a spatial index.
//!
//! Actors live in one dense array addressed through an id lookup table.
//! Removal is swap-remove everywhere (store, kind view, grid cell), so every
//! structural change is O(1) amortized and nothing outside the registry ever
//! holds a reference into the array; all external references are
//! [`ActorId`]s.
//!
//! # Invariants
//!
//! - Every record holds exactly one pool slot, taken in [`EntityRegistry::register`]
//!   and returned in [`EntityRegistry::unregister`]
//! - `0 <= health <= health_max`, and `health == 0` implies `!alive`
//! - `alive` flips once; dead actors stay registered until [`EntityRegistry::reap_dead`]

mod error;
mod snapshot;
mod spatial;

pub use error::RegistryError;
pub use snapshot::{ActorView, Snapshot};
pub use spatial::Cell;

use std::collections::HashMap;

use glam::Vec2;
use strum::EnumCount;

use crate::actor::{Actor, ActorId, ActorKind, ActorSpawn, Tick};
use crate::pool::ObjectPool;
use spatial::SpatialGrid;

/// Outcome of a health write.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HealthChange {
    pub previous: f32,
    pub current: f32,
    /// True only for the write that took the actor to zero.
    pub died: bool,
}

impl HealthChange {
    /// Health removed by this write (negative when healed).
    pub fn dealt(&self) -> f32 {
        self.previous - self.current
    }
}

/// Owner of every live actor record.
#[derive(Clone, Debug)]
pub struct EntityRegistry {
    actors: Vec<Actor>,
    lookup: HashMap<ActorId, usize>,
    views: [Vec<ActorId>; ActorKind::COUNT],
    grid: SpatialGrid,
    next_id: u32,
    /// Actors that died since the last reap, in death order.
    dead: Vec<ActorId>,
}

impl EntityRegistry {
    /// Creates an empty registry.
    ///
    /// `capacity` should be the total pool capacity so the store never
    /// reallocates during a run.
    pub fn new(cell_size: f32, capacity: usize) -> Self {
        Self {
            actors: Vec::with_capacity(capacity),
            lookup: HashMap::with_capacity(capacity),
            views: std::array::from_fn(|_| Vec::new()),
            grid: SpatialGrid::new(cell_size),
            next_id: 0,
            dead: Vec::new(),
        }
    }

    /// Registers a new actor, taking a slot from the kind's pool lane.
    ///
    /// Fails with [`RegistryError::SpawnRefused`] when the lane is exhausted
    /// and with [`RegistryError::InvalidSpawn`] before touching the pool when
    /// the spawn data is unusable.
    pub fn register(
        &mut self,
        pool: &mut ObjectPool,
        spawn: ActorSpawn,
    ) -> Result<ActorId, RegistryError> {
        let kind = spawn.kind;
        let invalid = |reason| RegistryError::InvalidSpawn { kind, reason };

        if !spawn.health_max.is_finite() || spawn.health_max <= 0.0 {
            return Err(invalid("health_max must be positive and finite"));
        }
        if !spawn.position.is_finite() {
            return Err(invalid("position must be finite"));
        }
        let health = match spawn.health {
            Some(value) if !value.is_finite() => return Err(invalid("health must be finite")),
            Some(value) => value.clamp(0.0, spawn.health_max),
            None => spawn.health_max,
        };
        if health <= 0.0 {
            return Err(invalid("actor would spawn dead"));
        }
        if self.next_id == ActorId::WORLD.0 {
            return Err(invalid("actor id space exhausted"));
        }

        let slot = pool.acquire(kind)?;

        let id = ActorId(self.next_id);
        self.next_id += 1;

        let cell = self.grid.cell_of(spawn.position);
        self.grid.insert(id, cell);

        let view = &mut self.views[kind.index()];
        view.push(id);
        let kind_index = view.len() - 1;

        self.lookup.insert(id, self.actors.len());
        self.actors.push(Actor {
            id,
            kind,
            slot,
            position: spawn.position,
            cell,
            velocity: Vec2::ZERO,
            health,
            health_max: spawn.health_max,
            alive: true,
            bounty: spawn.bounty,
            template: spawn.template,
            kind_index,
        });

        tracing::trace!(target: "combat::registry", %id, %kind, "registered actor");
        Ok(id)
    }

    /// Removes an actor and releases its pool slot.
    ///
    /// Unknown ids are a debug-logged no-op. Returns whether a record was
    /// removed.
    pub fn unregister(&mut self, pool: &mut ObjectPool, id: ActorId) -> bool {
        let Some(index) = self.lookup.remove(&id) else {
            tracing::debug!(target: "combat::registry", %id, "unregister of unknown actor ignored");
            return false;
        };

        let actor = self.actors.swap_remove(index);
        if let Some(moved) = self.actors.get(index) {
            self.lookup.insert(moved.id, index);
        }

        let view = &mut self.views[actor.kind.index()];
        view.swap_remove(actor.kind_index);
        if let Some(&moved_id) = view.get(actor.kind_index) {
            if let Some(&moved_index) = self.lookup.get(&moved_id) {
                self.actors[moved_index].kind_index = actor.kind_index;
            }
        }

        self.grid.remove(id, actor.cell);
        pool.release(actor.slot);

        tracing::trace!(target: "combat::registry", %id, kind = %actor.kind, "unregistered actor");
        true
    }

    /// Unregisters every actor that died since the last reap.
    ///
    /// Runs in the cleanup phase so views stay stable while damage resolves.
    /// Returns the number of records removed.
    pub fn reap_dead(&mut self, pool: &mut ObjectPool) -> usize {
        let mut dead = std::mem::take(&mut self.dead);
        let reaped = dead
            .drain(..)
            .filter(|&id| self.unregister(pool, id))
            .count();
        self.dead = dead;
        reaped
    }

    /// Actors that died since the last reap, in death order.
    pub fn pending_reap(&self) -> &[ActorId] {
        &self.dead
    }

    pub fn get(&self, id: ActorId) -> Option<&Actor> {
        self.lookup.get(&id).map(|&index| &self.actors[index])
    }

    pub fn contains(&self, id: ActorId) -> bool {
        self.lookup.contains_key(&id)
    }

    /// Returns true if `id` is registered and alive.
    pub fn is_alive(&self, id: ActorId) -> bool {
        self.get(id).is_some_and(Actor::is_alive)
    }

    /// All records in storage order.
    pub fn iter(&self) -> impl Iterator<Item = &Actor> {
        self.actors.iter()
    }

    pub fn len(&self) -> usize {
        self.actors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actors.is_empty()
    }

    /// Ids of every registered actor of `kind`.
    ///
    /// The slice is owned by the registry and may be reordered by the next
    /// register or unregister.
    pub fn view(&self, kind: ActorKind) -> &[ActorId] {
        &self.views[kind.index()]
    }

    /// Registered actors of `kind`, dead-but-unreaped included.
    pub fn live_count(&self, kind: ActorKind) -> usize {
        self.views[kind.index()].len()
    }

    pub fn cell_size(&self) -> f32 {
        self.grid.cell_size()
    }

    // ===== setters =====

    fn index_of(&self, id: ActorId) -> Result<usize, RegistryError> {
        match self.lookup.get(&id) {
            Some(&index) => Ok(index),
            None => {
                tracing::warn!(target: "combat::registry", %id, "write to unknown actor ignored");
                Err(RegistryError::UnknownActor { id })
            }
        }
    }

    /// Moves an actor and updates its grid cell.
    pub fn set_position(&mut self, id: ActorId, position: Vec2) -> Result<(), RegistryError> {
        let index = self.index_of(id)?;
        if !position.is_finite() {
            return Err(RegistryError::NonFinite { id });
        }

        let actor = &mut self.actors[index];
        actor.position = position;
        actor.cell = self.grid.relocate(id, actor.cell, position);
        Ok(())
    }

    /// Records a movement intent. The registry stores it; movement systems apply it.
    pub fn set_velocity(&mut self, id: ActorId, velocity: Vec2) -> Result<(), RegistryError> {
        let index = self.index_of(id)?;
        if !velocity.is_finite() {
            return Err(RegistryError::NonFinite { id });
        }
        self.actors[index].velocity = velocity;
        Ok(())
    }

    /// Writes health, clamped into `[0, health_max]`.
    ///
    /// Dead actors keep zero health; writes to them are ignored. The write
    /// that reaches zero flips `alive` and queues the actor for reaping.
    pub fn set_health(&mut self, id: ActorId, value: f32) -> Result<HealthChange, RegistryError> {
        let index = self.index_of(id)?;
        if !value.is_finite() {
            return Err(RegistryError::NonFinite { id });
        }

        let actor = &mut self.actors[index];
        let previous = actor.health;
        if !actor.alive {
            tracing::debug!(target: "combat::registry", %id, "health write to dead actor ignored");
            return Ok(HealthChange {
                previous,
                current: previous,
                died: false,
            });
        }

        actor.health = value.clamp(0.0, actor.health_max);
        let died = actor.health == 0.0;
        if died {
            actor.alive = false;
            self.dead.push(id);
            tracing::debug!(target: "combat::registry", %id, kind = %actor.kind, "actor died");
        }

        Ok(HealthChange {
            previous,
            current: actor.health,
            died,
        })
    }

    /// Subtracts `amount` (clamped to remaining health).
    ///
    /// An infinite amount takes the actor to zero rather than failing.
    pub fn apply_damage(&mut self, id: ActorId, amount: f32) -> Result<HealthChange, RegistryError> {
        let current = self.get(id).map_or(0.0, Actor::health);
        self.set_health(id, (current - amount.max(0.0)).max(0.0))
    }

    /// Adds `amount` (clamped to max health). No effect on dead actors.
    pub fn heal(&mut self, id: ActorId, amount: f32) -> Result<HealthChange, RegistryError> {
        let (current, max) = self
            .get(id)
            .map_or((0.0, 0.0), |actor| (actor.health(), actor.health_max()));
        self.set_health(id, (current + amount.max(0.0)).min(max))
    }

    // ===== spatial queries =====

    /// Living actors within `radius` of `center`, sorted by id.
    pub fn query_radius(&self, center: Vec2, radius: f32) -> Vec<ActorId> {
        let mut out = Vec::new();
        self.query_radius_into(center, radius, &mut out);
        out
    }

    /// Allocation-free form of [`query_radius`](Self::query_radius); clears `out` first.
    pub fn query_radius_into(&self, center: Vec2, radius: f32, out: &mut Vec<ActorId>) {
        out.clear();
        if !(radius >= 0.0) || !radius.is_finite() || !center.is_finite() {
            return;
        }

        let reach = Vec2::splat(radius);
        let radius_sq = radius * radius;
        self.grid
            .for_each_in_bounds(center - reach, center + reach, |id| {
                if let Some(actor) = self.get(id) {
                    if actor.alive && actor.position.distance_squared(center) <= radius_sq {
                        out.push(id);
                    }
                }
            });
        out.sort_unstable();
    }

    /// Living actors inside a cone, sorted by id.
    ///
    /// The cone opens `half_angle` radians either side of `direction` and
    /// reaches `max_range`. An actor exactly at `origin` is inside. A zero
    /// direction matches nothing.
    pub fn query_cone(
        &self,
        origin: Vec2,
        direction: Vec2,
        half_angle: f32,
        max_range: f32,
    ) -> Vec<ActorId> {
        let mut out = Vec::new();
        self.query_cone_into(origin, direction, half_angle, max_range, &mut out);
        out
    }

    /// Allocation-free form of [`query_cone`](Self::query_cone); clears `out` first.
    pub fn query_cone_into(
        &self,
        origin: Vec2,
        direction: Vec2,
        half_angle: f32,
        max_range: f32,
        out: &mut Vec<ActorId>,
    ) {
        let direction = direction.normalize_or_zero();
        if direction == Vec2::ZERO || !half_angle.is_finite() {
            out.clear();
            return;
        }

        self.query_radius_into(origin, max_range, out);

        let cos_half = half_angle.clamp(0.0, std::f32::consts::PI).cos();
        out.retain(|&id| {
            let Some(actor) = self.get(id) else {
                return false;
            };
            let offset = actor.position - origin;
            let distance = offset.length();
            distance == 0.0 || direction.dot(offset) >= cos_half * distance
        });
    }

    // ===== snapshots =====

    /// Refills `out` with the current state. Reuses its allocation.
    pub fn snapshot_into(&self, tick: Tick, out: &mut Snapshot) {
        out.tick = tick;
        out.actors.clear();
        out.actors.extend(self.actors.iter().map(|actor| ActorView {
            id: actor.id,
            kind: actor.kind,
            position: actor.position,
            health_fraction: actor.health_fraction(),
            alive: actor.alive,
        }));
    }

    pub fn snapshot(&self, tick: Tick) -> Snapshot {
        let mut snapshot = Snapshot {
            tick,
            actors: Vec::with_capacity(self.actors.len()),
        };
        self.snapshot_into(tick, &mut snapshot);
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::PoolCapacities;

    fn setup(enemies: u16) -> (EntityRegistry, ObjectPool) {
        let capacities = PoolCapacities::new(1, enemies, 8, 1);
        (
            EntityRegistry::new(4.0, capacities.total()),
            ObjectPool::new(capacities),
        )
    }

    fn enemy_at(x: f32, y: f32) -> ActorSpawn {
        ActorSpawn::new(ActorKind::Enemy, Vec2::new(x, y), 50.0)
    }

    #[test]
    fn register_assigns_fresh_ids_and_views() {
        let (mut registry, mut pool) = setup(4);
        let a = registry.register(&mut pool, enemy_at(0.0, 0.0)).unwrap();
        let b = registry.register(&mut pool, enemy_at(1.0, 0.0)).unwrap();

        assert_ne!(a, b);
        assert_eq!(registry.view(ActorKind::Enemy), &[a, b]);
        assert!(registry.view(ActorKind::Boss).is_empty());
        assert_eq!(pool.stats(ActorKind::Enemy).live(), 2);
        assert_eq!(registry.get(a).unwrap().health(), 50.0);
    }

    #[test]
    fn register_propagates_pool_exhaustion() {
        let (mut registry, mut pool) = setup(1);
        registry.register(&mut pool, enemy_at(0.0, 0.0)).unwrap();

        let err = registry.register(&mut pool, enemy_at(1.0, 1.0)).unwrap_err();
        assert!(matches!(err, RegistryError::SpawnRefused(_)));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn invalid_spawn_does_not_take_a_slot() {
        let (mut registry, mut pool) = setup(2);
        let spawn = ActorSpawn::new(ActorKind::Enemy, Vec2::ZERO, 0.0);

        assert!(matches!(
            registry.register(&mut pool, spawn),
            Err(RegistryError::InvalidSpawn { .. })
        ));
        assert_eq!(pool.stats(ActorKind::Enemy).acquired, 0);
    }

    #[test]
    fn unregister_is_idempotent() {
        let (mut registry, mut pool) = setup(4);
        let a = registry.register(&mut pool, enemy_at(0.0, 0.0)).unwrap();
        let b = registry.register(&mut pool, enemy_at(2.0, 0.0)).unwrap();

        assert!(registry.unregister(&mut pool, a));
        let once = registry.snapshot(Tick::ZERO);
        assert!(!registry.unregister(&mut pool, a));
        let twice = registry.snapshot(Tick::ZERO);

        assert_eq!(once, twice);
        assert_eq!(registry.view(ActorKind::Enemy), &[b]);
        assert_eq!(pool.stats(ActorKind::Enemy).released, 1);
    }

    #[test]
    fn swap_remove_keeps_lookup_and_views_consistent() {
        let (mut registry, mut pool) = setup(8);
        let ids: Vec<_> = (0..5)
            .map(|i| registry.register(&mut pool, enemy_at(i as f32, 0.0)).unwrap())
            .collect();

        registry.unregister(&mut pool, ids[1]);
        registry.unregister(&mut pool, ids[0]);

        for &id in &ids[2..] {
            let actor = registry.get(id).expect("still registered");
            assert_eq!(actor.id(), id);
            assert_eq!(registry.view(ActorKind::Enemy)[actor.kind_index], id);
        }
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.live_count(ActorKind::Enemy), 3);
    }

    #[test]
    fn ids_are_never_reused() {
        let (mut registry, mut pool) = setup(1);
        let first = registry.register(&mut pool, enemy_at(0.0, 0.0)).unwrap();
        registry.unregister(&mut pool, first);
        let second = registry.register(&mut pool, enemy_at(0.0, 0.0)).unwrap();

        assert_ne!(first, second);
        assert!(registry.get(first).is_none());
    }

    #[test]
    fn health_is_clamped_and_death_is_monotonic() {
        let (mut registry, mut pool) = setup(2);
        let id = registry.register(&mut pool, enemy_at(0.0, 0.0)).unwrap();

        let change = registry.set_health(id, 80.0).unwrap();
        assert_eq!(change.current, 50.0);

        let change = registry.apply_damage(id, 70.0).unwrap();
        assert_eq!(change.current, 0.0);
        assert!(change.died);
        assert!(!registry.is_alive(id));

        let change = registry.heal(id, 10.0).unwrap();
        assert_eq!(change.current, 0.0);
        assert!(!change.died);
        assert_eq!(registry.pending_reap(), &[id]);
    }

    #[test]
    fn writes_to_unknown_actor_are_reported() {
        let (mut registry, _pool) = setup(1);
        let ghost = ActorId(42);

        assert_eq!(
            registry.set_position(ghost, Vec2::ONE),
            Err(RegistryError::UnknownActor { id: ghost })
        );
        assert!(registry.apply_damage(ghost, 5.0).is_err());
    }

    #[test]
    fn reap_releases_dead_slots() {
        let (mut registry, mut pool) = setup(2);
        let id = registry.register(&mut pool, enemy_at(0.0, 0.0)).unwrap();
        registry.apply_damage(id, 100.0).unwrap();

        assert_eq!(pool.stats(ActorKind::Enemy).live(), 1);
        assert_eq!(registry.reap_dead(&mut pool), 1);
        assert_eq!(pool.stats(ActorKind::Enemy).live(), 0);
        assert!(registry.pending_reap().is_empty());
        assert_eq!(registry.reap_dead(&mut pool), 0);
    }

    #[test]
    fn radius_query_uses_current_positions() {
        let (mut registry, mut pool) = setup(8);
        let near = registry.register(&mut pool, enemy_at(1.0, 1.0)).unwrap();
        let far = registry.register(&mut pool, enemy_at(30.0, 0.0)).unwrap();
        let edge = registry.register(&mut pool, enemy_at(5.0, 0.0)).unwrap();

        assert_eq!(registry.query_radius(Vec2::ZERO, 5.0), vec![near, edge]);

        registry.set_position(far, Vec2::new(-2.0, -2.0)).unwrap();
        assert_eq!(registry.query_radius(Vec2::ZERO, 5.0), vec![near, far, edge]);
        assert!(registry.query_radius(Vec2::ZERO, -1.0).is_empty());
    }

    #[test]
    fn radius_query_skips_dead_actors() {
        let (mut registry, mut pool) = setup(4);
        let a = registry.register(&mut pool, enemy_at(0.0, 0.0)).unwrap();
        let b = registry.register(&mut pool, enemy_at(1.0, 0.0)).unwrap();
        registry.apply_damage(a, 999.0).unwrap();

        assert_eq!(registry.query_radius(Vec2::ZERO, 3.0), vec![b]);
    }

    #[test]
    fn huge_radius_walks_populated_cells() {
        let (mut registry, mut pool) = setup(4);
        let a = registry.register(&mut pool, enemy_at(-1000.0, 0.0)).unwrap();
        let b = registry.register(&mut pool, enemy_at(1000.0, 500.0)).unwrap();

        assert_eq!(registry.query_radius(Vec2::ZERO, 1.0e7), vec![a, b]);
    }

    #[test]
    fn radius_beyond_cell_range_still_finds_actors() {
        let (mut registry, mut pool) = setup(4);
        let id = registry.register(&mut pool, enemy_at(12.0, -3.0)).unwrap();

        assert_eq!(registry.query_radius(Vec2::ZERO, 1.0e12), vec![id]);
        assert_eq!(registry.query_radius(Vec2::ZERO, f32::MAX), vec![id]);
        assert_eq!(registry.query_cone(Vec2::ZERO, Vec2::X, 1.0, 1.0e12), vec![id]);
    }

    #[test]
    fn wandering_actors_do_not_grow_the_grid() {
        let (mut registry, mut pool) = setup(2);
        let a = registry.register(&mut pool, enemy_at(0.0, 0.0)).unwrap();
        let b = registry.register(&mut pool, enemy_at(0.0, 0.0)).unwrap();

        for step in 0..500 {
            let x = step as f32 * 4.0;
            registry.set_position(a, Vec2::new(x, 0.0)).unwrap();
            registry.set_position(b, Vec2::new(-x, x)).unwrap();
            assert!(registry.grid.cell_count() <= 2);
        }

        assert!(registry.unregister(&mut pool, a));
        assert_eq!(registry.grid.cell_count(), 1);
    }

    #[test]
    fn infinite_damage_kills_and_infinite_heal_fills() {
        let (mut registry, mut pool) = setup(2);
        let id = registry.register(&mut pool, enemy_at(0.0, 0.0)).unwrap();

        registry.apply_damage(id, 20.0).unwrap();
        let healed = registry.heal(id, f32::INFINITY).unwrap();
        assert_eq!(healed.current, 50.0);

        let change = registry.apply_damage(id, f32::INFINITY).unwrap();
        assert_eq!(change.current, 0.0);
        assert!(change.died);
    }

    #[test]
    fn cone_query_filters_by_angle() {
        let (mut registry, mut pool) = setup(8);
        let ahead = registry.register(&mut pool, enemy_at(4.0, 0.5)).unwrap();
        let behind = registry.register(&mut pool, enemy_at(-4.0, 0.0)).unwrap();
        let side = registry.register(&mut pool, enemy_at(0.0, 4.0)).unwrap();
        let at_origin = registry.register(&mut pool, enemy_at(0.0, 0.0)).unwrap();

        let hits = registry.query_cone(Vec2::ZERO, Vec2::X, 0.5, 10.0);
        assert_eq!(hits, vec![ahead, at_origin]);
        assert!(!hits.contains(&behind));
        assert!(!hits.contains(&side));

        let wide = registry.query_cone(Vec2::ZERO, Vec2::X, std::f32::consts::FRAC_PI_2, 10.0);
        assert!(wide.contains(&side));
        assert!(registry.query_cone(Vec2::ZERO, Vec2::ZERO, 1.0, 10.0).is_empty());
    }

    #[test]
    fn moving_between_cells_updates_grid() {
        let (mut registry, mut pool) = setup(2);
        let id = registry.register(&mut pool, enemy_at(0.5, 0.5)).unwrap();
        let before = registry.get(id).unwrap().spatial_cell();

        registry.set_position(id, Vec2::new(9.0, 9.0)).unwrap();
        let after = registry.get(id).unwrap().spatial_cell();

        assert_ne!(before, after);
        assert_eq!(registry.grid.cell_count(), 1);
        assert!(registry.query_radius(Vec2::new(0.5, 0.5), 1.0).is_empty());
    }

    #[test]
    fn snapshot_reports_health_fractions() {
        let (mut registry, mut pool) = setup(2);
        let id = registry.register(&mut pool, enemy_at(3.0, 4.0)).unwrap();
        registry.apply_damage(id, 25.0).unwrap();

        let snapshot = registry.snapshot(Tick(9));
        let view = snapshot.get(id).unwrap();
        assert_eq!(snapshot.tick, Tick(9));
        assert_eq!(view.health_fraction, 0.5);
        assert_eq!(view.position, Vec2::new(3.0, 4.0));
        assert!(view.alive);
    }
}
