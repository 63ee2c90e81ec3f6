//! Run fingerprinting for determinism checks.
//!
//! A [`RunDigest`] listens to damage and kill events and folds them, in
//! publish order, into a SHA-256 hash. Finishing the digest also folds the
//! final health and position of every registered actor. Two runs with the
//! same seed, content and inputs must produce the same hex string.

use std::cell::RefCell;
use std::rc::Rc;

use sha2::{Digest, Sha256};

use combat_core::{
    DamageResult, EntityRegistry, EventBus, EventKind, SimEvent, SubscriptionHandle,
};

const TAG_APPLIED: u8 = 0x01;
const TAG_BATCHED: u8 = 0x02;
const TAG_KILLED: u8 = 0x03;
const TAG_FINAL: u8 = 0xFF;

#[derive(Default)]
struct DigestState {
    hasher: Sha256,
    events: u64,
}

impl DigestState {
    fn absorb(&mut self, event: &SimEvent) {
        match event {
            SimEvent::DamageApplied(result) => {
                self.hasher.update([TAG_APPLIED]);
                absorb_result(&mut self.hasher, result);
            }
            SimEvent::DamageBatched(batch) => {
                self.hasher.update([TAG_BATCHED]);
                self.hasher.update(batch.source_id.0.to_le_bytes());
                self.hasher.update(batch.group.to_le_bytes());
                self.hasher.update((batch.entries.len() as u32).to_le_bytes());
                for entry in &batch.entries {
                    absorb_result(&mut self.hasher, entry);
                }
            }
            SimEvent::EntityKilled(kill) => {
                self.hasher.update([TAG_KILLED]);
                self.hasher.update(kill.id.0.to_le_bytes());
                self.hasher.update(kill.killer.0.to_le_bytes());
                self.hasher.update(kill.bounty.to_le_bytes());
                self.hasher.update(kill.tick.0.to_le_bytes());
                self.hasher.update(kill.position.x.to_bits().to_le_bytes());
                self.hasher.update(kill.position.y.to_bits().to_le_bytes());
            }
            SimEvent::EntitySpawned(_) | SimEvent::StepAdvanced(_) => return,
        }
        self.events += 1;
    }
}

fn absorb_result(hasher: &mut Sha256, result: &DamageResult) {
    hasher.update(result.source_id.0.to_le_bytes());
    hasher.update(result.target_id.0.to_le_bytes());
    hasher.update(result.final_amount.to_bits().to_le_bytes());
    hasher.update([u8::from(result.is_crit), u8::from(result.killed)]);
    for tag in result.tags.iter() {
        hasher.update((tag.len() as u8).to_le_bytes());
        hasher.update(tag.as_bytes());
    }
    hasher.update([0]);
}

/// SHA-256 fingerprint of a run's damage and kill stream.
pub struct RunDigest {
    state: Rc<RefCell<DigestState>>,
    handles: Vec<SubscriptionHandle>,
}

impl RunDigest {
    /// Event kinds folded into the digest.
    pub const KINDS: [EventKind; 3] = [
        EventKind::DamageApplied,
        EventKind::DamageBatched,
        EventKind::EntityKilled,
    ];

    /// Subscribes to the bus. Attach before the first tick to cover the whole run.
    pub fn attach(bus: &mut EventBus) -> Self {
        let state = Rc::new(RefCell::new(DigestState::default()));
        let handles = Self::KINDS
            .iter()
            .map(|&kind| {
                let state = Rc::clone(&state);
                bus.subscribe(kind, move |event, _| state.borrow_mut().absorb(event))
            })
            .collect();

        Self { state, handles }
    }

    /// Events folded so far.
    pub fn events(&self) -> u64 {
        self.state.borrow().events
    }

    /// Stops listening. Later events no longer change the digest.
    pub fn detach(&mut self, bus: &mut EventBus) {
        for handle in self.handles.drain(..) {
            bus.unsubscribe(handle);
        }
    }

    /// Hex digest of everything seen so far plus the registry's final state.
    ///
    /// Does not consume the running hash; calling it twice without new events
    /// yields the same string.
    pub fn finish(&self, registry: &EntityRegistry) -> String {
        let mut hasher = self.state.borrow().hasher.clone();

        let mut actors: Vec<_> = registry.iter().collect();
        actors.sort_by_key(|actor| actor.id());

        hasher.update([TAG_FINAL]);
        for actor in actors {
            hasher.update(actor.id().0.to_le_bytes());
            hasher.update([actor.kind().index() as u8]);
            hasher.update(actor.health().to_bits().to_le_bytes());
            hasher.update(actor.position().x.to_bits().to_le_bytes());
            hasher.update(actor.position().y.to_bits().to_le_bytes());
        }

        hex::encode(hasher.finalize())
    }
}

impl std::fmt::Debug for RunDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunDigest")
            .field("events", &self.events())
            .field("subscriptions", &self.handles.len())
            .finish()
    }
}
