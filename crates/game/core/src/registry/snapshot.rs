//! Read-only per-tick view for presentation and tooling.

use glam::Vec2;

use crate::actor::{ActorId, ActorKind, Tick};

/// One actor as seen by read-only consumers.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ActorView {
    pub id: ActorId,
    pub kind: ActorKind,
    pub position: Vec2,
    /// `health / health_max`, in `[0, 1]`.
    pub health_fraction: f32,
    pub alive: bool,
}

/// Immutable copy of the registry, taken once per tick.
///
/// Consumers pull a snapshot instead of subscribing to per-mutation events.
/// [`EntityRegistry::snapshot_into`](crate::EntityRegistry::snapshot_into)
/// refills an existing snapshot so a renderer can reuse its buffer.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Snapshot {
    pub tick: Tick,
    /// Actors in registry storage order.
    pub actors: Vec<ActorView>,
}

impl Snapshot {
    pub fn get(&self, id: ActorId) -> Option<&ActorView> {
        self.actors.iter().find(|view| view.id == id)
    }

    pub fn of_kind(&self, kind: ActorKind) -> impl Iterator<Item = &ActorView> {
        self.actors.iter().filter(move |view| view.kind == kind)
    }

    pub fn len(&self) -> usize {
        self.actors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actors.is_empty()
    }
}
