//! Event bus and the events the core publishes.
//!
//! Components never hold references to each other; they communicate through
//! the bus. Ordering is only guaranteed among handlers of the same kind.

mod bus;
mod types;

pub use bus::{BusError, EventBus, Handler, SubscriptionHandle};
pub use types::{EventKind, KillReport, SimEvent, SpawnReport, StepReport};
