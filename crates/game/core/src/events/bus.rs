//! Synchronous, ordered publish/subscribe dispatch.

use strum::EnumCount;

use super::types::{EventKind, SimEvent};
use crate::error::{ErrorSeverity, SimError};

/// Callback invoked for every published event of the subscribed kind.
///
/// The bus is passed back in so a handler can publish a different event kind
/// or change subscriptions.
pub type Handler = Box<dyn FnMut(&SimEvent, &mut EventBus)>;

/// Ticket returned by [`EventBus::subscribe`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle {
    kind: EventKind,
    id: u64,
}

impl SubscriptionHandle {
    pub fn kind(&self) -> EventKind {
        self.kind
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum BusError {
    #[error("unknown event name '{0}'")]
    UnknownEvent(String),
}

impl SimError for BusError {
    fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::Validation
    }

    fn error_code(&self) -> &'static str {
        "UNKNOWN_EVENT"
    }
}

struct Subscriber {
    id: u64,
    /// Taken out while the handler runs.
    handler: Option<Handler>,
    /// Unsubscribed during dispatch; dropped once dispatch ends.
    removed: bool,
}

#[derive(Default)]
struct Channel {
    subscribers: Vec<Subscriber>,
    dispatching: bool,
}

/// Event bus keyed by [`EventKind`].
///
/// Single-threaded and synchronous: [`publish`](Self::publish) runs every
/// current subscriber of the event's kind, in subscription order, before it
/// returns.
///
/// # Reentrancy
///
/// - A handler may publish an event of a *different* kind; it is dispatched
///   immediately, nested inside the current dispatch.
/// - Publishing the kind currently being dispatched is refused and logged.
/// - Subscribing to or unsubscribing from the kind being dispatched takes
///   effect on the next publish of that kind.
pub struct EventBus {
    channels: [Channel; EventKind::COUNT],
    next_id: u64,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            channels: std::array::from_fn(|_| Channel::default()),
            next_id: 0,
        }
    }

    /// Registers `handler` for events of `kind`.
    pub fn subscribe<F>(&mut self, kind: EventKind, handler: F) -> SubscriptionHandle
    where
        F: FnMut(&SimEvent, &mut EventBus) + 'static,
    {
        let id = self.next_id;
        self.next_id += 1;

        // Appending never disturbs an in-flight dispatch: it only walks the
        // subscribers present when it started.
        self.channels[kind.index()].subscribers.push(Subscriber {
            id,
            handler: Some(Box::new(handler)),
            removed: false,
        });

        tracing::trace!(target: "combat::events", %kind, id, "subscribed");
        SubscriptionHandle { kind, id }
    }

    /// Same as [`subscribe`](Self::subscribe) with the event's snake_case name.
    pub fn subscribe_named<F>(&mut self, name: &str, handler: F) -> Result<SubscriptionHandle, BusError>
    where
        F: FnMut(&SimEvent, &mut EventBus) + 'static,
    {
        let kind: EventKind = name
            .parse()
            .map_err(|_| BusError::UnknownEvent(name.to_owned()))?;
        Ok(self.subscribe(kind, handler))
    }

    /// Removes a subscription. Unsubscribing twice is a no-op.
    ///
    /// Returns whether a live subscription was removed.
    pub fn unsubscribe(&mut self, handle: SubscriptionHandle) -> bool {
        let channel = &mut self.channels[handle.kind.index()];
        let Some(position) = channel
            .subscribers
            .iter()
            .position(|subscriber| subscriber.id == handle.id && !subscriber.removed)
        else {
            tracing::debug!(
                target: "combat::events",
                kind = %handle.kind,
                id = handle.id,
                "unsubscribe of inactive handle ignored"
            );
            return false;
        };

        if channel.dispatching {
            channel.subscribers[position].removed = true;
        } else {
            channel.subscribers.remove(position);
        }
        true
    }

    /// Dispatches `event` to every subscriber of its kind.
    ///
    /// Returns the number of handlers invoked.
    pub fn publish(&mut self, event: SimEvent) -> usize {
        let kind = event.kind();
        let index = kind.index();

        if self.channels[index].dispatching {
            tracing::warn!(
                target: "combat::events",
                %kind,
                "handler republished the event kind being dispatched; dropped"
            );
            return 0;
        }

        self.channels[index].dispatching = true;
        let count = self.channels[index].subscribers.len();
        let mut invoked = 0;

        for position in 0..count {
            let Some(mut handler) = self.channels[index].subscribers[position].handler.take() else {
                continue;
            };
            handler(&event, self);
            self.channels[index].subscribers[position].handler = Some(handler);
            invoked += 1;
        }

        let channel = &mut self.channels[index];
        channel.dispatching = false;
        channel.subscribers.retain(|subscriber| !subscriber.removed);

        invoked
    }

    /// Live subscriptions for `kind`.
    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.channels[kind.index()]
            .subscribers
            .iter()
            .filter(|subscriber| !subscriber.removed)
            .count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut map = f.debug_map();
        for (kind, channel) in <EventKind as strum::IntoEnumIterator>::iter().zip(&self.channels) {
            map.entry(&kind, &channel.subscribers.len());
        }
        map.finish()
    }
}
