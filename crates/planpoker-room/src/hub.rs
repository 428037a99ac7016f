//! Per-room event fan-out.
//!
//! Every subscriber gets its own bounded inbox. Publishing uses
//! `try_send`: a full inbox loses that event, it never makes the
//! publisher wait. Publish runs under the room's write lock, so a
//! stalled client must not be able to hold up the room.

use std::collections::HashMap;
use std::fmt;

use planpoker_protocol::RoomEvent;
use tokio::sync::mpsc::{self, error::TrySendError};

/// Identifies one subscription within a room's hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// The receiving end of a room subscription.
///
/// Hand it back with [`Room::unsubscribe`](crate::Room::unsubscribe)
/// when the client goes away. After unsubscribing, `recv` drains what
/// is already queued and then returns `None`.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriberId,
    receiver: mpsc::Receiver<RoomEvent>,
}

impl Subscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Waits for the next event. `None` means the subscription was
    /// closed.
    pub async fn recv(&mut self) -> Option<RoomEvent> {
        self.receiver.recv().await
    }

    /// Returns a queued event without waiting.
    pub fn try_recv(&mut self) -> Option<RoomEvent> {
        self.receiver.try_recv().ok()
    }
}

/// Fan-out to every live subscriber of one room.
///
/// The hub has no lock of its own. It lives inside the room state and
/// is driven under the room's write lock, which is what orders events:
/// every subscriber sees a room's events in the order the mutations
/// happened. Subscribers are independent, so one slow inbox loses
/// events without affecting the others.
#[derive(Debug)]
pub struct EventHub {
    subscribers: HashMap<SubscriberId, mpsc::Sender<RoomEvent>>,
    next_id: u64,
    capacity: usize,
}

impl EventHub {
    /// Creates an empty hub whose inboxes hold `capacity` events.
    pub fn new(capacity: usize) -> Self {
        Self {
            subscribers: HashMap::new(),
            next_id: 1,
            capacity: capacity.max(1),
        }
    }

    /// Registers a new inbox.
    pub fn subscribe(&mut self) -> Subscription {
        let (tx, rx) = mpsc::channel(self.capacity);
        let id = SubscriberId(self.next_id);
        self.next_id += 1;
        self.subscribers.insert(id, tx);
        tracing::debug!(%id, subscribers = self.subscribers.len(), "subscribed");
        Subscription { id, receiver: rx }
    }

    /// Removes an inbox. Dropping its sender closes the channel.
    /// Returns whether it was registered.
    pub fn unsubscribe(&mut self, id: SubscriberId) -> bool {
        let removed = self.subscribers.remove(&id).is_some();
        if removed {
            tracing::debug!(%id, subscribers = self.subscribers.len(), "unsubscribed");
        }
        removed
    }

    /// Offers `event` to every inbox without waiting. Returns how many
    /// inboxes accepted it.
    ///
    /// Each inbox gets its own clone of the event. An inbox that is full
    /// skips this event but stays registered and gets later ones, so a
    /// client that falls behind sees a gap rather than a stall; it can
    /// recover with a fresh snapshot. Inboxes whose receiver was dropped
    /// without unsubscribing are pruned here.
    ///
    /// Never awaits, so it is safe to call with the room lock held.
    pub fn publish(&mut self, event: &RoomEvent) -> usize {
        let mut delivered = 0;
        self.subscribers.retain(|id, tx| match tx.try_send(event.clone()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(TrySendError::Full(_)) => {
                tracing::debug!(%id, kind = event.kind(), "subscriber inbox full, event dropped");
                true
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!(%id, "subscriber gone, pruning");
                false
            }
        });
        delivered
    }

    /// Number of registered inboxes.
    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    /// Returns `true` if nobody is listening.
    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }
}
