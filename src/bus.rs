// src/bus.rs

//! Lifecycle event bus between the hosting server and the orchestrators.
//!
//! Subscriptions are explicit: each orchestrator registers one subscription
//! per event kind and removes them, in the same order, on shutdown.
//! Delivery never blocks the publisher (unbounded mailboxes).

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::types::{SessionId, StreamArgs};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    RelayPull,
    RelayPush,
    BeforePlay,
    DonePlay,
    AfterPublish,
    DonePublish,
}

/// Payload of play/publish lifecycle events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamEvent {
    /// Session id of the player or publisher.
    pub id: SessionId,
    /// Raw `/app/name`; parsed (and possibly rejected) by the consumer.
    pub stream_path: String,
    pub args: StreamArgs,
}

impl StreamEvent {
    pub fn new(id: impl Into<SessionId>, stream_path: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            stream_path: stream_path.into(),
            args: StreamArgs::new(),
        }
    }

    pub fn with_args(mut self, args: StreamArgs) -> Self {
        self.args = args;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    /// Pull `url` into the local `app/name`.
    RelayPull {
        url: String,
        app: String,
        name: String,
    },
    /// Push the local `app/name` to `url`.
    RelayPush {
        url: String,
        app: String,
        name: String,
    },
    BeforePlay(StreamEvent),
    DonePlay(StreamEvent),
    AfterPublish(StreamEvent),
    DonePublish(StreamEvent),
}

impl ServerEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            ServerEvent::RelayPull { .. } => EventKind::RelayPull,
            ServerEvent::RelayPush { .. } => EventKind::RelayPush,
            ServerEvent::BeforePlay(_) => EventKind::BeforePlay,
            ServerEvent::DonePlay(_) => EventKind::DonePlay,
            ServerEvent::AfterPublish(_) => EventKind::AfterPublish,
            ServerEvent::DonePublish(_) => EventKind::DonePublish,
        }
    }
}

/// An event as delivered to one subscriber.
///
/// `reply` is only set for [`EventBus::request`]; the subscriber answers
/// with the session id it created, or drops the sender.
#[derive(Debug)]
pub struct Envelope {
    pub event: ServerEvent,
    pub reply: Option<oneshot::Sender<SessionId>>,
}

pub type SubscriptionId = u64;

#[derive(Debug)]
struct Subscriber {
    id: SubscriptionId,
    kind: EventKind,
    tx: mpsc::UnboundedSender<Envelope>,
}

#[derive(Debug, Default)]
struct BusInner {
    next_id: SubscriptionId,
    subscribers: Vec<Subscriber>,
}

/// Cloneable handle to a shared bus.
#[derive(Debug, Clone, Default)]
pub struct EventBus {
    inner: Arc<Mutex<BusInner>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BusInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register `tx` for events of `kind`. Subscribers are served in
    /// registration order.
    pub fn subscribe(
        &self,
        kind: EventKind,
        tx: mpsc::UnboundedSender<Envelope>,
    ) -> SubscriptionId {
        let mut inner = self.lock();
        inner.next_id += 1;
        let id = inner.next_id;
        inner.subscribers.push(Subscriber { id, kind, tx });
        debug!(subscription = id, ?kind, "subscribed");
        id
    }

    /// Remove a subscription. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut inner = self.lock();
        let before = inner.subscribers.len();
        inner.subscribers.retain(|s| s.id != id);
        let removed = inner.subscribers.len() != before;
        if removed {
            debug!(subscription = id, "unsubscribed");
        }
        removed
    }

    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.lock().subscribers.iter().filter(|s| s.kind == kind).count()
    }

    /// Deliver `event` to every subscriber of its kind. Returns how many
    /// received it.
    pub fn publish(&self, event: ServerEvent) -> usize {
        let kind = event.kind();
        let inner = self.lock();
        let mut delivered = 0;
        for sub in inner.subscribers.iter().filter(|s| s.kind == kind) {
            let envelope = Envelope {
                event: event.clone(),
                reply: None,
            };
            if sub.tx.send(envelope).is_ok() {
                delivered += 1;
            } else {
                warn!(subscription = sub.id, ?kind, "subscriber mailbox closed");
            }
        }
        debug!(?kind, delivered, "event published");
        delivered
    }

    /// Deliver `event` to the first subscriber of its kind and wait for the
    /// session id it reports back.
    ///
    /// Returns `None` when nobody is subscribed or the subscriber created
    /// no session.
    pub async fn request(&self, event: ServerEvent) -> Option<SessionId> {
        let kind = event.kind();
        let (reply_tx, reply_rx) = oneshot::channel();
        {
            let inner = self.lock();
            let sub = inner.subscribers.iter().find(|s| s.kind == kind)?;
            let envelope = Envelope {
                event,
                reply: Some(reply_tx),
            };
            if sub.tx.send(envelope).is_err() {
                warn!(subscription = sub.id, ?kind, "subscriber mailbox closed");
                return None;
            }
        }
        reply_rx.await.ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_reaches_only_matching_subscribers() {
        let bus = EventBus::new();
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        bus.subscribe(EventKind::AfterPublish, tx_a);
        bus.subscribe(EventKind::DonePlay, tx_b);

        let event = ServerEvent::AfterPublish(StreamEvent::new("P1", "/live/a"));
        assert_eq!(bus.publish(event.clone()), 1);

        assert_eq!(rx_a.try_recv().unwrap().event, event);
        assert!(rx_b.try_recv().is_err());
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let bus = EventBus::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let id = bus.subscribe(EventKind::DonePublish, tx);
        assert_eq!(bus.subscriber_count(EventKind::DonePublish), 1);

        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        assert_eq!(bus.publish(ServerEvent::DonePublish(StreamEvent::new("P", "/a/b"))), 0);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn request_gets_reply_from_first_subscriber() {
        let bus = EventBus::new();
        let (tx, mut rx) = mpsc::unbounded_channel::<Envelope>();
        bus.subscribe(EventKind::RelayPull, tx);

        let responder = tokio::spawn(async move {
            let envelope = rx.recv().await.unwrap();
            envelope.reply.unwrap().send("NEWID123".to_string()).unwrap();
        });

        let id = bus
            .request(ServerEvent::RelayPull {
                url: "rtmp://remote/live/a".into(),
                app: "live".into(),
                name: "a".into(),
            })
            .await;
        responder.await.unwrap();
        assert_eq!(id.as_deref(), Some("NEWID123"));
    }

    #[tokio::test]
    async fn request_without_subscriber_is_none() {
        let bus = EventBus::new();
        let id = bus
            .request(ServerEvent::RelayPush {
                url: "rtmp://x".into(),
                app: "a".into(),
                name: "b".into(),
            })
            .await;
        assert!(id.is_none());
    }
}
