//! The process-local pub/sub registry behind document sync.
//!
//! Subscription add/remove and broadcast are serialized by a single
//! writer lock over the registry; delivery to each subscriber is
//! non-blocking. A subscriber whose queue overflows is dropped rather
//! than allowed to stall the broadcaster.

use std::collections::HashMap;

use bytes::Bytes;
use tokio::sync::{mpsc, Mutex};
use uuid::Uuid;

/// Identity of one live websocket subscription, used to suppress
/// echoing a change back to the peer that wrote it.
pub type SubscriberId = Uuid;

/// Bound on each subscriber's pending-message queue. A peer that falls
/// this far behind is disconnected rather than allowed to backpressure
/// the publisher.
const SUBSCRIBER_QUEUE_CAPACITY: usize = 64;

struct DocumentChannel {
    subscribers: HashMap<SubscriberId, mpsc::Sender<Bytes>>,
}

/// A freshly registered subscription: an id to tag outbound writes with
/// and a receiver to drain in the connection's forwarding task.
pub struct Subscription {
    pub id: SubscriberId,
    pub document_id: Uuid,
    pub receiver: mpsc::Receiver<Bytes>,
}

/// The document sync fan-out hub (component C6).
#[derive(Default)]
pub struct SyncHub {
    documents: Mutex<HashMap<Uuid, DocumentChannel>>,
}

impl SyncHub {
    /// Build an empty hub.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new subscriber for `document_id`.
    pub async fn subscribe(&self, document_id: Uuid) -> Subscription {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(SUBSCRIBER_QUEUE_CAPACITY);

        let mut documents = self.documents.lock().await;
        documents
            .entry(document_id)
            .or_insert_with(|| DocumentChannel {
                subscribers: HashMap::new(),
            })
            .subscribers
            .insert(id, tx);

        Subscription {
            id,
            document_id,
            receiver: rx,
        }
    }

    /// Remove a subscription, e.g. when its connection closes. Drops
    /// the channel registry entry entirely once a document has no
    /// remaining subscribers.
    pub async fn unsubscribe(&self, document_id: Uuid, subscriber_id: SubscriberId) {
        let mut documents = self.documents.lock().await;
        let Some(channel) = documents.get_mut(&document_id) else {
            return;
        };
        channel.subscribers.remove(&subscriber_id);
        if channel.subscribers.is_empty() {
            documents.remove(&document_id);
        }
    }

    /// Push `bytes` to every subscriber of `document_id` other than
    /// `originator`. Delivery is non-blocking; a subscriber whose queue
    /// is full is unsubscribed so its connection task observes a closed
    /// channel and tears down.
    pub async fn publish(&self, document_id: Uuid, originator: SubscriberId, bytes: Bytes) {
        let mut documents = self.documents.lock().await;
        let Some(channel) = documents.get_mut(&document_id) else {
            return;
        };

        let mut overflowed = Vec::new();
        for (id, sender) in &channel.subscribers {
            if *id == originator {
                continue;
            }
            if sender.try_send(bytes.clone()).is_err() {
                overflowed.push(*id);
            }
        }
        for id in overflowed {
            channel.subscribers.remove(&id);
        }
    }

    /// Number of live subscribers on a document, for tests and metrics.
    pub async fn subscriber_count(&self, document_id: Uuid) -> usize {
        self.documents
            .lock()
            .await
            .get(&document_id)
            .map_or(0, |c| c.subscribers.len())
    }
}
