use acadex_protocol::{FeedEvent, Topic};
use tokio::sync::mpsc;

use crate::hub::{HubCommand, SubscriberId};

/// A live subscription to one topic.
///
/// Dropping it unsubscribes. Events arrive in strictly increasing revision
/// order, except that the initial snapshot's `Added` events all share the
/// snapshot revision.
pub struct Subscription {
    topic: Topic,
    id: SubscriberId,
    snapshot_revision: u64,
    events: mpsc::UnboundedReceiver<FeedEvent>,
    hub: mpsc::Sender<HubCommand>,
}

impl Subscription {
    pub(crate) fn new(
        topic: Topic,
        id: SubscriberId,
        snapshot_revision: u64,
        events: mpsc::UnboundedReceiver<FeedEvent>,
        hub: mpsc::Sender<HubCommand>,
    ) -> Self {
        Self {
            topic,
            id,
            snapshot_revision,
            events,
            hub,
        }
    }

    /// The next event, or `None` once the hub has stopped.
    pub async fn recv(&mut self) -> Option<FeedEvent> {
        self.events.recv().await
    }

    /// Non-blocking variant of [`recv`](Self::recv).
    pub fn try_recv(&mut self) -> Option<FeedEvent> {
        self.events.try_recv().ok()
    }

    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    /// Store revision the initial snapshot was taken at.
    pub fn snapshot_revision(&self) -> u64 {
        self.snapshot_revision
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        // Best effort: if the command queue is full or closed the hub prunes
        // this subscriber on its next failed send.
        let _ = self.hub.try_send(HubCommand::Unsubscribe {
            topic: self.topic.clone(),
            id: self.id,
        });
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("topic", &self.topic)
            .field("id", &self.id)
            .field("snapshot_revision", &self.snapshot_revision)
            .finish()
    }
}
