//! The feed hub actor and its handle.
//!
//! One Tokio task owns every subscriber list. It multiplexes two inputs:
//! commands from [`FeedHub`] handles and the store's change log. Because
//! both are handled on the same task, a subscription is registered at an
//! exact point in the revision sequence.

use std::collections::HashMap;
use std::sync::Arc;

use acadex_protocol::{Change, FeedEvent, FeedItem, Topic};
use acadex_session::{AttendanceStore, ChangeKind, StoreChange};
use tokio::sync::{mpsc, oneshot};

use crate::{FeedConfig, FeedError, Subscription};

pub(crate) type SubscriberId = u64;

/// Commands sent from a [`FeedHub`] handle to the actor.
pub(crate) enum HubCommand {
    Subscribe {
        topic: Topic,
        sender: mpsc::UnboundedSender<FeedEvent>,
        reply: oneshot::Sender<Result<(SubscriberId, u64), FeedError>>,
    },
    Unsubscribe {
        topic: Topic,
        id: SubscriberId,
    },
    Stats {
        reply: oneshot::Sender<HubStats>,
    },
    Shutdown,
}

/// Point-in-time counters reported by the hub.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HubStats {
    pub topics: usize,
    pub subscribers: usize,
    /// Last store revision the hub has processed.
    pub revision: u64,
}

struct Subscriber {
    id: SubscriberId,
    /// Snapshot revision; only strictly newer changes are delivered.
    since: u64,
    sender: mpsc::UnboundedSender<FeedEvent>,
}

/// Maps one committed store change to the topic events it produces.
///
/// Ending a session removes it from the institute's active slot and marks
/// the session document modified on its roster topic, so a roster view
/// learns that marking has closed.
pub fn topic_events(kind: &ChangeKind) -> Vec<(Topic, Change)> {
    match kind {
        ChangeKind::SessionActivated(session) => vec![(
            Topic::ActiveSession {
                institute_id: session.institute_id.clone(),
            },
            Change::Added(FeedItem::Session(session.clone())),
        )],
        ChangeKind::SessionDeactivated(session) => vec![
            (
                Topic::ActiveSession {
                    institute_id: session.institute_id.clone(),
                },
                Change::Removed(FeedItem::Session(session.clone())),
            ),
            (
                Topic::Attendance {
                    session_id: session.id,
                },
                Change::Modified(FeedItem::Session(session.clone())),
            ),
        ],
        ChangeKind::AttendanceAdded(record) => vec![(
            Topic::Attendance {
                session_id: record.session_id,
            },
            Change::Added(FeedItem::Attendance(record.clone())),
        )],
    }
}

struct HubActor<S: AttendanceStore> {
    store: Arc<S>,
    config: FeedConfig,
    commands: mpsc::Receiver<HubCommand>,
    changes: mpsc::UnboundedReceiver<StoreChange>,
    topics: HashMap<Topic, Vec<Subscriber>>,
    next_id: SubscriberId,
    revision: u64,
}

impl<S: AttendanceStore> HubActor<S> {
    async fn run(mut self) {
        tracing::debug!("feed hub started");

        loop {
            tokio::select! {
                cmd = self.commands.recv() => match cmd {
                    Some(HubCommand::Shutdown) | None => break,
                    Some(cmd) => self.handle_command(cmd).await,
                },
                change = self.changes.recv() => match change {
                    Some(change) => self.publish(change),
                    None => {
                        tracing::warn!("store change log closed, stopping feed hub");
                        break;
                    }
                },
            }
        }

        tracing::debug!(topics = self.topics.len(), "feed hub stopped");
    }

    async fn handle_command(&mut self, cmd: HubCommand) {
        match cmd {
            HubCommand::Subscribe {
                topic,
                sender,
                reply,
            } => {
                let result = self.subscribe(topic, sender).await;
                let _ = reply.send(result);
            }
            HubCommand::Unsubscribe { topic, id } => {
                self.unsubscribe(&topic, id);
            }
            HubCommand::Stats { reply } => {
                let _ = reply.send(HubStats {
                    topics: self.topics.len(),
                    subscribers: self.topics.values().map(Vec::len).sum(),
                    revision: self.revision,
                });
            }
            HubCommand::Shutdown => {}
        }
    }

    async fn subscribe(
        &mut self,
        topic: Topic,
        sender: mpsc::UnboundedSender<FeedEvent>,
    ) -> Result<(SubscriberId, u64), FeedError> {
        let count = self.topics.get(&topic).map_or(0, Vec::len);
        if count >= self.config.max_subscribers_per_topic {
            return Err(FeedError::TopicFull(topic));
        }

        let snapshot = self.store.snapshot(&topic).await?;
        for item in snapshot.items {
            let event = FeedEvent {
                topic: topic.clone(),
                revision: snapshot.revision,
                change: Change::Added(item),
            };
            if sender.send(event).is_err() {
                // Subscriber already gone; nothing to register.
                return Ok((0, snapshot.revision));
            }
        }

        let id = self.next_id;
        self.next_id += 1;
        tracing::debug!(%topic, id, revision = snapshot.revision, "subscriber registered");
        self.topics.entry(topic).or_default().push(Subscriber {
            id,
            since: snapshot.revision,
            sender,
        });
        Ok((id, snapshot.revision))
    }

    fn unsubscribe(&mut self, topic: &Topic, id: SubscriberId) {
        if let Some(subs) = self.topics.get_mut(topic) {
            subs.retain(|s| s.id != id);
            if subs.is_empty() {
                self.topics.remove(topic);
            }
            tracing::debug!(%topic, id, "subscriber removed");
        }
    }

    fn publish(&mut self, change: StoreChange) {
        self.revision = change.revision;

        for (topic, event_change) in topic_events(&change.kind) {
            let Some(subs) = self.topics.get_mut(&topic) else {
                continue;
            };

            let event = FeedEvent {
                topic: topic.clone(),
                revision: change.revision,
                change: event_change,
            };
            subs.retain(|sub| {
                if change.revision <= sub.since {
                    return true;
                }
                sub.sender.send(event.clone()).is_ok()
            });

            if subs.is_empty() {
                self.topics.remove(&topic);
            }
        }
    }
}

/// Cloneable handle to a running feed hub.
///
/// When the last handle is dropped the command channel closes and the hub
/// stops; live subscriptions then end.
#[derive(Clone)]
pub struct FeedHub {
    sender: mpsc::Sender<HubCommand>,
}

impl FeedHub {
    /// Start a hub over `store`'s change log.
    ///
    /// The change log is attached before this returns, so every write
    /// committed afterwards reaches subscribers.
    pub async fn spawn<S: AttendanceStore>(store: Arc<S>, config: FeedConfig) -> Self {
        let config = config.validated();
        let (tx, rx) = mpsc::channel(config.command_channel_size);
        let changes = store.subscribe_changes().await;

        let actor = HubActor {
            store,
            config,
            commands: rx,
            changes,
            topics: HashMap::new(),
            next_id: 1,
            revision: 0,
        };
        tokio::spawn(actor.run());

        Self { sender: tx }
    }

    /// Subscribe to `topic`.
    ///
    /// The returned subscription first yields the topic's current documents
    /// as `Added` events, then every later change in revision order.
    pub async fn subscribe(&self, topic: Topic) -> Result<Subscription, FeedError> {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(HubCommand::Subscribe {
                topic: topic.clone(),
                sender: event_tx,
                reply: reply_tx,
            })
            .await
            .map_err(|_| FeedError::Unavailable)?;
        let (id, revision) = reply_rx.await.map_err(|_| FeedError::Unavailable)??;

        Ok(Subscription::new(
            topic,
            id,
            revision,
            event_rx,
            self.sender.clone(),
        ))
    }

    pub async fn stats(&self) -> Result<HubStats, FeedError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(HubCommand::Stats { reply: reply_tx })
            .await
            .map_err(|_| FeedError::Unavailable)?;
        reply_rx.await.map_err(|_| FeedError::Unavailable)
    }

    /// Stop the hub. Open subscriptions end after draining queued events.
    pub async fn shutdown(&self) -> Result<(), FeedError> {
        self.sender
            .send(HubCommand::Shutdown)
            .await
            .map_err(|_| FeedError::Unavailable)
    }

    /// Whether the hub task is still accepting commands.
    pub fn is_running(&self) -> bool {
        !self.sender.is_closed()
    }
}
