//! Per-connection push-feed handler: handshake, auth, and subscriptions.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Receive Handshake → validate version
//!   2. Authenticate token → get Identity
//!   3. Send HandshakeAck
//!   4. Loop: client messages (subscribe, unsubscribe, heartbeat) and
//!      feed events, until the client leaves or goes silent

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use acadex_feed::{FeedError, FeedHub};
use acadex_protocol::{
    Codec, Envelope, FeedEvent, FeedMessage, JsonCodec, PROTOCOL_VERSION, ProtocolError, Topic,
};
use acadex_session::{Authenticator, Identity};
use acadex_transport::{Connection, WebSocketConnection};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::AcadexError;

/// Shared state for every feed connection task.
pub(crate) struct FeedState<A: Authenticator> {
    pub(crate) hub: FeedHub,
    pub(crate) auth: Arc<A>,
    pub(crate) codec: JsonCodec,
    pub(crate) handshake_timeout: Duration,
    pub(crate) idle_timeout: Duration,
}

/// Outgoing side of a connection: stamps every envelope with the next
/// sequence number and the time since the connection started.
struct Outbound<'a> {
    conn: &'a WebSocketConnection,
    codec: &'a JsonCodec,
    seq: u64,
    start: Instant,
}

impl Outbound<'_> {
    async fn send(&mut self, payload: FeedMessage) -> Result<(), AcadexError> {
        let envelope = Envelope {
            seq: self.seq,
            timestamp: self.start.elapsed().as_millis() as u64,
            payload,
        };
        self.seq += 1;
        let bytes = self.codec.encode(&envelope)?;
        // JSON is always UTF-8; send it as a text frame for browsers.
        match std::str::from_utf8(&bytes) {
            Ok(text) => self.conn.send_text(text).await?,
            Err(_) => self.conn.send(&bytes).await?,
        }
        Ok(())
    }

    async fn error(&mut self, code: u16, message: impl Into<String>) -> Result<(), AcadexError> {
        self.send(FeedMessage::Error {
            code,
            message: message.into(),
        })
        .await
    }
}

/// Forwarding tasks for this connection's subscriptions. Each task owns its
/// `Subscription`, so aborting the task unsubscribes.
#[derive(Default)]
struct Subscriptions {
    tasks: HashMap<Topic, JoinHandle<()>>,
}

impl Subscriptions {
    fn remove(&mut self, topic: &Topic) -> bool {
        match self.tasks.remove(topic) {
            Some(task) => {
                task.abort();
                true
            }
            None => false,
        }
    }
}

impl Drop for Subscriptions {
    fn drop(&mut self) {
        for task in self.tasks.values() {
            task.abort();
        }
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<A: Authenticator>(
    conn: WebSocketConnection,
    state: Arc<FeedState<A>>,
) -> Result<(), AcadexError> {
    let conn_id = conn.id();
    tracing::debug!(%conn_id, "handling new feed connection");

    let mut out = Outbound {
        conn: &conn,
        codec: &state.codec,
        seq: 0,
        start: Instant::now(),
    };

    let identity = perform_handshake(&conn, &state, &mut out).await?;
    let user_id = identity.user_id.clone();
    tracing::info!(%conn_id, %user_id, role = ?identity.role, "feed client authenticated");

    let (events_tx, mut events_rx) = mpsc::unbounded_channel::<FeedEvent>();
    let mut subscriptions = Subscriptions::default();
    let mut deadline = Instant::now() + state.idle_timeout;

    loop {
        tokio::select! {
            incoming = conn.recv() => {
                let data = match incoming {
                    Ok(Some(data)) => data,
                    Ok(None) => {
                        tracing::info!(%conn_id, %user_id, "feed connection closed cleanly");
                        break;
                    }
                    Err(e) => {
                        tracing::debug!(%conn_id, error = %e, "recv error");
                        break;
                    }
                };
                deadline = Instant::now() + state.idle_timeout;

                let envelope: Envelope = match state.codec.decode(&data) {
                    Ok(env) => env,
                    Err(e) => {
                        tracing::debug!(%conn_id, error = %e, "failed to decode envelope");
                        out.error(400, "malformed envelope").await?;
                        continue;
                    }
                };

                let close = handle_client_message(
                    envelope.payload,
                    &state.hub,
                    &mut subscriptions,
                    &events_tx,
                    &mut out,
                )
                .await?;
                if close {
                    tracing::info!(%conn_id, %user_id, "client disconnected");
                    break;
                }
            }

            Some(event) = events_rx.recv() => {
                out.send(FeedMessage::Event(event)).await?;
            }

            _ = tokio::time::sleep_until(deadline) => {
                tracing::info!(%conn_id, %user_id, "feed connection idle, closing");
                let _ = out
                    .send(FeedMessage::Disconnect { reason: "idle timeout".into() })
                    .await;
                break;
            }
        }
    }

    // Subscriptions drop here → forwarders abort → hub unsubscribes.
    drop(subscriptions);
    let _ = conn.close().await;
    Ok(())
}

/// Performs the initial handshake: receive Handshake, validate, auth, send Ack.
async fn perform_handshake<A: Authenticator>(
    conn: &WebSocketConnection,
    state: &FeedState<A>,
    out: &mut Outbound<'_>,
) -> Result<Identity, AcadexError> {
    let data = match tokio::time::timeout(state.handshake_timeout, conn.recv()).await {
        Ok(Ok(Some(data))) => data,
        Ok(Ok(None)) => {
            return Err(ProtocolError::InvalidMessage(
                "connection closed before handshake".into(),
            )
            .into());
        }
        Ok(Err(e)) => return Err(AcadexError::Transport(e)),
        Err(_) => {
            return Err(ProtocolError::InvalidMessage("handshake timed out".into()).into());
        }
    };

    let envelope: Envelope = state.codec.decode(&data)?;

    let (version, token) = match envelope.payload {
        FeedMessage::Handshake { version, token } => (version, token),
        _ => {
            out.error(400, "expected Handshake").await?;
            return Err(
                ProtocolError::InvalidMessage("first message must be Handshake".into()).into(),
            );
        }
    };

    if version != PROTOCOL_VERSION {
        out.error(
            400,
            format!("version mismatch: expected {PROTOCOL_VERSION}, got {version}"),
        )
        .await?;
        return Err(ProtocolError::InvalidMessage("protocol version mismatch".into()).into());
    }

    let token = token.as_deref().unwrap_or("");
    let identity = match state.auth.authenticate(token).await {
        Ok(identity) => identity,
        Err(e) => {
            out.error(401, "unauthorized").await?;
            return Err(AcadexError::Session(e));
        }
    };

    out.send(FeedMessage::HandshakeAck {
        user_id: identity.user_id.clone(),
        server_time: chrono::Utc::now().timestamp_millis().max(0) as u64,
    })
    .await?;

    Ok(identity)
}

/// Handles one client message. Returns `true` if the connection should close.
async fn handle_client_message(
    msg: FeedMessage,
    hub: &FeedHub,
    subscriptions: &mut Subscriptions,
    events_tx: &mpsc::UnboundedSender<FeedEvent>,
    out: &mut Outbound<'_>,
) -> Result<bool, AcadexError> {
    match msg {
        FeedMessage::Subscribe { topic } => {
            if subscriptions.tasks.contains_key(&topic) {
                out.error(409, format!("already subscribed to {topic}")).await?;
                return Ok(false);
            }

            match hub.subscribe(topic.clone()).await {
                Ok(mut sub) => {
                    // Acknowledge first so the snapshot events follow it.
                    out.send(FeedMessage::Subscribed {
                        topic: topic.clone(),
                        revision: sub.snapshot_revision(),
                    })
                    .await?;

                    let tx = events_tx.clone();
                    let task = tokio::spawn(async move {
                        while let Some(event) = sub.recv().await {
                            if tx.send(event).is_err() {
                                break;
                            }
                        }
                    });
                    subscriptions.tasks.insert(topic, task);
                }
                Err(e) => {
                    let code = match &e {
                        FeedError::TopicFull(_) => 429,
                        FeedError::Unavailable | FeedError::Store(_) => 503,
                    };
                    tracing::debug!(%topic, error = %e, "subscribe failed");
                    out.error(code, e.to_string()).await?;
                }
            }
        }

        FeedMessage::Unsubscribe { topic } => {
            if subscriptions.remove(&topic) {
                out.send(FeedMessage::Unsubscribed { topic }).await?;
            } else {
                out.error(404, format!("not subscribed to {topic}")).await?;
            }
        }

        FeedMessage::Heartbeat { client_time } => {
            let server_time = out.start.elapsed().as_millis() as u64;
            out.send(FeedMessage::HeartbeatAck {
                client_time,
                server_time,
            })
            .await?;
        }

        FeedMessage::Disconnect { reason } => {
            tracing::debug!(%reason, "client sent disconnect");
            return Ok(true);
        }

        other => {
            tracing::debug!(?other, "ignoring unexpected client message");
            out.error(400, "unexpected message").await?;
        }
    }

    Ok(false)
}
