//! `AcadexServer` builder and server loop.
//!
//! Ties the layers together: the HTTP API on one listener and the push feed
//! on a WebSocket transport, both backed by the same store.

use std::future::{Future, IntoFuture};
use std::net::SocketAddr;
use std::sync::Arc;

use acadex_attendance::AttendanceVerifier;
use acadex_feed::FeedHub;
use acadex_protocol::JsonCodec;
use acadex_session::{AttendanceStore, Authenticator, SessionRegistry};
use acadex_timetable::{TimetableResolver, TimetableSource};
use acadex_transport::{Transport, WebSocketTransport};
use axum::Router;
use tokio::net::TcpListener;

use crate::AcadexError;
use crate::config::AppConfig;
use crate::display::TokenDisplay;
use crate::handler::{FeedState, handle_connection};
use crate::routes::{AppState, router};

/// Builder for configuring and starting an Acadex server.
///
/// # Example
///
/// ```rust,ignore
/// let server = AcadexServerBuilder::new()
///     .config(AppConfig::load()?)
///     .build(store, auth, timetable)
///     .await?;
/// server.run().await
/// ```
pub struct AcadexServerBuilder {
    config: AppConfig,
}

impl AcadexServerBuilder {
    pub fn new() -> Self {
        Self {
            config: AppConfig::default(),
        }
    }

    pub fn config(mut self, config: AppConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the HTTP listen address.
    pub fn http_addr(mut self, addr: &str) -> Self {
        self.config.server.http_addr = addr.to_string();
        self
    }

    /// Sets the push feed listen address.
    pub fn feed_addr(mut self, addr: &str) -> Self {
        self.config.server.feed_addr = addr.to_string();
        self
    }

    /// Binds both listeners and starts the feed hub.
    pub async fn build<S, A, T>(
        self,
        store: Arc<S>,
        auth: A,
        timetable: Arc<T>,
    ) -> Result<AcadexServer<A>, AcadexError>
    where
        S: AttendanceStore,
        A: Authenticator,
        T: TimetableSource,
    {
        let config = self.config;
        let auth = Arc::new(auth);

        let hub = FeedHub::spawn(Arc::clone(&store), config.feed.clone()).await;

        let state = AppState {
            registry: SessionRegistry::new(Arc::clone(&store)),
            verifier: AttendanceVerifier::new(store, config.attendance.verifier_config()),
            timetable: TimetableResolver::new(timetable),
            display: Arc::new(TokenDisplay::new(
                hub.clone(),
                config.rotation.rotation_config(),
            )),
            auth: Arc::clone(&auth),
        };

        let listener = TcpListener::bind(&config.server.http_addr).await?;
        tracing::info!(addr = %config.server.http_addr, "http api listening");
        let transport = WebSocketTransport::bind(&config.server.feed_addr).await?;

        let feed = Arc::new(FeedState {
            hub: hub.clone(),
            auth,
            codec: JsonCodec,
            handshake_timeout: config.server.handshake_timeout(),
            idle_timeout: config.server.idle_timeout(),
        });

        Ok(AcadexServer {
            listener,
            transport,
            router: router(state),
            feed,
            hub,
        })
    }
}

impl Default for AcadexServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Acadex server.
///
/// Call [`run()`](Self::run) to start serving.
pub struct AcadexServer<A: Authenticator> {
    listener: TcpListener,
    transport: WebSocketTransport,
    router: Router,
    feed: Arc<FeedState<A>>,
    hub: FeedHub,
}

impl<A: Authenticator> AcadexServer<A> {
    pub fn http_addr(&self) -> Result<SocketAddr, AcadexError> {
        Ok(self.listener.local_addr()?)
    }

    pub fn feed_addr(&self) -> Result<SocketAddr, AcadexError> {
        Ok(self.transport.local_addr()?)
    }

    /// Handle to the feed hub, e.g. for stats.
    pub fn hub(&self) -> &FeedHub {
        &self.hub
    }

    /// Serve until the process is terminated.
    pub async fn run(self) -> Result<(), AcadexError> {
        self.run_until(std::future::pending()).await
    }

    /// Serve until `shutdown` resolves. In-flight HTTP requests finish;
    /// the feed hub is stopped, which ends every live subscription.
    pub async fn run_until<F>(self, shutdown: F) -> Result<(), AcadexError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        tracing::info!("Acadex server running");

        let http = axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown)
            .into_future();

        let result = tokio::select! {
            result = http => result.map_err(AcadexError::from),
            () = accept_feed(self.transport, self.feed) => Ok(()),
        };

        if let Err(e) = self.hub.shutdown().await {
            tracing::debug!(error = %e, "feed hub already stopped");
        }
        tracing::info!("Acadex server stopped");
        result
    }
}

/// Accepts feed connections forever, one task per connection.
async fn accept_feed<A: Authenticator>(mut transport: WebSocketTransport, state: Arc<FeedState<A>>) {
    loop {
        match transport.accept().await {
            Ok(conn) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(conn, state).await {
                        tracing::debug!(error = %e, "feed connection ended with error");
                    }
                });
            }
            Err(e) => {
                tracing::warn!(error = %e, "feed accept failed");
            }
        }
    }
}
