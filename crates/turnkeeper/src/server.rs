//! `TurnkeeperServer` builder and server loop.
//!
//! This is the entry point for running a Turnkeeper server. It ties
//! together all the layers: transport → protocol → room store → broadcast.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use turnkeeper_protocol::{Codec, JsonCodec};
use turnkeeper_room::{Clock, RoomStore};
use turnkeeper_transport::{Incoming, Transport, WebSocketTransport};

use crate::broadcast::Broadcaster;
use crate::handler::handle_connection;
use crate::{ServerConfig, TurnkeeperError};

/// How long a peer may take to finish the WebSocket upgrade.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Shared server state passed to each connection handler task.
///
/// Wrapped in `Arc` so it can be cheaply cloned across tasks. The store
/// and broadcaster lock internally; nothing here needs an outer mutex.
/// The broadcaster is also the store's observer.
pub(crate) struct ServerState<C: Codec> {
    pub(crate) store: RoomStore,
    pub(crate) broadcaster: Arc<Broadcaster<C>>,
    pub(crate) codec: C,
}

/// Builder for configuring and starting a Turnkeeper server.
///
/// # Example
///
/// ```rust,no_run
/// use turnkeeper::prelude::*;
///
/// # async fn demo() -> Result<(), TurnkeeperError> {
/// let server = TurnkeeperServer::builder()
///     .bind("127.0.0.1:3000")
///     .path("/ws")
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct TurnkeeperServerBuilder {
    config: ServerConfig,
    clock: Option<Arc<dyn Clock>>,
    handshake_timeout: Duration,
}

impl TurnkeeperServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
            clock: None,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
        }
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    /// Only accept WebSocket upgrades on `path`.
    pub fn path(mut self, path: &str) -> Self {
        self.config.ws_path = Some(path.to_string());
        self
    }

    /// Accept WebSocket upgrades on every path.
    pub fn any_path(mut self) -> Self {
        self.config.ws_path = None;
        self
    }

    /// Uses `clock` for every timestamp instead of the system clock.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Drops peers that have not completed the upgrade after `timeout`.
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Binds the listener and assembles the server.
    ///
    /// Uses `JsonCodec` and `WebSocketTransport`, which is what browser
    /// clients speak.
    pub async fn build(
        self,
    ) -> Result<TurnkeeperServer<JsonCodec>, TurnkeeperError> {
        let mut transport =
            WebSocketTransport::bind(&self.config.bind_addr).await?;
        if let Some(path) = self.config.ws_path {
            transport = transport.with_path(path);
        }

        let broadcaster = Arc::new(Broadcaster::new(JsonCodec));
        let mut store = RoomStore::new().observer(broadcaster.clone());
        if let Some(clock) = self.clock {
            store = store.with_clock(clock);
        }

        let state = Arc::new(ServerState {
            store,
            broadcaster,
            codec: JsonCodec,
        });

        Ok(TurnkeeperServer {
            transport,
            state,
            handshake_timeout: self.handshake_timeout,
        })
    }
}

impl Default for TurnkeeperServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A Turnkeeper server, bound and ready to accept.
///
/// Call [`run()`](Self::run) or [`run_until()`](Self::run_until) to start
/// accepting connections.
pub struct TurnkeeperServer<C: Codec> {
    transport: WebSocketTransport,
    state: Arc<ServerState<C>>,
    handshake_timeout: Duration,
}

impl TurnkeeperServer<JsonCodec> {
    /// Creates a new builder.
    pub fn builder() -> TurnkeeperServerBuilder {
        TurnkeeperServerBuilder::new()
    }
}

impl<C> TurnkeeperServer<C>
where
    C: Codec + Clone,
{
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// Runs the accept loop until the process is terminated.
    pub async fn run(self) -> Result<(), TurnkeeperError> {
        self.run_until(std::future::pending()).await
    }

    /// Runs the accept loop until `shutdown` resolves.
    ///
    /// Each accepted peer gets its own task, which runs the upgrade
    /// handshake under the handshake timeout and then the handler. Once
    /// `shutdown` fires no new connections are taken; connections already
    /// open keep being served until they close or the runtime stops.
    pub async fn run_until(
        mut self,
        shutdown: impl Future<Output = ()>,
    ) -> Result<(), TurnkeeperError> {
        tracing::info!(addr = ?self.local_addr().ok(), "Turnkeeper server running");
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                () = &mut shutdown => {
                    tracing::info!("shutdown requested");
                    self.transport.shutdown().await?;
                    return Ok(());
                }
                accepted = self.transport.accept() => match accepted {
                    Ok(incoming) => {
                        let state = Arc::clone(&self.state);
                        let timeout = self.handshake_timeout;
                        tokio::spawn(async move {
                            let peer = incoming.peer_addr();
                            let conn = match tokio::time::timeout(
                                timeout,
                                incoming.establish(),
                            )
                            .await
                            {
                                Ok(Ok(conn)) => conn,
                                Ok(Err(e)) => {
                                    tracing::debug!(
                                        %peer,
                                        error = %e,
                                        "upgrade rejected"
                                    );
                                    return;
                                }
                                Err(_) => {
                                    tracing::debug!(%peer, "upgrade timed out");
                                    return;
                                }
                            };
                            if let Err(e) = handle_connection(conn, state).await {
                                tracing::debug!(
                                    error = %e,
                                    "connection ended with error"
                                );
                            }
                        });
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "accept failed");
                    }
                },
            }
        }
    }
}
