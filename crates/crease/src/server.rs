//! `CreaseServer` builder and server loop.
//!
//! Ties the layers together: transport → protocol → coordinators → store.
//! Besides the accept loop the server runs two background tasks: one
//! forwarding auction countdown signals to rooms, one sweeping expired
//! store keys.
//!
//! ## Shared state
//!
//! Everything a connection task needs lives in one [`ServerState`] behind
//! an `Arc`. The coordinators and the store serialise their own writes
//! per room, and the hub guards its socket map, so the state itself needs
//! no outer lock and every task can hold a clone of the `Arc`.
//!
//! ## Store backends
//!
//! The server is generic over [`KeyValueStore`]. [`CreaseServerBuilder::build`]
//! picks the in-memory store; [`build_with`](CreaseServerBuilder::build_with)
//! takes any other backend.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use crease_protocol::{JsonCodec, ProtocolError, Recipient, Room, RoomCode, ServerEvent};
use crease_room::{AuctionConfig, AuctionCoordinator, AuctionSignal, RoomCoordinator};
use crease_store::{KeyValueStore, MemoryStore, SessionStore, StoreConfig};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, trace, warn};

use crate::handler::handle_connection;
use crate::hub::Hub;
use crate::transport::WebSocketTransport;
use crate::{CreaseError, ServerConfig};

/// Shared server state passed to each connection task.
///
/// `store` is the same `Arc` both coordinators hold, so a room written by
/// one is immediately visible to the other and to `broadcast_code`.
pub(crate) struct ServerState<S: KeyValueStore> {
    pub(crate) store: Arc<SessionStore<S>>,
    pub(crate) rooms: RoomCoordinator<S>,
    pub(crate) auction: AuctionCoordinator<S>,
    pub(crate) hub: Hub,
    pub(crate) codec: JsonCodec,
    pub(crate) config: ServerConfig,
}

impl<S: KeyValueStore> ServerState<S> {
    /// Sends `event` to the sockets of `room` that `recipient` selects.
    pub(crate) async fn broadcast(
        &self,
        room: &Room,
        recipient: Recipient,
        event: &ServerEvent,
    ) -> Result<usize, ProtocolError> {
        self.hub.broadcast(room, &recipient, event).await
    }

    /// Like [`broadcast`](Self::broadcast) for a room known only by code.
    /// A room that no longer exists reaches nobody.
    pub(crate) async fn broadcast_code(
        &self,
        code: &RoomCode,
        recipient: Recipient,
        event: &ServerEvent,
    ) -> Result<usize, CreaseError> {
        match self.store.room(code).await? {
            Some(room) => Ok(self.broadcast(&room, recipient, event).await?),
            None => {
                trace!(%code, event = event.name(), "room gone, broadcast skipped");
                Ok(0)
            }
        }
    }
}

/// Builder for configuring and starting a Crease server.
///
/// # Example
///
/// ```rust,ignore
/// use crease::prelude::*;
///
/// let server = CreaseServer::builder()
///     .bind("0.0.0.0:3001")
///     .build()
///     .await?;
/// server.run().await
/// ```
pub struct CreaseServerBuilder {
    config: ServerConfig,
}

impl CreaseServerBuilder {
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
        }
    }

    /// Replaces the whole configuration, e.g. one read from the environment.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.config.idle_timeout = timeout;
        self
    }

    pub fn auction_config(mut self, config: AuctionConfig) -> Self {
        self.config.auction = config;
        self
    }

    pub fn store_config(mut self, config: StoreConfig) -> Self {
        self.config.store = config;
        self
    }

    /// Binds the listener with an in-memory store.
    pub async fn build(self) -> Result<CreaseServer<MemoryStore>, CreaseError> {
        self.build_with(MemoryStore::new()).await
    }

    /// Binds the listener with `backend` as the store.
    pub async fn build_with<S: KeyValueStore>(
        self,
        backend: S,
    ) -> Result<CreaseServer<S>, CreaseError> {
        let config = self.config;
        let transport = WebSocketTransport::bind(&config.bind_addr).await?;

        let store = Arc::new(SessionStore::new(backend, config.store.clone()));
        let rooms = RoomCoordinator::new(Arc::clone(&store), config.room.clone());
        let (auction, signals) = AuctionCoordinator::new(Arc::clone(&store), config.auction.clone());

        let state = Arc::new(ServerState {
            store,
            rooms,
            auction,
            hub: Hub::new(),
            codec: JsonCodec,
            config,
        });

        Ok(CreaseServer {
            transport,
            state,
            signals,
        })
    }
}

impl Default for CreaseServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Crease server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct CreaseServer<S: KeyValueStore = MemoryStore> {
    transport: WebSocketTransport,
    state: Arc<ServerState<S>>,
    signals: mpsc::UnboundedReceiver<AuctionSignal>,
}

impl CreaseServer<MemoryStore> {
    pub fn builder() -> CreaseServerBuilder {
        CreaseServerBuilder::new()
    }
}

impl<S: KeyValueStore> CreaseServer<S> {
    pub fn local_addr(&self) -> Result<SocketAddr, CreaseError> {
        Ok(self.transport.local_addr()?)
    }

    /// Runs the accept loop until the future is dropped.
    ///
    /// Restarts the clocks of auctions caught mid-round first. Each
    /// connection gets its own task; the WebSocket upgrade happens there.
    pub async fn run(self) -> Result<(), CreaseError> {
        let Self {
            transport,
            state,
            signals,
        } = self;

        match state.auction.recover_countdowns().await {
            Ok(0) => {}
            Ok(n) => info!(countdowns = n, "auction clocks resumed"),
            Err(e) => warn!(error = %e, "auction recovery failed"),
        }

        let _background = Background(vec![
            tokio::spawn(forward_signals(Arc::clone(&state), signals)),
            tokio::spawn(sweep(Arc::clone(&state))),
        ]);

        info!(addr = %transport.local_addr()?, "Crease server running");

        loop {
            match transport.accept().await {
                Ok((stream, addr)) => {
                    let state = Arc::clone(&state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, addr, state).await {
                            debug!(%addr, error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    error!(error = %e, "accept failed");
                }
            }
        }
    }
}

/// Aborts the background tasks when the server loop goes away.
struct Background(Vec<JoinHandle<()>>);

impl Drop for Background {
    fn drop(&mut self) {
        for handle in &self.0 {
            handle.abort();
        }
    }
}

/// Broadcasts every countdown signal to its room.
async fn forward_signals<S: KeyValueStore>(
    state: Arc<ServerState<S>>,
    mut signals: mpsc::UnboundedReceiver<AuctionSignal>,
) {
    while let Some(signal) = signals.recv().await {
        let (code, event) = signal.into_event();
        if let Err(e) = state.broadcast_code(&code, Recipient::All, &event).await {
            warn!(%code, event = event.name(), error = %e, "auction signal not delivered");
        }
    }
}

/// Drops expired store keys every `sweep_interval`.
async fn sweep<S: KeyValueStore>(state: Arc<ServerState<S>>) {
    let mut interval = tokio::time::interval(state.config.store.sweep_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        interval.tick().await;
        let purged = state.store.purge_expired().await;
        if purged > 0 {
            debug!(purged, "expired keys swept");
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
