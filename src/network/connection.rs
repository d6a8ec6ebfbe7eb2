//! WebSocket Connection Manager
//!
//! Owns the single live connection of a client process. The first connect
//! attempt reports failure to the caller; once a connection has opened, every
//! later failure is handled by the reconnect loop and surfaced only through
//! [`ConnectionStatus`] and the event bus.
//!
//! One driver task per manager reads frames, decodes them and routes them into
//! the entity store, so the store has exactly one writer. Each opened
//! connection gets a new generation; frames still queued from a superseded
//! connection are dropped.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::SEC_WEBSOCKET_PROTOCOL;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, instrument, warn};

use crate::network::backoff::{Backoff, DEFAULT_BASE_DELAY, DEFAULT_MAX_ATTEMPTS};
use crate::network::codec::{self, CodecError};
use crate::network::protocol::{Command, Envelope};
use crate::network::storage::LocalStore;
use crate::sync::events::{EventBus, SyncEvent};
use crate::sync::store::EntityStore;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connection lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConnectionState {
    /// Handshake in progress.
    Connecting,
    /// Connection open.
    Open,
    /// No connection, and none scheduled.
    Closed,
    /// Lost; waiting out a backoff delay or retrying.
    Reconnecting,
}

/// Snapshot of the connection lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConnectionStatus {
    /// Current state.
    pub state: ConnectionState,
    /// Reconnect attempts since the last successful open.
    pub reconnect_attempt: u32,
    /// Generation of the most recently opened connection (0 before the first).
    pub generation: u64,
}

impl Default for ConnectionStatus {
    fn default() -> Self {
        Self {
            state: ConnectionState::Closed,
            reconnect_attempt: 0,
            generation: 0,
        }
    }
}

/// Connection configuration.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// WebSocket URL.
    pub endpoint: String,
    /// `Sec-WebSocket-Protocol` value; empty to send none.
    pub subprotocol: String,
    /// Credential token sent in the authenticate handshake.
    pub auth_token: String,
    /// Timeout for a single connection attempt.
    pub connect_timeout: Duration,
    /// Backoff base delay.
    pub backoff_base: Duration,
    /// Reconnect attempts before giving up for the session.
    pub max_reconnect_attempts: u32,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            endpoint: "ws://127.0.0.1:8080".to_string(),
            subprotocol: "geostrike-v1".to_string(),
            auth_token: String::new(),
            connect_timeout: Duration::from_secs(10),
            backoff_base: DEFAULT_BASE_DELAY,
            max_reconnect_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

/// Connection errors.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Handshake did not finish in time.
    #[error("connection attempt timed out after {0:?}")]
    Timeout(Duration),

    /// Sub-protocol is not a valid header value.
    #[error("invalid sub-protocol: {0}")]
    InvalidSubprotocol(String),

    /// `connect` called while a connection is live or reconnecting.
    #[error("already connected")]
    AlreadyConnected,

    /// No open connection to send on.
    #[error("not connected")]
    NotConnected,

    /// `shutdown` ran while the connection was being opened.
    #[error("connect cancelled by shutdown")]
    Cancelled,

    /// Command could not be encoded.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// State shared between the manager handle and its driver task.
struct Shared {
    config: ConnectionConfig,
    status: RwLock<ConnectionStatus>,
    store: Arc<EntityStore>,
    bus: EventBus,
    local: Arc<LocalStore>,
}

impl Shared {
    fn status(&self) -> ConnectionStatus {
        *self.status.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn transition(&self, state: ConnectionState, reconnect_attempt: u32) -> ConnectionStatus {
        let status = {
            let mut status = self.status.write().unwrap_or_else(PoisonError::into_inner);
            status.state = state;
            status.reconnect_attempt = reconnect_attempt;
            *status
        };
        self.announce(status);
        status
    }

    /// Move `Closed -> Connecting`. Fails if any other state holds the slot.
    fn claim(&self) -> bool {
        let status = {
            let mut status = self.status.write().unwrap_or_else(PoisonError::into_inner);
            if status.state != ConnectionState::Closed {
                return false;
            }
            status.state = ConnectionState::Connecting;
            status.reconnect_attempt = 0;
            *status
        };
        self.announce(status);
        true
    }

    /// Record a successful open from state `from`: new generation, attempt
    /// counter back to zero. `None` if the state moved on meanwhile.
    fn opened(&self, from: ConnectionState) -> Option<u64> {
        let status = {
            let mut status = self.status.write().unwrap_or_else(PoisonError::into_inner);
            if status.state != from {
                return None;
            }
            status.state = ConnectionState::Open;
            status.reconnect_attempt = 0;
            status.generation += 1;
            *status
        };
        self.announce(status);
        Some(status.generation)
    }

    fn announce(&self, status: ConnectionStatus) {
        debug!(
            state = ?status.state,
            attempt = status.reconnect_attempt,
            generation = status.generation,
            "connection state changed"
        );
        self.persist_health(status.state == ConnectionState::Open);
        self.bus.publish(SyncEvent::ConnectionStateChanged(status));
    }

    fn persist_health(&self, healthy: bool) {
        if let Err(e) = self.local.set_connection_healthy(healthy) {
            warn!(error = %e, "failed to persist connection health");
        }
    }
}

/// Open one WebSocket connection with the configured sub-protocol.
async fn open_socket(config: &ConnectionConfig) -> Result<Socket, ConnectionError> {
    let mut request = config.endpoint.as_str().into_client_request()?;
    if !config.subprotocol.is_empty() {
        let value = HeaderValue::from_str(&config.subprotocol)
            .map_err(|_| ConnectionError::InvalidSubprotocol(config.subprotocol.clone()))?;
        request.headers_mut().insert(SEC_WEBSOCKET_PROTOCOL, value);
    }

    let (socket, _response) = tokio::time::timeout(config.connect_timeout, connect_async(request))
        .await
        .map_err(|_| ConnectionError::Timeout(config.connect_timeout))??;

    Ok(socket)
}

/// Owner of the live connection.
pub struct ConnectionManager {
    shared: Arc<Shared>,
    outgoing: Mutex<Option<mpsc::UnboundedSender<Vec<u8>>>>,
    driver: Mutex<Option<JoinHandle<()>>>,
}

impl ConnectionManager {
    /// Create a manager. Nothing is opened until [`connect`](Self::connect).
    ///
    /// The persisted health flag is cleared, since no connection exists yet.
    pub fn new(
        config: ConnectionConfig,
        store: Arc<EntityStore>,
        bus: EventBus,
        local: Arc<LocalStore>,
    ) -> Self {
        let shared = Arc::new(Shared {
            config,
            status: RwLock::new(ConnectionStatus::default()),
            store,
            bus,
            local,
        });
        shared.persist_health(false);

        Self {
            shared,
            outgoing: Mutex::new(None),
            driver: Mutex::new(None),
        }
    }

    /// Current status.
    pub fn status(&self) -> ConnectionStatus {
        self.shared.status()
    }

    /// Open the connection and start the driver.
    ///
    /// Fails if the first attempt fails; there is no retry until a connection
    /// has opened at least once.
    #[instrument(skip(self), fields(endpoint = %self.shared.config.endpoint))]
    pub async fn connect(&self) -> Result<(), ConnectionError> {
        // Claimed before the first await, so a concurrent call sees Connecting.
        if !self.shared.claim() {
            return Err(ConnectionError::AlreadyConnected);
        }

        let socket = match open_socket(&self.shared.config).await {
            Ok(socket) => socket,
            Err(e) => {
                error!(error = %e, "initial connection failed");
                self.shared.transition(ConnectionState::Closed, 0);
                return Err(e);
            }
        };

        let Some(generation) = self.shared.opened(ConnectionState::Connecting) else {
            info!("shut down while connecting; dropping socket");
            return Err(ConnectionError::Cancelled);
        };
        info!(generation, "connected");

        let (tx, rx) = mpsc::unbounded_channel();
        *lock(&self.outgoing) = Some(tx);

        let driver = Driver::new(self.shared.clone(), rx);
        let handle = tokio::spawn(driver.run(socket, generation));
        if let Some(previous) = lock(&self.driver).replace(handle) {
            previous.abort();
        }

        Ok(())
    }

    /// Queue an envelope on the open connection.
    pub fn send(&self, envelope: &Envelope) -> Result<(), ConnectionError> {
        if self.status().state != ConnectionState::Open {
            return Err(ConnectionError::NotConnected);
        }
        let bytes = codec::encode(envelope)?;
        match lock(&self.outgoing).as_ref() {
            Some(tx) => tx.send(bytes).map_err(|_| ConnectionError::NotConnected),
            None => Err(ConnectionError::NotConnected),
        }
    }

    /// Tear down the connection and cancel any pending reconnect.
    /// Unsent commands are dropped.
    pub fn shutdown(&self) {
        *lock(&self.outgoing) = None;
        if let Some(driver) = lock(&self.driver).take() {
            driver.abort();
            info!("connection shut down");
        }
        if self.status().state != ConnectionState::Closed {
            self.shared.transition(ConnectionState::Closed, 0);
        }
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        if let Some(driver) = lock(&self.driver).take() {
            driver.abort();
        }
        self.shared.persist_health(false);
    }
}

// =============================================================================
// DRIVER
// =============================================================================

/// Frame or loss notice from a connection's reader task.
#[derive(Debug)]
enum Inbound {
    Frame { generation: u64, message: Message },
    Lost { generation: u64, reason: String },
}

impl Inbound {
    fn generation(&self) -> u64 {
        match self {
            Self::Frame { generation, .. } | Self::Lost { generation, .. } => *generation,
        }
    }
}

/// Why a connection stopped being pumped.
#[derive(Debug)]
enum Exit {
    /// The manager dropped its command sender.
    Shutdown,
    /// The connection failed or was closed by the server.
    Lost(String),
}

/// Aborts a task when dropped, so aborting the driver also stops its reader.
struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

async fn read_frames(
    mut stream: SplitStream<Socket>,
    generation: u64,
    tx: mpsc::UnboundedSender<Inbound>,
) {
    while let Some(item) = stream.next().await {
        match item {
            Ok(message) => {
                if tx.send(Inbound::Frame { generation, message }).is_err() {
                    return;
                }
            }
            Err(e) => {
                let _ = tx.send(Inbound::Lost { generation, reason: e.to_string() });
                return;
            }
        }
    }
    let _ = tx.send(Inbound::Lost { generation, reason: "stream ended".to_string() });
}

struct Driver {
    shared: Arc<Shared>,
    commands: mpsc::UnboundedReceiver<Vec<u8>>,
    inbound_tx: mpsc::UnboundedSender<Inbound>,
    inbound_rx: mpsc::UnboundedReceiver<Inbound>,
}

impl Driver {
    fn new(shared: Arc<Shared>, commands: mpsc::UnboundedReceiver<Vec<u8>>) -> Self {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        Self {
            shared,
            commands,
            inbound_tx,
            inbound_rx,
        }
    }

    async fn run(mut self, mut socket: Socket, mut generation: u64) {
        loop {
            match self.pump(socket, generation).await {
                Exit::Shutdown => {
                    info!(generation, "command channel closed; stopping");
                    self.shared.transition(ConnectionState::Closed, 0);
                    return;
                }
                Exit::Lost(reason) => {
                    warn!(generation, %reason, "connection lost");
                }
            }

            let mut dropped = 0usize;
            while self.commands.try_recv().is_ok() {
                dropped += 1;
            }
            if dropped > 0 {
                debug!(dropped, "dropped commands queued for the lost connection");
            }

            match self.reconnect().await {
                Some((next_socket, next_generation)) => {
                    socket = next_socket;
                    generation = next_generation;
                }
                None => return,
            }
        }
    }

    async fn reconnect(&mut self) -> Option<(Socket, u64)> {
        let config = &self.shared.config;
        let mut backoff = Backoff::new(config.backoff_base, config.max_reconnect_attempts);

        loop {
            let Some(delay) = backoff.next_delay() else {
                error!(
                    attempts = backoff.attempt(),
                    "reconnect budget exhausted; connection closed for this session"
                );
                self.shared.transition(ConnectionState::Closed, backoff.attempt());
                return None;
            };

            self.shared.transition(ConnectionState::Reconnecting, backoff.attempt());
            info!(attempt = backoff.attempt(), ?delay, "scheduling reconnect");
            tokio::time::sleep(delay).await;

            match open_socket(config).await {
                Ok(socket) => {
                    let generation = self.shared.opened(ConnectionState::Reconnecting)?;
                    info!(generation, attempts = backoff.attempt(), "reconnected");
                    return Some((socket, generation));
                }
                Err(e) => {
                    warn!(attempt = backoff.attempt(), error = %e, "reconnect attempt failed");
                }
            }
        }
    }

    async fn pump(&mut self, socket: Socket, generation: u64) -> Exit {
        let (mut sink, stream) = socket.split();
        let reader = read_frames(stream, generation, self.inbound_tx.clone());
        let _reader = AbortOnDrop(tokio::spawn(reader));
        let mut greeted = false;

        loop {
            tokio::select! {
                inbound = self.inbound_rx.recv() => {
                    let Some(inbound) = inbound else {
                        return Exit::Lost("inbound channel closed".to_string());
                    };
                    if inbound.generation() != generation {
                        debug!(
                            stale = inbound.generation(),
                            current = generation,
                            "dropping frame from superseded connection"
                        );
                        continue;
                    }
                    let bytes = match inbound {
                        Inbound::Lost { reason, .. } => return Exit::Lost(reason),
                        Inbound::Frame { message, .. } => match message {
                            Message::Binary(bytes) => bytes,
                            Message::Text(text) => text.into_bytes(),
                            Message::Close(frame) => {
                                return Exit::Lost(format!("closed by server: {:?}", frame));
                            }
                            Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => continue,
                        },
                    };

                    if !greeted {
                        greeted = true;
                        if let Err(e) = self.authenticate(&mut sink).await {
                            return Exit::Lost(e.to_string());
                        }
                    }
                    self.handle_frame(&bytes, generation);
                }
                command = self.commands.recv() => {
                    let Some(bytes) = command else {
                        let _ = sink.close().await;
                        return Exit::Shutdown;
                    };
                    if let Err(e) = sink.send(Message::Binary(bytes)).await {
                        return Exit::Lost(e.to_string());
                    }
                }
            }
        }
    }

    async fn authenticate(
        &self,
        sink: &mut SplitSink<Socket, Message>,
    ) -> Result<(), ConnectionError> {
        let token = self.shared.config.auth_token.clone();
        let envelope = Envelope::single(Command::authenticate(token));
        let bytes = codec::encode(&envelope)?;
        sink.send(Message::Binary(bytes)).await?;
        debug!("sent authenticate handshake");
        Ok(())
    }

    fn handle_frame(&self, bytes: &[u8], generation: u64) {
        let decoded = match codec::decode(bytes) {
            Ok(decoded) => decoded,
            Err(e) => {
                warn!(
                    error = %e,
                    len = bytes.len(),
                    prefix = %hex::encode(&bytes[..bytes.len().min(16)]),
                    "discarding undecodable frame"
                );
                return;
            }
        };

        let format = decoded.format;
        let outcome = self.shared.store.apply(decoded.payload);
        if outcome.dropped > 0 {
            debug!(dropped = outcome.dropped, "ignored unrecognized entities");
        }
        if !outcome.updated.is_empty() {
            debug!(?format, kinds = ?outcome.updated, generation, "entities updated");
            self.shared.bus.publish(SyncEvent::EntitiesUpdated {
                kinds: outcome.updated,
                generation,
            });
        }
    }
}
