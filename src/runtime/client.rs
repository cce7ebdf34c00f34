//! Public handle to a reconnecting client.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::warn;

use super::driver::{Command, Driver, Shared};
use super::event::{ClientEvent, ConnectionSnapshot, DebugSnapshot};
use super::state::ConnectOutcome;
use crate::adapter::{Connector, WebSocketConnector};
use crate::config::ClientConfig;
use crate::error::{Error, Result};

/// A message client that keeps its connection alive.
///
/// The connection is owned by a background task spawned on construction;
/// handles are cheap to clone and talk to it over a channel. The task stops
/// once every handle is dropped, closing any open connection with code 1000.
///
/// Failures never surface as `Err` from these methods. They are reported
/// as [`ClientEvent`]s to subscribers; `Err` only means the background task
/// is gone.
///
/// ```no_run
/// use resocket::config::ClientConfig;
/// use resocket::runtime::ReconnectingClient;
///
/// # async fn run() -> resocket::error::Result<()> {
/// let config = ClientConfig::new("ws://localhost:8000/ws/{client_id}");
/// let client = ReconnectingClient::websocket(config);
/// let mut events = client.subscribe();
/// client.connect().await?;
/// while let Ok(event) = events.recv().await {
///     println!("{event:?}");
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ReconnectingClient {
    commands: mpsc::UnboundedSender<Command>,
    shared: Arc<Shared>,
    events: broadcast::Sender<ClientEvent>,
}

impl std::fmt::Debug for ReconnectingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconnectingClient")
            .field("snapshot", &self.snapshot())
            .finish_non_exhaustive()
    }
}

impl ReconnectingClient {
    /// Spawn a client using `connector` to open transports.
    ///
    /// Must be called from within a tokio runtime. Nothing connects until
    /// [`ReconnectingClient::connect`] is called.
    pub fn spawn(config: ClientConfig, connector: impl Connector) -> Self {
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        let shared = Arc::new(Shared::default());

        let driver = Driver::new(
            config,
            Arc::new(connector),
            command_rx,
            events.clone(),
            Arc::clone(&shared),
        );
        tokio::spawn(driver.run());

        Self {
            commands,
            shared,
            events,
        }
    }

    /// Spawn a client that opens real WebSocket connections.
    pub fn websocket(config: ClientConfig) -> Self {
        Self::spawn(config, WebSocketConnector::new())
    }

    /// Start a connection attempt unless a gate rejects it.
    ///
    /// Resolves once the attempt has started or been skipped, not when the
    /// connection opens; watch for [`ClientEvent::Opened`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::ClientStopped`] if the background task has exited.
    pub async fn connect(&self) -> Result<ConnectOutcome> {
        self.request(Command::Connect).await
    }

    /// Close the connection, cancel every timer and reset reconnect state.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ClientStopped`] if the background task has exited.
    pub async fn disconnect(&self) -> Result<()> {
        self.request(Command::Disconnect).await
    }

    /// Disconnect, then connect again after the configured short delay.
    ///
    /// Works even after reconnect attempts have been exhausted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ClientStopped`] if the background task has exited.
    pub async fn force_reconnect(&self) -> Result<()> {
        self.request(Command::ForceReconnect).await
    }

    /// Enable or disable the client. Disabling disconnects; enabling
    /// requests a connection.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ClientStopped`] if the background task has exited.
    pub async fn set_enabled(&self, enabled: bool) -> Result<()> {
        self.request(|reply| Command::SetEnabled(enabled, reply)).await
    }

    /// Serialize `message` and write it to the open connection.
    ///
    /// Returns `true` only if the connection is open and the message was
    /// handed to it. Nothing is queued while disconnected.
    pub fn send<T: Serialize + ?Sized>(&self, message: &T) -> bool {
        let text = match serde_json::to_string(message) {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "Failed to encode outbound message");
                return false;
            }
        };
        self.shared.send_text(text)
    }

    /// Current connection state.
    #[must_use]
    pub fn snapshot(&self) -> ConnectionSnapshot {
        self.shared.snapshot()
    }

    /// Connection state plus diagnostics.
    #[must_use]
    pub fn debug_snapshot(&self) -> DebugSnapshot {
        self.shared.debug_snapshot()
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.snapshot().is_open()
    }

    /// Receive every event published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    async fn request<T>(&self, command: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(command(tx))
            .map_err(|_| Error::ClientStopped)?;
        rx.await.map_err(|_| Error::ClientStopped)
    }
}
