//! Channel connection management.
//!
//! Owns the persistent WebSocket connection to the collaboration endpoint.
//! The channel task dials, splits the socket, and pumps frames in both
//! directions inside a single `tokio::select!` loop; on any close or error
//! it marks the connection state disconnected and retries after a fixed
//! delay, forever. There is no retry cap and no backoff growth.
//!
//! Outbound sends are fire-and-forget: `send` is a silent no-op while the
//! channel is down. Callers check `is_connected` and fall back to the REST
//! path for mutations.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc, watch};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use super::protocol::{ClientMessage, EditorProtocol, ServerMessage};

/// Configuration for the collaboration channel
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// WebSocket endpoint, e.g. `wss://host/ws/shop-editor`
    pub url: String,
    /// Delay between reconnection attempts
    pub reconnect_delay: Duration,
}

impl ChannelConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            reconnect_delay: super::RECONNECT_DELAY,
        }
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }
}

/// Process-wide connection state, published over a watch channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connected,
    Disconnected,
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }
}

/// Handle to the running channel task
pub struct Connection {
    outbound_tx: mpsc::UnboundedSender<ClientMessage>,
    state_rx: watch::Receiver<ConnectionState>,
    shutdown_tx: broadcast::Sender<()>,
}

impl Connection {
    /// Whether the channel is currently open
    pub fn is_connected(&self) -> bool {
        self.state_rx.borrow().is_connected()
    }

    /// Subscribe to connection state changes (status indicator)
    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    /// Send a protocol message. No-op while disconnected; never errors.
    pub fn send(&self, msg: ClientMessage) {
        if !self.is_connected() {
            debug!("Channel down, dropping outbound {:?}", msg);
            return;
        }
        if self.outbound_tx.send(msg).is_err() {
            debug!("Channel task gone, dropping outbound message");
        }
    }

    /// Stop the channel task and close the socket
    pub fn close(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// A handle whose channel never connects, for exercising fallback paths.
    #[cfg(test)]
    pub(crate) fn stub_disconnected() -> Self {
        let (outbound_tx, _outbound_rx) = mpsc::unbounded_channel();
        let (_state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            outbound_tx,
            state_rx,
            shutdown_tx,
        }
    }
}

/// Open the collaboration channel and spawn its task. Decoded inbound
/// events are forwarded to `events_tx`; undecodable frames are dropped.
pub fn connect(config: ChannelConfig, events_tx: mpsc::UnboundedSender<ServerMessage>) -> Connection {
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

    tokio::spawn(run_channel(
        config,
        outbound_rx,
        events_tx,
        state_tx,
        shutdown_rx,
    ));

    Connection {
        outbound_tx,
        state_rx,
        shutdown_tx,
    }
}

async fn run_channel(
    config: ChannelConfig,
    mut outbound_rx: mpsc::UnboundedReceiver<ClientMessage>,
    events_tx: mpsc::UnboundedSender<ServerMessage>,
    state_tx: watch::Sender<ConnectionState>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    loop {
        match connect_async(config.url.as_str()).await {
            Ok((socket, _)) => {
                info!("Channel connected: {}", config.url);
                let _ = state_tx.send(ConnectionState::Connected);

                // Anything enqueued during the race between the state flip
                // and the session loop belongs to the dead session: drop it.
                while outbound_rx.try_recv().is_ok() {}

                let (mut sink, mut stream) = socket.split();

                loop {
                    tokio::select! {
                        maybe = outbound_rx.recv() => {
                            let Some(msg) = maybe else {
                                debug!("Connection handle dropped, channel task ending");
                                let _ = state_tx.send(ConnectionState::Disconnected);
                                return;
                            };
                            match EditorProtocol::encode_client(&msg) {
                                Ok(text) => {
                                    if sink.send(Message::Text(text)).await.is_err() {
                                        break;
                                    }
                                }
                                Err(e) => warn!("Failed to encode message: {}", e),
                            }
                        }
                        frame = stream.next() => {
                            match frame {
                                Some(Ok(Message::Text(text))) => {
                                    match EditorProtocol::decode_server(&text) {
                                        Ok(event) => {
                                            if events_tx.send(event).is_err() {
                                                debug!("Event consumer gone, channel task ending");
                                                let _ = state_tx.send(ConnectionState::Disconnected);
                                                return;
                                            }
                                        }
                                        // Unknown or malformed frames are dropped.
                                        Err(e) => debug!("Dropping inbound frame: {}", e),
                                    }
                                }
                                Some(Ok(Message::Close(_))) | None => {
                                    info!("Channel closed by server");
                                    break;
                                }
                                Some(Ok(_)) => {}
                                Some(Err(e)) => {
                                    warn!("Channel error: {}", e);
                                    break;
                                }
                            }
                        }
                        _ = shutdown_rx.recv() => {
                            debug!("Channel task shutting down");
                            let _ = sink.send(Message::Close(None)).await;
                            let _ = state_tx.send(ConnectionState::Disconnected);
                            return;
                        }
                    }
                }

                let _ = state_tx.send(ConnectionState::Disconnected);
            }
            Err(e) => {
                warn!("Channel connect failed: {}", e);
            }
        }

        // Fixed-interval retry, repeated indefinitely.
        tokio::select! {
            _ = tokio::time::sleep(config.reconnect_delay) => {}
            _ = shutdown_rx.recv() => {
                debug!("Channel task shutting down while disconnected");
                return;
            }
        }
    }
}
