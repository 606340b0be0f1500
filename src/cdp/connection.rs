//! CDP WebSocket connection implementation
//!
//! This module provides WebSocket-based connection to Chrome DevTools Protocol.
//! A writer task owns the sink and a reader task owns the stream; replies are
//! matched to pending commands by id and events go to the [`EventBus`].

use super::bus::EventBus;
use super::traits::{CdpEvent, Transport};
use super::types::*;
use crate::Error;
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Mutex, RwLock};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// CDP timeout configuration
#[derive(Debug, Clone)]
struct CdpTimeoutConfig {
    /// Default timeout for most commands
    default_timeout: Duration,
    /// Timeout for screenshot and PDF commands
    screenshot_timeout: Duration,
    /// Timeout for page navigation commands
    navigation_timeout: Duration,
}

impl CdpTimeoutConfig {
    fn new(default_timeout: Duration) -> Self {
        Self {
            default_timeout,
            screenshot_timeout: Duration::from_secs(90),
            navigation_timeout: Duration::from_secs(60),
        }
    }

    /// Reply deadline for a command method.
    ///
    /// Script execution awaits promises of arbitrary length, so it has none;
    /// the caller's token bounds it instead.
    fn timeout_for(&self, method: &str) -> Option<Duration> {
        match method {
            "Page.captureScreenshot" | "Page.printToPDF" => Some(self.screenshot_timeout),
            "Page.navigate" | "Page.reload" => Some(self.navigation_timeout),
            "Runtime.evaluate" | "Runtime.callFunctionOn" => None,
            _ => Some(self.default_timeout),
        }
    }
}

/// WebSocket connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connected,
    Disconnected,
    Closed,
}

/// Pending command response
#[derive(Debug)]
struct PendingCommand {
    /// Response channel sender
    sender: oneshot::Sender<CdpRpcResponse>,
    /// Command method (for logging)
    method: String,
}

type PendingMap = Arc<Mutex<HashMap<u64, PendingCommand>>>;

/// CDP WebSocket connection implementation
#[derive(Debug)]
pub struct CdpWebSocketConnection {
    /// WebSocket URL
    url: String,
    /// Outgoing frames, drained by the writer task
    outgoing: mpsc::UnboundedSender<Message>,
    /// Connection state
    state: Arc<RwLock<ConnectionState>>,
    /// Next command ID
    next_id: AtomicU64,
    /// Pending commands (ID -> response sender)
    pending_commands: PendingMap,
    /// Is connection active
    is_active: Arc<AtomicBool>,
    /// Stops both I/O tasks
    shutdown: CancellationToken,
    /// Timeout configuration
    timeout_config: CdpTimeoutConfig,
}

impl CdpWebSocketConnection {
    /// Connect to a browser-level DevTools endpoint
    ///
    /// # Arguments
    /// * `url` - WebSocket URL (e.g., "ws://localhost:9222/devtools/browser/ABC123")
    /// * `bus` - receives every event read from the socket; closed when the socket ends
    /// * `default_timeout` - reply deadline for commands without a specific one
    pub async fn connect<S: Into<String>>(
        url: S,
        bus: EventBus,
        default_timeout: Duration,
    ) -> Result<Arc<Self>, Error> {
        let url = url.into();
        info!("Connecting to WebSocket: {}", url);

        let (ws_stream, _) = connect_async(url.as_str())
            .await
            .map_err(|e| Error::websocket(format!("Failed to connect: {}", e)))?;
        let (mut sink, mut stream) = ws_stream.split();

        let (outgoing, mut outgoing_rx) = mpsc::unbounded_channel::<Message>();
        let pending_commands: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let is_active = Arc::new(AtomicBool::new(true));
        let state = Arc::new(RwLock::new(ConnectionState::Connected));
        let shutdown = CancellationToken::new();

        info!("WebSocket connection established");

        // Writer
        let writer_shutdown = shutdown.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = writer_shutdown.cancelled() => break,
                    message = outgoing_rx.recv() => {
                        let Some(message) = message else { break };
                        if let Err(e) = sink.send(message).await {
                            error!("Failed to send message: {}", e);
                            break;
                        }
                    }
                }
            }
            let _ = sink.close().await;
            debug!("WebSocket writer exited");
        });

        // Reader
        let reader_pending = Arc::clone(&pending_commands);
        let reader_active = Arc::clone(&is_active);
        let reader_state = Arc::clone(&state);
        let reader_shutdown = shutdown.clone();
        let pong = outgoing.clone();
        tokio::spawn(async move {
            loop {
                let message = tokio::select! {
                    _ = reader_shutdown.cancelled() => break,
                    message = stream.next() => message,
                };

                match message {
                    Some(Ok(Message::Text(text))) => {
                        Self::handle_message(&text, &reader_pending, &bus).await;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let _ = pong.send(Message::Pong(data));
                    }
                    Some(Ok(Message::Close(_))) => {
                        info!("WebSocket close frame received");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!("WebSocket error, deactivating connection: {}", e);
                        break;
                    }
                    None => {
                        warn!("WebSocket stream closed");
                        break;
                    }
                }
            }

            reader_active.store(false, Ordering::SeqCst);
            {
                let mut state = reader_state.write().await;
                if *state == ConnectionState::Connected {
                    *state = ConnectionState::Disconnected;
                }
            }
            // Dropping the senders fails every outstanding call
            reader_pending.lock().await.clear();
            reader_shutdown.cancel();
            bus.close();
            info!("WebSocket reader exited");
        });

        Ok(Arc::new(Self {
            url,
            outgoing,
            state,
            next_id: AtomicU64::new(1),
            pending_commands,
            is_active,
            shutdown,
            timeout_config: CdpTimeoutConfig::new(default_timeout),
        }))
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn state(&self) -> ConnectionState {
        *self.state.read().await
    }

    /// Handle incoming WebSocket text frame
    async fn handle_message(text: &str, pending_commands: &PendingMap, bus: &EventBus) {
        match CdpMessage::parse(text) {
            Some(CdpMessage::Response(response)) => {
                let pending = pending_commands.lock().await.remove(&response.id);
                match pending {
                    Some(cmd) => {
                        debug!("Received response for command {}: {}", response.id, cmd.method);
                        let _ = cmd.sender.send(response);
                    }
                    None => warn!("Received response for unknown command ID: {}", response.id),
                }
            }
            Some(CdpMessage::Notification(notification)) => {
                debug!("Received event: {}", notification.method);
                bus.publish(CdpEvent {
                    method: notification.method,
                    params: notification.params,
                    session_id: notification.session_id,
                });
            }
            None => warn!("Unknown message format: {}", text),
        }
    }
}

#[async_trait]
impl Transport for CdpWebSocketConnection {
    /// Send a CDP command and wait for its reply
    async fn call(
        &self,
        session_id: Option<&str>,
        method: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, Error> {
        if !self.is_active.load(Ordering::SeqCst) {
            return Err(Error::websocket("Connection is not active"));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let request = CdpRequest {
            id,
            method: method.to_string(),
            params,
            session_id: session_id.map(str::to_string),
        };
        let json = serde_json::to_string(&request)?;

        let (sender, receiver) = oneshot::channel();
        self.pending_commands.lock().await.insert(
            id,
            PendingCommand {
                sender,
                method: method.to_string(),
            },
        );

        debug!("Sending CDP command {}: {}", id, method);
        if self.outgoing.send(Message::Text(json)).is_err() {
            self.pending_commands.lock().await.remove(&id);
            return Err(Error::websocket("Connection is closed"));
        }

        let reply = match self.timeout_config.timeout_for(method) {
            Some(deadline) => match tokio::time::timeout(deadline, receiver).await {
                Ok(reply) => reply,
                Err(_) => {
                    self.pending_commands.lock().await.remove(&id);
                    return Err(Error::timeout(format!("Command {} ({}) timed out", id, method)));
                }
            },
            None => receiver.await,
        };

        match reply {
            Ok(response) => match response.error {
                Some(error) => Err(Error::cdp(error.code, error.message)),
                None => Ok(response.result),
            },
            Err(_) => Err(Error::websocket(format!(
                "Connection closed before reply to {}",
                method
            ))),
        }
    }

    /// Close the connection
    async fn close(&self) -> Result<(), Error> {
        info!("Closing CDP WebSocket connection");

        self.is_active.store(false, Ordering::SeqCst);
        let _ = self.outgoing.send(Message::Close(None));
        self.shutdown.cancel();

        *self.state.write().await = ConnectionState::Closed;
        Ok(())
    }

    /// Check if connection is active
    fn is_active(&self) -> bool {
        self.is_active.load(Ordering::SeqCst)
    }
}
