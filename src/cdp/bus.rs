//! Multicast event bus
//!
//! The browser-wide bus receives every notification the transport reads.
//! Pages derive session-scoped buses from it with [`EventBus::filter`]; each
//! wait primitive then takes its own [`EventStream`] tap. Every subscriber
//! sees every event published after it subscribed, in publish order. Taps
//! are unbounded, so a slow subscriber never loses events.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::traits::CdpEvent;

type Subscribers = Vec<mpsc::UnboundedSender<Arc<CdpEvent>>>;

/// Cloneable handle to a fan-out channel of events
#[derive(Debug, Clone, Default)]
pub struct EventBus {
    subscribers: Arc<Mutex<Subscribers>>,
    /// Fired once no more events will ever be published
    closed: CancellationToken,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn subscribers(&self) -> MutexGuard<'_, Subscribers> {
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Publish an event, returning how many subscribers will see it
    pub fn publish(&self, event: CdpEvent) -> usize {
        let mut subscribers = self.subscribers();
        if self.closed.is_cancelled() {
            return 0;
        }
        let event = Arc::new(event);
        // Dropped taps fail the send and leave the list here
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
        subscribers.len()
    }

    /// Take a new tap, alive until `token` is cancelled or the bus closes
    pub fn subscribe(&self, token: CancellationToken) -> EventStream {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut subscribers = self.subscribers();
        if !self.closed.is_cancelled() {
            subscribers.push(tx);
        }
        EventStream { rx, token }
    }

    /// Derive a bus carrying only the events matching `predicate`.
    ///
    /// The forwarding task stops when `token` is cancelled or this bus
    /// closes; either way the derived bus is closed.
    pub fn filter<F>(&self, token: CancellationToken, predicate: F) -> EventBus
    where
        F: Fn(&CdpEvent) -> bool + Send + 'static,
    {
        let derived = EventBus::new();
        let mut source = self.subscribe(token);
        let out = derived.clone();

        tokio::spawn(async move {
            while let Some(event) = source.next().await {
                if predicate(&event) {
                    out.forward(event);
                }
            }
            debug!("Event filter stopped");
            out.close();
        });

        derived
    }

    fn forward(&self, event: Arc<CdpEvent>) {
        let mut subscribers = self.subscribers();
        if !self.closed.is_cancelled() {
            subscribers.retain(|tx| tx.send(event.clone()).is_ok());
        }
    }

    /// Close the bus; subscribers drain what is buffered and then end
    pub fn close(&self) {
        self.closed.cancel();
        self.subscribers().clear();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Number of live taps
    pub fn receiver_count(&self) -> usize {
        let mut subscribers = self.subscribers();
        subscribers.retain(|tx| !tx.is_closed());
        subscribers.len()
    }
}

/// One subscriber's view of an [`EventBus`]
#[derive(Debug)]
pub struct EventStream {
    rx: mpsc::UnboundedReceiver<Arc<CdpEvent>>,
    token: CancellationToken,
}

impl EventStream {
    /// Next event, or `None` once the tap is cancelled or the bus is closed
    /// and drained
    pub async fn next(&mut self) -> Option<Arc<CdpEvent>> {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => None,
            event = self.rx.recv() => event,
        }
    }

    /// Whether the tap ended because its token was cancelled
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}
