use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::api::PushTransport;
use crate::constants::{RECONNECT_BASE_DELAY_MS, RECONNECT_MAX_DELAY_MS};

use super::types::{ConnectionState, PushEvent};

/// Owns the lifecycle of the one persistent push connection.
///
/// State machine: `disconnected -> connecting -> connected`, with
/// `connected -> reconnecting -> connected|disconnected` on transport loss and
/// `* -> disconnected` on an explicit close intent. At most one connection
/// task runs at a time; connection failures never surface as errors, only as
/// connectivity state.
pub struct ConnectionManager {
    transport: Arc<dyn PushTransport>,
    event_tx: mpsc::Sender<PushEvent>,
    state_tx: Arc<watch::Sender<ConnectionState>>,
    shutdown_tx: parking_lot::Mutex<Option<watch::Sender<bool>>>,
    task: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

impl ConnectionManager {
    pub fn new(transport: Arc<dyn PushTransport>, event_tx: mpsc::Sender<PushEvent>) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            transport,
            event_tx,
            state_tx: Arc::new(state_tx),
            shutdown_tx: parking_lot::Mutex::new(None),
            task: parking_lot::Mutex::new(None),
        }
    }

    /// Watchable connectivity state for UI/runtime consumers
    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    pub fn current_state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    /// Start the connection task. No-op if already connecting/connected.
    pub fn connect(&self) {
        if self.current_state() != ConnectionState::Disconnected {
            tracing::debug!("connect: connection already active, ignoring");
            return;
        }
        // Each connection task owns a fresh shutdown channel, so a disconnect
        // aimed at an earlier task can never be un-signalled by this connect.
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        self.state_tx.send_replace(ConnectionState::Connecting);

        let transport = self.transport.clone();
        let event_tx = self.event_tx.clone();
        let state_tx = self.state_tx.clone();
        let handle = tokio::spawn(run_connection(transport, event_tx, state_tx, shutdown_rx));
        *self.shutdown_tx.lock() = Some(shutdown_tx);
        *self.task.lock() = Some(handle);
    }

    /// Close intent: immediately transitions to disconnected and suppresses
    /// any pending reconnection attempt.
    pub fn disconnect(&self) {
        if let Some(shutdown) = self.shutdown_tx.lock().take() {
            let _ = shutdown.send(true);
        }
        self.state_tx.send_replace(ConnectionState::Disconnected);
        // The task observes its shutdown channel and exits on its own.
        self.task.lock().take();
        tracing::info!("push connection closed by explicit disconnect");
    }
}

/// Resolves once an explicit shutdown has been signalled (or the manager
/// itself is gone).
async fn wait_for_shutdown(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow() {
            return;
        }
        if rx.changed().await.is_err() {
            return;
        }
    }
}

fn backoff_delay(attempt: u32) -> Duration {
    // 1s, 2s, 4s, ... capped at RECONNECT_MAX_DELAY_MS
    let ms = RECONNECT_BASE_DELAY_MS
        .saturating_mul(1u64 << attempt.min(16))
        .min(RECONNECT_MAX_DELAY_MS);
    Duration::from_millis(ms)
}

async fn run_connection(
    transport: Arc<dyn PushTransport>,
    event_tx: mpsc::Sender<PushEvent>,
    state_tx: Arc<watch::Sender<ConnectionState>>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut attempt: u32 = 0;
    loop {
        if *shutdown_rx.borrow() {
            return;
        }

        let connected = tokio::select! {
            biased;
            _ = wait_for_shutdown(&mut shutdown_rx) => return,
            result = transport.connect() => result,
        };

        match connected {
            Ok(mut stream) => {
                attempt = 0;
                state_tx.send_replace(ConnectionState::Connected);
                tracing::info!("push connection established");

                if !pump_events(&mut stream, &event_tx, &mut shutdown_rx).await {
                    // Receiver side is gone; nobody is left to observe events.
                    state_tx.send_replace(ConnectionState::Disconnected);
                    return;
                }
                if *shutdown_rx.borrow() {
                    return;
                }
                state_tx.send_replace(ConnectionState::Reconnecting);
                tracing::warn!("push connection lost, scheduling reconnect");
            }
            Err(e) => {
                // Stay in connecting/reconnecting; failures are absorbed here
                // and only visible as connectivity state.
                tracing::warn!(error = %e, "push connection attempt failed");
            }
        }

        let delay = backoff_delay(attempt);
        attempt = attempt.saturating_add(1);
        tokio::select! {
            biased;
            _ = wait_for_shutdown(&mut shutdown_rx) => return,
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

/// Forward events until the stream ends. Returns false when the event
/// receiver has been dropped.
async fn pump_events(
    stream: &mut crate::api::PushStream,
    event_tx: &mpsc::Sender<PushEvent>,
    shutdown_rx: &mut watch::Receiver<bool>,
) -> bool {
    loop {
        // Shutdown wins over a buffered event: once disconnect has been
        // signalled, nothing further from this stream may be forwarded.
        tokio::select! {
            biased;
            _ = wait_for_shutdown(shutdown_rx) => return true,
            item = stream.next() => match item {
                Some(event) => {
                    if event_tx.send(event).await.is_err() {
                        tracing::debug!("push event receiver dropped, closing connection");
                        return false;
                    }
                }
                None => return true,
            },
        }
    }
}
