//! Feed session driver
//!
//! Owns the socket, the timers and the session machine. Socket readiness,
//! timer expiries and external control requests all funnel into one event
//! loop; each event is fully processed (state transition, command
//! execution, book mutation, snapshot publish) before the next one, so
//! book writes and snapshot reads never race.

use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, RwLock};
use tokio::time::Sleep;
use tracing::{debug, error, info, trace, warn};

use super::client::{FeedMessage, FeedSocket};
use super::state::{Command, SessionEvent, SessionMachine};
use crate::book::{DepthBook, DepthSnapshot};
use crate::config::Config;
use crate::credentials::{Credentials, CredentialsClient};
use crate::error::Result;
use crate::metrics::Metrics;
use crate::parser::{self, DecodedEvent};
use crate::subscription;

/// External control request for a running session.
#[derive(Debug, Clone, Copy)]
enum SessionControl {
    Connect,
    Disconnect,
}

/// Handle for controlling a running session from other tasks.
///
/// Dropping every handle requests a disconnect, so keep one alive for as
/// long as the session should run.
#[derive(Clone)]
pub struct SessionHandle {
    tx: mpsc::Sender<SessionControl>,
}

impl SessionHandle {
    /// Request a (re)connect. Idempotent while a session is live.
    pub async fn connect(&self) {
        if self.tx.send(SessionControl::Connect).await.is_err() {
            warn!("session is gone, connect request dropped");
        }
    }

    /// Tear the session down without scheduling a reconnect.
    pub async fn disconnect(&self) {
        if self.tx.send(SessionControl::Disconnect).await.is_err() {
            debug!("session already stopped");
        }
    }
}

/// A timer armed for a specific connection epoch.
struct ArmedTimer {
    epoch: u64,
    sleep: Pin<Box<Sleep>>,
}

impl ArmedTimer {
    fn after(epoch: u64, duration: Duration) -> Self {
        Self {
            epoch,
            sleep: Box::pin(tokio::time::sleep(duration)),
        }
    }
}

/// Manages the feed connection lifecycle and routes decoded updates into
/// the depth book.
pub struct ConnectionManager {
    config: Arc<Config>,
    machine: SessionMachine,
    socket: FeedSocket,
    credentials: CredentialsClient,
    book: Arc<RwLock<DepthBook>>,
    snapshots: watch::Sender<DepthSnapshot>,
    metrics: Arc<Metrics>,
    control: mpsc::Receiver<SessionControl>,
    watchdog: Option<ArmedTimer>,
    grace: Option<ArmedTimer>,
    reconnect: Option<ArmedTimer>,
}

impl ConnectionManager {
    /// Create a manager plus its control handle and snapshot receiver.
    pub fn new(
        config: Arc<Config>,
        book: Arc<RwLock<DepthBook>>,
        metrics: Arc<Metrics>,
    ) -> (Self, SessionHandle, watch::Receiver<DepthSnapshot>) {
        let (control_tx, control_rx) = mpsc::channel(8);
        let (snapshot_tx, snapshot_rx) = watch::channel(DepthSnapshot::default());
        let credentials = CredentialsClient::new(&config.config_endpoint);

        let manager = Self {
            config,
            machine: SessionMachine::new(),
            socket: FeedSocket::new(),
            credentials,
            book,
            snapshots: snapshot_tx,
            metrics,
            control: control_rx,
            watchdog: None,
            grace: None,
            reconnect: None,
        };

        (manager, SessionHandle { tx: control_tx }, snapshot_rx)
    }

    /// Run the session until an explicit disconnect brings it to rest.
    ///
    /// Reconnection is automatic: any socket close re-enters the connect
    /// sequence after the configured delay, indefinitely. A failed
    /// credential fetch aborts the attempt and leaves the session idle
    /// until the next external connect request.
    pub async fn run(mut self) -> Result<()> {
        info!("starting depth feed session");
        self.drive(SessionEvent::ConnectRequested).await;

        loop {
            if self.machine.is_stopped() && !self.socket.is_connected() {
                info!("depth feed session stopped");
                return Ok(());
            }

            let event = self.next_event().await;
            self.drive(event).await;
        }
    }

    /// Wait for the next session event from the socket, a timer or the
    /// control channel.
    async fn next_event(&mut self) -> SessionEvent {
        let socket_open = self.socket.is_connected();
        let watchdog_armed = self.watchdog.is_some();
        let grace_armed = self.grace.is_some();
        let reconnect_armed = self.reconnect.is_some();

        tokio::select! {
            control = self.control.recv() => match control {
                Some(SessionControl::Connect) => SessionEvent::ConnectRequested,
                Some(SessionControl::Disconnect) | None => SessionEvent::DisconnectRequested,
            },

            message = self.socket.recv(), if socket_open => match message {
                Ok(FeedMessage::Binary(data)) => {
                    self.metrics.messages_received.inc();
                    self.handle_binary(&data).await;
                    SessionEvent::MessageReceived
                }
                Ok(FeedMessage::Text(text)) => {
                    self.metrics.messages_received.inc();
                    debug!(%text, "server text message");
                    SessionEvent::MessageReceived
                }
                Ok(FeedMessage::Ping) => {
                    self.metrics.messages_received.inc();
                    SessionEvent::MessageReceived
                }
                Ok(FeedMessage::Closed { code }) => SessionEvent::SocketClosed { code },
                Err(e) => {
                    // transport errors are reported here; recovery rides
                    // the close path
                    error!(error = %e, "websocket error");
                    SessionEvent::SocketClosed { code: None }
                }
            },

            epoch = Self::expired(&mut self.watchdog), if watchdog_armed => {
                SessionEvent::WatchdogFired { epoch }
            }

            epoch = Self::expired(&mut self.grace), if grace_armed => {
                SessionEvent::GraceElapsed { epoch }
            }

            epoch = Self::expired(&mut self.reconnect), if reconnect_armed => {
                SessionEvent::ReconnectDue { epoch }
            }
        }
    }

    /// Resolve when the timer in `slot` expires, clearing the slot and
    /// yielding the epoch it was armed under.
    async fn expired(slot: &mut Option<ArmedTimer>) -> u64 {
        match slot {
            Some(timer) => {
                timer.sleep.as_mut().await;
                let epoch = timer.epoch;
                *slot = None;
                epoch
            }
            None => std::future::pending().await,
        }
    }

    /// Feed one event through the machine and execute the resulting
    /// commands, queueing any follow-up events they produce.
    async fn drive(&mut self, event: SessionEvent) {
        let mut queue = VecDeque::from([event]);

        while let Some(event) = queue.pop_front() {
            trace!(?event, state = ?self.machine.state(), "session event");
            for command in self.machine.handle(event) {
                queue.extend(self.apply(command).await);
            }
        }
    }

    /// Execute one command, returning any event it produces.
    async fn apply(&mut self, command: Command) -> Option<SessionEvent> {
        match command {
            Command::Connect { epoch } => Some(self.open_session(epoch).await),

            Command::SendUnsubscribeAll => {
                if let Err(e) = self.socket.send_control(&subscription::unsubscribe_all()).await {
                    warn!(error = %e, "failed to send unsubscribe-all");
                }
                None
            }

            Command::SendSubscribe => {
                let request = subscription::subscribe(&self.config.instruments());
                match self.socket.send_control(&request).await {
                    Ok(()) => {
                        info!(
                            exchange_segment = %self.config.exchange_segment,
                            security_id = %self.config.security_id,
                            "depth subscription sent"
                        );
                        Some(SessionEvent::SubscribeSent)
                    }
                    Err(e) => {
                        warn!(error = %e, "failed to send subscribe");
                        None
                    }
                }
            }

            Command::ArmWatchdog { epoch } => {
                self.watchdog = Some(ArmedTimer::after(epoch, self.config.watchdog_timeout()));
                None
            }

            Command::ArmGrace { epoch } => {
                self.grace = Some(ArmedTimer::after(epoch, self.config.subscribe_grace()));
                None
            }

            Command::ArmReconnect { epoch } => {
                debug!(
                    delay_ms = self.config.reconnect_delay_ms,
                    "reconnect scheduled"
                );
                self.reconnect = Some(ArmedTimer::after(epoch, self.config.reconnect_delay()));
                None
            }

            Command::CancelWatchdog => {
                self.watchdog = None;
                None
            }

            Command::CancelGrace => {
                self.grace = None;
                None
            }

            Command::CancelReconnect => {
                self.reconnect = None;
                None
            }

            Command::CloseSocket => {
                if self.socket.is_connected() {
                    self.socket.close().await;
                    Some(SessionEvent::SocketClosed { code: None })
                } else {
                    None
                }
            }

            Command::NoteEviction { code } => {
                warn!(
                    code,
                    "connection evicted: too many concurrent sessions for this credential"
                );
                self.metrics.evictions.inc();
                None
            }

            Command::NoteWatchdogTimeout => {
                warn!(
                    timeout_ms = self.config.watchdog_timeout_ms,
                    "no server activity within the watchdog window, closing connection"
                );
                self.metrics.watchdog_timeouts.inc();
                None
            }
        }
    }

    /// Fetch credentials and open the feed socket.
    async fn open_session(&mut self, epoch: u64) -> SessionEvent {
        if epoch > 1 {
            self.metrics.reconnects.inc();
        }

        let credentials = match self.credentials.fetch().await {
            Ok(credentials) => credentials,
            Err(e) => {
                error!(error = %e, "credential fetch failed, aborting connect attempt");
                return SessionEvent::ConnectFailed;
            }
        };

        let url = feed_url(&self.config.feed_endpoint, &credentials);
        match self.socket.connect(&url).await {
            Ok(()) => {
                info!(epoch, "depth feed connected");
                SessionEvent::SocketOpened
            }
            Err(e) => {
                error!(error = %e, "socket connect failed");
                // a failed open takes the same recovery path as a close
                SessionEvent::SocketClosed { code: None }
            }
        }
    }

    /// Decode one binary payload and apply its events to the book.
    async fn handle_binary(&mut self, data: &[u8]) {
        let events = match parser::decode_message(data) {
            Ok(events) => events,
            Err(e) => {
                warn!(len = data.len(), error = %e, "dropping malformed depth buffer");
                self.metrics.malformed_buffers.inc();
                return;
            }
        };

        let mut applied = false;
        {
            let mut book = self.book.write().await;
            for event in events {
                self.metrics.frames_decoded.inc();
                match event {
                    DecodedEvent::DisconnectNotice { code } => {
                        warn!(code, "server disconnect notice");
                        if code == subscription::EVICTION_CODE as i16 {
                            self.metrics.evictions.inc();
                        }
                    }
                    DecodedEvent::Unrecognized { feed_code } => {
                        trace!(feed_code, "unrecognized feed code");
                    }
                    update => {
                        applied |= book.apply(update);
                    }
                }
            }
        }

        if applied {
            let snapshot = self.book.read().await.snapshot();
            self.snapshots.send_replace(snapshot);
        }
    }
}

/// Feed endpoint with credential query parameters attached.
fn feed_url(endpoint: &str, credentials: &Credentials) -> String {
    format!(
        "{}?token={}&clientId={}&authType=2",
        endpoint, credentials.token, credentials.client_id
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feed_url_query() {
        let credentials = Credentials {
            token: "tok-1".to_string(),
            client_id: "client-1".to_string(),
        };
        assert_eq!(
            feed_url("wss://feed.example/twentydepth", &credentials),
            "wss://feed.example/twentydepth?token=tok-1&clientId=client-1&authType=2"
        );
    }
}
