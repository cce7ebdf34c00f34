//! The task that owns a client's connection.
//!
//! Everything that mutates connection state happens here, one input at a
//! time: handle commands, transport events, timer firings and the results of
//! connection attempts. Attempts and timers carry the epoch they were started
//! in; anything arriving from an older epoch is ignored.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, trace, warn};

use super::breaker::BreakerCheck;
use super::event::{ClientEvent, ConnectionError, ConnectionSnapshot, DebugSnapshot};
use super::state::{AttemptOrigin, ConnectOutcome, ConnectionState, ReconnectPlan, SkipReason};
use super::timers::{TimerKind, TimerRegistry};
use crate::adapter::{Connector, Frame, Link, TransportEvent};
use crate::config::ClientConfig;
use crate::domain::client_id::render_url;
use crate::domain::message::{InboundMessage, OutboundMessage};
use crate::domain::{close, ClientId, ConnectionPhase};
use crate::error::Result;

/// Requests from a handle.
pub(crate) enum Command {
    Connect(oneshot::Sender<ConnectOutcome>),
    Disconnect(oneshot::Sender<()>),
    ForceReconnect(oneshot::Sender<()>),
    SetEnabled(bool, oneshot::Sender<()>),
}

#[derive(Debug, Clone, Copy)]
struct TimerFired {
    kind: TimerKind,
    epoch: u64,
}

struct Established {
    epoch: u64,
    result: Result<Link>,
}

/// State readable by handles without going through the driver.
#[derive(Debug, Default)]
pub(crate) struct Shared {
    published: RwLock<Published>,
    messages_sent: AtomicU64,
}

#[derive(Debug, Default)]
struct Published {
    debug: DebugSnapshot,
    /// Present exactly while the phase is open.
    outbound: Option<UnboundedSender<Frame>>,
}

impl Shared {
    pub(crate) fn snapshot(&self) -> ConnectionSnapshot {
        self.published.read().debug.connection
    }

    pub(crate) fn debug_snapshot(&self) -> DebugSnapshot {
        let mut debug = self.published.read().debug.clone();
        debug.messages_sent = self.messages_sent.load(Ordering::Relaxed);
        debug
    }

    /// Hand a text frame to the open transport.
    pub(crate) fn send_text(&self, text: String) -> bool {
        let published = self.published.read();
        let Some(outbound) = published.outbound.as_ref() else {
            return false;
        };
        if outbound.send(Frame::Text(text)).is_err() {
            return false;
        }
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
        true
    }
}

pub(crate) struct Driver {
    config: ClientConfig,
    connector: Arc<dyn Connector>,
    state: ConnectionState,
    timers: TimerRegistry,
    link: Option<Link>,
    /// In-flight connection attempt.
    pending: Option<JoinHandle<()>>,
    epoch: u64,

    commands: UnboundedReceiver<Command>,
    timer_tx: UnboundedSender<TimerFired>,
    timer_rx: UnboundedReceiver<TimerFired>,
    established_tx: UnboundedSender<Established>,
    established_rx: UnboundedReceiver<Established>,
    events: broadcast::Sender<ClientEvent>,
    shared: Arc<Shared>,

    url: Option<String>,
    client_id: Option<ClientId>,
    server_client_id: Option<String>,
    last_attempt_at: Option<DateTime<Utc>>,
    last_failure_at: Option<DateTime<Utc>>,
    last_heartbeat_at: Option<DateTime<Utc>>,
    messages_received: u64,
    last_emitted: Option<ConnectionSnapshot>,
}

impl Driver {
    pub(crate) fn new(
        config: ClientConfig,
        connector: Arc<dyn Connector>,
        commands: UnboundedReceiver<Command>,
        events: broadcast::Sender<ClientEvent>,
        shared: Arc<Shared>,
    ) -> Self {
        let (timer_tx, timer_rx) = mpsc::unbounded_channel();
        let (established_tx, established_rx) = mpsc::unbounded_channel();
        let state = ConnectionState::new(&config);
        let driver = Self {
            config,
            connector,
            state,
            timers: TimerRegistry::new(),
            link: None,
            pending: None,
            epoch: 0,
            commands,
            timer_tx,
            timer_rx,
            established_tx,
            established_rx,
            events,
            shared,
            url: None,
            client_id: None,
            server_client_id: None,
            last_attempt_at: None,
            last_failure_at: None,
            last_heartbeat_at: None,
            messages_received: 0,
            last_emitted: None,
        };
        driver.publish();
        driver
    }

    /// Process inputs until every handle has been dropped.
    pub(crate) async fn run(mut self) {
        debug!(connector = self.connector.name(), "Client driver started");
        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break,
                },
                Some(fired) = self.timer_rx.recv() => self.handle_timer(fired),
                Some(done) = self.established_rx.recv() => self.handle_established(done),
                event = next_link_event(&mut self.link) => self.handle_transport(event),
            }
        }
        self.disconnect("client dropped");
        debug!("Client driver stopped");
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Connect(reply) => {
                let outcome = self.try_connect(AttemptOrigin::Requested);
                let _ = reply.send(outcome);
            }
            Command::Disconnect(reply) => {
                self.disconnect("client disconnect");
                let _ = reply.send(());
            }
            Command::ForceReconnect(reply) => {
                self.force_reconnect();
                let _ = reply.send(());
            }
            Command::SetEnabled(enabled, reply) => {
                self.set_enabled(enabled);
                let _ = reply.send(());
            }
        }
    }

    // ---------------------------------------------------------------------
    // Connection attempts
    // ---------------------------------------------------------------------

    fn try_connect(&mut self, origin: AttemptOrigin) -> ConnectOutcome {
        let now = Instant::now();
        match self.state.gate(origin, now) {
            Err(reason) => {
                log_skip(origin, reason);
                self.publish_state();
                return ConnectOutcome::Skipped(reason);
            }
            Ok(BreakerCheck::Reset) => self.emit(ClientEvent::CircuitBreakerClosed),
            Ok(_) => {}
        }

        // A requested attempt supersedes any pending backoff.
        self.timers.cancel(TimerKind::Reconnect);
        self.epoch += 1;

        let client_id = ClientId::generate();
        let url = render_url(&self.config.url, &client_id);
        self.state.begin_attempt(now);
        self.last_attempt_at = Some(Utc::now());
        self.client_id = Some(client_id);
        self.url = Some(url.clone());
        self.server_client_id = None;

        info!(
            url = %url,
            attempt = self.state.reconnect_attempts(),
            epoch = self.epoch,
            "Connecting"
        );

        let connector = Arc::clone(&self.connector);
        let tx = self.established_tx.clone();
        let epoch = self.epoch;
        let target = url.clone();
        self.pending = Some(tokio::spawn(async move {
            let result = connector.connect(&target).await;
            let _ = tx.send(Established { epoch, result });
        }));
        self.timers.schedule_once(
            TimerKind::ConnectTimeout,
            self.config.connect_timeout(),
            self.timer_tx.clone(),
            TimerFired {
                kind: TimerKind::ConnectTimeout,
                epoch,
            },
        );

        self.publish_state();
        ConnectOutcome::Started { url }
    }

    fn handle_established(&mut self, done: Established) {
        if done.epoch != self.epoch || self.state.phase() != ConnectionPhase::Connecting {
            debug!(epoch = done.epoch, "Discarding stale connection result");
            if let Ok(link) = done.result {
                link.close(close::NORMAL, "superseded");
            }
            return;
        }

        self.pending = None;
        self.timers.cancel(TimerKind::ConnectTimeout);
        match done.result {
            Ok(link) => self.on_open(link),
            Err(e) => self.on_failure(ConnectionError::ConnectFailed {
                reason: e.to_string(),
            }),
        }
    }

    fn on_open(&mut self, link: Link) {
        self.state.on_open();
        self.link = Some(link);

        if let Some(period) = self.config.ping_interval() {
            self.timers.schedule_interval(
                TimerKind::Ping,
                period,
                self.timer_tx.clone(),
                TimerFired {
                    kind: TimerKind::Ping,
                    epoch: self.epoch,
                },
            );
        }

        let url = self.url.clone().unwrap_or_default();
        info!(url = %url, "Connected");
        self.publish_state();
        self.emit(ClientEvent::Opened { url });
    }

    /// Count a failed attempt or abnormal close and decide what follows.
    fn on_failure(&mut self, err: ConnectionError) {
        warn!(error = %err, "Connection failure");
        self.release_link();

        let opened = self.state.on_failure(Instant::now());
        self.last_failure_at = Some(Utc::now());
        self.emit(ClientEvent::Error(err));
        if opened {
            self.emit(ClientEvent::CircuitBreakerOpened {
                failures: self.state.breaker().consecutive_failures(),
            });
        }

        self.schedule_reconnect();
        self.publish_state();
    }

    fn schedule_reconnect(&mut self) {
        match self.state.plan_reconnect() {
            ReconnectPlan::Schedule { attempt, delay } => {
                let delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
                info!(
                    attempt,
                    max = self.config.max_reconnect_attempts,
                    delay_ms,
                    "Scheduling reconnect"
                );
                self.timers.schedule_once(
                    TimerKind::Reconnect,
                    delay,
                    self.timer_tx.clone(),
                    TimerFired {
                        kind: TimerKind::Reconnect,
                        epoch: self.epoch,
                    },
                );
                self.emit(ClientEvent::ReconnectScheduled { attempt, delay_ms });
            }
            ReconnectPlan::Exhausted { attempts } => {
                error!(attempts, "Max reconnect attempts reached, giving up");
                self.emit(ClientEvent::ReconnectExhausted { attempts });
            }
            ReconnectPlan::BreakerOpen => {
                warn!("Circuit breaker open, not scheduling reconnect");
            }
        }
    }

    // ---------------------------------------------------------------------
    // Timers
    // ---------------------------------------------------------------------

    fn handle_timer(&mut self, fired: TimerFired) {
        if fired.epoch != self.epoch {
            trace!(kind = ?fired.kind, epoch = fired.epoch, "Ignoring stale timer");
            return;
        }

        match fired.kind {
            TimerKind::ConnectTimeout => {
                self.timers.complete(TimerKind::ConnectTimeout);
                if self.state.phase() == ConnectionPhase::Connecting {
                    if let Some(task) = self.pending.take() {
                        task.abort();
                    }
                    self.on_failure(ConnectionError::ConnectTimeout {
                        timeout_ms: self.config.connect_timeout_ms,
                    });
                }
            }
            TimerKind::Reconnect => {
                self.timers.complete(TimerKind::Reconnect);
                let _ = self.try_connect(AttemptOrigin::Scheduled);
            }
            TimerKind::Ping => self.send_ping(),
        }
    }

    fn send_ping(&mut self) {
        let sent = match (&self.link, self.state.phase()) {
            (Some(link), ConnectionPhase::Open) => {
                match serde_json::to_string(&OutboundMessage::ping(Utc::now().timestamp_millis())) {
                    Ok(text) => link.sender().send(Frame::Text(text)).is_ok(),
                    Err(e) => {
                        warn!(error = %e, "Failed to encode ping");
                        false
                    }
                }
            }
            _ => false,
        };

        if sent {
            trace!("Sent ping");
        } else {
            debug!("Transport not open, stopping ping timer");
            self.timers.cancel(TimerKind::Ping);
            self.publish();
        }
    }

    // ---------------------------------------------------------------------
    // Transport events
    // ---------------------------------------------------------------------

    fn handle_transport(&mut self, event: Option<TransportEvent>) {
        match event {
            Some(TransportEvent::Text(text)) => self.handle_text(&text),
            Some(TransportEvent::Error(reason)) => {
                warn!(reason = %reason, "Transport error");
                self.emit(ClientEvent::Error(ConnectionError::Transport { reason }));
            }
            Some(TransportEvent::Closed { code, reason }) => self.handle_close(code, reason),
            None => self.handle_close(close::ABNORMAL, "transport ended without close".into()),
        }
    }

    fn handle_text(&mut self, text: &str) {
        self.messages_received += 1;
        match InboundMessage::decode(text) {
            Ok(InboundMessage::Pong(_)) => {
                trace!("Received pong");
                self.last_heartbeat_at = Some(Utc::now());
            }
            Ok(InboundMessage::ConnectionEstablished(established)) => {
                info!(
                    server_client_id = ?established.client_id,
                    "Server confirmed connection"
                );
                self.server_client_id = established.client_id;
            }
            Ok(InboundMessage::Echo(echo)) => {
                debug!(data = ?echo.data, "Received echo");
            }
            Ok(InboundMessage::App(message)) => {
                trace!(kind = %message.kind, "Received message");
                self.emit(ClientEvent::Message(message));
            }
            Err(e) => {
                warn!(error = %e, bytes = text.len(), "Failed to decode message");
                self.emit(ClientEvent::Error(ConnectionError::Decode {
                    reason: e.to_string(),
                }));
            }
        }
        self.publish();
    }

    fn handle_close(&mut self, code: u16, reason: String) {
        self.release_link();
        self.emit(ClientEvent::Closed {
            code,
            reason: reason.clone(),
        });

        if close::is_intentional(code) {
            info!(code, reason = %reason, "Connection closed");
            self.state.on_intentional_close();
            self.publish_state();
        } else {
            self.on_failure(ConnectionError::AbnormalClose { code, reason });
        }
    }

    /// Drop the live transport and stop pinging.
    fn release_link(&mut self) {
        self.link = None;
        self.timers.cancel(TimerKind::Ping);
        // Stop `send()` before anyone hears about the close.
        self.publish();
    }

    // ---------------------------------------------------------------------
    // Explicit control
    // ---------------------------------------------------------------------

    fn disconnect(&mut self, reason: &str) {
        let from = self.state.phase();
        self.epoch += 1;
        let cancelled = self.timers.cancel_all();
        if let Some(task) = self.pending.take() {
            task.abort();
        }

        if from != ConnectionPhase::Closed {
            self.state.transition(ConnectionPhase::Closing);
            self.publish_state();
        }
        if let Some(link) = self.link.take() {
            link.close(close::NORMAL, reason);
            self.emit(ClientEvent::Closed {
                code: close::NORMAL,
                reason: reason.to_string(),
            });
        }

        let was_open = self.state.is_circuit_open();
        self.state.transition(ConnectionPhase::Closed);
        self.state.reset();
        if was_open {
            self.emit(ClientEvent::CircuitBreakerClosed);
        }

        info!(from = %from, timers = cancelled, reason, "Disconnected");
        self.publish_state();
    }

    fn force_reconnect(&mut self) {
        info!("Forced reconnect requested");
        self.disconnect("forced reconnect");
        self.timers.schedule_once(
            TimerKind::Reconnect,
            self.config.force_reconnect_delay(),
            self.timer_tx.clone(),
            TimerFired {
                kind: TimerKind::Reconnect,
                epoch: self.epoch,
            },
        );
        self.publish();
    }

    fn set_enabled(&mut self, enabled: bool) {
        if self.state.is_enabled() == enabled {
            return;
        }
        info!(enabled, "Client enabled flag changed");
        self.state.set_enabled(enabled);
        if enabled {
            let _ = self.try_connect(AttemptOrigin::Requested);
        } else {
            self.disconnect("client disabled");
        }
    }

    // ---------------------------------------------------------------------
    // Publishing
    // ---------------------------------------------------------------------

    fn emit(&self, event: ClientEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    /// Refresh the shared snapshot.
    fn publish(&self) {
        let connection = self.state.snapshot();
        let debug = DebugSnapshot {
            connection,
            enabled: self.state.is_enabled(),
            url: self.url.clone(),
            client_id: self.client_id.clone(),
            server_client_id: self.server_client_id.clone(),
            armed_timers: self.timers.armed(),
            last_attempt_at: self.last_attempt_at,
            last_failure_at: self.last_failure_at,
            last_heartbeat_at: self.last_heartbeat_at,
            messages_received: self.messages_received,
            messages_sent: 0,
        };
        let outbound = match (connection.phase, &self.link) {
            (ConnectionPhase::Open, Some(link)) => Some(link.sender()),
            _ => None,
        };

        let mut published = self.shared.published.write();
        published.debug = debug;
        published.outbound = outbound;
    }

    /// Refresh the shared snapshot and announce it if it changed.
    fn publish_state(&mut self) {
        self.publish();
        let snapshot = self.state.snapshot();
        if self.last_emitted != Some(snapshot) {
            self.last_emitted = Some(snapshot);
            self.emit(ClientEvent::StateChanged(snapshot));
        }
    }
}

async fn next_link_event(link: &mut Option<Link>) -> Option<TransportEvent> {
    match link {
        Some(link) => link.recv().await,
        None => std::future::pending().await,
    }
}

fn log_skip(origin: AttemptOrigin, reason: SkipReason) {
    match reason {
        SkipReason::AlreadyActive { .. } | SkipReason::RateLimited { .. } => {
            debug!(?origin, %reason, "Connect skipped");
        }
        SkipReason::Disabled => info!(?origin, %reason, "Connect skipped"),
        SkipReason::CircuitOpen { .. } | SkipReason::AttemptsExhausted { .. } => {
            warn!(?origin, %reason, "Connect skipped");
        }
    }
}
