//! Panel actor: the single owner of the protocol state machine.
//!
//! The state machine is not thread safe and relies on run-to-completion
//! semantics, so it lives inside one tokio task. Caller requests (from HTTP
//! handlers, signal handling, ...) and lines from the serial link are
//! serialized through that task's mailboxes. After every step the actor
//! drains the machine's event log and performs the side-effects:
//!
//! | Event      | Effect                                                     |
//! |------------|------------------------------------------------------------|
//! | `send`     | write the line to the serial link                          |
//! | `response` | log; light the indicator on `Connected`; on `Disconnected` |
//! |            | clear the indicator and close the link                     |
//! | `command`  | log the unsolicited line                                   |
//! | `error`    | log the refusal                                            |

use std::time::{Duration, Instant};

use lightpanel_protocol::{Ingested, PanelEvent, PanelState, PanelStateMachine};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::{LinkError, RequestError};
use crate::indicator::Indicator;
use crate::link::{Link, LinkEvent};
use crate::metrics::metric_defs;

/// Capacity of the request mailbox.
const MAILBOX_CAPACITY: usize = 64;

/// How often the acknowledgement watchdog looks at the pending command.
const WATCHDOG_INTERVAL: Duration = Duration::from_millis(250);

/// Operations callers can ask of the panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelOp {
    Connect,
    Disconnect,
    SetTempo { bpm: i64 },
    SetLedColor { row: i64, column: i64, color: String },
    SetLedOnOff { row: i64, column: i64, on: String },
    SetLed { row: i64, column: i64, color: String, on: String },
    ResetLine { line: i64 },
    StopLine { line: i64, stop: String },
    PanelOff,
}

/// Point-in-time view of the panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PanelSnapshot {
    /// Current lifecycle state.
    pub state: PanelState,
    /// Acknowledgement currently awaited, if any.
    pub awaiting: Option<String>,
    /// Whether the serial link is open.
    pub link_open: bool,
}

enum Message {
    Operation {
        op: PanelOp,
        reply: oneshot::Sender<Result<(), RequestError>>,
    },
    Snapshot {
        reply: oneshot::Sender<PanelSnapshot>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Cloneable handle for talking to a running [`PanelActor`].
#[derive(Clone)]
pub struct PanelHandle {
    mailbox: mpsc::Sender<Message>,
}

impl PanelHandle {
    /// Run one operation. Resolves once the command has been dispatched,
    /// not once the panel has acknowledged it.
    pub async fn operate(&self, op: PanelOp) -> Result<(), RequestError> {
        let (reply, response) = oneshot::channel();
        self.mailbox
            .send(Message::Operation { op, reply })
            .await
            .map_err(|_| RequestError::ActorGone)?;
        response.await.map_err(|_| RequestError::ActorGone)?
    }

    /// Open the link if needed and start the handshake.
    pub async fn connect(&self) -> Result<(), RequestError> {
        self.operate(PanelOp::Connect).await
    }

    /// End the session.
    pub async fn disconnect(&self) -> Result<(), RequestError> {
        self.operate(PanelOp::Disconnect).await
    }

    /// Current state of the panel.
    pub async fn snapshot(&self) -> Result<PanelSnapshot, RequestError> {
        let (reply, response) = oneshot::channel();
        self.mailbox
            .send(Message::Snapshot { reply })
            .await
            .map_err(|_| RequestError::ActorGone)?;
        response.await.map_err(|_| RequestError::ActorGone)
    }

    /// Say goodbye to the panel (best effort), close the link and stop the actor.
    pub async fn shutdown(&self) {
        let (reply, response) = oneshot::channel();
        if self.mailbox.send(Message::Shutdown { reply }).await.is_ok() {
            let _ = response.await;
        }
    }
}

/// The task that owns the state machine, the link and the indicator.
pub struct PanelActor {
    machine: PanelStateMachine,
    link: Link,
    link_events: mpsc::Receiver<LinkEvent>,
    indicator: Box<dyn Indicator>,
    mailbox: mpsc::Receiver<Message>,
    ack_warn_after: Option<Duration>,
    /// When the current pending acknowledgement was first seen, and whether
    /// the watchdog already warned about it.
    pending_since: Option<(String, Instant, bool)>,
}

impl PanelActor {
    /// Create the actor and the handle used to reach it.
    pub fn new(
        link: Link,
        link_events: mpsc::Receiver<LinkEvent>,
        indicator: Box<dyn Indicator>,
        ack_warn_after: Option<Duration>,
    ) -> (Self, PanelHandle) {
        let (tx, mailbox) = mpsc::channel(MAILBOX_CAPACITY);
        let actor = PanelActor {
            machine: PanelStateMachine::new(Vec::new()),
            link,
            link_events,
            indicator,
            mailbox,
            ack_warn_after,
            pending_since: None,
        };
        (actor, PanelHandle { mailbox: tx })
    }

    /// Spawn the actor on the current runtime.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Process messages until shut down or every handle is dropped.
    pub async fn run(mut self) {
        metrics::gauge!(metric_defs::STATE.name).set(self.machine.current_state().code() as f64);
        let mut watchdog = tokio::time::interval(WATCHDOG_INTERVAL);
        let watchdog_enabled = self.ack_warn_after.is_some();

        loop {
            tokio::select! {
                message = self.mailbox.recv() => {
                    match message {
                        Some(Message::Operation { op, reply }) => {
                            let result = self.handle_operation(op).await;
                            let _ = reply.send(result);
                        }
                        Some(Message::Snapshot { reply }) => {
                            let _ = reply.send(self.snapshot());
                        }
                        Some(Message::Shutdown { reply }) => {
                            self.shutdown().await;
                            let _ = reply.send(());
                            return;
                        }
                        None => break,
                    }
                }
                Some(event) = self.link_events.recv() => {
                    self.handle_link_event(event).await;
                }
                _ = watchdog.tick(), if watchdog_enabled => {
                    self.check_watchdog();
                }
            }
        }

        self.shutdown().await;
    }

    fn snapshot(&self) -> PanelSnapshot {
        PanelSnapshot {
            state: self.machine.current_state(),
            awaiting: self.machine.pending().map(|p| p.expected_text.clone()),
            link_open: self.link.is_open(),
        }
    }

    // ========================================================================
    // Requests
    // ========================================================================

    async fn handle_operation(&mut self, op: PanelOp) -> Result<(), RequestError> {
        debug!("panel operation: {:?}", op);
        let disconnecting = op == PanelOp::Disconnect;

        // Only open the link for a handshake the machine will accept
        if op == PanelOp::Connect
            && self.machine.current_state() == PanelState::Disconnected
            && !self.machine.is_waiting_for_response()
        {
            self.link.open().await?;
        }

        let result = match op {
            PanelOp::Connect => self.machine.connect(),
            PanelOp::Disconnect => self.machine.disconnect(),
            PanelOp::SetTempo { bpm } => self.machine.set_line_tempo(bpm),
            PanelOp::SetLedColor { row, column, color } => {
                self.machine.set_led_color(row, column, &color)
            }
            PanelOp::SetLedOnOff { row, column, on } => self.machine.set_led_on_off(row, column, &on),
            PanelOp::SetLed { row, column, color, on } => {
                self.machine.set_led(row, column, &color, &on)
            }
            PanelOp::ResetLine { line } => self.machine.reset_line(line),
            PanelOp::StopLine { line, stop } => self.machine.stop_line(line, &stop),
            PanelOp::PanelOff => self.machine.turn_panel_off(),
        };

        let dispatched = self.dispatch_events().await;

        // An abandoned handshake goes straight back to Disconnected
        if disconnecting && result.is_ok() && self.machine.current_state() == PanelState::Disconnected
        {
            self.release();
        }

        result?;
        dispatched?;
        Ok(())
    }

    async fn shutdown(&mut self) {
        if self.machine.current_state() > PanelState::Disconnected {
            match self.machine.disconnect() {
                Ok(()) => info!("disconnecting from panel for shutdown"),
                Err(e) => warn!("could not say goodbye to panel: {}", e),
            }
        }
        if let Err(e) = self.dispatch_events().await {
            warn!("failed to send goodbye: {}", e);
        }
        self.release();
    }

    // ========================================================================
    // Link
    // ========================================================================

    async fn handle_link_event(&mut self, event: LinkEvent) {
        match event {
            LinkEvent::Line(line) => {
                debug!("received line from panel: {}", line);
                if self.machine.ingest(&line) == Ingested::Unmatched {
                    metrics::counter!(metric_defs::LINES_UNMATCHED.name).increment(1);
                    debug!("dropping '{}' while awaiting acknowledgement", line);
                }
                if let Err(e) = self.dispatch_events().await {
                    error!("{}", e);
                }
            }
            LinkEvent::Closed { generation } => {
                if self.link.reader_closed(generation) {
                    warn!(
                        "serial link closed by peer in state {}",
                        self.machine.current_state()
                    );
                }
            }
        }
    }

    /// Drain the machine's event log and perform each side-effect in order.
    ///
    /// Stops writing after the first failed send but still processes the
    /// remaining events.
    async fn dispatch_events(&mut self) -> Result<(), LinkError> {
        let events: Vec<PanelEvent> = self.machine.sink_mut().drain(..).collect();
        let mut outcome = Ok(());

        for event in events {
            match event {
                PanelEvent::Send(line) => {
                    if outcome.is_err() {
                        continue;
                    }
                    debug!("sending '{}' to panel", line);
                    match self.link.send_line(&line).await {
                        Ok(()) => metrics::counter!(metric_defs::COMMANDS_SENT.name).increment(1),
                        Err(e) => {
                            error!("failed to send '{}': {}", line, e);
                            outcome = Err(e);
                        }
                    }
                }
                PanelEvent::Response { line, previous, current } => {
                    info!(
                        "panel acknowledged with '{}': {} -> {}",
                        line.trim(),
                        previous,
                        current
                    );
                    metrics::counter!(metric_defs::RESPONSES_MATCHED.name).increment(1);
                    metrics::gauge!(metric_defs::STATE.name).set(current.code() as f64);

                    match current {
                        PanelState::Connected => self.set_indicator(true),
                        PanelState::Disconnected => self.release(),
                        _ => {}
                    }
                }
                PanelEvent::Command { line, state } => {
                    info!("panel sent '{}' in state {}", line, state);
                    metrics::counter!(metric_defs::LINES_UNSOLICITED.name).increment(1);
                }
                PanelEvent::Error { message, state } => {
                    warn!("panel operation refused in state {}: {}", state, message);
                    metrics::counter!(metric_defs::ERRORS.name).increment(1);
                }
            }
        }

        self.track_pending();
        metrics::gauge!(metric_defs::STATE.name).set(self.machine.current_state().code() as f64);
        outcome
    }

    /// Clear the indicator and close the link.
    fn release(&mut self) {
        self.set_indicator(false);
        self.link.close();
    }

    fn set_indicator(&mut self, lit: bool) {
        if let Err(e) = self.indicator.set(lit) {
            warn!("failed to set connected indicator: {}", e);
        }
    }

    // ========================================================================
    // Acknowledgement watchdog
    // ========================================================================

    fn track_pending(&mut self) {
        let expected = self.machine.pending().map(|p| p.expected_text.clone());
        match (expected, &self.pending_since) {
            (None, _) => self.pending_since = None,
            (Some(expected), Some((tracked, _, _))) if *tracked == expected => {}
            (Some(expected), _) => self.pending_since = Some((expected, Instant::now(), false)),
        }
    }

    fn check_watchdog(&mut self) {
        let Some(threshold) = self.ack_warn_after else {
            return;
        };
        if let Some((expected, since, warned)) = self.pending_since.as_mut() {
            if !*warned && since.elapsed() >= threshold {
                warn!(
                    "still waiting for '{}' after {:?} in state {}",
                    expected,
                    since.elapsed(),
                    self.machine.current_state()
                );
                *warned = true;
            }
        }
    }
}
