//! Notifications emitted by the panel state machine.

use crate::state::PanelState;

/// Events pushed from the state machine to its collaborators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelEvent {
    /// A line to transmit to the panel (no terminator).
    Send(String),

    /// An inbound line matched the pending acknowledgement.
    Response {
        /// The line as received, untrimmed.
        line: String,
        /// State before the acknowledgement.
        previous: PanelState,
        /// State after the acknowledgement.
        current: PanelState,
    },

    /// An inbound line arrived while nothing was pending.
    Command {
        /// The line as received.
        line: String,
        /// State at the time of arrival.
        state: PanelState,
    },

    /// An operation was refused.
    Error {
        /// Human readable reason.
        message: String,
        /// State at the time of the refusal.
        state: PanelState,
    },
}

impl PanelEvent {
    /// Short name of the event kind, for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            PanelEvent::Send(_) => "send",
            PanelEvent::Response { .. } => "response",
            PanelEvent::Command { .. } => "command",
            PanelEvent::Error { .. } => "error",
        }
    }
}

/// Receiver of [`PanelEvent`]s.
///
/// The state machine never performs I/O itself; it hands every event to its
/// sink synchronously, in order.
pub trait EventSink {
    /// Deliver one event.
    fn emit(&mut self, event: PanelEvent);
}

/// Event log: collects events for the owner to drain after each call.
impl EventSink for Vec<PanelEvent> {
    fn emit(&mut self, event: PanelEvent) {
        self.push(event);
    }
}

/// Adapts a closure into an [`EventSink`].
pub struct FnSink<F>(pub F);

impl<F: FnMut(PanelEvent)> EventSink for FnSink<F> {
    fn emit(&mut self, event: PanelEvent) {
        (self.0)(event)
    }
}
