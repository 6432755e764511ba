//! The panel protocol state machine.
//!
//! The panel protocol has no request identifiers: an inbound line is matched
//! against the acknowledgement of the single command in flight, or treated as
//! an unsolicited line if nothing is in flight. The machine therefore refuses
//! to dispatch a command while another one is still awaiting its
//! acknowledgement.
//!
//! The machine performs no I/O. Everything it wants to happen outside of it
//! (writing a line, lighting the indicator, logging a refusal) is pushed to
//! its [`EventSink`] synchronously, before the operation returns.

use crate::color::{parse_color, ColorParser};
use crate::commands::Command;
use crate::error::{PanelError, PanelResult};
use crate::events::{EventSink, PanelEvent};
use crate::state::PanelState;
use crate::validate::{parse_bool_token, validate_column, validate_row, validate_tempo};

/// Default for on/off and stop tokens that are not recognised.
const DEFAULT_TOKEN_VALUE: bool = false;

/// The acknowledgement the machine is waiting for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingExpectation {
    /// Line (after trimming) that acknowledges the in-flight command.
    pub expected_text: String,
    /// State to enter once acknowledged.
    pub success_state: PanelState,
}

/// How an inbound line was handled by [`PanelStateMachine::ingest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ingested {
    /// Nothing was pending; the line was reported as an unsolicited command.
    Command,
    /// The line acknowledged the pending command.
    Response,
    /// A command is pending but the line did not match; it was dropped.
    Unmatched,
}

/// Command/acknowledgement state machine for one panel.
pub struct PanelStateMachine<S: EventSink = Vec<PanelEvent>> {
    state: PanelState,
    pending: Option<PendingExpectation>,
    color_parser: ColorParser,
    sink: S,
}

impl<S: EventSink> PanelStateMachine<S> {
    /// Create a machine in the `Disconnected` state using [`parse_color`].
    pub fn new(sink: S) -> Self {
        Self::with_color_parser(sink, parse_color)
    }

    /// Create a machine with a custom color parser.
    pub fn with_color_parser(sink: S, color_parser: ColorParser) -> Self {
        PanelStateMachine {
            state: PanelState::Disconnected,
            pending: None,
            color_parser,
            sink,
        }
    }

    /// The current lifecycle state.
    pub fn current_state(&self) -> PanelState {
        self.state
    }

    /// The acknowledgement currently awaited, if any.
    pub fn pending(&self) -> Option<&PendingExpectation> {
        self.pending.as_ref()
    }

    /// Whether a command is awaiting its acknowledgement.
    pub fn is_waiting_for_response(&self) -> bool {
        self.pending.is_some()
    }

    /// Borrow the event sink.
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Mutably borrow the event sink, e.g. to drain an event log.
    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Start the `HELLO` / `READY` handshake.
    ///
    /// Only valid while `Disconnected`.
    pub fn connect(&mut self) -> PanelResult<()> {
        if self.state != PanelState::Disconnected {
            return self.refuse(PanelError::NotDisconnected);
        }
        self.ensure_idle()?;

        self.state = PanelState::Connecting;
        self.dispatch(Command::Hello, PanelState::Connected);
        Ok(())
    }

    /// End the session.
    ///
    /// - Not connected: refused.
    /// - `Connecting`: the handshake is abandoned and the machine returns to
    ///   `Disconnected` without sending anything.
    /// - `Disconnecting`: nothing to do.
    /// - Otherwise `GOODBYE` is sent and `SHUTDOWN` awaited.
    pub fn disconnect(&mut self) -> PanelResult<()> {
        match self.state {
            state if state < PanelState::Connecting => self.refuse(PanelError::NotConnected),
            PanelState::Connecting => {
                log::debug!("abandoning connection handshake");
                self.pending = None;
                self.state = PanelState::Disconnected;
                Ok(())
            }
            PanelState::Disconnecting => Ok(()),
            _ => {
                self.ensure_idle()?;
                self.state = PanelState::Disconnecting;
                self.dispatch(Command::Goodbye, PanelState::Disconnected);
                Ok(())
            }
        }
    }

    // ========================================================================
    // Inbound lines
    // ========================================================================

    /// Feed one inbound line (as delivered by the transport) to the machine.
    pub fn ingest(&mut self, line: &str) -> Ingested {
        let Some(pending) = self.pending.as_ref() else {
            self.sink.emit(PanelEvent::Command {
                line: line.to_string(),
                state: self.state,
            });
            return Ingested::Command;
        };

        if line.trim() != pending.expected_text {
            log::trace!("ignoring '{}' while waiting for '{}'", line.trim(), pending.expected_text);
            return Ingested::Unmatched;
        }

        let previous = self.state;
        let current = pending.success_state;
        self.sink.emit(PanelEvent::Response {
            line: line.to_string(),
            previous,
            current,
        });

        self.state = current;
        self.pending = None;
        Ingested::Response
    }

    // ========================================================================
    // Panel commands
    // ========================================================================

    /// Set the tempo (`SETTEMPO <bpm>`).
    pub fn set_line_tempo(&mut self, bpm: i64) -> PanelResult<()> {
        let bpm = self.check(validate_tempo(bpm))?;
        self.issue(Command::SetTempo { bpm })
    }

    /// Set the color of one LED (`SETCOLOR <row> <col> <r> <g> <b> [a]`).
    pub fn set_led_color(&mut self, row: i64, column: i64, color: &str) -> PanelResult<()> {
        let (row, column) = self.check_coordinates(row, column)?;
        let color = self.check_color(color)?;
        self.issue(Command::SetColor { row, column, color })
    }

    /// Switch one LED on or off (`ON|OFF <row> <col>`).
    pub fn set_led_on_off(&mut self, row: i64, column: i64, on: &str) -> PanelResult<()> {
        let (row, column) = self.check_coordinates(row, column)?;
        let on = parse_bool_token(on, DEFAULT_TOKEN_VALUE);
        self.issue(Command::Switch { row, column, on })
    }

    /// Switch one LED and set its color (`ON|OFF <row> <col> <r> <g> <b> [a]`).
    pub fn set_led(&mut self, row: i64, column: i64, color: &str, on: &str) -> PanelResult<()> {
        let (row, column) = self.check_coordinates(row, column)?;
        let color = self.check_color(color)?;
        let on = parse_bool_token(on, DEFAULT_TOKEN_VALUE);
        self.issue(Command::SwitchColor { row, column, on, color })
    }

    /// Reset a line (`RESET <line>`).
    pub fn reset_line(&mut self, line: i64) -> PanelResult<()> {
        let line = self.check(validate_row(line))?;
        self.issue(Command::ResetLine { line })
    }

    /// Stop or resume a line (`STOP <line> <0|1>`).
    pub fn stop_line(&mut self, line: i64, stop: &str) -> PanelResult<()> {
        let line = self.check(validate_row(line))?;
        let stop = parse_bool_token(stop, DEFAULT_TOKEN_VALUE);
        self.issue(Command::StopLine { line, stop })
    }

    /// Turn the whole panel off (`PANELOFF`).
    pub fn turn_panel_off(&mut self) -> PanelResult<()> {
        self.issue(Command::PanelOff)
    }

    // ========================================================================
    // Internal
    // ========================================================================

    /// Dispatch a command that leaves the lifecycle state unchanged.
    fn issue(&mut self, command: Command) -> PanelResult<()> {
        self.ensure_idle()?;
        let state = self.state;
        self.dispatch(command, state);
        Ok(())
    }

    fn dispatch(&mut self, command: Command, success_state: PanelState) {
        let line = command.to_command_string();
        log::debug!("sending '{}' in state {}", line, self.state);

        self.pending = Some(PendingExpectation {
            expected_text: command.expected_ack(),
            success_state,
        });
        self.sink.emit(PanelEvent::Send(line));
    }

    fn ensure_idle(&mut self) -> PanelResult<()> {
        match &self.pending {
            Some(pending) => {
                let expected = pending.expected_text.clone();
                self.refuse(PanelError::AwaitingAcknowledgement { expected })
            }
            None => Ok(()),
        }
    }

    fn check_coordinates(&mut self, row: i64, column: i64) -> PanelResult<(u8, u8)> {
        let row = self.check(validate_row(row))?;
        let column = self.check(validate_column(column))?;
        Ok((row, column))
    }

    fn check_color(&mut self, color: &str) -> PanelResult<crate::color::Rgba> {
        let parsed = (self.color_parser)(color).ok_or_else(|| PanelError::InvalidColor(color.to_string()));
        self.check(parsed)
    }

    fn check<T>(&mut self, result: PanelResult<T>) -> PanelResult<T> {
        match result {
            Ok(value) => Ok(value),
            Err(error) => self.refuse(error),
        }
    }

    fn refuse<T>(&mut self, error: PanelError) -> PanelResult<T> {
        log::debug!("refusing operation in state {}: {}", self.state, error);
        self.sink.emit(PanelEvent::Error {
            message: error.to_string(),
            state: self.state,
        });
        Err(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machine() -> PanelStateMachine {
        PanelStateMachine::new(Vec::new())
    }

    fn connected() -> PanelStateMachine {
        let mut machine = machine();
        machine.connect().unwrap();
        machine.ingest("READY");
        machine.sink_mut().clear();
        machine
    }

    #[test]
    fn test_initial_state() {
        let machine = machine();
        assert_eq!(machine.current_state(), PanelState::Disconnected);
        assert!(machine.pending().is_none());
        assert!(machine.sink().is_empty());
    }

    #[test]
    fn test_connect_sends_hello() {
        let mut machine = machine();
        assert!(machine.connect().is_ok());

        assert_eq!(machine.current_state(), PanelState::Connecting);
        assert_eq!(
            machine.pending(),
            Some(&PendingExpectation {
                expected_text: "READY".to_string(),
                success_state: PanelState::Connected,
            })
        );
        assert_eq!(machine.sink(), &vec![PanelEvent::Send("HELLO".to_string())]);
    }

    #[test]
    fn test_connect_twice_refused() {
        let mut machine = machine();
        machine.connect().unwrap();
        machine.sink_mut().clear();

        assert_eq!(machine.connect(), Err(PanelError::NotDisconnected));
        assert_eq!(machine.current_state(), PanelState::Connecting);
        assert_eq!(machine.pending().unwrap().expected_text, "READY");
        assert_eq!(
            machine.sink(),
            &vec![PanelEvent::Error {
                message: "panel is not currently disconnected".to_string(),
                state: PanelState::Connecting,
            }]
        );
    }

    #[test]
    fn test_ready_completes_handshake() {
        let mut machine = machine();
        machine.connect().unwrap();

        assert_eq!(machine.ingest("READY\r"), Ingested::Response);
        assert_eq!(machine.current_state(), PanelState::Connected);
        assert!(machine.pending().is_none());
        assert_eq!(
            machine.sink().last(),
            Some(&PanelEvent::Response {
                line: "READY\r".to_string(),
                previous: PanelState::Connecting,
                current: PanelState::Connected,
            })
        );
    }

    #[test]
    fn test_unmatched_line_keeps_waiting() {
        let mut machine = machine();
        machine.connect().unwrap();
        machine.sink_mut().clear();

        assert_eq!(machine.ingest("NOPE"), Ingested::Unmatched);
        assert_eq!(machine.current_state(), PanelState::Connecting);
        assert_eq!(machine.pending().unwrap().expected_text, "READY");
        assert!(machine.sink().is_empty());
    }

    #[test]
    fn test_ack_match_is_exact_after_trim() {
        let mut machine = machine();
        machine.connect().unwrap();

        assert_eq!(machine.ingest("ready"), Ingested::Unmatched);
        assert_eq!(machine.ingest("READY!"), Ingested::Unmatched);
        assert_eq!(machine.ingest("  READY \t"), Ingested::Response);
    }

    #[test]
    fn test_disconnect_when_disconnected_refused() {
        let mut machine = machine();
        assert_eq!(machine.disconnect(), Err(PanelError::NotConnected));
        assert_eq!(machine.current_state(), PanelState::Disconnected);
        assert!(matches!(machine.sink()[0], PanelEvent::Error { .. }));
    }

    #[test]
    fn test_disconnect_while_connecting_cancels() {
        let mut machine = machine();
        machine.connect().unwrap();
        machine.sink_mut().clear();

        assert!(machine.disconnect().is_ok());
        assert!(machine.pending().is_none());
        assert_eq!(machine.current_state(), PanelState::Disconnected);
        assert!(machine.sink().is_empty());

        // A late READY is now unsolicited
        assert_eq!(machine.ingest("READY"), Ingested::Command);
    }

    #[test]
    fn test_disconnect_from_connected() {
        let mut machine = connected();
        assert!(machine.disconnect().is_ok());

        assert_eq!(machine.current_state(), PanelState::Disconnecting);
        assert_eq!(machine.sink(), &vec![PanelEvent::Send("GOODBYE".to_string())]);

        // Idempotent while disconnecting
        assert!(machine.disconnect().is_ok());
        assert_eq!(machine.sink().len(), 1);

        assert_eq!(machine.ingest("SHUTDOWN"), Ingested::Response);
        assert_eq!(machine.current_state(), PanelState::Disconnected);
    }

    #[test]
    fn test_line_without_pending_is_command() {
        let mut machine = connected();
        assert_eq!(machine.ingest("BUTTON 1"), Ingested::Command);
        assert_eq!(
            machine.sink(),
            &vec![PanelEvent::Command {
                line: "BUTTON 1".to_string(),
                state: PanelState::Connected,
            }]
        );
    }

    #[test]
    fn test_set_led_on_off() {
        let mut machine = connected();
        assert!(machine.set_led_on_off(1, 3, "ON").is_ok());

        assert_eq!(machine.sink(), &vec![PanelEvent::Send("ON 1 3".to_string())]);
        assert_eq!(
            machine.pending(),
            Some(&PendingExpectation {
                expected_text: "DONE".to_string(),
                success_state: PanelState::Connected,
            })
        );
        assert_eq!(machine.ingest("DONE"), Ingested::Response);
        assert_eq!(machine.current_state(), PanelState::Connected);
    }

    #[test]
    fn test_unknown_token_uses_default() {
        let mut machine = connected();
        machine.set_led_on_off(0, 0, "sideways").unwrap();
        assert_eq!(machine.sink()[0], PanelEvent::Send("OFF 0 0".to_string()));
    }

    #[test]
    fn test_set_led_color_with_alpha() {
        let mut machine = connected();
        machine.set_led_color(2, 7, "#ff000080").unwrap();
        assert_eq!(
            machine.sink()[0],
            PanelEvent::Send("SETCOLOR 2 7 255 0 0 128".to_string())
        );
    }

    #[test]
    fn test_invalid_color_refused() {
        let mut machine = connected();
        assert_eq!(
            machine.set_led(0, 0, "plaid", "on"),
            Err(PanelError::InvalidColor("plaid".to_string()))
        );
        assert!(machine.pending().is_none());
        assert_eq!(
            machine.sink(),
            &vec![PanelEvent::Error {
                message: "unrecognised color 'plaid'".to_string(),
                state: PanelState::Connected,
            }]
        );
    }

    #[test]
    fn test_custom_color_parser() {
        fn only_brand(name: &str) -> Option<crate::color::Rgba> {
            (name == "brand").then_some(crate::color::Rgba::rgb(1, 2, 3))
        }

        let mut machine: PanelStateMachine = PanelStateMachine::with_color_parser(Vec::new(), only_brand);
        machine.set_led_color(0, 1, "brand").unwrap();
        assert_eq!(machine.sink()[0], PanelEvent::Send("SETCOLOR 0 1 1 2 3".to_string()));

        machine.ingest("DONE");
        assert!(machine.set_led_color(0, 1, "red").is_err());
    }

    #[test]
    fn test_overlapping_command_refused() {
        let mut machine = connected();
        machine.reset_line(1).unwrap();
        machine.sink_mut().clear();

        assert_eq!(
            machine.turn_panel_off(),
            Err(PanelError::AwaitingAcknowledgement {
                expected: "OK 1".to_string()
            })
        );
        assert_eq!(machine.pending().unwrap().expected_text, "OK 1");
        assert!(matches!(machine.sink()[0], PanelEvent::Error { .. }));
        assert_eq!(machine.sink().len(), 1);

        // Disconnect is refused too: it would orphan the pending ack
        assert!(machine.disconnect().is_err());
        assert_eq!(machine.current_state(), PanelState::Connected);

        machine.ingest("OK 1");
        assert!(machine.turn_panel_off().is_ok());
    }

    #[test]
    fn test_validation_precedes_pending_check() {
        let mut machine = connected();
        machine.stop_line(0, "yes").unwrap();
        assert_eq!(machine.stop_line(5, "yes"), Err(PanelError::InvalidRow(5)));
    }
}
