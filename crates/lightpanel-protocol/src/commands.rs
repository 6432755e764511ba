//! Commands that can be sent to the panel firmware.
//!
//! Every command carries already-validated parameters and knows both its
//! wire form and the acknowledgement line the panel answers it with.

use crate::codec::LineCodec;
use crate::color::Rgba;

/// Commands understood by the panel microcontroller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    // ========== Lifecycle ==========
    /// Open the session.
    Hello,

    /// Close the session.
    Goodbye,

    // ========== Line Commands ==========
    /// Set the animation tempo in beats per minute.
    SetTempo {
        /// Tempo, `1..=360`.
        bpm: u16,
    },

    /// Reset a line to its initial pattern.
    ResetLine {
        /// Line (row) index.
        line: u8,
    },

    /// Stop or restart a line.
    StopLine {
        /// Line (row) index.
        line: u8,
        /// `true` stops the line, `false` resumes it.
        stop: bool,
    },

    // ========== LED Commands ==========
    /// Set the color of a single LED without touching its on/off state.
    SetColor {
        row: u8,
        column: u8,
        color: Rgba,
    },

    /// Switch a single LED on or off.
    Switch {
        row: u8,
        column: u8,
        on: bool,
    },

    /// Switch a single LED on or off and set its color.
    SwitchColor {
        row: u8,
        column: u8,
        on: bool,
        color: Rgba,
    },

    // ========== Panel Commands ==========
    /// Turn every LED off.
    PanelOff,
}

impl Command {
    /// Encode the command as a line to send to the panel.
    /// Returns the bytes to send (including the `\n` terminator).
    pub fn encode(&self) -> Vec<u8> {
        LineCodec::encode_line(&self.to_command_string())
    }

    /// Get the command string without the terminator.
    pub fn to_command_string(&self) -> String {
        match self {
            Command::Hello => "HELLO".to_string(),
            Command::Goodbye => "GOODBYE".to_string(),

            Command::SetTempo { bpm } => format!("SETTEMPO {}", bpm),
            Command::ResetLine { line } => format!("RESET {}", line),
            Command::StopLine { line, stop } => format!("STOP {} {}", line, u8::from(*stop)),

            Command::SetColor { row, column, color } => {
                format!("SETCOLOR {} {} {}", row, column, color)
            }
            Command::Switch { row, column, on } => {
                format!("{} {} {}", switch_keyword(*on), row, column)
            }
            Command::SwitchColor { row, column, on, color } => {
                format!("{} {} {} {}", switch_keyword(*on), row, column, color)
            }

            Command::PanelOff => "PANELOFF".to_string(),
        }
    }

    /// The exact line (after trimming) the panel sends to acknowledge this command.
    pub fn expected_ack(&self) -> String {
        match self {
            Command::Hello => "READY".to_string(),
            Command::Goodbye => "SHUTDOWN".to_string(),
            Command::SetTempo { bpm } => format!("TEMPO {}", bpm),
            Command::ResetLine { line } => format!("OK {}", line),
            Command::StopLine { line, .. } => format!("STOPPED {}", line),
            Command::SetColor { .. } | Command::Switch { .. } | Command::SwitchColor { .. } => {
                "DONE".to_string()
            }
            Command::PanelOff => "OFF".to_string(),
        }
    }
}

fn switch_keyword(on: bool) -> &'static str {
    if on {
        "ON"
    } else {
        "OFF"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_hello() {
        assert_eq!(Command::Hello.encode(), b"HELLO\n");
        assert_eq!(Command::Hello.expected_ack(), "READY");
    }

    #[test]
    fn test_encode_set_tempo() {
        let cmd = Command::SetTempo { bpm: 120 };
        assert_eq!(cmd.to_command_string(), "SETTEMPO 120");
        assert_eq!(cmd.expected_ack(), "TEMPO 120");
    }

    #[test]
    fn test_encode_set_color() {
        let cmd = Command::SetColor {
            row: 2,
            column: 7,
            color: Rgba::rgb(255, 128, 0),
        };
        assert_eq!(cmd.to_command_string(), "SETCOLOR 2 7 255 128 0");

        let cmd = Command::SetColor {
            row: 0,
            column: 0,
            color: Rgba::rgba(1, 2, 3, 4),
        };
        assert_eq!(cmd.to_command_string(), "SETCOLOR 0 0 1 2 3 4");
        assert_eq!(cmd.expected_ack(), "DONE");
    }

    #[test]
    fn test_encode_switch() {
        let on = Command::Switch { row: 1, column: 3, on: true };
        let off = Command::Switch { row: 1, column: 3, on: false };
        assert_eq!(on.to_command_string(), "ON 1 3");
        assert_eq!(off.to_command_string(), "OFF 1 3");

        let colored = Command::SwitchColor {
            row: 0,
            column: 5,
            on: true,
            color: Rgba::rgb(0, 0, 255),
        };
        assert_eq!(colored.to_command_string(), "ON 0 5 0 0 255");
    }

    #[test]
    fn test_encode_line_commands() {
        let reset = Command::ResetLine { line: 1 };
        assert_eq!(reset.to_command_string(), "RESET 1");
        assert_eq!(reset.expected_ack(), "OK 1");

        let stop = Command::StopLine { line: 2, stop: true };
        assert_eq!(stop.to_command_string(), "STOP 2 1");
        assert_eq!(stop.expected_ack(), "STOPPED 2");

        let resume = Command::StopLine { line: 0, stop: false };
        assert_eq!(resume.to_command_string(), "STOP 0 0");
    }

    #[test]
    fn test_encode_panel_off() {
        assert_eq!(Command::PanelOff.encode(), b"PANELOFF\n");
        assert_eq!(Command::PanelOff.expected_ack(), "OFF");
    }
}
