//! Error types for the panel protocol.

use thiserror::Error;

/// Reasons an operation on the panel state machine can be refused.
///
/// Every variant is reported twice: as the `Err` of the operation and as the
/// message of an [`crate::PanelEvent::Error`] event. None of them are fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PanelError {
    /// `connect` was called while the panel was not disconnected.
    #[error("panel is not currently disconnected")]
    NotDisconnected,

    /// `disconnect` was called while the panel was not connected.
    #[error("panel is not connected")]
    NotConnected,

    /// Another command is still waiting for its acknowledgement.
    #[error("a command is already awaiting acknowledgement '{expected}'")]
    AwaitingAcknowledgement { expected: String },

    /// Row outside `[0, 2]`.
    #[error("row {0} is out of range (expected 0 to {max})", max = crate::MAX_ROW)]
    InvalidRow(i64),

    /// Column outside `[0, 7]`.
    #[error("column {0} is out of range (expected 0 to {max})", max = crate::MAX_COLUMN)]
    InvalidColumn(i64),

    /// Tempo outside `(0, 360]`.
    #[error("tempo {0} is out of range (expected 1 to {max})", max = crate::MAX_TEMPO)]
    InvalidTempo(i64),

    /// The color string could not be resolved to an RGBA value.
    #[error("unrecognised color '{0}'")]
    InvalidColor(String),
}

impl PanelError {
    /// Whether this error is a parameter validation failure (as opposed to
    /// an operation invoked in the wrong state).
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            PanelError::InvalidRow(_)
                | PanelError::InvalidColumn(_)
                | PanelError::InvalidTempo(_)
                | PanelError::InvalidColor(_)
        )
    }
}

/// Result type alias for panel operations.
pub type PanelResult<T> = Result<T, PanelError>;
