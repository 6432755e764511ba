//! Panel lifecycle states.

use std::fmt;

/// Lifecycle state of the panel connection.
///
/// Variants are declared in lifecycle order and the derived ordering follows
/// it, so `state < PanelState::Connecting` means "not connected in any way".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PanelState {
    /// Sentinel: no success state configured.
    Unknown,
    /// The panel link is idle. Initial state.
    Disconnected,
    /// `HELLO` sent, waiting for `READY`.
    Connecting,
    /// Handshake complete.
    Connected,
    /// Panel initialized after connecting.
    Initialized,
    /// `GOODBYE` sent, waiting for `SHUTDOWN`.
    Disconnecting,
}

impl PanelState {
    /// Get the state name.
    pub fn as_str(&self) -> &'static str {
        match self {
            PanelState::Unknown => "Unknown",
            PanelState::Disconnected => "Disconnected",
            PanelState::Connecting => "Connecting",
            PanelState::Connected => "Connected",
            PanelState::Initialized => "Initialized",
            PanelState::Disconnecting => "Disconnecting",
        }
    }

    /// Numeric code of the state, as reported on the metrics gauge.
    pub fn code(&self) -> u8 {
        match self {
            PanelState::Unknown => 0,
            PanelState::Disconnected => 1,
            PanelState::Connecting => 2,
            PanelState::Connected => 3,
            PanelState::Initialized => 4,
            PanelState::Disconnecting => 99,
        }
    }
}

impl fmt::Display for PanelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_ordering() {
        assert!(PanelState::Unknown < PanelState::Disconnected);
        assert!(PanelState::Disconnected < PanelState::Connecting);
        assert!(PanelState::Connecting < PanelState::Connected);
        assert!(PanelState::Connected < PanelState::Initialized);
        assert!(PanelState::Initialized < PanelState::Disconnecting);
    }

    #[test]
    fn test_display() {
        assert_eq!(PanelState::Connected.to_string(), "Connected");
        assert_eq!(PanelState::Disconnecting.code(), 99);
    }
}
