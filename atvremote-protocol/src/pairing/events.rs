//! Pairing event stream
//!
//! Emitted by a pairing session on every transition so observers (UI,
//! controller) follow progress without polling.

use super::session::PairingState;

/// Events emitted while a pairing session runs
#[derive(Debug, Clone)]
pub enum PairingEvent {
    /// The session moved to a new state
    StateChanged { state: PairingState },

    /// The TV is displaying a PIN; the user must enter it
    CodeRequired,

    /// Pairing completed; the device can now open remote sessions
    Succeeded,

    /// Pairing failed; the session is dead and must be restarted to retry
    Failed { reason: String },

    /// The session was cancelled before completing
    Cancelled,
}

impl PairingEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PairingEvent::Succeeded | PairingEvent::Failed { .. } | PairingEvent::Cancelled
        )
    }
}
