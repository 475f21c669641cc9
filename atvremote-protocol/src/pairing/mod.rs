//! PIN pairing: the challenge-response handshake that establishes trust
//! between this client and a TV

mod events;
pub mod messages;
pub mod secret;
mod session;

pub use events::PairingEvent;
pub use session::{PairingSession, PairingState, MESSAGE_TIMEOUT};
