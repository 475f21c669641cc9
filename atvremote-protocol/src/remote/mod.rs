//! Remote control channel: key injection, liveness, session lifecycle

mod keycode;
pub mod messages;
mod session;

pub use keycode::KeyCode;
pub use session::{RemoteEvent, RemoteSession};
