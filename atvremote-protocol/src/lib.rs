//! Android TV Remote Control v2 protocol client
//!
//! This library discovers Android TVs on the local network, establishes
//! mutual-TLS trust with one via the PIN pairing handshake, and then drives
//! it over a persistent control channel. Trust is on-first-use: the client's
//! self-signed certificate and the PIN-bound pairing secret authenticate
//! both sides, not a CA chain.
//!
//! The building blocks are exposed individually ([`pairing`], [`remote`],
//! [`identity`], [`discovery`]); [`RemoteController`] ties them together
//! into the usual discover → pair → control flow.

pub mod controller;
pub mod device;
pub mod discovery;
pub mod identity;
pub mod pairing;
pub mod remote;
pub mod transport;
pub mod wire;

mod error;

pub use controller::{ControllerEvent, RemoteController};
pub use device::{DeviceRegistry, TVDevice, DEFAULT_CONTROL_PORT, PAIRING_PORT};
pub use discovery::{Discovery, DiscoveryEvent, SERVICE_TYPE};
pub use error::{RemoteError, Result};
pub use identity::{CredentialStore, FileCredentialStore, Identity, IdentityStore};
pub use pairing::{PairingEvent, PairingSession, PairingState};
pub use remote::{KeyCode, RemoteSession};

/// Remote protocol version we implement
pub const PROTOCOL_VERSION: u64 = 2;

/// How this client identifies itself to TVs
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Name shown on the TV's pairing screen
    pub name: String,
    /// Model reported in RemoteConfigure
    pub model: String,
    /// Vendor reported in RemoteConfigure
    pub vendor: String,
    /// Package identifier reported in RemoteConfigure
    pub package_id: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            name: "atvremote client".to_string(),
            model: "atvremote".to_string(),
            vendor: "atvremote".to_string(),
            package_id: "org.atvremote.client".to_string(),
        }
    }
}
