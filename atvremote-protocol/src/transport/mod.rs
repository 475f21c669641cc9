//! TLS transport for the pairing and control channels

mod tls;
pub mod tls_config;

pub use tls::{TlsConnection, HANDSHAKE_TIMEOUT};
