//! Error handling for the Android TV remote protocol
//!
//! All fallible operations in this crate return [`Result`]. Errors from the
//! underlying libraries (I/O, TLS, JSON) convert automatically via `thiserror`;
//! the remaining variants are the protocol-level failure modes a caller is
//! expected to match on.

use thiserror::Error;

/// Result type for protocol operations
pub type Result<T> = std::result::Result<T, RemoteError>;

/// Errors that can occur while pairing with or driving an Android TV
#[derive(Error, Debug)]
pub enum RemoteError {
    /// No client identity could be materialized from the credential store.
    ///
    /// Pairing and remote sessions both require an RSA key pair and a
    /// self-signed certificate; this error means neither could be loaded
    /// nor generated.
    #[error("no client identity available")]
    NoIdentity,

    /// TCP or TLS level failure, including user cancellation ("Cancelled")
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// The TV answered a pairing step with a non-200 status code
    #[error("pairing rejected by TV (status {0})")]
    PairingRejected(u64),

    /// A PIN was malformed, or a pairing response could not be parsed
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// The PIN's first byte does not match the pairing secret's first byte.
    ///
    /// This is detected locally before anything is transmitted, so a
    /// mistyped PIN never reaches the TV.
    #[error("pairing code does not match the secret check byte")]
    SecretMismatch,

    /// The TLS handshake completed without yielding the TV's leaf certificate
    #[error("server certificate not available from TLS handshake")]
    ServerCertNotAvailable,

    /// A pairing or session message was not answered within the wait ceiling
    #[error("timed out waiting for response")]
    Timeout,

    /// A command was issued on a session that is not connected
    #[error("not connected")]
    NotConnected,

    /// The credential store backend failed to load, save, or delete an entry
    #[error("credential store error: {0}")]
    CredentialStore(String),

    /// mDNS browsing failed
    #[error("discovery error: {0}")]
    Discovery(String),

    /// I/O error (sockets, certificate files, registry persistence)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TLS error from the OpenSSL session layer
    #[error("TLS error: {0}")]
    Tls(#[from] openssl::ssl::Error),

    /// Key generation, parsing, or signing error
    #[error("crypto error: {0}")]
    Crypto(#[from] openssl::error::ErrorStack),

    /// JSON serialization error (paired device registry)
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RemoteError {
    /// The error used to fail outstanding waits when a session is cancelled
    pub fn cancelled() -> Self {
        RemoteError::ConnectionFailed("Cancelled".to_string())
    }

    /// Whether this error is the cancellation sentinel
    pub fn is_cancelled(&self) -> bool {
        matches!(self, RemoteError::ConnectionFailed(reason) if reason == "Cancelled")
    }
}
