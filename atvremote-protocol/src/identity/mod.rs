//! Client identity: key pair, self-signed certificate, and storage
//!
//! The TVs authenticate the remote by certificate plus PIN-bound pairing
//! secret, not by chain validation, so the client acts as a certificate
//! authority of one: it generates an RSA-2048 key, assembles a v3 X.509
//! certificate for it with the DER builder in [`der`], and keeps both in a
//! credential store across restarts.

pub mod certificate;
pub mod der;
mod rsa;
mod store;

pub use rsa::{parse_rsa_public_key, RsaPublicKey};
pub use store::{
    CredentialStore, FileCredentialStore, Identity, IdentityStore, CERT_FORMAT_VERSION,
};
