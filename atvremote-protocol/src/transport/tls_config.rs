//! TLS client configuration
//!
//! Both protocol channels use mutual TLS with the client's self-signed
//! certificate. Server certificate validation is disabled: the protocol's
//! trust root is the PIN-bound pairing secret, not a CA chain (trust on
//! first use). During pairing the verify callback doubles as the capture
//! point for the TV's leaf certificate, which the secret computation needs
//! before any application data flows.

use crate::error::{RemoteError, Result};
use crate::identity::Identity;
use openssl::ssl::{SslConnector, SslMethod, SslVerifyMode, SslVersion};
use openssl::x509::X509;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Shared slot the verify callback writes the TV's leaf certificate into
pub type CapturedCert = Arc<Mutex<Option<Vec<u8>>>>;

pub fn captured_cert_slot() -> CapturedCert {
    Arc::new(Mutex::new(None))
}

/// Build a TLS client connector presenting `identity` and trusting any
/// server certificate.
///
/// When `capture` is given, the peer's leaf certificate (depth 0 in the
/// verify callback) is stored into it in DER form as the handshake runs —
/// no second connection is ever needed to obtain it.
pub fn client_connector(identity: &Identity, capture: Option<CapturedCert>) -> Result<SslConnector> {
    let mut builder = SslConnector::builder(SslMethod::tls_client())?;

    builder
        .set_min_proto_version(Some(SslVersion::TLS1_2))
        .map_err(|e| RemoteError::ConnectionFailed(format!("set min TLS version: {}", e)))?;

    let cert = X509::from_der(identity.certificate_der())?;
    builder.set_certificate(&cert)?;
    let pkey = identity.pkey()?;
    builder.set_private_key(&pkey)?;

    match capture {
        Some(slot) => {
            builder.set_verify_callback(SslVerifyMode::NONE, move |_preverified, ctx| {
                if ctx.error_depth() == 0 {
                    if let Some(cert) = ctx.current_cert() {
                        if let Ok(der) = cert.to_der() {
                            debug!(len = der.len(), "captured server leaf certificate");
                            *slot.lock().expect("captured cert slot poisoned") = Some(der);
                        }
                    }
                }
                true
            });
        }
        None => {
            builder.set_verify(SslVerifyMode::NONE);
        }
    }

    Ok(builder.build())
}
