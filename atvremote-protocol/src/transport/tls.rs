//! Framed TLS connection
//!
//! One mutually-authenticated TLS stream carrying varint-length-prefixed
//! protobuf frames. Reads accumulate in a buffer so frames split or merged
//! by TCP segmentation reassemble correctly.

use crate::error::{RemoteError, Result};
use crate::identity::Identity;
use crate::transport::tls_config::{self, CapturedCert};
use crate::wire;
use openssl::ssl::Ssl;
use std::pin::Pin;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{timeout, Duration};
use tokio_openssl::SslStream;
use tracing::{debug, info, warn};

/// Ceiling on TCP connect plus TLS handshake
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// TLS connection to a TV, pairing or control channel
pub struct TlsConnection {
    stream: SslStream<TcpStream>,
    remote_addr: String,
    recv_buf: Vec<u8>,
    captured_cert: CapturedCert,
}

impl TlsConnection {
    /// Connect to `addr`, presenting `identity` as the client certificate.
    ///
    /// The server's leaf certificate is captured during the handshake and is
    /// available from [`peer_certificate_der`](Self::peer_certificate_der)
    /// as soon as this returns.
    pub async fn connect(addr: &str, identity: &Identity) -> Result<Self> {
        debug!(addr, "connecting");

        let tcp_stream = timeout(HANDSHAKE_TIMEOUT, TcpStream::connect(addr))
            .await
            .map_err(|_| RemoteError::Timeout)?
            .map_err(|e| RemoteError::ConnectionFailed(format!("connect {}: {}", addr, e)))?;

        let captured_cert = tls_config::captured_cert_slot();
        let connector = tls_config::client_connector(identity, Some(captured_cert.clone()))?;
        let ssl = Ssl::new(connector.context())?;
        let mut stream = SslStream::new(ssl, tcp_stream)
            .map_err(|e| RemoteError::ConnectionFailed(format!("TLS setup: {}", e)))?;

        timeout(HANDSHAKE_TIMEOUT, Pin::new(&mut stream).connect())
            .await
            .map_err(|_| RemoteError::Timeout)?
            .map_err(|e| {
                warn!(addr, error = %e, "TLS handshake failed");
                RemoteError::ConnectionFailed(format!("TLS handshake: {}", e))
            })?;

        info!(addr, "TLS connection established");

        Ok(Self {
            stream,
            remote_addr: addr.to_string(),
            recv_buf: Vec::new(),
            captured_cert,
        })
    }

    pub fn remote_addr(&self) -> &str {
        &self.remote_addr
    }

    /// The TV's leaf certificate in DER form, captured during the handshake
    pub fn peer_certificate_der(&self) -> Option<Vec<u8>> {
        let captured = self
            .captured_cert
            .lock()
            .expect("captured cert slot poisoned")
            .clone();
        captured.or_else(|| {
            self.stream
                .ssl()
                .peer_certificate()
                .and_then(|cert| cert.to_der().ok())
        })
    }

    /// Send one length-prefixed frame
    pub async fn send_frame(&mut self, payload: &[u8]) -> Result<()> {
        let framed = wire::frame(payload);
        self.stream.write_all(&framed).await?;
        self.stream.flush().await?;
        debug!(addr = %self.remote_addr, len = payload.len(), "sent frame");
        Ok(())
    }

    /// Read until one complete frame is available.
    ///
    /// Cancel-safe: bytes received before a cancellation stay in the
    /// receive buffer, so a later call resumes where this one stopped.
    pub async fn read_frame(&mut self) -> Result<Vec<u8>> {
        loop {
            if let Some(payload) = wire::extract_frame(&mut self.recv_buf) {
                debug!(addr = %self.remote_addr, len = payload.len(), "received frame");
                return Ok(payload);
            }

            let mut chunk = [0u8; 4096];
            let n = self.stream.read(&mut chunk).await?;
            if n == 0 {
                return Err(RemoteError::ConnectionFailed(
                    "connection closed by peer".to_string(),
                ));
            }
            self.recv_buf.extend_from_slice(&chunk[..n]);
        }
    }

    /// Shut the connection down
    pub async fn close(mut self) {
        debug!(addr = %self.remote_addr, "closing connection");
        let _ = self.stream.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::IdentityStore;
    use openssl::pkey::PKey;
    use openssl::ssl::{SslAcceptor, SslMethod, SslVerifyMode};
    use openssl::x509::X509;
    use std::sync::Arc;
    use tempfile::TempDir;
    use tokio::net::TcpListener;

    async fn loopback_acceptor() -> (Arc<SslAcceptor>, TcpListener, String) {
        let dir = TempDir::new().unwrap();
        let store = IdentityStore::open_dir(dir.path()).unwrap();
        let identity = store.get_or_create_identity().unwrap();

        let mut builder = SslAcceptor::mozilla_intermediate_v5(SslMethod::tls_server()).unwrap();
        builder
            .set_certificate(&X509::from_der(identity.certificate_der()).unwrap())
            .unwrap();
        builder
            .set_private_key(&PKey::from_rsa(identity.rsa().clone()).unwrap())
            .unwrap();
        builder.set_verify(SslVerifyMode::NONE);
        let acceptor = Arc::new(builder.build());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        (acceptor, listener, addr)
    }

    #[tokio::test]
    async fn test_frame_round_trip_and_cert_capture() {
        let (acceptor, listener, addr) = loopback_acceptor().await;

        let server = tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let ssl = Ssl::new(acceptor.context()).unwrap();
            let mut stream = SslStream::new(ssl, tcp).unwrap();
            Pin::new(&mut stream).accept().await.unwrap();

            // echo one frame back
            let mut buf = Vec::new();
            let payload = loop {
                if let Some(p) = wire::extract_frame(&mut buf) {
                    break p;
                }
                let mut chunk = [0u8; 1024];
                let n = stream.read(&mut chunk).await.unwrap();
                buf.extend_from_slice(&chunk[..n]);
            };
            stream.write_all(&wire::frame(&payload)).await.unwrap();
            stream.flush().await.unwrap();
        });

        let dir = TempDir::new().unwrap();
        let store = IdentityStore::open_dir(dir.path()).unwrap();
        let identity = store.get_or_create_identity().unwrap();

        let mut conn = TlsConnection::connect(&addr, &identity).await.unwrap();

        // the server's cert was captured during the handshake
        let peer_cert = conn.peer_certificate_der().unwrap();
        assert!(X509::from_der(&peer_cert).is_ok());

        conn.send_frame(b"ping-payload").await.unwrap();
        let echoed = conn.read_frame().await.unwrap();
        assert_eq!(echoed, b"ping-payload");

        conn.close().await;
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let dir = TempDir::new().unwrap();
        let store = IdentityStore::open_dir(dir.path()).unwrap();
        let identity = store.get_or_create_identity().unwrap();

        // bind a listener then drop it so the port is closed
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let result = TlsConnection::connect(&addr, &identity).await;
        assert!(matches!(result, Err(RemoteError::ConnectionFailed(_))));
    }
}
