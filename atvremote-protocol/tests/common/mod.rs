//! In-process TV for integration tests: a TLS server speaking the framed
//! protocol, built from the same certificate machinery as the client.

// shared between test binaries; not every binary uses every helper
#![allow(dead_code)]

use atvremote_protocol::identity::certificate::build_self_signed;
use atvremote_protocol::pairing::secret::compute_secret;
use atvremote_protocol::wire::{self, MessageEncoder};
use openssl::pkey::{PKey, Private};
use openssl::rsa::Rsa;
use openssl::ssl::{Ssl, SslAcceptor, SslMethod, SslVerifyMode};
use openssl::x509::X509;
use std::pin::Pin;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_openssl::SslStream;

/// Key pair and self-signed certificate for the fake TV
pub fn tv_credentials() -> (Rsa<Private>, Vec<u8>) {
    let rsa = Rsa::generate(2048).unwrap();
    let cert = build_self_signed(&rsa).unwrap();
    (rsa, cert)
}

pub fn tv_acceptor(rsa: &Rsa<Private>, cert_der: &[u8]) -> SslAcceptor {
    let mut builder = SslAcceptor::mozilla_intermediate_v5(SslMethod::tls_server()).unwrap();
    builder
        .set_certificate(&X509::from_der(cert_der).unwrap())
        .unwrap();
    builder
        .set_private_key(&PKey::from_rsa(rsa.clone()).unwrap())
        .unwrap();
    builder.set_verify(SslVerifyMode::NONE);
    builder.build()
}

pub async fn accept_tls(listener: &TcpListener, acceptor: &SslAcceptor) -> SslStream<TcpStream> {
    let (tcp, _) = listener.accept().await.unwrap();
    let ssl = Ssl::new(acceptor.context()).unwrap();
    let mut stream = SslStream::new(ssl, tcp).unwrap();
    Pin::new(&mut stream).accept().await.unwrap();
    stream
}

/// Read one varint-length-prefixed frame, `buf` carrying partial reads over
pub async fn read_frame(stream: &mut SslStream<TcpStream>, buf: &mut Vec<u8>) -> Option<Vec<u8>> {
    loop {
        if let Some(payload) = wire::extract_frame(buf) {
            return Some(payload);
        }
        let mut chunk = [0u8; 4096];
        match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => return None,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }
}

pub async fn write_frame(stream: &mut SslStream<TcpStream>, payload: &[u8]) {
    stream.write_all(&wire::frame(payload)).await.unwrap();
    stream.flush().await.unwrap();
}

/// Bare pairing acknowledgement envelope
pub fn pairing_ack(status: u64) -> Vec<u8> {
    let mut enc = MessageEncoder::new();
    enc.add_varint(1, 2).add_varint(2, status);
    enc.into_bytes()
}

/// Acknowledgement that also carries an (empty) PairingConfiguration
pub fn pairing_ack_with_configuration() -> Vec<u8> {
    let mut enc = MessageEncoder::new();
    enc.add_varint(1, 2)
        .add_varint(2, 200)
        .add_message(30, MessageEncoder::new());
    enc.into_bytes()
}

/// Search for a six-symbol PIN whose first byte equals the first byte of the
/// secret it produces (what the TV's screen would show for this pair of
/// certificates).
pub fn find_accepting_pin(client_cert: &[u8], server_cert: &[u8]) -> String {
    for suffix in 0u32..4096 {
        let s1 = (suffix >> 8) as u8;
        let s2 = (suffix & 0xFF) as u8;
        for first in 0u16..=0xFF {
            let code = vec![first as u8, s1, s2];
            let secret = compute_secret(client_cert, server_cert, &code).unwrap();
            if secret[0] == first as u8 {
                return code.iter().map(|b| format!("{:02X}", b)).collect();
            }
        }
    }
    panic!("no accepting PIN found");
}

/// A PIN guaranteed to fail the check byte locally
pub fn find_rejected_pin(client_cert: &[u8], server_cert: &[u8]) -> String {
    for first in 0u16..=0xFF {
        let code = vec![first as u8, 0x42, 0x42];
        let secret = compute_secret(client_cert, server_cert, &code).unwrap();
        if secret[0] != first as u8 {
            return code.iter().map(|b| format!("{:02X}", b)).collect();
        }
    }
    unreachable!("at least 255 of 256 first bytes fail the check");
}
