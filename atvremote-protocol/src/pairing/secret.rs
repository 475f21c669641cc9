//! Pairing secret computation
//!
//! Both sides hash their RSA public-key components together with the PIN
//! shown on the TV. The first byte of the PIN doubles as a check byte
//! against the digest, so a mistyped PIN is rejected locally with
//! probability 1 − 2⁻⁸ before anything is transmitted.

use crate::error::{RemoteError, Result};
use crate::identity::parse_rsa_public_key;
use openssl::x509::X509;
use sha2::{Digest, Sha256};
use tracing::debug;

/// Normalize and validate a PIN as entered by the user.
///
/// Whitespace-insensitive and case-insensitive; the result must be an even
/// number (at least two) of hex digits. Returns the PIN's raw bytes.
pub fn normalize_code(input: &str) -> Result<Vec<u8>> {
    let cleaned: String = input
        .chars()
        .filter(|c| *c != ' ')
        .map(|c| c.to_ascii_uppercase())
        .collect();

    if cleaned.len() < 2 || cleaned.len() % 2 != 0 {
        return Err(RemoteError::InvalidResponse(
            "pairing code must be an even number of hex digits".to_string(),
        ));
    }
    if !cleaned.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(RemoteError::InvalidResponse(
            "pairing code must be hexadecimal".to_string(),
        ));
    }

    let bytes = cleaned
        .as_bytes()
        .chunks(2)
        .map(|pair| {
            let hi = hex_value(pair[0]);
            let lo = hex_value(pair[1]);
            (hi << 4) | lo
        })
        .collect();
    Ok(bytes)
}

fn hex_value(c: u8) -> u8 {
    match c {
        b'0'..=b'9' => c - b'0',
        b'A'..=b'F' => c - b'A' + 10,
        _ => unreachable!("validated hex digit"),
    }
}

/// Compute the 32-byte pairing secret from both certificates and the PIN
/// bytes.
///
/// The hash input is the concatenation of the client's modulus and exponent,
/// the server's modulus and exponent, and the PIN bytes; the key components
/// come from each certificate's PKCS#1 public key with DER sign-padding
/// stripped, so both peers hash identical bytes.
pub fn compute_secret(
    client_cert_der: &[u8],
    server_cert_der: &[u8],
    code_bytes: &[u8],
) -> Result<[u8; 32]> {
    let client = certificate_key_components(client_cert_der)?;
    let server = certificate_key_components(server_cert_der)?;
    Ok(secret_from_components(
        &client.0, &client.1, &server.0, &server.1, code_bytes,
    ))
}

/// Verify the PIN against the secret's check byte.
///
/// Must be called before the secret is transmitted: a failed check means the
/// user mistyped the PIN, and the TV never needs to see the attempt.
pub fn check_code(code_bytes: &[u8], secret: &[u8; 32]) -> Result<()> {
    if code_bytes[0] != secret[0] {
        debug!("pairing code check byte mismatch");
        return Err(RemoteError::SecretMismatch);
    }
    Ok(())
}

pub(crate) fn secret_from_components(
    client_modulus: &[u8],
    client_exponent: &[u8],
    server_modulus: &[u8],
    server_exponent: &[u8],
    code_bytes: &[u8],
) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(client_modulus);
    hasher.update(client_exponent);
    hasher.update(server_modulus);
    hasher.update(server_exponent);
    hasher.update(code_bytes);
    hasher.finalize().into()
}

fn certificate_key_components(cert_der: &[u8]) -> Result<(Vec<u8>, Vec<u8>)> {
    let cert = X509::from_der(cert_der)
        .map_err(|e| RemoteError::InvalidResponse(format!("unparseable certificate: {}", e)))?;
    let pkcs1 = cert
        .public_key()
        .and_then(|key| key.rsa())
        .and_then(|rsa| rsa.public_key_to_der_pkcs1())
        .map_err(|e| RemoteError::InvalidResponse(format!("certificate has no RSA key: {}", e)))?;
    let key = parse_rsa_public_key(&pkcs1)?;
    Ok((key.modulus, key.exponent))
}
