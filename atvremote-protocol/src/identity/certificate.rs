//! Self-signed certificate builder
//!
//! Assembles a v3 X.509 certificate for the client's RSA-2048 key and signs
//! it with the key itself (RSASSA-PKCS1-v1_5 / SHA-256). The TVs accept any
//! self-signed client certificate during pairing; what matters is that the
//! certificate parses cleanly and that its public key components feed the
//! pairing secret.

use crate::error::Result;
use crate::identity::der;
use chrono::{Duration, Utc};
use openssl::hash::MessageDigest;
use openssl::pkey::PKey;
use openssl::rsa::Rsa;
use openssl::sign::Signer;
use tracing::debug;

/// Subject and issuer common name; the TVs display it during pairing
pub const COMMON_NAME: &str = "atvremote";

/// Certificate validity, ten years from generation
const VALIDITY_DAYS: i64 = 3650;

const OID_SHA256_WITH_RSA: &[u64] = &[1, 2, 840, 113549, 1, 1, 11];
const OID_RSA_ENCRYPTION: &[u64] = &[1, 2, 840, 113549, 1, 1, 1];
const OID_COMMON_NAME: &[u64] = &[2, 5, 4, 3];
const OID_BASIC_CONSTRAINTS: &[u64] = &[2, 5, 29, 19];

/// Build a DER-encoded v3 self-signed certificate for `rsa`
pub fn build_self_signed(rsa: &Rsa<openssl::pkey::Private>) -> Result<Vec<u8>> {
    // AlgorithmIdentifier { sha256WithRSAEncryption, NULL }
    let signature_algorithm = der::sequence(&[der::oid(OID_SHA256_WITH_RSA), der::null()]);

    // Name: a single RDN, CN=atvremote
    let name = der::sequence(&[der::set(&[der::sequence(&[
        der::oid(OID_COMMON_NAME),
        der::utf8_string(COMMON_NAME),
    ])])]);

    let not_before = Utc::now();
    let not_after = not_before + Duration::days(VALIDITY_DAYS);
    let validity = der::sequence(&[der::utc_time(not_before), der::utc_time(not_after)]);

    // SubjectPublicKeyInfo wrapping the PKCS#1 RSAPublicKey
    let public_key_der = rsa.public_key_to_der_pkcs1()?;
    let spki = der::sequence(&[
        der::sequence(&[der::oid(OID_RSA_ENCRYPTION), der::null()]),
        der::bit_string(&public_key_der),
    ]);

    // Basic Constraints, critical, cA=TRUE
    let extension = der::sequence(&[
        der::oid(OID_BASIC_CONSTRAINTS),
        der::boolean(true),
        der::octet_string(&der::sequence(&[der::boolean(true)])),
    ]);

    let tbs = der::sequence(&[
        der::context(0, &der::integer(&[0x02])),
        der::integer(&random_serial()?),
        signature_algorithm.clone(),
        name.clone(),
        validity,
        name,
        spki,
        der::context(3, &der::sequence(&[extension])),
    ]);

    let signature = sign_tbs(rsa, &tbs)?;
    let certificate = der::sequence(&[tbs, signature_algorithm, der::bit_string(&signature)]);

    debug!(len = certificate.len(), "built self-signed certificate");
    Ok(certificate)
}

/// Eight random bytes with the top bit cleared, so the serial stays a
/// positive 64-bit INTEGER
fn random_serial() -> Result<[u8; 8]> {
    let mut serial = [0u8; 8];
    openssl::rand::rand_bytes(&mut serial)?;
    serial[0] &= 0x7F;
    Ok(serial)
}

fn sign_tbs(rsa: &Rsa<openssl::pkey::Private>, tbs: &[u8]) -> Result<Vec<u8>> {
    let pkey = PKey::from_rsa(rsa.clone())?;
    let mut signer = Signer::new(MessageDigest::sha256(), &pkey)?;
    signer.update(tbs)?;
    Ok(signer.sign_to_vec()?)
}
