//! ASN.1/DER primitives
//!
//! A minimal canonical-DER emitter, just large enough to assemble an X.509
//! certificate. No field in the certificate exceeds 65535 bytes, so length
//! encoding stops at the two-byte long form.

use chrono::{DateTime, Datelike, Timelike, Utc};

const TAG_INTEGER: u8 = 0x02;
const TAG_BIT_STRING: u8 = 0x03;
const TAG_OCTET_STRING: u8 = 0x04;
const TAG_NULL: u8 = 0x05;
const TAG_OID: u8 = 0x06;
const TAG_UTF8_STRING: u8 = 0x0C;
const TAG_UTC_TIME: u8 = 0x17;
const TAG_SEQUENCE: u8 = 0x30;
const TAG_SET: u8 = 0x31;
const TAG_BOOLEAN: u8 = 0x01;

/// Encode a DER length: short form below 128, then `0x81 nn` / `0x82 hh ll`
pub fn encode_length(len: usize) -> Vec<u8> {
    debug_assert!(len < 0x1_0000, "no certificate field reaches 2^16 bytes");
    if len < 0x80 {
        vec![len as u8]
    } else if len < 0x100 {
        vec![0x81, len as u8]
    } else {
        vec![0x82, (len >> 8) as u8, (len & 0xFF) as u8]
    }
}

fn tlv(tag: u8, content: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(content.len() + 4);
    out.push(tag);
    out.extend_from_slice(&encode_length(content.len()));
    out.extend_from_slice(content);
    out
}

/// INTEGER from magnitude bytes, prepending 0x00 when the sign bit is set
pub fn integer(bytes: &[u8]) -> Vec<u8> {
    let mut content = Vec::with_capacity(bytes.len() + 1);
    if bytes.is_empty() || bytes[0] & 0x80 != 0 {
        content.push(0x00);
    }
    content.extend_from_slice(bytes);
    tlv(TAG_INTEGER, &content)
}

/// BIT STRING with a leading "0 unused bits" byte
pub fn bit_string(bytes: &[u8]) -> Vec<u8> {
    let mut content = Vec::with_capacity(bytes.len() + 1);
    content.push(0x00);
    content.extend_from_slice(bytes);
    tlv(TAG_BIT_STRING, &content)
}

pub fn octet_string(bytes: &[u8]) -> Vec<u8> {
    tlv(TAG_OCTET_STRING, bytes)
}

pub fn null() -> Vec<u8> {
    vec![TAG_NULL, 0x00]
}

pub fn boolean(value: bool) -> Vec<u8> {
    vec![TAG_BOOLEAN, 0x01, if value { 0xFF } else { 0x00 }]
}

/// OBJECT IDENTIFIER from its arc values
pub fn oid(arcs: &[u64]) -> Vec<u8> {
    debug_assert!(arcs.len() >= 2);
    let mut content = Vec::new();
    push_base128(&mut content, arcs[0] * 40 + arcs[1]);
    for &arc in &arcs[2..] {
        push_base128(&mut content, arc);
    }
    tlv(TAG_OID, &content)
}

// OID arcs use big-endian base-128 with the high bit as continuation,
// unlike protobuf varints which are little-endian.
fn push_base128(out: &mut Vec<u8>, mut value: u64) {
    let mut chunk = [0u8; 10];
    let mut n = 0;
    loop {
        chunk[n] = (value & 0x7F) as u8;
        value >>= 7;
        n += 1;
        if value == 0 {
            break;
        }
    }
    for i in (0..n).rev() {
        let mut byte = chunk[i];
        if i != 0 {
            byte |= 0x80;
        }
        out.push(byte);
    }
}

pub fn utf8_string(value: &str) -> Vec<u8> {
    tlv(TAG_UTF8_STRING, value.as_bytes())
}

/// UTCTime in `YYMMDDHHMMSSZ` form
pub fn utc_time(time: DateTime<Utc>) -> Vec<u8> {
    let formatted = format!(
        "{:02}{:02}{:02}{:02}{:02}{:02}Z",
        time.year() % 100,
        time.month(),
        time.day(),
        time.hour(),
        time.minute(),
        time.second()
    );
    tlv(TAG_UTC_TIME, formatted.as_bytes())
}

pub fn sequence(parts: &[Vec<u8>]) -> Vec<u8> {
    tlv(TAG_SEQUENCE, &parts.concat())
}

pub fn set(parts: &[Vec<u8>]) -> Vec<u8> {
    tlv(TAG_SET, &parts.concat())
}

/// Explicit context tag `[n]`, constructed
pub fn context(n: u8, content: &[u8]) -> Vec<u8> {
    tlv(0xA0 | n, content)
}
