//! Stream framing
//!
//! Every message on the wire is a varint length prefix followed by that many
//! bytes of encoded protobuf. The receive side accumulates raw TCP reads in
//! a buffer and extracts complete frames as they become available; a read may
//! carry several frames, or a fraction of one.

use super::{decode_varint, put_varint};

/// Prefix `payload` with its varint length
pub fn frame(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + 5);
    put_varint(&mut out, payload.len() as u64);
    out.extend_from_slice(payload);
    out
}

/// Try to extract one complete frame from the front of `buf`.
///
/// Returns `None` (leaving `buf` untouched) when the length prefix or the
/// payload is still incomplete. Callers should loop until `None` since a
/// single read may deliver multiple frames.
pub fn extract_frame(buf: &mut Vec<u8>) -> Option<Vec<u8>> {
    let (len, header_len) = decode_varint(buf)?;
    let len = len as usize;
    if buf.len() < header_len + len {
        return None;
    }
    let payload = buf[header_len..header_len + len].to_vec();
    buf.drain(..header_len + len);
    Some(payload)
}
