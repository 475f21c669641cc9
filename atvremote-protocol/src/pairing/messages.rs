//! Pairing protocol messages
//!
//! Every pairing message is a `PairingMessage` envelope carrying the
//! protocol version, a status code, and exactly one payload field that
//! identifies the message type. Acknowledgements reuse the envelope with an
//! empty or absent payload; only the status matters.

use crate::error::{RemoteError, Result};
use crate::wire::{MessageDecoder, MessageEncoder, WireType};

/// Pairing protocol version spoken by this client
pub const PAIRING_PROTOCOL_VERSION: u64 = 2;

/// Status code for success
pub const STATUS_OK: u64 = 200;

/// Service name announced in the pairing request
pub const SERVICE_NAME: &str = "atvremote";

pub const FIELD_PAIRING_REQUEST: u32 = 10;
pub const FIELD_PAIRING_OPTION: u32 = 20;
pub const FIELD_PAIRING_CONFIGURATION: u32 = 30;
pub const FIELD_PAIRING_SECRET: u32 = 40;

/// Hexadecimal PIN encoding, the only one this client speaks
const ENCODING_HEXADECIMAL: u64 = 3;
/// PINs are six hex symbols on screen
const SYMBOL_LENGTH: u64 = 6;
/// We act as the input role in the exchange
const ROLE_INPUT: u64 = 1;

fn envelope(payload_field: u32, payload: MessageEncoder) -> Vec<u8> {
    let mut outer = MessageEncoder::new();
    outer
        .add_varint(1, PAIRING_PROTOCOL_VERSION)
        .add_varint(2, STATUS_OK)
        .add_message(payload_field, payload);
    outer.into_bytes()
}

/// `PairingRequest { service_name, client_name }`
pub fn pairing_request(client_name: &str) -> Vec<u8> {
    let mut payload = MessageEncoder::new();
    payload.add_string(1, SERVICE_NAME).add_string(2, client_name);
    envelope(FIELD_PAIRING_REQUEST, payload)
}

/// `PairingOption` advertising hexadecimal/6 in both directions
pub fn pairing_option() -> Vec<u8> {
    let mut encoding = MessageEncoder::new();
    encoding
        .add_varint(1, ENCODING_HEXADECIMAL)
        .add_varint(2, SYMBOL_LENGTH);

    let mut output_encoding = MessageEncoder::new();
    output_encoding
        .add_varint(1, ENCODING_HEXADECIMAL)
        .add_varint(2, SYMBOL_LENGTH);

    let mut payload = MessageEncoder::new();
    payload
        .add_message(1, encoding)
        .add_message(2, output_encoding)
        .add_varint(3, ROLE_INPUT);
    envelope(FIELD_PAIRING_OPTION, payload)
}

/// `PairingSecret { secret }`
pub fn pairing_secret(secret: &[u8]) -> Vec<u8> {
    let mut payload = MessageEncoder::new();
    payload.add_bytes(1, secret);
    envelope(FIELD_PAIRING_SECRET, payload)
}

/// A decoded envelope from the TV
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairingReply {
    pub protocol_version: u64,
    pub status: u64,
    /// `(payload_field, payload_bytes)` when the envelope carried one
    pub payload: Option<(u32, Vec<u8>)>,
}

impl PairingReply {
    pub fn is_ok(&self) -> bool {
        self.status == STATUS_OK
    }

    pub fn payload_field(&self) -> Option<u32> {
        self.payload.as_ref().map(|(field, _)| *field)
    }
}

/// Parse a pairing envelope frame
pub fn parse_reply(frame: &[u8]) -> Result<PairingReply> {
    let mut decoder = MessageDecoder::new(frame);
    let mut protocol_version = 0;
    let mut status = None;
    let mut payload = None;

    while let Some((field, wire_type)) = decoder.read_tag() {
        match (field, wire_type) {
            (1, WireType::Varint) => {
                protocol_version = decoder
                    .read_varint()
                    .ok_or_else(|| malformed("truncated protocol version"))?;
            }
            (2, WireType::Varint) => {
                status = Some(
                    decoder
                        .read_varint()
                        .ok_or_else(|| malformed("truncated status"))?,
                );
            }
            (
                FIELD_PAIRING_REQUEST
                | FIELD_PAIRING_OPTION
                | FIELD_PAIRING_CONFIGURATION
                | FIELD_PAIRING_SECRET,
                WireType::LengthDelimited,
            ) => {
                let bytes = decoder
                    .read_length_delimited()
                    .ok_or_else(|| malformed("truncated payload"))?;
                payload = Some((field, bytes.to_vec()));
            }
            (_, other) => decoder.skip(other),
        }
    }

    let status = status.ok_or_else(|| malformed("envelope without status"))?;
    Ok(PairingReply {
        protocol_version,
        status,
        payload,
    })
}

/// Reject a `PairingConfiguration` that negotiates anything other than the
/// hexadecimal/6 encoding this client advertised. The server choosing a
/// different encoding is undefined for this protocol version, so it is
/// surfaced as an invalid response rather than guessed at.
pub fn validate_configuration(payload: &[u8]) -> Result<()> {
    let mut decoder = MessageDecoder::new(payload);
    while let Some((field, wire_type)) = decoder.read_tag() {
        match (field, wire_type) {
            (1, WireType::LengthDelimited) => {
                let encoding = decoder
                    .read_length_delimited()
                    .ok_or_else(|| malformed("truncated encoding"))?;
                let (enc_type, symbol_length) = parse_encoding(encoding)?;
                if enc_type != ENCODING_HEXADECIMAL || symbol_length != SYMBOL_LENGTH {
                    return Err(RemoteError::InvalidResponse(format!(
                        "server selected unsupported encoding {}/{}",
                        enc_type, symbol_length
                    )));
                }
            }
            (_, other) => decoder.skip(other),
        }
    }
    Ok(())
}

fn parse_encoding(bytes: &[u8]) -> Result<(u64, u64)> {
    let mut decoder = MessageDecoder::new(bytes);
    let mut enc_type = ENCODING_HEXADECIMAL;
    let mut symbol_length = SYMBOL_LENGTH;
    while let Some((field, wire_type)) = decoder.read_tag() {
        match (field, wire_type) {
            (1, WireType::Varint) => {
                enc_type = decoder
                    .read_varint()
                    .ok_or_else(|| malformed("truncated encoding type"))?;
            }
            (2, WireType::Varint) => {
                symbol_length = decoder
                    .read_varint()
                    .ok_or_else(|| malformed("truncated symbol length"))?;
            }
            (_, other) => decoder.skip(other),
        }
    }
    Ok((enc_type, symbol_length))
}

fn malformed(what: &str) -> RemoteError {
    RemoteError::InvalidResponse(what.to_string())
}
