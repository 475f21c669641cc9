//! Remote control messages
//!
//! The control channel speaks `RemoteMessage` envelopes: one payload field
//! per frame on send; inbound frames are scanned for every recognized field
//! so a chatty TV cannot desynchronize the session.

use super::keycode::KeyCode;
use crate::wire::{MessageDecoder, MessageEncoder, WireType};
use crate::ClientConfig;

pub const FIELD_KEY_INJECT: u32 = 2;
pub const FIELD_CONFIGURE: u32 = 7;
pub const FIELD_SET_ACTIVE: u32 = 8;
pub const FIELD_PING: u32 = 10;
pub const FIELD_PONG: u32 = 11;
pub const FIELD_START: u32 = 40;

/// Magic constant the TVs expect in RemoteConfigure and RemoteSetActive
const ACTIVE_CODE: u64 = 622;

/// SHORT press; press-and-hold is not part of this protocol revision
const DIRECTION_SHORT: u64 = 3;

/// `RemoteConfigure { code1 = 622, device_info }`, sent first on connect
pub fn remote_configure(config: &ClientConfig) -> Vec<u8> {
    let mut device_info = MessageEncoder::new();
    device_info
        .add_string(1, &config.model)
        .add_string(2, &config.vendor)
        .add_varint(3, 1)
        .add_string(4, "1.0.0")
        .add_string(5, &config.package_id);

    let mut payload = MessageEncoder::new();
    payload.add_varint(1, ACTIVE_CODE).add_message(2, device_info);

    let mut outer = MessageEncoder::new();
    outer.add_message(FIELD_CONFIGURE, payload);
    outer.into_bytes()
}

/// `RemoteSetActive { active = 622 }`
pub fn remote_set_active() -> Vec<u8> {
    let mut payload = MessageEncoder::new();
    payload.add_varint(1, ACTIVE_CODE);

    let mut outer = MessageEncoder::new();
    outer.add_message(FIELD_SET_ACTIVE, payload);
    outer.into_bytes()
}

/// `RemoteKeyInject { key_code, direction = SHORT }`
pub fn key_inject(key: KeyCode) -> Vec<u8> {
    let mut payload = MessageEncoder::new();
    payload
        .add_varint(1, key.code())
        .add_varint(2, DIRECTION_SHORT);

    let mut outer = MessageEncoder::new();
    outer.add_message(FIELD_KEY_INJECT, payload);
    outer.into_bytes()
}

/// Pong reply echoing a ping's value
pub fn pong(value: u64) -> Vec<u8> {
    let mut payload = MessageEncoder::new();
    payload.add_varint(1, value);

    let mut outer = MessageEncoder::new();
    outer.add_message(FIELD_PONG, payload);
    outer.into_bytes()
}

/// Recognized inbound messages on the control channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteInbound {
    /// Liveness probe carrying a value to echo back
    Ping(u64),
    /// Response to our RemoteConfigure
    ConfigureAck,
    /// Response to our RemoteSetActive
    SetActiveAck,
    /// RemoteStart notification
    Start,
    /// Anything else, skipped
    Unknown(u32),
}

/// Scan an inbound frame for all top-level fields
pub fn parse_frame(frame: &[u8]) -> Vec<RemoteInbound> {
    let mut decoder = MessageDecoder::new(frame);
    let mut inbound = Vec::new();

    while let Some((field, wire_type)) = decoder.read_tag() {
        if wire_type != WireType::LengthDelimited {
            decoder.skip(wire_type);
            continue;
        }
        let Some(payload) = decoder.read_length_delimited() else {
            break;
        };
        inbound.push(match field {
            FIELD_PING => RemoteInbound::Ping(ping_value(payload)),
            FIELD_CONFIGURE => RemoteInbound::ConfigureAck,
            FIELD_SET_ACTIVE => RemoteInbound::SetActiveAck,
            FIELD_START => RemoteInbound::Start,
            other => RemoteInbound::Unknown(other),
        });
    }
    inbound
}

fn ping_value(payload: &[u8]) -> u64 {
    let mut decoder = MessageDecoder::new(payload);
    while let Some((field, wire_type)) = decoder.read_tag() {
        if field == 1 && wire_type == WireType::Varint {
            return decoder.read_varint().unwrap_or(0);
        }
        decoder.skip(wire_type);
    }
    0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire;

    #[test]
    fn test_key_inject_wire_bytes() {
        // UP: payload {1:19, 2:3}, envelope field 2, framed
        let message = key_inject(KeyCode::DpadUp);
        assert_eq!(message, vec![0x12, 0x04, 0x08, 0x13, 0x10, 0x03]);
        assert_eq!(
            wire::frame(&message),
            vec![0x06, 0x12, 0x04, 0x08, 0x13, 0x10, 0x03]
        );
    }

    #[test]
    fn test_configure_layout() {
        let config = ClientConfig::default();
        let message = remote_configure(&config);

        let mut decoder = MessageDecoder::new(&message);
        let (field, wire_type) = decoder.read_tag().unwrap();
        assert_eq!(field, FIELD_CONFIGURE);
        assert_eq!(wire_type, WireType::LengthDelimited);

        let payload = decoder.read_length_delimited().unwrap();
        let mut inner = MessageDecoder::new(payload);
        let (field, _) = inner.read_tag().unwrap();
        assert_eq!(field, 1);
        assert_eq!(inner.read_varint(), Some(622));
        let (field, _) = inner.read_tag().unwrap();
        assert_eq!(field, 2);

        let device_info = inner.read_length_delimited().unwrap();
        let mut info = MessageDecoder::new(device_info);
        let (field, _) = info.read_tag().unwrap();
        assert_eq!(field, 1);
        assert_eq!(
            info.read_length_delimited(),
            Some(config.model.as_bytes())
        );
    }

    #[test]
    fn test_set_active_layout() {
        let message = remote_set_active();
        let mut decoder = MessageDecoder::new(&message);
        let (field, _) = decoder.read_tag().unwrap();
        assert_eq!(field, FIELD_SET_ACTIVE);
        let payload = decoder.read_length_delimited().unwrap();
        let mut inner = MessageDecoder::new(payload);
        let (field, _) = inner.read_tag().unwrap();
        assert_eq!(field, 1);
        assert_eq!(inner.read_varint(), Some(622));
    }

    #[test]
    fn test_ping_parse_and_pong_echo() {
        // envelope field 10 = {1: 12345}
        let mut ping_payload = MessageEncoder::new();
        ping_payload.add_varint(1, 12345);
        let mut ping = MessageEncoder::new();
        ping.add_message(FIELD_PING, ping_payload);

        let inbound = parse_frame(&ping.into_bytes());
        assert_eq!(inbound, vec![RemoteInbound::Ping(12345)]);

        let reply = pong(12345);
        let mut decoder = MessageDecoder::new(&reply);
        let (field, _) = decoder.read_tag().unwrap();
        assert_eq!(field, FIELD_PONG);
        let payload = decoder.read_length_delimited().unwrap();
        let mut inner = MessageDecoder::new(payload);
        let (field, _) = inner.read_tag().unwrap();
        assert_eq!(field, 1);
        assert_eq!(inner.read_varint(), Some(12345));
    }

    #[test]
    fn test_unknown_fields_are_skipped() {
        let mut unknown_payload = MessageEncoder::new();
        unknown_payload.add_varint(1, 9);

        let mut frame = MessageEncoder::new();
        frame
            .add_varint(99, 7) // non-length-delimited unknown field
            .add_message(55, unknown_payload)
            .add_message(FIELD_START, MessageEncoder::new());

        let inbound = parse_frame(&frame.into_bytes());
        assert_eq!(
            inbound,
            vec![RemoteInbound::Unknown(55), RemoteInbound::Start]
        );
    }
}
