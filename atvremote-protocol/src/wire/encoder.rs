//! Protobuf message encoder
//!
//! Fields are emitted in call order; the TVs' decoders are order-independent
//! but messages are built to match the schema's field order anyway.

use super::{put_varint, WireType};

/// Incremental encoder for one protobuf message
#[derive(Debug, Default)]
pub struct MessageEncoder {
    buf: Vec<u8>,
}

impl MessageEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    fn put_tag(&mut self, field: u32, wire_type: WireType) {
        put_varint(
            &mut self.buf,
            (u64::from(field) << 3) | u64::from(wire_type.as_raw()),
        );
    }

    /// Emit a varint field
    pub fn add_varint(&mut self, field: u32, value: u64) -> &mut Self {
        self.put_tag(field, WireType::Varint);
        put_varint(&mut self.buf, value);
        self
    }

    /// Emit a bool field (varint 0 or 1)
    pub fn add_bool(&mut self, field: u32, value: bool) -> &mut Self {
        self.add_varint(field, u64::from(value))
    }

    /// Emit a length-delimited field
    pub fn add_length_delimited(&mut self, field: u32, bytes: &[u8]) -> &mut Self {
        self.put_tag(field, WireType::LengthDelimited);
        put_varint(&mut self.buf, bytes.len() as u64);
        self.buf.extend_from_slice(bytes);
        self
    }

    /// Emit a UTF-8 string field
    pub fn add_string(&mut self, field: u32, value: &str) -> &mut Self {
        self.add_length_delimited(field, value.as_bytes())
    }

    /// Emit a bytes field
    pub fn add_bytes(&mut self, field: u32, bytes: &[u8]) -> &mut Self {
        self.add_length_delimited(field, bytes)
    }

    /// Emit a nested message field
    pub fn add_message(&mut self, field: u32, message: MessageEncoder) -> &mut Self {
        self.add_length_delimited(field, &message.buf)
    }

    /// Finish and take the encoded bytes
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_varint_field() {
        let mut enc = MessageEncoder::new();
        enc.add_varint(1, 19);
        // tag = (1 << 3) | 0 = 0x08
        assert_eq!(enc.into_bytes(), vec![0x08, 0x13]);
    }

    #[test]
    fn test_string_field() {
        let mut enc = MessageEncoder::new();
        enc.add_string(1, "hi");
        // tag = (1 << 3) | 2 = 0x0A
        assert_eq!(enc.into_bytes(), vec![0x0A, 0x02, b'h', b'i']);
    }

    #[test]
    fn test_bool_field() {
        let mut enc = MessageEncoder::new();
        enc.add_bool(3, true).add_bool(4, false);
        assert_eq!(enc.into_bytes(), vec![0x18, 0x01, 0x20, 0x00]);
    }

    #[test]
    fn test_nested_message() {
        let mut inner = MessageEncoder::new();
        inner.add_varint(1, 19).add_varint(2, 3);

        let mut outer = MessageEncoder::new();
        outer.add_message(2, inner);
        // RemoteKeyInject for UP wrapped as envelope field 2
        assert_eq!(outer.into_bytes(), vec![0x12, 0x04, 0x08, 0x13, 0x10, 0x03]);
    }

    #[test]
    fn test_high_field_number() {
        let mut enc = MessageEncoder::new();
        enc.add_varint(40, 1);
        // tag = (40 << 3) | 0 = 320 = varint [0xC0, 0x02]
        assert_eq!(enc.into_bytes(), vec![0xC0, 0x02, 0x01]);
    }
}
