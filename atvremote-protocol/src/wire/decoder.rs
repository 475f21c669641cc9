//! Protobuf message decoder
//!
//! Operates on one complete (already de-framed) message. Field order is not
//! assumed. Unknown wire types cannot be skipped safely, so encountering one
//! ends parsing of the current message.

use super::{decode_varint, WireType};

/// Cursor-style decoder over one protobuf message
#[derive(Debug)]
pub struct MessageDecoder<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> MessageDecoder<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn remaining(&self) -> &'a [u8] {
        &self.buf[self.pos..]
    }

    /// Read the next field tag, or `None` at end of message
    pub fn read_tag(&mut self) -> Option<(u32, WireType)> {
        let (tag, consumed) = decode_varint(self.remaining())?;
        self.pos += consumed;
        let field = (tag >> 3) as u32;
        let wire_type = WireType::from_raw((tag & 0x07) as u8);
        Some((field, wire_type))
    }

    /// Read a varint value
    pub fn read_varint(&mut self) -> Option<u64> {
        let (value, consumed) = decode_varint(self.remaining())?;
        self.pos += consumed;
        Some(value)
    }

    /// Read a length-delimited payload
    pub fn read_length_delimited(&mut self) -> Option<&'a [u8]> {
        let len = self.read_varint()? as usize;
        if self.remaining().len() < len {
            return None;
        }
        let bytes = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Some(bytes)
    }

    /// Consume exactly one field's payload of the given wire type.
    ///
    /// An unknown wire type is a no-op that moves the cursor to the end,
    /// terminating further parsing of this message.
    pub fn skip(&mut self, wire_type: WireType) {
        match wire_type {
            WireType::Varint => {
                self.read_varint();
            }
            WireType::Fixed64 => {
                self.pos = (self.pos + 8).min(self.buf.len());
            }
            WireType::LengthDelimited => {
                if self.read_length_delimited().is_none() {
                    self.pos = self.buf.len();
                }
            }
            WireType::Fixed32 => {
                self.pos = (self.pos + 4).min(self.buf.len());
            }
            WireType::Unknown(_) => {
                self.pos = self.buf.len();
            }
        }
    }
}
