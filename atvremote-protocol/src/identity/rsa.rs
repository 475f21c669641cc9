//! PKCS#1 RSAPublicKey parsing
//!
//! Extracts the modulus and exponent byte strings from a PKCS#1
//! `RSAPublicKey` structure. Both peers hash these exact bytes into the
//! pairing secret, so the output must be byte-identical on both sides:
//! in particular the modulus loses its DER sign-padding zero.

use crate::error::{RemoteError, Result};

/// Modulus and public exponent of an RSA public key, as raw byte strings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RsaPublicKey {
    pub modulus: Vec<u8>,
    pub exponent: Vec<u8>,
}

/// Parse a PKCS#1 `RSAPublicKey` DER buffer
pub fn parse_rsa_public_key(der: &[u8]) -> Result<RsaPublicKey> {
    let mut cursor = Cursor::new(der);

    cursor.expect_tag(0x30)?;
    cursor.read_length()?;

    cursor.expect_tag(0x02)?;
    let modulus_len = cursor.read_length()?;
    let mut modulus = cursor.read_bytes(modulus_len)?.to_vec();
    while modulus.len() > 1 && modulus[0] == 0x00 {
        modulus.remove(0);
    }

    cursor.expect_tag(0x02)?;
    let exponent_len = cursor.read_length()?;
    let exponent = cursor.read_bytes(exponent_len)?.to_vec();

    Ok(RsaPublicKey { modulus, exponent })
}

struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn next_byte(&mut self) -> Result<u8> {
        let byte = *self
            .buf
            .get(self.pos)
            .ok_or_else(|| RemoteError::InvalidResponse("truncated RSA public key".to_string()))?;
        self.pos += 1;
        Ok(byte)
    }

    fn expect_tag(&mut self, tag: u8) -> Result<()> {
        let byte = self.next_byte()?;
        if byte != tag {
            return Err(RemoteError::InvalidResponse(format!(
                "unexpected tag {:#04x} in RSA public key, wanted {:#04x}",
                byte, tag
            )));
        }
        Ok(())
    }

    fn read_length(&mut self) -> Result<usize> {
        let first = self.next_byte()?;
        if first < 0x80 {
            return Ok(first as usize);
        }
        let num_octets = (first & 0x7F) as usize;
        if num_octets == 0 || num_octets > 2 {
            return Err(RemoteError::InvalidResponse(
                "unsupported RSA public key length encoding".to_string(),
            ));
        }
        let mut len = 0usize;
        for _ in 0..num_octets {
            len = (len << 8) | self.next_byte()? as usize;
        }
        Ok(len)
    }

    fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        if self.buf.len() - self.pos < len {
            return Err(RemoteError::InvalidResponse(
                "truncated RSA public key".to_string(),
            ));
        }
        let bytes = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use openssl::rsa::Rsa;

    #[test]
    fn test_parse_generated_key() {
        let rsa = Rsa::generate(2048).unwrap();
        let der = rsa.public_key_to_der_pkcs1().unwrap();

        let parsed = parse_rsa_public_key(&der).unwrap();
        // the sign-padding zero must be stripped from a 2048-bit modulus
        assert_eq!(parsed.modulus.len(), 256);
        assert_ne!(parsed.modulus[0], 0x00);
        assert_eq!(parsed.modulus, rsa.n().to_vec());
        // F4 is the ubiquitous public exponent
        assert_eq!(parsed.exponent, vec![0x01, 0x00, 0x01]);
        assert_eq!(parsed.exponent, rsa.e().to_vec());
    }

    #[test]
    fn test_parse_hand_built_key() {
        // SEQUENCE { INTEGER 0x00 0x80 (padded), INTEGER 0x010001 }
        let der = vec![
            0x30, 0x09, 0x02, 0x02, 0x00, 0x80, 0x02, 0x03, 0x01, 0x00, 0x01,
        ];
        let parsed = parse_rsa_public_key(&der).unwrap();
        assert_eq!(parsed.modulus, vec![0x80]);
        assert_eq!(parsed.exponent, vec![0x01, 0x00, 0x01]);
    }

    #[test]
    fn test_rejects_wrong_outer_tag() {
        let der = vec![0x31, 0x03, 0x02, 0x01, 0x01];
        assert!(matches!(
            parse_rsa_public_key(&der),
            Err(RemoteError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_rejects_missing_integer() {
        // SEQUENCE containing an OCTET STRING instead of an INTEGER
        let der = vec![0x30, 0x03, 0x04, 0x01, 0xAA];
        assert!(matches!(
            parse_rsa_public_key(&der),
            Err(RemoteError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_rejects_truncation() {
        let rsa = Rsa::generate(2048).unwrap();
        let der = rsa.public_key_to_der_pkcs1().unwrap();
        let truncated = &der[..der.len() / 2];
        assert!(parse_rsa_public_key(truncated).is_err());
    }
}
