//! Hexadecimal decoding for patch payloads.

use crate::error::{Error, Result};

/// Decodes a hex string (case-insensitive, no prefix) into raw bytes.
///
/// Fails on odd-length input or any non-hex character.
pub fn decode(hex: &str) -> Result<Vec<u8>> {
    let bytes = hex.as_bytes();
    if bytes.len() % 2 != 0 {
        return Err(Error::HexDecode {
            reason: format!("odd length ({})", bytes.len()),
        });
    }

    let mut out = Vec::with_capacity(bytes.len() / 2);
    for pair in bytes.chunks_exact(2) {
        let hi = nibble(pair[0]).ok_or_else(|| invalid_char(pair[0]))?;
        let lo = nibble(pair[1]).ok_or_else(|| invalid_char(pair[1]))?;
        out.push(hi << 4 | lo);
    }
    Ok(out)
}

#[inline]
fn nibble(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'A'..=b'F' => Some(c - b'A' + 10),
        b'a'..=b'f' => Some(c - b'a' + 10),
        _ => None,
    }
}

fn invalid_char(c: u8) -> Error {
    Error::HexDecode {
        reason: format!("invalid character {:?}", c as char),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_valid() {
        assert_eq!(decode("").unwrap(), Vec::<u8>::new());
        assert_eq!(decode("00ff10").unwrap(), vec![0x00, 0xFF, 0x10]);
        assert_eq!(decode("deadBEEF").unwrap(), vec![0xDE, 0xAD, 0xBE, 0xEF]);
    }

    #[test]
    fn test_decode_odd_length() {
        assert!(matches!(
            decode("abc"),
            Err(Error::HexDecode { .. })
        ));
    }

    #[test]
    fn test_decode_invalid_char() {
        assert!(matches!(decode("0g"), Err(Error::HexDecode { .. })));
        assert!(matches!(decode("zz"), Err(Error::HexDecode { .. })));
    }

    #[test]
    fn test_roundtrip() {
        let bytes = vec![0x1F, 0x20, 0x03, 0xD5];
        let encoded: String = bytes.iter().map(|b| format!("{:02x}", b)).collect();
        assert_eq!(decode(&encoded).unwrap(), bytes);
    }
}
