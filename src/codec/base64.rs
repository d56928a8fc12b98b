//! Base64 (RFC 4648, standard alphabet) for signature transport.
//!
//! A small fixed codec keeps the dependency set flat. Decoding tolerates
//! missing padding and interior whitespace; any other character is an
//! error.

use crate::error::CodecError;

const ALPHABET: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

/// Decodes a base64 string.
pub fn decode(input: &str) -> Result<Vec<u8>, CodecError> {
    let input = input.trim().trim_end_matches('=');
    let mut out = Vec::with_capacity(input.len() * 3 / 4);
    let mut buf: u32 = 0;
    let mut bits: u32 = 0;

    for ch in input.chars() {
        let val = match ch {
            'A'..='Z' => (ch as u32) - ('A' as u32),
            'a'..='z' => (ch as u32) - ('a' as u32) + 26,
            '0'..='9' => (ch as u32) - ('0' as u32) + 52,
            '+' => 62,
            '/' => 63,
            '\n' | '\r' | ' ' | '\t' => continue,
            _ => return Err(CodecError::Base64(format!("invalid character {ch:?}"))),
        };
        buf = (buf << 6) | val;
        bits += 6;
        if bits >= 8 {
            bits -= 8;
            out.push(((buf >> bits) & 0xff) as u8);
        }
    }

    Ok(out)
}

/// Encodes bytes as padded base64.
pub fn encode(input: &[u8]) -> String {
    let mut out = String::with_capacity(input.len().div_ceil(3) * 4);
    for chunk in input.chunks(3) {
        let b0 = chunk[0] as u32;
        let b1 = chunk.get(1).copied().unwrap_or(0) as u32;
        let b2 = chunk.get(2).copied().unwrap_or(0) as u32;
        let triple = (b0 << 16) | (b1 << 8) | b2;

        out.push(ALPHABET[((triple >> 18) & 0x3f) as usize] as char);
        out.push(ALPHABET[((triple >> 12) & 0x3f) as usize] as char);
        if chunk.len() > 1 {
            out.push(ALPHABET[((triple >> 6) & 0x3f) as usize] as char);
        } else {
            out.push('=');
        }
        if chunk.len() > 2 {
            out.push(ALPHABET[(triple & 0x3f) as usize] as char);
        } else {
            out.push('=');
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_basic() {
        assert_eq!(decode("aGVsbG8=").unwrap(), b"hello");
    }

    #[test]
    fn decode_without_padding() {
        assert_eq!(decode("aGVsbG8").unwrap(), b"hello");
    }

    #[test]
    fn decode_ignores_whitespace() {
        assert_eq!(decode(" aGVs\nbG8= ").unwrap(), b"hello");
    }

    #[test]
    fn decode_empty() {
        assert!(decode("").unwrap().is_empty());
    }

    #[test]
    fn decode_rejects_foreign_characters() {
        assert!(decode("aGVs!bG8").is_err());
    }

    #[test]
    fn encode_basic() {
        assert_eq!(encode(b"hello"), "aGVsbG8=");
        assert_eq!(encode(b"Man"), "TWFu");
        assert_eq!(encode(b""), "");
    }

    #[test]
    fn signature_width_round_trip() {
        // Signatures cross the boundary as 64-byte values.
        let raw: Vec<u8> = (0u8..64).collect();
        assert_eq!(decode(&encode(&raw)).unwrap(), raw);
    }
}
