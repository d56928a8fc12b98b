//! Base58 and Base58Check.
//!
//! Bitcoin alphabet, big-integer digit arithmetic, leading zero bytes
//! preserved as leading `'1'` characters. The checksummed form appends the
//! first four bytes of a double SHA-256 over the versioned payload.

use super::hashing::sha256d;
use crate::error::CodecError;

/// The 58-character alphabet; `0`, `O`, `I` and `l` are excluded.
pub const ALPHABET: &[u8; 58] = b"123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

/// Encodes bytes as base58.
pub fn encode(input: &[u8]) -> String {
    // Base58 digits, least significant first.
    let mut digits: Vec<u8> = Vec::with_capacity(input.len() * 138 / 100 + 1);
    for &byte in input {
        let mut carry = byte as u32;
        for d in digits.iter_mut() {
            let val = (*d as u32) * 256 + carry;
            *d = (val % 58) as u8;
            carry = val / 58;
        }
        while carry > 0 {
            digits.push((carry % 58) as u8);
            carry /= 58;
        }
    }

    let zeros = input.iter().take_while(|&&b| b == 0).count();
    let mut out = String::with_capacity(zeros + digits.len());
    for _ in 0..zeros {
        out.push('1');
    }
    for &d in digits.iter().rev() {
        out.push(ALPHABET[d as usize] as char);
    }
    out
}

/// Decodes a base58 string, restoring leading zero bytes from leading `'1'`s.
pub fn decode(input: &str) -> Result<Vec<u8>, CodecError> {
    let mut bytes: Vec<u8> = Vec::new();
    for c in input.chars() {
        let digit = digit_of(c)
            .ok_or_else(|| CodecError::Base58(format!("character {c:?} is not in the alphabet")))?;

        // Multiply the accumulator by 58 and add the digit.
        let mut carry = digit;
        for b in bytes.iter_mut() {
            let val = (*b as u32) * 58 + carry;
            *b = (val & 0xff) as u8;
            carry = val >> 8;
        }
        while carry > 0 {
            bytes.push((carry & 0xff) as u8);
            carry >>= 8;
        }
    }

    for c in input.chars() {
        if c == '1' {
            bytes.push(0);
        } else {
            break;
        }
    }

    bytes.reverse();
    Ok(bytes)
}

fn digit_of(c: char) -> Option<u32> {
    if !c.is_ascii() {
        return None;
    }
    ALPHABET.iter().position(|&b| b == c as u8).map(|i| i as u32)
}

/// Base58Check: version byte, payload, 4-byte double-SHA-256 checksum.
pub fn check_encode(version: u8, payload: &[u8]) -> String {
    let mut data = Vec::with_capacity(payload.len() + 5);
    data.push(version);
    data.extend_from_slice(payload);
    let check = sha256d(&data);
    data.extend_from_slice(&check.as_ref()[..4]);
    encode(&data)
}

/// Decodes and verifies a Base58Check string, returning (version, payload).
pub fn check_decode(input: &str) -> Result<(u8, Vec<u8>), CodecError> {
    let raw = decode(input)?;
    if raw.len() < 5 {
        return Err(CodecError::Base58(
            "too short for a versioned, checksummed payload".into(),
        ));
    }
    let (body, check) = raw.split_at(raw.len() - 4);
    let expected = sha256d(body);
    if check != &expected.as_ref()[..4] {
        return Err(CodecError::Base58("checksum mismatch".into()));
    }
    Ok((body[0], body[1..].to_vec()))
}
