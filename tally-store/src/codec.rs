//! Fixed-width encoding of tallies as stored in the database.
//!
//! A tally is 9 bytes: a format marker followed by the value as big-endian
//! two's complement. The marker lets `decode` reject bytes that were not
//! written by `encode` instead of reading them as some arbitrary number.

use crate::error::{Result, TallyError};

/// Leading byte of every encoded tally.
pub const FORMAT_MARKER: u8 = 0x01;

/// Length in bytes of an encoded tally.
pub const ENCODED_LEN: usize = 1 + std::mem::size_of::<i64>();

/// Encodes a tally into its stored form.
pub fn encode(value: i64) -> [u8; ENCODED_LEN] {
    let mut buf = [0u8; ENCODED_LEN];
    buf[0] = FORMAT_MARKER;
    buf[1..].copy_from_slice(&value.to_be_bytes());
    buf
}

/// Decodes a stored tally.
///
/// Fails with [`TallyError::Encoding`] when the buffer has the wrong length
/// or does not start with [`FORMAT_MARKER`].
pub fn decode(bytes: &[u8]) -> Result<i64> {
    if bytes.len() != ENCODED_LEN {
        return Err(TallyError::Encoding(format!(
            "expected {ENCODED_LEN} bytes, got {}",
            bytes.len()
        )));
    }
    if bytes[0] != FORMAT_MARKER {
        return Err(TallyError::Encoding(format!(
            "unknown format marker {:#04x}",
            bytes[0]
        )));
    }

    let mut raw = [0u8; 8];
    raw.copy_from_slice(&bytes[1..]);
    Ok(i64::from_be_bytes(raw))
}
