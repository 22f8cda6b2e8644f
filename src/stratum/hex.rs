//! Hex helpers for Stratum submission fields and template values
//!
//! Submission fields have fixed widths, so the strict decoders here reject anything
//! that is not exactly the expected number of hex characters.

use crate::error::{Error, Result};

/// Encode bytes as a lowercase hex string
pub fn encode_hex(bytes: &[u8]) -> String {
    hex::encode(bytes)
}

/// Decode a hex string to bytes
pub fn decode_hex(hex_str: &str) -> Result<Vec<u8>> {
    hex::decode(hex_str).map_err(|e| Error::invalid_hex(format!("{}: {}", hex_str, e)))
}

/// Decode exactly `2 * N` hex characters
pub fn decode_fixed<const N: usize>(hex_str: &str) -> Option<[u8; N]> {
    let mut out = [0u8; N];
    hex::decode_to_slice(hex_str, &mut out).ok()?;
    Some(out)
}

/// Decode exactly eight hex characters as a big-endian `u32`
pub fn parse_u32_be(hex_str: &str) -> Option<u32> {
    decode_fixed::<4>(hex_str).map(u32::from_be_bytes)
}

/// Decode a 32-byte hash given in display order into internal byte order
pub fn decode_display_hash(hex_str: &str) -> Result<[u8; 32]> {
    let mut hash = decode_fixed::<32>(hex_str)
        .ok_or_else(|| Error::invalid_hex(format!("not a 32-byte hash: {}", hex_str)))?;
    hash.reverse();
    Ok(hash)
}
