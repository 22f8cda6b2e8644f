//! Byte-level serializers for coinbase transactions, headers and blocks

use super::generation::GenerationTransaction;
use crate::core::Hash256;

/// Size of a serialized block header, including the trailing edge-bits byte
pub const HEADER_SIZE: usize = 81;

/// Bitcoin-style variable length integer
pub fn var_int(value: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(9);
    write_var_int(value, &mut out);
    out
}

/// Append a variable length integer to `output`
pub fn write_var_int(value: u64, output: &mut Vec<u8>) {
    if value < 0xfd {
        output.push(value as u8);
    } else if value <= 0xffff {
        output.push(0xfd);
        output.extend_from_slice(&(value as u16).to_le_bytes());
    } else if value <= 0xffff_ffff {
        output.push(0xfe);
        output.extend_from_slice(&(value as u32).to_le_bytes());
    } else {
        output.push(0xff);
        output.extend_from_slice(&value.to_le_bytes());
    }
}

/// Length-prefixed script number, as used for the height and time in coinbase scripts
///
/// Values 1 through 16 encode as `[0x01, n]`. Larger values are little-endian with
/// enough bytes that the most significant one stays below `0x80`.
pub fn serialize_number(value: u64) -> Vec<u8> {
    if (1..=16).contains(&value) {
        return vec![0x01, value as u8];
    }

    let mut out = vec![0u8];
    let mut n = value;
    while n > 127 {
        out.push((n & 0xff) as u8);
        n >>= 8;
    }
    out.push(n as u8);
    out[0] = (out.len() - 1) as u8;
    out
}

/// Varint length followed by the UTF-8 bytes of `s`
pub fn serialize_string(s: &str) -> Vec<u8> {
    let bytes = s.as_bytes();
    let mut out = var_int(bytes.len() as u64);
    out.extend_from_slice(bytes);
    out
}

/// Full coinbase transaction for one extranonce pair
pub fn serialize_coinbase(
    generation: &GenerationTransaction,
    extra_nonce1: u32,
    extra_nonce2: u32,
) -> Vec<u8> {
    let initial = generation.initial();
    let final_part = generation.final_part();
    let mut out = Vec::with_capacity(initial.len() + 8 + final_part.len());
    out.extend_from_slice(initial);
    out.extend_from_slice(&extra_nonce1.to_be_bytes());
    out.extend_from_slice(&extra_nonce2.to_be_bytes());
    out.extend_from_slice(final_part);
    out
}

/// Per-job header fields that do not change between shares
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderTemplate {
    /// Block version
    pub version: u32,
    /// Previous block hash in internal (little-endian) byte order
    pub previous_block_hash: Hash256,
    /// Compact network target
    pub bits: u32,
    /// Cuckoo graph size
    pub edge_bits: u8,
}

/// Block header for a share: 80 Bitcoin-layout bytes plus the edge-bits byte
pub fn serialize_header(
    header: &HeaderTemplate,
    merkle_root: &Hash256,
    ntime: u32,
    nonce: u32,
) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_SIZE);
    out.extend_from_slice(&header.version.to_le_bytes());
    out.extend_from_slice(&header.previous_block_hash);
    out.extend_from_slice(merkle_root);
    out.extend_from_slice(&ntime.to_le_bytes());
    out.extend_from_slice(&header.bits.to_le_bytes());
    out.extend_from_slice(&nonce.to_le_bytes());
    out.push(header.edge_bits);
    out
}

/// Proof bytes: edge count followed by each edge as little-endian `u32`
pub fn serialize_cycle(cycle: &[u32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + 4 * cycle.len());
    out.push(cycle.len() as u8);
    for edge in cycle {
        out.extend_from_slice(&edge.to_le_bytes());
    }
    out
}

/// Complete block ready for submission upstream
///
/// `transactions` holds the raw non-coinbase transactions in template order.
pub fn serialize_block(
    header: &[u8],
    cycle: &[u8],
    coinbase: &[u8],
    transactions: &[Vec<u8>],
    proof_of_stake_hybrid: bool,
) -> Vec<u8> {
    let body: usize = transactions.iter().map(Vec::len).sum();
    let mut out = Vec::with_capacity(header.len() + cycle.len() + 9 + coinbase.len() + body + 1);
    out.extend_from_slice(header);
    out.extend_from_slice(cycle);
    write_var_int(transactions.len() as u64 + 1, &mut out);
    out.extend_from_slice(coinbase);
    for tx in transactions {
        out.extend_from_slice(tx);
    }
    if proof_of_stake_hybrid {
        out.push(0);
    }
    out
}
