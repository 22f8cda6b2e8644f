//! Cuckoo Cycle proof-of-work verification
//!
//! A proof is an ordered list of [`CYCLE_LENGTH`] edge indices. Edge `e` joins node
//! `2 * (siphash(2e) & mask)` on the even side to node `2 * (siphash(2e + 1) & mask) + 1`
//! on the odd side, with the SipHash keys derived from the block hash. The proof is
//! valid when those edges form exactly one simple cycle visiting all of them.

use super::constants::CYCLE_LENGTH;
use super::hash::blake2b_256;
use super::siphash::siphash24;
use thiserror::Error;
use tracing::debug;

/// Largest graph size accepted by the verifier
pub const MAX_EDGE_BITS: u32 = 31;

/// Reasons a claimed cycle is rejected
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleError {
    /// The proof does not hold exactly `CYCLE_LENGTH` edges
    #[error("cycle has {0} edges, expected {CYCLE_LENGTH}")]
    WrongLength(usize),

    /// An edge index exceeds the graph's edge mask
    #[error("edge {index} exceeds the edge mask")]
    EdgeTooBig {
        /// Position of the offending edge
        index: usize,
    },

    /// Edge indices are not strictly increasing
    #[error("edge {index} is not greater than its predecessor")]
    EdgesNotIncreasing {
        /// Position of the offending edge
        index: usize,
    },

    /// Endpoint XOR is non-zero, so the endpoints cannot pair up
    #[error("edge endpoints do not match")]
    EndpointsDontMatch,

    /// A node has no partner edge
    #[error("cycle has a dead end")]
    DeadEnd,

    /// A node is shared by more than two edges
    #[error("cycle branches")]
    Branch,

    /// The traced loop does not cover every edge
    #[error("closed loop of {0} edges, expected {CYCLE_LENGTH}")]
    WrongCycleLength(usize),

    /// The graph size is outside the supported range
    #[error("unsupported edge bits: {0}")]
    UnsupportedEdgeBits(u32),
}

/// SipHash keys for one graph
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleKeys {
    /// First key word
    pub k0: u64,
    /// Second key word
    pub k1: u64,
}

impl CycleKeys {
    /// Derive graph keys from a block hash
    ///
    /// The keys are the first two little-endian words of Blake2b-256 over the
    /// lowercase hex encoding of the hash, in the byte order it is given.
    pub fn from_block_hash(block_hash: &[u8]) -> Self {
        let digest = blake2b_256(hex::encode(block_hash).as_bytes());
        let mut k0 = [0u8; 8];
        let mut k1 = [0u8; 8];
        k0.copy_from_slice(&digest[0..8]);
        k1.copy_from_slice(&digest[8..16]);
        Self {
            k0: u64::from_le_bytes(k0),
            k1: u64::from_le_bytes(k1),
        }
    }

    /// Endpoint of `edge` on `side` (0 or 1)
    #[inline]
    pub fn node(&self, edge: u32, side: u32, edge_mask: u64) -> u64 {
        let hash = siphash24(2 * u64::from(edge) + u64::from(side), self.k0, self.k1);
        ((hash & edge_mask) << 1) | u64::from(side)
    }
}

/// Edge mask for a graph with `2^edge_bits` nodes per side
pub fn edge_mask(edge_bits: u32) -> Result<u64, CycleError> {
    if edge_bits == 0 || edge_bits > MAX_EDGE_BITS {
        return Err(CycleError::UnsupportedEdgeBits(edge_bits));
    }
    Ok((1u64 << edge_bits) - 1)
}

/// Verify that `cycle` is a valid proof for the graph keyed by `block_hash`
pub fn verify(block_hash: &[u8], edge_bits: u32, cycle: &[u32]) -> Result<(), CycleError> {
    if cycle.len() != CYCLE_LENGTH {
        return Err(CycleError::WrongLength(cycle.len()));
    }

    let keys = CycleKeys::from_block_hash(block_hash);
    let mask = edge_mask(edge_bits)?;

    let mut uvs = [0u64; 2 * CYCLE_LENGTH];
    let mut xor0 = 0u64;
    let mut xor1 = 0u64;

    for (n, &edge) in cycle.iter().enumerate() {
        if u64::from(edge) > mask {
            debug!(index = n, edge, "edge too big");
            return Err(CycleError::EdgeTooBig { index: n });
        }
        if n > 0 && edge <= cycle[n - 1] {
            debug!(index = n, edge, "edges not increasing");
            return Err(CycleError::EdgesNotIncreasing { index: n });
        }

        uvs[2 * n] = keys.node(edge, 0, mask);
        uvs[2 * n + 1] = keys.node(edge, 1, mask);
        xor0 ^= uvs[2 * n];
        xor1 ^= uvs[2 * n + 1];
    }

    // matching endpoints imply zero xors
    if xor0 | xor1 != 0 {
        debug!(block_hash = %hex::encode(block_hash), "endpoints do not match");
        return Err(CycleError::EndpointsDontMatch);
    }

    trace_cycle(&uvs)
}

/// Follow the cycle from endpoint 0 and check it closes after visiting every edge
fn trace_cycle(uvs: &[u64; 2 * CYCLE_LENGTH]) -> Result<(), CycleError> {
    let size = uvs.len();
    let mut edges = 0usize;
    let mut i = 0usize;

    loop {
        // Endpoints on the same side share index parity, so step by two.
        let mut partner = None;
        let mut k = (i + 2) % size;
        while k != i {
            if uvs[k] == uvs[i] {
                if partner.is_some() {
                    return Err(CycleError::Branch);
                }
                partner = Some(k);
            }
            k = (k + 2) % size;
        }

        let j = partner.ok_or(CycleError::DeadEnd)?;
        i = j ^ 1;
        edges += 1;

        if i == 0 {
            break;
        }
    }

    if edges != CYCLE_LENGTH {
        return Err(CycleError::WrongCycleLength(edges));
    }
    Ok(())
}
