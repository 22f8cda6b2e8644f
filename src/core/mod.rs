//! Core proof-of-work primitives
//!
//! This module contains the keyed edge hash, the Cuckoo Cycle verifier, the hash
//! algorithm registry and the difficulty arithmetic shared by the share pipeline.

pub mod cuckoo;
pub mod difficulty;
pub mod hash;
mod siphash;

pub use cuckoo::{CycleError, CycleKeys, verify as verify_cycle};
pub use difficulty::{diff1, hash_value, share_difficulty};
pub use hash::{Hash256, HashAlgorithm, HashFunction, blake2b_256, sha256d};
pub use siphash::siphash24;

/// Constants for the pool protocol
pub mod constants {
    /// Number of edges in a valid proof
    pub const CYCLE_LENGTH: usize = 42;

    /// Size of the pool-assigned extranonce in bytes
    pub const EXTRA_NONCE1_SIZE: usize = 4;

    /// Size of the miner-chosen extranonce in bytes
    pub const EXTRA_NONCE2_SIZE: usize = 4;

    /// Number of hex characters in a submitted nTime
    pub const NTIME_HEX_LEN: usize = 8;

    /// Number of hex characters in a submitted nonce
    pub const NONCE_HEX_LEN: usize = 8;

    /// How far past the current time a submitted nTime may lie
    pub const NTIME_FUTURE_TOLERANCE_SECS: u64 = 7200;

    /// Bits of the extranonce counter below the instance id
    pub const INSTANCE_ID_SHIFT: u32 = 27;

    /// Largest pool instance id that fits above the counter bits
    pub const MAX_INSTANCE_ID: u32 = (1 << (32 - INSTANCE_ID_SHIFT)) - 1;
}
