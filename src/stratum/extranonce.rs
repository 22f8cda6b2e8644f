//! Extranonce assignment
//!
//! Each connection receives a 32-bit extranonce1 whose top five bits identify the pool
//! instance and whose low 27 bits count issuances. The miner appends its own 4-byte
//! extranonce2.

use crate::core::constants::{INSTANCE_ID_SHIFT, MAX_INSTANCE_ID};
use crate::error::{Error, Result};
use std::sync::atomic::{AtomicU32, Ordering};

/// Bytes reserved in the coinbase script for extranonce1 and extranonce2
pub const EXTRA_NONCE_PLACEHOLDER: [u8; 8] = [0xf0, 0x00, 0x00, 0x0f, 0xf1, 0x11, 0x11, 0x1f];

/// Process-wide extranonce1 source for one pool instance
#[derive(Debug)]
pub struct ExtraNonceCounter {
    instance_id: u32,
    counter: AtomicU32,
}

impl ExtraNonceCounter {
    /// Create a counter seeded at `instance_id << 27`
    pub fn new(instance_id: u32) -> Result<Self> {
        if instance_id > MAX_INSTANCE_ID {
            return Err(Error::config(format!(
                "Instance id {} does not fit in 5 bits",
                instance_id
            )));
        }
        Ok(Self {
            instance_id,
            counter: AtomicU32::new(instance_id << INSTANCE_ID_SHIFT),
        })
    }

    /// Issue the next extranonce1
    ///
    /// Values past `2^27` issuances spill into the next instance id's range.
    pub fn next(&self) -> u32 {
        self.counter.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
    }

    /// Instance id encoded in the upper bits
    pub fn instance_id(&self) -> u32 {
        self.instance_id
    }

    /// Placeholder bytes reserved in the coinbase script
    pub fn placeholder(&self) -> &'static [u8] {
        &EXTRA_NONCE_PLACEHOLDER
    }
}
