//! # Cuckoo Pool Core
//!
//! Share validation for Cuckoo Cycle mining pools: the pieces a Stratum pool needs to
//! turn a miner's `mining.submit` into an accepted share, a block candidate or a
//! classified rejection.
//!
//! ## Features
//!
//! - **SipHash-2-4 edge hashing** and a **Cuckoo Cycle verifier** for 42-cycles
//! - **Coinbase splitting** around the extranonce slot and Merkle branch folding
//! - **Extranonce assignment** partitioned by pool instance
//! - **Share validation** with duplicate detection, exact big-integer difficulty and
//!   retarget grace
//!
//! ## Architecture
//!
//! Jobs are built once per block template and shared read-only between connections;
//! the only mutable state a submission touches is its job's duplicate registry.

#![warn(
    missing_docs,
    rust_2018_idioms,
    unused_lifetimes,
    unused_qualifications,
    clippy::all
)]
#![forbid(unsafe_code)]

pub mod config;
pub mod core;
pub mod error;
pub mod stratum;
pub mod transaction;
pub mod utils;

pub use crate::error::{Error, Result};
pub use crate::config::Config;
pub use crate::core::{CycleError, HashAlgorithm, verify_cycle};
pub use crate::stratum::{Job, Miner, Share, ShareError, ShareValidator};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Re-export commonly used types
pub mod prelude {
    pub use crate::{
        config::Config,
        core::{CycleError, HashAlgorithm, HashFunction, verify_cycle},
        error::{Error, Result},
        stratum::{
            BlockTemplate, ExtraNonceCounter, Job, JobManager, Miner, MinerManager,
            MinerProtocol, Share, ShareError, ShareSubmission, ShareValidator,
        },
        transaction::GenerationTransaction,
    };
}
