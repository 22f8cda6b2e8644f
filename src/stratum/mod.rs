//! Stratum-side pool state and share validation

pub mod extranonce;
pub mod hex;
mod job;
mod miner;
mod share;

pub use extranonce::{EXTRA_NONCE_PLACEHOLDER, ExtraNonceCounter};
pub use hex::{decode_hex, encode_hex};
pub use job::{
    BlockTemplate, CoinbaseAux, Job, JobContext, JobId, JobManager, ShareFingerprint,
    SharedJobManager, TemplateTransaction,
};
pub use miner::{
    ConnectionId, Miner, MinerArgs, MinerId, MinerManager, MinerProtocol, MinerSoftware,
};
pub use share::{Share, ShareError, ShareSubmission, ShareValidator, ValidatorConfig};
