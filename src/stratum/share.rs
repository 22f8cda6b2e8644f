//! Share validation
//!
//! [`ShareValidator`] takes one `mining.submit` and walks it through the field checks,
//! duplicate registration, block reconstruction, proof verification and the
//! difficulty decision. Every submission ends as a [`Share`]; rejections are recorded
//! on it rather than returned as errors.

use super::hex::{encode_hex, parse_u32_be};
use super::job::{Job, ShareFingerprint};
use super::miner::{Miner, MinerId, MinerSoftware};
use crate::core::constants::{NONCE_HEX_LEN, NTIME_FUTURE_TOLERANCE_SECS, NTIME_HEX_LEN};
use crate::core::{CycleError, Hash256, diff1, hash_value, sha256d, share_difficulty, verify_cycle};
use crate::transaction::{serialize_block, serialize_coinbase, serialize_cycle, serialize_header};
use crate::utils::current_timestamp;
use crate::utils::logging::LogContext;
use num_bigint::BigInt;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Why a share was rejected
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShareError {
    /// The job id is unknown or expired
    #[error("job not found")]
    JobNotFound,

    /// extranonce2 is not exactly four bytes of hex
    #[error("incorrect extranonce2 size")]
    IncorrectExtraNonce2Size,

    /// nTime is not exactly eight hex characters
    #[error("incorrect ntime size")]
    IncorrectNTimeSize,

    /// nTime is before the template time or too far in the future
    #[error("ntime out of range")]
    NTimeOutOfRange,

    /// nonce is not exactly eight hex characters
    #[error("incorrect nonce size")]
    IncorrectNonceSize,

    /// The same share was already submitted for this job
    #[error("duplicate share")]
    DuplicateShare,

    /// The proof is not a valid cycle for the reconstructed header
    #[error("incorrect cycle: {0}")]
    IncorrectCycle(CycleError),

    /// The proof meets the target but hashes to a negative difficulty
    #[error("negative difficulty share")]
    NegativeDifficultyShare,

    /// Negative difficulty from a miner release known to produce them
    #[error("negative difficulty share from outdated miner")]
    NegativeDifficultyShareOutdatedMiner,

    /// The share does not reach the miner's difficulty
    #[error("low difficulty share")]
    LowDifficultyShare,
}

impl ShareError {
    /// Whether the submitting connection should be scored down for this rejection
    pub fn is_penalizable(&self) -> bool {
        !matches!(self, ShareError::NegativeDifficultyShareOutdatedMiner)
    }
}

/// Raw fields of a `mining.submit` request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShareSubmission {
    /// Job id as sent by the miner
    pub job_id: String,
    /// extranonce2 hex
    pub extra_nonce2: String,
    /// nTime hex
    pub ntime: String,
    /// nonce hex
    pub nonce: String,
    /// Proof edges
    pub cycle: Vec<u32>,
}

/// Result of validating one submission
///
/// Fields past the rejection point keep their default values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Share {
    /// Submitting miner
    pub miner_id: MinerId,
    /// Job id as submitted
    pub job_id: String,
    /// Unix time the share was received
    pub submit_time: u64,
    /// Height of the job's block
    pub height: u64,
    /// Miner's extranonce1
    pub extra_nonce1: u32,
    /// Parsed extranonce2
    pub extra_nonce2: u32,
    /// Parsed nTime
    pub ntime: u32,
    /// Parsed nonce
    pub nonce: u32,
    /// Submitted proof
    pub cycle: Vec<u32>,
    /// Rebuilt coinbase transaction
    pub coinbase: Vec<u8>,
    /// Double SHA-256 of the coinbase
    pub coinbase_hash: Hash256,
    /// Merkle root with the rebuilt coinbase
    pub merkle_root: Hash256,
    /// Rebuilt block header
    pub header: Vec<u8>,
    /// Header hash under the job's algorithm
    pub header_hash: Hash256,
    /// Header hash as a signed integer
    pub header_value: BigInt,
    /// Block hash in display order
    pub block_hash: Hash256,
    /// Serialized proof
    pub cycle_bytes: Vec<u8>,
    /// Proof hash under the job's algorithm
    pub cycle_hash: Hash256,
    /// Proof hash as a signed integer
    pub cycle_value: BigInt,
    /// Share difficulty in pool units
    pub difficulty: f64,
    /// Network difficulty in pool units
    pub block_diff_adjusted: f64,
    /// Whether the proof meets the network target
    pub is_block_candidate: bool,
    /// Serialized block for candidates
    pub block_hex: Option<String>,
    /// Rejection reason
    pub error: Option<ShareError>,
}

impl Share {
    /// Whether the share was accepted
    pub fn is_valid(&self) -> bool {
        self.error.is_none()
    }

    /// Block hash as display hex
    pub fn block_hash_hex(&self) -> String {
        encode_hex(&self.block_hash)
    }
}

/// Validation policy
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatorConfig {
    /// Difficulty-1 target
    pub diff1: BigInt,
    /// How far past the receive time nTime may be
    pub ntime_future_tolerance_secs: u64,
    /// Minimum share-to-miner difficulty ratio
    pub low_difficulty_ratio: f64,
    /// Miner releases whose negative difficulty shares are not penalized
    pub legacy_negative_difficulty_miners: Vec<MinerSoftware>,
    /// Append the proof-of-stake marker byte to blocks
    pub proof_of_stake_hybrid: bool,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            diff1: diff1(),
            ntime_future_tolerance_secs: NTIME_FUTURE_TOLERANCE_SECS,
            low_difficulty_ratio: 0.99,
            legacy_negative_difficulty_miners: vec![MinerSoftware::new("merit-miner", "0.1.0")],
            proof_of_stake_hybrid: false,
        }
    }
}

/// Validates share submissions against their jobs
#[derive(Debug, Clone, Default)]
pub struct ShareValidator {
    config: ValidatorConfig,
}

impl ShareValidator {
    /// Create a validator with the given policy
    pub fn new(config: ValidatorConfig) -> Self {
        Self { config }
    }

    /// Validation policy
    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    /// Validate a submission received now
    pub fn validate(&self, miner: &Miner, job: Option<&Job>, submission: &ShareSubmission) -> Share {
        self.validate_at(current_timestamp(), miner, job, submission)
    }

    /// Validate a submission received at unix time `now`
    ///
    /// `job` is the job the submission's id resolved to, if any. The only state this
    /// touches is the job's duplicate registry.
    pub fn validate_at(
        &self,
        now: u64,
        miner: &Miner,
        job: Option<&Job>,
        submission: &ShareSubmission,
    ) -> Share {
        let span = LogContext::new()
            .with_miner(miner.id())
            .with_job_id(&submission.job_id)
            .with_extra_nonce1(miner.extra_nonce1())
            .span("share");
        let _enter = span.enter();

        let mut share = Share {
            miner_id: miner.id(),
            job_id: submission.job_id.clone(),
            submit_time: now,
            extra_nonce1: miner.extra_nonce1(),
            cycle: submission.cycle.clone(),
            ..Share::default()
        };

        if let Err(error) = self.process(now, miner, job, submission, &mut share) {
            warn!(
                error = %error,
                penalizable = error.is_penalizable(),
                difficulty = share.difficulty,
                "share rejected"
            );
            share.error = Some(error);
        }
        share
    }

    fn process(
        &self,
        now: u64,
        miner: &Miner,
        job: Option<&Job>,
        submission: &ShareSubmission,
        share: &mut Share,
    ) -> Result<(), ShareError> {
        let job = job.ok_or(ShareError::JobNotFound)?;

        share.extra_nonce2 =
            parse_u32_be(&submission.extra_nonce2).ok_or(ShareError::IncorrectExtraNonce2Size)?;

        if submission.ntime.len() != NTIME_HEX_LEN {
            return Err(ShareError::IncorrectNTimeSize);
        }
        share.ntime = parse_u32_be(&submission.ntime).ok_or(ShareError::IncorrectNTimeSize)?;

        let ntime = u64::from(share.ntime);
        if ntime < job.template().cur_time
            || ntime > now.saturating_add(self.config.ntime_future_tolerance_secs)
        {
            return Err(ShareError::NTimeOutOfRange);
        }

        if submission.nonce.len() != NONCE_HEX_LEN {
            return Err(ShareError::IncorrectNonceSize);
        }
        share.nonce = parse_u32_be(&submission.nonce).ok_or(ShareError::IncorrectNonceSize)?;
        share.height = job.height();

        let fingerprint = ShareFingerprint {
            extra_nonce1: share.extra_nonce1,
            extra_nonce2: share.extra_nonce2,
            ntime: share.ntime,
            nonce: share.nonce,
            cycle: share.cycle.clone(),
        };
        if !job.register_share(fingerprint) {
            return Err(ShareError::DuplicateShare);
        }

        share.coinbase = serialize_coinbase(job.generation(), share.extra_nonce1, share.extra_nonce2);
        share.coinbase_hash = sha256d(&share.coinbase);
        share.merkle_root = job.merkle_tree().with_first(&share.coinbase_hash);
        debug!(
            coinbase = %encode_hex(&share.coinbase),
            merkle_root = %encode_hex(&share.merkle_root),
            "rebuilt coinbase"
        );

        let algorithm = job.algorithm();
        share.header = serialize_header(job.header(), &share.merkle_root, share.ntime, share.nonce);
        share.header_hash = algorithm.hash(&share.header);
        share.header_value = hash_value(&share.header_hash);
        share.block_hash = sha256d(&share.header);
        share.block_hash.reverse();
        debug!(
            header = %encode_hex(&share.header),
            block_hash = %share.block_hash_hex(),
            "rebuilt header"
        );

        verify_cycle(&share.block_hash, job.edge_bits(), &share.cycle)
            .map_err(ShareError::IncorrectCycle)?;

        share.cycle_bytes = serialize_cycle(&share.cycle);
        share.cycle_hash = algorithm.hash(&share.cycle_bytes);
        share.cycle_value = hash_value(&share.cycle_hash);
        share.difficulty =
            share_difficulty(&self.config.diff1, &share.cycle_value, algorithm.multiplier());
        share.block_diff_adjusted = job.difficulty() * algorithm.multiplier();
        debug!(
            cycle_hash = %encode_hex(&share.cycle_hash),
            difficulty = share.difficulty,
            block_difficulty = share.block_diff_adjusted,
            "hashed cycle"
        );

        if job.target() >= &share.cycle_value {
            if share.difficulty < 0.0 {
                return Err(if self.is_legacy_miner(miner) {
                    ShareError::NegativeDifficultyShareOutdatedMiner
                } else {
                    ShareError::NegativeDifficultyShare
                });
            }

            let block = serialize_block(
                &share.header,
                &share.cycle_bytes,
                &share.coinbase,
                job.transactions(),
                self.config.proof_of_stake_hybrid,
            );
            share.is_block_candidate = true;
            share.block_hex = Some(encode_hex(&block));
            info!(
                height = share.height,
                block_hash = %share.block_hash_hex(),
                difficulty = share.difficulty,
                "block candidate found"
            );
            return Ok(());
        }

        if share.difficulty / miner.difficulty() >= self.config.low_difficulty_ratio {
            return Ok(());
        }

        if miner.previous_difficulty() > 0.0 && share.difficulty >= miner.previous_difficulty() {
            debug!(
                difficulty = share.difficulty,
                previous_difficulty = miner.previous_difficulty(),
                "accepted at previous difficulty"
            );
            return Ok(());
        }

        Err(ShareError::LowDifficultyShare)
    }

    fn is_legacy_miner(&self, miner: &Miner) -> bool {
        miner.software().is_some_and(|software| {
            self.config
                .legacy_negative_difficulty_miners
                .iter()
                .any(|legacy| software.matches(legacy))
        })
    }
}
