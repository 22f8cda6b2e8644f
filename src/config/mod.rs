//! Configuration management for the pool core

use crate::core::constants::{MAX_INSTANCE_ID, NTIME_FUTURE_TOLERANCE_SECS};
use crate::core::{HashAlgorithm, HashFunction, diff1};
use crate::error::{Error, Result};
use crate::stratum::{
    EXTRA_NONCE_PLACEHOLDER, ExtraNonceCounter, JobContext, JobManager, MinerId, MinerManager,
    MinerSoftware, ValidatorConfig,
};
use crate::transaction::GenerationOptions;
use crate::utils::logging::LOG_FORMATS;
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Longest pool tag that keeps the coinbase script within consensus limits
pub const MAX_COINBASE_TAG_LEN: usize = 64;

/// Command-line arguments
#[derive(Parser, Debug)]
#[clap(
    name = "cuckoo-pool",
    about = "Share validation tools for Cuckoo Cycle mining pools",
    version,
    author
)]
pub struct Args {
    /// Configuration file path
    #[clap(short, long, value_name = "FILE", env = "CUCKOO_POOL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log level, overrides the configuration file
    #[clap(short, long, env = "CUCKOO_POOL_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Log format (plain, pretty, json), overrides the configuration file
    #[clap(long)]
    pub log_format: Option<String>,

    /// Command to run
    #[clap(subcommand)]
    pub command: Command,
}

/// Subcommands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Check a Cuckoo Cycle proof against a block hash
    VerifyCycle {
        /// Block hash as hex
        #[clap(long)]
        block_hash: String,

        /// Graph size in bits
        #[clap(long)]
        edge_bits: u32,

        /// Comma-separated edge indices
        #[clap(long, value_delimiter = ',')]
        cycle: Vec<u32>,
    },

    /// Split a block template's coinbase at the extranonce slot
    SplitCoinbase {
        /// `getblocktemplate` response as JSON
        #[clap(long, value_name = "FILE")]
        template: PathBuf,

        /// Script timestamp, defaults to now
        #[clap(long)]
        timestamp: Option<u64>,
    },

    /// Validate the configuration and print it
    CheckConfig,
}

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Pool identity and coinbase settings
    #[serde(default)]
    pub pool: PoolConfig,

    /// Header and cycle hash function
    #[serde(default)]
    pub algorithm: AlgorithmConfig,

    /// Stratum job and miner settings
    #[serde(default)]
    pub stratum: StratumConfig,

    /// Share validation policy
    #[serde(default)]
    pub validation: ValidationConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Pool identity and coinbase settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Instance id encoded in every extranonce1
    #[serde(default = "default_instance_id")]
    pub instance_id: u32,

    /// Pool signature in the coinbase script
    #[serde(default = "default_coinbase_tag")]
    pub coinbase_tag: String,

    /// Trailing coinbase message
    #[serde(default)]
    pub tx_message: String,

    /// Whether the coin carries a coinbase message
    #[serde(default)]
    pub tx_message_supported: bool,

    /// Append the proof-of-stake marker byte to blocks
    #[serde(default)]
    pub proof_of_stake_hybrid: bool,
}

/// Hash function configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlgorithmConfig {
    /// Hash function name
    #[serde(default)]
    pub name: HashFunction,

    /// Difficulty normalisation scalar
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
}

/// Stratum job and miner settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StratumConfig {
    /// Difficulty given to newly authenticated miners
    #[serde(default = "default_initial_difficulty")]
    pub initial_difficulty: f64,

    /// Number of jobs kept for late submissions
    #[serde(default = "default_max_jobs")]
    pub max_jobs: usize,

    /// Age after which a job is dropped
    #[serde(default = "default_job_max_age")]
    pub job_max_age_secs: u64,
}

/// A miner release whose negative difficulty shares are tolerated
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyMiner {
    /// Software name
    pub software: String,
    /// Exact version
    pub version: String,
}

/// Share validation policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// How far in the future a share's nTime may be
    #[serde(default = "default_ntime_tolerance")]
    pub ntime_future_tolerance_secs: u64,

    /// Minimum share-to-miner difficulty ratio
    #[serde(default = "default_low_difficulty_ratio")]
    pub low_difficulty_ratio: f64,

    /// Miner releases exempt from negative difficulty penalties
    #[serde(default = "default_legacy_miners")]
    pub legacy_negative_difficulty_miners: Vec<LegacyMiner>,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (plain, pretty, json)
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_instance_id() -> u32 {
    1
}

fn default_coinbase_tag() -> String {
    "/cuckoo-pool/".to_string()
}

fn default_multiplier() -> f64 {
    1.0
}

fn default_initial_difficulty() -> f64 {
    16.0
}

fn default_max_jobs() -> usize {
    64
}

fn default_job_max_age() -> u64 {
    600
}

fn default_ntime_tolerance() -> u64 {
    NTIME_FUTURE_TOLERANCE_SECS
}

fn default_low_difficulty_ratio() -> f64 {
    0.99
}

fn default_legacy_miners() -> Vec<LegacyMiner> {
    vec![LegacyMiner {
        software: "merit-miner".to_string(),
        version: "0.1.0".to_string(),
    }]
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "plain".to_string()
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            instance_id: default_instance_id(),
            coinbase_tag: default_coinbase_tag(),
            tx_message: String::new(),
            tx_message_supported: false,
            proof_of_stake_hybrid: false,
        }
    }
}

impl Default for AlgorithmConfig {
    fn default() -> Self {
        Self {
            name: HashFunction::default(),
            multiplier: default_multiplier(),
        }
    }
}

impl Default for StratumConfig {
    fn default() -> Self {
        Self {
            initial_difficulty: default_initial_difficulty(),
            max_jobs: default_max_jobs(),
            job_max_age_secs: default_job_max_age(),
        }
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            ntime_future_tolerance_secs: default_ntime_tolerance(),
            low_difficulty_ratio: default_low_difficulty_ratio(),
            legacy_negative_difficulty_miners: default_legacy_miners(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("Failed to read config file: {}", e)))?;

        let config: Self = toml::from_str(&contents)
            .map_err(|e| Error::config(format!("Failed to parse config file: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Create configuration from command-line arguments
    pub fn from_args(args: &Args) -> Result<Self> {
        let mut config = match &args.config {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        if let Some(level) = &args.log_level {
            config.logging.level = level.clone();
        }
        if let Some(format) = &args.log_format {
            config.logging.format = format.clone();
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.pool.instance_id > MAX_INSTANCE_ID {
            return Err(Error::config(format!(
                "Instance id must be between 0 and {}",
                MAX_INSTANCE_ID
            )));
        }

        if self.pool.coinbase_tag.len() > MAX_COINBASE_TAG_LEN {
            return Err(Error::config(format!(
                "Coinbase tag must be at most {} bytes",
                MAX_COINBASE_TAG_LEN
            )));
        }

        if !(self.algorithm.multiplier.is_finite() && self.algorithm.multiplier > 0.0) {
            return Err(Error::config("Algorithm multiplier must be positive"));
        }

        if !(self.stratum.initial_difficulty.is_finite() && self.stratum.initial_difficulty > 0.0) {
            return Err(Error::config("Initial difficulty must be positive"));
        }

        if self.stratum.max_jobs == 0 {
            return Err(Error::config("Max jobs must be greater than 0"));
        }

        let ratio = self.validation.low_difficulty_ratio;
        if !(ratio > 0.0 && ratio <= 1.0) {
            return Err(Error::config(
                "Low difficulty ratio must be in (0, 1]",
            ));
        }

        if !LOG_FORMATS.contains(&self.logging.format.as_str()) {
            return Err(Error::config(format!(
                "Unknown log format: {}",
                self.logging.format
            )));
        }

        Ok(())
    }

    /// Hash algorithm descriptor
    pub fn hash_algorithm(&self) -> Result<HashAlgorithm> {
        HashAlgorithm::new(self.algorithm.name, self.algorithm.multiplier)
    }

    /// Settings every job is built with
    pub fn job_context(&self) -> Result<JobContext> {
        Ok(JobContext {
            algorithm: self.hash_algorithm()?,
            diff1: diff1(),
            placeholder: EXTRA_NONCE_PLACEHOLDER.to_vec(),
            generation: GenerationOptions {
                coinbase_tag: self.pool.coinbase_tag.clone(),
                tx_message: self.pool.tx_message.clone(),
                tx_message_supported: self.pool.tx_message_supported,
            },
        })
    }

    /// Share validation policy
    pub fn validator_config(&self) -> ValidatorConfig {
        ValidatorConfig {
            diff1: diff1(),
            ntime_future_tolerance_secs: self.validation.ntime_future_tolerance_secs,
            low_difficulty_ratio: self.validation.low_difficulty_ratio,
            legacy_negative_difficulty_miners: self
                .validation
                .legacy_negative_difficulty_miners
                .iter()
                .map(|legacy| MinerSoftware::new(&legacy.software, &legacy.version))
                .collect(),
            proof_of_stake_hybrid: self.pool.proof_of_stake_hybrid,
        }
    }

    /// Extranonce1 source for this instance
    pub fn extra_nonce_counter(&self) -> Result<ExtraNonceCounter> {
        ExtraNonceCounter::new(self.pool.instance_id)
    }

    /// Job registry sized by the `[stratum]` section
    pub fn job_manager(&self) -> JobManager {
        JobManager::new(self.stratum.max_jobs, self.stratum.job_max_age_secs)
    }

    /// Miner registry drawing extranonces for this instance
    pub fn miner_manager(&self) -> Result<MinerManager> {
        Ok(MinerManager::new(Arc::new(self.extra_nonce_counter()?)))
    }

    /// Authenticate a miner at the configured starting difficulty
    pub fn authenticate_miner(&self, miners: &MinerManager, id: MinerId, username: &str) -> bool {
        miners.authenticate(id, username, self.stratum.initial_difficulty)
    }

    /// Render as TOML
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}
