//! Job management for Stratum protocol
//!
//! A job is built once from a `getblocktemplate` response and holds everything the
//! share pipeline needs to rebuild a miner's block: the split generation transaction,
//! the Merkle branch, the fixed header fields, the target and the registry of shares
//! already seen for it.

use crate::core::cuckoo::edge_mask;
use crate::core::difficulty::{parse_target, target_difficulty};
use crate::core::HashAlgorithm;
use crate::error::{Error, Result};
use crate::stratum::hex::{decode_display_hash, decode_hex, parse_u32_be};
use crate::transaction::{GenerationOptions, GenerationTransaction, HeaderTemplate, MerkleTree};
use crate::utils::current_timestamp;
use dashmap::DashSet;
use num_bigint::BigInt;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;
use tracing::{debug, info};

/// Transaction entry of a block template
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateTransaction {
    /// Raw transaction hex
    pub data: String,
    /// Transaction id in display order
    #[serde(default)]
    pub txid: String,
    /// Witness hash in display order
    #[serde(default)]
    pub hash: String,
}

/// Extra data the node wants in the coinbase script
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoinbaseAux {
    /// Script bytes as hex
    #[serde(default)]
    pub flags: String,
}

/// `getblocktemplate` response
///
/// The first transaction is the node's coinbase skeleton; the rest go into the block
/// as they are.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockTemplate {
    /// Block version
    pub version: u32,
    /// Previous block hash in display order
    #[serde(rename = "previousblockhash")]
    pub previous_block_hash: String,
    /// Coinbase skeleton followed by the block's transactions
    pub transactions: Vec<TemplateTransaction>,
    /// Coinbase aux flags
    #[serde(rename = "coinbaseaux", default)]
    pub coinbase_aux: CoinbaseAux,
    /// Block reward plus fees
    #[serde(rename = "coinbasevalue", default)]
    pub coinbase_value: u64,
    /// Network target as big-endian hex
    pub target: String,
    /// Earliest acceptable nTime
    #[serde(rename = "curtime")]
    pub cur_time: u64,
    /// Compact target as hex
    pub bits: String,
    /// Block height
    pub height: u64,
    /// Cuckoo graph size
    #[serde(rename = "edgebits")]
    pub edge_bits: u32,
}

impl BlockTemplate {
    /// Parse a template from its JSON form
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Raw bytes of the coinbase skeleton
    pub fn coinbase_bytes(&self) -> Result<Vec<u8>> {
        let coinbase = self
            .transactions
            .first()
            .ok_or_else(|| Error::invalid_template("no coinbase transaction"))?;
        decode_hex(&coinbase.data)
    }

    /// Decoded coinbase aux flags
    pub fn coinbase_flags(&self) -> Result<Vec<u8>> {
        decode_hex(&self.coinbase_aux.flags)
    }

    /// Transactions after the coinbase
    pub fn block_transactions(&self) -> &[TemplateTransaction] {
        self.transactions.get(1..).unwrap_or(&[])
    }
}

/// Job identifier with hex encoding support
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(String);

impl JobId {
    /// Create a new job ID from integer
    pub fn new(id: u64) -> Self {
        JobId(format!("{:x}", id))
    }

    /// Get the job ID as string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parse job ID from hex string
    pub fn from_hex(hex: &str) -> Result<Self> {
        u64::from_str_radix(hex, 16)
            .map_err(|_| Error::invalid_hex(format!("Invalid job ID hex: {}", hex)))?;
        Ok(JobId(hex.to_string()))
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Everything that makes two submissions the same share
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShareFingerprint {
    /// Pool-assigned extranonce
    pub extra_nonce1: u32,
    /// Miner-chosen extranonce
    pub extra_nonce2: u32,
    /// Submitted header time
    pub ntime: u32,
    /// Submitted header nonce
    pub nonce: u32,
    /// Submitted proof
    pub cycle: Vec<u32>,
}

/// Pool-wide settings every job is built with
#[derive(Debug, Clone)]
pub struct JobContext {
    /// Header and cycle hash function
    pub algorithm: HashAlgorithm,
    /// Difficulty-1 target
    pub diff1: BigInt,
    /// Bytes reserved for the extranonces
    pub placeholder: Vec<u8>,
    /// Coinbase shaping
    pub generation: GenerationOptions,
}

/// Mining job information
#[derive(Debug)]
pub struct Job {
    id: JobId,
    template: BlockTemplate,
    generation: GenerationTransaction,
    merkle_tree: MerkleTree,
    header: HeaderTemplate,
    transactions: Vec<Vec<u8>>,
    algorithm: HashAlgorithm,
    target: BigInt,
    difficulty: f64,
    created_at: SystemTime,
    clean_jobs: bool,
    shares: DashSet<ShareFingerprint>,
}

impl Job {
    /// Build a job from a template, stamping its coinbase with `timestamp`
    pub fn new(id: JobId, template: BlockTemplate, context: &JobContext, timestamp: u64) -> Result<Self> {
        edge_mask(template.edge_bits).map_err(|e| Error::invalid_template(e.to_string()))?;
        // bounded by the mask check above
        let edge_bits = template.edge_bits as u8;

        let generation = GenerationTransaction::create(
            &template,
            &context.placeholder,
            &context.generation,
            timestamp,
        )?;

        let txids: Vec<&str> = template
            .block_transactions()
            .iter()
            .map(|tx| tx.txid.as_str())
            .collect();
        let merkle_tree = MerkleTree::from_txids(&txids)?;

        let transactions = template
            .block_transactions()
            .iter()
            .map(|tx| decode_hex(&tx.data))
            .collect::<Result<Vec<_>>>()?;

        let bits = parse_u32_be(&template.bits)
            .ok_or_else(|| Error::invalid_template(format!("bits: {}", template.bits)))?;
        let header = HeaderTemplate {
            version: template.version,
            previous_block_hash: decode_display_hash(&template.previous_block_hash)?,
            bits,
            edge_bits,
        };

        let target = parse_target(&template.target)?;
        let difficulty = target_difficulty(&context.diff1, &target);

        debug!(
            job_id = %id,
            height = template.height,
            difficulty,
            transactions = transactions.len(),
            "created job"
        );

        Ok(Self {
            id,
            template,
            generation,
            merkle_tree,
            header,
            transactions,
            algorithm: context.algorithm,
            target,
            difficulty,
            created_at: SystemTime::now(),
            clean_jobs: false,
            shares: DashSet::new(),
        })
    }

    /// Mark this job as replacing all earlier ones
    pub fn with_clean_jobs(mut self, clean_jobs: bool) -> Self {
        self.clean_jobs = clean_jobs;
        self
    }

    /// Record a share, returning `false` if the same share was seen before
    pub fn register_share(&self, fingerprint: ShareFingerprint) -> bool {
        self.shares.insert(fingerprint)
    }

    /// Number of distinct shares registered
    pub fn share_count(&self) -> usize {
        self.shares.len()
    }

    /// Job identifier
    pub fn id(&self) -> &JobId {
        &self.id
    }

    /// Template the job was built from
    pub fn template(&self) -> &BlockTemplate {
        &self.template
    }

    /// Split generation transaction
    pub fn generation(&self) -> &GenerationTransaction {
        &self.generation
    }

    /// Merkle branch for the coinbase
    pub fn merkle_tree(&self) -> &MerkleTree {
        &self.merkle_tree
    }

    /// Fixed header fields
    pub fn header(&self) -> &HeaderTemplate {
        &self.header
    }

    /// Raw non-coinbase transactions
    pub fn transactions(&self) -> &[Vec<u8>] {
        &self.transactions
    }

    /// Header and cycle hash function
    pub fn algorithm(&self) -> &HashAlgorithm {
        &self.algorithm
    }

    /// Network target
    pub fn target(&self) -> &BigInt {
        &self.target
    }

    /// Network difficulty
    pub fn difficulty(&self) -> f64 {
        self.difficulty
    }

    /// Cuckoo graph size
    pub fn edge_bits(&self) -> u32 {
        u32::from(self.header.edge_bits)
    }

    /// Block height
    pub fn height(&self) -> u64 {
        self.template.height
    }

    /// Whether this job replaces earlier ones
    pub fn clean_jobs(&self) -> bool {
        self.clean_jobs
    }

    /// Get job age in seconds
    pub fn age_seconds(&self) -> u64 {
        self.created_at.elapsed().unwrap_or_default().as_secs()
    }

    /// Check if job is expired (older than max_age_seconds)
    pub fn is_expired(&self, max_age_seconds: u64) -> bool {
        self.age_seconds() > max_age_seconds
    }
}

/// Job manager for tracking active mining jobs
#[derive(Debug)]
pub struct JobManager {
    /// Job counter for generating unique IDs
    job_counter: AtomicU64,
    /// Active jobs by job ID
    jobs: parking_lot::RwLock<HashMap<JobId, Arc<Job>>>,
    /// Maximum number of jobs to keep
    max_jobs: usize,
    /// Maximum job age in seconds
    max_job_age_seconds: u64,
}

impl JobManager {
    /// Create a new job manager
    pub fn new(max_jobs: usize, max_job_age_seconds: u64) -> Self {
        Self {
            job_counter: AtomicU64::new(0),
            jobs: parking_lot::RwLock::new(HashMap::new()),
            max_jobs,
            max_job_age_seconds,
        }
    }

    /// Generate next job ID
    pub fn next_job_id(&self) -> JobId {
        let id = self.job_counter.fetch_add(1, Ordering::Relaxed);
        JobId::new(id)
    }

    /// Build a job from a fresh template and start tracking it
    pub fn create_job(
        &self,
        template: BlockTemplate,
        context: &JobContext,
        clean_jobs: bool,
    ) -> Result<Arc<Job>> {
        let job = Job::new(self.next_job_id(), template, context, current_timestamp())?
            .with_clean_jobs(clean_jobs);
        Ok(self.add_job(job))
    }

    /// Add a new job
    pub fn add_job(&self, job: Job) -> Arc<Job> {
        let job = Arc::new(job);
        let mut jobs = self.jobs.write();

        // If this is a clean job, clear all existing jobs first
        if job.clean_jobs {
            jobs.clear();
        } else {
            Self::cleanup_jobs_internal(&mut jobs, self.max_job_age_seconds);
        }

        jobs.insert(job.id.clone(), Arc::clone(&job));

        if jobs.len() > self.max_jobs {
            let oldest_job_id = jobs
                .iter()
                .min_by_key(|(_, job)| job.created_at)
                .map(|(id, _)| id.clone());

            if let Some(job_id) = oldest_job_id {
                jobs.remove(&job_id);
            }
        }

        info!(job_id = %job.id, height = job.height(), clean_jobs = job.clean_jobs, "new job");
        job
    }

    /// Get a job by ID
    pub fn get_job(&self, job_id: &JobId) -> Option<Arc<Job>> {
        self.jobs.read().get(job_id).cloned()
    }

    /// Remove a job
    pub fn remove_job(&self, job_id: &JobId) -> Option<Arc<Job>> {
        self.jobs.write().remove(job_id)
    }

    /// Clean up expired jobs
    pub fn cleanup_jobs(&self) -> usize {
        let mut jobs = self.jobs.write();
        Self::cleanup_jobs_internal(&mut jobs, self.max_job_age_seconds)
    }

    fn cleanup_jobs_internal(jobs: &mut HashMap<JobId, Arc<Job>>, max_age: u64) -> usize {
        let initial_count = jobs.len();
        jobs.retain(|_, job| !job.is_expired(max_age));
        initial_count - jobs.len()
    }

    /// Drop every tracked job
    pub fn clean_all_jobs(&self) {
        self.jobs.write().clear();
    }

    /// Get job count
    pub fn job_count(&self) -> usize {
        self.jobs.read().len()
    }
}

impl Default for JobManager {
    fn default() -> Self {
        Self::new(64, 600)
    }
}

/// Shared job manager instance
pub type SharedJobManager = Arc<JobManager>;
