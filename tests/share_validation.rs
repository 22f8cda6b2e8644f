//! End-to-end share validation against real edge-bits-11 proofs

use cuckoo_pool_core::config::Config;
use cuckoo_pool_core::core::CycleError;
use cuckoo_pool_core::stratum::{
    BlockTemplate, ConnectionId, ExtraNonceCounter, Job, JobId, Miner, MinerArgs, MinerManager,
    MinerProtocol, Share, ShareError, ShareSubmission, ShareValidator,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::sync::Arc;

const TEMPLATE_JSON: &str = include_str!("fixtures/block_template.json");

/// Template time, coinbase timestamp and receive time of every submission
const NOW: u64 = 1_700_000_000;
const EXTRA_NONCE2: &str = "00000001";
const NTIME: &str = "6553f100";

const TX1: &str = "0100000001abababababababababababababababababababababababababababababababab0000000000ffffffff0100000000000000000000000000";
const COINBASE: &str = "01000000010000000000000000000000000000000000000000000000000000000000000000ffffffff270340e201062f503253482f0400f153650808000001000000010d2f6375636b6f6f2d706f6f6c2fffffffff0100f2052a010000001976a914111111111111111111111111111111111111111188ac00000000";

const EASY_TARGET: &str = "0000000000000000000000000000000000000000000000000000000000000001";
const OPEN_TARGET: &str = "ffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffff";

/// Proof whose cycle hash is a positive integer
mod positive {
    pub const NONCE: &str = "0000049c";
    pub const HEADER: &str = "000000206fe28c0ab6f1b372c1a6a246ae63f74f931e8365e15a089c68d619000000000021e6869fdad11bf82fc0c2b750ee7695aa4bd3d9504408b5bb161d34df2b82b500f15365ffff001d9c0400000b";
    pub const BLOCK_HASH: &str = "348ccecb2a8338c9c285570064e4a0ef94f041a62e22dc98e70387a99fcdd4a8";
    pub const CYCLE: [u32; 42] = [
        49, 54, 122, 142, 197, 247, 375, 420, 530, 707, 740, 815, 821, 866, 958, 1025, 1040,
        1041, 1147, 1148, 1158, 1163, 1188, 1203, 1208, 1219, 1267, 1301, 1333, 1351, 1468, 1473,
        1490, 1611, 1637, 1655, 1668, 1705, 1765, 1873, 1875, 2015,
    ];
    pub const DIFFICULTY: f64 = 9.3233299797765e-10;
}

/// Proof whose cycle hash is a negative integer
mod negative {
    pub const NONCE: &str = "000000fc";
    pub const BLOCK_HASH: &str = "88e529a18ac19a3dd35b3ef64eb9778914c4948e9e00934de8483a075e40ff73";
    pub const CYCLE: [u32; 42] = [
        32, 153, 250, 265, 311, 355, 453, 557, 565, 587, 600, 636, 692, 695, 728, 738, 804, 838,
        900, 1040, 1055, 1157, 1177, 1194, 1199, 1281, 1382, 1395, 1396, 1439, 1508, 1522, 1569,
        1675, 1696, 1705, 1726, 1786, 1827, 1899, 1960, 2012,
    ];
    pub const DIFFICULTY: f64 = -1.9664857551227707e-09;
}

fn job(target: &str) -> Job {
    let mut template = BlockTemplate::from_json(TEMPLATE_JSON).unwrap();
    template.target = target.to_string();
    let context = Config::default().job_context().unwrap();
    Job::new(JobId::new(1), template, &context, NOW).unwrap()
}

fn manager() -> MinerManager {
    MinerManager::new(Arc::new(ExtraNonceCounter::new(1).unwrap()))
}

fn miner_with(user_agent: &str, difficulty: f64) -> Miner {
    let manager = manager();
    let miner = manager.create(
        MinerProtocol::Stratum,
        MinerArgs {
            connection: ConnectionId(1),
            user_agent: Some(user_agent.to_string()),
        },
    );
    assert!(manager.authenticate(miner.id(), "alice", difficulty));
    manager.get(miner.id()).unwrap()
}

fn miner(difficulty: f64) -> Miner {
    miner_with("cgminer/4.10.0", difficulty)
}

fn submission(nonce: &str, cycle: &[u32]) -> ShareSubmission {
    ShareSubmission {
        job_id: "1".to_string(),
        extra_nonce2: EXTRA_NONCE2.to_string(),
        ntime: NTIME.to_string(),
        nonce: nonce.to_string(),
        cycle: cycle.to_vec(),
    }
}

fn validate(miner: &Miner, job: Option<&Job>, submission: &ShareSubmission) -> Share {
    ShareValidator::default().validate_at(NOW, miner, job, submission)
}

fn assert_close(actual: f64, expected: f64) {
    assert!(
        ((actual - expected) / expected).abs() < 1e-12,
        "{} != {}",
        actual,
        expected
    );
}

#[test]
fn test_rebuilds_coinbase_and_header() {
    let job = job(EASY_TARGET);
    let share = validate(
        &miner(positive::DIFFICULTY),
        Some(&job),
        &submission(positive::NONCE, &positive::CYCLE),
    );

    assert_eq!(hex::encode(&share.coinbase), COINBASE);
    assert_eq!(hex::encode(&share.header), positive::HEADER);
    assert_eq!(share.block_hash_hex(), positive::BLOCK_HASH);
    assert_eq!(share.extra_nonce1, 0x0800_0001);
    assert_eq!(share.extra_nonce2, 1);
    assert_eq!(share.ntime, 0x6553_f100);
    assert_eq!(share.nonce, 0x049c);
    assert_eq!(share.height, 123_456);
    assert_eq!(share.cycle_bytes.len(), 1 + 4 * 42);
    assert_close(share.difficulty, positive::DIFFICULTY);
}

#[test]
fn test_accepts_share_at_miner_difficulty() {
    let job = job(EASY_TARGET);
    let share = validate(
        &miner(9.3e-10),
        Some(&job),
        &submission(positive::NONCE, &positive::CYCLE),
    );

    assert_eq!(share.error, None);
    assert!(share.is_valid());
    assert!(!share.is_block_candidate);
    assert!(share.block_hex.is_none());
    assert!(share.block_diff_adjusted > 1e60);
}

#[test]
fn test_rejects_low_difficulty_share() {
    let job = job(EASY_TARGET);
    let share = validate(
        &miner(9.6e-10),
        Some(&job),
        &submission(positive::NONCE, &positive::CYCLE),
    );

    assert_eq!(share.error, Some(ShareError::LowDifficultyShare));
    assert!(!share.is_block_candidate);
    assert_close(share.difficulty, positive::DIFFICULTY);
}

#[test]
fn test_accepts_previous_difficulty_after_retarget() {
    let manager = manager();
    let miner = manager.create(
        MinerProtocol::Stratum,
        MinerArgs {
            connection: ConnectionId(7),
            user_agent: None,
        },
    );
    manager.authenticate(miner.id(), "alice", 9.0e-10);
    manager.set_difficulty(miner.id(), 9.6e-10);
    let miner = manager.get(miner.id()).unwrap();
    assert_eq!(miner.previous_difficulty(), 9.0e-10);

    let job = job(EASY_TARGET);
    let share = validate(&miner, Some(&job), &submission(positive::NONCE, &positive::CYCLE));
    assert_eq!(share.error, None);
}

#[test]
fn test_previous_difficulty_must_be_met() {
    let manager = manager();
    let miner = manager.create(
        MinerProtocol::Stratum,
        MinerArgs {
            connection: ConnectionId(7),
            user_agent: None,
        },
    );
    manager.authenticate(miner.id(), "alice", 9.5e-10);
    manager.set_difficulty(miner.id(), 9.6e-10);
    let miner = manager.get(miner.id()).unwrap();

    let job = job(EASY_TARGET);
    let share = validate(&miner, Some(&job), &submission(positive::NONCE, &positive::CYCLE));
    assert_eq!(share.error, Some(ShareError::LowDifficultyShare));
}

#[test]
fn test_block_candidate() {
    let job = job(OPEN_TARGET);
    let share = validate(
        &miner(1_000.0),
        Some(&job),
        &submission(positive::NONCE, &positive::CYCLE),
    );

    assert_eq!(share.error, None);
    assert!(share.is_block_candidate);

    let cycle_hex: String = positive::CYCLE
        .iter()
        .map(|edge| hex::encode(edge.to_le_bytes()))
        .collect();
    let expected = format!("{}2a{}02{}{}", positive::HEADER, cycle_hex, COINBASE, TX1);
    assert_eq!(share.block_hex.as_deref(), Some(expected.as_str()));
}

#[test]
fn test_block_candidate_proof_of_stake_hybrid() {
    let mut config = Config::default();
    config.pool.proof_of_stake_hybrid = true;
    let validator = ShareValidator::new(config.validator_config());

    let job = job(OPEN_TARGET);
    let share = validator.validate_at(
        NOW,
        &miner(1.0),
        Some(&job),
        &submission(positive::NONCE, &positive::CYCLE),
    );
    let block = share.block_hex.unwrap();
    assert!(block.ends_with(&format!("{}00", TX1)));
}

#[test]
fn test_negative_difficulty_rejected() {
    let job = job(EASY_TARGET);
    let share = validate(
        &miner(1.0),
        Some(&job),
        &submission(negative::NONCE, &negative::CYCLE),
    );

    assert_eq!(share.block_hash_hex(), negative::BLOCK_HASH);
    assert_close(share.difficulty, negative::DIFFICULTY);
    assert_eq!(share.error, Some(ShareError::NegativeDifficultyShare));
    assert!(!share.is_block_candidate);
    assert!(share.block_hex.is_none());
}

#[test]
fn test_negative_difficulty_from_legacy_miner() {
    let job = job(EASY_TARGET);
    let share = validate(
        &miner_with("merit-miner/0.1.0", 1.0),
        Some(&job),
        &submission(negative::NONCE, &negative::CYCLE),
    );

    let error = share.error.unwrap();
    assert_eq!(error, ShareError::NegativeDifficultyShareOutdatedMiner);
    assert!(!error.is_penalizable());
    assert!(share.block_hex.is_none());

    let job = self::job(EASY_TARGET);
    let share = validate(
        &miner_with("merit-miner/0.1.1", 1.0),
        Some(&job),
        &submission(negative::NONCE, &negative::CYCLE),
    );
    assert_eq!(share.error, Some(ShareError::NegativeDifficultyShare));
}

#[test]
fn test_duplicate_share() {
    let job = job(EASY_TARGET);
    let miner = miner(9.3e-10);
    let submit = submission(positive::NONCE, &positive::CYCLE);

    assert!(validate(&miner, Some(&job), &submit).is_valid());
    let again = validate(&miner, Some(&job), &submit);
    assert_eq!(again.error, Some(ShareError::DuplicateShare));
    assert!(again.coinbase.is_empty());
    assert_eq!(job.share_count(), 1);
}

#[test]
fn test_concurrent_duplicates_accept_once() {
    let job = job(EASY_TARGET);
    let miner = miner(9.3e-10);
    let submit = submission(positive::NONCE, &positive::CYCLE);
    let validator = ShareValidator::default();

    let accepted: usize = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                scope.spawn(|| validator.validate_at(NOW, &miner, Some(&job), &submit).is_valid() as usize)
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).sum()
    });
    assert_eq!(accepted, 1);
}

#[test]
fn test_job_not_found() {
    let share = validate(&miner(1.0), None, &submission(positive::NONCE, &positive::CYCLE));
    assert_eq!(share.error, Some(ShareError::JobNotFound));
    assert_eq!(share.job_id, "1");
}

#[test]
fn test_field_size_errors() {
    let job = job(EASY_TARGET);
    let miner = miner(1.0);
    let cases = [
        (("0001", NTIME, positive::NONCE), ShareError::IncorrectExtraNonce2Size),
        (("0000000001", NTIME, positive::NONCE), ShareError::IncorrectExtraNonce2Size),
        (("zzzzzzzz", NTIME, positive::NONCE), ShareError::IncorrectExtraNonce2Size),
        ((EXTRA_NONCE2, "6553f10", positive::NONCE), ShareError::IncorrectNTimeSize),
        ((EXTRA_NONCE2, "6553f1000", positive::NONCE), ShareError::IncorrectNTimeSize),
        ((EXTRA_NONCE2, "6553g100", positive::NONCE), ShareError::IncorrectNTimeSize),
        ((EXTRA_NONCE2, NTIME, "49c"), ShareError::IncorrectNonceSize),
        ((EXTRA_NONCE2, NTIME, "00000049c"), ShareError::IncorrectNonceSize),
        ((EXTRA_NONCE2, NTIME, "0000049x"), ShareError::IncorrectNonceSize),
    ];

    for ((extra_nonce2, ntime, nonce), expected) in cases {
        let submit = ShareSubmission {
            job_id: "1".to_string(),
            extra_nonce2: extra_nonce2.to_string(),
            ntime: ntime.to_string(),
            nonce: nonce.to_string(),
            cycle: positive::CYCLE.to_vec(),
        };
        let share = validate(&miner, Some(&job), &submit);
        assert_eq!(share.error, Some(expected), "{:?}", submit);
    }

    // Rejected submissions never reach the duplicate registry
    assert_eq!(job.share_count(), 0);
    assert!(
        validate(&miner, Some(&job), &submission(positive::NONCE, &positive::CYCLE)).is_valid()
    );
}

#[test]
fn test_ntime_range() {
    let job = job(EASY_TARGET);
    let miner = miner(1.0);
    let with_ntime = |ntime: &str| ShareSubmission {
        ntime: ntime.to_string(),
        ..submission(positive::NONCE, &positive::CYCLE)
    };

    // one second before curtime
    let share = validate(&miner, Some(&job), &with_ntime("6553f0ff"));
    assert_eq!(share.error, Some(ShareError::NTimeOutOfRange));

    // one second past the future tolerance
    let share = validate(&miner, Some(&job), &with_ntime("65540d21"));
    assert_eq!(share.error, Some(ShareError::NTimeOutOfRange));

    // at the tolerance edge the header changes, so the proof no longer fits
    let share = validate(&miner, Some(&job), &with_ntime("65540d20"));
    assert!(matches!(share.error, Some(ShareError::IncorrectCycle(_))));
}

#[test]
fn test_incorrect_cycle() {
    let job = job(EASY_TARGET);
    let miner = miner(1.0);

    let share = validate(&miner, Some(&job), &submission(negative::NONCE, &positive::CYCLE));
    assert_eq!(
        share.error,
        Some(ShareError::IncorrectCycle(CycleError::EndpointsDontMatch))
    );
    assert!(share.cycle_bytes.is_empty());

    let mut swapped = positive::CYCLE;
    swapped.swap(0, 1);
    let share = validate(&miner, Some(&job), &submission(positive::NONCE, &swapped));
    assert_eq!(
        share.error,
        Some(ShareError::IncorrectCycle(CycleError::EdgesNotIncreasing { index: 1 }))
    );

    let share = validate(&miner, Some(&job), &submission(positive::NONCE, &positive::CYCLE[..41]));
    assert_eq!(share.error, Some(ShareError::IncorrectCycle(CycleError::WrongLength(41))));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_other_extranonce2_breaks_proof(extra_nonce2 in any::<u32>().prop_filter("fixture value", |v| *v != 1)) {
        let job = job(EASY_TARGET);
        let submit = ShareSubmission {
            extra_nonce2: format!("{:08x}", extra_nonce2),
            ..submission(positive::NONCE, &positive::CYCLE)
        };
        let share = validate(&miner(1.0), Some(&job), &submit);
        prop_assert!(matches!(share.error, Some(ShareError::IncorrectCycle(_))));
        prop_assert_eq!(share.extra_nonce2, extra_nonce2);
    }
}
