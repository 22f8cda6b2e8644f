//! Cuckoo Pool command-line tools

use clap::Parser;
use cuckoo_pool_core::{
    Error, Result, VERSION,
    config::{Args, Command, Config},
    core::verify_cycle,
    stratum::{BlockTemplate, EXTRA_NONCE_PLACEHOLDER, decode_hex},
    transaction::GenerationTransaction,
    utils::{self, current_timestamp},
};
use std::path::Path;
use tracing::{debug, info};

fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::from_args(&args)?;
    utils::init_logging(&config.logging.level, &config.logging.format)?;
    debug!(version = VERSION, "cuckoo-pool starting");

    match args.command {
        Command::VerifyCycle {
            block_hash,
            edge_bits,
            cycle,
        } => run_verify_cycle(&block_hash, edge_bits, &cycle),
        Command::SplitCoinbase {
            template,
            timestamp,
        } => run_split_coinbase(&config, &template, timestamp),
        Command::CheckConfig => {
            print!("{}", config.to_toml()?);
            Ok(())
        }
    }
}

fn run_verify_cycle(block_hash: &str, edge_bits: u32, cycle: &[u32]) -> Result<()> {
    let hash = decode_hex(block_hash)?;
    verify_cycle(&hash, edge_bits, cycle)
        .map_err(|e| Error::other(format!("Invalid cycle: {}", e)))?;
    println!("ok");
    Ok(())
}

fn run_split_coinbase(config: &Config, path: &Path, timestamp: Option<u64>) -> Result<()> {
    let template = BlockTemplate::from_json(&std::fs::read_to_string(path)?)?;
    let context = config.job_context()?;
    let timestamp = timestamp.unwrap_or_else(current_timestamp);

    let generation = GenerationTransaction::create(
        &template,
        &EXTRA_NONCE_PLACEHOLDER,
        &context.generation,
        timestamp,
    )?;
    info!(height = template.height, timestamp, "split coinbase");

    println!("initial {}", hex::encode(generation.initial()));
    println!("final {}", hex::encode(generation.final_part()));
    Ok(())
}
