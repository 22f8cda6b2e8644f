//! Generation (coinbase) transaction splitting
//!
//! The pool rewrites the template's coinbase signature script once per job and splits
//! the transaction at the extranonce slot. Shares then only need
//! `initial ‖ extranonce1 ‖ extranonce2 ‖ final` to rebuild the exact coinbase a
//! miner hashed.

use super::serialize::{serialize_number, serialize_string, var_int};
use crate::error::{Error, Result};
use crate::stratum::BlockTemplate;
use thiserror::Error;
use tracing::debug;

/// Consensus limit on the coinbase signature script
pub const MAX_SCRIPT_SIZE: usize = 100;

/// Reasons a generation transaction cannot be split
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    /// The template's coinbase does not contain the expected height script
    #[error("height script not found in coinbase template")]
    PlaceholderNotFound,

    /// The rewritten signature script exceeds the consensus limit
    #[error("signature script is {0} bytes, limit is {MAX_SCRIPT_SIZE}")]
    ScriptTooLong(usize),
}

/// The pool's coinbase signature script, split around the extranonce slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureScript {
    initial: Vec<u8>,
    final_part: Vec<u8>,
}

impl SignatureScript {
    /// Build the script for a block at `height`
    ///
    /// The initial part carries the height, the template's aux flags, the creation
    /// time and the placeholder length. The pool tag follows the extranonces.
    pub fn new(height: u64, aux_flags: &[u8], timestamp: u64, placeholder_len: u8, tag: &str) -> Self {
        let mut initial = serialize_number(height);
        initial.extend_from_slice(aux_flags);
        initial.extend_from_slice(&serialize_number(timestamp));
        initial.push(placeholder_len);

        Self {
            initial,
            final_part: serialize_string(tag),
        }
    }

    /// Bytes before the extranonces
    pub fn initial(&self) -> &[u8] {
        &self.initial
    }

    /// Bytes after the extranonces
    pub fn final_part(&self) -> &[u8] {
        &self.final_part
    }
}

/// Pool settings that shape the generation transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationOptions {
    /// Pool signature placed in the coinbase script
    pub coinbase_tag: String,
    /// Trailing transaction message
    pub tx_message: String,
    /// Whether the coin carries a transaction message after the lock time
    pub tx_message_supported: bool,
}

/// A coinbase transaction split at the extranonce slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationTransaction {
    script: SignatureScript,
    initial: Vec<u8>,
    final_part: Vec<u8>,
}

impl GenerationTransaction {
    /// Split the template's coinbase around `placeholder`, stamping the script with
    /// `timestamp`
    pub fn create(
        template: &BlockTemplate,
        placeholder: &[u8],
        options: &GenerationOptions,
        timestamp: u64,
    ) -> Result<Self> {
        let coinbase = template.coinbase_bytes()?;
        let aux_flags = template.coinbase_flags()?;

        let placeholder_len = u8::try_from(placeholder.len())
            .map_err(|_| Error::other(format!("placeholder of {} bytes", placeholder.len())))?;
        let script = SignatureScript::new(
            template.height,
            &aux_flags,
            timestamp,
            placeholder_len,
            &options.coinbase_tag,
        );

        let skeleton_script = height_script(template.height);
        let position = coinbase
            .windows(skeleton_script.len())
            .position(|window| window == skeleton_script.as_slice())
            .ok_or(BuildError::PlaceholderNotFound)?;
        let prefix = &coinbase[..position];
        let suffix = &coinbase[position + skeleton_script.len()..];

        let script_len = script.initial().len() + placeholder.len() + script.final_part().len();
        if script_len > MAX_SCRIPT_SIZE {
            return Err(BuildError::ScriptTooLong(script_len).into());
        }

        let mut initial = prefix.to_vec();
        initial.extend_from_slice(&var_int(script_len as u64));
        initial.extend_from_slice(script.initial());

        let mut final_part = script.final_part().to_vec();
        final_part.extend_from_slice(suffix);
        if options.tx_message_supported {
            final_part.extend_from_slice(&serialize_string(&options.tx_message));
        }

        debug!(
            height = template.height,
            initial = %hex::encode(&initial),
            final_part = %hex::encode(&final_part),
            "split generation transaction"
        );

        Ok(Self {
            script,
            initial,
            final_part,
        })
    }

    /// Bytes before the extranonces
    pub fn initial(&self) -> &[u8] {
        &self.initial
    }

    /// Bytes after the extranonces
    pub fn final_part(&self) -> &[u8] {
        &self.final_part
    }

    /// The rewritten signature script
    pub fn script(&self) -> &SignatureScript {
        &self.script
    }
}

/// Script the node leaves in its coinbase skeleton: a pushed height and a zero byte,
/// preceded by its own length
fn height_script(height: u64) -> Vec<u8> {
    let height_bytes = serialize_number(height);
    let mut script = Vec::with_capacity(height_bytes.len() + 2);
    script.push((height_bytes.len() + 1) as u8);
    script.extend_from_slice(&height_bytes);
    script.push(0);
    script
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stratum::{CoinbaseAux, TemplateTransaction};
    use crate::stratum::extranonce::EXTRA_NONCE_PLACEHOLDER;
    use pretty_assertions::assert_eq;

    const COINBASE: &str = "01000000010000000000000000000000000000000000000000000000000000000000000000ffffffff050340e20100ffffffff0100f2052a010000001976a914111111111111111111111111111111111111111188ac00000000";

    fn template(coinbase: &str) -> BlockTemplate {
        BlockTemplate {
            version: 0x2000_0000,
            previous_block_hash: "00".repeat(32),
            transactions: vec![TemplateTransaction {
                data: coinbase.to_string(),
                txid: String::new(),
                hash: String::new(),
            }],
            coinbase_aux: CoinbaseAux {
                flags: "062f503253482f".to_string(),
            },
            coinbase_value: 5_000_000_000,
            target: "ff".repeat(32),
            cur_time: 1_700_000_000,
            bits: "1d00ffff".to_string(),
            height: 123_456,
            edge_bits: 11,
        }
    }

    fn options() -> GenerationOptions {
        GenerationOptions {
            coinbase_tag: "/cuckoo-pool/".to_string(),
            tx_message: String::new(),
            tx_message_supported: false,
        }
    }

    const TIMESTAMP: u64 = 1_700_000_000;

    #[test]
    fn test_height_script() {
        assert_eq!(height_script(123_456), vec![0x05, 0x03, 0x40, 0xe2, 0x01, 0x00]);
        assert_eq!(height_script(5), vec![0x03, 0x01, 0x05, 0x00]);
    }

    #[test]
    fn test_split_coinbase() {
        let generation =
            GenerationTransaction::create(&template(COINBASE), &EXTRA_NONCE_PLACEHOLDER, &options(), TIMESTAMP)
                .unwrap();

        assert_eq!(
            hex::encode(generation.initial()),
            "01000000010000000000000000000000000000000000000000000000000000000000000000ffffffff270340e201062f503253482f0400f1536508"
        );
        assert_eq!(
            hex::encode(generation.final_part()),
            "0d2f6375636b6f6f2d706f6f6c2fffffffff0100f2052a010000001976a914111111111111111111111111111111111111111188ac00000000"
        );
    }

    #[test]
    fn test_placeholder_fills_script_length() {
        let generation =
            GenerationTransaction::create(&template(COINBASE), &EXTRA_NONCE_PLACEHOLDER, &options(), TIMESTAMP)
                .unwrap();
        let script = generation.script();

        // initial ends with the script length varint followed by the script's initial part
        let declared = generation.initial()[generation.initial().len() - script.initial().len() - 1];
        assert_eq!(
            declared as usize,
            script.initial().len() + EXTRA_NONCE_PLACEHOLDER.len() + script.final_part().len()
        );

        let mut full = generation.initial().to_vec();
        full.extend_from_slice(&EXTRA_NONCE_PLACEHOLDER);
        full.extend_from_slice(generation.final_part());
        let skeleton = hex::decode(COINBASE).unwrap();
        assert_eq!(full.len(), skeleton.len() - 6 + 1 + declared as usize);
    }

    #[test]
    fn test_tx_message_appended() {
        let mut opts = options();
        opts.tx_message = "hi".to_string();
        opts.tx_message_supported = true;
        let generation =
            GenerationTransaction::create(&template(COINBASE), &EXTRA_NONCE_PLACEHOLDER, &opts, TIMESTAMP)
                .unwrap();
        assert!(generation.final_part().ends_with(&[0x02, b'h', b'i']));
    }

    #[test]
    fn test_missing_height_script() {
        let other_height = COINBASE.replace("050340e20100", "050340e20200");
        let err = GenerationTransaction::create(
            &template(&other_height),
            &EXTRA_NONCE_PLACEHOLDER,
            &options(),
            TIMESTAMP,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Build(BuildError::PlaceholderNotFound)));
    }

    #[test]
    fn test_script_too_long() {
        let mut opts = options();
        opts.coinbase_tag = "x".repeat(90);
        let err = GenerationTransaction::create(&template(COINBASE), &EXTRA_NONCE_PLACEHOLDER, &opts, TIMESTAMP)
            .unwrap_err();
        assert!(matches!(err, Error::Build(BuildError::ScriptTooLong(_))));
    }

    #[test]
    fn test_bad_coinbase_hex() {
        assert!(
            GenerationTransaction::create(&template("zz"), &EXTRA_NONCE_PLACEHOLDER, &options(), TIMESTAMP)
                .is_err()
        );
    }
}
