//! Merkle branch computation for the coinbase position
//!
//! Stratum jobs never carry the coinbase hash, so the tree is reduced to the list of
//! sibling hashes on the path from the first leaf to the root. Folding the coinbase
//! hash through those steps yields the Merkle root for any extranonce pair.

use crate::core::{Hash256, sha256d};
use crate::error::{Error, Result};

/// Sibling hashes on the coinbase's path to the root
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MerkleTree {
    steps: Vec<Hash256>,
}

impl MerkleTree {
    /// Build the branch from the non-coinbase leaves, in internal byte order
    pub fn new(leaves: &[Hash256]) -> Self {
        let mut steps = Vec::new();
        // `None` marks the coinbase slot, which is never hashed here.
        let mut level: Vec<Option<Hash256>> = std::iter::once(None)
            .chain(leaves.iter().copied().map(Some))
            .collect();

        while level.len() > 1 {
            if let Some(step) = level[1] {
                steps.push(step);
            }
            if level.len() % 2 == 1 {
                let last = level[level.len() - 1];
                level.push(last);
            }

            let mut next = Vec::with_capacity(level.len() / 2);
            next.push(None);
            for pair in level[2..].chunks_exact(2) {
                if let (Some(left), Some(right)) = (pair[0], pair[1]) {
                    next.push(Some(hash_pair(&left, &right)));
                }
            }
            level = next;
        }

        Self { steps }
    }

    /// Build the branch from transaction ids in display (reversed hex) order
    pub fn from_txids<S: AsRef<str>>(txids: &[S]) -> Result<Self> {
        let leaves = txids
            .iter()
            .map(|txid| -> Result<Hash256> {
                let txid = txid.as_ref();
                let mut bytes: Hash256 = hex::decode(txid)
                    .map_err(|e| Error::invalid_hex(format!("txid {}: {}", txid, e)))?
                    .try_into()
                    .map_err(|_| Error::invalid_hex(format!("txid {} is not 32 bytes", txid)))?;
                bytes.reverse();
                Ok(bytes)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(&leaves))
    }

    /// Branch hashes from the leaf level upwards
    pub fn steps(&self) -> &[Hash256] {
        &self.steps
    }

    /// Merkle root with `first` in the coinbase slot
    pub fn with_first(&self, first: &Hash256) -> Hash256 {
        self.steps
            .iter()
            .fold(*first, |acc, step| hash_pair(&acc, step))
    }
}

fn hash_pair(left: &Hash256, right: &Hash256) -> Hash256 {
    let mut combined = [0u8; 64];
    combined[..32].copy_from_slice(left);
    combined[32..].copy_from_slice(right);
    sha256d(&combined)
}
