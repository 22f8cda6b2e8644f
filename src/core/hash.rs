//! Hash algorithms used for share and block hashing

use crate::error::{Error, Result};
use blake2::Blake2b;
use blake2::digest::consts::U32;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// 32-byte hash output
pub type Hash256 = [u8; 32];

/// Double SHA-256, used for transaction ids, Merkle nodes and block hashes
#[inline]
pub fn sha256d(data: &[u8]) -> Hash256 {
    let first = Sha256::digest(data);
    Sha256::digest(first).into()
}

/// Single SHA-256
#[inline]
pub fn sha256(data: &[u8]) -> Hash256 {
    Sha256::digest(data).into()
}

/// Unkeyed Blake2b with a 256-bit output
#[inline]
pub fn blake2b_256(data: &[u8]) -> Hash256 {
    Blake2b::<U32>::digest(data).into()
}

/// Hash function applied to headers and cycles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum HashFunction {
    /// SHA-256 applied twice
    #[default]
    Sha256d,
    /// SHA-256
    Sha256,
    /// Blake2b-256
    Blake2b,
}

impl HashFunction {
    /// Name as it appears in configuration
    pub fn name(&self) -> &'static str {
        match self {
            HashFunction::Sha256d => "sha256d",
            HashFunction::Sha256 => "sha256",
            HashFunction::Blake2b => "blake2b",
        }
    }
}

impl fmt::Display for HashFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HashFunction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sha256d" => Ok(HashFunction::Sha256d),
            "sha256" => Ok(HashFunction::Sha256),
            "blake2b" => Ok(HashFunction::Blake2b),
            other => Err(Error::config(format!("Unknown hash algorithm: {}", other))),
        }
    }
}

/// A hash function paired with the scalar that normalises its difficulty units
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HashAlgorithm {
    function: HashFunction,
    multiplier: f64,
}

impl HashAlgorithm {
    /// Create a new algorithm descriptor
    pub fn new(function: HashFunction, multiplier: f64) -> Result<Self> {
        if !(multiplier.is_finite() && multiplier > 0.0) {
            return Err(Error::config(format!(
                "Algorithm multiplier must be positive, got {}",
                multiplier
            )));
        }
        Ok(Self {
            function,
            multiplier,
        })
    }

    /// Hash a buffer
    pub fn hash(&self, data: &[u8]) -> Hash256 {
        match self.function {
            HashFunction::Sha256d => sha256d(data),
            HashFunction::Sha256 => sha256(data),
            HashFunction::Blake2b => blake2b_256(data),
        }
    }

    /// Difficulty normalisation scalar
    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }

    /// Underlying hash function
    pub fn function(&self) -> HashFunction {
        self.function
    }
}

impl Default for HashAlgorithm {
    fn default() -> Self {
        Self {
            function: HashFunction::Sha256d,
            multiplier: 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_empty() {
        assert_eq!(
            hex::encode(sha256(b"")),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_sha256d_hello() {
        assert_eq!(
            hex::encode(sha256d(b"hello")),
            "9595c9df90075148eb06860365df33584b75bff782a510c6cd4883a419833d50"
        );
    }

    #[test]
    fn test_blake2b_256_abc() {
        assert_eq!(
            hex::encode(blake2b_256(b"abc")),
            "bddd813c634239723171ef3fee98579b94964e3bb1cb3e427262c8c068d52319"
        );
    }

    #[test]
    fn test_algorithm_dispatch() {
        let algo = HashAlgorithm::new(HashFunction::Sha256, 2.0).unwrap();
        assert_eq!(algo.hash(b""), sha256(b""));
        assert_eq!(algo.multiplier(), 2.0);
        assert_eq!(HashAlgorithm::default().hash(b"hello"), sha256d(b"hello"));
    }

    #[test]
    fn test_invalid_multiplier() {
        assert!(HashAlgorithm::new(HashFunction::Sha256d, 0.0).is_err());
        assert!(HashAlgorithm::new(HashFunction::Sha256d, -1.0).is_err());
        assert!(HashAlgorithm::new(HashFunction::Sha256d, f64::NAN).is_err());
    }

    #[test]
    fn test_function_parse() {
        assert_eq!("SHA256D".parse::<HashFunction>().unwrap(), HashFunction::Sha256d);
        assert_eq!("blake2b".parse::<HashFunction>().unwrap(), HashFunction::Blake2b);
        assert!("scrypt".parse::<HashFunction>().is_err());
    }
}
