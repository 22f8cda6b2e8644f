//! Difficulty arithmetic
//!
//! Hashes are interpreted as signed little-endian integers, so a hash whose last byte
//! has its top bit set maps to a negative value and, through [`share_difficulty`], to
//! a negative difficulty. Callers decide what a negative difficulty means.

use crate::error::{Error, Result};
use num_bigint::{BigInt, BigUint, Sign};
use num_traits::{ToPrimitive, Zero};

/// Extra quotient bits kept before narrowing a ratio to `f64`
const RATIO_PRECISION_BITS: u64 = 128;

/// Difficulty-1 target (`0x00000000ffff0000...0000`)
pub fn diff1() -> BigInt {
    BigInt::from(0xffffu32) << 208
}

/// Interpret a hash as a signed little-endian two's-complement integer
pub fn hash_value(hash: &[u8]) -> BigInt {
    BigInt::from_signed_bytes_le(hash)
}

/// Parse an unsigned big-endian hex target, as reported by `getblocktemplate`
pub fn parse_target(hex_str: &str) -> Result<BigInt> {
    let trimmed = hex_str.trim_start_matches("0x");
    if trimmed.is_empty() {
        return Err(Error::invalid_hex("empty target"));
    }
    BigUint::parse_bytes(trimmed.as_bytes(), 16)
        .map(BigInt::from)
        .ok_or_else(|| Error::invalid_hex(format!("invalid target: {}", hex_str)))
}

/// `numer / denom` computed exactly, then narrowed to `f64`
///
/// A zero denominator yields `f64::MAX` carrying the sign of the numerator.
pub fn ratio_to_f64(numer: &BigInt, denom: &BigInt) -> f64 {
    let negative = (numer.sign() == Sign::Minus) != (denom.sign() == Sign::Minus);
    let signed = |v: f64| if negative && v != 0.0 { -v } else { v };

    if numer.is_zero() {
        return 0.0;
    }
    if denom.is_zero() {
        return signed(f64::MAX);
    }

    let n = numer.magnitude();
    let d = denom.magnitude();

    // Scale the numerator so the integer quotient keeps enough significant bits.
    let shift = (RATIO_PRECISION_BITS + d.bits()).saturating_sub(n.bits());
    let quotient: BigUint = (n << shift) / d;
    let mut value = quotient.to_f64().unwrap_or(f64::MAX);
    if !value.is_finite() {
        value = f64::MAX;
    }
    // shift is bounded by 128 + 256 for hash-sized operands
    let value = value * 2f64.powi(-(shift as i32));
    signed(value)
}

/// Share difficulty: `(diff1 / value) * multiplier`
pub fn share_difficulty(diff1: &BigInt, value: &BigInt, multiplier: f64) -> f64 {
    ratio_to_f64(diff1, value) * multiplier
}

/// Network difficulty of an unsigned target
pub fn target_difficulty(diff1: &BigInt, target: &BigInt) -> f64 {
    ratio_to_f64(diff1, target)
}

/// Target corresponding to a difficulty (`diff1 / difficulty`), truncated
pub fn difficulty_to_target(diff1: &BigInt, difficulty: f64) -> Result<BigInt> {
    if !(difficulty.is_finite() && difficulty > 0.0) {
        return Err(Error::other(format!(
            "Difficulty must be positive, got {}",
            difficulty
        )));
    }
    // difficulty = mantissa * 2^exp with an integral 53-bit mantissa
    let bits = difficulty.to_bits();
    let exp = ((bits >> 52) & 0x7ff) as i64;
    let frac = bits & ((1u64 << 52) - 1);
    let (mantissa, exp) = if exp == 0 {
        (frac, -1074)
    } else {
        (frac | (1u64 << 52), exp - 1075)
    };

    let mantissa = BigInt::from(mantissa);
    let target = if exp >= 0 {
        diff1 / (mantissa << exp as usize)
    } else {
        (diff1 << (-exp) as usize) / mantissa
    };
    Ok(target)
}
