//! Compact difficulty targets (`nBits`) and proof-of-work checks
//!
//! A compact value packs a 256-bit target as `mantissa * 256^(exponent - 3)`
//! with an 8-bit exponent and a 23-bit mantissa; bit 23 is a sign flag that
//! a valid target never sets.

use crate::error::{CandidateError, Result};
use crate::utils::hashing::hash_to_u256;
use primitive_types::{H256, U256};

/// Easiest target allowed on a regression-test chain
pub const REGTEST_POW_LIMIT_BITS: u32 = 0x207f_ffff;

/// Outcome of comparing a header hash against its target
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PowCheck {
    /// Hash is at or below the target
    Met,
    /// Hash is above the target
    HighHash,
    /// Bits do not decode to a usable target
    BadBits,
}

/// Decode compact bits into a target
pub fn compact_to_target(bits: u32) -> Result<U256> {
    let exponent = bits >> 24;
    let mantissa = bits & 0x007f_ffff;

    if mantissa != 0 && bits & 0x0080_0000 != 0 {
        return Err(CandidateError::InvalidArgument(format!(
            "negative compact target {bits:08x}"
        )));
    }

    let overflow = mantissa != 0
        && (exponent > 34
            || (mantissa > 0xff && exponent > 33)
            || (mantissa > 0xffff && exponent > 32));
    if overflow {
        return Err(CandidateError::InvalidArgument(format!(
            "compact target {bits:08x} overflows 256 bits"
        )));
    }

    let target = if exponent <= 3 {
        U256::from(mantissa >> (8 * (3 - exponent)))
    } else {
        U256::from(mantissa) << (8 * (exponent - 3) as usize)
    };

    if target.is_zero() {
        return Err(CandidateError::InvalidArgument(format!(
            "zero compact target {bits:08x}"
        )));
    }
    Ok(target)
}

/// Encode a target into normalized compact bits
pub fn target_to_compact(target: U256) -> u32 {
    let mut size = target.bits().div_ceil(8) as u32;
    let mut compact = if size <= 3 {
        (target.low_u64() << (8 * (3 - size))) as u32
    } else {
        (target >> (8 * (size - 3) as usize)).low_u64() as u32
    };
    // Keep the sign bit clear by moving one byte into the exponent.
    if compact & 0x0080_0000 != 0 {
        compact >>= 8;
        size += 1;
    }
    compact | (size << 24)
}

/// Check a header hash against `bits`, refusing targets easier than `pow_limit`
pub fn check_proof_of_work(hash: &H256, bits: u32, pow_limit: U256) -> PowCheck {
    let target = match compact_to_target(bits) {
        Ok(t) if t <= pow_limit => t,
        _ => return PowCheck::BadBits,
    };
    if hash_to_u256(hash) <= target {
        PowCheck::Met
    } else {
        PowCheck::HighHash
    }
}

/// Human readable difficulty relative to the pow limit, for logs
pub fn describe_bits(bits: u32, pow_limit: U256) -> String {
    match compact_to_target(bits) {
        Ok(target) => {
            let ratio = pow_limit / target;
            format!("{bits:08x} (x{ratio} vs limit)")
        }
        Err(_) => format!("{bits:08x} (invalid)"),
    }
}
