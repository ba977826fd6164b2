//! Hashing utilities for candidate construction and solution checking
//!
//! Every identifier in this subsystem (txid, merkle node, block hash) is a
//! double SHA-256 digest stored in natural byte order.

use crate::error::{CandidateError, Result};
use primitive_types::{H256, U256};
use sha2::{Digest, Sha256};

/// Compute SHA-256 hash of data
#[inline]
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Compute double SHA-256 hash
#[inline]
pub fn sha256d(data: &[u8]) -> H256 {
    H256::from(sha256(&sha256(data)))
}

/// Double SHA-256 of two concatenated nodes (merkle parent)
#[inline]
pub fn hash_pair(left: &H256, right: &H256) -> H256 {
    let mut buf = [0u8; 64];
    buf[..32].copy_from_slice(left.as_bytes());
    buf[32..].copy_from_slice(right.as_bytes());
    sha256d(&buf)
}

/// Interpret hash bytes as a little-endian 256-bit integer
#[inline]
pub fn hash_to_u256(hash: &H256) -> U256 {
    U256::from_little_endian(hash.as_bytes())
}

/// Build a hash from a raw slice, enforcing the 32-byte width
pub fn hash_from_slice(bytes: &[u8]) -> Result<H256> {
    if bytes.len() != 32 {
        return Err(CandidateError::InvalidArgument(format!(
            "hash must be 32 bytes, got {}",
            bytes.len()
        )));
    }
    Ok(H256::from_slice(bytes))
}

/// Parse a 64-digit hex string in display order (most significant byte
/// first, the reverse of the stored bytes)
pub fn parse_display_hash(hex_str: &str) -> Result<H256> {
    let mut bytes = hex::decode(hex_str)
        .map_err(|e| CandidateError::InvalidArgument(format!("bad hash hex: {e}")))?;
    bytes.reverse();
    hash_from_slice(&bytes)
}

/// Render a hash in display order, as RPC callers read it
///
/// The string parses as a big-endian integer equal to [`hash_to_u256`].
pub fn hash_to_display_hex(hash: &H256) -> String {
    let mut bytes = hash.to_fixed_bytes();
    bytes.reverse();
    hex::encode(bytes)
}
