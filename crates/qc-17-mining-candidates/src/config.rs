//! Configuration types for the mining candidate service

use crate::domain::{compact_to_target, ValidationMode, REGTEST_POW_LIMIT_BITS};
use crate::error::{CandidateError, Result};
use primitive_types::U256;
use serde::Deserialize;
use std::time::Duration;

/// Runtime configuration for candidate issue and solution acceptance
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct MiningCandidateConfig {
    /// Re-validation depth for solved blocks (and the pre-issue test)
    pub validation_mode: ValidationMode,

    /// Upper bound on a single Block Validator call, in milliseconds
    pub validation_timeout_ms: u64,

    /// Hex-encoded locking script for server-built coinbases
    pub payout_script: String,

    /// Lease registry settings
    pub lease: LeaseConfig,

    /// Block template settings
    pub block: BlockConfig,
}

impl Default for MiningCandidateConfig {
    fn default() -> Self {
        Self {
            validation_mode: ValidationMode::Full,
            validation_timeout_ms: 10_000,
            payout_script: hex::encode(crate::domain::OP_TRUE_SCRIPT),
            lease: LeaseConfig::default(),
            block: BlockConfig::default(),
        }
    }
}

impl MiningCandidateConfig {
    /// Check values the service cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.validation_timeout_ms == 0 {
            return Err(CandidateError::InvalidConfig(
                "validation_timeout_ms must be positive".to_string(),
            ));
        }
        if self.lease.max_leases == 0 {
            return Err(CandidateError::InvalidConfig(
                "lease.max_leases must be positive".to_string(),
            ));
        }
        if self.block.max_block_size <= crate::COINBASE_RESERVED_SIZE {
            return Err(CandidateError::InvalidConfig(format!(
                "block.max_block_size must exceed {} bytes",
                crate::COINBASE_RESERVED_SIZE
            )));
        }
        self.payout_script_bytes()?;
        self.block.pow_limit()?;
        Ok(())
    }

    /// Decoded payout script
    pub fn payout_script_bytes(&self) -> Result<Vec<u8>> {
        hex::decode(&self.payout_script)
            .map_err(|e| CandidateError::InvalidConfig(format!("payout_script: {e}")))
    }

    /// Validation timeout as a duration
    pub fn validation_timeout(&self) -> Duration {
        Duration::from_millis(self.validation_timeout_ms)
    }
}

/// Lease registry (garbage-collection horizon) configuration
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct LeaseConfig {
    /// Evict leases older than this, in seconds
    pub max_age_secs: u64,

    /// Evict oldest leases beyond this count
    pub max_leases: usize,
}

impl Default for LeaseConfig {
    fn default() -> Self {
        Self {
            max_age_secs: 600,
            max_leases: 1024,
        }
    }
}

impl LeaseConfig {
    /// Age horizon as a duration
    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_secs)
    }
}

/// Block template configuration
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct BlockConfig {
    /// Header version stamped on candidates
    pub version: i32,

    /// Maximum serialized block size in bytes
    pub max_block_size: usize,

    /// Maximum non-coinbase transactions per candidate
    pub max_transactions: usize,

    /// Allowed header time drift into the future, in seconds
    pub max_future_time_secs: u32,

    /// Blocks between subsidy halvings
    pub halving_interval: u64,

    /// Easiest acceptable target, compact encoded
    pub pow_limit_bits: u32,
}

impl Default for BlockConfig {
    fn default() -> Self {
        Self {
            version: 0x2000_0000,
            max_block_size: 32_000_000,
            max_transactions: crate::MAX_CANDIDATE_TRANSACTIONS,
            max_future_time_secs: crate::MAX_FUTURE_BLOCK_TIME,
            halving_interval: 210_000,
            pow_limit_bits: REGTEST_POW_LIMIT_BITS,
        }
    }
}

impl BlockConfig {
    /// Decoded pow limit
    pub fn pow_limit(&self) -> Result<U256> {
        compact_to_target(self.pow_limit_bits)
            .map_err(|e| CandidateError::InvalidConfig(format!("pow_limit_bits: {e}")))
    }
}
