//! Structural checks for reconstructed blocks
//!
//! These run on every solved block regardless of validation mode. Each
//! check maps to one short reject reason.

use super::coinbase::commits_to_height;
use super::difficulty::compact_to_target;
use super::entities::CandidateTemplate;
use super::merkle::compute_merkle_root;
use super::transaction::Block;
use primitive_types::{H256, U256};
use std::collections::HashSet;
use std::fmt;

/// A broken block rule
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RuleViolation {
    /// Bits do not decode or are easier than the pow limit
    BadDiffBits,
    /// First transaction is not a coinbase
    CoinbaseMissing,
    /// A coinbase appears outside slot 0
    CoinbaseMultiple,
    /// Coinbase does not commit to the block height
    CoinbaseHeight,
    /// Coinbase pays more than subsidy plus fees
    CoinbaseAmount,
    /// Header merkle root disagrees with the transactions
    MerkleRoot,
    /// Same txid twice
    DuplicateTransaction,
    /// Block exceeds the size limit
    BlockLength,
    /// Header time not after the median time past
    TimeTooOld,
    /// Header time too far past the local clock
    TimeTooNew,
}

impl RuleViolation {
    /// Reject reason reported to submitters
    pub fn reason(&self) -> &'static str {
        match self {
            Self::BadDiffBits => "bad-diffbits",
            Self::CoinbaseMissing => "bad-cb-missing",
            Self::CoinbaseMultiple => "bad-cb-multiple",
            Self::CoinbaseHeight => "bad-cb-height",
            Self::CoinbaseAmount => "bad-cb-amount",
            Self::MerkleRoot => "bad-txnmrklroot",
            Self::DuplicateTransaction => "bad-txns-duplicate",
            Self::BlockLength => "bad-blk-length",
            Self::TimeTooOld => "time-too-old",
            Self::TimeTooNew => "time-too-new",
        }
    }
}

impl fmt::Display for RuleViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.reason())
    }
}

type Check = std::result::Result<(), RuleViolation>;

/// Limits the contextual checks run against
#[derive(Copy, Clone, Debug)]
pub struct StructuralLimits {
    /// Easiest acceptable target
    pub pow_limit: U256,
    /// Maximum serialized block size
    pub max_block_size: usize,
    /// Allowed drift of header time past `now`
    pub max_future_time: u32,
    /// Local clock, unix seconds
    pub now: u64,
}

/// Coinbase in slot 0 and nowhere else
pub fn check_coinbase_placement(block: &Block) -> Check {
    match block.transactions.split_first() {
        Some((first, rest)) if first.is_coinbase() => {
            if rest.iter().any(|tx| tx.is_coinbase()) {
                Err(RuleViolation::CoinbaseMultiple)
            } else {
                Ok(())
            }
        }
        _ => Err(RuleViolation::CoinbaseMissing),
    }
}

/// No txid appears twice in `txids`
pub fn check_no_duplicates(txids: &[H256]) -> Check {
    let mut seen = HashSet::with_capacity(txids.len());
    for txid in txids {
        if !seen.insert(txid) {
            return Err(RuleViolation::DuplicateTransaction);
        }
    }
    Ok(())
}

/// Header merkle root matches a full recomputation over `txids`
pub fn check_merkle_root(block: &Block, txids: &[H256]) -> Check {
    if compute_merkle_root(txids) != block.header.merkle_root {
        return Err(RuleViolation::MerkleRoot);
    }
    Ok(())
}

/// Checks that need nothing but the block itself
pub fn check_context_free(block: &Block) -> Check {
    check_context_free_with(block, &block.txids())
}

/// [`check_context_free`] against txids already computed for `block`
pub fn check_context_free_with(block: &Block, txids: &[H256]) -> Check {
    check_coinbase_placement(block)?;
    check_no_duplicates(txids)?;
    check_merkle_root(block, txids)
}

/// Txids of a block assembled from `template`, hashing only the coinbase
///
/// Transactions after the coinbase are the template's own, whose ids were
/// computed when it was built.
pub fn candidate_txids(block: &Block, template: &CandidateTemplate) -> Vec<H256> {
    let mut txids = Vec::with_capacity(template.transaction_ids.len() + 1);
    if let Some(coinbase) = block.coinbase() {
        txids.push(coinbase.txid());
    }
    txids.extend_from_slice(&template.transaction_ids);
    txids
}

/// Coinbase commits to the height and pays no more than the candidate allows
pub fn check_coinbase(block: &Block, template: &CandidateTemplate) -> Check {
    let coinbase = block.coinbase().ok_or(RuleViolation::CoinbaseMissing)?;
    if !commits_to_height(coinbase, template.height) {
        return Err(RuleViolation::CoinbaseHeight);
    }
    match coinbase.total_output_value() {
        Some(paid) if paid <= template.coinbase_value => Ok(()),
        _ => Err(RuleViolation::CoinbaseAmount),
    }
}

/// Header time within `(median_time_past, now + max_future_time]`
pub fn check_time_window(time: u32, median_time_past: u32, limits: &StructuralLimits) -> Check {
    if time <= median_time_past {
        return Err(RuleViolation::TimeTooOld);
    }
    if u64::from(time) > limits.now.saturating_add(u64::from(limits.max_future_time)) {
        return Err(RuleViolation::TimeTooNew);
    }
    Ok(())
}

/// Bits decode to a target no easier than the limit
pub fn check_difficulty_bits(bits: u32, pow_limit: U256) -> Check {
    match compact_to_target(bits) {
        Ok(target) if target <= pow_limit => Ok(()),
        _ => Err(RuleViolation::BadDiffBits),
    }
}

/// Every structural rule for a block reconstructed from `template`
///
/// `block` must come from [`CandidateTemplate::assemble`] on `template`.
pub fn check_block(block: &Block, template: &CandidateTemplate, limits: &StructuralLimits) -> Check {
    check_difficulty_bits(block.header.bits, limits.pow_limit)?;
    check_context_free_with(block, &candidate_txids(block, template))?;
    check_coinbase(block, template)?;
    if block.encoded_size() > limits.max_block_size {
        return Err(RuleViolation::BlockLength);
    }
    check_time_window(block.header.time, template.median_time_past, limits)
}
