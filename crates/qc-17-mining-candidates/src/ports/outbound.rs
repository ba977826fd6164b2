//! Outbound ports (driven side - SPI)

use crate::domain::{Block, ChainTip, MempoolSnapshot, ValidationMode, ValidationStage};
use crate::error::Result;
use async_trait::async_trait;

/// Port: Snapshot of mempool transactions chosen for the next block
#[async_trait]
pub trait MempoolSnapshotProvider: Send + Sync {
    /// Ordered transactions with fees, selection policy already applied
    async fn snapshot(&self) -> Result<MempoolSnapshot>;
}

/// Port: Chain tip owner
///
/// `extend_tip` is the single mutation gate for the tip. It must be a short
/// compare-and-swap on the parent hash and never re-hash or re-validate.
pub trait ChainStateProvider: Send + Sync {
    /// Current tip
    fn tip(&self) -> Result<ChainTip>;

    /// Make `block` the tip if its parent is still the tip
    fn extend_tip(&self, block: &Block) -> Result<TipExtension>;
}

/// Result of a tip extension attempt
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TipExtension {
    /// Block is the new tip
    Extended(ChainTip),
    /// Tip had already moved
    Stale {
        /// Tip at the time of the attempt
        current: ChainTip,
    },
}

/// Port: Block acceptance rules beyond the structural checks
#[async_trait]
pub trait BlockValidator: Send + Sync {
    /// Check a block; `Template` stage blocks carry no proof-of-work
    async fn validate(
        &self,
        block: &Block,
        mode: ValidationMode,
        stage: ValidationStage,
    ) -> Result<ValidationVerdict>;
}

/// Block validator answer
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ValidationVerdict {
    /// Block passes
    Valid,
    /// Block breaks a rule
    Invalid(String),
}

/// Port: Wall clock
pub trait Clock: Send + Sync {
    /// Unix time in seconds
    fn now(&self) -> u64;
}
