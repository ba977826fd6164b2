//! In-memory collaborators
//!
//! Reference implementations of the outbound ports, used by the test suite
//! and by embedders that do not bring their own chain or mempool.

use crate::domain::{
    check_context_free, Block, ChainTip, MempoolEntry, MempoolSnapshot, Transaction,
    ValidationMode, ValidationStage,
};
use crate::error::Result;
use crate::ports::{
    BlockValidator, ChainStateProvider, MempoolSnapshotProvider, TipExtension, ValidationVerdict,
};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use primitive_types::H256;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::debug;

/// Block times used for the median time past
const MEDIAN_TIME_SPAN: usize = 11;

/// Committed blocks kept for inspection
pub const ACCEPTED_HISTORY: usize = 64;

struct ChainInner {
    tip: ChainTip,
    recent_times: VecDeque<u32>,
    accepted: VecDeque<Arc<Block>>,
}

impl ChainInner {
    fn advance(&mut self, hash: H256, height: u64, time: u32, next_bits: u32) -> ChainTip {
        self.recent_times.push_back(time);
        while self.recent_times.len() > MEDIAN_TIME_SPAN {
            self.recent_times.pop_front();
        }
        let mut sorted: Vec<u32> = self.recent_times.iter().copied().collect();
        sorted.sort_unstable();

        self.tip = ChainTip {
            hash,
            height,
            time,
            median_time_past: sorted[sorted.len() / 2],
            next_bits,
        };
        self.tip
    }
}

/// Chain state holding only the tip and recent block times
///
/// Every tip change happens under one mutex; `extend_tip` is a
/// compare-and-swap on the parent hash. Hashing and copying the block
/// happen before the lock is taken.
pub struct InMemoryChainState {
    inner: Mutex<ChainInner>,
    next_bits: u32,
}

impl InMemoryChainState {
    /// Chain whose tip is a single block at `height`
    pub fn new(tip_hash: H256, height: u64, time: u32, next_bits: u32) -> Self {
        let mut inner = ChainInner {
            tip: ChainTip {
                hash: tip_hash,
                height,
                time,
                median_time_past: time,
                next_bits,
            },
            recent_times: VecDeque::with_capacity(MEDIAN_TIME_SPAN + 1),
            accepted: VecDeque::with_capacity(ACCEPTED_HISTORY),
        };
        inner.advance(tip_hash, height, time, next_bits);
        Self {
            inner: Mutex::new(inner),
            next_bits,
        }
    }

    /// Replace the tip out of band (reorg or block from a peer)
    pub fn set_tip(&self, hash: H256, height: u64, time: u32) -> ChainTip {
        let mut inner = self.inner.lock();
        debug!("[qc-17] External tip change to {:?} at height {}", hash, height);
        inner.advance(hash, height, time, self.next_bits)
    }

    /// Most recent blocks committed through `extend_tip`, oldest first
    pub fn accepted_blocks(&self) -> Vec<Arc<Block>> {
        self.inner.lock().accepted.iter().cloned().collect()
    }

    /// Current tip height
    pub fn height(&self) -> u64 {
        self.inner.lock().tip.height
    }
}

impl ChainStateProvider for InMemoryChainState {
    fn tip(&self) -> Result<ChainTip> {
        Ok(self.inner.lock().tip)
    }

    fn extend_tip(&self, block: &Block) -> Result<TipExtension> {
        let hash = block.hash();
        let stored = Arc::new(block.clone());

        let mut inner = self.inner.lock();
        if block.header.prev_hash != inner.tip.hash {
            return Ok(TipExtension::Stale { current: inner.tip });
        }
        let height = inner.tip.height + 1;
        let tip = inner.advance(hash, height, block.header.time, self.next_bits);
        if inner.accepted.len() == ACCEPTED_HISTORY {
            inner.accepted.pop_front();
        }
        inner.accepted.push_back(stored);
        Ok(TipExtension::Extended(tip))
    }
}

/// Mempool holding an ordered list of entries
#[derive(Default)]
pub struct InMemoryMempool {
    entries: RwLock<Vec<MempoolEntry>>,
}

impl InMemoryMempool {
    /// Empty mempool
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a transaction paying `fee`
    pub fn add(&self, tx: Transaction, fee: u64) {
        self.entries.write().push(MempoolEntry { tx, fee });
    }

    /// Drop every entry
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Check if the mempool is empty
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[async_trait]
impl MempoolSnapshotProvider for InMemoryMempool {
    async fn snapshot(&self) -> Result<MempoolSnapshot> {
        Ok(MempoolSnapshot {
            entries: self.entries.read().clone(),
        })
    }
}

/// Context-free block checks
///
/// `Full` mode also refuses non-coinbase transactions without inputs or
/// outputs.
#[derive(Clone, Copy, Debug, Default)]
pub struct StructuralBlockValidator;

#[async_trait]
impl BlockValidator for StructuralBlockValidator {
    async fn validate(
        &self,
        block: &Block,
        mode: ValidationMode,
        _stage: ValidationStage,
    ) -> Result<ValidationVerdict> {
        if let Err(violation) = check_context_free(block) {
            return Ok(ValidationVerdict::Invalid(violation.reason().to_string()));
        }
        if mode == ValidationMode::Full {
            for tx in block.transactions.iter().skip(1) {
                if tx.inputs.is_empty() {
                    return Ok(ValidationVerdict::Invalid("bad-txns-vin-empty".to_string()));
                }
                if tx.outputs.is_empty() {
                    return Ok(ValidationVerdict::Invalid("bad-txns-vout-empty".to_string()));
                }
            }
        }
        Ok(ValidationVerdict::Valid)
    }
}
