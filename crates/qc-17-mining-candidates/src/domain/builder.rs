//! Candidate builder: turns a chain tip and a mempool snapshot into an
//! immutable template.

use super::coinbase::{block_subsidy, create_coinbase};
use super::entities::{CandidateTemplate, ChainTip, MempoolSnapshot};
use super::merkle::build_proof;
use super::transaction::{compact_size_len, HEADER_SIZE};
use crate::config::BlockConfig;
use crate::error::{CandidateError, Result};
use primitive_types::H256;
use std::collections::HashSet;
use tracing::debug;

/// Builds candidate templates against the configured block limits
pub struct CandidateBuilder {
    block: BlockConfig,
    payout_script: Vec<u8>,
}

impl CandidateBuilder {
    /// Create a builder paying server-built coinbases to `payout_script`
    pub fn new(block: BlockConfig, payout_script: Vec<u8>) -> Self {
        Self {
            block,
            payout_script,
        }
    }

    /// Block limits in force
    pub fn block_config(&self) -> &BlockConfig {
        &self.block
    }

    /// Build a template extending `tip`
    ///
    /// Snapshot entries are taken in order until the size or count limit is
    /// reached; coinbase-shaped and duplicate entries are skipped. `now` is
    /// raised to one past the tip's median time past when behind it.
    #[tracing::instrument(skip(self, tip, snapshot), fields(height = tip.height.saturating_add(1), offered = snapshot.entries.len()))]
    pub fn build(
        &self,
        tip: &ChainTip,
        snapshot: MempoolSnapshot,
        include_coinbase: bool,
        now: u32,
    ) -> Result<CandidateTemplate> {
        let height = tip
            .height
            .checked_add(1)
            .ok_or_else(|| CandidateError::ChainState("tip height overflow".to_string()))?;

        // Header, tx count prefix and coinbase are budgeted up front.
        let mut size = HEADER_SIZE + compact_size_len(u32::MAX as u64) + crate::COINBASE_RESERVED_SIZE;
        let mut total_fees: u64 = 0;
        let mut seen = HashSet::new();
        let mut transactions = Vec::new();
        let mut transaction_ids = Vec::new();

        for entry in snapshot.entries {
            if transactions.len() >= self.block.max_transactions {
                break;
            }
            if entry.tx.is_coinbase() {
                debug!("[qc-17] Skipping coinbase-shaped mempool entry");
                continue;
            }
            let tx_size = entry.tx.encoded_size();
            if size + tx_size > self.block.max_block_size {
                continue;
            }
            let txid = entry.tx.txid();
            if !seen.insert(txid) {
                continue;
            }
            total_fees = total_fees.checked_add(entry.fee).ok_or_else(|| {
                CandidateError::Mempool("fee total overflows u64".to_string())
            })?;
            size += tx_size;
            transaction_ids.push(txid);
            transactions.push(entry.tx);
        }

        let coinbase_value = block_subsidy(height, self.block.halving_interval)
            .checked_add(total_fees)
            .ok_or_else(|| CandidateError::Mempool("coinbase value overflows u64".to_string()))?;

        let (merkle_proof, _) = build_proof(H256::zero(), &transaction_ids);
        let time = now.max(tip.median_time_past.saturating_add(1));
        let coinbase_template =
            include_coinbase.then(|| create_coinbase(height, coinbase_value, &self.payout_script));

        debug!(
            "[qc-17] Built template at height {} with {} txs, fees {}, proof depth {}",
            height,
            transactions.len(),
            total_fees,
            merkle_proof.len()
        );

        Ok(CandidateTemplate {
            prev_hash: tip.hash,
            height,
            version: self.block.version,
            bits: tip.next_bits,
            time,
            median_time_past: tip.median_time_past,
            coinbase_value,
            total_fees,
            merkle_proof,
            coinbase_template,
            transactions: transactions.into(),
            transaction_ids: transaction_ids.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::coinbase::{commits_to_height, COIN, OP_TRUE_SCRIPT};
    use crate::domain::merkle::{compute_merkle_root, fold_proof};
    use crate::domain::transaction::{OutPoint, Transaction, TxIn, TxOut};
    use crate::domain::{MempoolEntry, REGTEST_POW_LIMIT_BITS};

    fn tip() -> ChainTip {
        ChainTip {
            hash: H256::repeat_byte(0xab),
            height: 100,
            time: 1_700_000_000,
            median_time_past: 1_699_999_000,
            next_bits: REGTEST_POW_LIMIT_BITS,
        }
    }

    fn spend(seed: u8, fee: u64) -> MempoolEntry {
        MempoolEntry {
            tx: Transaction {
                version: 2,
                inputs: vec![TxIn {
                    prev_out: OutPoint {
                        txid: H256::repeat_byte(seed),
                        index: 0,
                    },
                    script_sig: vec![seed; 4],
                    sequence: u32::MAX - 1,
                }],
                outputs: vec![TxOut {
                    value: 1_000,
                    script_pubkey: OP_TRUE_SCRIPT.to_vec(),
                }],
                lock_time: 0,
            },
            fee,
        }
    }

    fn builder() -> CandidateBuilder {
        CandidateBuilder::new(BlockConfig::default(), OP_TRUE_SCRIPT.to_vec())
    }

    #[test]
    fn test_empty_mempool_template() {
        let template = builder()
            .build(&tip(), MempoolSnapshot::default(), true, 1_700_000_100)
            .unwrap();

        assert_eq!(template.height, 101);
        assert_eq!(template.prev_hash, tip().hash);
        assert_eq!(template.bits, REGTEST_POW_LIMIT_BITS);
        assert_eq!(template.coinbase_value, 50 * COIN);
        assert!(template.merkle_proof.is_empty());
        assert_eq!(template.transaction_count(), 0);

        let coinbase = template.coinbase_template.as_ref().unwrap();
        assert!(commits_to_height(coinbase, 101));
    }

    #[test]
    fn test_fees_flow_into_coinbase_value() {
        let snapshot = MempoolSnapshot {
            entries: vec![spend(1, 500), spend(2, 700)],
        };
        let template = builder().build(&tip(), snapshot, false, 0).unwrap();

        assert_eq!(template.total_fees, 1_200);
        assert_eq!(template.coinbase_value, 50 * COIN + 1_200);
        assert!(template.coinbase_template.is_none());
    }

    #[test]
    fn test_proof_reconstructs_root_for_any_coinbase() {
        let snapshot = MempoolSnapshot {
            entries: (1..=5).map(|i| spend(i, 10)).collect(),
        };
        let template = builder().build(&tip(), snapshot, true, 0).unwrap();
        let coinbase = template.coinbase_template.clone().unwrap();

        let mut leaves = vec![coinbase.txid()];
        leaves.extend_from_slice(template.transaction_ids());
        assert_eq!(
            fold_proof(coinbase.txid(), &template.merkle_proof),
            compute_merkle_root(&leaves)
        );
    }

    #[test]
    fn test_time_floor_from_median_time_past() {
        let template = builder()
            .build(&tip(), MempoolSnapshot::default(), false, 5)
            .unwrap();
        assert_eq!(template.time, tip().median_time_past + 1);
    }

    #[test]
    fn test_limits_and_filters() {
        let mut config = BlockConfig::default();
        config.max_transactions = 2;
        let builder = CandidateBuilder::new(config, OP_TRUE_SCRIPT.to_vec());

        let coinbase_like = MempoolEntry {
            tx: create_coinbase(5, 1, &OP_TRUE_SCRIPT),
            fee: 0,
        };
        let snapshot = MempoolSnapshot {
            entries: vec![coinbase_like, spend(1, 1), spend(1, 1), spend(2, 1), spend(3, 1)],
        };
        let template = builder.build(&tip(), snapshot, false, 0).unwrap();

        assert_eq!(template.transaction_count(), 2);
        assert_eq!(template.total_fees, 2);
    }

    #[test]
    fn test_size_limit_skips_oversized() {
        let mut config = BlockConfig::default();
        config.max_block_size = HEADER_SIZE + 9 + crate::COINBASE_RESERVED_SIZE + 100;
        let builder = CandidateBuilder::new(config, OP_TRUE_SCRIPT.to_vec());

        let mut big = spend(9, 99);
        big.tx.inputs[0].script_sig = vec![0u8; 500];
        let snapshot = MempoolSnapshot {
            entries: vec![big, spend(1, 1)],
        };
        let template = builder.build(&tip(), snapshot, false, 0).unwrap();

        assert_eq!(template.transaction_count(), 1);
        assert_eq!(template.total_fees, 1);
    }
}
