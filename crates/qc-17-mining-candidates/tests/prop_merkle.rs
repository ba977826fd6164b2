// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// PROPERTY-BASED TESTS — qc-17 mining candidates
//
// Merkle branch correctness, compact target encoding and height commitments
// over generated inputs.
//
// Run: cargo test -p qc-17-mining-candidates --test prop_merkle
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use primitive_types::{H256, U256};
use proptest::prelude::*;
use qc_17_mining_candidates::domain::{
    build_proof, commits_to_height, compact_to_target, compute_merkle_root, create_coinbase,
    decode_height, encode_height, fold_proof, target_to_compact, CandidateBuilder, ChainTip,
    MempoolEntry, MempoolSnapshot, OutPoint, Transaction, TxIn, TxOut, OP_TRUE_SCRIPT,
    REGTEST_POW_LIMIT_BITS,
};
use qc_17_mining_candidates::BlockConfig;

// ─────────────────────────────────────────────────────────────────
// GENERATORS
// ─────────────────────────────────────────────────────────────────

fn arb_hash() -> impl Strategy<Value = H256> {
    any::<[u8; 32]>().prop_map(H256::from)
}

fn arb_tx() -> impl Strategy<Value = Transaction> {
    (
        arb_hash(),                                 // spent txid
        0u32..16,                                   // spent index
        prop::collection::vec(any::<u8>(), 0..40),  // script_sig
        1u64..21_000_000_000_000,                   // value
    )
        .prop_map(|(txid, index, script_sig, value)| Transaction {
            version: 2,
            inputs: vec![TxIn {
                prev_out: OutPoint { txid, index },
                script_sig,
                sequence: u32::MAX,
            }],
            outputs: vec![TxOut {
                value,
                script_pubkey: OP_TRUE_SCRIPT.to_vec(),
            }],
            lock_time: 0,
        })
}

// ─────────────────────────────────────────────────────────────────
// MERKLE BRANCH PROPERTIES
// ─────────────────────────────────────────────────────────────────

proptest! {
    /// Folding any coinbase through the branch gives the full-tree root
    #[test]
    fn prop_fold_matches_full_root(
        others in prop::collection::vec(arb_hash(), 0..80),
        placeholder in arb_hash(),
        coinbase in arb_hash(),
    ) {
        let (proof, _) = build_proof(placeholder, &others);

        let mut leaves = vec![coinbase];
        leaves.extend_from_slice(&others);
        prop_assert_eq!(fold_proof(coinbase, &proof), compute_merkle_root(&leaves));
    }

    /// Branch depth is the tree height over `others.len() + 1` leaves
    #[test]
    fn prop_proof_depth(others in prop::collection::vec(arb_hash(), 0..200)) {
        let (proof, _) = build_proof(H256::zero(), &others);
        let leaves = others.len() + 1;
        let expected = (usize::BITS - (leaves - 1).leading_zeros()) as usize;
        prop_assert_eq!(proof.len(), expected);
    }

    /// Built candidates verify against any height-committing coinbase
    #[test]
    fn prop_candidate_proof_correct(
        txs in prop::collection::vec(arb_tx(), 0..30),
        height in 0u64..1_000_000,
        extra in prop::collection::vec(any::<u8>(), 0..16),
    ) {
        let tip = ChainTip {
            hash: H256::repeat_byte(9),
            height,
            time: 1_700_000_000,
            median_time_past: 1_699_999_000,
            next_bits: REGTEST_POW_LIMIT_BITS,
        };
        let snapshot = MempoolSnapshot {
            entries: txs.into_iter().map(|tx| MempoolEntry { tx, fee: 1 }).collect(),
        };
        let template = CandidateBuilder::new(BlockConfig::default(), OP_TRUE_SCRIPT.to_vec())
            .build(&tip, snapshot, false, 1_700_000_100)
            .unwrap();

        let mut coinbase = create_coinbase(template.height, template.coinbase_value, &OP_TRUE_SCRIPT);
        coinbase.inputs[0].script_sig.extend_from_slice(&extra);
        prop_assert!(commits_to_height(&coinbase, template.height));

        let mut leaves = vec![coinbase.txid()];
        leaves.extend_from_slice(template.transaction_ids());
        prop_assert_eq!(
            fold_proof(coinbase.txid(), &template.merkle_proof),
            compute_merkle_root(&leaves)
        );
    }
}

// ─────────────────────────────────────────────────────────────────
// COMPACT TARGET & HEIGHT PROPERTIES
// ─────────────────────────────────────────────────────────────────

proptest! {
    /// Normalized compact values survive decode then encode
    #[test]
    fn prop_compact_normalized_stable(exponent in 3u32..=32, mantissa in 0x8000u32..=0x7f_ffff) {
        let bits = (exponent << 24) | mantissa;
        let target = compact_to_target(bits).unwrap();
        prop_assert_eq!(target_to_compact(target), bits);
    }

    /// Encoding a target loses only low-order precision, never magnitude
    #[test]
    fn prop_compact_never_exceeds_target(raw in any::<[u8; 32]>()) {
        let target = U256::from_big_endian(&raw) >> 1;
        prop_assume!(!target.is_zero());
        let bits = target_to_compact(target);
        let decoded = compact_to_target(bits).unwrap();
        prop_assert!(decoded <= target);
        prop_assert_eq!(decoded.bits(), target.bits());
    }

    /// Height commitments read back exactly
    #[test]
    fn prop_height_commitment(height in 0u64..(1 << 63), suffix in prop::collection::vec(any::<u8>(), 0..8)) {
        let mut script = encode_height(height);
        script.extend_from_slice(&suffix);
        prop_assert_eq!(decode_height(&script), Some(height));
    }
}
