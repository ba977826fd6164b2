//! Merkle proof engine
//!
//! The coinbase always occupies leaf 0, so its authentication path is the
//! list of right-hand siblings on the way up and folding always hashes
//! `running || sibling`. Odd levels duplicate their last node.

use crate::error::Result;
use crate::utils::hashing::{hash_from_slice, hash_pair};
use primitive_types::H256;

/// Compute the sibling path for leaf 0 and the root it implies.
///
/// `coinbase_placeholder` only influences the returned root; the proof is a
/// function of `other_ids` alone, which is what lets any coinbase be
/// substituted later.
pub fn build_proof(coinbase_placeholder: H256, other_ids: &[H256]) -> (Vec<H256>, H256) {
    let mut level = Vec::with_capacity(other_ids.len() + 1);
    level.push(coinbase_placeholder);
    level.extend_from_slice(other_ids);

    let mut proof = Vec::new();
    while level.len() > 1 {
        proof.push(level[1]);
        level = next_level(&level);
    }
    (proof, level[0])
}

/// Fold a coinbase id through a proof produced by [`build_proof`]
pub fn fold_proof(coinbase_id: H256, proof: &[H256]) -> H256 {
    proof
        .iter()
        .fold(coinbase_id, |running, sibling| hash_pair(&running, sibling))
}

/// [`fold_proof`] over raw byte slices; every element must be 32 bytes
pub fn fold_proof_bytes(coinbase_id: &[u8], proof: &[Vec<u8>]) -> Result<H256> {
    let start = hash_from_slice(coinbase_id)?;
    let siblings = proof
        .iter()
        .map(|p| hash_from_slice(p))
        .collect::<Result<Vec<_>>>()?;
    Ok(fold_proof(start, &siblings))
}

/// Merkle root over an ordered leaf set (zero hash when empty)
pub fn compute_merkle_root(leaves: &[H256]) -> H256 {
    if leaves.is_empty() {
        return H256::zero();
    }
    let mut level = leaves.to_vec();
    while level.len() > 1 {
        level = next_level(&level);
    }
    level[0]
}

fn next_level(level: &[H256]) -> Vec<H256> {
    level
        .chunks(2)
        .map(|pair| match pair {
            [left, right] => hash_pair(left, right),
            [single] => hash_pair(single, single),
            _ => unreachable!("chunks(2) yields one or two elements"),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::hashing::sha256d;

    fn ids(n: usize) -> Vec<H256> {
        (0..n).map(|i| sha256d(&(i as u64).to_le_bytes())).collect()
    }

    #[test]
    fn test_coinbase_only_block() {
        let cb = sha256d(b"coinbase");
        let (proof, root) = build_proof(cb, &[]);
        assert!(proof.is_empty());
        assert_eq!(root, cb);
        assert_eq!(fold_proof(cb, &proof), cb);
    }

    #[test]
    fn test_two_leaves() {
        let cb = sha256d(b"coinbase");
        let other = ids(1);
        let (proof, root) = build_proof(cb, &other);
        assert_eq!(proof, other);
        assert_eq!(root, hash_pair(&cb, &other[0]));
    }

    #[test]
    fn test_odd_level_duplicates_last() {
        let leaves = ids(3);
        let left = hash_pair(&leaves[0], &leaves[1]);
        let right = hash_pair(&leaves[2], &leaves[2]);
        assert_eq!(compute_merkle_root(&leaves), hash_pair(&left, &right));
    }

    #[test]
    fn test_fold_matches_full_root_for_many_sizes() {
        for n in 0..40 {
            let others = ids(n);
            let cb = sha256d(format!("cb-{n}").as_bytes());
            let (proof, root) = build_proof(H256::zero(), &others);

            let mut all = vec![cb];
            all.extend_from_slice(&others);
            assert_eq!(fold_proof(cb, &proof), compute_merkle_root(&all), "n = {n}");

            let mut with_placeholder = vec![H256::zero()];
            with_placeholder.extend_from_slice(&others);
            assert_eq!(root, compute_merkle_root(&with_placeholder));
        }
    }

    #[test]
    fn test_proof_independent_of_placeholder() {
        let others = ids(9);
        let (a, _) = build_proof(H256::zero(), &others);
        let (b, _) = build_proof(H256::repeat_byte(0xee), &others);
        assert_eq!(a, b);
    }

    #[test]
    fn test_fold_proof_bytes_rejects_wrong_width() {
        let cb = [1u8; 32];
        assert!(fold_proof_bytes(&cb, &[vec![0u8; 32]]).is_ok());
        assert!(fold_proof_bytes(&cb, &[vec![0u8; 20]]).is_err());
        assert!(fold_proof_bytes(&cb[..31], &[]).is_err());
    }

    #[test]
    fn test_empty_root_is_zero() {
        assert_eq!(compute_merkle_root(&[]), H256::zero());
    }
}
