//! Coinbase construction: height commitment, subsidy schedule, payout

use super::transaction::{OutPoint, Transaction, TxIn, TxOut};

/// Base units per coin
pub const COIN: u64 = 100_000_000;

/// Subsidy of the first block, in coins
pub const INITIAL_SUBSIDY_COINS: u64 = 50;

/// Script that anyone can spend (`OP_TRUE`), the default payout
pub const OP_TRUE_SCRIPT: [u8; 1] = [0x51];

/// Calculate the block subsidy for a given height
///
/// Starts at 50 coins and halves every `halving_interval` blocks.
pub fn block_subsidy(height: u64, halving_interval: u64) -> u64 {
    let halvings = height / halving_interval.max(1);
    if halvings >= 64 {
        return 0;
    }
    (INITIAL_SUBSIDY_COINS * COIN) >> halvings
}

/// Script prefix committing to the block height
///
/// A single push of the minimal little-endian script number; height zero is
/// the empty push (`OP_0`).
pub fn encode_height(height: u64) -> Vec<u8> {
    let mut num = Vec::new();
    let mut rest = height;
    while rest > 0 {
        num.push((rest & 0xff) as u8);
        rest >>= 8;
    }
    // A set top bit would read back as negative.
    if num.last().is_some_and(|b| b & 0x80 != 0) {
        num.push(0);
    }
    let mut script = Vec::with_capacity(num.len() + 1);
    script.push(num.len() as u8);
    script.extend_from_slice(&num);
    script
}

/// Read back the height commitment at the start of a coinbase script
pub fn decode_height(script_sig: &[u8]) -> Option<u64> {
    let (&len, rest) = script_sig.split_first()?;
    let len = len as usize;
    if len > 8 || rest.len() < len {
        return None;
    }
    let num = &rest[..len];
    if num.last().is_some_and(|b| b & 0x80 != 0) {
        return None;
    }
    let height = num
        .iter()
        .rev()
        .fold(0u64, |acc, b| (acc << 8) | *b as u64);
    // Only the minimal encoding commits to the height.
    (encode_height(height) == script_sig[..=len]).then_some(height)
}

/// Check that a coinbase commits to `height`
pub fn commits_to_height(coinbase: &Transaction, height: u64) -> bool {
    coinbase
        .inputs
        .first()
        .is_some_and(|input| input.script_sig.starts_with(&encode_height(height)))
}

/// Creates a minimal coinbase: height-committing input, single payout output
pub fn create_coinbase(height: u64, value: u64, payout_script: &[u8]) -> Transaction {
    let mut script_sig = encode_height(height);
    // Keep the script at least two bytes long, as consensus requires.
    if script_sig.len() < 2 {
        script_sig.push(0x00);
    }
    Transaction {
        version: 1,
        inputs: vec![TxIn {
            prev_out: OutPoint::null(),
            script_sig,
            sequence: u32::MAX,
        }],
        outputs: vec![TxOut {
            value,
            script_pubkey: payout_script.to_vec(),
        }],
        lock_time: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subsidy_halving() {
        assert_eq!(block_subsidy(0, 210_000), 50 * COIN);
        assert_eq!(block_subsidy(209_999, 210_000), 50 * COIN);
        assert_eq!(block_subsidy(210_000, 210_000), 25 * COIN);
        assert_eq!(block_subsidy(150, 150), 25 * COIN);
        assert_eq!(block_subsidy(64 * 150, 150), 0);
    }

    #[test]
    fn test_encode_height_minimal() {
        assert_eq!(encode_height(0), vec![0x00]);
        assert_eq!(encode_height(1), vec![0x01, 0x01]);
        assert_eq!(encode_height(101), vec![0x01, 0x65]);
        assert_eq!(encode_height(128), vec![0x02, 0x80, 0x00]);
        assert_eq!(encode_height(500_000), vec![0x03, 0x20, 0xa1, 0x07]);
    }

    #[test]
    fn test_decode_height() {
        for h in [0u64, 1, 16, 101, 127, 128, 255, 256, 65_535, 500_000, u32::MAX as u64] {
            let mut script = encode_height(h);
            script.extend_from_slice(b"/extra nonce/");
            assert_eq!(decode_height(&script), Some(h), "height {h}");
        }
        // Non-minimal: 101 padded with a zero byte
        assert_eq!(decode_height(&[0x02, 0x65, 0x00]), None);
        assert_eq!(decode_height(&[]), None);
        assert_eq!(decode_height(&[0x04, 0x01]), None);
    }

    #[test]
    fn test_create_coinbase() {
        let cb = create_coinbase(101, 50 * COIN, &OP_TRUE_SCRIPT);
        assert!(cb.is_coinbase());
        assert!(commits_to_height(&cb, 101));
        assert!(!commits_to_height(&cb, 102));
        assert_eq!(cb.total_output_value(), Some(50 * COIN));
        assert!(cb.inputs[0].script_sig.len() >= 2);
    }

    #[test]
    fn test_genesis_height_coinbase_padded() {
        let cb = create_coinbase(0, 0, &OP_TRUE_SCRIPT);
        assert_eq!(cb.inputs[0].script_sig, vec![0x00, 0x00]);
        assert!(commits_to_height(&cb, 0));
    }
}
