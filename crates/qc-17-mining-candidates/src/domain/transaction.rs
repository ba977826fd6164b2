//! Block, header and transaction model with the classic wire encoding
//!
//! Integers are little-endian, collection lengths use the compact-size
//! varint, and identifiers are double SHA-256 over the encoded bytes.

use crate::utils::hashing::sha256d;
use primitive_types::H256;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Encoded size of a block header
pub const HEADER_SIZE: usize = 80;

/// Previous-output index used by coinbase inputs
pub const NULL_INDEX: u32 = u32::MAX;

/// Upper bound on a single script, guards decoding of hostile input
pub const MAX_SCRIPT_SIZE: usize = 10_000;

/// Transaction decoding failure
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DecodeError {
    /// Input ended before the structure was complete
    #[error("unexpected end of data at offset {0}")]
    Truncated(usize),

    /// Bytes remained after the structure was complete
    #[error("{0} trailing bytes")]
    TrailingBytes(usize),

    /// Varint used a longer form than needed
    #[error("non-canonical compact size")]
    NonCanonicalSize,

    /// Declared length is larger than allowed
    #[error("length {0} exceeds limit")]
    Oversized(u64),

    /// Hex layer failed
    #[error("invalid hex: {0}")]
    Hex(String),
}

/// Reference to a previous transaction output
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutPoint {
    /// Spent transaction id
    pub txid: H256,
    /// Spent output index
    pub index: u32,
}

impl OutPoint {
    /// The outpoint spent by a coinbase input
    pub fn null() -> Self {
        Self {
            txid: H256::zero(),
            index: NULL_INDEX,
        }
    }

    /// Check whether this is the coinbase outpoint
    pub fn is_null(&self) -> bool {
        self.txid.is_zero() && self.index == NULL_INDEX
    }
}

/// Transaction input
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxIn {
    /// Output being spent
    pub prev_out: OutPoint,
    /// Unlocking script (height push + extra nonce space for a coinbase)
    pub script_sig: Vec<u8>,
    /// Sequence number
    pub sequence: u32,
}

/// Transaction output
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOut {
    /// Value in base units
    pub value: u64,
    /// Locking script
    pub script_pubkey: Vec<u8>,
}

/// Transaction
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Transaction format version
    pub version: i32,
    /// Inputs
    pub inputs: Vec<TxIn>,
    /// Outputs
    pub outputs: Vec<TxOut>,
    /// Lock time
    pub lock_time: u32,
}

impl Transaction {
    /// Encode to wire bytes
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_size());
        out.extend_from_slice(&self.version.to_le_bytes());
        write_compact_size(&mut out, self.inputs.len() as u64);
        for input in &self.inputs {
            out.extend_from_slice(input.prev_out.txid.as_bytes());
            out.extend_from_slice(&input.prev_out.index.to_le_bytes());
            write_compact_size(&mut out, input.script_sig.len() as u64);
            out.extend_from_slice(&input.script_sig);
            out.extend_from_slice(&input.sequence.to_le_bytes());
        }
        write_compact_size(&mut out, self.outputs.len() as u64);
        for output in &self.outputs {
            out.extend_from_slice(&output.value.to_le_bytes());
            write_compact_size(&mut out, output.script_pubkey.len() as u64);
            out.extend_from_slice(&output.script_pubkey);
        }
        out.extend_from_slice(&self.lock_time.to_le_bytes());
        out
    }

    /// Decode from wire bytes; the whole buffer must be consumed
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let mut reader = Reader::new(bytes);
        let tx = reader.transaction()?;
        if reader.remaining() != 0 {
            return Err(DecodeError::TrailingBytes(reader.remaining()));
        }
        Ok(tx)
    }

    /// Decode from a hex string
    pub fn from_hex(hex_str: &str) -> Result<Self, DecodeError> {
        let bytes = hex::decode(hex_str.trim()).map_err(|e| DecodeError::Hex(e.to_string()))?;
        Self::decode(&bytes)
    }

    /// Encode as lowercase hex
    pub fn to_hex(&self) -> String {
        hex::encode(self.encode())
    }

    /// Transaction id
    pub fn txid(&self) -> H256 {
        sha256d(&self.encode())
    }

    /// Size of the wire encoding
    pub fn encoded_size(&self) -> usize {
        let inputs: usize = self
            .inputs
            .iter()
            .map(|i| 32 + 4 + compact_size_len(i.script_sig.len() as u64) + i.script_sig.len() + 4)
            .sum();
        let outputs: usize = self
            .outputs
            .iter()
            .map(|o| 8 + compact_size_len(o.script_pubkey.len() as u64) + o.script_pubkey.len())
            .sum();
        4 + compact_size_len(self.inputs.len() as u64)
            + inputs
            + compact_size_len(self.outputs.len() as u64)
            + outputs
            + 4
    }

    /// Check whether this transaction mints new coins
    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1 && self.inputs[0].prev_out.is_null()
    }

    /// Sum of output values, `None` on overflow
    pub fn total_output_value(&self) -> Option<u64> {
        self.outputs
            .iter()
            .try_fold(0u64, |acc, o| acc.checked_add(o.value))
    }
}

/// Block header
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    /// Header version
    pub version: i32,
    /// Parent block hash
    pub prev_hash: H256,
    /// Merkle root over all transaction ids
    pub merkle_root: H256,
    /// Unix timestamp (seconds)
    pub time: u32,
    /// Compact difficulty target
    pub bits: u32,
    /// Proof-of-work nonce
    pub nonce: u32,
}

impl BlockHeader {
    /// Encode to the fixed 80-byte layout
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        out[0..4].copy_from_slice(&self.version.to_le_bytes());
        out[4..36].copy_from_slice(self.prev_hash.as_bytes());
        out[36..68].copy_from_slice(self.merkle_root.as_bytes());
        out[68..72].copy_from_slice(&self.time.to_le_bytes());
        out[72..76].copy_from_slice(&self.bits.to_le_bytes());
        out[76..80].copy_from_slice(&self.nonce.to_le_bytes());
        out
    }

    /// Block hash (proof-of-work hash)
    pub fn hash(&self) -> H256 {
        sha256d(&self.encode())
    }
}

/// Full block: header plus transactions, coinbase first
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Header
    pub header: BlockHeader,
    /// Transactions, coinbase at index 0
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// Block hash
    pub fn hash(&self) -> H256 {
        self.header.hash()
    }

    /// Coinbase transaction, if present
    pub fn coinbase(&self) -> Option<&Transaction> {
        self.transactions.first()
    }

    /// All transaction ids in block order
    pub fn txids(&self) -> Vec<H256> {
        self.transactions.iter().map(Transaction::txid).collect()
    }

    /// Size of the full wire encoding
    pub fn encoded_size(&self) -> usize {
        HEADER_SIZE
            + compact_size_len(self.transactions.len() as u64)
            + self
                .transactions
                .iter()
                .map(Transaction::encoded_size)
                .sum::<usize>()
    }
}

/// Append a compact-size varint
pub fn write_compact_size(out: &mut Vec<u8>, n: u64) {
    match n {
        0..=0xfc => out.push(n as u8),
        0xfd..=0xffff => {
            out.push(0xfd);
            out.extend_from_slice(&(n as u16).to_le_bytes());
        }
        0x1_0000..=0xffff_ffff => {
            out.push(0xfe);
            out.extend_from_slice(&(n as u32).to_le_bytes());
        }
        _ => {
            out.push(0xff);
            out.extend_from_slice(&n.to_le_bytes());
        }
    }
}

/// Encoded width of a compact-size varint
pub fn compact_size_len(n: u64) -> usize {
    match n {
        0..=0xfc => 1,
        0xfd..=0xffff => 3,
        0x1_0000..=0xffff_ffff => 5,
        _ => 9,
    }
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        if self.remaining() < n {
            return Err(DecodeError::Truncated(self.pos));
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u32(&mut self) -> Result<u32, DecodeError> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    fn compact_size(&mut self) -> Result<u64, DecodeError> {
        let first = self.array::<1>()?[0];
        let (value, min) = match first {
            0xfd => (u16::from_le_bytes(self.array()?) as u64, 0xfd),
            0xfe => (u32::from_le_bytes(self.array()?) as u64, 0x1_0000),
            0xff => (u64::from_le_bytes(self.array()?), 0x1_0000_0000),
            n => return Ok(n as u64),
        };
        if value < min {
            return Err(DecodeError::NonCanonicalSize);
        }
        Ok(value)
    }

    /// Length prefix bounded both by `limit` and by the bytes left
    fn length(&mut self, limit: usize) -> Result<usize, DecodeError> {
        let len = self.compact_size()?;
        if len > limit as u64 || len > self.remaining() as u64 {
            return Err(DecodeError::Oversized(len));
        }
        Ok(len as usize)
    }

    fn script(&mut self) -> Result<Vec<u8>, DecodeError> {
        let len = self.length(MAX_SCRIPT_SIZE)?;
        Ok(self.take(len)?.to_vec())
    }

    fn transaction(&mut self) -> Result<Transaction, DecodeError> {
        let version = i32::from_le_bytes(self.array()?);

        // Each input takes at least 41 bytes, each output at least 9.
        let input_count = self.length(self.remaining() / 41)?;
        let mut inputs = Vec::with_capacity(input_count);
        for _ in 0..input_count {
            let txid = H256::from(self.array::<32>()?);
            let index = self.u32()?;
            let script_sig = self.script()?;
            let sequence = self.u32()?;
            inputs.push(TxIn {
                prev_out: OutPoint { txid, index },
                script_sig,
                sequence,
            });
        }

        let output_count = self.length(self.remaining() / 9)?;
        let mut outputs = Vec::with_capacity(output_count);
        for _ in 0..output_count {
            let value = u64::from_le_bytes(self.array()?);
            let script_pubkey = self.script()?;
            outputs.push(TxOut {
                value,
                script_pubkey,
            });
        }

        let lock_time = self.u32()?;
        Ok(Transaction {
            version,
            inputs,
            outputs,
            lock_time,
        })
    }
}
