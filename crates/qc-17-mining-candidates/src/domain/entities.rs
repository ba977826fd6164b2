//! Domain entities for mining candidates

use super::coinbase::{create_coinbase, OP_TRUE_SCRIPT};
use super::merkle::compute_merkle_root;
use super::transaction::{Block, BlockHeader, Transaction};
use crate::error::{CandidateError, Result};
use primitive_types::H256;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Opaque, unguessable candidate identifier (random UUID v4)
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CandidateId(Uuid);

impl CandidateId {
    /// Fresh random id
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a caller-supplied id; anything unparseable cannot name a lease
    pub fn parse(s: &str) -> Result<Self> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|_| CandidateError::UnknownCandidate)
    }
}

impl fmt::Display for CandidateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

/// How much re-validation a solved block receives before commit
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationMode {
    /// Trust transaction admissibility established at build time
    Fast,
    /// Re-run every block-acceptance check
    #[default]
    Full,
}

/// Point in the protocol at which a block is handed to the validator
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ValidationStage {
    /// Template test before issue; proof-of-work is not checked
    Template,
    /// Solved block before tip extension
    Submission,
}

/// Chain tip as seen by the candidate builder
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ChainTip {
    /// Tip block hash
    pub hash: H256,
    /// Tip height
    pub height: u64,
    /// Tip block time
    pub time: u32,
    /// Median of the last 11 block times
    pub median_time_past: u32,
    /// Compact target required of the next block
    pub next_bits: u32,
}

/// Mempool transaction with its fee
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MempoolEntry {
    /// Transaction
    pub tx: Transaction,
    /// Fee paid, in base units
    pub fee: u64,
}

/// Ordered mempool snapshot, already filtered by the selection policy
#[derive(Clone, Debug, Default)]
pub struct MempoolSnapshot {
    /// Entries in block order
    pub entries: Vec<MempoolEntry>,
}

/// Immutable block template, the content of a candidate before it has an id
#[derive(Clone, Debug)]
pub struct CandidateTemplate {
    /// Tip hash the template extends
    pub prev_hash: H256,
    /// Height of the block being built
    pub height: u64,
    /// Header version
    pub version: i32,
    /// Compact target
    pub bits: u32,
    /// Header time
    pub time: u32,
    /// Median time past of the parent, bounds caller-supplied times
    pub median_time_past: u32,
    /// Subsidy plus fees available to the coinbase
    pub coinbase_value: u64,
    /// Sum of selected transaction fees
    pub total_fees: u64,
    /// Sibling path for the coinbase slot
    pub merkle_proof: Vec<H256>,
    /// Server-built coinbase, when requested
    pub coinbase_template: Option<Transaction>,
    /// Non-coinbase transactions in block order
    pub(crate) transactions: Arc<[Transaction]>,
    /// Ids of `transactions`, same order
    pub(crate) transaction_ids: Arc<[H256]>,
}

impl CandidateTemplate {
    /// Ids of the non-coinbase transactions
    pub fn transaction_ids(&self) -> &[H256] {
        &self.transaction_ids
    }

    /// Number of non-coinbase transactions
    pub fn transaction_count(&self) -> usize {
        self.transactions.len()
    }

    /// Header for a given coinbase and solution fields
    pub fn header(&self, merkle_root: H256, time: u32, version: i32, nonce: u32) -> BlockHeader {
        BlockHeader {
            version,
            prev_hash: self.prev_hash,
            merkle_root,
            time,
            bits: self.bits,
            nonce,
        }
    }

    /// Assemble the full block around a coinbase
    pub fn assemble(&self, header: BlockHeader, coinbase: Transaction) -> Block {
        let mut transactions = Vec::with_capacity(self.transactions.len() + 1);
        transactions.push(coinbase);
        transactions.extend(self.transactions.iter().cloned());
        Block {
            header,
            transactions,
        }
    }

    /// Unsolved block for the pre-issue validity test
    ///
    /// Uses the template coinbase when present, otherwise an `OP_TRUE`
    /// placeholder paying the full coinbase value.
    pub fn preview_block(&self) -> Block {
        let coinbase = self
            .coinbase_template
            .clone()
            .unwrap_or_else(|| create_coinbase(self.height, self.coinbase_value, &OP_TRUE_SCRIPT));
        let mut ids = Vec::with_capacity(self.transaction_ids.len() + 1);
        ids.push(coinbase.txid());
        ids.extend_from_slice(&self.transaction_ids);
        let header = self.header(compute_merkle_root(&ids), self.time, self.version, 0);
        self.assemble(header, coinbase)
    }
}

/// Issued candidate: a template registered under an id
#[derive(Clone, Debug)]
pub struct Candidate {
    /// Lease id
    pub id: CandidateId,
    /// Template content
    pub template: CandidateTemplate,
}

/// Lease lifecycle state
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LeaseStatus {
    /// Issued against the current tip
    Open,
    /// Tip has moved on since issue
    Superseded,
}

/// Registry entry for an issued candidate (handed out by copy)
#[derive(Clone, Debug)]
pub struct LeaseRecord {
    /// Issued candidate
    pub candidate: Arc<Candidate>,
    /// Tip the candidate was built on
    pub issued_tip: H256,
    /// Lifecycle state
    pub status: LeaseStatus,
}

/// Solution submitted against a candidate
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SubmissionInput {
    /// Candidate id as issued
    pub id: String,
    /// Header nonce
    pub nonce: Option<u32>,
    /// Hex-encoded replacement coinbase
    pub coinbase: Option<String>,
    /// Header time override
    pub time: Option<u32>,
    /// Header version override
    pub version: Option<i32>,
}

impl SubmissionInput {
    /// Submission with a nonce and the candidate's own coinbase
    pub fn new(id: impl Into<String>, nonce: u32) -> Self {
        Self {
            id: id.into(),
            nonce: Some(nonce),
            ..Self::default()
        }
    }

    /// Attach a caller-built coinbase
    pub fn with_coinbase(mut self, coinbase_hex: impl Into<String>) -> Self {
        self.coinbase = Some(coinbase_hex.into());
        self
    }

    /// Override the header time
    pub fn with_time(mut self, time: u32) -> Self {
        self.time = Some(time);
        self
    }

    /// Override the header version
    pub fn with_version(mut self, version: i32) -> Self {
        self.version = Some(version);
        self
    }
}

/// Result of a well-formed submission
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Block committed as the new tip
    Accepted {
        /// New tip hash
        block_hash: H256,
        /// New tip height
        height: u64,
    },
    /// Header hash above target; keep searching
    HighHash,
    /// Valid work, but the tip moved first
    StaleTip,
    /// Reconstructed block broke a structural or consensus rule
    ValidationFailure(String),
    /// Block validation did not finish in time
    ValidationTimeout,
}

impl SubmitOutcome {
    /// Check whether the block became the tip
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }

    /// Short reason string for rejected outcomes
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Accepted { .. } => None,
            Self::HighHash => Some("high-hash"),
            Self::StaleTip => Some("stale-tip"),
            Self::ValidationFailure(reason) => Some(reason),
            Self::ValidationTimeout => Some("validation-timeout"),
        }
    }
}
