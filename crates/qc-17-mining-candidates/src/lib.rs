//! # Quantum Chain - Mining Candidates (Subsystem 17)
//!
//! **Bounded Context:** Block Production & Mining
//! **Architecture Compliance:** DDD + Hexagonal + TDD
//!
//! ## Purpose
//!
//! Separates block assembly from the proof-of-work search. The node issues
//! small, uniquely identified work units (candidates) built from a snapshot
//! of chain and mempool state. A miner rebuilds the header from the
//! coinbase merkle branch alone, searches the nonce space and submits a
//! solution, which is checked and, if it wins, committed as the new tip.
//!
//! ## Architecture Layers
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │  Adapters (Outer)                                   │
//! │  - RPC: getminingcandidate / submitminingsolution   │
//! │  - Memory: chain state, mempool, block validator    │
//! └─────────────────────────────────────────────────────┘
//!                         │
//! ┌─────────────────────────────────────────────────────┐
//! │  Ports (Middle)                                     │
//! │  - Inbound: MiningCandidateApi                      │
//! │  - Outbound: MempoolSnapshotProvider,               │
//! │    ChainStateProvider, BlockValidator, Clock        │
//! └─────────────────────────────────────────────────────┘
//!                         │
//! ┌─────────────────────────────────────────────────────┐
//! │  Domain (Inner)                                     │
//! │  - CandidateBuilder, LeaseStore, SolutionValidator  │
//! │  - Merkle branch, compact targets, coinbase rules   │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## Protocol Guarantees
//!
//! 1. **Unique ids**: candidate ids are random and never reused while held
//! 2. **Proof correctness**: folding any coinbase through the branch gives
//!    the root of `[coinbase] ++ transactions`
//! 3. **One commit per tip**: racing solutions against one parent yield
//!    exactly one accepted block; the rest are `stale-tip` or `high-hash`
//! 4. **Stable staleness**: resubmitting after the tip moved gives the same
//!    answer every time
//!
//! ## Usage Example
//!
//! ```rust,ignore
//! let service = CandidateService::new(
//!     MiningCandidateConfig::default(),
//!     Arc::new(InMemoryMempool::new()),
//!     chain,
//!     Arc::new(StructuralBlockValidator),
//!     Arc::new(SystemClock),
//! )?;
//!
//! let candidate = service.get_candidate(true).await?;
//! let outcome = service
//!     .submit_solution(SubmissionInput::new(candidate.id.to_string(), nonce))
//!     .await?;
//! ```
//!
//! ## Module Structure
//!
//! - [`domain`]: candidate model and rules
//! - [`ports`]: hexagonal interfaces (inbound/outbound)
//! - [`adapters`]: JSON-RPC surface and in-memory collaborators
//! - [`service`]: the façade

#![warn(missing_docs)]
#![warn(clippy::all)]

/// RPC and in-memory adapters
pub mod adapters;
/// Domain models and business logic
pub mod domain;
pub mod ports;
pub mod service;
pub mod utils;

mod config;
mod error;
mod metrics;

pub use config::{BlockConfig, LeaseConfig, MiningCandidateConfig};
pub use error::{CandidateError, Result};
pub use metrics::Metrics;

// Re-export commonly used types
pub use domain::{
    Block, BlockHeader, Candidate, CandidateId, CandidateTemplate, ChainTip, LeaseRecord,
    LeaseStatus, MempoolEntry, MempoolSnapshot, SubmissionInput, SubmitOutcome, Transaction,
    ValidationMode, ValidationStage,
};

pub use ports::{
    BlockValidator, ChainStateProvider, Clock, MempoolSnapshotProvider, MiningCandidateApi,
    TipExtension, ValidationVerdict,
};

pub use adapters::{
    InMemoryChainState, InMemoryMempool, ManualClock, RpcError, RpcHandler,
    StructuralBlockValidator, SystemClock,
};

pub use service::CandidateService;

/// Subsystem identifier for IPC communication
pub const SUBSYSTEM_ID: u8 = 17;

/// Bytes of block space held back for the coinbase during selection
pub const COINBASE_RESERVED_SIZE: usize = 1_000;

/// Default cap on non-coinbase transactions per candidate
pub const MAX_CANDIDATE_TRANSACTIONS: usize = 100_000;

/// Default allowed header time drift into the future (2 hours)
pub const MAX_FUTURE_BLOCK_TIME: u32 = 7_200;
