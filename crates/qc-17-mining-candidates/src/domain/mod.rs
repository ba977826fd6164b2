//! Domain layer - candidate construction, leases and solution checking
//!
//! Everything here except [`SolutionValidator`] is synchronous and free of
//! I/O. The validator awaits the external block validator under a timeout.
//!
//! ## Entities
//!
//! - [`CandidateTemplate`] / [`Candidate`]: immutable work unit
//! - [`LeaseRecord`]: registry view of an issued candidate
//! - [`SubmissionInput`] / [`SubmitOutcome`]: submission in, verdict out
//! - [`Block`], [`BlockHeader`], [`Transaction`]: wire model
//!
//! ## Services
//!
//! - [`CandidateBuilder`]: template from tip plus mempool snapshot
//! - [`LeaseStore`]: id registry with supersede and garbage collection
//! - [`SolutionValidator`]: rebuild, check and commit solved blocks
//!
//! ## Rules
//!
//! - [`merkle`]: coinbase branch build and fold
//! - [`difficulty`]: compact targets and proof-of-work
//! - [`invariants`]: structural block checks

pub mod builder;
pub mod coinbase;
pub mod difficulty;
mod entities;
pub mod invariants;
pub mod lease_store;
pub mod merkle;
pub mod transaction;
pub mod validator;

pub use builder::CandidateBuilder;
pub use coinbase::{
    block_subsidy, commits_to_height, create_coinbase, decode_height, encode_height, COIN,
    OP_TRUE_SCRIPT,
};
pub use difficulty::{
    check_proof_of_work, compact_to_target, target_to_compact, PowCheck, REGTEST_POW_LIMIT_BITS,
};
pub use entities::*;
pub use invariants::{check_block, check_context_free, RuleViolation, StructuralLimits};
pub use lease_store::LeaseStore;
pub use merkle::{build_proof, compute_merkle_root, fold_proof, fold_proof_bytes};
pub use transaction::{Block, BlockHeader, DecodeError, OutPoint, Transaction, TxIn, TxOut};
pub use validator::{SolutionValidator, ValidatorSettings};
