//! Error types for the mining candidate subsystem
//!
//! Only caller mistakes, collaborator failures and internal faults are
//! errors. Ordinary submission results (`high-hash`, stale tip, rejected
//! block, validation timeout) are [`SubmitOutcome`](crate::SubmitOutcome)
//! values.

use thiserror::Error;

/// Result type alias for mining candidate operations
pub type Result<T> = std::result::Result<T, CandidateError>;

/// JSON-RPC code for malformed or unresolvable request payloads
pub const RPC_DESERIALIZATION_ERROR: i32 = -22;

/// JSON-RPC code for out-of-range parameters
pub const RPC_INVALID_PARAMETER: i32 = -8;

/// JSON-RPC code for internal failures
pub const RPC_INTERNAL_ERROR: i32 = -32603;

/// JSON-RPC code for collaborator (mempool, chain) failures
pub const RPC_MISC_ERROR: i32 = -1;

/// Errors that can occur while issuing candidates or accepting solutions
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CandidateError {
    /// Candidate id was never issued, has been evicted, or does not parse
    #[error("Block candidate ID not found")]
    UnknownCandidate,

    /// Submitted coinbase could not be decoded
    #[error("coinbase decode failed")]
    InvalidCoinbase,

    /// A required submission field is absent
    #[error("{0} not found")]
    MissingInput(&'static str),

    /// Malformed argument (wrong hash length, out-of-range number, bad bits)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Mempool snapshot could not be taken
    #[error("Mempool error: {0}")]
    Mempool(String),

    /// Chain state could not be read
    #[error("Chain state error: {0}")]
    ChainState(String),

    /// Template failed the pre-issue validity test
    #[error("Block candidate rejected: {0}")]
    TemplateRejected(String),

    /// Template validity test did not finish in time
    #[error("Block validation timed out")]
    ValidationTimeout,

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Internal invariant violated
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CandidateError {
    /// Stable machine-checkable code surfaced to RPC callers
    pub fn code(&self) -> i32 {
        match self {
            Self::UnknownCandidate
            | Self::InvalidCoinbase
            | Self::MissingInput(_)
            | Self::Serialization(_) => RPC_DESERIALIZATION_ERROR,
            Self::InvalidArgument(_) | Self::InvalidConfig(_) => RPC_INVALID_PARAMETER,
            Self::Mempool(_)
            | Self::ChainState(_)
            | Self::TemplateRejected(_)
            | Self::ValidationTimeout => RPC_MISC_ERROR,
            Self::Internal(_) => RPC_INTERNAL_ERROR,
        }
    }

    /// Check if the caller caused the error (retrying unchanged is pointless)
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownCandidate
                | Self::InvalidCoinbase
                | Self::MissingInput(_)
                | Self::InvalidArgument(_)
                | Self::Serialization(_)
        )
    }

    /// Check if error is recoverable (a fresh request may succeed)
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Mempool(_) | Self::ChainState(_) | Self::ValidationTimeout
        )
    }

    /// Check if error signals a programming fault
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::Internal(_))
    }
}
