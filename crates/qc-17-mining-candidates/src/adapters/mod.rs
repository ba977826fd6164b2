//! Adapters: JSON-RPC front end and reference collaborators

pub mod clock;
pub mod memory;
pub mod rpc;

pub use clock::{ManualClock, SystemClock};
pub use memory::{InMemoryChainState, InMemoryMempool, StructuralBlockValidator};
pub use rpc::{outcome_to_value, parse_include_coinbase, parse_submission, CandidateView, RpcError, RpcHandler};
