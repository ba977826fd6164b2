//! Inbound ports (driving side - API)

use crate::domain::{Candidate, SubmissionInput, SubmitOutcome};
use crate::error::Result;
use async_trait::async_trait;
use primitive_types::H256;
use std::sync::Arc;

/// Primary port: mining candidate protocol
#[async_trait]
pub trait MiningCandidateApi: Send + Sync {
    /// Issue a candidate against the current tip
    ///
    /// With `include_coinbase` the candidate carries a server-built
    /// coinbase the miner may use as is.
    async fn get_candidate(&self, include_coinbase: bool) -> Result<Arc<Candidate>>;

    /// Submit a solution for an issued candidate
    ///
    /// `Err` is reserved for malformed or unresolvable submissions; every
    /// other result, including `high-hash`, is a [`SubmitOutcome`].
    async fn submit_solution(&self, input: SubmissionInput) -> Result<SubmitOutcome>;

    /// Announce a tip change that did not come through `submit_solution`
    fn notify_tip_changed(&self, new_tip: H256) -> usize;
}
