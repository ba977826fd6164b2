//! Solution validator: resolves a lease, rebuilds the block from a
//! submission and decides its fate.
//!
//! Everything except the final `extend_tip` call and the lease-store sync
//! after it runs without holding any lock shared with other submissions.

use super::difficulty::{check_proof_of_work, PowCheck};
use super::entities::{CandidateId, LeaseStatus, SubmissionInput, SubmitOutcome, ValidationMode, ValidationStage};
use super::invariants::{check_block, RuleViolation, StructuralLimits};
use super::lease_store::LeaseStore;
use super::merkle::fold_proof;
use super::transaction::Transaction;
use crate::error::{CandidateError, Result};
use crate::ports::{BlockValidator, ChainStateProvider, Clock, TipExtension, ValidationVerdict};
use primitive_types::U256;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Settings the validator applies to every submission
#[derive(Clone, Debug)]
pub struct ValidatorSettings {
    /// Depth of collaborator validation
    pub mode: ValidationMode,
    /// Bound on one collaborator validation call
    pub timeout: Duration,
    /// Easiest acceptable target
    pub pow_limit: U256,
    /// Maximum serialized block size
    pub max_block_size: usize,
    /// Allowed header time drift into the future
    pub max_future_time: u32,
}

/// Turns submissions into outcomes and commits winning blocks
pub struct SolutionValidator {
    leases: Arc<LeaseStore>,
    chain: Arc<dyn ChainStateProvider>,
    block_validator: Arc<dyn BlockValidator>,
    clock: Arc<dyn Clock>,
    settings: ValidatorSettings,
}

impl SolutionValidator {
    /// Create a validator over the given lease store and collaborators
    pub fn new(
        leases: Arc<LeaseStore>,
        chain: Arc<dyn ChainStateProvider>,
        block_validator: Arc<dyn BlockValidator>,
        clock: Arc<dyn Clock>,
        settings: ValidatorSettings,
    ) -> Self {
        Self {
            leases,
            chain,
            block_validator,
            clock,
            settings,
        }
    }

    /// Settings in force
    pub fn settings(&self) -> &ValidatorSettings {
        &self.settings
    }

    /// Process one submission
    ///
    /// Caller mistakes come back as `Err`; everything else, including a
    /// missed target or a lost race, is a [`SubmitOutcome`].
    #[tracing::instrument(skip(self, input), fields(candidate_id = %input.id, nonce = ?input.nonce))]
    pub async fn submit(&self, input: &SubmissionInput) -> Result<SubmitOutcome> {
        let id = CandidateId::parse(&input.id)?;
        let record = self.leases.resolve(&id)?;
        let nonce = input.nonce.ok_or(CandidateError::MissingInput("nonce"))?;
        let template = &record.candidate.template;

        let coinbase = match &input.coinbase {
            Some(hex_str) => {
                Transaction::from_hex(hex_str).map_err(|_| CandidateError::InvalidCoinbase)?
            }
            None => template
                .coinbase_template
                .clone()
                .ok_or(CandidateError::MissingInput("coinbase"))?,
        };

        let merkle_root = fold_proof(coinbase.txid(), &template.merkle_proof);
        let header = template.header(
            merkle_root,
            input.time.unwrap_or(template.time),
            input.version.unwrap_or(template.version),
            nonce,
        );
        let block_hash = header.hash();

        match check_proof_of_work(&block_hash, header.bits, self.settings.pow_limit) {
            PowCheck::Met => {}
            PowCheck::HighHash => {
                debug!("[qc-17] high-hash for candidate {}", id);
                return Ok(SubmitOutcome::HighHash);
            }
            PowCheck::BadBits => {
                warn!("[qc-17] Candidate {} carries unusable bits {:08x}", id, header.bits);
                return Ok(SubmitOutcome::ValidationFailure(
                    RuleViolation::BadDiffBits.reason().to_string(),
                ));
            }
        }

        // The chain decides staleness; lease status may lag behind it.
        let tip = self.chain.tip()?;
        if tip.hash != template.prev_hash {
            warn!(
                "[qc-17] Solution for candidate {} built on {:?}, tip is {:?}",
                id, template.prev_hash, tip.hash
            );
            return Ok(SubmitOutcome::StaleTip);
        }
        if record.status == LeaseStatus::Superseded {
            debug!(
                "[qc-17] Candidate {} marked superseded but still extends the tip",
                id
            );
        }

        let block = template.assemble(header, coinbase);
        let limits = StructuralLimits {
            pow_limit: self.settings.pow_limit,
            max_block_size: self.settings.max_block_size,
            max_future_time: self.settings.max_future_time,
            now: self.clock.now(),
        };
        if let Err(violation) = check_block(&block, template, &limits) {
            warn!(
                "[qc-17] Block {:?} from candidate {} rejected: {}",
                block_hash, id, violation
            );
            return Ok(SubmitOutcome::ValidationFailure(violation.reason().to_string()));
        }

        let verdict = tokio::time::timeout(
            self.settings.timeout,
            self.block_validator
                .validate(&block, self.settings.mode, ValidationStage::Submission),
        )
        .await;
        match verdict {
            Err(_) => {
                warn!(
                    "[qc-17] Validation of block {:?} exceeded {:?}",
                    block_hash, self.settings.timeout
                );
                return Ok(SubmitOutcome::ValidationTimeout);
            }
            Ok(Err(e)) => return Err(e),
            Ok(Ok(ValidationVerdict::Invalid(reason))) => {
                warn!(
                    "[qc-17] Block {:?} from candidate {} invalid: {}",
                    block_hash, id, reason
                );
                return Ok(SubmitOutcome::ValidationFailure(reason));
            }
            Ok(Ok(ValidationVerdict::Valid)) => {}
        }

        match self.chain.extend_tip(&block)? {
            TipExtension::Extended(new_tip) => {
                let superseded = match self.leases.sync_with_chain(self.chain.as_ref()) {
                    Ok(n) => n,
                    Err(e) => {
                        error!("[qc-17] Block committed but lease sync failed: {}", e);
                        0
                    }
                };
                info!(
                    block_hash = ?new_tip.hash,
                    height = new_tip.height,
                    superseded,
                    "[qc-17] Accepted block from candidate {}",
                    id
                );
                Ok(SubmitOutcome::Accepted {
                    block_hash: new_tip.hash,
                    height: new_tip.height,
                })
            }
            TipExtension::Stale { current } => {
                warn!(
                    "[qc-17] Candidate {} lost the race to {:?} at height {}",
                    id, current.hash, current.height
                );
                Ok(SubmitOutcome::StaleTip)
            }
        }
    }
}
