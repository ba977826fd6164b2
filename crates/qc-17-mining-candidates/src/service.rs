//! Candidate service: the façade behind `getminingcandidate` and
//! `submitminingsolution`.

use crate::{
    config::MiningCandidateConfig,
    domain::{
        difficulty::describe_bits, Candidate, CandidateBuilder, ChainTip, LeaseStore, SolutionValidator,
        SubmissionInput, SubmitOutcome, ValidationMode, ValidationStage, ValidatorSettings,
    },
    error::{CandidateError, Result},
    metrics::Metrics,
    ports::{
        BlockValidator, ChainStateProvider, Clock, MempoolSnapshotProvider, MiningCandidateApi,
        ValidationVerdict,
    },
};
use async_trait::async_trait;
use parking_lot::Mutex;
use primitive_types::H256;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Composes builder, lease store and validator over the collaborators
pub struct CandidateService {
    builder: CandidateBuilder,
    leases: Arc<LeaseStore>,
    validator: SolutionValidator,
    mempool: Arc<dyn MempoolSnapshotProvider>,
    chain: Arc<dyn ChainStateProvider>,
    block_validator: Arc<dyn BlockValidator>,
    clock: Arc<dyn Clock>,
    mode: ValidationMode,
    timeout: Duration,
    metrics: Arc<Metrics>,

    /// Highest time issued for a tip, so reissues never go backwards
    time_floor: Mutex<Option<(H256, u32)>>,
}

impl CandidateService {
    /// Create a service; fails on an invalid configuration
    pub fn new(
        config: MiningCandidateConfig,
        mempool: Arc<dyn MempoolSnapshotProvider>,
        chain: Arc<dyn ChainStateProvider>,
        block_validator: Arc<dyn BlockValidator>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;

        info!("[qc-17] Initializing Mining Candidate Service");
        info!("  Validation Mode: {:?}", config.validation_mode);
        info!("  Validation Timeout: {}ms", config.validation_timeout_ms);
        info!(
            "  Lease Horizon: {}s / {} leases",
            config.lease.max_age_secs, config.lease.max_leases
        );

        let metrics = Arc::new(Metrics::new());
        let leases = Arc::new(LeaseStore::new(&config.lease, Arc::clone(&metrics)));
        let settings = ValidatorSettings {
            mode: config.validation_mode,
            timeout: config.validation_timeout(),
            pow_limit: config.block.pow_limit()?,
            max_block_size: config.block.max_block_size,
            max_future_time: config.block.max_future_time_secs,
        };
        let validator = SolutionValidator::new(
            Arc::clone(&leases),
            Arc::clone(&chain),
            Arc::clone(&block_validator),
            Arc::clone(&clock),
            settings,
        );

        Ok(Self {
            builder: CandidateBuilder::new(config.block.clone(), config.payout_script_bytes()?),
            leases,
            validator,
            mempool,
            chain,
            block_validator,
            clock,
            mode: config.validation_mode,
            timeout: config.validation_timeout(),
            metrics,
            time_floor: Mutex::new(None),
        })
    }

    /// Lease registry
    pub fn leases(&self) -> &Arc<LeaseStore> {
        &self.leases
    }

    /// Metrics collector
    pub fn metrics(&self) -> Arc<Metrics> {
        Arc::clone(&self.metrics)
    }

    /// Validation mode in force
    pub fn validation_mode(&self) -> ValidationMode {
        self.mode
    }

    /// Header time for a candidate on `tip`
    ///
    /// Reads and raises the per-tip floor in one lock scope, so concurrent
    /// callers never receive a time below one already handed out.
    fn reserve_issue_time(&self, tip: &ChainTip) -> u32 {
        let now = u32::try_from(self.clock.now()).unwrap_or(u32::MAX);
        let earliest = now.max(tip.median_time_past.saturating_add(1));

        let mut floor = self.time_floor.lock();
        let time = match *floor {
            Some((floor_tip, issued)) if floor_tip == tip.hash => earliest.max(issued),
            _ => earliest,
        };
        *floor = Some((tip.hash, time));
        time
    }

    async fn test_template(&self, candidate_block: &crate::domain::Block) -> Result<()> {
        let verdict = tokio::time::timeout(
            self.timeout,
            self.block_validator
                .validate(candidate_block, self.mode, ValidationStage::Template),
        )
        .await
        .map_err(|_| CandidateError::ValidationTimeout)??;

        match verdict {
            ValidationVerdict::Valid => Ok(()),
            ValidationVerdict::Invalid(reason) => {
                self.metrics.record_template_rejected();
                warn!("[qc-17] Template failed validity test: {}", reason);
                Err(CandidateError::TemplateRejected(reason))
            }
        }
    }
}

#[async_trait]
impl MiningCandidateApi for CandidateService {
    #[tracing::instrument(skip(self))]
    async fn get_candidate(&self, include_coinbase: bool) -> Result<Arc<Candidate>> {
        let tip = self.chain.tip()?;
        let snapshot = self.mempool.snapshot().await?;
        let time = self.reserve_issue_time(&tip);

        let template = self.builder.build(&tip, snapshot, include_coinbase, time)?;

        if self.mode == ValidationMode::Full {
            self.test_template(&template.preview_block()).await?;
        }

        let candidate = self.leases.register(template);
        self.metrics.record_issued();

        info!(
            candidate_id = %candidate.id,
            height = candidate.template.height,
            "[qc-17] Issued candidate with {} txs, bits {}",
            candidate.template.transaction_count(),
            describe_bits(candidate.template.bits, self.validator.settings().pow_limit)
        );
        Ok(candidate)
    }

    async fn submit_solution(&self, input: SubmissionInput) -> Result<SubmitOutcome> {
        let outcome = self.validator.submit(&input).await?;
        self.metrics.record_outcome(&outcome);
        Ok(outcome)
    }

    fn notify_tip_changed(&self, new_tip: H256) -> usize {
        let superseded = self.leases.supersede_all(new_tip);
        debug!(
            "[qc-17] External tip change to {:?}, {} leases superseded",
            new_tip, superseded
        );
        superseded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{InMemoryChainState, InMemoryMempool, ManualClock, StructuralBlockValidator};
    use crate::domain::REGTEST_POW_LIMIT_BITS;

    const GENESIS_TIME: u32 = 1_700_000_000;

    fn service(clock: Arc<ManualClock>) -> (CandidateService, Arc<InMemoryChainState>) {
        let chain = Arc::new(InMemoryChainState::new(
            H256::repeat_byte(0x11),
            100,
            GENESIS_TIME,
            REGTEST_POW_LIMIT_BITS,
        ));
        let service = CandidateService::new(
            MiningCandidateConfig::default(),
            Arc::new(InMemoryMempool::new()),
            chain.clone(),
            Arc::new(StructuralBlockValidator),
            clock,
        )
        .unwrap();
        (service, chain)
    }

    #[tokio::test]
    async fn test_candidate_height_and_time() {
        let clock = Arc::new(ManualClock::new(GENESIS_TIME as u64 + 60));
        let (service, _) = service(clock);

        let candidate = service.get_candidate(true).await.unwrap();
        assert_eq!(candidate.template.height, 101);
        assert_eq!(candidate.template.time, GENESIS_TIME + 60);
        assert!(candidate.template.coinbase_template.is_some());
        assert_eq!(service.metrics().get_candidates_issued(), 1);
    }

    #[tokio::test]
    async fn test_reissue_time_never_goes_back() {
        let clock = Arc::new(ManualClock::new(GENESIS_TIME as u64 + 600));
        let (service, _) = service(clock.clone());

        let first = service.get_candidate(false).await.unwrap();
        clock.set(GENESIS_TIME as u64 + 30);
        let second = service.get_candidate(false).await.unwrap();

        assert_eq!(second.template.time, first.template.time);
    }

    #[test]
    fn test_reserved_time_is_the_new_floor() {
        let clock = Arc::new(ManualClock::new(GENESIS_TIME as u64 + 500));
        let (service, chain) = service(clock.clone());
        let tip = chain.tip().unwrap();

        let first = service.reserve_issue_time(&tip);
        // Clock steps back before the first caller has built anything
        clock.set(GENESIS_TIME as u64 + 20);
        let second = service.reserve_issue_time(&tip);

        assert_eq!(first, GENESIS_TIME + 500);
        assert_eq!(second, first);
    }

    #[test]
    fn test_concurrent_reservations_never_go_back() {
        let clock = Arc::new(ManualClock::new(GENESIS_TIME as u64 + 1_000));
        let (service, chain) = service(clock.clone());
        let tip = chain.tip().unwrap();

        std::thread::scope(|scope| {
            for worker in 0..4u64 {
                let service = &service;
                let clock = &clock;
                scope.spawn(move || {
                    let mut last = 0;
                    for step in 0..200u64 {
                        clock.set(GENESIS_TIME as u64 + 1_000 + (step * 7 + worker * 13) % 90 - 45);
                        let time = service.reserve_issue_time(&tip);
                        assert!(time >= last);
                        last = time;
                    }
                });
            }
        });

        let settled = service.reserve_issue_time(&tip);
        clock.set(GENESIS_TIME as u64);
        assert_eq!(service.reserve_issue_time(&tip), settled);
        assert!(settled >= GENESIS_TIME + 1_000 - 45);
    }

    #[tokio::test]
    async fn test_time_floor_resets_on_new_tip() {
        let clock = Arc::new(ManualClock::new(GENESIS_TIME as u64 + 600));
        let (service, chain) = service(clock.clone());

        service.get_candidate(false).await.unwrap();
        chain.set_tip(H256::repeat_byte(0x22), 101, GENESIS_TIME + 10);
        clock.set(GENESIS_TIME as u64 + 30);

        let candidate = service.get_candidate(false).await.unwrap();
        assert_eq!(candidate.template.time, GENESIS_TIME + 30);
    }

    #[tokio::test]
    async fn test_notify_tip_changed() {
        let clock = Arc::new(ManualClock::new(GENESIS_TIME as u64));
        let (service, _) = service(clock);

        service.get_candidate(false).await.unwrap();
        service.get_candidate(false).await.unwrap();
        assert_eq!(service.leases().open_count(), 2);

        assert_eq!(service.notify_tip_changed(H256::repeat_byte(0x99)), 2);
        assert_eq!(service.leases().open_count(), 0);
    }

    #[test]
    fn test_rejects_invalid_config() {
        let mut config = MiningCandidateConfig::default();
        config.lease.max_leases = 0;
        let result = CandidateService::new(
            config,
            Arc::new(InMemoryMempool::new()),
            Arc::new(InMemoryChainState::new(H256::zero(), 0, 0, REGTEST_POW_LIMIT_BITS)),
            Arc::new(StructuralBlockValidator),
            Arc::new(ManualClock::new(0)),
        );
        assert!(matches!(result, Err(CandidateError::InvalidConfig(_))));
    }
}
