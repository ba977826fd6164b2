//! Metrics collection for the mining candidate subsystem

use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics collector for candidate issue and solution acceptance
#[derive(Debug, Default)]
pub struct Metrics {
    /// Candidates issued
    pub candidates_issued: AtomicU64,

    /// Candidates refused by the pre-issue template test
    pub templates_rejected: AtomicU64,

    /// Well-formed submissions received
    pub submissions: AtomicU64,

    /// Blocks committed as the new tip
    pub blocks_accepted: AtomicU64,

    /// Submissions whose hash missed the target
    pub high_hash: AtomicU64,

    /// Submissions against a superseded tip
    pub stale_submissions: AtomicU64,

    /// Submissions rejected by block validation
    pub validation_failures: AtomicU64,

    /// Validator calls that ran past the timeout
    pub validation_timeouts: AtomicU64,

    /// Leases removed by garbage collection
    pub leases_evicted: AtomicU64,
}

impl Metrics {
    /// Create new metrics collector
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an issued candidate
    pub fn record_issued(&self) {
        self.candidates_issued.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a template refused before issue
    pub fn record_template_rejected(&self) {
        self.templates_rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a submission and how it ended
    pub fn record_outcome(&self, outcome: &crate::domain::SubmitOutcome) {
        use crate::domain::SubmitOutcome;

        self.submissions.fetch_add(1, Ordering::Relaxed);
        let counter = match outcome {
            SubmitOutcome::Accepted { .. } => &self.blocks_accepted,
            SubmitOutcome::HighHash => &self.high_hash,
            SubmitOutcome::StaleTip => &self.stale_submissions,
            SubmitOutcome::ValidationFailure(_) => &self.validation_failures,
            SubmitOutcome::ValidationTimeout => &self.validation_timeouts,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Record garbage-collected leases
    pub fn record_evicted(&self, count: usize) {
        self.leases_evicted
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    /// Get candidates issued
    pub fn get_candidates_issued(&self) -> u64 {
        self.candidates_issued.load(Ordering::Relaxed)
    }

    /// Get blocks accepted
    pub fn get_blocks_accepted(&self) -> u64 {
        self.blocks_accepted.load(Ordering::Relaxed)
    }

    /// Get stale submissions
    pub fn get_stale_submissions(&self) -> u64 {
        self.stale_submissions.load(Ordering::Relaxed)
    }

    /// Get leases evicted
    pub fn get_leases_evicted(&self) -> u64 {
        self.leases_evicted.load(Ordering::Relaxed)
    }

    /// Fraction of submissions that became blocks
    pub fn get_acceptance_rate(&self) -> f64 {
        let submissions = self.submissions.load(Ordering::Relaxed);
        if submissions == 0 {
            return 0.0;
        }
        self.blocks_accepted.load(Ordering::Relaxed) as f64 / submissions as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SubmitOutcome;
    use primitive_types::H256;

    #[test]
    fn test_outcome_recording() {
        let metrics = Metrics::new();

        metrics.record_outcome(&SubmitOutcome::Accepted {
            block_hash: H256::zero(),
            height: 1,
        });
        metrics.record_outcome(&SubmitOutcome::StaleTip);
        metrics.record_outcome(&SubmitOutcome::HighHash);
        metrics.record_outcome(&SubmitOutcome::StaleTip);

        assert_eq!(metrics.get_blocks_accepted(), 1);
        assert_eq!(metrics.get_stale_submissions(), 2);
        assert_eq!(metrics.get_acceptance_rate(), 0.25);
    }

    #[test]
    fn test_empty_rate() {
        let metrics = Metrics::new();
        metrics.record_issued();
        metrics.record_evicted(3);

        assert_eq!(metrics.get_candidates_issued(), 1);
        assert_eq!(metrics.get_leases_evicted(), 3);
        assert_eq!(metrics.get_acceptance_rate(), 0.0);
    }
}
