//! Lease store: in-memory registry of issued candidates
//!
//! All state lives behind one `RwLock`. `register`, `supersede_all` and
//! `sync_with_chain` take the write side, so a resolver sees either none or
//! all of a tip change.

use super::entities::{Candidate, CandidateId, CandidateTemplate, LeaseRecord, LeaseStatus};
use crate::config::LeaseConfig;
use crate::error::{CandidateError, Result};
use crate::metrics::Metrics;
use crate::ports::ChainStateProvider;
use parking_lot::RwLock;
use primitive_types::H256;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error};

struct LeaseEntry {
    record: LeaseRecord,
    issued_at: Instant,
}

#[derive(Default)]
struct LeaseTable {
    records: HashMap<CandidateId, LeaseEntry>,
    /// Issue order, oldest first; may hold ids already removed
    order: VecDeque<CandidateId>,
    /// Last tip announced through `supersede_all` or `sync_with_chain`
    current_tip: Option<H256>,
}

/// Registry of outstanding candidates keyed by id
pub struct LeaseStore {
    table: RwLock<LeaseTable>,
    max_age: Duration,
    max_leases: usize,
    metrics: Arc<Metrics>,
}

impl LeaseStore {
    /// Create an empty store with the given garbage-collection horizon
    pub fn new(config: &LeaseConfig, metrics: Arc<Metrics>) -> Self {
        Self {
            table: RwLock::new(LeaseTable::default()),
            max_age: config.max_age(),
            max_leases: config.max_leases.max(1),
            metrics,
        }
    }

    /// Register a template under a fresh id
    ///
    /// A template whose parent is no longer the current tip is stored
    /// `Superseded` straight away.
    pub fn register(&self, template: CandidateTemplate) -> Arc<Candidate> {
        self.register_at(template, Instant::now())
    }

    fn register_at(&self, template: CandidateTemplate, now: Instant) -> Arc<Candidate> {
        let mut table = self.table.write();

        let mut id = CandidateId::new_random();
        while table.records.contains_key(&id) {
            debug!("[qc-17] Candidate id collision, regenerating");
            id = CandidateId::new_random();
        }

        let issued_tip = template.prev_hash;
        let status = match table.current_tip {
            Some(tip) if tip != issued_tip => LeaseStatus::Superseded,
            _ => LeaseStatus::Open,
        };
        let candidate = Arc::new(Candidate { id, template });

        table.records.insert(
            id,
            LeaseEntry {
                record: LeaseRecord {
                    candidate: Arc::clone(&candidate),
                    issued_tip,
                    status,
                },
                issued_at: now,
            },
        );
        table.order.push_back(id);

        let evicted = self.evict(&mut table, now);
        drop(table);
        if evicted > 0 {
            self.metrics.record_evicted(evicted);
        }

        candidate
    }

    /// Look up a lease by id, returning a copy of its record
    pub fn resolve(&self, id: &CandidateId) -> Result<LeaseRecord> {
        let table = self.table.read();
        let entry = table
            .records
            .get(id)
            .ok_or(CandidateError::UnknownCandidate)?;

        if entry.record.candidate.id != *id {
            error!(
                "[qc-17] Lease table corrupted: key {} holds candidate {}",
                id, entry.record.candidate.id
            );
            return Err(CandidateError::Internal(format!(
                "lease {id} holds a different candidate"
            )));
        }

        Ok(entry.record.clone())
    }

    /// Make `new_tip` the current tip and reclassify every lease against it
    ///
    /// Leases not built on `new_tip` become superseded; leases built on it
    /// are open again. Returns the number of leases newly superseded.
    pub fn supersede_all(&self, new_tip: H256) -> usize {
        let mut table = self.table.write();
        Self::apply_tip(&mut table, new_tip)
    }

    /// Read the tip from `chain` and apply it, under the write lock
    ///
    /// Concurrent commits can finish in any order; reading the tip inside
    /// the lock means the last announcement always carries the newest tip.
    pub fn sync_with_chain(&self, chain: &dyn ChainStateProvider) -> Result<usize> {
        let mut table = self.table.write();
        let tip = chain.tip()?;
        Ok(Self::apply_tip(&mut table, tip.hash))
    }

    fn apply_tip(table: &mut LeaseTable, new_tip: H256) -> usize {
        table.current_tip = Some(new_tip);

        let mut superseded = 0;
        for entry in table.records.values_mut() {
            let status = if entry.record.issued_tip == new_tip {
                LeaseStatus::Open
            } else {
                LeaseStatus::Superseded
            };
            if status == LeaseStatus::Superseded && entry.record.status == LeaseStatus::Open {
                superseded += 1;
            }
            entry.record.status = status;
        }
        debug!(
            "[qc-17] Tip now {:?}, superseded {} leases",
            new_tip, superseded
        );
        superseded
    }

    /// Evict leases beyond the age or count horizon
    pub fn collect_garbage(&self) -> usize {
        self.collect_garbage_at(Instant::now())
    }

    /// [`collect_garbage`](Self::collect_garbage) with an explicit clock reading
    pub fn collect_garbage_at(&self, now: Instant) -> usize {
        let evicted = {
            let mut table = self.table.write();
            self.evict(&mut table, now)
        };
        if evicted > 0 {
            self.metrics.record_evicted(evicted);
        }
        evicted
    }

    fn evict(&self, table: &mut LeaseTable, now: Instant) -> usize {
        let mut evicted = 0;

        while let Some(oldest) = table.order.front().copied() {
            let expired = match table.records.get(&oldest) {
                None => {
                    // Already removed explicitly.
                    table.order.pop_front();
                    continue;
                }
                Some(entry) => now.saturating_duration_since(entry.issued_at) > self.max_age,
            };
            if !expired && table.records.len() <= self.max_leases {
                break;
            }
            table.order.pop_front();
            table.records.remove(&oldest);
            evicted += 1;
        }

        if evicted > 0 {
            debug!("[qc-17] Evicted {} leases", evicted);
        }
        evicted
    }

    /// Remove a lease explicitly
    pub fn remove(&self, id: &CandidateId) -> bool {
        self.table.write().records.remove(id).is_some()
    }

    /// Number of leases held, of any status
    pub fn len(&self) -> usize {
        self.table.read().records.len()
    }

    /// Check if no leases are held
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of open leases
    pub fn open_count(&self) -> usize {
        self.table
            .read()
            .records
            .values()
            .filter(|e| e.record.status == LeaseStatus::Open)
            .count()
    }

    /// Tip most recently announced to the store
    pub fn current_tip(&self) -> Option<H256> {
        self.table.read().current_tip
    }

    #[cfg(test)]
    fn corrupt_for_test(&self, id: &CandidateId) {
        let mut table = self.table.write();
        if let Some(entry) = table.records.get_mut(id) {
            let mut candidate = (*entry.record.candidate).clone();
            candidate.id = CandidateId::new_random();
            entry.record.candidate = Arc::new(candidate);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn template(prev: u8) -> CandidateTemplate {
        CandidateTemplate {
            prev_hash: H256::repeat_byte(prev),
            height: 1,
            version: 1,
            bits: crate::domain::REGTEST_POW_LIMIT_BITS,
            time: 0,
            median_time_past: 0,
            coinbase_value: 0,
            total_fees: 0,
            merkle_proof: vec![],
            coinbase_template: None,
            transactions: Vec::new().into(),
            transaction_ids: Vec::new().into(),
        }
    }

    fn store(max_age_secs: u64, max_leases: usize) -> LeaseStore {
        LeaseStore::new(
            &LeaseConfig {
                max_age_secs,
                max_leases,
            },
            Arc::new(Metrics::new()),
        )
    }

    #[test]
    fn test_register_and_resolve() {
        let store = store(600, 16);
        let candidate = store.register(template(1));
        let record = store.resolve(&candidate.id).unwrap();

        assert_eq!(record.status, LeaseStatus::Open);
        assert_eq!(record.issued_tip, H256::repeat_byte(1));
        assert_eq!(record.candidate.id, candidate.id);
        assert_eq!(
            store.resolve(&CandidateId::new_random()).unwrap_err(),
            CandidateError::UnknownCandidate
        );
    }

    #[test]
    fn test_ids_unique() {
        let store = store(600, 1024);
        let ids: HashSet<_> = (0..500).map(|_| store.register(template(1)).id).collect();
        assert_eq!(ids.len(), 500);
    }

    #[test]
    fn test_supersede_all() {
        let store = store(600, 16);
        let a = store.register(template(1));
        let b = store.register(template(2));

        assert_eq!(store.supersede_all(H256::repeat_byte(2)), 1);
        assert_eq!(store.resolve(&a.id).unwrap().status, LeaseStatus::Superseded);
        assert_eq!(store.resolve(&b.id).unwrap().status, LeaseStatus::Open);

        // Second announcement of a new tip catches the rest
        assert_eq!(store.supersede_all(H256::repeat_byte(3)), 1);
        assert_eq!(store.open_count(), 0);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_register_against_old_tip_is_superseded() {
        let store = store(600, 16);
        store.supersede_all(H256::repeat_byte(5));

        let late = store.register(template(4));
        assert_eq!(store.resolve(&late.id).unwrap().status, LeaseStatus::Superseded);

        let fresh = store.register(template(5));
        assert_eq!(store.resolve(&fresh.id).unwrap().status, LeaseStatus::Open);
    }

    #[test]
    fn test_lease_reopens_when_its_tip_is_announced() {
        let store = store(600, 16);
        store.supersede_all(H256::repeat_byte(1));

        // Built on the next tip before the store heard about it
        let early = store.register(template(2));
        assert_eq!(store.resolve(&early.id).unwrap().status, LeaseStatus::Superseded);

        assert_eq!(store.supersede_all(H256::repeat_byte(2)), 0);
        assert_eq!(store.resolve(&early.id).unwrap().status, LeaseStatus::Open);
    }

    #[test]
    fn test_sync_with_chain_uses_latest_tip() {
        use crate::adapters::InMemoryChainState;
        use crate::domain::REGTEST_POW_LIMIT_BITS;

        let store = store(600, 16);
        let chain = InMemoryChainState::new(H256::repeat_byte(1), 10, 1_000, REGTEST_POW_LIMIT_BITS);
        let on_first = store.register(template(1));

        // Two commits land before either announces
        chain.set_tip(H256::repeat_byte(2), 11, 1_010);
        chain.set_tip(H256::repeat_byte(3), 12, 1_020);
        let on_latest = store.register(template(3));

        assert_eq!(store.sync_with_chain(&chain).unwrap(), 1);
        // The slower announcement still reads the chain, not its own tip
        store.sync_with_chain(&chain).unwrap();

        assert_eq!(store.current_tip(), Some(H256::repeat_byte(3)));
        assert_eq!(store.resolve(&on_first.id).unwrap().status, LeaseStatus::Superseded);
        assert_eq!(store.resolve(&on_latest.id).unwrap().status, LeaseStatus::Open);
    }

    #[test]
    fn test_count_bounded_eviction() {
        let store = store(600, 3);
        let first = store.register(template(1));
        for _ in 0..3 {
            store.register(template(1));
        }

        assert_eq!(store.len(), 3);
        assert_eq!(
            store.resolve(&first.id).unwrap_err(),
            CandidateError::UnknownCandidate
        );
        assert_eq!(store.metrics.get_leases_evicted(), 1);
    }

    #[test]
    fn test_age_bounded_eviction() {
        let store = store(10, 100);
        let start = Instant::now();
        let old = store.register_at(template(1), start);
        let young = store.register_at(template(1), start + Duration::from_secs(8));

        assert_eq!(store.collect_garbage_at(start + Duration::from_secs(11)), 1);
        assert!(store.resolve(&old.id).is_err());
        assert!(store.resolve(&young.id).is_ok());
    }

    #[test]
    fn test_remove_then_gc_skips_hole() {
        let store = store(10, 100);
        let start = Instant::now();
        let a = store.register_at(template(1), start);
        let b = store.register_at(template(1), start);

        assert!(store.remove(&a.id));
        assert!(!store.remove(&a.id));
        assert_eq!(store.collect_garbage_at(start + Duration::from_secs(60)), 1);
        assert!(store.resolve(&b.id).is_err());
        assert!(store.is_empty());
    }

    #[test]
    fn test_corrupted_record_is_internal_error() {
        let store = store(600, 16);
        let candidate = store.register(template(1));
        store.corrupt_for_test(&candidate.id);

        assert!(matches!(
            store.resolve(&candidate.id),
            Err(CandidateError::Internal(_))
        ));
    }
}
