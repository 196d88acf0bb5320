//! # Idempotent Ledger Writer
//!
//! Commits a verified booking at most once per provider reference. The
//! storage layer's uniqueness constraint is what makes this hold under
//! concurrent callers; a violation is reported back as "already committed".
//!
//! A small in-process cache of recently committed references lets repeated
//! commits return early without touching storage. It is an optimization only:
//! a cold cache (restart, another instance) falls through to the constraint.

use crate::booking::{BookingPayload, BookingRecord};
use crate::error::{BookingError, BookingResult};
use crate::store::SharedBookingStore;
use serde::Serialize;
use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;
use tracing::{info, instrument, warn};

const RECENT_CAPACITY: usize = 1024;

/// Outcome of a commit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CommitOutcome {
    /// True only for the call that performed the write
    pub created: bool,
}

#[derive(Default)]
struct RecentReferences {
    order: VecDeque<String>,
    set: HashSet<String>,
}

impl RecentReferences {
    fn contains(&self, reference: &str) -> bool {
        self.set.contains(reference)
    }

    fn remember(&mut self, reference: &str) {
        if !self.set.insert(reference.to_string()) {
            return;
        }
        self.order.push_back(reference.to_string());
        if self.order.len() > RECENT_CAPACITY {
            if let Some(oldest) = self.order.pop_front() {
                self.set.remove(&oldest);
            }
        }
    }
}

/// Append-only writer over a [`BookingStore`](crate::store::BookingStore)
pub struct LedgerWriter {
    store: SharedBookingStore,
    recent: Mutex<RecentReferences>,
}

impl LedgerWriter {
    pub fn new(store: SharedBookingStore) -> Self {
        Self {
            store,
            recent: Mutex::new(RecentReferences::default()),
        }
    }

    /// Persist `payload` under `provider_reference`, at most once.
    ///
    /// An empty or whitespace-only reference is refused before any write.
    #[instrument(skip(self, payload), fields(resource_id = %payload.resource_id))]
    pub async fn commit(
        &self,
        provider_reference: &str,
        payload: BookingPayload,
    ) -> BookingResult<CommitOutcome> {
        let reference = provider_reference.trim();
        if reference.is_empty() {
            return Err(BookingError::MissingReference);
        }

        if self.seen(reference) {
            info!("Reference {} already committed (cached)", reference);
            return Ok(CommitOutcome { created: false });
        }

        let record = BookingRecord::from_payload(reference, payload);
        match self.store.insert(record).await {
            Ok(()) => {
                self.remember(reference);
                info!("Committed booking {}", reference);
                Ok(CommitOutcome { created: true })
            }
            Err(BookingError::DuplicateReference { .. }) => {
                self.remember(reference);
                warn!("Reference {} already committed", reference);
                Ok(CommitOutcome { created: false })
            }
            Err(e) => Err(e),
        }
    }

    /// The underlying store, for reads
    pub fn store(&self) -> &SharedBookingStore {
        &self.store
    }

    fn seen(&self, reference: &str) -> bool {
        self.recent
            .lock()
            .map(|recent| recent.contains(reference))
            .unwrap_or(false)
    }

    fn remember(&self, reference: &str) {
        if let Ok(mut recent) = self.recent.lock() {
            recent.remember(reference);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interval::StayInterval;
    use crate::money::{Currency, Money};
    use crate::store::{BookingStore, MemoryBookingStore};
    use chrono::Utc;
    use std::sync::Arc;

    fn payload() -> BookingPayload {
        BookingPayload {
            resource_id: "loft".to_string(),
            interval: StayInterval::parse("2025-06-01", "2025-06-03").unwrap(),
            payer_id: "u1".to_string(),
            amount: Money::from_major(40_000, Currency::NGN).unwrap(),
            provider: "paystack".to_string(),
            channel: "card".to_string(),
            paid_at: None,
            verified_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_second_commit_is_not_created() {
        let store = Arc::new(MemoryBookingStore::new());
        let ledger = LedgerWriter::new(store.clone());

        assert!(ledger.commit("T-1", payload()).await.unwrap().created);
        assert!(!ledger.commit("T-1", payload()).await.unwrap().created);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_uniqueness_violation_from_cold_writer() {
        let store = Arc::new(MemoryBookingStore::new());
        let first = LedgerWriter::new(store.clone());
        let second = LedgerWriter::new(store.clone());

        assert!(first.commit("T-1", payload()).await.unwrap().created);
        assert!(!second.commit("T-1", payload()).await.unwrap().created);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_commits_write_once() {
        let store = Arc::new(MemoryBookingStore::new());
        let ledger = Arc::new(LedgerWriter::new(store.clone()));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let ledger = ledger.clone();
            handles.push(tokio::spawn(async move {
                ledger.commit("T-race", payload()).await.unwrap().created
            }));
        }

        let mut created = 0;
        for handle in handles {
            if handle.await.unwrap() {
                created += 1;
            }
        }

        assert_eq!(created, 1);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_empty_reference_refused_without_write() {
        let store = Arc::new(MemoryBookingStore::new());
        let ledger = LedgerWriter::new(store.clone());

        assert!(matches!(
            ledger.commit("", payload()).await,
            Err(BookingError::MissingReference)
        ));
        assert!(matches!(
            ledger.commit("   ", payload()).await,
            Err(BookingError::MissingReference)
        ));
        assert!(store.is_empty().await);
        assert!(store.find("").await.unwrap().is_none());
    }

    #[test]
    fn test_recent_cache_is_bounded() {
        let mut recent = RecentReferences::default();
        for i in 0..(RECENT_CAPACITY + 10) {
            recent.remember(&format!("r{}", i));
        }
        assert_eq!(recent.order.len(), RECENT_CAPACITY);
        assert!(!recent.contains("r0"));
        assert!(recent.contains(&format!("r{}", RECENT_CAPACITY + 9)));
    }
}
