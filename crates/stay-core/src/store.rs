//! # Storage Ports
//!
//! Boundary contracts for the resource store (read-only) and the booking
//! ledger (read candidates, append records). The booking store MUST enforce
//! uniqueness of `provider_reference` itself and report a violation as
//! [`BookingError::DuplicateReference`]; the ledger writer relies on that
//! and nothing else.

use crate::booking::{BookingRecord, RefundStatus};
use crate::error::{BookingError, BookingResult};
use crate::interval::StayInterval;
use crate::resource::Resource;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Read-only access to resources owned by listing management
#[async_trait]
pub trait ResourceStore: Send + Sync {
    async fn get(&self, resource_id: &str) -> BookingResult<Option<Resource>>;
}

/// The booking ledger
#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Confirmed bookings for `resource_id` that may overlap `interval`.
    ///
    /// A coarse pre-filter is allowed; callers re-run the exact overlap test.
    async fn candidates(
        &self,
        resource_id: &str,
        interval: &StayInterval,
    ) -> BookingResult<Vec<BookingRecord>>;

    /// Append a record. Fails with `DuplicateReference` when the provider
    /// reference already exists, without modifying the stored record.
    async fn insert(&self, record: BookingRecord) -> BookingResult<()>;

    /// Look up a record by provider reference
    async fn find(&self, provider_reference: &str) -> BookingResult<Option<BookingRecord>>;

    /// Set the refund annotation. Returns false if the reference is unknown.
    async fn annotate_refund(
        &self,
        provider_reference: &str,
        status: RefundStatus,
    ) -> BookingResult<bool>;
}

pub type SharedBookingStore = Arc<dyn BookingStore>;
pub type SharedResourceStore = Arc<dyn ResourceStore>;

/// In-memory ledger keyed by provider reference
#[derive(Debug, Default)]
pub struct MemoryBookingStore {
    records: RwLock<HashMap<String, BookingRecord>>,
}

impl MemoryBookingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl BookingStore for MemoryBookingStore {
    async fn candidates(
        &self,
        resource_id: &str,
        interval: &StayInterval,
    ) -> BookingResult<Vec<BookingRecord>> {
        let records = self.records.read().await;
        // coarse: same resource, starts before the proposed checkout
        Ok(records
            .values()
            .filter(|r| r.resource_id == resource_id && r.interval.start() < interval.end())
            .cloned()
            .collect())
    }

    async fn insert(&self, record: BookingRecord) -> BookingResult<()> {
        let mut records = self.records.write().await;
        if records.contains_key(&record.provider_reference) {
            return Err(BookingError::DuplicateReference {
                reference: record.provider_reference,
            });
        }
        records.insert(record.provider_reference.clone(), record);
        Ok(())
    }

    async fn find(&self, provider_reference: &str) -> BookingResult<Option<BookingRecord>> {
        Ok(self.records.read().await.get(provider_reference).cloned())
    }

    async fn annotate_refund(
        &self,
        provider_reference: &str,
        status: RefundStatus,
    ) -> BookingResult<bool> {
        let mut records = self.records.write().await;
        match records.get_mut(provider_reference) {
            Some(record) => {
                record.refund_status = Some(status);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::booking::BookingPayload;
    use crate::money::{Currency, Money};
    use chrono::Utc;

    fn record(reference: &str, start: &str, end: &str) -> BookingRecord {
        BookingRecord::from_payload(
            reference,
            BookingPayload {
                resource_id: "loft".to_string(),
                interval: StayInterval::parse(start, end).unwrap(),
                payer_id: "u1".to_string(),
                amount: Money::from_major(100, Currency::NGN).unwrap(),
                provider: "paystack".to_string(),
                channel: "card".to_string(),
                paid_at: None,
                verified_at: Utc::now(),
            },
        )
    }

    #[tokio::test]
    async fn test_insert_rejects_duplicate_reference() {
        let store = MemoryBookingStore::new();
        store.insert(record("ref-1", "2025-06-01", "2025-06-03")).await.unwrap();

        let err = store
            .insert(record("ref-1", "2025-07-01", "2025-07-03"))
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::DuplicateReference { .. }));

        let kept = store.find("ref-1").await.unwrap().unwrap();
        assert_eq!(kept.interval.start().to_string(), "2025-06-01");
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_refund_annotation() {
        let store = MemoryBookingStore::new();
        store.insert(record("ref-1", "2025-06-01", "2025-06-03")).await.unwrap();

        assert!(store.annotate_refund("ref-1", RefundStatus::Processed).await.unwrap());
        assert!(!store.annotate_refund("ref-2", RefundStatus::Processed).await.unwrap());
        assert_eq!(
            store.find("ref-1").await.unwrap().unwrap().refund_status,
            Some(RefundStatus::Processed)
        );
    }
}
