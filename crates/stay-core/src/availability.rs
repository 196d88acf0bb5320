//! # Availability Service
//!
//! Answers "can this resource be booked for this stay?" by combining the
//! owner block flag with an exact overlap scan of confirmed bookings.
//!
//! The service is read-only and holds no locks. An `available` answer is a
//! snapshot; the orchestrator re-asks immediately before initiating payment.

use crate::booking::Conflict;
use crate::error::{BookingError, BookingResult};
use crate::interval::{overlaps, StayInterval};
use crate::resource::Resource;
use crate::store::{SharedBookingStore, SharedResourceStore};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// Why a resource cannot be booked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnavailableReason {
    /// Owner switched the listing off
    OwnerBlocked,
    /// Existing bookings overlap the requested stay
    DateConflict,
}

/// Result of an availability check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Availability {
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<UnavailableReason>,
    pub conflicts: Vec<Conflict>,
}

impl Availability {
    fn open() -> Self {
        Self {
            available: true,
            reason: None,
            conflicts: Vec::new(),
        }
    }

    fn owner_blocked() -> Self {
        Self {
            available: false,
            reason: Some(UnavailableReason::OwnerBlocked),
            conflicts: Vec::new(),
        }
    }

    fn from_conflicts(conflicts: Vec<Conflict>) -> Self {
        if conflicts.is_empty() {
            Self::open()
        } else {
            Self {
                available: false,
                reason: Some(UnavailableReason::DateConflict),
                conflicts,
            }
        }
    }
}

/// Availability queries over the resource and booking stores
#[derive(Clone)]
pub struct AvailabilityService {
    resources: SharedResourceStore,
    bookings: SharedBookingStore,
}

impl AvailabilityService {
    pub fn new(resources: SharedResourceStore, bookings: SharedBookingStore) -> Self {
        Self {
            resources,
            bookings,
        }
    }

    /// Fetch a resource, failing if it does not exist
    pub async fn resource(&self, resource_id: &str) -> BookingResult<Resource> {
        self.resources
            .get(resource_id)
            .await?
            .ok_or_else(|| BookingError::ResourceNotFound {
                resource_id: resource_id.to_string(),
            })
    }

    /// Check whether `proposed` can be booked on `resource_id`
    #[instrument(skip(self), fields(interval = %proposed))]
    pub async fn check(
        &self,
        resource_id: &str,
        proposed: &StayInterval,
    ) -> BookingResult<Availability> {
        let resource = self.resource(resource_id).await?;
        self.assess(&resource, proposed).await
    }

    /// Check availability against an already loaded resource
    pub async fn assess(
        &self,
        resource: &Resource,
        proposed: &StayInterval,
    ) -> BookingResult<Availability> {
        if resource.manually_unavailable {
            debug!("Resource {} is owner-blocked", resource.id);
            return Ok(Availability::owner_blocked());
        }

        let candidates = self.bookings.candidates(&resource.id, proposed).await?;

        let conflicts: Vec<Conflict> = candidates
            .iter()
            .filter(|record| overlaps(&record.interval, proposed))
            .map(Conflict::from)
            .collect();

        debug!(
            "Resource {}: {} candidates, {} conflicts",
            resource.id,
            candidates.len(),
            conflicts.len()
        );

        Ok(Availability::from_conflicts(conflicts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::booking::{BookingPayload, BookingRecord, RefundStatus};
    use crate::money::{Currency, Money};
    use crate::resource::ResourceCatalog;
    use crate::store::{BookingStore, MemoryBookingStore};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::Arc;

    fn stay(start: &str, end: &str) -> StayInterval {
        StayInterval::parse(start, end).unwrap()
    }

    async fn service_with(bookings: &[(&str, &str, &str)], blocked: bool) -> AvailabilityService {
        let mut loft = Resource::new("loft", 20_000, Currency::NGN);
        if blocked {
            loft = loft.blocked();
        }
        let catalog = ResourceCatalog::new().with_resource(loft);

        let store = MemoryBookingStore::new();
        for (reference, start, end) in bookings {
            store
                .insert(BookingRecord::from_payload(
                    *reference,
                    BookingPayload {
                        resource_id: "loft".to_string(),
                        interval: stay(start, end),
                        payer_id: "u1".to_string(),
                        amount: Money::from_major(40_000, Currency::NGN).unwrap(),
                        provider: "paystack".to_string(),
                        channel: "card".to_string(),
                        paid_at: None,
                        verified_at: Utc::now(),
                    },
                ))
                .await
                .unwrap();
        }

        AvailabilityService::new(Arc::new(catalog), Arc::new(store))
    }

    #[tokio::test]
    async fn test_back_to_back_booking_is_available() {
        let service = service_with(&[("r1", "2025-06-03", "2025-06-05")], false).await;
        let result = service
            .check("loft", &stay("2025-06-01", "2025-06-03"))
            .await
            .unwrap();

        assert!(result.available);
        assert!(result.conflicts.is_empty());
        assert_eq!(result.reason, None);
    }

    #[tokio::test]
    async fn test_overlap_reports_conflict_interval() {
        let service = service_with(&[("r1", "2025-06-02", "2025-06-04")], false).await;
        let result = service
            .check("loft", &stay("2025-06-01", "2025-06-03"))
            .await
            .unwrap();

        assert!(!result.available);
        assert_eq!(result.reason, Some(UnavailableReason::DateConflict));
        assert_eq!(
            result.conflicts,
            vec![Conflict {
                interval: stay("2025-06-02", "2025-06-04")
            }]
        );
    }

    #[tokio::test]
    async fn test_all_overlapping_records_are_reported() {
        let service = service_with(
            &[
                ("r1", "2025-06-01", "2025-06-02"),
                ("r2", "2025-06-05", "2025-06-07"),
                ("r3", "2025-06-10", "2025-06-12"),
            ],
            false,
        )
        .await;
        let result = service
            .check("loft", &stay("2025-06-01", "2025-06-06"))
            .await
            .unwrap();

        assert_eq!(result.conflicts.len(), 2);
    }

    #[tokio::test]
    async fn test_owner_block_has_distinct_reason_and_no_conflicts() {
        let service = service_with(&[("r1", "2025-06-02", "2025-06-04")], true).await;
        let result = service
            .check("loft", &stay("2025-06-01", "2025-06-03"))
            .await
            .unwrap();

        assert!(!result.available);
        assert_eq!(result.reason, Some(UnavailableReason::OwnerBlocked));
        assert!(result.conflicts.is_empty());
    }

    #[tokio::test]
    async fn test_empty_ledger_is_always_available() {
        let service = service_with(&[], false).await;
        for start in 1..20 {
            for len in 1..10 {
                let from = chrono::NaiveDate::from_ymd_opt(2025, 6, start).unwrap();
                let interval =
                    StayInterval::new(from, from + chrono::Duration::days(len)).unwrap();
                assert!(service.check("loft", &interval).await.unwrap().available);
            }
        }
    }

    #[tokio::test]
    async fn test_unknown_resource() {
        let service = service_with(&[], false).await;
        let err = service
            .check("nope", &stay("2025-06-01", "2025-06-03"))
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::ResourceNotFound { .. }));
    }

    struct FailingStore;

    #[async_trait]
    impl BookingStore for FailingStore {
        async fn candidates(
            &self,
            _resource_id: &str,
            _interval: &StayInterval,
        ) -> BookingResult<Vec<BookingRecord>> {
            Err(BookingError::Storage("connection refused".into()))
        }
        async fn insert(&self, _record: BookingRecord) -> BookingResult<()> {
            unreachable!()
        }
        async fn find(&self, _reference: &str) -> BookingResult<Option<BookingRecord>> {
            Ok(None)
        }
        async fn annotate_refund(&self, _r: &str, _s: RefundStatus) -> BookingResult<bool> {
            Ok(false)
        }
    }

    #[tokio::test]
    async fn test_store_failure_is_not_available() {
        let catalog = ResourceCatalog::new().with_resource(Resource::new("loft", 1, Currency::NGN));
        let service = AvailabilityService::new(Arc::new(catalog), Arc::new(FailingStore));

        let result = service.check("loft", &stay("2025-06-01", "2025-06-03")).await;
        assert!(matches!(result, Err(BookingError::Storage(_))));
    }
}
