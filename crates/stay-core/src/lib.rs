//! # stay-core
//!
//! Core types and traits for the stay-ledger booking engine.
//!
//! This crate provides:
//! - `StayInterval` and the half-open overlap test
//! - `AvailabilityService` over pluggable resource and booking stores
//! - `PaymentProviderAdapter` trait for implementing payment providers
//! - `BookingOrchestrator` driving a `PaymentAttempt` through its states
//! - `LedgerWriter` committing each provider reference at most once
//! - `BookingError` for typed error handling
//!
//! ## Example
//!
//! ```rust,ignore
//! use stay_core::{BookingOrchestrator, BookingRequest, StayInterval};
//!
//! let request = BookingRequest {
//!     resource_id: "lekki-loft".into(),
//!     interval: StayInterval::parse("2025-06-01", "2025-06-03")?,
//!     payer_id: Some("u-17".into()),
//!     provider: "paystack".into(),
//! };
//!
//! // Re-check availability and start a provider session
//! let mut attempt = orchestrator.begin(request).await?;
//!
//! // Send the payer to attempt.session.checkout_url, then
//! orchestrator.receive_result(&mut attempt, client_result)?;
//! orchestrator.confirm(&mut attempt).await?;
//! ```

pub mod attempt;
pub mod availability;
pub mod booking;
pub mod error;
pub mod interval;
pub mod ledger;
pub mod money;
pub mod orchestrator;
pub mod profile;
pub mod provider;
pub mod resource;
pub mod store;

// Re-exports for convenience
pub use attempt::{
    AttemptEvent, BookingMetadata, BookingState, IdleExit, PaymentAttempt, RejectReason,
};
pub use availability::{Availability, AvailabilityService, UnavailableReason};
pub use booking::{BookingPayload, BookingRecord, Conflict, RefundStatus};
pub use error::{BookingError, BookingResult};
pub use interval::{overlaps, StayInterval};
pub use ledger::{CommitOutcome, LedgerWriter};
pub use money::{AmountUnit, Currency, Money};
pub use orchestrator::{
    BookingOrchestrator, BookingRequest, ClientResultSource, OrchestratorConfig,
};
pub use profile::{PayerContact, PayerProfile, PayerProfileProvider, ProfileDirectory};
pub use provider::{
    CallbackEvent, CallbackKind, ClientResult, IdempotencyContext, InitiateRequest,
    PaymentProviderAdapter, ProviderRegistry, ProviderSession, SharedProvider, VerifiedPayment,
};
pub use resource::{Resource, ResourceCatalog};
pub use store::{
    BookingStore, MemoryBookingStore, ResourceStore, SharedBookingStore, SharedResourceStore,
};
