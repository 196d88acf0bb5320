//! # Payment Provider Adapter
//!
//! Strategy trait over concrete payment providers. Each provider normalizes
//! its own wire format (amount units, status strings, callback signatures)
//! so the orchestrator never branches on provider identity.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                PaymentProviderAdapter (trait)               │
//! │  ├── initiate()          start a provider session           │
//! │  ├── verify()            server-side lookup by reference    │
//! │  ├── confirm()           verify + amount/status comparison  │
//! │  └── verify_callback()   authenticate a provider callback   │
//! └─────────────────────────────────────────────────────────────┘
//!                            ▲
//!                 ┌──────────┴──────────┐
//!          ┌──────┴──────┐       ┌──────┴──────┐
//!          │  Paystack   │       │ Flutterwave │
//!          │ minor units │       │ major units │
//!          └─────────────┘       └─────────────┘
//! ```

use crate::error::{BookingError, BookingResult};
use crate::money::{AmountUnit, Money};
use crate::profile::PayerContact;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Identifies one payment attempt towards the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdempotencyContext {
    /// Our attempt id
    pub attempt_id: Uuid,
    /// Reference we propose to the provider; providers may issue their own
    pub reference: String,
}

impl IdempotencyContext {
    pub fn for_attempt(attempt_id: Uuid) -> Self {
        Self {
            attempt_id,
            reference: format!("stay_{}", attempt_id.simple()),
        }
    }
}

/// Everything a provider needs to start collecting funds
#[derive(Debug, Clone)]
pub struct InitiateRequest {
    pub amount: Money,
    pub payer: PayerContact,
    pub idempotency: IdempotencyContext,
    /// Round-tripped by the provider and returned from `verify`
    pub metadata: HashMap<String, String>,
}

/// A started provider session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderSession {
    /// Provider name
    pub provider: String,
    /// Authoritative provider reference (verification and ledger key)
    pub reference: String,
    /// Where the payer completes payment, if the provider is redirect-based
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkout_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Terminal client-side result reported by the provider widget.
///
/// Never proof of payment on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ClientResult {
    Success { reference: String },
    Failed { reason: String },
    /// Payer closed the widget
    Abandoned,
}

/// Server-side view of a transaction, canonicalized
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifiedPayment {
    pub reference: String,
    pub success: bool,
    /// Provider's raw status string
    pub status: String,
    /// Re-derived paid amount in minor units
    pub amount: Money,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<DateTime<Utc>>,
    pub channel: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// Kinds of provider callbacks we act on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallbackKind {
    ChargeSucceeded,
    ChargeFailed,
    RefundPending,
    RefundProcessed,
    RefundFailed,
    Unknown(String),
}

/// An authenticated provider callback
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallbackEvent {
    pub provider: String,
    pub kind: CallbackKind,
    /// Provider reference of the transaction the event is about
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_data: Option<serde_json::Value>,
    pub received_at: DateTime<Utc>,
}

/// Core trait for payment provider implementations.
#[async_trait]
pub trait PaymentProviderAdapter: Send + Sync {
    /// Provider name (for logging, routing and the ledger)
    fn provider_name(&self) -> &'static str;

    /// Unit convention of this provider's wire amounts
    fn amount_unit(&self) -> AmountUnit;

    /// Request header carrying the callback signature
    fn signature_header(&self) -> &'static str;

    /// Start a payment session for `request.amount`
    async fn initiate(&self, request: &InitiateRequest) -> BookingResult<ProviderSession>;

    /// Look up a transaction by provider reference.
    ///
    /// Must be idempotent: calling it repeatedly has no provider-side effect.
    async fn verify(&self, reference: &str) -> BookingResult<VerifiedPayment>;

    /// Authenticate and parse a provider callback
    async fn verify_callback(&self, payload: &[u8], signature: &str)
        -> BookingResult<CallbackEvent>;

    /// Verify and compare against the amount requested at initiation.
    ///
    /// A non-success status or any amount/currency difference is an error.
    async fn confirm(&self, reference: &str, expected: &Money) -> BookingResult<VerifiedPayment> {
        let verified = self.verify(reference).await?;

        if !verified.success {
            return Err(BookingError::PaymentNotSuccessful {
                reference: reference.to_string(),
                status: verified.status,
            });
        }

        if verified.amount != *expected {
            return Err(BookingError::AmountMismatch {
                reference: reference.to_string(),
                expected: expected.to_string(),
                verified: verified.amount.to_string(),
            });
        }

        Ok(verified)
    }
}

/// Type alias for a shared provider (dynamic dispatch)
pub type SharedProvider = Arc<dyn PaymentProviderAdapter>;

/// Registered providers, keyed by name.
///
/// Selection is always explicit; there is no default and no failover.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, SharedProvider>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider
    pub fn register(&mut self, provider: SharedProvider) {
        let name = provider.provider_name().to_string();
        self.providers.insert(name, provider);
    }

    /// Register with builder pattern
    pub fn with_provider(mut self, provider: SharedProvider) -> Self {
        self.register(provider);
        self
    }

    /// Get a provider by name
    pub fn get(&self, provider: &str) -> BookingResult<&SharedProvider> {
        self.providers
            .get(provider)
            .ok_or_else(|| BookingError::UnknownProvider {
                provider: provider.to_string(),
            })
    }

    /// List all registered providers, sorted
    pub fn providers(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.providers.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}
