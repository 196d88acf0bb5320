//! # Payment Attempts
//!
//! The in-memory state of one booking attempt and its transition table.
//!
//! ```text
//! Idle ─book─▶ Validating ─ok─▶ AvailabilityConfirmed ─▶ PaymentInitiated
//!                  │                                           │
//!                  ▼                                           ▼
//!        Rejected(missing_profile |             PaymentResultReceived ─failed/abandoned─▶ Idle
//!                 owner_blocked | conflict)                    │ success
//!                                                              ▼
//!                                        Verifying ─▶ Committed | VerificationFailed
//! ```
//!
//! An attempt is never persisted; only a `Committed` attempt leaves a trace,
//! as a ledger record.

use crate::booking::Conflict;
use crate::error::{BookingError, BookingResult};
use crate::interval::StayInterval;
use crate::ledger::CommitOutcome;
use crate::money::{Currency, Money};
use crate::provider::{ClientResult, ProviderSession};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Why an attempt was rejected before reaching a provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    MissingProfile,
    OwnerBlocked,
    Conflict,
}

/// Booking attempt states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum BookingState {
    Idle,
    Validating,
    AvailabilityConfirmed,
    PaymentInitiated,
    PaymentResultReceived,
    Verifying,
    Committed,
    Rejected(RejectReason),
    VerificationFailed,
}

impl BookingState {
    pub fn name(&self) -> &'static str {
        match self {
            BookingState::Idle => "idle",
            BookingState::Validating => "validating",
            BookingState::AvailabilityConfirmed => "availability_confirmed",
            BookingState::PaymentInitiated => "payment_initiated",
            BookingState::PaymentResultReceived => "payment_result_received",
            BookingState::Verifying => "verifying",
            BookingState::Committed => "committed",
            BookingState::Rejected(_) => "rejected",
            BookingState::VerificationFailed => "verification_failed",
        }
    }

    /// No further transition without starting a new attempt
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BookingState::Committed | BookingState::Rejected(_) | BookingState::VerificationFailed
        )
    }
}

impl std::fmt::Display for BookingState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Transition triggers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptEvent {
    Book,
    Reject(RejectReason),
    AvailabilityConfirmed,
    /// Transient failure before the provider holds a session
    Abort,
    PaymentInitiated,
    ResultReceived,
    /// Client reported failure or the payer closed the widget
    PaymentNotCompleted,
    StartVerification,
    /// Bounded wait for the client result elapsed
    ResultTimedOut,
    Committed,
    VerificationFailed,
}

impl BookingState {
    /// Apply the transition table
    pub fn next(self, event: AttemptEvent) -> Option<BookingState> {
        use AttemptEvent as E;
        use BookingState as S;

        match (self, event) {
            (S::Idle, E::Book) => Some(S::Validating),
            (S::Validating, E::Reject(reason)) => Some(S::Rejected(reason)),
            (S::Validating, E::AvailabilityConfirmed) => Some(S::AvailabilityConfirmed),
            (S::Validating | S::AvailabilityConfirmed, E::Abort) => Some(S::Idle),
            (S::AvailabilityConfirmed, E::PaymentInitiated) => Some(S::PaymentInitiated),
            (S::PaymentInitiated, E::ResultReceived) => Some(S::PaymentResultReceived),
            (S::PaymentInitiated, E::ResultTimedOut) => Some(S::VerificationFailed),
            (S::PaymentResultReceived, E::PaymentNotCompleted) => Some(S::Idle),
            (S::PaymentResultReceived, E::StartVerification) => Some(S::Verifying),
            (S::Verifying, E::Committed) => Some(S::Committed),
            (S::Verifying, E::VerificationFailed) => Some(S::VerificationFailed),
            _ => None,
        }
    }
}

/// How an attempt most recently left the payment flow for `Idle`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum IdleExit {
    PaymentFailed(String),
    PaymentAbandoned,
    Aborted(String),
}

/// One booking attempt, held in memory only
#[derive(Debug, Clone, Serialize)]
pub struct PaymentAttempt {
    pub id: Uuid,
    pub resource_id: String,
    pub interval: StayInterval,
    pub payer_id: String,
    /// Caller-selected provider
    pub provider: String,
    pub state: BookingState,
    /// Amount requested at initiation, canonical
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<Money>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<ProviderSession>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_result: Option<ClientResult>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub conflicts: Vec<Conflict>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit: Option<IdleExit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit: Option<CommitOutcome>,
    pub created_at: DateTime<Utc>,
}

impl PaymentAttempt {
    pub fn new(
        resource_id: impl Into<String>,
        interval: StayInterval,
        payer_id: impl Into<String>,
        provider: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            resource_id: resource_id.into(),
            interval,
            payer_id: payer_id.into(),
            provider: provider.into(),
            state: BookingState::Idle,
            amount: None,
            session: None,
            client_result: None,
            conflicts: Vec::new(),
            exit: None,
            failure: None,
            commit: None,
            created_at: Utc::now(),
        }
    }

    /// Move to the next state or fail with `InvalidTransition`
    pub fn apply(&mut self, event: AttemptEvent) -> BookingResult<BookingState> {
        let next = self
            .state
            .next(event)
            .ok_or_else(|| BookingError::InvalidTransition {
                from: self.state.to_string(),
                event: format!("{:?}", event),
            })?;
        self.state = next;
        Ok(next)
    }

    /// Provider reference, once a session exists
    pub fn reference(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.reference.as_str())
    }

    /// Machine-readable outcome code
    pub fn reason_code(&self) -> &'static str {
        match self.state {
            BookingState::Committed => "committed",
            BookingState::Rejected(RejectReason::Conflict) => "date_conflict",
            BookingState::Rejected(RejectReason::OwnerBlocked) => "owner_blocked",
            BookingState::Rejected(RejectReason::MissingProfile) => "missing_profile",
            BookingState::VerificationFailed => "verification_failed",
            BookingState::Idle => match self.exit {
                Some(IdleExit::PaymentFailed(_)) | Some(IdleExit::PaymentAbandoned) => {
                    "payment_not_completed"
                }
                Some(IdleExit::Aborted(_)) => "aborted",
                None => "idle",
            },
            _ => "in_progress",
        }
    }

    /// Human-readable message; each failure asks the user for a different action
    pub fn user_message(&self) -> &'static str {
        match self.reason_code() {
            "committed" => "Your booking is confirmed.",
            "date_conflict" => "Those dates are already taken. Please pick different dates.",
            "owner_blocked" => "This place is not accepting bookings right now.",
            "missing_profile" => "Please complete your profile before booking.",
            "verification_failed" => {
                "We could not confirm your payment. Please contact support before paying again."
            }
            "payment_not_completed" => "Payment was not completed. You can try paying again.",
            "aborted" => "Something went wrong on our side. Please try again.",
            _ => "Your booking is in progress.",
        }
    }
}

/// Booking fields round-tripped through provider metadata, so that a
/// provider callback alone is enough to rebuild the ledger payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingMetadata {
    pub attempt_id: Uuid,
    pub resource_id: String,
    pub interval: StayInterval,
    pub payer_id: String,
    /// Amount requested at initiation
    pub amount: Money,
}

impl BookingMetadata {
    pub const ATTEMPT_ID: &'static str = "attempt_id";
    pub const RESOURCE_ID: &'static str = "resource_id";
    pub const START: &'static str = "check_in";
    pub const END: &'static str = "check_out";
    pub const PAYER_ID: &'static str = "payer_id";
    pub const AMOUNT_MINOR: &'static str = "amount_minor";
    pub const CURRENCY: &'static str = "currency";

    pub fn new(attempt: &PaymentAttempt, amount: Money) -> Self {
        Self {
            attempt_id: attempt.id,
            resource_id: attempt.resource_id.clone(),
            interval: attempt.interval,
            payer_id: attempt.payer_id.clone(),
            amount,
        }
    }

    pub fn to_map(&self) -> HashMap<String, String> {
        HashMap::from([
            (Self::ATTEMPT_ID.to_string(), self.attempt_id.to_string()),
            (Self::RESOURCE_ID.to_string(), self.resource_id.clone()),
            (Self::START.to_string(), self.interval.start().to_string()),
            (Self::END.to_string(), self.interval.end().to_string()),
            (Self::PAYER_ID.to_string(), self.payer_id.clone()),
            (
                Self::AMOUNT_MINOR.to_string(),
                self.amount.amount_minor.to_string(),
            ),
            (
                Self::CURRENCY.to_string(),
                self.amount.currency.as_str().to_string(),
            ),
        ])
    }

    pub fn from_map(map: &HashMap<String, String>) -> BookingResult<Self> {
        let field = |key: &str| {
            map.get(key)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| {
                    BookingError::CallbackParseError(format!("missing metadata field {}", key))
                })
        };
        let date = |key: &str| {
            field(key).and_then(|v| {
                NaiveDate::parse_from_str(v, "%Y-%m-%d").map_err(|_| {
                    BookingError::CallbackParseError(format!("bad date in {}: {}", key, v))
                })
            })
        };

        let attempt_id = Uuid::parse_str(field(Self::ATTEMPT_ID)?)
            .map_err(|e| BookingError::CallbackParseError(format!("bad attempt id: {}", e)))?;

        let amount_minor: i64 = field(Self::AMOUNT_MINOR)?
            .parse()
            .map_err(|e| BookingError::CallbackParseError(format!("bad amount: {}", e)))?;
        let currency_code = field(Self::CURRENCY)?;
        let currency =
            Currency::parse(currency_code).ok_or_else(|| BookingError::UnsupportedCurrency {
                currency: currency_code.to_string(),
            })?;

        Ok(Self {
            attempt_id,
            resource_id: field(Self::RESOURCE_ID)?.to_string(),
            interval: StayInterval::new(date(Self::START)?, date(Self::END)?)?,
            payer_id: field(Self::PAYER_ID)?.to_string(),
            amount: Money::from_minor(amount_minor, currency),
        })
    }
}
