//! # Booking Records
//!
//! The append-only ledger entry written after a payment is verified, and the
//! read-only conflict projection returned to callers.

use crate::interval::StayInterval;
use crate::money::Money;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Refund state recorded against a committed booking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefundStatus {
    Pending,
    Processed,
    Failed,
}

impl RefundStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefundStatus::Pending => "pending",
            RefundStatus::Processed => "processed",
            RefundStatus::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(RefundStatus::Pending),
            "processed" => Some(RefundStatus::Processed),
            "failed" => Some(RefundStatus::Failed),
            _ => None,
        }
    }
}

/// Everything the ledger needs besides the idempotency key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingPayload {
    pub resource_id: String,
    pub interval: StayInterval,
    pub payer_id: String,
    /// Verified amount, canonical minor units
    pub amount: Money,
    /// Provider name (e.g., "paystack")
    pub provider: String,
    /// Payment channel reported by the provider (card, bank_transfer, ...)
    pub channel: String,
    /// When the provider says the money moved
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<DateTime<Utc>>,
    /// When our server-side verification succeeded
    pub verified_at: DateTime<Utc>,
}

/// A confirmed booking. Immutable once written, apart from `refund_status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingRecord {
    /// Provider-issued reference; unique across the ledger
    pub provider_reference: String,
    pub resource_id: String,
    pub interval: StayInterval,
    pub payer_id: String,
    pub amount: Money,
    pub provider: String,
    pub channel: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<DateTime<Utc>>,
    pub verified_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refund_status: Option<RefundStatus>,
}

impl BookingRecord {
    pub fn from_payload(provider_reference: impl Into<String>, payload: BookingPayload) -> Self {
        Self {
            provider_reference: provider_reference.into(),
            resource_id: payload.resource_id,
            interval: payload.interval,
            payer_id: payload.payer_id,
            amount: payload.amount,
            provider: payload.provider,
            channel: payload.channel,
            paid_at: payload.paid_at,
            verified_at: payload.verified_at,
            refund_status: None,
        }
    }
}

/// Why a proposed stay was rejected: the interval of an existing booking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflict {
    #[serde(flatten)]
    pub interval: StayInterval,
}

impl From<&BookingRecord> for Conflict {
    fn from(record: &BookingRecord) -> Self {
        Self {
            interval: record.interval,
        }
    }
}
