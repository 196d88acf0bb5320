//! # Flutterwave
//!
//! Major-unit provider. Amounts go out and come back in naira (or cedis,
//! shillings) and are converted to minor units at this boundary. The
//! transaction reference is our own `tx_ref`; callbacks are authenticated
//! by the `verif-hash` header matching the configured secret hash.

use crate::config::FlutterwaveConfig;
use crate::http::{self, DEFAULT_TIMEOUT};
use crate::signature::verify_shared_hash;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use stay_core::{
    AmountUnit, BookingError, BookingResult, CallbackEvent, CallbackKind, Currency,
    InitiateRequest, PaymentProviderAdapter, ProviderSession, VerifiedPayment,
};
use tracing::{debug, info, instrument};

const PROVIDER: &str = "flutterwave";

/// Flutterwave v3 standard checkout adapter
pub struct FlutterwaveAdapter {
    config: FlutterwaveConfig,
    client: Client,
}

impl FlutterwaveAdapter {
    pub fn new(config: FlutterwaveConfig) -> BookingResult<Self> {
        let client = http::build_client(DEFAULT_TIMEOUT)?;
        Ok(Self { config, client })
    }

    /// Create from environment variables
    pub fn from_env() -> BookingResult<Self> {
        Self::new(FlutterwaveConfig::from_env()?)
    }

    fn unwrap_envelope<T>(envelope: Envelope<T>) -> BookingResult<T> {
        match envelope.data {
            Some(data) if envelope.status == "success" => Ok(data),
            _ => Err(BookingError::ProviderError {
                provider: PROVIDER.to_string(),
                message: envelope.message,
            }),
        }
    }
}

#[async_trait]
impl PaymentProviderAdapter for FlutterwaveAdapter {
    fn provider_name(&self) -> &'static str {
        PROVIDER
    }

    fn amount_unit(&self) -> AmountUnit {
        AmountUnit::Major
    }

    fn signature_header(&self) -> &'static str {
        "verif-hash"
    }

    #[instrument(skip(self, request), fields(tx_ref = %request.idempotency.reference))]
    async fn initiate(&self, request: &InitiateRequest) -> BookingResult<ProviderSession> {
        let tx_ref = &request.idempotency.reference;
        let body = PaymentBody {
            tx_ref,
            amount: self.amount_unit().from_money(&request.amount),
            currency: request.amount.currency.as_str(),
            redirect_url: &self.config.redirect_url,
            customer: Customer {
                email: &request.payer.email,
                name: &request.payer.name,
                phonenumber: request.payer.phone.as_deref(),
            },
            meta: &request.metadata,
        };

        debug!("Creating Flutterwave payment: amount={}", request.amount);

        let url = format!("{}/v3/payments", self.config.api_base_url);
        let response = self
            .client
            .post(&url)
            .header("Authorization", self.config.auth_header())
            .json(&body)
            .send()
            .await
            .map_err(|e| http::send_error(PROVIDER, "payment", e))?;

        let body = http::read_body(PROVIDER, response).await?;
        let envelope: Envelope<PaymentLink> = http::parse(PROVIDER, &body)?;
        let data = Self::unwrap_envelope(envelope)?;

        info!("Created Flutterwave payment: tx_ref={}, url={}", tx_ref, data.link);

        Ok(ProviderSession {
            provider: PROVIDER.to_string(),
            reference: tx_ref.clone(),
            checkout_url: Some(data.link),
            created_at: Utc::now(),
        })
    }

    #[instrument(skip(self))]
    async fn verify(&self, reference: &str) -> BookingResult<VerifiedPayment> {
        let url = format!(
            "{}/v3/transactions/verify_by_reference",
            self.config.api_base_url
        );
        let response = self
            .client
            .get(&url)
            .query(&[("tx_ref", reference)])
            .header("Authorization", self.config.auth_header())
            .send()
            .await
            .map_err(|e| http::send_error(PROVIDER, "verify", e))?;

        let body = http::read_body(PROVIDER, response).await?;
        let envelope: Envelope<TransactionData> = http::parse(PROVIDER, &body)?;
        let data = Self::unwrap_envelope(envelope)?;

        let currency =
            Currency::parse(&data.currency).ok_or_else(|| BookingError::UnsupportedCurrency {
                currency: data.currency.clone(),
            })?;

        debug!(
            "Flutterwave verify {}: status={}, amount={} {}",
            reference, data.status, data.amount, data.currency
        );

        Ok(VerifiedPayment {
            success: data.status == "successful",
            amount: self.amount_unit().to_money(data.amount, currency),
            metadata: http::metadata_strings(data.meta.as_ref()),
            reference: data.tx_ref,
            status: data.status,
            paid_at: data.created_at,
            channel: data.payment_type.unwrap_or_default(),
        })
    }

    #[instrument(skip(self, payload, signature))]
    async fn verify_callback(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> BookingResult<CallbackEvent> {
        verify_shared_hash(&self.config.webhook_hash, signature)?;

        let event: FlutterwaveEvent = serde_json::from_slice(payload).map_err(|e| {
            BookingError::CallbackParseError(format!("Failed to parse callback: {}", e))
        })?;

        let status = event.data.get("status").and_then(|v| v.as_str());
        debug!(
            "Verified Flutterwave callback: event={}, status={:?}",
            event.event, status
        );

        let kind = match (event.event.as_str(), status) {
            ("charge.completed", Some("successful")) => CallbackKind::ChargeSucceeded,
            ("charge.completed", _) => CallbackKind::ChargeFailed,
            (other, _) => CallbackKind::Unknown(other.to_string()),
        };

        let reference = event
            .data
            .get("tx_ref")
            .and_then(|v| v.as_str())
            .map(String::from);

        Ok(CallbackEvent {
            provider: PROVIDER.to_string(),
            kind,
            reference,
            raw_data: Some(event.data),
            received_at: Utc::now(),
        })
    }
}

// =============================================================================
// Flutterwave API Types
// =============================================================================

#[derive(Debug, Serialize)]
struct PaymentBody<'a> {
    tx_ref: &'a str,
    amount: f64,
    currency: &'a str,
    redirect_url: &'a str,
    customer: Customer<'a>,
    meta: &'a HashMap<String, String>,
}

#[derive(Debug, Serialize)]
struct Customer<'a> {
    email: &'a str,
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    phonenumber: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    status: String,
    #[serde(default)]
    message: String,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct PaymentLink {
    link: String,
}

#[derive(Debug, Deserialize)]
struct TransactionData {
    tx_ref: String,
    status: String,
    amount: f64,
    currency: String,
    #[serde(default)]
    payment_type: Option<String>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    meta: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct FlutterwaveEvent {
    event: String,
    #[serde(default)]
    data: serde_json::Value,
}
