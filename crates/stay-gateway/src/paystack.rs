//! # Paystack
//!
//! Minor-unit provider. Amounts go out and come back in kobo (or pesewas,
//! cents); callbacks carry an HMAC-SHA512 of the raw body in
//! `x-paystack-signature`, keyed with the secret key.

use crate::config::PaystackConfig;
use crate::http::{self, DEFAULT_TIMEOUT};
use crate::signature::verify_hmac_sha512;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use stay_core::{
    AmountUnit, BookingError, BookingResult, CallbackEvent, CallbackKind, Currency,
    InitiateRequest, PaymentProviderAdapter, ProviderSession, VerifiedPayment,
};
use tracing::{debug, info, instrument};

const PROVIDER: &str = "paystack";

/// Paystack transaction API adapter
pub struct PaystackAdapter {
    config: PaystackConfig,
    client: Client,
}

impl PaystackAdapter {
    pub fn new(config: PaystackConfig) -> BookingResult<Self> {
        let client = http::build_client(DEFAULT_TIMEOUT)?;
        Ok(Self { config, client })
    }

    /// Create from environment variables
    pub fn from_env() -> BookingResult<Self> {
        Self::new(PaystackConfig::from_env()?)
    }

    /// `{base}/transaction/verify/{reference}` with the reference escaped as one segment
    fn verify_url(&self, reference: &str) -> BookingResult<Url> {
        let mut url = Url::parse(&self.config.api_base_url).map_err(|e| {
            BookingError::Configuration(format!("Invalid Paystack API URL: {}", e))
        })?;
        url.path_segments_mut()
            .map_err(|_| {
                BookingError::Configuration("Paystack API URL cannot carry a path".to_string())
            })?
            .pop_if_empty()
            .extend(["transaction", "verify", reference]);
        Ok(url)
    }

    fn unwrap_envelope<T>(envelope: Envelope<T>) -> BookingResult<T> {
        match envelope.data {
            Some(data) if envelope.status => Ok(data),
            _ => Err(BookingError::ProviderError {
                provider: PROVIDER.to_string(),
                message: envelope.message,
            }),
        }
    }
}

#[async_trait]
impl PaymentProviderAdapter for PaystackAdapter {
    fn provider_name(&self) -> &'static str {
        PROVIDER
    }

    fn amount_unit(&self) -> AmountUnit {
        AmountUnit::Minor
    }

    fn signature_header(&self) -> &'static str {
        "x-paystack-signature"
    }

    #[instrument(skip(self, request), fields(reference = %request.idempotency.reference))]
    async fn initiate(&self, request: &InitiateRequest) -> BookingResult<ProviderSession> {
        if request.payer.email.trim().is_empty() {
            return Err(BookingError::InvalidRequest(
                "Paystack requires a payer email".to_string(),
            ));
        }

        let body = InitializeBody {
            email: &request.payer.email,
            amount: self.amount_unit().from_money(&request.amount) as i64,
            currency: request.amount.currency.as_str(),
            reference: &request.idempotency.reference,
            callback_url: self.config.callback_url.as_deref(),
            metadata: &request.metadata,
        };

        debug!("Initializing Paystack transaction: amount={}", request.amount);

        let url = format!("{}/transaction/initialize", self.config.api_base_url);
        let response = self
            .client
            .post(&url)
            .header("Authorization", self.config.auth_header())
            .json(&body)
            .send()
            .await
            .map_err(|e| http::send_error(PROVIDER, "initialize", e))?;

        let body = http::read_body(PROVIDER, response).await?;
        let envelope: Envelope<InitializeData> = http::parse(PROVIDER, &body)?;
        let data = Self::unwrap_envelope(envelope)?;

        info!(
            "Created Paystack transaction: reference={}, url={}",
            data.reference, data.authorization_url
        );

        Ok(ProviderSession {
            provider: PROVIDER.to_string(),
            reference: data.reference,
            checkout_url: Some(data.authorization_url),
            created_at: Utc::now(),
        })
    }

    #[instrument(skip(self))]
    async fn verify(&self, reference: &str) -> BookingResult<VerifiedPayment> {
        let url = self.verify_url(reference)?;
        let response = self
            .client
            .get(url)
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
            "Paystack verify {}: status={}, amount={} {}",
            reference, data.status, data.amount, data.currency
        );

        Ok(VerifiedPayment {
            success: data.status == "success",
            amount: self.amount_unit().to_money(data.amount, currency),
            metadata: http::metadata_strings(data.metadata.as_ref()),
            reference: data.reference,
            status: data.status,
            paid_at: data.paid_at,
            channel: data.channel.unwrap_or_default(),
        })
    }

    #[instrument(skip(self, payload, signature))]
    async fn verify_callback(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> BookingResult<CallbackEvent> {
        verify_hmac_sha512(&self.config.secret_key, payload, signature)?;

        let event: PaystackEvent = serde_json::from_slice(payload).map_err(|e| {
            BookingError::CallbackParseError(format!("Failed to parse callback: {}", e))
        })?;

        debug!("Verified Paystack callback: event={}", event.event);

        let kind = match event.event.as_str() {
            "charge.success" => CallbackKind::ChargeSucceeded,
            "charge.failed" => CallbackKind::ChargeFailed,
            "refund.pending" => CallbackKind::RefundPending,
            "refund.processed" => CallbackKind::RefundProcessed,
            "refund.failed" => CallbackKind::RefundFailed,
            other => CallbackKind::Unknown(other.to_string()),
        };

        // Refund events reference the original charge separately
        let reference = ["transaction_reference", "reference"]
            .iter()
            .find_map(|key| event.data.get(*key).and_then(|v| v.as_str()))
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
// Paystack API Types
// =============================================================================

#[derive(Debug, Serialize)]
struct InitializeBody<'a> {
    email: &'a str,
    amount: i64,
    currency: &'a str,
    reference: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    callback_url: Option<&'a str>,
    metadata: &'a HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    status: bool,
    #[serde(default)]
    message: String,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct InitializeData {
    authorization_url: String,
    reference: String,
}

#[derive(Debug, Deserialize)]
struct TransactionData {
    reference: String,
    status: String,
    amount: f64,
    currency: String,
    #[serde(default)]
    paid_at: Option<DateTime<Utc>>,
    #[serde(default)]
    channel: Option<String>,
    #[serde(default)]
    metadata: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct PaystackEvent {
    event: String,
    #[serde(default)]
    data: serde_json::Value,
}
