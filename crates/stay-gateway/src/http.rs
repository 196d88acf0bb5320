//! Shared HTTP plumbing for provider API clients.

use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use stay_core::{BookingError, BookingResult};
use tracing::error;

/// Default per-request timeout for provider calls
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub(crate) fn build_client(timeout: Duration) -> BookingResult<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| BookingError::Configuration(format!("Failed to create HTTP client: {}", e)))
}

pub(crate) fn send_error(provider: &str, operation: &str, e: reqwest::Error) -> BookingError {
    if e.is_timeout() {
        BookingError::Timeout {
            operation: format!("{} {}", provider, operation),
            after_secs: DEFAULT_TIMEOUT.as_secs(),
        }
    } else {
        BookingError::NetworkError(e.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    message: Option<String>,
}

/// Read a response body, mapping non-2xx statuses to typed errors.
///
/// 429 becomes `RateLimited`, other 4xx `InvalidRequest`, 5xx `ProviderError`.
pub(crate) async fn read_body(provider: &str, response: Response) -> BookingResult<String> {
    let status = response.status();
    let retry_after = response
        .headers()
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());

    let body = response
        .text()
        .await
        .map_err(|e| BookingError::NetworkError(e.to_string()))?;

    if status.is_success() {
        return Ok(body);
    }

    error!("{} API error: status={}, body={}", provider, status, body);

    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(BookingError::RateLimited {
            provider: provider.to_string(),
            retry_after_secs: retry_after.unwrap_or(1),
        });
    }

    let message = serde_json::from_str::<ErrorEnvelope>(&body)
        .ok()
        .and_then(|e| e.message)
        .unwrap_or_else(|| format!("HTTP {}: {}", status, body));

    if status.is_client_error() {
        Err(BookingError::InvalidRequest(format!("{}: {}", provider, message)))
    } else {
        Err(BookingError::ProviderError {
            provider: provider.to_string(),
            message,
        })
    }
}

pub(crate) fn parse<T: DeserializeOwned>(provider: &str, body: &str) -> BookingResult<T> {
    serde_json::from_str(body).map_err(|e| {
        BookingError::Serialization(format!("Failed to parse {} response: {}", provider, e))
    })
}

/// Flatten a provider metadata object to string pairs.
///
/// Scalars are stringified; nested values and nulls are dropped. Providers
/// may also send an empty string where no metadata was attached.
pub(crate) fn metadata_strings(value: Option<&serde_json::Value>) -> HashMap<String, String> {
    value
        .and_then(|m| m.as_object())
        .map(|m| {
            m.iter()
                .filter_map(|(k, v)| {
                    let s = match v {
                        serde_json::Value::String(s) => s.clone(),
                        serde_json::Value::Number(n) => n.to_string(),
                        serde_json::Value::Bool(b) => b.to_string(),
                        _ => return None,
                    };
                    Some((k.clone(), s))
                })
                .collect()
        })
        .unwrap_or_default()
}
