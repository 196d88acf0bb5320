//! # Provider Configuration
//!
//! Configuration for the Paystack and Flutterwave integrations.
//! All secrets are loaded from environment variables.

use stay_core::BookingError;
use std::env;

const PAYSTACK_API_BASE_URL: &str = "https://api.paystack.co";
const FLW_API_BASE_URL: &str = "https://api.flutterwave.com";

/// Paystack API configuration
#[derive(Debug, Clone)]
pub struct PaystackConfig {
    /// Secret API key (sk_test_... or sk_live_...), also the callback HMAC key
    pub secret_key: String,

    /// API base URL (for testing/mocking)
    pub api_base_url: String,

    /// Where Paystack sends the payer after checkout
    pub callback_url: Option<String>,
}

impl PaystackConfig {
    /// Load configuration from environment variables.
    ///
    /// Required env vars:
    /// - `PAYSTACK_SECRET_KEY`
    ///
    /// Optional: `PAYSTACK_API_BASE_URL`, `PAYSTACK_CALLBACK_URL`
    pub fn from_env() -> Result<Self, BookingError> {
        dotenvy::dotenv().ok();

        let secret_key = env::var("PAYSTACK_SECRET_KEY").map_err(|_| {
            BookingError::Configuration("PAYSTACK_SECRET_KEY not set".to_string())
        })?;

        if !secret_key.starts_with("sk_test_") && !secret_key.starts_with("sk_live_") {
            return Err(BookingError::Configuration(
                "PAYSTACK_SECRET_KEY must start with sk_test_ or sk_live_".to_string(),
            ));
        }

        let mut config = Self::new(secret_key);
        if let Ok(url) = env::var("PAYSTACK_API_BASE_URL") {
            config = config.with_api_base_url(url);
        }
        config.callback_url = env::var("PAYSTACK_CALLBACK_URL").ok();
        Ok(config)
    }

    /// Create config with explicit values (for testing)
    pub fn new(secret_key: impl Into<String>) -> Self {
        Self {
            secret_key: secret_key.into(),
            api_base_url: PAYSTACK_API_BASE_URL.to_string(),
            callback_url: None,
        }
    }

    /// Check if using test keys
    pub fn is_test_mode(&self) -> bool {
        self.secret_key.starts_with("sk_test_")
    }

    /// Get authorization header value
    pub fn auth_header(&self) -> String {
        format!("Bearer {}", self.secret_key)
    }

    /// Builder: set custom API base URL (for testing)
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }
}

/// Flutterwave API configuration
#[derive(Debug, Clone)]
pub struct FlutterwaveConfig {
    /// Secret API key (FLWSECK_TEST-... or FLWSECK-...)
    pub secret_key: String,

    /// Shared secret echoed back in the `verif-hash` callback header
    pub webhook_hash: String,

    /// API base URL (for testing/mocking)
    pub api_base_url: String,

    /// Where Flutterwave sends the payer after checkout
    pub redirect_url: String,
}

impl FlutterwaveConfig {
    /// Load configuration from environment variables.
    ///
    /// Required env vars:
    /// - `FLW_SECRET_KEY`
    /// - `FLW_WEBHOOK_HASH`
    ///
    /// Optional: `FLW_API_BASE_URL`, `FLW_REDIRECT_URL`
    pub fn from_env() -> Result<Self, BookingError> {
        dotenvy::dotenv().ok();

        let secret_key = env::var("FLW_SECRET_KEY")
            .map_err(|_| BookingError::Configuration("FLW_SECRET_KEY not set".to_string()))?;

        let webhook_hash = env::var("FLW_WEBHOOK_HASH")
            .map_err(|_| BookingError::Configuration("FLW_WEBHOOK_HASH not set".to_string()))?;

        if !secret_key.starts_with("FLWSECK") {
            return Err(BookingError::Configuration(
                "FLW_SECRET_KEY must start with FLWSECK".to_string(),
            ));
        }

        if webhook_hash.trim().is_empty() {
            return Err(BookingError::Configuration(
                "FLW_WEBHOOK_HASH must not be empty".to_string(),
            ));
        }

        let mut config = Self::new(secret_key, webhook_hash);
        if let Ok(url) = env::var("FLW_API_BASE_URL") {
            config = config.with_api_base_url(url);
        }
        if let Ok(url) = env::var("FLW_REDIRECT_URL") {
            config.redirect_url = url;
        }
        Ok(config)
    }

    /// Create config with explicit values (for testing)
    pub fn new(secret_key: impl Into<String>, webhook_hash: impl Into<String>) -> Self {
        Self {
            secret_key: secret_key.into(),
            webhook_hash: webhook_hash.into(),
            api_base_url: FLW_API_BASE_URL.to_string(),
            redirect_url: "http://localhost:3000/payment/complete".to_string(),
        }
    }

    /// Check if using test keys
    pub fn is_test_mode(&self) -> bool {
        self.secret_key.starts_with("FLWSECK_TEST")
    }

    pub fn auth_header(&self) -> String {
        format!("Bearer {}", self.secret_key)
    }

    /// Builder: set custom API base URL (for testing)
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paystack_modes() {
        let config = PaystackConfig::new("sk_test_abc123");
        assert!(config.is_test_mode());
        assert_eq!(config.auth_header(), "Bearer sk_test_abc123");

        let config = PaystackConfig::new("sk_live_abc123");
        assert!(!config.is_test_mode());
    }

    #[test]
    fn test_flutterwave_modes() {
        let config = FlutterwaveConfig::new("FLWSECK_TEST-abc-X", "hash");
        assert!(config.is_test_mode());
        assert_eq!(config.auth_header(), "Bearer FLWSECK_TEST-abc-X");
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let config = PaystackConfig::new("sk_test_x").with_api_base_url("http://127.0.0.1:9000/");
        assert_eq!(config.api_base_url, "http://127.0.0.1:9000");
    }
}
