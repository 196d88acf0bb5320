//! # Booking Error Types
//!
//! Typed error handling for the stay-ledger booking core.
//! All fallible operations return `Result<T, BookingError>`.
//!
//! Expected business outcomes (dates taken, owner block, payment not
//! completed, verification failure) are *not* errors; they are terminal
//! states of a [`PaymentAttempt`](crate::attempt::PaymentAttempt).

use thiserror::Error;

/// Core error type for all booking operations
#[derive(Debug, Error)]
pub enum BookingError {
    /// Configuration errors (missing keys, invalid config)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Stay interval with zero or negative nights
    #[error("Invalid stay interval: {start} to {end} (end must be after start)")]
    InvalidInterval { start: String, end: String },

    /// Resource not found in the resource store
    #[error("Resource not found: {resource_id}")]
    ResourceNotFound { resource_id: String },

    /// Payer not known to the identity provider
    #[error("Payer not found: {payer_id}")]
    PayerNotFound { payer_id: String },

    /// Caller named a provider that is not registered
    #[error("Unknown payment provider: {provider}")]
    UnknownProvider { provider: String },

    /// Currency not supported
    #[error("Unsupported currency: {currency}")]
    UnsupportedCurrency { currency: String },

    /// Payment provider API error
    #[error("Provider error [{provider}]: {message}")]
    ProviderError { provider: String, message: String },

    /// Network/HTTP error communicating with a provider or data source
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Bounded wait elapsed
    #[error("Timed out after {after_secs}s waiting for {operation}")]
    Timeout { operation: String, after_secs: u64 },

    /// Rate limited by provider
    #[error("Rate limited by {provider}, retry after {retry_after_secs} seconds")]
    RateLimited {
        provider: String,
        retry_after_secs: u64,
    },

    /// Verified amount differs from the amount requested at initiation
    #[error("Amount mismatch for {reference}: expected {expected}, verified {verified}")]
    AmountMismatch {
        reference: String,
        expected: String,
        verified: String,
    },

    /// Provider reports the transaction as not successful
    #[error("Payment not successful for {reference}: status {status}")]
    PaymentNotSuccessful { reference: String, status: String },

    /// Callback for a reference this service never proposed to the provider
    #[error("Reference not issued for a booking attempt: {reference}")]
    UnrecognizedReference { reference: String },

    /// Paid stay can no longer be committed (owner block or overlap)
    #[error("Stay for {reference} on {resource_id} is no longer available")]
    StayUnavailable {
        reference: String,
        resource_id: String,
    },

    /// Ledger commit without a usable idempotency key
    #[error("Missing provider reference")]
    MissingReference,

    /// Storage-level uniqueness violation on the provider reference
    #[error("Provider reference already committed: {reference}")]
    DuplicateReference { reference: String },

    /// Transition not allowed from the attempt's current state
    #[error("Invalid transition from {from} on {event}")]
    InvalidTransition { from: String, event: String },

    /// Pending attempt not found (expired, or never started)
    #[error("Attempt not found or expired: {reference}")]
    AttemptNotFound { reference: String },

    /// Callback signature verification failed
    #[error("Callback verification failed: {0}")]
    CallbackVerificationFailed(String),

    /// Callback payload parsing error
    #[error("Callback parse error: {0}")]
    CallbackParseError(String),

    /// Upstream data source failure (resource store, booking store)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Internal error (should not happen)
    #[error("Internal error: {0}")]
    Internal(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl BookingError {
    /// Returns true if this error is transient and the operation may be repeated
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BookingError::NetworkError(_)
                | BookingError::Timeout { .. }
                | BookingError::RateLimited { .. }
                | BookingError::ProviderError { .. }
        )
    }

    /// Returns true if a provider callback that failed with this error should
    /// be delivered again. Everything else is permanent for that callback.
    pub fn is_redeliverable(&self) -> bool {
        self.is_retryable() || matches!(self, BookingError::Storage(_))
    }

    /// Returns the HTTP status code appropriate for this error
    pub fn status_code(&self) -> u16 {
        match self {
            BookingError::Configuration(_) => 500,
            BookingError::InvalidRequest(_) => 400,
            BookingError::InvalidInterval { .. } => 400,
            BookingError::ResourceNotFound { .. } => 404,
            BookingError::PayerNotFound { .. } => 404,
            BookingError::UnknownProvider { .. } => 400,
            BookingError::UnsupportedCurrency { .. } => 400,
            BookingError::ProviderError { .. } => 502,
            BookingError::NetworkError(_) => 503,
            BookingError::Timeout { .. } => 504,
            BookingError::RateLimited { .. } => 429,
            BookingError::AmountMismatch { .. } => 402,
            BookingError::PaymentNotSuccessful { .. } => 402,
            BookingError::UnrecognizedReference { .. } => 400,
            BookingError::StayUnavailable { .. } => 409,
            BookingError::MissingReference => 400,
            BookingError::DuplicateReference { .. } => 409,
            BookingError::InvalidTransition { .. } => 409,
            BookingError::AttemptNotFound { .. } => 404,
            BookingError::CallbackVerificationFailed(_) => 401,
            BookingError::CallbackParseError(_) => 400,
            BookingError::Storage(_) => 503,
            BookingError::Internal(_) => 500,
            BookingError::Serialization(_) => 500,
        }
    }
}

/// Result type alias for booking operations
pub type BookingResult<T> = Result<T, BookingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(BookingError::NetworkError("timeout".into()).is_retryable());
        assert!(BookingError::Timeout {
            operation: "verify".into(),
            after_secs: 15
        }
        .is_retryable());
        assert!(!BookingError::InvalidRequest("bad data".into()).is_retryable());
        assert!(!BookingError::AmountMismatch {
            reference: "ref".into(),
            expected: "NGN 100.00".into(),
            verified: "NGN 10.00".into(),
        }
        .is_retryable());
        assert!(!BookingError::Storage("connection reset".into()).is_retryable());
    }

    #[test]
    fn test_redeliverable_callback_errors() {
        assert!(BookingError::Storage("connection reset".into()).is_redeliverable());
        assert!(BookingError::ProviderError {
            provider: "paystack".into(),
            message: "502".into(),
        }
        .is_redeliverable());
        assert!(!BookingError::PaymentNotSuccessful {
            reference: "ref".into(),
            status: "abandoned".into(),
        }
        .is_redeliverable());
        assert!(!BookingError::UnrecognizedReference {
            reference: "ref".into()
        }
        .is_redeliverable());
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(BookingError::InvalidRequest("test".into()).status_code(), 400);
        assert_eq!(
            BookingError::ResourceNotFound {
                resource_id: "x".into()
            }
            .status_code(),
            404
        );
        assert_eq!(BookingError::MissingReference.status_code(), 400);
        assert_eq!(
            BookingError::CallbackVerificationFailed("bad sig".into()).status_code(),
            401
        );
    }
}
