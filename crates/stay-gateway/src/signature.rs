//! # Callback Signatures
//!
//! Providers authenticate callbacks differently: Paystack sends an
//! HMAC-SHA512 of the raw body keyed with the secret key, Flutterwave echoes
//! a shared hash configured on the dashboard. Both are compared in constant
//! time.

use hmac::{Hmac, Mac};
use sha2::Sha512;
use stay_core::{BookingError, BookingResult};

type HmacSha512 = Hmac<Sha512>;

/// Hex-encoded HMAC-SHA512 of `payload`
pub fn compute_hmac_sha512(secret: &str, payload: &[u8]) -> BookingResult<String> {
    let mut mac = HmacSha512::new_from_slice(secret.as_bytes())
        .map_err(|e| BookingError::Internal(format!("HMAC key rejected: {}", e)))?;
    mac.update(payload);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

pub fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes()
        .zip(b.bytes())
        .fold(0, |acc, (x, y)| acc | (x ^ y))
        == 0
}

/// Check a Paystack-style body signature
pub fn verify_hmac_sha512(secret: &str, payload: &[u8], signature: &str) -> BookingResult<()> {
    if signature.trim().is_empty() {
        return Err(BookingError::CallbackVerificationFailed(
            "Missing signature".to_string(),
        ));
    }

    let expected = compute_hmac_sha512(secret, payload)?;
    if !constant_time_compare(&signature.trim().to_lowercase(), &expected) {
        return Err(BookingError::CallbackVerificationFailed(
            "Signature mismatch".to_string(),
        ));
    }
    Ok(())
}

/// Check a Flutterwave-style shared hash
pub fn verify_shared_hash(expected: &str, presented: &str) -> BookingResult<()> {
    if presented.is_empty() || !constant_time_compare(presented, expected) {
        return Err(BookingError::CallbackVerificationFailed(
            "Hash mismatch".to_string(),
        ));
    }
    Ok(())
}
