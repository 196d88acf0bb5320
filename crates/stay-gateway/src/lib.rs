//! # stay-gateway
//!
//! Payment provider adapters for stay-ledger-rs.
//!
//! Two providers with opposite amount conventions:
//!
//! 1. **PaystackAdapter** - minor units (kobo)
//!    - HMAC-SHA512 callback signatures
//!    - Refund callbacks
//!
//! 2. **FlutterwaveAdapter** - major units (naira)
//!    - Shared-hash callback authentication
//!    - Verification by our own `tx_ref`
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use stay_gateway::registry_from_env;
//!
//! // Registers every provider whose configuration is present
//! let providers = registry_from_env();
//! let paystack = providers.get("paystack")?;
//! let session = paystack.initiate(&request).await?;
//!
//! // Redirect the payer to session.checkout_url
//! ```

pub mod config;
pub mod flutterwave;
mod http;
pub mod paystack;
pub mod signature;

// Re-exports
pub use config::{FlutterwaveConfig, PaystackConfig};
pub use flutterwave::FlutterwaveAdapter;
pub use paystack::PaystackAdapter;

use std::sync::Arc;
use stay_core::ProviderRegistry;
use tracing::{info, warn};

/// Build a registry from the environment.
///
/// A provider is registered only if its configuration loads; the others are
/// skipped with a warning. The caller decides whether an empty registry is
/// fatal.
pub fn registry_from_env() -> ProviderRegistry {
    let mut registry = ProviderRegistry::new();

    match PaystackAdapter::from_env() {
        Ok(adapter) => {
            info!("Paystack provider enabled");
            registry.register(Arc::new(adapter));
        }
        Err(e) => warn!("Paystack provider disabled: {}", e),
    }

    match FlutterwaveAdapter::from_env() {
        Ok(adapter) => {
            info!("Flutterwave provider enabled");
            registry.register(Arc::new(adapter));
        }
        Err(e) => warn!("Flutterwave provider disabled: {}", e),
    }

    registry
}
