//! # Payer Profiles
//!
//! The identity/profile boundary. The orchestrator never reads ambient
//! session state; it asks an injected [`PayerProfileProvider`].

use crate::error::BookingResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Contact fields handed to the payment provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayerContact {
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// A payer as known to the identity provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayerProfile {
    pub payer_id: String,
    pub contact: PayerContact,
    /// Identity provider's "profile complete" signal
    #[serde(default)]
    pub complete: bool,
}

impl PayerProfile {
    pub fn new(
        payer_id: impl Into<String>,
        name: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            payer_id: payer_id.into(),
            contact: PayerContact {
                name: name.into(),
                email: email.into(),
                phone: None,
            },
            complete: true,
        }
    }

    /// Builder: set phone
    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.contact.phone = Some(phone.into());
        self
    }

    /// Builder: mark the profile incomplete
    pub fn incomplete(mut self) -> Self {
        self.complete = false;
        self
    }

    /// Complete and carrying the fields a provider needs
    pub fn is_usable(&self) -> bool {
        self.complete
            && !self.contact.name.trim().is_empty()
            && self.contact.email.contains('@')
    }
}

/// Read-only capability supplying payer profiles.
#[async_trait]
pub trait PayerProfileProvider: Send + Sync {
    /// Look up a payer. `Ok(None)` means the identity provider has no profile.
    async fn profile(&self, payer_id: &str) -> BookingResult<Option<PayerProfile>>;
}

/// Static payer directory (loaded from `config/payers.toml` in development)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileDirectory {
    #[serde(default)]
    pub payers: Vec<PayerProfile>,
}

impl ProfileDirectory {
    pub fn new() -> Self {
        Self { payers: Vec::new() }
    }

    pub fn with_profile(mut self, profile: PayerProfile) -> Self {
        self.payers.push(profile);
        self
    }

    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(toml_str)
    }
}

#[async_trait]
impl PayerProfileProvider for ProfileDirectory {
    async fn profile(&self, payer_id: &str) -> BookingResult<Option<PayerProfile>> {
        Ok(self.payers.iter().find(|p| p.payer_id == payer_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usable_profile() {
        assert!(PayerProfile::new("u1", "Ada Obi", "ada@example.com").is_usable());
        assert!(!PayerProfile::new("u1", "Ada Obi", "ada@example.com")
            .incomplete()
            .is_usable());
        assert!(!PayerProfile::new("u1", " ", "ada@example.com").is_usable());
        assert!(!PayerProfile::new("u1", "Ada", "not-an-email").is_usable());
    }

    #[tokio::test]
    async fn test_directory_lookup() {
        let directory = ProfileDirectory::from_toml(
            r#"
            [[payers]]
            payer_id = "u-17"
            complete = true
            [payers.contact]
            name = "Tunde Bello"
            email = "tunde@example.com"
            phone = "+2348000000000"
            "#,
        )
        .unwrap();

        let found = directory.profile("u-17").await.unwrap().unwrap();
        assert_eq!(found.contact.phone.as_deref(), Some("+2348000000000"));
        assert!(directory.profile("u-18").await.unwrap().is_none());
    }
}
