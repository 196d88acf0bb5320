//! # Resources
//!
//! Lodgeable units and the catalog they are read from.
//! The catalog is loaded from `config/resources.toml`; listing management
//! owns the data and this core only reads it.

use crate::error::{BookingError, BookingResult};
use crate::interval::StayInterval;
use crate::money::{Currency, Money};
use crate::store::ResourceStore;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A lodgeable unit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    /// Unique resource identifier (e.g., "lekki-loft-2")
    pub id: String,

    /// Display name
    #[serde(default)]
    pub name: String,

    /// Nightly price in whole major units
    pub nightly_price: u64,

    /// Currency of the nightly price
    #[serde(default)]
    pub currency: Currency,

    /// Owner-controlled block; when set nothing can be booked
    #[serde(default)]
    pub manually_unavailable: bool,
}

impl Resource {
    /// Create a bookable resource
    pub fn new(id: impl Into<String>, nightly_price: u64, currency: Currency) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            nightly_price,
            currency,
            manually_unavailable: false,
        }
    }

    /// Builder: set display name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Builder: set the owner block
    pub fn blocked(mut self) -> Self {
        self.manually_unavailable = true;
        self
    }

    /// Price of one night; a zero price is a catalog error
    pub fn nightly(&self) -> BookingResult<Money> {
        if self.nightly_price == 0 {
            return Err(BookingError::InvalidRequest(format!(
                "resource {} has no nightly price",
                self.id
            )));
        }
        Money::from_major(self.nightly_price, self.currency)
    }

    /// Total charge for a stay
    pub fn price_for(&self, interval: &StayInterval) -> BookingResult<Money> {
        self.nightly()?.times(interval.nights())
    }
}

/// Resource catalog (loaded from config)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceCatalog {
    #[serde(default)]
    pub resources: Vec<Resource>,
}

impl ResourceCatalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self {
            resources: Vec::new(),
        }
    }

    /// Add a resource to the catalog
    pub fn add(&mut self, resource: Resource) {
        self.resources.push(resource);
    }

    /// Builder: add a resource
    pub fn with_resource(mut self, resource: Resource) -> Self {
        self.add(resource);
        self
    }

    /// Find a resource by ID
    pub fn find(&self, id: &str) -> Option<&Resource> {
        self.resources.iter().find(|r| r.id == id)
    }

    /// Load catalog from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(toml_str)
    }
}

#[async_trait]
impl ResourceStore for ResourceCatalog {
    async fn get(&self, resource_id: &str) -> BookingResult<Option<Resource>> {
        Ok(self.find(resource_id).cloned())
    }
}
