//! # Money
//!
//! Canonical amount representation for stay-ledger.
//!
//! Providers disagree on units: some quote amounts in the smallest currency
//! unit (kobo, pesewas, cents), others in major units (naira, cedis). Every
//! amount crossing the adapter boundary is converted to [`Money`], which is
//! always stored in minor units, so that requested and verified amounts are
//! compared without knowing which provider produced them.

use crate::error::{BookingError, BookingResult};
use serde::{Deserialize, Serialize};

/// Supported currencies (ISO 4217)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    NGN,
    GHS,
    KES,
    ZAR,
    USD,
}

impl Currency {
    /// Returns the ISO 4217 currency code
    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::NGN => "NGN",
            Currency::GHS => "GHS",
            Currency::KES => "KES",
            Currency::ZAR => "ZAR",
            Currency::USD => "USD",
        }
    }

    /// Parse an ISO code, case-insensitive
    pub fn parse(code: &str) -> Option<Self> {
        match code.trim().to_uppercase().as_str() {
            "NGN" => Some(Currency::NGN),
            "GHS" => Some(Currency::GHS),
            "KES" => Some(Currency::KES),
            "ZAR" => Some(Currency::ZAR),
            "USD" => Some(Currency::USD),
            _ => None,
        }
    }

    /// Returns the number of decimal places for this currency
    pub fn decimal_places(&self) -> u32 {
        2
    }

    fn minor_per_major(&self) -> i64 {
        10_i64.pow(self.decimal_places())
    }

    /// Convert a decimal major-unit amount to the smallest currency unit
    pub fn to_smallest_unit(&self, amount: f64) -> i64 {
        (amount * self.minor_per_major() as f64).round() as i64
    }

    /// Convert from smallest unit back to decimal
    pub fn from_smallest_unit(&self, amount: i64) -> f64 {
        amount as f64 / self.minor_per_major() as f64
    }
}

impl Default for Currency {
    fn default() -> Self {
        Currency::NGN
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unit convention a provider uses on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmountUnit {
    /// Smallest currency unit (kobo, cents)
    Minor,
    /// Major currency unit (naira, dollars), possibly fractional
    Major,
}

impl AmountUnit {
    /// Canonicalize a raw provider amount
    pub fn to_money(&self, raw: f64, currency: Currency) -> Money {
        let amount_minor = match self {
            AmountUnit::Minor => raw.round() as i64,
            AmountUnit::Major => currency.to_smallest_unit(raw),
        };
        Money::from_minor(amount_minor, currency)
    }

    /// Express canonical money in this unit for an outgoing request
    pub fn from_money(&self, money: &Money) -> f64 {
        match self {
            AmountUnit::Minor => money.amount_minor as f64,
            AmountUnit::Major => money.currency.from_smallest_unit(money.amount_minor),
        }
    }
}

/// Amount in the smallest currency unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Money {
    /// Amount in smallest currency unit (kobo for NGN)
    pub amount_minor: i64,
    /// Currency
    pub currency: Currency,
}

impl Money {
    /// Create money from a whole major-unit amount (e.g. a nightly price).
    ///
    /// Fails if the amount does not fit in minor units.
    pub fn from_major(amount: u64, currency: Currency) -> BookingResult<Self> {
        let amount_minor = i64::try_from(amount)
            .ok()
            .and_then(|major| major.checked_mul(currency.minor_per_major()))
            .ok_or_else(|| {
                BookingError::InvalidRequest(format!("{} {} is out of range", currency, amount))
            })?;
        Ok(Self {
            amount_minor,
            currency,
        })
    }

    /// Create money from smallest units
    pub fn from_minor(amount_minor: i64, currency: Currency) -> Self {
        Self {
            amount_minor,
            currency,
        }
    }

    /// Multiply by a count (nights)
    pub fn times(&self, count: i64) -> BookingResult<Self> {
        let amount_minor = self.amount_minor.checked_mul(count).ok_or_else(|| {
            BookingError::InvalidRequest(format!("{} x {} is out of range", self, count))
        })?;
        Ok(Self {
            amount_minor,
            currency: self.currency,
        })
    }

    pub fn is_positive(&self) -> bool {
        self.amount_minor > 0
    }

    /// Get the decimal amount
    pub fn as_decimal(&self) -> f64 {
        self.currency.from_smallest_unit(self.amount_minor)
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let per = self.currency.minor_per_major();
        write!(
            f,
            "{} {}.{:02}",
            self.currency,
            self.amount_minor / per,
            (self.amount_minor % per).abs()
        )
    }
}
