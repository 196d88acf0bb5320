//! # Stay Intervals
//!
//! Half-open day ranges `[start, end)` and the overlap test that decides
//! double-booking. A guest checking out on day `d` and another checking in
//! on day `d` do not conflict.

use crate::error::{BookingError, BookingResult};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A half-open date range `[start, end)` with day granularity.
///
/// Construction guarantees `end > start`; a value of this type always has at
/// least one night.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawInterval")]
pub struct StayInterval {
    start: NaiveDate,
    end: NaiveDate,
}

#[derive(Deserialize)]
struct RawInterval {
    start: NaiveDate,
    end: NaiveDate,
}

impl TryFrom<RawInterval> for StayInterval {
    type Error = BookingError;

    fn try_from(raw: RawInterval) -> Result<Self, Self::Error> {
        StayInterval::new(raw.start, raw.end)
    }
}

impl StayInterval {
    /// Create an interval, rejecting zero or negative night counts
    pub fn new(start: NaiveDate, end: NaiveDate) -> BookingResult<Self> {
        if end <= start {
            return Err(BookingError::InvalidInterval {
                start: start.to_string(),
                end: end.to_string(),
            });
        }
        Ok(Self { start, end })
    }

    /// Parse `YYYY-MM-DD` bounds
    pub fn parse(start: &str, end: &str) -> BookingResult<Self> {
        let parse = |value: &str| {
            NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| {
                BookingError::InvalidInterval {
                    start: start.to_string(),
                    end: end.to_string(),
                }
            })
        };
        Self::new(parse(start)?, parse(end)?)
    }

    /// First night (inclusive)
    pub fn start(&self) -> NaiveDate {
        self.start
    }

    /// Checkout day (exclusive)
    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Number of nights, always >= 1
    pub fn nights(&self) -> i64 {
        (self.end - self.start).num_days()
    }

    /// True if the two stays share at least one night
    pub fn overlaps(&self, other: &StayInterval) -> bool {
        overlaps(self, other)
    }
}

impl std::fmt::Display for StayInterval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// Interval overlap check.
///
/// `[a, b)` and `[c, d)` overlap iff `a < d && c < b`. Touching boundaries
/// (`b == c`) are not a conflict.
pub fn overlaps(existing: &StayInterval, proposed: &StayInterval) -> bool {
    existing.start < proposed.end && proposed.start < existing.end
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(n: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, n).unwrap()
    }

    fn iv(a: u32, b: u32) -> StayInterval {
        StayInterval::new(day(a), day(b)).unwrap()
    }

    #[test]
    fn test_rejects_empty_and_inverted() {
        assert!(matches!(
            StayInterval::new(day(3), day(3)),
            Err(BookingError::InvalidInterval { .. })
        ));
        assert!(StayInterval::new(day(4), day(3)).is_err());
        assert_eq!(iv(1, 3).nights(), 2);
    }

    #[test]
    fn test_parse() {
        let interval = StayInterval::parse("2025-06-01", "2025-06-03").unwrap();
        assert_eq!(interval, iv(1, 3));
        assert!(StayInterval::parse("2025-06-01", "June 3rd").is_err());
    }

    #[test]
    fn test_back_to_back_is_not_overlap() {
        assert!(!overlaps(&iv(3, 5), &iv(1, 3)));
        assert!(!overlaps(&iv(1, 3), &iv(3, 5)));
    }

    #[test]
    fn test_partial_and_containment_overlap() {
        assert!(overlaps(&iv(2, 4), &iv(1, 3)));
        assert!(overlaps(&iv(1, 10), &iv(4, 5)));
        assert!(overlaps(&iv(4, 5), &iv(1, 10)));
        assert!(overlaps(&iv(1, 3), &iv(1, 3)));
    }

    #[test]
    fn test_overlap_symmetry_and_boundary_exhaustive() {
        let mut intervals = Vec::new();
        for a in 1..8 {
            for b in (a + 1)..9 {
                intervals.push(iv(a, b));
            }
        }

        for x in &intervals {
            for y in &intervals {
                assert_eq!(overlaps(x, y), overlaps(y, x), "{} vs {}", x, y);
                if x.end() == y.start() || y.end() == x.start() {
                    assert!(!overlaps(x, y), "{} touches {}", x, y);
                }
            }
        }
    }

    #[test]
    fn test_deserialize_validates() {
        let ok: StayInterval =
            serde_json::from_str(r#"{"start":"2025-06-01","end":"2025-06-03"}"#).unwrap();
        assert_eq!(ok.nights(), 2);

        let bad = serde_json::from_str::<StayInterval>(r#"{"start":"2025-06-03","end":"2025-06-01"}"#);
        assert!(bad.is_err());
    }
}
