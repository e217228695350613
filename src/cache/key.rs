//! Cache Key Module
//!
//! Discriminates the cached collections: one per calendar day plus the
//! aggregate `all` listing.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;

use crate::error::SyncError;

const DATE_PREFIX: &str = "date:";
const ALL_KEY: &str = "all";

// == Cache Key ==
/// Identifies a cached collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// Plans scheduled for a single day (`date:YYYY-MM-DD`)
    Date(NaiveDate),
    /// The full plan listing (`all`)
    All,
}

impl CacheKey {
    /// Returns true for per-day keys.
    pub fn is_date(&self) -> bool {
        matches!(self, CacheKey::Date(_))
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKey::Date(date) => write!(f, "{}{}", DATE_PREFIX, date.format("%Y-%m-%d")),
            CacheKey::All => f.write_str(ALL_KEY),
        }
    }
}

impl FromStr for CacheKey {
    type Err = SyncError;

    /// Parses `all`, `date:YYYY-MM-DD` or a bare `YYYY-MM-DD`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s == ALL_KEY {
            return Ok(CacheKey::All);
        }
        let date = s.strip_prefix(DATE_PREFIX).unwrap_or(s);
        NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .map(CacheKey::Date)
            .map_err(|_| SyncError::InvalidKey(s.to_string()))
    }
}

impl From<NaiveDate> for CacheKey {
    fn from(date: NaiveDate) -> Self {
        CacheKey::Date(date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_formats() {
        let date = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        assert_eq!(CacheKey::Date(date).to_string(), "date:2024-05-01");
        assert_eq!(CacheKey::All.to_string(), "all");
    }

    #[test]
    fn test_parse_prefixed_and_bare_dates() {
        let date = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        assert_eq!("date:2024-05-01".parse::<CacheKey>().unwrap(), CacheKey::Date(date));
        assert_eq!("2024-05-01".parse::<CacheKey>().unwrap(), CacheKey::Date(date));
        assert_eq!("all".parse::<CacheKey>().unwrap(), CacheKey::All);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!("date:tomorrow".parse::<CacheKey>(), Err(SyncError::InvalidKey(_))));
        assert!(matches!("ALL".parse::<CacheKey>(), Err(SyncError::InvalidKey(_))));
        assert!(matches!("".parse::<CacheKey>(), Err(SyncError::InvalidKey(_))));
    }

    #[test]
    fn test_is_date() {
        assert!(!CacheKey::All.is_date());
        assert!(CacheKey::Date(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()).is_date());
    }
}
