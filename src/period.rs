//! Period labels: the canonical `YYYY-M` identifiers of processing intervals.

use crate::error::NamingError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Separator between year and month in a canonical label.
pub const LABEL_SEPARATOR: char = '-';

/// Separator used when a label becomes part of a resource name.
pub const RESOURCE_SEPARATOR: char = '_';

/// A calendar month, ordered chronologically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeriodLabel {
    year: u16,
    month: u8,
}

impl PeriodLabel {
    pub fn new(year: u16, month: u8) -> Result<Self, NamingError> {
        if !(1000..=9999).contains(&year) || !(1..=12).contains(&month) {
            return Err(NamingError::InvalidPeriod(format!("{}-{}", year, month)));
        }
        Ok(Self { year, month })
    }

    pub fn year(&self) -> u16 {
        self.year
    }

    pub fn month(&self) -> u8 {
        self.month
    }

    /// Cheap shape check used to pick period columns out of a row's attributes.
    pub fn looks_like_label(name: &str) -> bool {
        name.contains(LABEL_SEPARATOR)
    }

    /// Filesystem-safe form used in snapshot names, e.g. `2024_2`.
    pub fn resource_suffix(&self) -> String {
        format!("{}{}{}", self.year, RESOURCE_SEPARATOR, self.month)
    }

    /// Parse a snapshot name produced by [`PeriodLabel::resource_suffix`].
    pub fn from_resource_suffix(name: &str) -> Option<Self> {
        let (year, month) = name.split_once(RESOURCE_SEPARATOR)?;
        parse_parts(year, month).ok()
    }
}

fn parse_parts(year: &str, month: &str) -> Result<PeriodLabel, NamingError> {
    let invalid = || NamingError::InvalidPeriod(format!("{}-{}", year, month));
    if year.len() != 4 || !year.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    if month.is_empty() || month.len() > 2 || !month.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    let year: u16 = year.parse().map_err(|_| invalid())?;
    let month: u8 = month.parse().map_err(|_| invalid())?;
    PeriodLabel::new(year, month)
}

impl FromStr for PeriodLabel {
    type Err = NamingError;

    /// Accepts `YYYY-M` and the zero-padded `YYYY-MM`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (year, month) = s
            .trim()
            .split_once(LABEL_SEPARATOR)
            .ok_or_else(|| NamingError::InvalidPeriod(s.to_string()))?;
        parse_parts(year, month).map_err(|_| NamingError::InvalidPeriod(s.to_string()))
    }
}

impl fmt::Display for PeriodLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.year, LABEL_SEPARATOR, self.month)
    }
}

impl Serialize for PeriodLabel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PeriodLabel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
