//! Source raster naming convention.
//!
//! Source rasters are named `{prefix}{YYYY}{infix}{M}` or, for assets uploaded after
//! the naming migration, `{prefix}{YYYY}{infix}{separator}{M}`. Both variants are live
//! in the same container, so resolution has to try both.

use crate::error::NamingError;
use crate::period::PeriodLabel;
use serde::{Deserialize, Serialize};

/// Which naming variant a source asset uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NameVariant {
    /// No separator before the month token: `...mes5`
    Compact,
    /// Separator before the month token: `...mes_5`
    Separated,
}

impl NameVariant {
    /// Order in which the asset resolver tries the variants.
    pub const LOOKUP_ORDER: [NameVariant; 2] = [NameVariant::Compact, NameVariant::Separated];

    pub fn as_str(self) -> &'static str {
        match self {
            NameVariant::Compact => "compact",
            NameVariant::Separated => "separated",
        }
    }
}

/// Naming convention for source rasters inside their container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceNaming {
    pub prefix: String,
    pub infix: String,
    #[serde(default = "default_separator")]
    pub separator: String,
}

fn default_separator() -> String {
    "_".to_string()
}

impl SourceNaming {
    pub fn new(prefix: impl Into<String>, infix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            infix: infix.into(),
            separator: default_separator(),
        }
    }

    /// Resource name (last path segment) for a period under a given variant.
    pub fn name_for(&self, period: PeriodLabel, variant: NameVariant) -> String {
        let sep = match variant {
            NameVariant::Compact => "",
            NameVariant::Separated => self.separator.as_str(),
        };
        format!(
            "{}{}{}{}{}",
            self.prefix,
            period.year(),
            self.infix,
            sep,
            period.month()
        )
    }

    /// Full asset id inside `container` for a period under a given variant.
    pub fn asset_id(&self, container: &str, period: PeriodLabel, variant: NameVariant) -> String {
        format!(
            "{}/{}",
            container.trim_end_matches('/'),
            self.name_for(period, variant)
        )
    }

    /// Parse a resource name or full id back into its period and variant.
    pub fn parse(&self, id_or_name: &str) -> Result<(PeriodLabel, NameVariant), NamingError> {
        let name = last_segment(id_or_name);
        let fail = |reason: &str| NamingError::Unparsable {
            name: name.to_string(),
            reason: reason.to_string(),
        };

        let rest = name
            .strip_prefix(self.prefix.as_str())
            .ok_or_else(|| fail("missing prefix"))?;
        if rest.len() < 4 || !rest.is_char_boundary(4) {
            return Err(fail("missing 4-digit year"));
        }
        let (year, rest) = rest.split_at(4);
        if !year.bytes().all(|b| b.is_ascii_digit()) {
            return Err(fail("missing 4-digit year"));
        }
        let rest = rest
            .strip_prefix(self.infix.as_str())
            .ok_or_else(|| fail("missing month token"))?;
        let (month, variant) = match rest.strip_prefix(self.separator.as_str()) {
            Some(month) if !self.separator.is_empty() => (month, NameVariant::Separated),
            _ => (rest, NameVariant::Compact),
        };
        if month.is_empty() || !month.bytes().all(|b| b.is_ascii_digit()) {
            return Err(fail("month token is not numeric"));
        }

        let label: PeriodLabel = format!("{}-{}", year, month)
            .parse()
            .map_err(|_| fail("year or month out of range"))?;
        Ok((label, variant))
    }
}

/// Last `/`-separated segment of a resource id.
pub fn last_segment(id: &str) -> &str {
    id.trim_end_matches('/').rsplit('/').next().unwrap_or(id)
}
