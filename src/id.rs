// Unified transaction identity: store tag + store-local id

use crate::error::LedgerError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which physical store a record lives in.
///
/// The derived `Ord` (Fixed before Adhoc) is part of the global merge order:
/// it is the tiebreak when two records from different stores share
/// `updated_at` and `transaction_date`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreTag {
    Fixed,
    Adhoc,
}

impl StoreTag {
    /// Wire prefix used in the encoded unified id.
    fn prefix(self) -> &'static str {
        match self {
            StoreTag::Fixed => "FT",
            StoreTag::Adhoc => "AT",
        }
    }
}

impl fmt::Display for StoreTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreTag::Fixed => write!(f, "fixed"),
            StoreTag::Adhoc => write!(f, "adhoc"),
        }
    }
}

/// Globally unique trip identifier: `(store tag, store-local id)`.
///
/// This is the only identity ever exposed for point operations. A bare
/// integer is never enough, because both stores assign their own auto-increment
/// keys starting at 1, so the same number legitimately names two different
/// trips. Encoded form is `FT-<n>` / `AT-<n>` with `n >= 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UnifiedId {
    pub tag: StoreTag,
    pub local_id: i64,
}

impl UnifiedId {
    pub fn new(tag: StoreTag, local_id: i64) -> Self {
        Self { tag, local_id }
    }
}

impl fmt::Display for UnifiedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.tag.prefix(), self.local_id)
    }
}

impl FromStr for UnifiedId {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (prefix, digits) = s
            .split_once('-')
            .ok_or_else(|| LedgerError::MalformedId(s.to_string()))?;

        let tag = match prefix {
            "FT" => StoreTag::Fixed,
            "AT" => StoreTag::Adhoc,
            _ => return Err(LedgerError::UnknownStore(prefix.to_string())),
        };

        let local_id: i64 = digits
            .parse()
            .map_err(|_| LedgerError::MalformedId(s.to_string()))?;
        if local_id < 1 {
            return Err(LedgerError::MalformedId(s.to_string()));
        }

        Ok(UnifiedId { tag, local_id })
    }
}

impl Serialize for UnifiedId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for UnifiedId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
