//! Run-scoped records flowing from the feeds to the remote table.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;

/// Feed column holding the SKU, after header normalization
pub const SKU_COLUMN: &str = "sku";

/// Stock keeping unit, the join key between feeds and the remote table
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sku(String);

impl Sku {
    /// Returns `None` for blank values
    pub fn new(value: impl Into<String>) -> Option<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            None
        } else {
            Some(Self(value))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Sku {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for Sku {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// One row of a feed, keyed by lowercase trimmed column name.
///
/// Always carries a non-blank `sku` value.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedRow {
    sku: Sku,
    fields: BTreeMap<String, String>,
}

impl FeedRow {
    /// Build a row from already normalized columns. Returns `None` without a SKU.
    pub fn from_fields(fields: BTreeMap<String, String>) -> Option<Self> {
        let sku = fields.get(SKU_COLUMN).cloned().and_then(Sku::new)?;
        Some(Self { sku, fields })
    }

    pub fn sku(&self) -> &Sku {
        &self.sku
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields.get(column).map(String::as_str)
    }

    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.fields
    }

    pub fn into_fields(self) -> BTreeMap<String, String> {
        self.fields
    }
}

/// Product row with the matching stock row laid over it
#[derive(Debug, Clone, PartialEq)]
pub struct UnifiedRecord {
    pub sku: Sku,
    pub fields: BTreeMap<String, String>,
}

impl UnifiedRecord {
    /// Non-empty value of a feed column
    pub fn value(&self, column: &str) -> Option<&str> {
        self.fields
            .get(column)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }
}

/// Remote field name -> value, as written to the remote table
pub type RemoteFields = BTreeMap<String, String>;
