//! Feed column -> remote field mapping
//!
//! The mapping itself is data (see `config/wine_field_map.json`); this module
//! only applies it. Protected fields are written when a record is created and
//! never touched again on updates.

use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use crate::error::{Result, SyncError};
use crate::feed::normalize_column;
use crate::models::{RemoteFields, UnifiedRecord};
use crate::pricing::{compute_price_breakdown_with, format_amount, CostPolicy};

/// Default field map for the wine catalog
const WINE_FIELD_MAP: &str = include_str!("../config/wine_field_map.json");

/// Field map document as stored on disk
#[derive(Debug, Deserialize)]
struct FieldMapDocument {
    sku_column: String,
    #[serde(default)]
    cost_column: Option<String>,
    #[serde(default)]
    raw_cost_field: Option<String>,
    #[serde(default)]
    margin_field: Option<String>,
    #[serde(default)]
    protected: Vec<String>,
    fields: BTreeMap<String, String>,
}

/// Translates unified feed records into remote table fields
#[derive(Debug, Clone)]
pub struct FieldMapper {
    /// Normalized feed column -> remote field
    fields: BTreeMap<String, String>,
    protected: BTreeSet<String>,
    sku_field: String,
    cost_column: Option<String>,
    raw_cost_field: Option<String>,
    margin_field: Option<String>,
    cost_policy: CostPolicy,
}

impl FieldMapper {
    /// The built-in wine catalog mapping
    pub fn wine_catalog() -> Result<Self> {
        Self::from_json(WINE_FIELD_MAP)
    }

    /// Load a field map document from disk
    pub fn from_path(path: &Path) -> Result<Self> {
        log::info!("Loading field map from: {}", path.display());
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Parse and validate a field map document
    pub fn from_json(content: &str) -> Result<Self> {
        let doc: FieldMapDocument = serde_json::from_str(content)?;

        let mut fields = BTreeMap::new();
        let mut targets = BTreeSet::new();
        for (column, remote) in doc.fields {
            if !targets.insert(remote.clone()) {
                return Err(SyncError::FieldMap(format!(
                    "remote field {remote:?} is mapped more than once"
                )));
            }
            let key = normalize_column(&column);
            if fields.insert(key.clone(), remote).is_some() {
                return Err(SyncError::FieldMap(format!(
                    "feed column {column:?} collides with another column as {key:?}"
                )));
            }
        }

        let sku_column = normalize_column(&doc.sku_column);
        let sku_field = fields.get(&sku_column).cloned().ok_or_else(|| {
            SyncError::FieldMap(format!("SKU column {sku_column:?} is not mapped"))
        })?;

        log::debug!(
            "Field map: {} columns, {} protected",
            fields.len(),
            doc.protected.len()
        );

        Ok(Self {
            fields,
            protected: doc.protected.into_iter().collect(),
            sku_field,
            cost_column: doc.cost_column.as_deref().map(normalize_column),
            raw_cost_field: doc.raw_cost_field,
            margin_field: doc.margin_field,
            cost_policy: CostPolicy::default(),
        })
    }

    pub fn with_cost_policy(mut self, policy: CostPolicy) -> Self {
        self.cost_policy = policy;
        self
    }

    /// Remote field holding the SKU
    pub fn sku_field(&self) -> &str {
        &self.sku_field
    }

    pub fn is_protected(&self, remote_field: &str) -> bool {
        self.protected.contains(remote_field)
    }

    /// Build the remote fields for one record.
    ///
    /// `include_excluded` is only set for new records, where protected fields
    /// have no prior value to preserve. Empty feed values produce no key.
    pub fn build_fields(&self, record: &UnifiedRecord, include_excluded: bool) -> Result<RemoteFields> {
        let mut out = RemoteFields::new();

        let raw_cost = self.cost_column.as_deref().and_then(|c| record.value(c));
        let breakdown = compute_price_breakdown_with(raw_cost, self.cost_policy).map_err(|e| match e {
            SyncError::InvalidCostFormat { value, .. } => SyncError::InvalidCostFormat {
                sku: Some(record.sku.to_string()),
                value,
            },
            other => other,
        })?;

        for (column, remote) in &self.fields {
            if !include_excluded && self.is_protected(remote) {
                continue;
            }

            if self.cost_column.as_deref() == Some(column.as_str()) {
                out.insert(remote.clone(), format_amount(breakdown.final_price));
            } else if let Some(value) = record.value(column) {
                out.insert(remote.clone(), value.to_string());
            }
        }

        if let (Some(field), Some(raw)) = (&self.raw_cost_field, raw_cost) {
            out.insert(field.clone(), raw.to_string());
        }

        if let Some(field) = &self.margin_field {
            out.insert(field.clone(), format_amount(breakdown.margin_pre_tax));
        }

        Ok(out)
    }
}

#[cfg(test)]
#[path = "mapping_tests.rs"]
mod tests;
