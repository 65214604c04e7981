//! Remote table records and the per-run snapshot keyed by SKU.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

use crate::models::Sku;

/// One row of the remote table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteRecord {
    pub id: String,
    #[serde(default)]
    pub fields: Map<String, Value>,
}

impl RemoteRecord {
    /// Text of a field; numbers are rendered, other JSON types are ignored
    pub fn text(&self, field: &str) -> Option<String> {
        match self.fields.get(field)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// Remote records indexed by their SKU field
#[derive(Debug, Clone, Default)]
pub struct RemoteSnapshot {
    records: BTreeMap<Sku, RemoteRecord>,
}

impl RemoteSnapshot {
    /// Index records by `sku_field`.
    ///
    /// Records without a SKU are ignored. When several records share a SKU the
    /// last one listed wins and a warning names the shadowed record.
    pub fn from_records(records: Vec<RemoteRecord>, sku_field: &str) -> Self {
        let mut indexed = BTreeMap::new();
        let mut without_sku = 0usize;

        for record in records {
            let Some(sku) = record.text(sku_field).and_then(Sku::new) else {
                without_sku += 1;
                continue;
            };
            if let Some(previous) = indexed.insert(sku.clone(), record) {
                log::warn!(
                    "Duplicate remote records for SKU {}: record {} is shadowed by a later one",
                    sku,
                    previous.id
                );
            }
        }

        if without_sku > 0 {
            log::debug!("Ignored {} remote records without {}", without_sku, sku_field);
        }

        Self { records: indexed }
    }

    pub fn get(&self, sku: &Sku) -> Option<&RemoteRecord> {
        self.records.get(sku)
    }

    pub fn skus(&self) -> BTreeSet<Sku> {
        self.records.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
