//! Three-way diff between feed SKUs and remote SKUs.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::error::Result;
use crate::mapping::FieldMapper;
use crate::models::{RemoteFields, Sku, UnifiedRecord};
use crate::remote::RemoteSnapshot;

/// SKUs split by the action they need
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyPartition {
    /// In both the feeds and the remote table
    pub to_update: BTreeSet<Sku>,
    /// Only in the feeds
    pub to_create: BTreeSet<Sku>,
    /// Only in the remote table
    pub to_delete: BTreeSet<Sku>,
}

/// Classify SKUs by plain set algebra.
pub fn classify(local: &BTreeSet<Sku>, remote: &BTreeSet<Sku>) -> KeyPartition {
    KeyPartition {
        to_update: local.intersection(remote).cloned().collect(),
        to_create: local.difference(remote).cloned().collect(),
        to_delete: remote.difference(local).cloned().collect(),
    }
}

/// Update for an existing remote record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordUpdate {
    pub id: String,
    pub fields: RemoteFields,
}

/// New remote record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordCreate {
    pub fields: RemoteFields,
}

/// Every write needed to bring the remote table in line with the feeds
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncPlan {
    pub updates: Vec<RecordUpdate>,
    pub creates: Vec<RecordCreate>,
    /// Remote record ids
    pub deletes: Vec<String>,
    /// SKUs whose update had nothing but protected fields
    pub skipped_updates: Vec<Sku>,
}

impl SyncPlan {
    pub fn is_empty(&self) -> bool {
        self.updates.is_empty() && self.creates.is_empty() && self.deletes.is_empty()
    }
}

/// Build the write plan for one run.
///
/// Fails if any record cannot be priced; a partial plan is never returned.
pub fn build_plan(
    merged: &BTreeMap<Sku, UnifiedRecord>,
    snapshot: &RemoteSnapshot,
    mapper: &FieldMapper,
) -> Result<SyncPlan> {
    let local: BTreeSet<Sku> = merged.keys().cloned().collect();
    let partition = classify(&local, &snapshot.skus());

    log::info!(
        "Planned: update {}, create {}, delete {}",
        partition.to_update.len(),
        partition.to_create.len(),
        partition.to_delete.len()
    );

    let mut plan = SyncPlan::default();

    for sku in &partition.to_update {
        let (Some(record), Some(remote)) = (merged.get(sku), snapshot.get(sku)) else {
            continue;
        };
        let fields = mapper.build_fields(record, false)?;
        if fields.is_empty() {
            log::debug!("Nothing to update for SKU {}", sku);
            plan.skipped_updates.push(sku.clone());
            continue;
        }
        plan.updates.push(RecordUpdate {
            id: remote.id.clone(),
            fields,
        });
    }

    for sku in &partition.to_create {
        let Some(record) = merged.get(sku) else {
            continue;
        };
        let mut fields = mapper.build_fields(record, true)?;
        fields.insert(mapper.sku_field().to_string(), sku.to_string());
        plan.creates.push(RecordCreate { fields });
    }

    for sku in &partition.to_delete {
        if let Some(remote) = snapshot.get(sku) {
            plan.deletes.push(remote.id.clone());
        }
    }

    Ok(plan)
}

#[cfg(test)]
#[path = "reconcile_tests.rs"]
mod tests;
