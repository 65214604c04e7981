//! One full sync run: feeds -> merge -> plan -> remote writes.

use serde::Serialize;
use std::time::Duration;

use crate::config::SyncConfig;
use crate::error::Result;
use crate::feed::fetch_feed_rows;
use crate::mapping::FieldMapper;
use crate::merge::merge;
use crate::reconcile::{build_plan, SyncPlan};
use crate::remote::RemoteSnapshot;
use crate::table::{AirtableClient, BatchedTable, TableApi};

const HTTP_TIMEOUT: Duration = Duration::from_secs(60);

/// Outcome of one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// SKUs in the merged feeds
    pub merged: usize,
    /// SKUs in the remote table before the run
    pub remote: usize,
    pub updates: usize,
    pub creates: usize,
    pub deletes: usize,
    /// Updates dropped because only protected fields remained
    pub skipped_updates: usize,
    /// Nothing was written
    pub dry_run: bool,
}

/// Plan for one run plus the sizes it was built from
#[derive(Debug, Clone)]
pub struct PlannedRun {
    pub plan: SyncPlan,
    pub merged: usize,
    pub remote: usize,
}

/// Runs syncs against one remote table
pub struct Syncer<T> {
    config: SyncConfig,
    http: reqwest::Client,
    table: BatchedTable<T>,
    mapper: FieldMapper,
}

impl Syncer<AirtableClient> {
    /// Syncer talking to Airtable
    pub fn from_config(config: SyncConfig) -> Result<Self> {
        config.validate()?;
        let http = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;
        let client = AirtableClient::new(
            http.clone(),
            &config.api_url,
            &config.base_id,
            &config.table_name,
            config.api_key.clone(),
        );
        Self::with_table(config, http, client)
    }
}

impl<T: TableApi> Syncer<T> {
    /// Syncer over any table implementation
    ///
    /// Validates the configuration and loads the field map up front, so a bad
    /// setup fails before any network call.
    pub fn with_table(config: SyncConfig, http: reqwest::Client, table: T) -> Result<Self> {
        config.validate()?;
        let mapper = config.field_mapper()?;
        let table = BatchedTable::new(table, config.batch.clone());
        Ok(Self {
            config,
            http,
            table,
            mapper,
        })
    }

    pub fn table(&self) -> &BatchedTable<T> {
        &self.table
    }

    /// Fetch both feeds and the remote table, and compute the writes.
    pub async fn plan(&self) -> Result<PlannedRun> {
        let stock = fetch_feed_rows(&self.http, &self.config.stock_csv_url).await?;
        let products = fetch_feed_rows(&self.http, &self.config.product_csv_url).await?;
        let merged = merge(stock, products);
        log::info!("Merged {} SKUs from feeds", merged.len());

        let records = self.table.list_all().await?;
        let snapshot = RemoteSnapshot::from_records(records, self.mapper.sku_field());
        log::info!("Fetched {} SKUs from remote table", snapshot.len());

        let plan = build_plan(&merged, &snapshot, &self.mapper)?;
        Ok(PlannedRun {
            plan,
            merged: merged.len(),
            remote: snapshot.len(),
        })
    }

    /// Run one sync. In dry-run mode the plan is logged and nothing is written.
    pub async fn run(&self) -> Result<SyncReport> {
        log::info!("Starting sync of table {}", self.config.table_name);
        let PlannedRun {
            plan,
            merged,
            remote,
        } = self.plan().await?;

        let report = SyncReport {
            merged,
            remote,
            updates: plan.updates.len(),
            creates: plan.creates.len(),
            deletes: plan.deletes.len(),
            skipped_updates: plan.skipped_updates.len(),
            dry_run: self.config.dry_run,
        };

        if self.config.dry_run {
            log_plan(&plan);
            log::info!("Dry run, no changes written: {:?}", report);
            return Ok(report);
        }

        self.table.update_many(&plan.updates).await?;
        self.table.create_many(&plan.creates).await?;
        self.table.delete_many(&plan.deletes).await?;

        log::info!(
            "Sync completed successfully: {} updated, {} created, {} deleted",
            report.updates,
            report.creates,
            report.deletes
        );
        Ok(report)
    }
}

fn log_plan(plan: &SyncPlan) {
    for update in &plan.updates {
        log::info!("Would update {} ({} fields)", update.id, update.fields.len());
    }
    for create in &plan.creates {
        log::info!("Would create record with {} fields", create.fields.len());
    }
    for id in &plan.deletes {
        log::info!("Would delete {}", id);
    }
}

/// Build an Airtable syncer from `config` and run it once
pub async fn run_once(config: SyncConfig) -> Result<SyncReport> {
    Syncer::from_config(config)?.run().await
}

#[cfg(test)]
#[path = "sync_tests.rs"]
mod tests;
