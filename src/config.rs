//! Run configuration
//!
//! Built once at startup (see `main.rs`) and handed to the runner. Nothing in
//! the library reads the environment directly.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Result, SyncError};
use crate::mapping::FieldMapper;
use crate::pricing::CostPolicy;
use crate::table::{BatchPolicy, DEFAULT_API_URL, MAX_BATCH_SIZE};

/// Everything one sync run needs
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub api_key: String,
    pub base_id: String,
    pub table_name: String,
    pub stock_csv_url: String,
    pub product_csv_url: String,
    /// Airtable API root, overridable for testing
    pub api_url: String,
    pub batch: BatchPolicy,
    /// Custom field map; the built-in wine catalog map when `None`
    pub field_map: Option<PathBuf>,
    pub cost_policy: CostPolicy,
    /// Plan and log, but write nothing
    pub dry_run: bool,
}

impl SyncConfig {
    /// Configuration with default API root, batching and pricing policy
    pub fn new(
        api_key: impl Into<String>,
        base_id: impl Into<String>,
        table_name: impl Into<String>,
        stock_csv_url: impl Into<String>,
        product_csv_url: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            base_id: base_id.into(),
            table_name: table_name.into(),
            stock_csv_url: stock_csv_url.into(),
            product_csv_url: product_csv_url.into(),
            api_url: DEFAULT_API_URL.to_string(),
            batch: BatchPolicy::default(),
            field_map: None,
            cost_policy: CostPolicy::default(),
            dry_run: false,
        }
    }

    /// Reject missing or out-of-range settings before any network call
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("AIRTABLE_API_KEY", &self.api_key),
            ("AIRTABLE_BASE_ID", &self.base_id),
            ("AIRTABLE_TABLE_NAME", &self.table_name),
            ("STOCK_CSV_URL", &self.stock_csv_url),
            ("PRODUCT_CSV_URL", &self.product_csv_url),
            ("AIRTABLE_API_URL", &self.api_url),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(SyncError::MissingConfig(name));
            }
        }

        if self.batch.batch_size == 0 || self.batch.batch_size > MAX_BATCH_SIZE {
            return Err(SyncError::InvalidConfig {
                name: "FEED_SYNC_BATCH_SIZE",
                reason: format!(
                    "{} is outside 1..={}",
                    self.batch.batch_size, MAX_BATCH_SIZE
                ),
            });
        }

        Ok(())
    }

    /// Load the configured field map with the configured cost policy
    pub fn field_mapper(&self) -> Result<FieldMapper> {
        let mapper = match &self.field_map {
            Some(path) => FieldMapper::from_path(path)?,
            None => FieldMapper::wine_catalog()?,
        };
        Ok(mapper.with_cost_policy(self.cost_policy))
    }

    pub fn with_rate_limit_delay(mut self, delay: Duration) -> Self {
        self.batch.rate_limit_delay = delay;
        self
    }
}
