//! Feed Sync - stock & product feeds into Airtable
//!
//! Each run downloads two semicolon-separated CSV feeds, joins them by SKU,
//! computes retail prices from the supplier cost and reconciles the result
//! against an Airtable table: matching SKUs are updated, new ones created and
//! vanished ones deleted.

pub mod config;
pub mod error;
pub mod feed;
pub mod mapping;
pub mod merge;
pub mod models;
pub mod pricing;
pub mod reconcile;
pub mod remote;
pub mod sync;
pub mod table;
pub mod web;

pub use config::SyncConfig;
pub use error::{Result, SyncError};
pub use mapping::FieldMapper;
pub use models::{FeedRow, Sku, UnifiedRecord};
pub use pricing::{compute_price_breakdown, CostPolicy, PriceBreakdown};
pub use reconcile::{build_plan, SyncPlan};
pub use sync::{run_once, SyncReport, Syncer};
pub use table::{AirtableClient, BatchPolicy, BatchedTable, RecordPage, TableApi};
