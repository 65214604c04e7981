//! Remote table access
//!
//! [`TableApi`] is the plain capability (one page of records, or one batch
//! of writes, per call). [`AirtableClient`] implements it over HTTP;
//! [`BatchedTable`] wraps any implementation with pagination, chunking,
//! throttling and retries.

mod airtable;
mod batch;

pub use airtable::{AirtableClient, DEFAULT_API_URL};
pub use batch::{BatchPolicy, BatchedTable};

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::Result;
use crate::reconcile::{RecordCreate, RecordUpdate};
use crate::remote::RemoteRecord;

/// Largest batch the Airtable API accepts per write call
pub const MAX_BATCH_SIZE: usize = 10;

/// One page of a table listing
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecordPage {
    #[serde(default)]
    pub records: Vec<RemoteRecord>,
    /// Cursor for the next page; `None` on the last one
    #[serde(default)]
    pub offset: Option<String>,
}

/// Plain remote table client. Every call is a single request.
#[async_trait]
pub trait TableApi: Send + Sync {
    /// The page starting at `offset`, or the first page
    async fn list_page(&self, offset: Option<&str>) -> Result<RecordPage>;

    async fn create_records(&self, batch: &[RecordCreate]) -> Result<()>;

    async fn update_records(&self, batch: &[RecordUpdate]) -> Result<()>;

    async fn delete_records(&self, ids: &[String]) -> Result<()>;
}
