//! Airtable REST client

use async_trait::async_trait;
use serde::Serialize;

use super::{RecordPage, TableApi};
use crate::error::{Result, SyncError};
use crate::reconcile::{RecordCreate, RecordUpdate};

/// Airtable public API root
pub const DEFAULT_API_URL: &str = "https://api.airtable.com/v0";

/// Records per page when listing (Airtable maximum)
const PAGE_SIZE: &str = "100";

#[derive(Serialize)]
struct WriteRequest<'a, T> {
    records: &'a [T],
}

/// Airtable client bound to one table of one base
pub struct AirtableClient {
    client: reqwest::Client,
    api_key: String,
    table_url: String,
}

impl AirtableClient {
    pub fn new(client: reqwest::Client, api_url: &str, base_id: &str, table_name: &str, api_key: String) -> Self {
        let table_url = format!(
            "{}/{}/{}",
            api_url.trim_end_matches('/'),
            urlencoding::encode(base_id),
            urlencoding::encode(table_name)
        );
        log::debug!("Airtable table URL: {}", table_url);
        Self {
            client,
            api_key,
            table_url,
        }
    }

    pub fn table_url(&self) -> &str {
        &self.table_url
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        log::error!("Airtable returned {}: {}", status, body);
        Err(SyncError::RemoteStatus { status, body })
    }
}

#[async_trait]
impl TableApi for AirtableClient {
    async fn list_page(&self, offset: Option<&str>) -> Result<RecordPage> {
        let mut request = self
            .client
            .get(&self.table_url)
            .bearer_auth(&self.api_key)
            .query(&[("pageSize", PAGE_SIZE)]);
        if let Some(offset) = offset {
            request = request.query(&[("offset", offset)]);
        }

        let response = Self::check(request.send().await?).await?;
        let page: RecordPage = serde_json::from_slice(&response.bytes().await?)?;
        log::debug!("Listed {} records", page.records.len());
        Ok(page)
    }

    async fn create_records(&self, batch: &[RecordCreate]) -> Result<()> {
        log::debug!("Creating {} records", batch.len());
        let response = self
            .client
            .post(&self.table_url)
            .bearer_auth(&self.api_key)
            .json(&WriteRequest { records: batch })
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn update_records(&self, batch: &[RecordUpdate]) -> Result<()> {
        log::debug!("Updating {} records", batch.len());
        let response = self
            .client
            .patch(&self.table_url)
            .bearer_auth(&self.api_key)
            .json(&WriteRequest { records: batch })
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn delete_records(&self, ids: &[String]) -> Result<()> {
        log::debug!("Deleting {} records", ids.len());
        let params: Vec<(&str, &str)> = ids.iter().map(|id| ("records[]", id.as_str())).collect();
        let response = self
            .client
            .delete(&self.table_url)
            .bearer_auth(&self.api_key)
            .query(&params)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "airtable_tests.rs"]
mod tests;
