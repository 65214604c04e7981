//! Stock and product feed loading
//!
//! Both feeds are semicolon-delimited CSV files with a header row. Column
//! names are lowercased and trimmed so lookups do not depend on how the
//! supplier capitalizes its headers.

use std::collections::BTreeMap;

use crate::error::{Result, SyncError};
use crate::models::FeedRow;

const USER_AGENT: &str = "feed_sync/1.0";

/// Download a feed and parse it into rows.
///
/// Any transport failure or non-2xx status aborts with
/// [`SyncError::FeedUnavailable`]; a partial feed would turn into spurious
/// deletes downstream.
pub async fn fetch_feed_rows(client: &reqwest::Client, url: &str) -> Result<Vec<FeedRow>> {
    log::info!("Fetching feed from {}", url);

    let unavailable = |reason: String| SyncError::FeedUnavailable {
        url: url.to_string(),
        reason,
    };

    let response = client
        .get(url)
        .header("User-Agent", USER_AGENT)
        .send()
        .await
        .map_err(|e| unavailable(e.to_string()))?;

    if !response.status().is_success() {
        return Err(unavailable(format!("HTTP {}", response.status())));
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| unavailable(e.to_string()))?;
    let text = String::from_utf8_lossy(&bytes);

    let rows = parse_feed(&text)?;
    log::info!("Fetched {} rows from {}", rows.len(), url);
    Ok(rows)
}

/// Parse semicolon-delimited text with a header row.
///
/// Rows without a `sku` value are dropped. Short rows only carry the columns
/// they have; cells beyond the header are ignored.
pub fn parse_feed(text: &str) -> Result<Vec<FeedRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(normalize_column)
        .collect();

    let mut rows = Vec::new();
    let mut dropped = 0usize;

    for record in reader.records() {
        let record = record?;
        let fields: BTreeMap<String, String> = headers
            .iter()
            .zip(record.iter())
            .map(|(h, v)| (h.clone(), v.to_string()))
            .collect();

        match FeedRow::from_fields(fields) {
            Some(row) => rows.push(row),
            None => dropped += 1,
        }
    }

    if dropped > 0 {
        log::debug!("Dropped {} feed rows without SKU", dropped);
    }

    Ok(rows)
}

/// Lowercase and trim a column name; strips a UTF-8 byte order mark.
pub fn normalize_column(name: &str) -> String {
    name.trim_start_matches('\u{feff}').trim().to_lowercase()
}

#[cfg(test)]
#[path = "feed_tests.rs"]
mod tests;
