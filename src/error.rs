//! Error types for feed_sync

use thiserror::Error;

/// Unified error type for feed_sync operations
#[derive(Debug, Error)]
pub enum SyncError {
    /// A required setting was not provided
    #[error("Missing required setting: {0}")]
    MissingConfig(&'static str),

    /// A setting was provided but is out of range or malformed
    #[error("Invalid setting {name}: {reason}")]
    InvalidConfig { name: &'static str, reason: String },

    /// A feed could not be downloaded (network failure or non-2xx response)
    #[error("Feed unavailable at {url}: {reason}")]
    FeedUnavailable { url: String, reason: String },

    /// A feed was downloaded but is not valid delimited text
    #[error("Failed to parse feed: {0}")]
    FeedParse(#[from] csv::Error),

    /// The cost column holds something that is not a non-negative number
    #[error("Invalid cost format {value:?}{}", sku_suffix(.sku))]
    InvalidCostFormat { sku: Option<String>, value: String },

    /// The field map document is inconsistent
    #[error("Invalid field map: {0}")]
    FieldMap(String),

    /// HTTP request to the remote table failed (network error, timeout, etc.)
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Remote table answered with an error status
    #[error("Remote table returned {status}: {body}")]
    RemoteStatus {
        status: reqwest::StatusCode,
        body: String,
    },

    /// Failed to parse a JSON document
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// File I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A batch kept failing; earlier batches of the same operation were applied
    #[error("{operation} failed after {written} batch(es) were written, {lost} batch(es) lost: {source}")]
    BatchFailed {
        operation: &'static str,
        written: usize,
        lost: usize,
        #[source]
        source: Box<SyncError>,
    },
}

impl SyncError {
    /// Whether retrying the same request may succeed
    ///
    /// Rate limiting (429), server errors (5xx) and transport failures are
    /// transient. Everything else would fail the same way again.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Network(e) => !e.is_builder() && !e.is_decode(),
            SyncError::RemoteStatus { status, .. } => {
                *status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
            }
            _ => false,
        }
    }
}

fn sku_suffix(sku: &Option<String>) -> String {
    match sku {
        Some(sku) => format!(" for SKU {sku}"),
        None => String::new(),
    }
}

/// Result alias for feed_sync operations
pub type Result<T> = std::result::Result<T, SyncError>;
