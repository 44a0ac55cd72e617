use std::time::Duration;

use thiserror::Error;

/// Faults raised by the browser seam, the listing table, and the ranker.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    #[error("document query `{query}` failed: {message}")]
    Query { query: String, message: String },

    #[error("price {raw:?} is not a number after stripping non-numeric characters")]
    MalformedPrice { raw: String },

    #[error("listing row {line} has {fields} field(s), expected at least 4")]
    MalformedRow { line: usize, fields: usize },

    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: String,
        after: Duration,
    },

    #[error("{operation} cancelled")]
    Cancelled { operation: String },

    #[error("listing artifact {path}: {message}")]
    Artifact { path: String, message: String },
}

impl ScrapeError {
    pub fn navigation(url: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::Navigation {
            url: url.into(),
            message: err.to_string(),
        }
    }

    pub fn query(query: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::Query {
            query: query.into(),
            message: err.to_string(),
        }
    }
}
