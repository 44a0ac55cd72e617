use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::config::{DetailSelectors, ListingSelectors};
use crate::error::ScrapeError;
use crate::formats::{DetailFields, ListingFields};

/// A browser that can hand out independent pages. Shared across concurrent fetches.
#[async_trait]
pub trait BrowserSession: Send + Sync {
    async fn new_page(&self) -> Result<Box<dyn DocumentPage>, ScrapeError>;
}

/// One live page. Every method is a suspension point against the rendered document.
#[async_trait]
pub trait DocumentPage: Send + Sync {
    /// Navigates and returns once the network is judged idle.
    async fn goto(&self, url: &str) -> Result<(), ScrapeError>;

    /// Projects every rendered listing card. Missing elements become `None`, never a fault.
    async fn query_listings(
        &self,
        selectors: &ListingSelectors,
    ) -> Result<Vec<ListingFields>, ScrapeError>;

    async fn query_detail(&self, selectors: &DetailSelectors) -> Result<DetailFields, ScrapeError>;

    async fn count_matches(&self, selector: &str) -> Result<usize, ScrapeError>;

    /// Rendered state of the first element matching `selector`, or `None` when absent.
    async fn control_state(&self, selector: &str) -> Result<Option<ControlState>, ScrapeError>;

    async fn activate(&self, selector: &str) -> Result<(), ScrapeError>;

    async fn close(&self) -> Result<(), ScrapeError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ControlState {
    pub width: f64,
    pub height: f64,
    pub disabled: bool,
}

impl ControlState {
    /// Why the control cannot be activated, if it cannot.
    pub fn blocked_reason(&self) -> Option<String> {
        if self.disabled {
            return Some("control is disabled".to_owned());
        }
        if self.width <= 0.0 || self.height <= 0.0 {
            return Some(format!(
                "control has no rendered size ({}x{})",
                self.width, self.height
            ));
        }
        None
    }
}

/// Per-operation timeout plus run-wide cancellation.
#[derive(Debug, Clone, Default)]
pub struct Deadline {
    timeout: Option<Duration>,
    cancel: CancellationToken,
}

impl Deadline {
    pub fn new(timeout: Option<Duration>, cancel: CancellationToken) -> Self {
        Self { timeout, cancel }
    }

    pub fn unbounded() -> Self {
        Self::default()
    }

    pub async fn run<T, F>(&self, operation: &str, fut: F) -> Result<T, ScrapeError>
    where
        F: Future<Output = Result<T, ScrapeError>>,
    {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(ScrapeError::Cancelled {
                operation: operation.to_owned(),
            }),
            result = self.run_uncancelled(operation, fut) => result,
        }
    }

    /// Bounded by the timeout only. Cleanup such as closing a page must still happen after the
    /// run has been cancelled.
    pub async fn run_uncancelled<T, F>(&self, operation: &str, fut: F) -> Result<T, ScrapeError>
    where
        F: Future<Output = Result<T, ScrapeError>>,
    {
        match self.timeout {
            Some(after) => tokio::time::timeout(after, fut)
                .await
                .map_err(|_| ScrapeError::Timeout {
                    operation: operation.to_owned(),
                    after,
                })?,
            None => fut.await,
        }
    }

    /// Sleeps unless cancelled first.
    pub async fn sleep(&self, duration: Duration) -> Result<(), ScrapeError> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(ScrapeError::Cancelled {
                operation: "settle delay".to_owned(),
            }),
            _ = tokio::time::sleep(duration) => Ok(()),
        }
    }
}
