use std::fmt;

use tokio::time::Instant;

use crate::browser::{BrowserSession, Deadline, DocumentPage};
use crate::cli::SettleMode;
use crate::config::{ScrapeConfig, SettlePolicy};
use crate::error::ScrapeError;
use crate::formats::ListingRecord;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    AttemptCap,
    ControlMissing,
    NotInteractable(String),
    Fault(String),
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AttemptCap => f.write_str("reveal attempt cap reached"),
            Self::ControlMissing => f.write_str("reveal control not found"),
            Self::NotInteractable(reason) => write!(f, "reveal control not interactable: {reason}"),
            Self::Fault(message) => write!(f, "fault: {message}"),
        }
    }
}

/// Everything harvested from one listing page, in harvest order.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub records: Vec<ListingRecord>,
    pub harvests: usize,
    pub activations: usize,
    pub stop: StopReason,
}

impl Extraction {
    pub fn is_fault(&self) -> bool {
        matches!(self.stop, StopReason::Fault(_))
    }
}

/// Opens a page, runs the reveal loop against `config.target_url`, and always closes the page.
///
/// Faults inside the loop end it early and are reported through [`StopReason::Fault`] with
/// the records gathered so far. Only failing to open the page is returned as an error.
pub async fn extract_listings(
    browser: &dyn BrowserSession,
    config: &ScrapeConfig,
    deadline: &Deadline,
) -> Result<Extraction, ScrapeError> {
    let page = deadline.run("open page", browser.new_page()).await?;

    let mut extraction = Extraction {
        records: Vec::new(),
        harvests: 0,
        activations: 0,
        stop: StopReason::AttemptCap,
    };

    if let Err(err) = reveal_and_harvest(page.as_ref(), config, deadline, &mut extraction).await {
        tracing::error!(
            url = %config.target_url,
            harvested = extraction.records.len(),
            error = %err,
            "listing extraction aborted"
        );
        extraction.stop = StopReason::Fault(err.to_string());
    }

    if let Err(err) = deadline.run_uncancelled("close page", page.close()).await {
        tracing::warn!(url = %config.target_url, error = %err, "failed to close listing page");
    }

    tracing::info!(
        url = %config.target_url,
        records = extraction.records.len(),
        harvests = extraction.harvests,
        activations = extraction.activations,
        stop = %extraction.stop,
        "listing extraction finished"
    );
    Ok(extraction)
}

async fn reveal_and_harvest(
    page: &dyn DocumentPage,
    config: &ScrapeConfig,
    deadline: &Deadline,
    extraction: &mut Extraction,
) -> Result<(), ScrapeError> {
    let url = config.target_url.as_str();
    let control = config.selectors.reveal_control.as_str();

    deadline.run("navigate", page.goto(url)).await?;

    harvest(page, config, deadline, extraction).await?;
    tracing::debug!(count = extraction.records.len(), "initial listings harvested");

    while extraction.activations < config.reveal_attempts {
        let attempt = extraction.activations + 1;

        let Some(state) = deadline
            .run("locate reveal control", page.control_state(control))
            .await?
        else {
            tracing::debug!(attempt, selector = control, "reveal control not found");
            extraction.stop = StopReason::ControlMissing;
            return Ok(());
        };

        if let Some(reason) = state.blocked_reason() {
            tracing::info!(attempt, selector = control, %reason, "reveal control is not clickable");
            extraction.stop = StopReason::NotInteractable(reason);
            return Ok(());
        }

        let before = match config.settle.mode {
            SettleMode::Fixed => 0,
            SettleMode::Poll => {
                deadline
                    .run(
                        "count listings",
                        page.count_matches(&config.selectors.listing.item),
                    )
                    .await?
            }
        };

        deadline
            .run("activate reveal control", page.activate(control))
            .await?;
        extraction.activations += 1;

        settle(page, &config.settle, &config.selectors.listing.item, before, deadline).await?;

        let harvested = harvest(page, config, deadline, extraction).await?;
        tracing::debug!(attempt, harvested, "listings harvested after reveal");
    }

    extraction.stop = StopReason::AttemptCap;
    Ok(())
}

// Appends without deduplication; the ranker owns that.
async fn harvest(
    page: &dyn DocumentPage,
    config: &ScrapeConfig,
    deadline: &Deadline,
    extraction: &mut Extraction,
) -> Result<usize, ScrapeError> {
    let fields = deadline
        .run("query listings", page.query_listings(&config.selectors.listing))
        .await?;
    let harvested = fields.len();
    extraction
        .records
        .extend(fields.into_iter().map(ListingRecord::from));
    extraction.harvests += 1;
    Ok(harvested)
}

async fn settle(
    page: &dyn DocumentPage,
    policy: &SettlePolicy,
    item_selector: &str,
    before: usize,
    deadline: &Deadline,
) -> Result<(), ScrapeError> {
    match policy.mode {
        SettleMode::Fixed => deadline.sleep(policy.delay).await,
        SettleMode::Poll => {
            let give_up_at = Instant::now() + policy.delay;
            loop {
                let now = Instant::now();
                if now >= give_up_at {
                    tracing::debug!(before, "item count did not grow within settle delay");
                    return Ok(());
                }
                deadline
                    .sleep(policy.poll_interval.min(give_up_at - now))
                    .await?;

                let count = deadline
                    .run("count listings", page.count_matches(item_selector))
                    .await?;
                if count > before {
                    tracing::debug!(before, count, "new listings rendered");
                    return Ok(());
                }
            }
        }
    }
}
