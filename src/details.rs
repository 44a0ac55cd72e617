use std::sync::Arc;

use anyhow::Context as _;

use crate::browser::{BrowserSession, Deadline};
use crate::config::DetailSelectors;
use crate::error::ScrapeError;
use crate::formats::{DetailOutcome, DetailRecord, RankedProduct};

/// Per-product outcomes, index-aligned with the products that were passed in.
#[derive(Debug, Clone, Default)]
pub struct DetailBatch {
    pub outcomes: Vec<DetailOutcome>,
}

impl DetailBatch {
    pub fn details(&self) -> impl Iterator<Item = &DetailRecord> {
        self.outcomes.iter().filter_map(DetailOutcome::detail)
    }

    pub fn failures(&self) -> impl Iterator<Item = (usize, &str, &str)> {
        self.outcomes
            .iter()
            .enumerate()
            .filter_map(|(index, outcome)| match outcome {
                DetailOutcome::Failed { link, error } => Some((index, link.as_str(), error.as_str())),
                DetailOutcome::Fetched(_) => None,
            })
    }

    pub fn failed_count(&self) -> usize {
        self.failures().count()
    }

    pub fn all_failed(&self) -> bool {
        !self.outcomes.is_empty() && self.failed_count() == self.outcomes.len()
    }
}

/// Fetches every product page at once and returns outcomes in input order.
///
/// A failing fetch is recorded as [`DetailOutcome::Failed`]; its siblings keep running.
pub async fn fetch_all(
    browser: Arc<dyn BrowserSession>,
    products: &[RankedProduct],
    selectors: &DetailSelectors,
    deadline: &Deadline,
) -> anyhow::Result<DetailBatch> {
    let mut join_set = tokio::task::JoinSet::new();

    for (index, product) in products.iter().enumerate() {
        let browser = Arc::clone(&browser);
        let link = product.link.clone();
        let selectors = selectors.clone();
        let deadline = deadline.clone();

        join_set.spawn(async move {
            let outcome = match fetch_one(browser.as_ref(), &link, &selectors, &deadline).await {
                Ok(detail) => DetailOutcome::Fetched(detail),
                Err(err) => {
                    tracing::warn!(index, link = %link, error = %err, "detail fetch failed");
                    DetailOutcome::Failed {
                        link,
                        error: err.to_string(),
                    }
                }
            };
            (index, outcome)
        });
    }

    let mut slots: Vec<Option<DetailOutcome>> = vec![None; products.len()];
    while let Some(joined) = join_set.join_next().await {
        let (index, outcome) = joined.context("join detail fetch task")?;
        slots[index] = Some(outcome);
    }

    let outcomes = slots
        .into_iter()
        .enumerate()
        .map(|(index, slot)| {
            slot.ok_or_else(|| anyhow::anyhow!("detail fetch {index} produced no outcome"))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    let batch = DetailBatch { outcomes };
    tracing::info!(
        products = products.len(),
        failed = batch.failed_count(),
        "detail fetch finished"
    );
    Ok(batch)
}

/// Opens a page for one product and closes it whether or not the projection succeeded.
pub async fn fetch_one(
    browser: &dyn BrowserSession,
    link: &str,
    selectors: &DetailSelectors,
    deadline: &Deadline,
) -> Result<DetailRecord, ScrapeError> {
    let page = deadline.run("open page", browser.new_page()).await?;

    let result = async {
        deadline.run("navigate", page.goto(link)).await?;
        let fields = deadline
            .run("query detail", page.query_detail(selectors))
            .await?;
        Ok::<_, ScrapeError>(DetailRecord::from(fields))
    }
    .await;

    if let Err(err) = deadline.run_uncancelled("close page", page.close()).await {
        tracing::warn!(link, error = %err, "failed to close detail page");
    }

    if let Ok(detail) = &result {
        tracing::debug!(link, title = %detail.title, "detail fetched");
    }
    result
}
