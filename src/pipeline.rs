use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context as _;
use tokio_util::sync::CancellationToken;

use crate::browser::{BrowserSession, Deadline};
use crate::chrome::ChromeBrowser;
use crate::cli::{DetailsArgs, ExtractArgs, RankArgs, RunArgs};
use crate::config::ScrapeConfig;
use crate::details::DetailBatch;
use crate::formats::RankedProduct;
use crate::listing::Extraction;

pub async fn extract(args: ExtractArgs) -> anyhow::Result<()> {
    let config = crate::config::load(&args.config).context("load config")?;
    let deadline = deadline_for(&config);
    let out_path = PathBuf::from(&args.out);

    let browser = ChromeBrowser::launch(&args.browser).await?;
    let extraction = crate::listing::extract_listings(&browser, &config, &deadline).await;
    close_browser(&browser).await;

    let extraction = extraction.context("extract listings")?;
    persist_extraction(&out_path, &extraction, &config)
}

pub fn rank(args: RankArgs) -> anyhow::Result<()> {
    let config = crate::config::load(&args.config).context("load config")?;
    let input_path = PathBuf::from(&args.input);

    let ranked = load_ranked(&input_path, config.top_n)?;

    let mut stdout = std::io::stdout().lock();
    for product in &ranked {
        serde_json::to_writer(&mut stdout, product).context("serialize ranked product")?;
        stdout.write_all(b"\n").context("write ranked product newline")?;
    }
    stdout.flush().context("flush stdout")?;
    Ok(())
}

pub async fn details(args: DetailsArgs) -> anyhow::Result<()> {
    let config = crate::config::load(&args.config).context("load config")?;
    let deadline = deadline_for(&config);
    let input_path = PathBuf::from(&args.input);

    let ranked = load_ranked(&input_path, config.top_n)?;

    let browser = Arc::new(ChromeBrowser::launch(&args.browser).await?);
    let batch = enrich(browser.clone(), &ranked, &config, &deadline).await;
    close_browser(&browser).await;

    report(&batch?)
}

pub async fn run(args: RunArgs) -> anyhow::Result<()> {
    let config = crate::config::load(&args.config).context("load config")?;
    let deadline = deadline_for(&config);
    let out_path = PathBuf::from(&args.out);

    let browser = Arc::new(ChromeBrowser::launch(&args.browser).await?);
    let result = async {
        tracing::info!(url = %config.target_url, "run: extract");
        let extraction = crate::listing::extract_listings(browser.as_ref(), &config, &deadline)
            .await
            .context("extract listings")?;
        persist_extraction(&out_path, &extraction, &config)?;

        tracing::info!(input = %out_path.display(), top_n = config.top_n, "run: rank");
        let ranked = load_ranked(&out_path, config.top_n)?;

        tracing::info!(products = ranked.len(), "run: details");
        enrich(browser.clone(), &ranked, &config, &deadline).await
    }
    .await;
    close_browser(&browser).await;

    report(&result?)
}

fn deadline_for(config: &ScrapeConfig) -> Deadline {
    Deadline::new(config.operation_timeout, cancel_on_ctrl_c())
}

fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let watcher = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received; cancelling browser operations");
            watcher.cancel();
        }
    });
    token
}

async fn close_browser(browser: &ChromeBrowser) {
    if let Err(err) = browser.close().await {
        tracing::warn!(error = %format!("{err:#}"), "failed to close browser");
    }
}

/// Writes whatever was harvested; a fault still fails the command after the write.
fn persist_extraction(
    out_path: &Path,
    extraction: &Extraction,
    config: &ScrapeConfig,
) -> anyhow::Result<()> {
    if extraction.records.is_empty() && extraction.is_fault() {
        anyhow::bail!("listing extraction failed before any records were harvested: {}", extraction.stop);
    }

    crate::store::write_listings(out_path, &extraction.records, Some(&config.target_url))
        .context("write listing table")?;

    if extraction.is_fault() {
        anyhow::bail!(
            "listing extraction stopped early ({}); wrote {} partial records to {}",
            extraction.stop,
            extraction.records.len(),
            out_path.display()
        );
    }
    Ok(())
}

fn load_ranked(input_path: &Path, top_n: usize) -> anyhow::Result<Vec<RankedProduct>> {
    let records = crate::store::read_listings(input_path).context("read listing table")?;
    let ranked = crate::ranking::rank(&records, top_n);
    tracing::info!(
        records = records.len(),
        ranked = ranked.len(),
        top_n,
        "ranked listings by price"
    );
    Ok(ranked)
}

async fn enrich(
    browser: Arc<dyn BrowserSession>,
    ranked: &[RankedProduct],
    config: &ScrapeConfig,
    deadline: &Deadline,
) -> anyhow::Result<DetailBatch> {
    crate::details::fetch_all(browser, ranked, &config.selectors.detail, deadline)
        .await
        .context("fetch product details")
}

fn report(batch: &DetailBatch) -> anyhow::Result<()> {
    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, &batch.outcomes).context("serialize details")?;
    stdout.write_all(b"\n").context("write details newline")?;
    stdout.flush().context("flush stdout")?;

    for (index, link, error) in batch.failures() {
        tracing::warn!(index, link, error, "product left without details");
    }
    if batch.all_failed() {
        anyhow::bail!("every detail fetch failed ({} products)", batch.outcomes.len());
    }
    Ok(())
}
