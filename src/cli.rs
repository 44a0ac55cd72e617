use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Deserialize;

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Scrape the listing page and write the listing table.
    Extract(ExtractArgs),
    /// Rank a listing table by price and print the top products as JSON lines.
    Rank(RankArgs),
    /// Rank a listing table and enrich the top products from their own pages.
    Details(DetailsArgs),
    /// Extract, persist, rank and enrich in one invocation.
    Run(RunArgs),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettleMode {
    /// Sleep for the whole settle delay after each reveal.
    #[default]
    Fixed,
    /// Poll the rendered item count until it grows or the settle delay runs out.
    Poll,
}

#[derive(Debug, Clone, Default, Args)]
pub struct ConfigArgs {
    /// YAML config file (camelCase keys, e.g. `topN`, `revealAttempts`, `settleDelayMs`).
    #[arg(long)]
    pub config: Option<String>,

    /// Listing page URL (must be http/https).
    #[arg(long)]
    pub url: Option<String>,

    /// Count of highest-priced products to enrich.
    #[arg(long)]
    pub top_n: Option<usize>,

    /// Maximum number of "load more" activations.
    #[arg(long)]
    pub reveal_attempts: Option<usize>,

    /// Wait after each activation before harvesting again.
    #[arg(long)]
    pub settle_delay_ms: Option<u64>,

    #[arg(long, value_enum)]
    pub settle_mode: Option<SettleMode>,

    /// Item-count polling interval for `--settle-mode poll`.
    #[arg(long)]
    pub poll_interval_ms: Option<u64>,

    /// Per-operation browser timeout (0 disables).
    #[arg(long)]
    pub operation_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Args)]
pub struct BrowserArgs {
    /// Chromium/Chrome executable (default: auto-detect).
    #[arg(long)]
    pub chrome_path: Option<String>,

    /// Show the browser window instead of running headless.
    #[arg(long)]
    pub headful: bool,
}

#[derive(Debug, Args)]
pub struct ExtractArgs {
    /// Output path for the listing table.
    #[arg(long, default_value = "products.csv")]
    pub out: String,

    #[command(flatten)]
    pub config: ConfigArgs,

    #[command(flatten)]
    pub browser: BrowserArgs,
}

#[derive(Debug, Args)]
pub struct RankArgs {
    /// Listing table written by `extract`.
    #[arg(long, default_value = "products.csv")]
    pub input: String,

    #[command(flatten)]
    pub config: ConfigArgs,
}

#[derive(Debug, Args)]
pub struct DetailsArgs {
    /// Listing table written by `extract`.
    #[arg(long, default_value = "products.csv")]
    pub input: String,

    #[command(flatten)]
    pub config: ConfigArgs,

    #[command(flatten)]
    pub browser: BrowserArgs,
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Output path for the listing table.
    #[arg(long, default_value = "products.csv")]
    pub out: String,

    #[command(flatten)]
    pub config: ConfigArgs,

    #[command(flatten)]
    pub browser: BrowserArgs,
}
