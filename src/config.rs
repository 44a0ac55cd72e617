use std::path::Path;
use std::time::Duration;

use anyhow::Context as _;
use serde::Deserialize;
use url::Url;

use crate::cli::{ConfigArgs, SettleMode};

pub const DEFAULT_TARGET_URL: &str = "https://www.scrapingcourse.com/button-click";
pub const DEFAULT_TOP_N: usize = 5;
pub const DEFAULT_REVEAL_ATTEMPTS: usize = 4;
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 2000;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 250;
pub const DEFAULT_OPERATION_TIMEOUT_SECS: u64 = 30;

const MAX_REVEAL_ATTEMPTS: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct ListingSelectors {
    pub item: String,
    pub name: String,
    pub price: String,
    pub image: String,
    pub link: String,
}

impl Default for ListingSelectors {
    fn default() -> Self {
        Self {
            item: ".product-item".to_owned(),
            name: ".product-name".to_owned(),
            price: ".product-price".to_owned(),
            image: ".product-image".to_owned(),
            link: "a".to_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct DetailSelectors {
    pub title: String,
    pub price: String,
    pub description: String,
    pub sku: String,
    pub category: String,
}

impl Default for DetailSelectors {
    fn default() -> Self {
        Self {
            title: ".product_title".to_owned(),
            price: ".price".to_owned(),
            description: ".woocommerce-product-details__short-description".to_owned(),
            sku: ".sku_wrapper .sku".to_owned(),
            category: ".posted_in".to_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct Selectors {
    pub listing: ListingSelectors,
    pub reveal_control: String,
    pub detail: DetailSelectors,
}

impl Default for Selectors {
    fn default() -> Self {
        Self {
            listing: ListingSelectors::default(),
            reveal_control: "#load-more-btn".to_owned(),
            detail: DetailSelectors::default(),
        }
    }
}

/// On-disk configuration; every key is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ConfigFile {
    pub target_url: Option<String>,
    pub top_n: Option<usize>,
    pub reveal_attempts: Option<usize>,
    pub settle_delay_ms: Option<u64>,
    pub settle_mode: Option<SettleMode>,
    pub poll_interval_ms: Option<u64>,
    pub operation_timeout_secs: Option<u64>,
    #[serde(default)]
    pub selectors: Selectors,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettlePolicy {
    pub mode: SettleMode,
    pub delay: Duration,
    pub poll_interval: Duration,
}

#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    pub target_url: Url,
    pub top_n: usize,
    pub reveal_attempts: usize,
    pub settle: SettlePolicy,
    pub operation_timeout: Option<Duration>,
    pub selectors: Selectors,
}

/// Builds the effective config: CLI flags over the YAML file over defaults.
pub fn load(args: &ConfigArgs) -> anyhow::Result<ScrapeConfig> {
    let file = match args.config.as_deref() {
        Some(path) => read_config_file(Path::new(path))
            .with_context(|| format!("read config file: {path}"))?,
        None => ConfigFile::default(),
    };
    let config = resolve(file, args)?;
    tracing::debug!(?config, "resolved config");
    Ok(config)
}

pub fn read_config_file(path: &Path) -> anyhow::Result<ConfigFile> {
    let yaml = std::fs::read_to_string(path)
        .with_context(|| format!("read config: {}", path.display()))?;
    parse_config_file(&yaml)
}

pub fn parse_config_file(yaml: &str) -> anyhow::Result<ConfigFile> {
    if yaml.trim().is_empty() {
        return Ok(ConfigFile::default());
    }
    serde_yaml::from_str(yaml).context("parse config yaml")
}

pub fn resolve(file: ConfigFile, args: &ConfigArgs) -> anyhow::Result<ScrapeConfig> {
    let target_url = args
        .url
        .clone()
        .or(file.target_url)
        .unwrap_or_else(|| DEFAULT_TARGET_URL.to_owned());
    let target_url = Url::parse(&target_url).context("parse target url")?;
    if target_url.scheme() != "http" && target_url.scheme() != "https" {
        anyhow::bail!("target url must be http/https: {target_url}");
    }

    let reveal_attempts = args
        .reveal_attempts
        .or(file.reveal_attempts)
        .unwrap_or(DEFAULT_REVEAL_ATTEMPTS);
    if reveal_attempts > MAX_REVEAL_ATTEMPTS {
        anyhow::bail!("revealAttempts must be <= {MAX_REVEAL_ATTEMPTS}, got {reveal_attempts}");
    }

    let poll_interval_ms = args
        .poll_interval_ms
        .or(file.poll_interval_ms)
        .unwrap_or(DEFAULT_POLL_INTERVAL_MS);
    if poll_interval_ms == 0 {
        anyhow::bail!("pollIntervalMs must be > 0");
    }

    let settle = SettlePolicy {
        mode: args.settle_mode.or(file.settle_mode).unwrap_or_default(),
        delay: Duration::from_millis(
            args.settle_delay_ms
                .or(file.settle_delay_ms)
                .unwrap_or(DEFAULT_SETTLE_DELAY_MS),
        ),
        poll_interval: Duration::from_millis(poll_interval_ms),
    };

    let operation_timeout = match args
        .operation_timeout_secs
        .or(file.operation_timeout_secs)
        .unwrap_or(DEFAULT_OPERATION_TIMEOUT_SECS)
    {
        0 => None,
        secs => Some(Duration::from_secs(secs)),
    };

    Ok(ScrapeConfig {
        target_url,
        top_n: args.top_n.or(file.top_n).unwrap_or(DEFAULT_TOP_N),
        reveal_attempts,
        settle,
        operation_timeout,
        selectors: file.selectors,
    })
}
