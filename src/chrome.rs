use std::time::Duration;

use anyhow::Context as _;
use async_trait::async_trait;
use chromiumoxide::Page;
use chromiumoxide::browser::{Browser, BrowserConfig};
use futures::StreamExt as _;
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::browser::{BrowserSession, ControlState, DocumentPage};
use crate::cli::BrowserArgs;
use crate::config::{DetailSelectors, ListingSelectors};
use crate::error::ScrapeError;
use crate::formats::{DetailFields, ListingFields};

const NETWORK_IDLE_WINDOW: Duration = Duration::from_millis(500);
const NETWORK_IDLE_TIMEOUT: Duration = Duration::from_secs(15);

/// Chromium driven over CDP. Owns the browser process and its event handler task.
pub struct ChromeBrowser {
    browser: Mutex<Option<Browser>>,
    handler_task: tokio::task::JoinHandle<()>,
}

impl ChromeBrowser {
    pub async fn launch(args: &BrowserArgs) -> anyhow::Result<Self> {
        let mut builder = BrowserConfig::builder();
        if args.headful {
            builder = builder.with_head();
        }
        if let Some(path) = args.chrome_path.as_deref() {
            builder = builder.chrome_executable(path);
        }
        let config = builder
            .build()
            .map_err(|err| anyhow::anyhow!("build browser config: {err}"))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("launch chromium")?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    tracing::debug!(error = %err, "cdp handler event error");
                }
            }
        });

        tracing::info!(headful = args.headful, "browser launched");
        Ok(Self {
            browser: Mutex::new(Some(browser)),
            handler_task,
        })
    }

    pub async fn close(&self) -> anyhow::Result<()> {
        let Some(mut browser) = self.browser.lock().await.take() else {
            return Ok(());
        };

        let closed = browser.close().await.context("close browser");
        if let Err(err) = browser.wait().await {
            tracing::debug!(error = %err, "wait for browser process");
        }
        self.handler_task.abort();
        closed?;

        tracing::info!("browser closed");
        Ok(())
    }
}

#[async_trait]
impl BrowserSession for ChromeBrowser {
    async fn new_page(&self) -> Result<Box<dyn DocumentPage>, ScrapeError> {
        let guard = self.browser.lock().await;
        let browser = guard
            .as_ref()
            .ok_or_else(|| ScrapeError::navigation("about:blank", "browser already closed"))?;
        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|err| ScrapeError::navigation("about:blank", err))?;
        Ok(Box::new(ChromePage { page }))
    }
}

struct ChromePage {
    page: Page,
}

impl ChromePage {
    async fn eval<T: serde::de::DeserializeOwned>(
        &self,
        query: &str,
        js: String,
    ) -> Result<T, ScrapeError> {
        self.page
            .evaluate(js)
            .await
            .map_err(|err| ScrapeError::query(query, err))?
            .into_value::<T>()
            .map_err(|err| ScrapeError::query(query, err))
    }

    // The load event fires before client-side fetches finish, so wait for the resource count
    // to hold still for a full window as well.
    async fn wait_for_network_idle(&self, url: &str) -> Result<(), ScrapeError> {
        let js = format!(
            r#"(async () => {{
                const timeoutMs = {timeout_ms};
                const idleMs = {idle_ms};
                const interval = 100;
                const count = () => {{
                    try {{ return performance.getEntriesByType('resource').length; }} catch (_) {{ return 0; }}
                }};

                const start = Date.now();
                let last = count();
                let stable = 0;
                while (Date.now() - start < timeoutMs) {{
                    await new Promise((r) => setTimeout(r, interval));
                    const current = count();
                    if (document.readyState === 'complete' && current === last) {{
                        stable += interval;
                        if (stable >= idleMs) {{
                            return {{ idle: true, waitedMs: Date.now() - start }};
                        }}
                    }} else {{
                        stable = 0;
                    }}
                    last = current;
                }}
                return {{ idle: false, waitedMs: Date.now() - start }};
            }})()"#,
            timeout_ms = NETWORK_IDLE_TIMEOUT.as_millis(),
            idle_ms = NETWORK_IDLE_WINDOW.as_millis(),
        );

        let probe: NetworkIdleProbe = self
            .eval("network idle", js)
            .await
            .map_err(|err| ScrapeError::navigation(url, err))?;
        if probe.idle {
            tracing::debug!(url, waited_ms = probe.waited_ms, "network idle");
        } else {
            tracing::warn!(url, waited_ms = probe.waited_ms, "network did not go idle; continuing");
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NetworkIdleProbe {
    idle: bool,
    waited_ms: u64,
}

#[derive(Debug, Deserialize)]
struct ControlProbe {
    found: bool,
    #[serde(default)]
    width: f64,
    #[serde(default)]
    height: f64,
    #[serde(default)]
    disabled: bool,
}

#[async_trait]
impl DocumentPage for ChromePage {
    async fn goto(&self, url: &str) -> Result<(), ScrapeError> {
        self.page
            .goto(url)
            .await
            .map_err(|err| ScrapeError::navigation(url, err))?;
        self.wait_for_network_idle(url).await
    }

    async fn query_listings(
        &self,
        selectors: &ListingSelectors,
    ) -> Result<Vec<ListingFields>, ScrapeError> {
        let js = format!(
            r#"(() => Array.from(document.querySelectorAll({item})).map((el) => ({{
                name: el.querySelector({name})?.innerText ?? null,
                price: el.querySelector({price})?.innerText ?? null,
                image: el.querySelector({image})?.src ?? null,
                link: el.querySelector({link})?.href ?? null,
            }})))()"#,
            item = js_string(&selectors.item),
            name = js_string(&selectors.name),
            price = js_string(&selectors.price),
            image = js_string(&selectors.image),
            link = js_string(&selectors.link),
        );
        self.eval("listings", js).await
    }

    async fn query_detail(&self, selectors: &DetailSelectors) -> Result<DetailFields, ScrapeError> {
        let js = format!(
            r#"(() => {{
                const text = (sel) => document.querySelector(sel)?.innerText ?? null;
                return {{
                    title: text({title}),
                    price: text({price}),
                    description: text({description}),
                    sku: text({sku}),
                    category: text({category}),
                }};
            }})()"#,
            title = js_string(&selectors.title),
            price = js_string(&selectors.price),
            description = js_string(&selectors.description),
            sku = js_string(&selectors.sku),
            category = js_string(&selectors.category),
        );
        self.eval("detail", js).await
    }

    async fn count_matches(&self, selector: &str) -> Result<usize, ScrapeError> {
        let js = format!(
            "document.querySelectorAll({}).length",
            js_string(selector)
        );
        self.eval("count", js).await
    }

    async fn control_state(&self, selector: &str) -> Result<Option<ControlState>, ScrapeError> {
        let js = format!(
            r#"(() => {{
                const el = document.querySelector({selector});
                if (!el) return {{ found: false }};
                return {{
                    found: true,
                    width: el.offsetWidth,
                    height: el.offsetHeight,
                    disabled: !!el.disabled,
                }};
            }})()"#,
            selector = js_string(selector),
        );
        let probe: ControlProbe = self.eval("reveal control", js).await?;
        Ok(probe.found.then_some(ControlState {
            width: probe.width,
            height: probe.height,
            disabled: probe.disabled,
        }))
    }

    async fn activate(&self, selector: &str) -> Result<(), ScrapeError> {
        let element = self
            .page
            .find_element(selector)
            .await
            .map_err(|err| ScrapeError::query(selector, err))?;
        element
            .click()
            .await
            .map_err(|err| ScrapeError::query(selector, err))?;
        Ok(())
    }

    async fn close(&self) -> Result<(), ScrapeError> {
        let url = self.page.url().await.ok().flatten().unwrap_or_default();
        self.page
            .clone()
            .close()
            .await
            .map_err(|err| ScrapeError::navigation(url, err))
    }
}

// Selectors are embedded in page scripts as JSON string literals.
fn js_string(value: &str) -> String {
    serde_json::Value::String(value.to_owned()).to_string()
}
