#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use topshelf::browser::{BrowserSession, ControlState, DocumentPage};
use topshelf::config::{DetailSelectors, ListingSelectors};
use topshelf::error::ScrapeError;
use topshelf::formats::{DetailFields, ListingFields};

pub const LISTING_URL: &str = "https://shop.test/catalog";

/// Listing page behaviour. `batches[k]` appears after the k-th activation; the page keeps
/// showing earlier batches too, as a real "load more" page does.
#[derive(Debug, Clone, Default)]
pub struct ListingScript {
    pub batches: Vec<Vec<ListingFields>>,
    /// Control state seen before activation k; past the end the last entry repeats.
    pub controls: Vec<Option<ControlState>>,
    /// Zero-based listing query that fails.
    pub fail_query_at: Option<usize>,
    pub fail_navigation: bool,
}

#[derive(Debug, Clone, Default)]
pub struct DetailScript {
    pub fields: DetailFields,
    pub delay: Duration,
    pub fail: bool,
}

#[derive(Debug, Default)]
pub struct StubStats {
    pub opened: AtomicUsize,
    pub closed: AtomicUsize,
    pub activations: AtomicUsize,
    pub listing_queries: AtomicUsize,
    pub navigations: Mutex<Vec<String>>,
}

impl StubStats {
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn activations(&self) -> usize {
        self.activations.load(Ordering::SeqCst)
    }

    pub fn listing_queries(&self) -> usize {
        self.listing_queries.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Default)]
pub struct StubSite {
    pub listing: ListingScript,
    pub details: HashMap<String, DetailScript>,
}

#[derive(Clone)]
pub struct StubBrowser {
    site: Arc<StubSite>,
    pub stats: Arc<StubStats>,
}

impl StubBrowser {
    pub fn new(site: StubSite) -> Self {
        Self {
            site: Arc::new(site),
            stats: Arc::new(StubStats::default()),
        }
    }
}

#[async_trait]
impl BrowserSession for StubBrowser {
    async fn new_page(&self) -> Result<Box<dyn DocumentPage>, ScrapeError> {
        self.stats.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(StubPage {
            site: Arc::clone(&self.site),
            stats: Arc::clone(&self.stats),
            url: Mutex::new(None),
            revealed: AtomicUsize::new(0),
        }))
    }
}

struct StubPage {
    site: Arc<StubSite>,
    stats: Arc<StubStats>,
    url: Mutex<Option<String>>,
    revealed: AtomicUsize,
}

impl StubPage {
    fn current_url(&self) -> String {
        self.url.lock().unwrap().clone().unwrap_or_default()
    }

    fn visible_listings(&self) -> Vec<ListingFields> {
        let revealed = self.revealed.load(Ordering::SeqCst);
        self.site
            .listing
            .batches
            .iter()
            .take(revealed + 1)
            .flatten()
            .cloned()
            .collect()
    }
}

#[async_trait]
impl DocumentPage for StubPage {
    async fn goto(&self, url: &str) -> Result<(), ScrapeError> {
        self.stats.navigations.lock().unwrap().push(url.to_owned());
        *self.url.lock().unwrap() = Some(url.to_owned());

        let failing = match self.site.details.get(url) {
            Some(script) => script.fail,
            None => self.site.listing.fail_navigation,
        };
        if failing {
            return Err(ScrapeError::navigation(url, "net::ERR_CONNECTION_REFUSED"));
        }
        Ok(())
    }

    async fn query_listings(
        &self,
        _selectors: &ListingSelectors,
    ) -> Result<Vec<ListingFields>, ScrapeError> {
        let query = self.stats.listing_queries.fetch_add(1, Ordering::SeqCst);
        if self.site.listing.fail_query_at == Some(query) {
            return Err(ScrapeError::query("listings", "Execution context was destroyed"));
        }
        Ok(self.visible_listings())
    }

    async fn query_detail(&self, _selectors: &DetailSelectors) -> Result<DetailFields, ScrapeError> {
        let url = self.current_url();
        let script = self
            .site
            .details
            .get(&url)
            .ok_or_else(|| ScrapeError::query("detail", format!("no stub page for {url}")))?;
        tokio::time::sleep(script.delay).await;
        Ok(script.fields.clone())
    }

    async fn count_matches(&self, _selector: &str) -> Result<usize, ScrapeError> {
        Ok(self.visible_listings().len())
    }

    async fn control_state(&self, _selector: &str) -> Result<Option<ControlState>, ScrapeError> {
        let controls = &self.site.listing.controls;
        let revealed = self.revealed.load(Ordering::SeqCst);
        Ok(controls
            .get(revealed)
            .or_else(|| controls.last())
            .cloned()
            .flatten())
    }

    async fn activate(&self, _selector: &str) -> Result<(), ScrapeError> {
        self.revealed.fetch_add(1, Ordering::SeqCst);
        self.stats.activations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&self) -> Result<(), ScrapeError> {
        self.stats.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// A rendered, enabled "load more" button.
pub fn clickable() -> ControlState {
    ControlState {
        width: 120.0,
        height: 40.0,
        disabled: false,
    }
}

pub fn item(name: &str, price: &str) -> ListingFields {
    let slug = name.to_ascii_lowercase().replace(' ', "-");
    ListingFields {
        name: Some(name.to_owned()),
        price: Some(price.to_owned()),
        image: Some(format!("https://shop.test/img/{slug}.webp")),
        link: Some(format!("https://shop.test/products/{slug}")),
    }
}

pub fn detail(title: &str, price: &str) -> DetailFields {
    DetailFields {
        title: Some(title.to_owned()),
        price: Some(price.to_owned()),
        description: Some(format!("{title} description")),
        sku: Some(format!("SKU-{}", title.len())),
        category: Some("Category: Tops".to_owned()),
    }
}
