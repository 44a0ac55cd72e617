use serde::{Deserialize, Serialize};

/// Filler for any field whose element is absent from the rendered document.
pub const NOT_AVAILABLE: &str = "N/A";

/// One product card as rendered on the listing page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingRecord {
    pub name: String,
    pub price: String,
    pub image: String,
    pub link: String,
}

/// Raw projection result for a listing card; `None` means the element was not found.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingFields {
    pub name: Option<String>,
    pub price: Option<String>,
    pub image: Option<String>,
    pub link: Option<String>,
}

impl From<ListingFields> for ListingRecord {
    fn from(fields: ListingFields) -> Self {
        Self {
            name: or_not_available(fields.name),
            price: or_not_available(fields.price),
            image: or_not_available(fields.image),
            link: or_not_available(fields.link),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedProduct {
    pub name: String,
    pub price: f64,
    pub image: String,
    pub link: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailRecord {
    pub title: String,
    pub price: String,
    pub description: String,
    pub sku: String,
    pub category: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailFields {
    pub title: Option<String>,
    pub price: Option<String>,
    pub description: Option<String>,
    pub sku: Option<String>,
    pub category: Option<String>,
}

impl From<DetailFields> for DetailRecord {
    fn from(fields: DetailFields) -> Self {
        Self {
            title: or_not_available(fields.title),
            price: or_not_available(fields.price),
            description: or_not_available(fields.description),
            sku: or_not_available(fields.sku),
            category: or_not_available(fields.category),
        }
    }
}

/// Result of enriching a single product; position in the batch matches the input product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DetailOutcome {
    Fetched(DetailRecord),
    Failed { link: String, error: String },
}

impl DetailOutcome {
    pub fn detail(&self) -> Option<&DetailRecord> {
        match self {
            Self::Fetched(detail) => Some(detail),
            Self::Failed { .. } => None,
        }
    }
}

/// Sidecar written next to the listing table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingArtifactMeta {
    pub format: String,
    pub version: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    pub records: usize,
    pub written_at: String,
}

// Empty text counts as absent, matching what `innerText || "N/A"` yields in the page.
fn or_not_available(value: Option<String>) -> String {
    match value {
        Some(value) if !value.is_empty() => value,
        _ => NOT_AVAILABLE.to_owned(),
    }
}
