use std::collections::HashSet;

use crate::error::ScrapeError;
use crate::formats::{ListingRecord, RankedProduct};

/// Parses a currency-formatted price such as `"$1,299.00"` into `1299.0`.
pub fn parse_price(raw: &str) -> Result<f64, ScrapeError> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    cleaned
        .parse::<f64>()
        .map_err(|_| ScrapeError::MalformedPrice {
            raw: raw.to_owned(),
        })
}

impl TryFrom<&ListingRecord> for RankedProduct {
    type Error = ScrapeError;

    fn try_from(record: &ListingRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            name: record.name.clone(),
            price: parse_price(&record.price)?,
            image: record.image.clone(),
            link: record.link.clone(),
        })
    }
}

/// Keeps the first record seen for each distinct price, then returns the `n` most expensive.
///
/// Records whose price cannot be parsed are skipped with a warning.
pub fn rank(records: &[ListingRecord], n: usize) -> Vec<RankedProduct> {
    let mut unique: Vec<RankedProduct> = Vec::new();
    let mut seen_prices: HashSet<u64> = HashSet::new();

    for (index, record) in records.iter().enumerate() {
        let product = match RankedProduct::try_from(record) {
            Ok(product) => product,
            Err(err) => {
                tracing::warn!(index, name = %record.name, error = %err, "skipping listing");
                continue;
            }
        };

        if seen_prices.insert(price_key(product.price)) {
            unique.push(product);
        }
    }

    unique.sort_by(|a, b| b.price.total_cmp(&a.price));
    unique.truncate(n);
    unique
}

// Bit pattern identity, with -0 folded into 0 so both spell one price.
fn price_key(price: f64) -> u64 {
    if price == 0.0 { 0.0f64.to_bits() } else { price.to_bits() }
}
