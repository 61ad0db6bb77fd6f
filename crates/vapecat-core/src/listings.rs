//! Raw listings produced by the per-site scrapers, and the loader for the
//! result files they write.
//!
//! Each scraper run writes `<seller-key>_<timestamp>.json`, an object mapping
//! a category label to an array of listing objects. Missing fields are
//! tolerated with a warning; a malformed file is logged and skipped.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Placeholder the scrapers emit when a field could not be extracted.
const MISSING_MARKER: &str = "N/A";

/// One scraped observation of a product at one seller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawListing {
    pub title: String,
    /// Whole currency units; `0` when the scraper could not read a price.
    pub price: i64,
    /// Seller-specific product link. Empty when the scraper found none.
    pub url: String,
    pub image_url: Option<String>,
    /// Seller key taken from the result file name, e.g. `"액상99"`.
    pub source_file: String,
    /// Category label the listing was scraped under, e.g. `"입호흡"`.
    pub product_type: String,
}

/// Listings keyed by category label, in stable key order.
pub type ListingsByCategory = BTreeMap<String, Vec<RawListing>>;

#[derive(Debug, Default)]
pub struct LoadedListings {
    pub by_category: ListingsByCategory,
    /// Result files that were read successfully.
    pub files: Vec<PathBuf>,
}

impl LoadedListings {
    #[must_use]
    pub fn listing_count(&self) -> usize {
        self.by_category.values().map(Vec::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.listing_count() == 0
    }
}

/// The price field as scrapers emit it: usually an integer, occasionally a
/// formatted string such as `"15,000원"`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PriceField {
    Number(i64),
    Float(f64),
    Text(String),
}

#[derive(Debug, Deserialize)]
struct ScrapedRecord {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    price: Option<PriceField>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    image_url: Option<String>,
}

/// Derive the seller key from a result file name: the part of the stem
/// before the first `_`.
#[must_use]
pub fn seller_key_from_path(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_str()?;
    let key = stem.split('_').next().unwrap_or(stem).trim();
    if key.is_empty() {
        None
    } else {
        Some(key.to_string())
    }
}

/// Parse the contents of one result file.
///
/// Categories whose value is not an array are ignored, as are individual
/// records that are not objects.
///
/// # Errors
///
/// Returns [`serde_json::Error`] when the file is not a JSON object.
pub fn parse_results_file(
    seller_key: &str,
    content: &str,
) -> Result<ListingsByCategory, serde_json::Error> {
    let raw: BTreeMap<String, serde_json::Value> = serde_json::from_str(content)?;
    let mut by_category = ListingsByCategory::new();

    for (category, value) in raw {
        let serde_json::Value::Array(records) = value else {
            tracing::warn!(
                seller = seller_key,
                %category,
                "category value is not a list; skipping"
            );
            continue;
        };

        let listings = by_category.entry(category.clone()).or_default();
        for (index, record) in records.into_iter().enumerate() {
            match serde_json::from_value::<ScrapedRecord>(record) {
                Ok(record) => listings.push(into_listing(record, seller_key, &category)),
                Err(e) => {
                    tracing::warn!(
                        seller = seller_key,
                        %category,
                        index,
                        error = %e,
                        "skipping malformed listing"
                    );
                }
            }
        }
    }

    Ok(by_category)
}

fn into_listing(record: ScrapedRecord, seller_key: &str, category: &str) -> RawListing {
    let title = present(record.title).unwrap_or_default();
    let url = present(record.url).unwrap_or_default();
    let image_url = present(record.image_url);

    if title.is_empty() {
        tracing::warn!(seller = seller_key, %url, "listing has no title");
    }
    if url.is_empty() {
        tracing::warn!(seller = seller_key, %title, "listing has no url");
    }

    let price = match record.price {
        Some(field) => parse_price(&field).unwrap_or_else(|| {
            tracing::warn!(
                seller = seller_key,
                %title,
                %url,
                price = ?field,
                "unreadable price; using 0"
            );
            0
        }),
        None => {
            tracing::warn!(seller = seller_key, %title, %url, "listing has no price; using 0");
            0
        }
    };

    RawListing {
        title,
        price,
        url,
        image_url,
        source_file: seller_key.to_string(),
        product_type: category.to_string(),
    }
}

/// Treat empty strings and the scrapers' `"N/A"` marker as absent.
fn present(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty() && v != MISSING_MARKER)
}

#[allow(clippy::cast_possible_truncation)]
fn parse_price(field: &PriceField) -> Option<i64> {
    let value = match field {
        PriceField::Number(n) => *n,
        PriceField::Float(f) if f.is_finite() => f.round() as i64,
        PriceField::Float(_) => return None,
        PriceField::Text(text) => {
            let digits: String = text
                .chars()
                .filter(|c| !matches!(c, ',' | '원' | '₩') && !c.is_whitespace())
                .collect();
            digits.parse::<i64>().ok()?
        }
    };
    (value >= 0).then_some(value)
}

/// Load every `*.json` result file in `dir`, in file-name order.
///
/// Unreadable or malformed files are logged and skipped.
///
/// # Errors
///
/// Returns [`ConfigError::ResultsDirIo`] if the directory itself cannot be read.
pub fn load_results_dir(dir: &Path) -> Result<LoadedListings, ConfigError> {
    let io_err = |source| ConfigError::ResultsDirIo {
        path: dir.display().to_string(),
        source,
    };

    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
            paths.push(path);
        }
    }
    paths.sort();

    let mut loaded = LoadedListings::default();
    for path in paths {
        let Some(seller_key) = seller_key_from_path(&path) else {
            tracing::warn!(path = %path.display(), "cannot derive seller from file name; skipping");
            continue;
        };

        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "failed to read result file");
                continue;
            }
        };

        match parse_results_file(&seller_key, &content) {
            Ok(by_category) => {
                let count: usize = by_category.values().map(Vec::len).sum();
                tracing::info!(
                    path = %path.display(),
                    seller = %seller_key,
                    count,
                    "loaded result file"
                );
                for (category, listings) in by_category {
                    loaded.by_category.entry(category).or_default().extend(listings);
                }
                loaded.files.push(path);
            }
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "failed to decode result file");
            }
        }
    }

    Ok(loaded)
}
