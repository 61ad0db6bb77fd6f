//! Canonical keys: the exact-match identity tuple used by strict grouping,
//! and the token-sorted grouping name stored on product rows.

use crate::brand::{BrandMatch, BrandResolution};

/// Exact identity of a listing on the strict path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProductKey {
    pub brand_id: i64,
    pub brand_name: String,
    pub core: String,
    pub product_type: String,
}

impl ProductKey {
    /// Build a key from a brand resolution.
    ///
    /// Returns `None` when the brand is unknown or nothing remains after brand
    /// removal. Inferred brands carry `unknown_brand_id` and are told apart by
    /// their name.
    #[must_use]
    pub fn from_resolution(
        resolution: &BrandResolution,
        product_type: &str,
        unknown_brand_id: i64,
    ) -> Option<Self> {
        if !resolution.has_identity() {
            return None;
        }

        let (brand_id, brand_name) = match &resolution.brand {
            BrandMatch::Known { id, name } => (*id, name.to_lowercase()),
            BrandMatch::Inferred { name } => (unknown_brand_id, name.to_lowercase()),
            BrandMatch::Unknown => return None,
        };

        Some(Self {
            brand_id,
            brand_name,
            core: resolution.residual.to_lowercase(),
            product_type: product_type.trim().to_lowercase(),
        })
    }
}

/// Optional language-specific spacing fix applied before token sorting.
///
/// Grouping must stay correct without one, so implementations are free to be
/// lossy or to return the input unchanged.
pub trait SpacingCorrector: Send + Sync {
    fn correct(&self, text: &str) -> String;
}

/// Order-independent grouping name.
///
/// Keeps letters, digits and whitespace, lowercases, then sorts the tokens in
/// descending order.
#[must_use]
pub fn token_sort_key(text: &str) -> String {
    let cleaned: String = text
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect::<String>()
        .to_lowercase();

    let mut tokens: Vec<&str> = cleaned.split_whitespace().collect();
    tokens.sort_unstable_by(|a, b| b.cmp(a));
    tokens.join(" ")
}
