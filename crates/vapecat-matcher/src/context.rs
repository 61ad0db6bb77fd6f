use std::fmt;
use std::sync::Arc;

use vapecat_core::{NormalizeRules, RawListing, Registry};

use crate::brand::{BrandResolution, BrandResolver};
use crate::key::{token_sort_key, ProductKey, SpacingCorrector};
use crate::normalize::Normalizer;

/// Per-run matching state: the normalizer, a brand registry snapshot and the
/// optional spacing corrector. Built once per run and shared read-only.
#[derive(Clone)]
pub struct MatchContext {
    normalizer: Normalizer,
    resolver: BrandResolver,
    unknown_brand_id: i64,
    spacing: Option<Arc<dyn SpacingCorrector>>,
}

impl fmt::Debug for MatchContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MatchContext")
            .field("brands", &self.resolver.brand_count())
            .field("unknown_brand_id", &self.unknown_brand_id)
            .field("spacing_corrector", &self.spacing.is_some())
            .finish_non_exhaustive()
    }
}

impl MatchContext {
    #[must_use]
    pub fn new(rules: &NormalizeRules, brands: &Registry, unknown_brand_id: i64) -> Self {
        let normalizer = Normalizer::new(rules);
        let resolver = BrandResolver::new(brands, normalizer.clone());
        Self {
            normalizer,
            resolver,
            unknown_brand_id,
            spacing: None,
        }
    }

    #[must_use]
    pub fn with_spacing_corrector(mut self, corrector: Arc<dyn SpacingCorrector>) -> Self {
        self.spacing = Some(corrector);
        self
    }

    #[must_use]
    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    #[must_use]
    pub fn unknown_brand_id(&self) -> i64 {
        self.unknown_brand_id
    }

    #[must_use]
    pub fn normalize(&self, title: &str) -> String {
        self.normalizer.normalize(title)
    }

    /// Resolve the brand of an already-normalized title.
    #[must_use]
    pub fn resolve_brand(&self, normalized_title: &str) -> BrandResolution {
        self.resolver.resolve(normalized_title)
    }

    /// Strict identity key for a raw listing, or `None` when the listing
    /// belongs in the unresolved bucket.
    #[must_use]
    pub fn build_key(&self, listing: &RawListing) -> Option<ProductKey> {
        let normalized = self.normalize(&listing.title);
        let resolution = self.resolve_brand(&normalized);
        let key =
            ProductKey::from_resolution(&resolution, &listing.product_type, self.unknown_brand_id);
        if key.is_none() {
            tracing::debug!(
                title = %listing.title,
                url = %listing.url,
                normalized = %normalized,
                "listing has no canonical key"
            );
        }
        key
    }

    /// Grouping name stored on product rows, derived from the visible name.
    #[must_use]
    pub fn grouping_name(&self, visible_name: &str) -> String {
        match &self.spacing {
            Some(corrector) => token_sort_key(&corrector.correct(visible_name)),
            None => token_sort_key(visible_name),
        }
    }
}
