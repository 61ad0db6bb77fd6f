//! Listing grouping: the fuzzy similarity path and the strict key path.
//!
//! Fuzzy grouping is greedy and order dependent. Listing `i`, if still
//! unclaimed when its turn comes, claims every unclaimed later listing whose
//! normalized title scores at or above the threshold. The relation is not
//! closed transitively: `a ~ b` and `b ~ c` does not put `a` and `c`
//! together unless `a` reaches `c` directly.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use rayon::prelude::*;
use vapecat_core::{AppConfig, ListingsByCategory, RawListing};

use crate::context::MatchContext;
use crate::error::MatchError;
use crate::key::ProductKey;
use crate::normalize::Normalizer;
use crate::similarity::{similarity, Profile};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroupingConfig {
    /// Minimum similarity, in `(0, 1]`, for two listings to share a group.
    pub threshold: f64,
    /// Maximum relative length difference allowed before scoring.
    pub max_length_ratio: f64,
    /// Minimum character-set Jaccard index allowed before scoring.
    pub min_charset_jaccard: f64,
    /// Seeds whose candidate lists are computed in one parallel pass.
    pub batch_size: usize,
}

impl Default for GroupingConfig {
    fn default() -> Self {
        Self {
            threshold: 0.95,
            max_length_ratio: 0.3,
            min_charset_jaccard: 0.5,
            batch_size: 64,
        }
    }
}

impl GroupingConfig {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            threshold: config.similarity_threshold,
            max_length_ratio: config.max_length_ratio,
            min_charset_jaccard: config.min_charset_jaccard,
            batch_size: config.grouping_batch_size,
        }
    }

    #[must_use]
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    /// # Errors
    ///
    /// Returns [`MatchError`] when a parameter is out of range.
    pub fn validate(&self) -> Result<(), MatchError> {
        if !(self.threshold > 0.0 && self.threshold <= 1.0) {
            return Err(MatchError::InvalidThreshold(self.threshold));
        }
        if !(0.0..=1.0).contains(&self.max_length_ratio) {
            return Err(MatchError::InvalidLengthRatio(self.max_length_ratio));
        }
        if !(0.0..=1.0).contains(&self.min_charset_jaccard) {
            return Err(MatchError::InvalidJaccard(self.min_charset_jaccard));
        }
        if self.batch_size == 0 {
            return Err(MatchError::InvalidBatchSize);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Shared per-category state
// ---------------------------------------------------------------------------

/// Which listings already belong to a group. Claiming is a single atomic
/// check-and-mark, so a listing can never be handed to two groups.
struct ClaimSet {
    slots: Vec<AtomicBool>,
}

impl ClaimSet {
    fn new(len: usize) -> Self {
        Self {
            slots: (0..len).map(|_| AtomicBool::new(false)).collect(),
        }
    }

    fn is_claimed(&self, index: usize) -> bool {
        self.slots[index].load(Ordering::Acquire)
    }

    fn try_claim(&self, index: usize) -> bool {
        self.slots[index]
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

/// Similarity scores keyed by unordered pairs of distinct normalized titles.
/// Repeated titles intern to one id, so duplicates across sellers are
/// scored once.
struct PairMemo {
    scores: Mutex<HashMap<(usize, usize), f64>>,
}

impl PairMemo {
    fn new() -> Self {
        Self {
            scores: Mutex::new(HashMap::new()),
        }
    }

    fn score(&self, a_id: usize, a: &str, b_id: usize, b: &str) -> f64 {
        if a_id == b_id {
            return 1.0;
        }
        let key = (a_id.min(b_id), a_id.max(b_id));
        if let Some(score) = self
            .scores
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return *score;
        }

        let score = similarity(a, b);
        self.scores
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, score);
        score
    }

    fn len(&self) -> usize {
        self.scores
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

// ---------------------------------------------------------------------------
// Fuzzy path
// ---------------------------------------------------------------------------

/// Partition every listing into similarity groups, category by category.
///
/// Categories are processed in parallel; the output keeps category order
/// and, within a category, seed order.
///
/// # Errors
///
/// Returns [`MatchError`] when `config` is invalid.
pub fn group_by_similarity(
    normalizer: &Normalizer,
    listings: &ListingsByCategory,
    config: &GroupingConfig,
) -> Result<Vec<Vec<RawListing>>, MatchError> {
    config.validate()?;

    let categories: Vec<(&String, &Vec<RawListing>)> = listings.iter().collect();
    let per_category: Vec<Vec<Vec<RawListing>>> = categories
        .par_iter()
        .map(|(category, items)| {
            let groups = group_category(normalizer, items, config);
            tracing::debug!(
                category = %category,
                listings = items.len(),
                groups = groups.len(),
                "grouped category"
            );
            groups
        })
        .collect();

    Ok(per_category.into_iter().flatten().collect())
}

fn group_category(
    normalizer: &Normalizer,
    listings: &[RawListing],
    config: &GroupingConfig,
) -> Vec<Vec<RawListing>> {
    let profiles: Vec<Profile> = listings
        .par_iter()
        .map(|listing| Profile::new(normalizer.normalize(&listing.title)))
        .collect();

    let mut interned: HashMap<&str, usize> = HashMap::new();
    let ids: Vec<usize> = profiles
        .iter()
        .map(|profile| {
            let next = interned.len();
            *interned.entry(profile.text.as_str()).or_insert(next)
        })
        .collect();

    let claims = ClaimSet::new(listings.len());
    let memo = PairMemo::new();
    let mut groups: Vec<Vec<usize>> = Vec::new();

    let candidates_for = |seed: usize| -> Vec<usize> {
        let seed_profile = &profiles[seed];
        ((seed + 1)..listings.len())
            .filter(|&other| !claims.is_claimed(other))
            .filter(|&other| {
                seed_profile.may_match(
                    &profiles[other],
                    config.max_length_ratio,
                    config.min_charset_jaccard,
                )
            })
            .filter(|&other| {
                memo.score(ids[seed], &seed_profile.text, ids[other], &profiles[other].text)
                    >= config.threshold
            })
            .collect()
    };

    let mut start = 0;
    while start < listings.len() {
        let end = (start + config.batch_size).min(listings.len());

        // Scores for the whole batch are computed against the claims as they
        // stood when the batch began; claiming below is sequential in seed
        // order, which keeps the result identical to a one-at-a-time pass.
        let batch: Vec<(usize, Vec<usize>)> = (start..end)
            .into_par_iter()
            .filter(|&seed| !claims.is_claimed(seed))
            .map(|seed| (seed, candidates_for(seed)))
            .collect();

        for (seed, matches) in batch {
            if !claims.try_claim(seed) {
                continue;
            }
            let mut group = vec![seed];
            group.extend(matches.into_iter().filter(|&other| claims.try_claim(other)));
            groups.push(group);
        }

        start = end;
    }

    tracing::trace!(
        listings = listings.len(),
        distinct_titles = interned.len(),
        scored_pairs = memo.len(),
        "similarity pass finished"
    );

    groups
        .into_iter()
        .map(|members| members.into_iter().map(|i| listings[i].clone()).collect())
        .collect()
}

// ---------------------------------------------------------------------------
// Strict path
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct KeyedGroup {
    pub key: ProductKey,
    pub listings: Vec<RawListing>,
}

/// Result of strict grouping. Listings without a key are kept apart and
/// never merged into a keyed group.
#[derive(Debug, Clone, Default)]
pub struct StrictGrouping {
    pub groups: Vec<KeyedGroup>,
    pub unresolved: Vec<RawListing>,
}

/// Group listings by exact [`ProductKey`] equality. Groups appear in the
/// order their first member was seen.
#[must_use]
pub fn group_by_key(ctx: &MatchContext, listings: &ListingsByCategory) -> StrictGrouping {
    let mut result = StrictGrouping::default();
    let mut index: HashMap<ProductKey, usize> = HashMap::new();

    for listing in listings.values().flatten() {
        let Some(key) = ctx.build_key(listing) else {
            result.unresolved.push(listing.clone());
            continue;
        };

        match index.get(&key) {
            Some(&position) => result.groups[position].listings.push(listing.clone()),
            None => {
                index.insert(key.clone(), result.groups.len());
                result.groups.push(KeyedGroup {
                    key,
                    listings: vec![listing.clone()],
                });
            }
        }
    }

    if !result.unresolved.is_empty() {
        tracing::warn!(
            unresolved = result.unresolved.len(),
            "listings without a canonical key were set aside"
        );
    }

    result
}

#[cfg(test)]
#[path = "group_test.rs"]
mod tests;
