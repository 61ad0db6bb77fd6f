//! Edit-distance similarity and the cheap pre-filters run before it.

use std::collections::HashSet;

/// Normalized Levenshtein similarity: `1 - distance / max(len)`, counted in
/// chars. Two empty strings are identical; one empty string matches nothing.
#[must_use]
pub fn similarity(a: &str, b: &str) -> f64 {
    let a_len = a.chars().count();
    let b_len = b.chars().count();
    match (a_len, b_len) {
        (0, 0) => 1.0,
        (0, _) | (_, 0) => 0.0,
        _ => {
            let distance = strsim::levenshtein(a, b);
            #[allow(clippy::cast_precision_loss)]
            let ratio = distance as f64 / a_len.max(b_len) as f64;
            1.0 - ratio
        }
    }
}

/// Relative length difference, `|a - b| / max(a, b)`, zero for two empty
/// strings.
#[must_use]
pub fn length_difference(a_len: usize, b_len: usize) -> f64 {
    let longest = a_len.max(b_len);
    if longest == 0 {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let diff = a_len.abs_diff(b_len) as f64 / longest as f64;
    diff
}

/// Jaccard index of two character sets, 1.0 when both are empty.
#[must_use]
pub fn charset_jaccard(a: &HashSet<char>, b: &HashSet<char>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 1.0;
    }
    let intersection = a.intersection(b).count();
    #[allow(clippy::cast_precision_loss)]
    let jaccard = intersection as f64 / union as f64;
    jaccard
}

/// A normalized title with the pieces the pre-filters need computed once.
#[derive(Debug, Clone)]
pub(crate) struct Profile {
    pub(crate) text: String,
    pub(crate) len: usize,
    pub(crate) chars: HashSet<char>,
}

impl Profile {
    pub(crate) fn new(text: String) -> Self {
        let len = text.chars().count();
        let chars = text.chars().collect();
        Self { text, len, chars }
    }

    /// Both cheap filters: length ratio first, then character overlap.
    pub(crate) fn may_match(
        &self,
        other: &Profile,
        max_length_ratio: f64,
        min_jaccard: f64,
    ) -> bool {
        length_difference(self.len, other.len) <= max_length_ratio
            && charset_jaccard(&self.chars, &other.chars) >= min_jaccard
    }
}
