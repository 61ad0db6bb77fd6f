//! Deterministic cleanup of raw listing titles.
//!
//! The pipeline order matters; later steps assume earlier ones ran:
//! lowercase, drop the `| seller` suffix, drop bracket characters, remove
//! stopwords, apply aliases, strip volume and nicotine annotations, collapse
//! whitespace.

use std::sync::LazyLock;

use regex::Regex;
use vapecat_core::{AliasRule, NormalizeRules};

static SELLER_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\|.*$").expect("valid seller suffix regex"));

static BRACKETS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\[\]()]").expect("valid bracket regex"));

// Alternation is leftmost-first, so `mg/ml` must precede `mg`.
static VOLUME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\d+\.?\d*\s*(?:mg/ml|mg|ml|%)").expect("valid volume regex")
});

static NICOTINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\d+(?:\.\d+)?\s*(?:mg/ml|mg|%|니코틴|rs-nic|s-nic)")
        .expect("valid nicotine regex")
});

/// Title normalizer built from a [`NormalizeRules`] table.
#[derive(Debug, Clone)]
pub struct Normalizer {
    stopwords: Vec<String>,
    aliases: Vec<AliasRule>,
    redundant_terms: Vec<String>,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(&NormalizeRules::default())
    }
}

impl Normalizer {
    #[must_use]
    pub fn new(rules: &NormalizeRules) -> Self {
        let aliases = rules
            .aliases
            .iter()
            .map(|alias| AliasRule {
                from: alias.from.to_lowercase(),
                to: alias.to.clone(),
                not_followed_by: alias.not_followed_by.as_ref().map(|s| s.to_lowercase()),
                not_followed_by_whitespace: alias.not_followed_by_whitespace,
                at_start: alias.at_start,
            })
            .collect();

        Self {
            stopwords: rules.stopwords.iter().map(|w| w.to_lowercase()).collect(),
            aliases,
            redundant_terms: rules
                .redundant_terms
                .iter()
                .map(|w| w.to_lowercase())
                .collect(),
        }
    }

    /// Normalize a raw listing title. Empty input yields an empty string.
    #[must_use]
    pub fn normalize(&self, title: &str) -> String {
        if title.trim().is_empty() {
            return String::new();
        }

        let lowered = title.to_lowercase();
        let text = SELLER_SUFFIX.replace(&lowered, "");
        let mut text = BRACKETS.replace_all(&text, "").into_owned();

        for word in &self.stopwords {
            if text.contains(word.as_str()) {
                text = text.replace(word.as_str(), "");
            }
        }

        for alias in &self.aliases {
            text = apply_alias(&text, alias);
        }

        let text = VOLUME.replace_all(&text, "");
        let text = text.replace(" .", "").replace(" ,", "");
        let text = NICOTINE.replace_all(&text, "");

        collapse_whitespace(&text)
    }

    /// Remove generic qualifiers (e.g. `"액상"`) from a brand residual and
    /// tidy the whitespace left behind.
    #[must_use]
    pub fn strip_redundant_terms(&self, residual: &str) -> String {
        let mut text = residual.to_string();
        for term in &self.redundant_terms {
            text = text.replace(term.as_str(), "");
        }
        collapse_whitespace(&text)
    }
}

/// Collapse runs of whitespace to one space and trim both ends.
#[must_use]
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Replace every non-overlapping occurrence of `alias.from`, scanning left
/// to right, unless the alias guard blocks that occurrence.
fn apply_alias(text: &str, alias: &AliasRule) -> String {
    if alias.at_start {
        return match text.strip_prefix(alias.from.as_str()) {
            Some(rest) if !alias.is_blocked_by(rest) => format!("{}{rest}", alias.to),
            _ => text.to_string(),
        };
    }

    if !text.contains(alias.from.as_str()) {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len() + alias.to.len());
    let mut rest = text;
    while let Some(pos) = rest.find(alias.from.as_str()) {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + alias.from.len()..];
        if alias.is_blocked_by(after) {
            out.push_str(&alias.from);
        } else {
            out.push_str(&alias.to);
        }
        rest = after;
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalize(title: &str) -> String {
        Normalizer::default().normalize(title)
    }

    #[test]
    fn empty_input_is_empty() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("   "), "");
    }

    #[test]
    fn lowercases_and_collapses_whitespace() {
        assert_eq!(normalize("  Foo   BAR  "), "foo bar");
    }

    #[test]
    fn drops_seller_suffix_after_pipe() {
        assert_eq!(normalize("펠릭스 라임 | 액상99"), "펠릭스 라임");
    }

    #[test]
    fn drops_bracket_characters_but_keeps_contents() {
        assert_eq!(normalize("[펠릭스] (라임)"), "펠릭스 라임");
    }

    #[test]
    fn removes_stopwords() {
        assert_eq!(normalize("[정품] 펠릭스 라임 입호흡 특가"), "펠릭스 라임");
    }

    #[test]
    fn folds_aliases() {
        assert_eq!(normalize("NASTY Mint"), "네스티 민트");
        assert_eq!(normalize("Juice Box Fuji"), "juicebox 후지");
    }

    #[test]
    fn vip_alias_does_not_double_suffix() {
        assert_eq!(normalize("VIP 망고"), "vip쥬스 망고");
        assert_eq!(normalize("VIP쥬스 망고"), "vip쥬스 망고");
    }

    #[test]
    fn alchemaster_alias_inserts_space_once() {
        assert_eq!(normalize("알케마스터레몬"), "알케마스터 레몬");
        assert_eq!(normalize("알케마스터 레몬"), "알케마스터 레몬");
    }

    #[test]
    fn new_prefix_is_only_removed_at_start() {
        assert_eq!(normalize("NEW 펠릭스 라임"), "펠릭스 라임");
        assert_eq!(normalize("펠릭스 new 라임"), "펠릭스 new 라임");
    }

    #[test]
    fn strips_volume_annotations() {
        assert_eq!(normalize("네스티 민트 30ml"), "네스티 민트");
        assert_eq!(normalize("네스티 민트 30 ML 9.8mg/ml"), "네스티 민트");
        assert_eq!(normalize("펠릭스 라임 3%"), "펠릭스 라임");
    }

    #[test]
    fn strips_nicotine_annotations() {
        assert_eq!(normalize("펠릭스 라임 9.8니코틴"), "펠릭스 라임");
        assert_eq!(normalize("펠릭스 라임 20 s-nic"), "펠릭스 라임");
        assert_eq!(normalize("펠릭스 라임 20rs-nic"), "펠릭스 라임");
    }

    #[test]
    fn keeps_numbers_without_units() {
        assert_eq!(normalize("시즌 2 라임"), "시즌 2 라임");
    }

    #[test]
    fn drops_orphaned_punctuation() {
        assert_eq!(normalize("펠릭스 30ml , 라임"), "펠릭스 라임");
    }

    #[test]
    fn aliased_titles_converge() {
        assert_eq!(normalize("NASTY Mint 30ml"), normalize("네스티 민트 30ml"));
    }

    #[test]
    fn normalization_is_idempotent_on_samples() {
        let samples = [
            "NASTY Mint 30ml",
            "[정품] VIP 망고 30ml 9.8mg | 액상샵",
            "알케마스터레몬 (입호흡) 3%",
            "NEW Juice Box Fuji 60ml",
            "레인보우 리퀴드 블루베리 액상 30ml",
            "플렉스 X 쿨민트 20 s-nic",
            "★특가★ must 바닐라",
            "",
        ];
        let normalizer = Normalizer::default();
        for sample in samples {
            let once = normalizer.normalize(sample);
            let twice = normalizer.normalize(&once);
            assert_eq!(once, twice, "not idempotent for {sample:?}");
        }
    }

    #[test]
    fn custom_rules_are_honoured() {
        let rules = NormalizeRules {
            stopwords: vec!["Sale".to_string()],
            aliases: vec![AliasRule::new("Lime", "라임")],
            redundant_terms: vec![],
        };
        let normalizer = Normalizer::new(&rules);
        assert_eq!(normalizer.normalize("SALE Felix LIME"), "felix 라임");
    }

    #[test]
    fn strip_redundant_terms_removes_qualifier() {
        let normalizer = Normalizer::default();
        assert_eq!(normalizer.strip_redundant_terms("라임  액상 "), "라임");
    }
}
