//! Title normalization rules: stoplist, alias table and redundant terms.
//!
//! The rules are data, not logic. [`NormalizeRules::default`] carries the
//! production table; `config/normalize.yaml` holds the same table in a form
//! operators can edit.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// A literal substitution applied to lowercased titles.
///
/// The guard fields cover the cases a regex engine would express with
/// anchors or negative lookahead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasRule {
    pub from: String,
    pub to: String,
    /// Skip an occurrence when the text right after it starts with this.
    #[serde(default)]
    pub not_followed_by: Option<String>,
    /// Skip an occurrence when the text right after it starts with whitespace.
    #[serde(default)]
    pub not_followed_by_whitespace: bool,
    /// Only match at the very start of the title.
    #[serde(default)]
    pub at_start: bool,
}

impl AliasRule {
    #[must_use]
    pub fn new(from: &str, to: &str) -> Self {
        Self {
            from: from.to_string(),
            to: to.to_string(),
            not_followed_by: None,
            not_followed_by_whitespace: false,
            at_start: false,
        }
    }

    #[must_use]
    pub fn unless_followed_by(mut self, suffix: &str) -> Self {
        self.not_followed_by = Some(suffix.to_string());
        self
    }

    #[must_use]
    pub fn unless_followed_by_whitespace(mut self) -> Self {
        self.not_followed_by_whitespace = true;
        self
    }

    #[must_use]
    pub fn anchored(mut self) -> Self {
        self.at_start = true;
        self
    }

    /// Returns `true` when an occurrence followed by `rest` must be left alone.
    #[must_use]
    pub fn is_blocked_by(&self, rest: &str) -> bool {
        if let Some(suffix) = &self.not_followed_by {
            if rest.starts_with(suffix.as_str()) {
                return true;
            }
        }
        self.not_followed_by_whitespace && rest.starts_with(char::is_whitespace)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizeRules {
    /// Boilerplate tokens removed verbatim from titles.
    #[serde(default)]
    pub stopwords: Vec<String>,
    /// Brand and spelling unifications, applied in order.
    #[serde(default)]
    pub aliases: Vec<AliasRule>,
    /// Generic qualifiers stripped from the brand residual.
    #[serde(default)]
    pub redundant_terms: Vec<String>,
}

impl Default for NormalizeRules {
    fn default() -> Self {
        let stopwords = [
            "정품", "새상품", "입호흡", "폐호흡", "액상샵", "특가", "할인", "rs니코틴", "s니코틴",
            "★", "blvk", "저농도",
        ];

        Self {
            stopwords: stopwords.iter().map(ToString::to_string).collect(),
            aliases: vec![
                AliasRule::new("juice box", "juicebox"),
                AliasRule::new("플렉스 x", "플렉스x"),
                AliasRule::new("nasty", "네스티"),
                AliasRule::new("must", "머스트"),
                AliasRule::new("vip", "vip쥬스").unless_followed_by("쥬스"),
                AliasRule::new("알케마스터", "알케마스터 ").unless_followed_by_whitespace(),
                AliasRule::new("레인보우 리퀴드", "레인보우리퀴드"),
                AliasRule::new("mint", "민트"),
                AliasRule::new("fuji", "후지"),
                AliasRule::new("new ", "").anchored(),
            ],
            redundant_terms: vec!["액상".to_string()],
        }
    }
}

/// Load and validate normalization rules from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_rules(path: &Path) -> Result<NormalizeRules, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::RulesFileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    let rules: NormalizeRules = serde_yaml::from_str(&content)?;
    validate_rules(&rules)?;

    Ok(rules)
}

fn validate_rules(rules: &NormalizeRules) -> Result<(), ConfigError> {
    if rules.stopwords.iter().any(|w| w.is_empty()) {
        return Err(ConfigError::Validation(
            "stopwords must be non-empty strings".to_string(),
        ));
    }

    if rules.redundant_terms.iter().any(|w| w.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "redundant terms must be non-empty strings".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for alias in &rules.aliases {
        if alias.from.is_empty() {
            return Err(ConfigError::Validation(format!(
                "alias to '{}' has an empty pattern",
                alias.to
            )));
        }
        if alias.not_followed_by.as_deref() == Some("") {
            return Err(ConfigError::Validation(format!(
                "alias '{}' has an empty not_followed_by guard",
                alias.from
            )));
        }
        if !seen.insert((alias.from.as_str(), alias.at_start)) {
            return Err(ConfigError::Validation(format!(
                "duplicate alias pattern: '{}'",
                alias.from
            )));
        }
    }

    Ok(())
}
