//! Brand extraction from normalized titles.

use vapecat_core::Registry;

use crate::normalize::Normalizer;

/// Outcome of matching a title against the brand registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrandMatch {
    /// The title starts with a registered brand name.
    Known { id: i64, name: String },
    /// No registered brand matched; the first title token stands in.
    Inferred { name: String },
    /// No registered brand matched and the title is a single token.
    Unknown,
}

impl BrandMatch {
    /// Registry id for known brands.
    #[must_use]
    pub fn id(&self) -> Option<i64> {
        match self {
            BrandMatch::Known { id, .. } => Some(*id),
            _ => None,
        }
    }

    /// Brand name as it should appear in grouping keys, if any.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        match self {
            BrandMatch::Known { name, .. } | BrandMatch::Inferred { name } => Some(name),
            BrandMatch::Unknown => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrandResolution {
    pub brand: BrandMatch,
    /// What is left of the title once the brand is removed.
    pub residual: String,
}

impl BrandResolution {
    /// A listing is identifiable only with some brand and a non-empty residual.
    #[must_use]
    pub fn has_identity(&self) -> bool {
        !self.residual.is_empty() && self.brand != BrandMatch::Unknown
    }
}

#[derive(Debug, Clone)]
struct Candidate {
    id: i64,
    name: String,
    lowered: String,
}

/// Longest-match-first brand resolver over a registry snapshot.
#[derive(Debug, Clone)]
pub struct BrandResolver {
    candidates: Vec<Candidate>,
    normalizer: Normalizer,
}

impl BrandResolver {
    /// Snapshot the registry, ordered so that longer names are tried first.
    /// Ties are broken by name so the order is stable across runs.
    #[must_use]
    pub fn new(brands: &Registry, normalizer: Normalizer) -> Self {
        let mut candidates: Vec<Candidate> = brands
            .iter()
            .filter(|entry| !entry.name.trim().is_empty())
            .map(|entry| Candidate {
                id: entry.id,
                name: entry.name.clone(),
                lowered: entry.name.to_lowercase(),
            })
            .collect();

        candidates.sort_by(|a, b| {
            b.lowered
                .chars()
                .count()
                .cmp(&a.lowered.chars().count())
                .then_with(|| a.lowered.cmp(&b.lowered))
        });

        Self {
            candidates,
            normalizer,
        }
    }

    #[must_use]
    pub fn brand_count(&self) -> usize {
        self.candidates.len()
    }

    /// Resolve the brand of an already-normalized title.
    #[must_use]
    pub fn resolve(&self, normalized_title: &str) -> BrandResolution {
        let lowered = normalized_title.to_lowercase();

        for candidate in &self.candidates {
            if let Some(rest) = lowered.strip_prefix(candidate.lowered.as_str()) {
                return BrandResolution {
                    brand: BrandMatch::Known {
                        id: candidate.id,
                        name: candidate.name.clone(),
                    },
                    residual: self.normalizer.strip_redundant_terms(rest),
                };
            }
        }

        let core = self.normalizer.strip_redundant_terms(&lowered);
        tracing::warn!(title = normalized_title, core = %core, "no known brand matched");

        match core.split_once(' ') {
            Some((first, rest)) => BrandResolution {
                brand: BrandMatch::Inferred {
                    name: first.to_string(),
                },
                residual: rest.trim().to_string(),
            },
            None => BrandResolution {
                brand: BrandMatch::Unknown,
                residual: core,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use vapecat_core::RegistryEntry;

    use super::*;

    fn resolver(names: &[(i64, &str)]) -> BrandResolver {
        let registry = Registry::from_entries(names.iter().map(|(id, name)| RegistryEntry {
            id: *id,
            name: (*name).to_string(),
        }));
        BrandResolver::new(&registry, Normalizer::default())
    }

    #[test]
    fn longest_brand_wins() {
        let resolver = resolver(&[(1, "VIP"), (2, "VIP쥬스")]);
        let resolution = resolver.resolve("vip쥬스 망고");
        assert_eq!(
            resolution.brand,
            BrandMatch::Known {
                id: 2,
                name: "VIP쥬스".to_string()
            }
        );
        assert_eq!(resolution.residual, "망고");
    }

    #[test]
    fn match_is_case_insensitive() {
        let resolver = resolver(&[(3, "Juicebox")]);
        let resolution = resolver.resolve("juicebox 후지");
        assert_eq!(resolution.brand.id(), Some(3));
        assert_eq!(resolution.residual, "후지");
    }

    #[test]
    fn brand_must_be_a_prefix() {
        let resolver = resolver(&[(4, "네스티")]);
        let resolution = resolver.resolve("쿨 네스티 민트");
        assert_eq!(
            resolution.brand,
            BrandMatch::Inferred {
                name: "쿨".to_string()
            }
        );
        assert_eq!(resolution.residual, "네스티 민트");
    }

    #[test]
    fn brand_is_removed_once() {
        let resolver = resolver(&[(5, "펠릭스")]);
        let resolution = resolver.resolve("펠릭스 펠릭스 라임");
        assert_eq!(resolution.residual, "펠릭스 라임");
    }

    #[test]
    fn redundant_terms_are_stripped_from_residual() {
        let resolver = resolver(&[(6, "네스티")]);
        let resolution = resolver.resolve("네스티 민트 액상");
        assert_eq!(resolution.residual, "민트");
    }

    #[test]
    fn single_token_without_brand_is_unknown() {
        let resolver = resolver(&[(7, "네스티")]);
        let resolution = resolver.resolve("라임");
        assert_eq!(resolution.brand, BrandMatch::Unknown);
        assert!(!resolution.has_identity());
    }

    #[test]
    fn empty_residual_has_no_identity() {
        let resolver = resolver(&[(8, "네스티")]);
        let resolution = resolver.resolve("네스티 액상");
        assert_eq!(resolution.brand.id(), Some(8));
        assert!(resolution.residual.is_empty());
        assert!(!resolution.has_identity());
    }

    #[test]
    fn empty_registry_names_are_ignored() {
        let resolver = resolver(&[(9, ""), (10, "네스티")]);
        assert_eq!(resolver.brand_count(), 1);
        assert_eq!(resolver.resolve("네스티 민트").brand.id(), Some(10));
    }

    #[test]
    fn brand_match_name_accessor() {
        assert_eq!(
            BrandMatch::Inferred {
                name: "쿨".to_string()
            }
            .name(),
            Some("쿨")
        );
        assert_eq!(BrandMatch::Unknown.name(), None);
    }
}
