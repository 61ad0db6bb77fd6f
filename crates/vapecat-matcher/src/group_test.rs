use std::collections::BTreeSet;

use vapecat_core::{NormalizeRules, Registry, RegistryEntry};

use super::*;

fn listing(title: &str, url: &str, category: &str) -> RawListing {
    RawListing {
        title: title.to_string(),
        price: 10_000,
        url: url.to_string(),
        image_url: None,
        source_file: "shop".to_string(),
        product_type: category.to_string(),
    }
}

fn by_category(items: &[(&str, &str, &str)]) -> ListingsByCategory {
    let mut map = ListingsByCategory::new();
    for (title, url, category) in items {
        map.entry((*category).to_string())
            .or_default()
            .push(listing(title, url, category));
    }
    map
}

fn urls(groups: &[Vec<RawListing>]) -> Vec<Vec<String>> {
    groups
        .iter()
        .map(|g| g.iter().map(|l| l.url.clone()).collect())
        .collect()
}

fn config(threshold: f64) -> GroupingConfig {
    GroupingConfig::default().with_threshold(threshold)
}

#[test]
fn similarity_exactly_at_threshold_groups() {
    let input = by_category(&[("abcd", "u1", "c"), ("abce", "u2", "c")]);
    let groups = group_by_similarity(&Normalizer::default(), &input, &config(0.75)).unwrap();
    assert_eq!(urls(&groups), vec![vec!["u1", "u2"]]);
}

#[test]
fn similarity_just_below_threshold_splits() {
    let input = by_category(&[("abcd", "u1", "c"), ("abce", "u2", "c")]);
    let groups = group_by_similarity(&Normalizer::default(), &input, &config(0.76)).unwrap();
    assert_eq!(urls(&groups), vec![vec!["u1"], vec!["u2"]]);
}

#[test]
fn alias_folded_titles_group_together() {
    let input = by_category(&[
        ("NASTY Mint 30ml", "u1", "입호흡"),
        ("네스티 민트 30ml", "u2", "입호흡"),
    ]);
    let groups = group_by_similarity(&Normalizer::default(), &input, &config(0.95)).unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].len(), 2);
}

#[test]
fn categories_never_mix() {
    let input = by_category(&[
        ("네스티 민트", "u1", "입호흡"),
        ("네스티 민트", "u2", "폐호흡"),
    ]);
    let groups = group_by_similarity(&Normalizer::default(), &input, &config(0.95)).unwrap();
    assert_eq!(groups.len(), 2);
}

#[test]
fn grouping_is_greedy_not_transitive() {
    // aaaa~aaab and aaab~aabb at 0.75, but aaaa and aabb only reach 0.5
    let input = by_category(&[
        ("aaaa", "u1", "c"),
        ("aaab", "u2", "c"),
        ("aabb", "u3", "c"),
    ]);
    let groups = group_by_similarity(&Normalizer::default(), &input, &config(0.75)).unwrap();
    assert_eq!(urls(&groups), vec![vec!["u1", "u2"], vec!["u3"]]);
}

#[test]
fn grouping_partitions_every_listing_once() {
    let titles = [
        "juicebox 후지",
        "Juice Box Fuji 60ml",
        "네스티 민트",
        "NASTY mint",
        "네스티 민트 아이스",
        "펠릭스 라임",
        "펠릭스 라임 3%",
        "라임",
        "",
        "",
        "vip 망고",
        "VIP쥬스 망고",
    ];
    let items: Vec<(String, String)> = titles
        .iter()
        .enumerate()
        .map(|(i, t)| ((*t).to_string(), format!("u{i}")))
        .collect();
    let mut input = ListingsByCategory::new();
    for (i, (title, url)) in items.iter().enumerate() {
        let category = if i % 3 == 0 { "a" } else { "b" };
        input
            .entry(category.to_string())
            .or_default()
            .push(listing(title, url, category));
    }

    for threshold in [0.5, 0.8, 0.95, 1.0] {
        let groups =
            group_by_similarity(&Normalizer::default(), &input, &config(threshold)).unwrap();
        let flat: Vec<String> = groups.iter().flatten().map(|l| l.url.clone()).collect();
        let unique: BTreeSet<&String> = flat.iter().collect();
        assert_eq!(flat.len(), items.len(), "threshold {threshold}");
        assert_eq!(unique.len(), items.len(), "threshold {threshold}");
        assert!(groups.iter().all(|g| !g.is_empty()));
    }
}

#[test]
fn batch_size_does_not_change_result() {
    let input = by_category(&[
        ("aaaa", "u1", "c"),
        ("aaab", "u2", "c"),
        ("aabb", "u3", "c"),
        ("abbb", "u4", "c"),
        ("bbbb", "u5", "c"),
        ("aaaa", "u6", "c"),
    ]);
    let reference = urls(
        &group_by_similarity(
            &Normalizer::default(),
            &input,
            &GroupingConfig {
                batch_size: 1,
                ..config(0.75)
            },
        )
        .unwrap(),
    );
    for batch_size in [2, 3, 64] {
        let groups = group_by_similarity(
            &Normalizer::default(),
            &input,
            &GroupingConfig {
                batch_size,
                ..config(0.75)
            },
        )
        .unwrap();
        assert_eq!(urls(&groups), reference, "batch size {batch_size}");
    }
}

#[test]
fn empty_titles_group_with_each_other() {
    let input = by_category(&[("", "u1", "c"), ("★", "u2", "c"), ("abc", "u3", "c")]);
    let groups = group_by_similarity(&Normalizer::default(), &input, &config(0.95)).unwrap();
    assert_eq!(urls(&groups), vec![vec!["u1", "u2"], vec!["u3"]]);
}

#[test]
fn empty_input_yields_no_groups() {
    let empty = ListingsByCategory::new();
    let groups = group_by_similarity(&Normalizer::default(), &empty, &config(0.95)).unwrap();
    assert!(groups.is_empty());
}

#[test]
fn invalid_config_is_rejected() {
    let input = ListingsByCategory::new();
    let normalizer = Normalizer::default();
    assert_eq!(
        group_by_similarity(&normalizer, &input, &config(0.0)).unwrap_err(),
        MatchError::InvalidThreshold(0.0)
    );
    assert_eq!(
        group_by_similarity(&normalizer, &input, &config(1.5)).unwrap_err(),
        MatchError::InvalidThreshold(1.5)
    );
    assert_eq!(
        group_by_similarity(
            &normalizer,
            &input,
            &GroupingConfig {
                batch_size: 0,
                ..GroupingConfig::default()
            }
        )
        .unwrap_err(),
        MatchError::InvalidBatchSize
    );
    assert!(GroupingConfig {
        max_length_ratio: -0.1,
        ..GroupingConfig::default()
    }
    .validate()
    .is_err());
}

#[test]
fn claim_set_claims_once() {
    let claims = ClaimSet::new(2);
    assert!(claims.try_claim(0));
    assert!(!claims.try_claim(0));
    assert!(claims.is_claimed(0));
    assert!(!claims.is_claimed(1));
}

#[test]
fn pair_memo_scores_each_pair_once() {
    let memo = PairMemo::new();
    let first = memo.score(0, "abcd", 1, "abce");
    let second = memo.score(1, "abce", 0, "abcd");
    assert!((first - second).abs() < f64::EPSILON);
    assert_eq!(memo.len(), 1);
    assert!((memo.score(2, "x", 2, "x") - 1.0).abs() < f64::EPSILON);
    assert_eq!(memo.len(), 1);
}

fn strict_context() -> MatchContext {
    let brands = Registry::from_entries([
        RegistryEntry {
            id: 7,
            name: "네스티".to_string(),
        },
        RegistryEntry {
            id: 9,
            name: "VIP쥬스".to_string(),
        },
    ]);
    MatchContext::new(&NormalizeRules::default(), &brands, 1)
}

#[test]
fn strict_grouping_merges_equal_keys() {
    let input = by_category(&[
        ("NASTY Mint 30ml", "u1", "입호흡"),
        ("VIP 망고", "u2", "입호흡"),
        ("네스티 민트 60ml", "u3", "입호흡"),
    ]);
    let grouping = group_by_key(&strict_context(), &input);
    assert_eq!(grouping.groups.len(), 2);
    assert_eq!(grouping.groups[0].key.brand_id, 7);
    assert_eq!(grouping.groups[0].listings.len(), 2);
    assert_eq!(grouping.groups[1].key.brand_id, 9);
    assert!(grouping.unresolved.is_empty());
}

#[test]
fn strict_grouping_keeps_unresolved_apart() {
    let input = by_category(&[
        ("라임", "u1", "입호흡"),
        ("네스티 액상", "u2", "입호흡"),
        ("네스티 민트", "u3", "입호흡"),
    ]);
    let grouping = group_by_key(&strict_context(), &input);
    assert_eq!(grouping.groups.len(), 1);
    assert_eq!(grouping.groups[0].listings.len(), 1);
    let unresolved: Vec<&str> = grouping.unresolved.iter().map(|l| l.url.as_str()).collect();
    assert_eq!(unresolved, vec!["u1", "u2"]);
}
