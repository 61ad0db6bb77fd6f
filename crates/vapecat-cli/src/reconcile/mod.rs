//! The `reconcile` command: load result files, read the registries, group
//! listings and write them into the catalog.
//!
//! A single run that fails exits non-zero. With `--interval-minutes` the run
//! repeats until interrupted, and a failed iteration is logged and the loop
//! carries on.

pub(crate) mod catalog;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use clap::{Args, ValueEnum};
use vapecat_core::{
    AppConfig, ListingsByCategory, LoadedListings, NormalizeRules, RawListing, Registry,
};
use vapecat_db::{PgStore, RegistryTable};
use vapecat_matcher::{group_by_key, group_by_similarity, GroupingConfig, MatchContext};

use self::catalog::{ReconcileStats, Reconciler};

/// How listings are grouped into products.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum GroupingMode {
    /// Near-duplicate titles within a category share a product
    #[default]
    Fuzzy,
    /// Only listings with an identical brand, core name and category share a product
    Strict,
}

impl GroupingMode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            GroupingMode::Fuzzy => "fuzzy",
            GroupingMode::Strict => "strict",
        }
    }
}

#[derive(Debug, Args)]
pub struct ReconcileArgs {
    /// Grouping strategy
    #[arg(long, value_enum, default_value_t = GroupingMode::Fuzzy)]
    pub mode: GroupingMode,

    /// Directory of scraped result files (defaults to VAPECAT_RESULTS_DIR)
    #[arg(long)]
    pub results_dir: Option<PathBuf>,

    /// Similarity threshold for fuzzy grouping (defaults to VAPECAT_SIMILARITY_THRESHOLD)
    #[arg(long)]
    pub threshold: Option<f64>,

    /// Group and summarize without writing to the database
    #[arg(long)]
    pub dry_run: bool,

    /// Delete the processed result files after a successful run
    #[arg(long)]
    pub clean: bool,

    /// Repeat the run every N minutes until interrupted
    #[arg(long)]
    pub interval_minutes: Option<u64>,
}

/// Grouped listings ready for reconciliation.
#[derive(Debug, Default)]
pub(crate) struct Grouping {
    pub groups: Vec<Vec<RawListing>>,
    /// Listings the strict path could not key; always empty for fuzzy runs.
    pub unresolved: Vec<RawListing>,
}

impl Grouping {
    pub fn multi_member_groups(&self) -> usize {
        self.groups.iter().filter(|g| g.len() > 1).count()
    }

    pub fn singleton_groups(&self) -> usize {
        self.groups.iter().filter(|g| g.len() == 1).count()
    }
}

pub(crate) fn grouping_config(
    config: &AppConfig,
    threshold: Option<f64>,
) -> anyhow::Result<GroupingConfig> {
    let mut grouping = GroupingConfig::from_app_config(config);
    if let Some(threshold) = threshold {
        grouping = grouping.with_threshold(threshold);
    }
    grouping.validate()?;
    Ok(grouping)
}

pub(crate) fn load_normalize_rules(config: &AppConfig) -> anyhow::Result<NormalizeRules> {
    match &config.rules_path {
        Some(path) => vapecat_core::load_rules(path)
            .with_context(|| format!("loading normalization rules from {}", path.display())),
        None => Ok(NormalizeRules::default()),
    }
}

/// Load result files, failing when there is nothing to reconcile.
pub(crate) fn load_listings(dir: &Path) -> anyhow::Result<LoadedListings> {
    let loaded = vapecat_core::load_results_dir(dir)?;
    if loaded.is_empty() {
        anyhow::bail!("no listings found in {}", dir.display());
    }
    tracing::info!(
        files = loaded.files.len(),
        categories = loaded.by_category.len(),
        listings = loaded.listing_count(),
        "result files loaded"
    );
    Ok(loaded)
}

pub(crate) async fn load_required_registry(
    pool: &sqlx::PgPool,
    table: RegistryTable,
) -> anyhow::Result<Registry> {
    let registry = vapecat_db::load_registry(pool, table).await?;
    if registry.is_empty() {
        anyhow::bail!("registry table '{table}' is empty");
    }
    Ok(registry)
}

pub(crate) fn build_groups(
    ctx: &MatchContext,
    listings: &ListingsByCategory,
    mode: GroupingMode,
    grouping: &GroupingConfig,
) -> anyhow::Result<Grouping> {
    match mode {
        GroupingMode::Fuzzy => Ok(Grouping {
            groups: group_by_similarity(ctx.normalizer(), listings, grouping)?,
            unresolved: Vec::new(),
        }),
        GroupingMode::Strict => {
            let strict = group_by_key(ctx, listings);
            Ok(Grouping {
                groups: strict.groups.into_iter().map(|g| g.listings).collect(),
                unresolved: strict.unresolved,
            })
        }
    }
}

/// Run `reconcile` once or on an interval.
pub(crate) async fn run_reconcile(config: &AppConfig, args: &ReconcileArgs) -> anyhow::Result<()> {
    let grouping = grouping_config(config, args.threshold)?;
    let results_dir = args
        .results_dir
        .clone()
        .unwrap_or_else(|| config.results_dir.clone());
    let pool = crate::connect(config).await?;

    let Some(minutes) = args.interval_minutes else {
        return run_once(&pool, config, args, &grouping, &results_dir).await;
    };
    if minutes == 0 {
        anyhow::bail!("--interval-minutes must be at least 1");
    }

    let period = Duration::from_secs(minutes.saturating_mul(60));
    loop {
        if let Err(e) = run_once(&pool, config, args, &grouping, &results_dir).await {
            tracing::error!(error = %format!("{e:#}"), "reconcile run failed");
        }

        tracing::info!(minutes, "waiting for next run");
        tokio::select! {
            () = tokio::time::sleep(period) => {}
            result = tokio::signal::ctrl_c() => {
                result?;
                tracing::info!("interrupted; stopping");
                return Ok(());
            }
        }
    }
}

async fn run_once(
    pool: &sqlx::PgPool,
    config: &AppConfig,
    args: &ReconcileArgs,
    grouping: &GroupingConfig,
    results_dir: &Path,
) -> anyhow::Result<()> {
    let rules = load_normalize_rules(config)?;
    let loaded = load_listings(results_dir)?;

    let brands = load_required_registry(pool, RegistryTable::Companies).await?;
    let sellers = load_required_registry(pool, RegistryTable::SellerSites).await?;
    let categories = load_required_registry(pool, RegistryTable::ProductCategories).await?;

    let ctx = MatchContext::new(&rules, &brands, config.unknown_brand_id);
    let grouped = build_groups(&ctx, &loaded.by_category, args.mode, grouping)?;

    for listing in &grouped.unresolved {
        tracing::warn!(
            title = %listing.title,
            url = %listing.url,
            seller = %listing.source_file,
            "listing skipped: no brand or product name"
        );
    }

    if args.dry_run {
        println!(
            "dry-run ({}): {} listings -> {} groups ({} multi-member, {} singleton), {} unresolved",
            args.mode.as_str(),
            loaded.listing_count(),
            grouped.groups.len(),
            grouped.multi_member_groups(),
            grouped.singleton_groups(),
            grouped.unresolved.len(),
        );
        return Ok(());
    }

    let run = vapecat_db::create_reconcile_run(pool, args.mode.as_str(), "cli").await?;
    if let Err(e) = vapecat_db::start_reconcile_run(pool, run.id).await {
        fail_run_best_effort(pool, run.id, format!("{e:#}")).await;
        return Err(e.into());
    }

    let store = PgStore::new(pool.clone());
    let reconciler = Reconciler::new(&ctx, &sellers, &categories, &store);
    let stats = match reconciler.reconcile(&grouped.groups).await {
        Ok(stats) => stats,
        Err(e) => {
            tracing::error!(
                run_id = run.id,
                error = %e,
                "reconcile failed; catalog writes rolled back"
            );
            fail_run_best_effort(pool, run.id, format!("{e:#}")).await;
            return Err(e.into());
        }
    };

    let processed = i32::try_from(stats.listings).unwrap_or(i32::MAX);
    if let Err(e) = vapecat_db::complete_reconcile_run(pool, run.id, processed).await {
        fail_run_best_effort(pool, run.id, format!("{e:#}")).await;
        return Err(e.into());
    }

    log_summary(run.id, &grouped, &stats);
    println!(
        "reconciled {} listings into {} groups: {} products created, {} comparisons inserted, \
         {} repriced, {} history rows",
        stats.listings,
        stats.groups,
        stats.products_created,
        stats.comparisons_inserted,
        stats.comparisons_repriced,
        stats.history_appended,
    );

    if args.clean {
        remove_result_files(&loaded.files);
    }

    Ok(())
}

fn log_summary(run_id: i64, grouped: &Grouping, stats: &ReconcileStats) {
    tracing::info!(
        run_id,
        multi_member_groups = grouped.multi_member_groups(),
        singleton_groups = grouped.singleton_groups(),
        unresolved = grouped.unresolved.len(),
        products_created = stats.products_created,
        products_reused_by_url = stats.products_reused_by_url,
        products_matched = stats.products_matched,
        comparisons_inserted = stats.comparisons_inserted,
        comparisons_repriced = stats.comparisons_repriced,
        comparisons_unchanged = stats.comparisons_unchanged,
        history_appended = stats.history_appended,
        "reconcile run succeeded"
    );
}

pub(crate) fn remove_result_files(files: &[PathBuf]) -> usize {
    let mut removed = 0;
    for path in files {
        match std::fs::remove_file(path) {
            Ok(()) => removed += 1,
            Err(e) => tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to remove result file"
            ),
        }
    }
    tracing::info!(removed, "result files removed");
    removed
}

async fn fail_run_best_effort(pool: &sqlx::PgPool, run_id: i64, message: String) {
    if let Err(mark_err) = vapecat_db::fail_reconcile_run(pool, run_id, &message).await {
        tracing::error!(
            run_id,
            error = %mark_err,
            "failed to mark reconcile run as failed"
        );
    }
}

#[cfg(test)]
#[path = "reconcile_test.rs"]
mod tests;
