//! The `preview` command: show how listings would be grouped.
//!
//! Fuzzy previews need no database. Strict previews read the brand registry
//! because their keys depend on brand resolution. Nothing is written.

use std::fmt::Write as _;
use std::path::PathBuf;

use clap::Args;
use vapecat_core::{AppConfig, Registry};
use vapecat_db::RegistryTable;
use vapecat_matcher::MatchContext;

use crate::reconcile::{
    build_groups, grouping_config, load_listings, load_normalize_rules, load_required_registry,
    Grouping, GroupingMode,
};

#[derive(Debug, Args)]
pub struct PreviewArgs {
    /// Grouping strategy
    #[arg(long, value_enum, default_value_t = GroupingMode::Fuzzy)]
    pub mode: GroupingMode,

    /// Directory of scraped result files (defaults to VAPECAT_RESULTS_DIR)
    #[arg(long)]
    pub results_dir: Option<PathBuf>,

    /// Similarity threshold for fuzzy grouping
    #[arg(long)]
    pub threshold: Option<f64>,
}

pub(crate) async fn run_preview(config: &AppConfig, args: &PreviewArgs) -> anyhow::Result<()> {
    let grouping = grouping_config(config, args.threshold)?;
    let results_dir = args
        .results_dir
        .clone()
        .unwrap_or_else(|| config.results_dir.clone());

    let rules = load_normalize_rules(config)?;
    let loaded = load_listings(&results_dir)?;

    let brands = match args.mode {
        GroupingMode::Fuzzy => Registry::default(),
        GroupingMode::Strict => {
            let pool = crate::connect(config).await?;
            load_required_registry(&pool, RegistryTable::Companies).await?
        }
    };

    let ctx = MatchContext::new(&rules, &brands, config.unknown_brand_id);
    let grouped = build_groups(&ctx, &loaded.by_category, args.mode, &grouping)?;

    print!("{}", render_preview(&ctx, &grouped));
    Ok(())
}

/// Multi-member groups with their listings, then the unresolved listings and
/// a totals line.
pub(crate) fn render_preview(ctx: &MatchContext, grouped: &Grouping) -> String {
    let mut out = String::new();

    for group in grouped.groups.iter().filter(|g| g.len() > 1) {
        let first = &group[0];
        let _ = writeln!(
            out,
            "[{}] {} ({} listings)",
            first.product_type,
            ctx.normalize(&first.title),
            group.len()
        );
        for listing in group {
            let _ = writeln!(
                out,
                "  - {} | {} | {} | {}",
                listing.title, listing.price, listing.source_file, listing.url
            );
        }
    }

    if !grouped.unresolved.is_empty() {
        let _ = writeln!(out, "unresolved:");
        for listing in &grouped.unresolved {
            let _ = writeln!(out, "  - {} | {}", listing.title, listing.source_file);
        }
    }

    let _ = writeln!(
        out,
        "{} groups: {} multi-member, {} singleton, {} unresolved",
        grouped.groups.len(),
        grouped.multi_member_groups(),
        grouped.singleton_groups(),
        grouped.unresolved.len()
    );
    out
}
