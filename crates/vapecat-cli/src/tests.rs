use std::path::PathBuf;

use super::*;
use crate::reconcile::GroupingMode;

#[test]
fn parses_migrate_command() {
    let cli = Cli::try_parse_from(["vapecat-cli", "migrate"]).expect("expected valid cli args");
    assert!(matches!(cli.command, Some(Commands::Migrate)));
}

#[test]
fn reconcile_defaults_to_fuzzy_single_run() {
    let cli = Cli::try_parse_from(["vapecat-cli", "reconcile"]).expect("expected valid cli args");
    let Some(Commands::Reconcile(args)) = cli.command else {
        panic!("expected reconcile command");
    };
    assert_eq!(args.mode, GroupingMode::Fuzzy);
    assert!(args.results_dir.is_none());
    assert!(args.threshold.is_none());
    assert!(!args.dry_run);
    assert!(!args.clean);
    assert!(args.interval_minutes.is_none());
}

#[test]
fn parses_reconcile_flags() {
    let cli = Cli::try_parse_from([
        "vapecat-cli",
        "reconcile",
        "--mode",
        "strict",
        "--results-dir",
        "/tmp/results",
        "--threshold",
        "0.9",
        "--dry-run",
        "--clean",
        "--interval-minutes",
        "30",
    ])
    .expect("expected valid cli args");

    let Some(Commands::Reconcile(args)) = cli.command else {
        panic!("expected reconcile command");
    };
    assert_eq!(args.mode, GroupingMode::Strict);
    assert_eq!(args.results_dir, Some(PathBuf::from("/tmp/results")));
    assert_eq!(args.threshold, Some(0.9));
    assert!(args.dry_run);
    assert!(args.clean);
    assert_eq!(args.interval_minutes, Some(30));
}

#[test]
fn rejects_unknown_mode() {
    assert!(Cli::try_parse_from(["vapecat-cli", "reconcile", "--mode", "loose"]).is_err());
}

#[test]
fn parses_preview_command() {
    let cli = Cli::try_parse_from(["vapecat-cli", "preview", "--mode", "strict"])
        .expect("expected valid cli args");
    let Some(Commands::Preview(args)) = cli.command else {
        panic!("expected preview command");
    };
    assert_eq!(args.mode, GroupingMode::Strict);
}

#[test]
fn no_command_is_none() {
    let cli = Cli::try_parse_from(["vapecat-cli"]).expect("expected valid cli args");
    assert!(cli.command.is_none());
}
