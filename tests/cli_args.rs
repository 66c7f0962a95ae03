use std::path::PathBuf;

use clap::Parser;
use opgraph::cli::CliArgs;
use opgraph::config::default_config_path;

#[test]
fn test_config_defaults_to_plan_in_working_dir() {
    let args = CliArgs::try_parse_from(["opgraph"]).unwrap();
    assert_eq!(args.config, default_config_path());
    assert_eq!(args.config, PathBuf::from("Opgraph.toml"));
    assert!(args.operation.is_none());
    assert!(!args.dry_run);
}

#[test]
fn test_explicit_flags_are_parsed() {
    let args = CliArgs::try_parse_from([
        "opgraph",
        "--config",
        "plans/build.toml",
        "--operation",
        "compile",
        "--log-level",
        "debug",
        "--dry-run",
    ])
    .unwrap();
    assert_eq!(args.config, PathBuf::from("plans/build.toml"));
    assert_eq!(args.operation.as_deref(), Some("compile"));
    assert!(args.log_level.is_some());
    assert!(args.dry_run);
}
