//! cb-acceptance - acceptance tests for challenge binary packages
//!
//! Runs the registered checks against one or more package directories and
//! exits non-zero if any package fails.
//!
//! ```text
//! cb-acceptance --kind static CROMU_00001
//! cb-acceptance --check check_polls --variant cqe -dd CROMU_00001 KPRCA_00002
//! cb-acceptance --list
//! ```

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use cb_accept_checks::{
    render_package, render_registry, write_batch_report_json, CheckEngine, CheckKind,
    CheckRegistry, Selection,
};
use cb_accept_core::{init_tracing, level_for_debug, HarnessConfig, SystemExecutor, Variant};

#[derive(Parser, Debug)]
#[command(name = "cb-acceptance")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Acceptance tests for challenge binary packages", long_about = None)]
struct Cli {
    /// Package directories to test
    #[arg(required_unless_present = "list")]
    packages: Vec<PathBuf>,

    /// Run only this check
    #[arg(long)]
    check: Option<String>,

    /// Run only checks of this kind (build, pov, polls, static, remote)
    #[arg(long)]
    kind: Option<CheckKind>,

    /// Package variant (cqe, cfe); unset means generic
    #[arg(long)]
    variant: Option<Variant>,

    /// Echo tool invocations; repeat to dump their output
    #[arg(short = 'd', long = "debug", action = ArgAction::Count)]
    debug: u8,

    /// Keep working copies and skip the trailing clean
    #[arg(long)]
    no_cleanup: bool,

    /// Treat warnings as failures
    #[arg(long)]
    strict: bool,

    /// Fixed seed for poll generation
    #[arg(long, allow_negative_numbers = true)]
    seed: Option<i64>,

    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the batch report as JSON to this path
    #[arg(long)]
    report: Option<PathBuf>,

    /// Emit JSON-formatted log lines
    #[arg(long)]
    json: bool,

    /// List registered checks and exit
    #[arg(long)]
    list: bool,

    /// Build system driver
    #[arg(long, env = "CB_ACCEPT_MAKE")]
    make: Option<String>,

    /// Replay tool
    #[arg(long, env = "CB_ACCEPT_CB_TEST")]
    cb_test: Option<String>,
}

impl Cli {
    fn selection(&self) -> Selection {
        Selection {
            check: self.check.clone(),
            kind: self.kind,
        }
    }
}

/// Defaults, then the config file, then flags.
fn build_config(cli: &Cli) -> Result<HarnessConfig> {
    let mut config = match &cli.config {
        Some(path) => HarnessConfig::from_json_file(path)
            .with_context(|| format!("load config {}", path.display()))?,
        None => HarnessConfig::default(),
    };

    if let Some(make) = &cli.make {
        config.tools.make = make.clone();
    }
    if let Some(cb_test) = &cli.cb_test {
        config.tools.cb_test = cb_test.clone();
    }
    if cli.seed.is_some() {
        config.poll_seed = cli.seed;
    }
    config.debug_level = config.debug_level.max(cli.debug);
    config.strict |= cli.strict;
    config.keep_workdir |= cli.no_cleanup;

    config.validate().context("invalid configuration")?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json, level_for_debug(cli.debug));

    let registry = CheckRegistry::standard().context("build check registry")?;
    if cli.list {
        print!("{}", render_registry(&registry));
        return Ok(());
    }
    if let Some(name) = &cli.check {
        if registry.get(name).is_none() {
            anyhow::bail!("unknown check: {} (see --list)", name);
        }
    }

    let config = build_config(&cli)?;
    let variant = cli.variant.unwrap_or_default();
    info!(packages = cli.packages.len(), variant = %variant, "starting acceptance run");

    let engine = CheckEngine::new(registry, Arc::new(SystemExecutor), config);
    let batch = engine
        .run_batch(&cli.packages, variant, &cli.selection())
        .await;

    for package in &batch.packages {
        println!("{}", render_package(package));
    }

    if let Some(path) = &cli.report {
        write_batch_report_json(path, &batch)?;
        info!(run_id = %batch.run_id, path = %path.display(), "report written");
    }

    if batch.passed {
        println!("✓ All packages passed!");
        Ok(())
    } else {
        anyhow::bail!(
            "{} of {} package(s) failed",
            batch.failed_packages().count(),
            batch.packages.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("cb-acceptance").chain(args.iter().copied()))
            .expect("parse args")
    }

    #[test]
    fn test_parse_full_command_line() {
        let cli = parse(&[
            "--check",
            "check_polls",
            "--kind",
            "polls",
            "--variant",
            "cqe",
            "-dd",
            "--no-cleanup",
            "--strict",
            "--seed",
            "-3",
            "AAAAA_00001",
            "BBBBB_00002",
        ]);
        assert_eq!(cli.packages.len(), 2);
        assert_eq!(cli.kind, Some(CheckKind::Polls));
        assert_eq!(cli.variant, Some(Variant::Cqe));
        assert_eq!(cli.debug, 2);
        assert_eq!(cli.seed, Some(-3));
        assert_eq!(cli.selection().check.as_deref(), Some("check_polls"));
    }

    #[test]
    fn test_packages_required_unless_listing() {
        assert!(Cli::try_parse_from(["cb-acceptance"]).is_err());
        assert!(parse(&["--list"]).packages.is_empty());
    }

    #[test]
    fn test_invalid_kind_rejected() {
        assert!(Cli::try_parse_from(["cb-acceptance", "--kind", "deploy", "AAAAA_00001"]).is_err());
        assert!(Cli::try_parse_from(["cb-acceptance", "--variant", "cgc", "AAAAA_00001"]).is_err());
    }

    #[test]
    fn test_flags_override_config_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("harness.json");
        std::fs::write(
            &path,
            r#"{ "min_polls": 50, "poll_seed": 9, "tools": { "make": "gmake" } }"#,
        )
        .expect("write config");

        let cli = parse(&[
            "--config",
            path.to_str().unwrap(),
            "--seed",
            "4",
            "--make",
            "/usr/bin/make",
            "--strict",
            "-d",
            "AAAAA_00001",
        ]);
        let config = build_config(&cli).expect("build config");
        assert_eq!(config.min_polls, 50);
        assert_eq!(config.poll_seed, Some(4));
        assert_eq!(config.tools.make, "/usr/bin/make");
        assert_eq!(config.debug_level, 1);
        assert!(config.strict);
        assert!(!config.keep_workdir);
    }

    #[test]
    fn test_config_file_values_survive_without_flags() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("harness.json");
        std::fs::write(&path, r#"{ "poll_seed": 9, "strict": true }"#).expect("write config");

        let cli = parse(&["--config", path.to_str().unwrap(), "AAAAA_00001"]);
        let config = build_config(&cli).expect("build config");
        assert_eq!(config.poll_seed, Some(9));
        assert!(config.strict);
    }

    #[test]
    fn test_missing_config_file_is_an_error() {
        let cli = parse(&["--config", "/nonexistent/harness.json", "AAAAA_00001"]);
        let err = build_config(&cli).unwrap_err();
        assert!(format!("{err:#}").contains("harness.json"));
    }
}
