use anyhow::{Context, Result};
use std::path::Path;

use crate::outcome::{BatchReport, PackageReport};
use crate::registry::CheckRegistry;

/// Write the batch report as pretty JSON.
pub fn write_batch_report_json(path: &Path, report: &BatchReport) -> Result<()> {
    let content = serde_json::to_string_pretty(report).context("serialize batch report")?;
    std::fs::write(path, content).with_context(|| format!("write {:?}", path))?;
    Ok(())
}

/// One line per check plus a summary line.
pub fn render_package(report: &PackageReport) -> String {
    let mut out = format!("{} ({})\n", report.package, report.variant);

    if let Some(error) = &report.error {
        out.push_str(&format!("  ✗ aborted: {}\n", error));
        return out;
    }

    for check in &report.checks {
        match check.outcome.reason() {
            Some(reason) => out.push_str(&format!(
                "  {} {}: {}\n",
                check.outcome.symbol(),
                check.name,
                reason
            )),
            None => out.push_str(&format!("  {} {}\n", check.outcome.symbol(), check.name)),
        }
    }

    out.push_str(&format!(
        "  {}: {} passed, {} failed, {} warned, {} skipped\n",
        if report.passed { "PASS" } else { "FAIL" },
        report.passed_count(),
        report.failed_count(),
        report.warned_count(),
        report.skipped_count()
    ));
    out
}

/// Table of registered checks for `--list`.
pub fn render_registry(registry: &CheckRegistry) -> String {
    let width = registry.names().iter().map(|n| n.len()).max().unwrap_or(0);
    let mut out = String::new();
    for check in registry.iter() {
        let kinds = check
            .kinds
            .iter()
            .map(|k| k.name())
            .collect::<Vec<_>>()
            .join(",");
        out.push_str(&format!(
            "{:<width$}  {:<4}  {}\n",
            check.name,
            check.severity.to_string(),
            kinds,
            width = width
        ));
    }
    out
}
