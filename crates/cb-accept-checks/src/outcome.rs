//! Per-check outcomes and their aggregation into package and batch verdicts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use cb_accept_core::{HarnessError, Variant};

use crate::kind::{CheckKind, Severity};

/// Result of one check against one package.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Pass,
    Fail { reason: String },
    /// A soft check failed outside strict mode.
    Warn { reason: String },
    /// Excluded by the kind filter.
    Skip,
}

impl Outcome {
    /// Classify a check body's result.
    ///
    /// Soft failures become warnings unless `strict` escalates them.
    pub fn from_result(result: Result<(), HarnessError>, severity: Severity, strict: bool) -> Self {
        match result {
            Ok(()) => Outcome::Pass,
            Err(err) => {
                let reason = err.to_string();
                match severity {
                    Severity::Soft if !strict => Outcome::Warn { reason },
                    _ => Outcome::Fail { reason },
                }
            }
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Fail { .. })
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Outcome::Pass => "✓",
            Outcome::Fail { .. } => "✗",
            Outcome::Warn { .. } => "!",
            Outcome::Skip => "-",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Pass => "pass",
            Outcome::Fail { .. } => "fail",
            Outcome::Warn { .. } => "warn",
            Outcome::Skip => "skip",
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Outcome::Fail { reason } | Outcome::Warn { reason } => Some(reason),
            Outcome::Pass | Outcome::Skip => None,
        }
    }
}

/// One check's entry in a package report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CheckReport {
    pub name: String,
    pub kinds: Vec<CheckKind>,
    pub severity: Severity,
    pub outcome: Outcome,
    pub duration_ms: u64,
}

/// Every check run against one package.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PackageReport {
    /// Package name, or the path given when the package could not be opened.
    pub package: String,
    pub variant: Variant,
    pub checks: Vec<CheckReport>,

    /// True iff the package was processed and no check failed.
    pub passed: bool,

    /// Why processing stopped before any check ran.
    pub error: Option<String>,
}

impl PackageReport {
    pub fn from_checks(package: impl Into<String>, variant: Variant, checks: Vec<CheckReport>) -> Self {
        let passed = !checks.iter().any(|c| c.outcome.is_failure());
        Self {
            package: package.into(),
            variant,
            checks,
            passed,
            error: None,
        }
    }

    pub fn aborted(package: impl Into<String>, variant: Variant, error: &HarnessError) -> Self {
        Self {
            package: package.into(),
            variant,
            checks: Vec::new(),
            passed: false,
            error: Some(error.to_string()),
        }
    }

    fn count(&self, label: &str) -> usize {
        self.checks.iter().filter(|c| c.outcome.label() == label).count()
    }

    pub fn passed_count(&self) -> usize {
        self.count("pass")
    }

    pub fn failed_count(&self) -> usize {
        self.count("fail")
    }

    pub fn warned_count(&self) -> usize {
        self.count("warn")
    }

    pub fn skipped_count(&self) -> usize {
        self.count("skip")
    }
}

/// Reports for every package given on one invocation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BatchReport {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub packages: Vec<PackageReport>,
    pub passed: bool,
}

impl BatchReport {
    pub fn new(packages: Vec<PackageReport>) -> Self {
        let passed = packages.iter().all(|p| p.passed);
        Self {
            run_id: Uuid::new_v4(),
            generated_at: Utc::now(),
            packages,
            passed,
        }
    }

    pub fn failed_packages(&self) -> impl Iterator<Item = &PackageReport> {
        self.packages.iter().filter(|p| !p.passed)
    }
}
