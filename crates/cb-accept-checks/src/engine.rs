//! Check engine: selects checks, runs them through the lifecycle, aggregates outcomes.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use tracing::{error, info, warn};

use cb_accept_core::{CommandExecutor, HarnessConfig, HarnessError, Package, Result, Variant};

use crate::context::CheckContext;
use crate::kind::CheckKind;
use crate::lifecycle;
use crate::outcome::{BatchReport, CheckReport, Outcome, PackageReport};
use crate::registry::{CheckDescriptor, CheckRegistry};

/// Which checks to run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    /// Run only this check.
    pub check: Option<String>,

    /// Run only checks of this kind; the rest are reported as skipped.
    pub kind: Option<CheckKind>,
}

impl Selection {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn check(name: impl Into<String>) -> Self {
        Self {
            check: Some(name.into()),
            kind: None,
        }
    }

    pub fn kind(kind: CheckKind) -> Self {
        Self {
            check: None,
            kind: Some(kind),
        }
    }
}

/// Runs registered checks against packages, one at a time.
pub struct CheckEngine {
    registry: CheckRegistry,
    executor: Arc<dyn CommandExecutor>,
    config: HarnessConfig,
}

impl CheckEngine {
    pub fn new(registry: CheckRegistry, executor: Arc<dyn CommandExecutor>, config: HarnessConfig) -> Self {
        Self {
            registry,
            executor,
            config,
        }
    }

    pub fn registry(&self) -> &CheckRegistry {
        &self.registry
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Checks considered under `selection`, in name order.
    pub fn select(&self, selection: &Selection) -> Result<Vec<&CheckDescriptor>> {
        match &selection.check {
            Some(name) => self
                .registry
                .get(name)
                .map(|check| vec![check])
                .ok_or_else(|| HarnessError::UnknownCheck(name.clone())),
            None => Ok(self.registry.iter().collect()),
        }
    }

    /// Run the selected checks against one package.
    ///
    /// Errors only when the package cannot be processed at all; check
    /// failures are recorded in the report.
    pub async fn run_package(
        &self,
        path: &Path,
        variant: Variant,
        selection: &Selection,
    ) -> Result<PackageReport> {
        let checks = self.select(selection)?;
        let package = Package::open(path, variant)?;
        let copy = package.working_copy(self.config.keep_workdir)?;
        let ctx = CheckContext::new(copy.package().clone(), self.executor.clone(), self.config.clone());

        info!(package = %package.name, variant = %variant, checks = checks.len(), "testing package");

        let mut reports = Vec::with_capacity(checks.len());
        for check in checks {
            reports.push(self.run_check(&ctx, check, selection.kind).await);
        }

        let report = PackageReport::from_checks(package.name.clone(), variant, reports);
        info!(
            package = %report.package,
            passed = report.passed,
            pass = report.passed_count(),
            fail = report.failed_count(),
            warn = report.warned_count(),
            skip = report.skipped_count(),
            "package finished"
        );
        Ok(report)
    }

    async fn run_check(
        &self,
        ctx: &CheckContext,
        check: &CheckDescriptor,
        kind: Option<CheckKind>,
    ) -> CheckReport {
        let package = &ctx.package().name;
        let start = Instant::now();

        let outcome = if check.selected_by(kind) {
            info!(package = %package, check = check.name, "running check");
            let result = lifecycle::run_check(ctx, check, self.config.keep_workdir).await;
            Outcome::from_result(result, check.severity, self.config.strict)
        } else {
            Outcome::Skip
        };

        match &outcome {
            Outcome::Fail { reason } => {
                error!(package = %package, check = check.name, outcome = "fail", "{}", reason)
            }
            Outcome::Warn { reason } => {
                warn!(package = %package, check = check.name, outcome = "warn", "{}", reason)
            }
            other => info!(package = %package, check = check.name, outcome = other.label()),
        }

        CheckReport {
            name: check.name.to_string(),
            kinds: check.kinds.to_vec(),
            severity: check.severity,
            outcome,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    /// Run every package in order; a package that cannot be processed is
    /// recorded as aborted and the batch continues.
    pub async fn run_batch<P: AsRef<Path>>(
        &self,
        paths: &[P],
        variant: Variant,
        selection: &Selection,
    ) -> BatchReport {
        let mut packages = Vec::with_capacity(paths.len());
        for path in paths {
            let path = path.as_ref();
            match self.run_package(path, variant, selection).await {
                Ok(report) => packages.push(report),
                Err(err) => {
                    error!(package = %path.display(), "package aborted: {}", err);
                    packages.push(PackageReport::aborted(path.display().to_string(), variant, &err));
                }
            }
        }
        BatchReport::new(packages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cb_accept_core::fakes::ScriptedExecutor;

    fn engine() -> CheckEngine {
        CheckEngine::new(
            CheckRegistry::standard().unwrap(),
            Arc::new(ScriptedExecutor::succeeding()),
            HarnessConfig::default(),
        )
    }

    #[test]
    fn test_select_all_in_name_order() {
        let engine = engine();
        let names: Vec<_> = engine
            .select(&Selection::all())
            .unwrap()
            .iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, engine.registry().names());
    }

    #[test]
    fn test_select_single_check() {
        let engine = engine();
        let selected = engine.select(&Selection::check("check_polls")).unwrap();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].name, "check_polls");

        let err = engine.select(&Selection::check("check_nothing")).unwrap_err();
        assert!(matches!(err, HarnessError::UnknownCheck(_)));
    }

    #[tokio::test]
    async fn test_unknown_check_aborts_package() {
        let engine = engine();
        let batch = engine
            .run_batch(&["/nonexistent/AAAAA_00001"], Variant::Generic, &Selection::check("check_nothing"))
            .await;
        assert!(!batch.passed);
        assert!(batch.packages[0].error.as_deref().unwrap().contains("unknown check"));
    }
}
