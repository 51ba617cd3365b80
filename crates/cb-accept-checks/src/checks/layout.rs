//! Static checks over the package source tree.

use futures::future::BoxFuture;
use futures::FutureExt;
use tracing::warn;

use cb_accept_core::{validate_tree, HarnessError, Result};

use crate::context::CheckContext;

/// Every layout violation, all at once.
pub fn check_directories(ctx: &CheckContext) -> BoxFuture<'_, Result<()>> {
    async move {
        let package = ctx.package();
        let violations = validate_tree(ctx.root(), package.variant)?;
        if violations.is_empty() {
            return Ok(());
        }
        for violation in &violations {
            warn!(package = %package.name, "{}", violation);
        }
        Err(HarnessError::assertion(format!(
            "{} layout violation(s): {}",
            violations.len(),
            join(violations.iter().map(ToString::to_string))
        )))
    }
    .boxed()
}

/// Manifest grammar, variable set, and name identity.
pub fn check_makefile(ctx: &CheckContext) -> BoxFuture<'_, Result<()>> {
    async move {
        let package = ctx.package();
        let report = ctx.manifest()?;
        let mut problems: Vec<String> = report.violations.iter().map(ToString::to_string).collect();

        for (key, expected) in [
            ("AUTHOR_ID", package.author_id()),
            ("SERVICE_ID", package.service_id()),
        ] {
            if let Some(value) = report.manifest.get(key) {
                if value != expected {
                    problems.push(format!("{key} is {value}, package name implies {expected}"));
                }
            }
        }

        if problems.is_empty() {
            return Ok(());
        }
        for problem in &problems {
            warn!(package = %package.name, "Makefile: {}", problem);
        }
        Err(HarnessError::assertion(format!(
            "{} Makefile problem(s): {}",
            problems.len(),
            join(problems.into_iter())
        )))
    }
    .boxed()
}

fn join(items: impl Iterator<Item = String>) -> String {
    items.collect::<Vec<_>>().join("; ")
}
