//! Build phases wrapped around every check body.
//!
//! `clean`, then one preparation step per declared kind, then the body, then
//! `clean` again unless the working copy is being kept for inspection.

use tracing::debug;

use cb_accept_core::Result;

use crate::context::CheckContext;
use crate::kind::CheckKind;
use crate::registry::CheckDescriptor;

/// Make targets issued before a check body, in order.
pub fn preparation_targets(kinds: &[CheckKind]) -> Vec<&'static str> {
    let mut targets = vec!["clean"];
    if kinds.contains(&CheckKind::Pov) {
        targets.push("pov");
    }
    if kinds.contains(&CheckKind::Build) {
        targets.push("build");
    }
    if kinds.contains(&CheckKind::Polls) {
        targets.push("patched-so");
        targets.push("generate-polls");
    }
    targets
}

pub async fn prepare(ctx: &CheckContext, check: &CheckDescriptor) -> Result<()> {
    for target in preparation_targets(check.kinds) {
        debug!(check = check.name, target, "preparing");
        ctx.make(target).await?;
    }
    Ok(())
}

pub async fn cleanup(ctx: &CheckContext) -> Result<()> {
    ctx.make("clean").await?;
    Ok(())
}

/// Prepare, run the body, and clean up.
///
/// A body failure takes precedence over a cleanup failure.
pub async fn run_check(ctx: &CheckContext, check: &CheckDescriptor, keep: bool) -> Result<()> {
    prepare(ctx, check).await?;
    let result = (check.body)(ctx).await;
    if keep {
        return result;
    }
    let cleaned = cleanup(ctx).await;
    result.and(cleaned)
}
