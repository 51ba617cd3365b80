//! Checks over the built binaries and build-system targets.

use futures::future::BoxFuture;
use futures::FutureExt;
use tracing::{debug, info};

use cb_accept_core::{checksum, ensure, files_in, layout, Result};

use crate::context::{Build, CheckContext};

/// A clean rebuild reproduces every binary in `bin/`, patched builds included.
pub fn check_build_determinism(ctx: &CheckContext) -> BoxFuture<'_, Result<()>> {
    async move {
        let first = checksum(&files_in(&ctx.bin_dir())?)?;
        ensure!(!first.is_empty(), "build produced no binaries in {}", layout::BIN_DIR);

        ctx.make("clean").await?;
        ctx.make("build").await?;

        let second = checksum(&files_in(&ctx.bin_dir())?)?;
        ensure!(
            first == second,
            "rebuild is not reproducible: {} binaries before, {} after, contents differ",
            first.len(),
            second.len()
        );
        Ok(())
    }
    .boxed()
}

/// The patch must change the binaries.
pub fn check_patched_differs(ctx: &CheckContext) -> BoxFuture<'_, Result<()>> {
    async move {
        let unpatched = checksum(&ctx.binaries(Build::Unpatched)?)?;
        let patched = checksum(&ctx.binaries(Build::Patched)?)?;
        ensure!(!unpatched.is_empty(), "no unpatched binaries were built");
        ensure!(!patched.is_empty(), "no patched binaries were built");
        ensure!(
            unpatched != patched,
            "patched binaries are identical to unpatched binaries"
        );
        Ok(())
    }
    .boxed()
}

/// IDS rules are exercised by the build system, when the package ships any.
pub fn check_ids(ctx: &CheckContext) -> BoxFuture<'_, Result<()>> {
    async move {
        if !ctx.root().join(layout::IDS_DIR).is_dir() {
            debug!(package = %ctx.package().name, "no IDS rules");
            return Ok(());
        }
        ctx.make("check-ids").await?;
        Ok(())
    }
    .boxed()
}

pub fn check_remote(ctx: &CheckContext) -> BoxFuture<'_, Result<()>> {
    async move {
        let output = ctx.make("check-remote").await?;
        info!(package = %ctx.package().name, "remote check: {}", output.trim());
        Ok(())
    }
    .boxed()
}
