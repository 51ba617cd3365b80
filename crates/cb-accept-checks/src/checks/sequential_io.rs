//! Degenerate byte-at-a-time I/O, observed through a traced replay.

use futures::future::BoxFuture;
use futures::FutureExt;

use cb_accept_core::{find_sequential_run, HarnessError, Result};

use crate::checks::replay::{poll_dirs, request};
use crate::context::{Build, CheckContext};
use crate::tools::{ReplaySource, TRACE_FILE_ENV};

pub fn warn_sequential_io(ctx: &CheckContext) -> BoxFuture<'_, Result<()>> {
    async move {
        let config = ctx.config();
        let scratch = tempfile::Builder::new().prefix("cb-accept-trace-").tempdir()?;

        for (index, dir) in poll_dirs(ctx)?.into_iter().enumerate() {
            let trace_path = scratch.path().join(format!("trace-{index}.log"));
            let req = request(ctx, Build::Unpatched, ReplaySource::Directory(dir.clone()))?
                .wrapper(config.tools.trace_shim.clone())
                .env(TRACE_FILE_ENV, trace_path.to_string_lossy());
            ctx.replay(&req, false).await?;

            let trace = std::fs::read_to_string(&trace_path).map_err(|e| {
                HarnessError::assertion(format!(
                    "no trace captured for {}: {}",
                    dir.display(),
                    e
                ))
            })?;

            if let Some(run) = find_sequential_run(&trace, config.sequential_io_threshold) {
                return Err(HarnessError::assertion(format!(
                    "{} consecutive {:?} calls of at most one byte replaying {} (trace line {}, limit {})",
                    run.length,
                    run.direction,
                    dir.display(),
                    run.line,
                    config.sequential_io_threshold
                )));
            }
        }
        Ok(())
    }
    .boxed()
}
