//! Poll and PoV artifact checks.

use futures::future::BoxFuture;
use futures::FutureExt;
use tracing::debug;

use cb_accept_core::{argv, duplicate_files, ensure, Result};

use crate::context::{file_name, CheckContext};
use crate::tools::pov_verifier;

/// Markers a poll must contain: it has to both read from and write to the service.
const READ_MARKER: &str = "<read";
const WRITE_MARKER: &str = "<write";

/// Enough distinct, verifiable polls that exercise both directions.
pub fn check_polls(ctx: &CheckContext) -> BoxFuture<'_, Result<()>> {
    async move {
        let polls = ctx.polls()?;
        let minimum = ctx.config().min_polls;
        ensure!(
            polls.len() >= minimum,
            "{} polls found, at least {} required",
            polls.len(),
            minimum
        );

        let duplicates = duplicate_files(&polls)?;
        ensure!(
            duplicates.is_empty(),
            "{} duplicate poll(s), first: {}",
            duplicates.len(),
            duplicates.first().map(|p| p.display().to_string()).unwrap_or_default()
        );

        let verifier = &ctx.config().tools.xml_verifier;
        for poll in &polls {
            ctx.runner()
                .run(verifier, &argv([poll.to_string_lossy()]), false)
                .await?;

            let content = std::fs::read_to_string(poll)?;
            ensure!(
                content.contains(READ_MARKER),
                "poll {} never reads from the service",
                file_name(poll)
            );
            ensure!(
                content.contains(WRITE_MARKER),
                "poll {} never writes to the service",
                file_name(poll)
            );
        }
        debug!(package = %ctx.package().name, polls = polls.len(), "polls verified");
        Ok(())
    }
    .boxed()
}

/// At least one PoV, each accepted by the verifier for its format.
pub fn check_povs(ctx: &CheckContext) -> BoxFuture<'_, Result<()>> {
    async move {
        let povs = ctx.povs()?;
        ensure!(!povs.is_empty(), "no PoVs found");

        for pov in &povs {
            let verifier = pov_verifier(&ctx.config().tools, pov)?;
            ctx.runner()
                .run(verifier, &argv([pov.to_string_lossy()]), false)
                .await?;
        }
        Ok(())
    }
    .boxed()
}
