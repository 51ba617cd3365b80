//! Checks that replay polls and PoVs against the built binaries.

use std::path::PathBuf;

use futures::future::BoxFuture;
use futures::FutureExt;
use rand::Rng;
use tracing::{info, warn};

use cb_accept_core::{ensure, HarnessError, ProcessError, Result};

use crate::context::{Build, CheckContext};
use crate::tools::{ReplayRequest, ReplaySource};

pub(crate) fn request(
    ctx: &CheckContext,
    build: Build,
    source: ReplaySource,
) -> Result<ReplayRequest> {
    let binaries = ctx.binary_names(build)?;
    ensure!(!binaries.is_empty(), "no {:?} binaries to replay against", build);
    Ok(ReplayRequest::new(ctx.bin_dir(), binaries, source).debug(ctx.config().debug_level >= 2))
}

fn pov_source(ctx: &CheckContext) -> Result<ReplaySource> {
    let povs = ctx.povs()?;
    ensure!(!povs.is_empty(), "no PoVs found");
    Ok(ReplaySource::Files(povs))
}

pub(crate) fn poll_dirs(ctx: &CheckContext) -> Result<Vec<PathBuf>> {
    let dirs = ctx.poll_dirs();
    ensure!(!dirs.is_empty(), "no poll directories found");
    Ok(dirs)
}

/// Polls pass against both builds.
pub fn check_replay_polls(ctx: &CheckContext) -> BoxFuture<'_, Result<()>> {
    async move {
        for dir in poll_dirs(ctx)? {
            for build in [Build::Unpatched, Build::Patched] {
                let req = request(ctx, build, ReplaySource::Directory(dir.clone()))?;
                ctx.replay(&req, false).await?;
            }
        }
        Ok(())
    }
    .boxed()
}

/// PoVs crash the unpatched build and not the patched one.
pub fn check_replay_povs(ctx: &CheckContext) -> BoxFuture<'_, Result<()>> {
    async move {
        let source = pov_source(ctx)?;

        let unpatched = request(ctx, Build::Unpatched, source.clone())?
            .should_core()
            .negotiate_seed();
        ctx.replay(&unpatched, false).await?;

        let patched = request(ctx, Build::Patched, source)?.negotiate_seed();
        ctx.replay(&patched, false).await?;
        Ok(())
    }
    .boxed()
}

/// Random seed-skip values for `trials` independent trials.
pub fn seed_skips(trials: u32, max: u32) -> Vec<u32> {
    let mut rng = rand::thread_rng();
    (0..trials).map(|_| rng.gen_range(1..=max.max(1))).collect()
}

/// PoVs still behave under randomized seed skipping.
pub fn check_seed_skip(ctx: &CheckContext) -> BoxFuture<'_, Result<()>> {
    async move {
        let source = pov_source(ctx)?;
        let config = ctx.config();
        let skips = seed_skips(config.seed_skip_trials, config.seed_skip_max);

        let mut failed = Vec::new();
        for skip in skips {
            let unpatched = request(ctx, Build::Unpatched, source.clone())?
                .should_core()
                .negotiate_seed()
                .seed_skip(skip);
            let patched = request(ctx, Build::Patched, source.clone())?
                .should_core()
                .failure_ok()
                .negotiate_seed()
                .seed_skip(skip);

            for req in [unpatched, patched] {
                match ctx.replay(&req, false).await {
                    Ok(_) => {}
                    Err(err @ ProcessError::Spawn { .. }) => return Err(err.into()),
                    Err(err) => {
                        warn!(package = %ctx.package().name, skip, "seed-skip trial failed: {}", err);
                        failed.push(skip);
                        break;
                    }
                }
            }
        }

        ensure!(
            failed.is_empty(),
            "{} of {} seed-skip trials failed (skip values: {:?})",
            failed.len(),
            config.seed_skip_trials,
            failed
        );
        Ok(())
    }
    .boxed()
}

/// A tampered seed must be rejected for every poll set.
pub fn check_seed_munge(ctx: &CheckContext) -> BoxFuture<'_, Result<()>> {
    async move {
        for dir in poll_dirs(ctx)? {
            let req = request(ctx, Build::Unpatched, ReplaySource::Directory(dir.clone()))?
                .negotiate_seed()
                .seed_munge();
            match ctx.replay(&req, true).await {
                Ok(_) => {}
                Err(ProcessError::UnexpectedSuccess { .. }) => {
                    return Err(HarnessError::assertion(format!(
                        "replay with a munged seed was accepted for {}",
                        dir.display()
                    )))
                }
                Err(err) => return Err(err.into()),
            }
        }
        Ok(())
    }
    .boxed()
}

/// Single-byte sends give the same results as unsegmented replay.
pub fn check_segmented_writes(ctx: &CheckContext) -> BoxFuture<'_, Result<()>> {
    async move {
        let timeout = ctx.config().segmented_timeout_secs;

        for dir in poll_dirs(ctx)? {
            for build in [Build::Unpatched, Build::Patched] {
                let req = request(ctx, build, ReplaySource::Directory(dir.clone()))?
                    .segmented(1, timeout);
                ctx.replay(&req, false).await?;
            }
        }

        let source = pov_source(ctx)?;
        let unpatched = request(ctx, Build::Unpatched, source.clone())?
            .should_core()
            .negotiate_seed()
            .segmented(1, timeout);
        ctx.replay(&unpatched, false).await?;
        let patched = request(ctx, Build::Patched, source)?
            .negotiate_seed()
            .segmented(1, timeout);
        ctx.replay(&patched, false).await?;

        info!(package = %ctx.package().name, "segmented replay matched");
        Ok(())
    }
    .boxed()
}
