//! Poll generator reproducibility.

use futures::future::BoxFuture;
use futures::FutureExt;
use tracing::debug;

use cb_accept_core::{checksum, ensure, files_in, layout, Result, Variant};

use crate::context::CheckContext;
use crate::tools::GeneratorRequest;

/// Poll sets that may carry a state machine, with the manifest variable holding their depth.
fn generated_poll_sets(variant: Variant) -> Vec<(&'static str, &'static str)> {
    let mut sets = vec![(layout::POLLS_RELEASE, "POLLS_RELEASE_MAX_DEPTH")];
    if variant.has_testing_polls() {
        sets.push((layout::POLLS_TESTING, "POLLS_TESTING_MAX_DEPTH"));
    }
    sets
}

/// Two generator runs with the same seed and count produce the same polls.
pub fn check_generator_determinism(ctx: &CheckContext) -> BoxFuture<'_, Result<()>> {
    async move {
        let config = ctx.config();
        let manifest = ctx.manifest()?.manifest;

        for (location, depth_key) in generated_poll_sets(ctx.package().variant) {
            let dir = ctx.root().join(location);
            let machine = dir.join(layout::STATE_MACHINE);
            let graph = dir.join(layout::STATE_GRAPH);
            if !machine.is_file() || !graph.is_file() {
                debug!(package = %ctx.package().name, location, "no state machine, skipping");
                continue;
            }

            let depth = manifest
                .get(depth_key)
                .and_then(|v| v.parse().ok())
                .unwrap_or(config.default_max_depth);
            let scratch = tempfile::Builder::new().prefix("cb-accept-gen-").tempdir()?;

            let mut fingerprints = Vec::with_capacity(2);
            for run in ["first", "second"] {
                let output = scratch.path().join(run);
                std::fs::create_dir_all(&output)?;
                ctx.generate(&GeneratorRequest {
                    machine: machine.clone(),
                    graph: graph.clone(),
                    output: output.clone(),
                    count: Some(config.generator_count),
                    seed: Some(config.generator_seed),
                    depth: Some(depth),
                })
                .await?;
                fingerprints.push(checksum(&files_in(&output)?)?);
            }

            ensure!(
                !fingerprints[0].is_empty(),
                "generator produced no polls for {}",
                location
            );
            ensure!(
                fingerprints[0] == fingerprints[1],
                "generator is not deterministic for {} (seed {}, count {}, depth {})",
                location,
                config.generator_seed,
                config.generator_count,
                depth
            );
        }
        Ok(())
    }
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use cb_accept_core::fakes::ScriptedExecutor;
    use cb_accept_core::{CommandOutput, HarnessConfig, Invocation, Package, INCLUDE_DIRECTIVE};

    fn package_tree(manifest_extra: &str) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let polls = dir.path().join("poller/for-release");
        std::fs::create_dir_all(&polls).unwrap();
        std::fs::write(polls.join("machine.py"), "class Service: pass").unwrap();
        std::fs::write(polls.join("state-graph.yaml"), "nodes: []").unwrap();
        std::fs::write(
            dir.path().join("Makefile"),
            format!("AUTHOR_ID = AAAAA\nSERVICE_ID = 00001\n{manifest_extra}{INCLUDE_DIRECTIVE}\n"),
        )
        .unwrap();
        dir
    }

    fn context(root: &Path, executor: Arc<ScriptedExecutor>) -> CheckContext {
        let package = Package {
            name: "AAAAA_00001".to_string(),
            root: root.to_path_buf(),
            variant: Variant::Generic,
        };
        CheckContext::new(package, executor, HarnessConfig::default())
    }

    fn output_dir(inv: &Invocation) -> PathBuf {
        PathBuf::from(inv.args.last().unwrap())
    }

    #[tokio::test]
    async fn test_deterministic_generator() {
        let tree = package_tree("POLLS_RELEASE_MAX_DEPTH = 64\n");
        let executor = Arc::new(ScriptedExecutor::new(|inv| {
            std::fs::write(output_dir(inv).join("GEN_00000.xml"), "<pov/>").unwrap();
            CommandOutput::default()
        }));

        check_generator_determinism(&context(tree.path(), executor.clone()))
            .await
            .unwrap();

        let calls = executor.invocations_of("generate-polls");
        assert_eq!(calls.len(), 2);
        let joined = calls[0].args.join(" ");
        assert!(joined.starts_with("--count 100 --seed 1 --depth 64 "));
        assert_ne!(output_dir(&calls[0]), output_dir(&calls[1]));
    }

    #[tokio::test]
    async fn test_default_depth() {
        let tree = package_tree("");
        let executor = Arc::new(ScriptedExecutor::new(|inv| {
            std::fs::write(output_dir(inv).join("GEN_00000.xml"), "<pov/>").unwrap();
            CommandOutput::default()
        }));
        check_generator_determinism(&context(tree.path(), executor.clone()))
            .await
            .unwrap();
        assert!(executor.invocations()[0].args.join(" ").contains("--depth 10000"));
    }

    #[tokio::test]
    async fn test_nondeterministic_generator_fails() {
        let tree = package_tree("");
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        let executor = Arc::new(ScriptedExecutor::new(move |inv| {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            std::fs::write(output_dir(inv).join("GEN_00000.xml"), format!("<pov>{n}</pov>")).unwrap();
            CommandOutput::default()
        }));

        let err = check_generator_determinism(&context(tree.path(), executor))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not deterministic"));
    }

    #[tokio::test]
    async fn test_static_polls_are_skipped() {
        let tree = package_tree("");
        std::fs::remove_file(tree.path().join("poller/for-release/machine.py")).unwrap();
        let executor = Arc::new(ScriptedExecutor::succeeding());
        check_generator_determinism(&context(tree.path(), executor.clone()))
            .await
            .unwrap();
        assert!(executor.invocations().is_empty());
    }
}
