//! Per-package state shared by every check body.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use cb_accept_core::{
    argv, files_in, layout, validate_manifest, CommandExecutor, HarnessConfig, ManifestReport,
    Package, ProcessError, ProcessRunner, Result,
};

use crate::tools::{GeneratorRequest, ReplayRequest};

/// Which build of the challenge binaries to select.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Build {
    Unpatched,
    Patched,
}

impl Build {
    fn matches(&self, file_name: &str) -> bool {
        let patched = file_name.contains(layout::PATCHED_MARKER);
        match self {
            Build::Unpatched => !patched,
            Build::Patched => patched,
        }
    }
}

/// A package working copy plus the means to drive external tools in it.
pub struct CheckContext {
    package: Package,
    runner: ProcessRunner,
    config: HarnessConfig,
}

impl CheckContext {
    pub fn new(package: Package, executor: Arc<dyn CommandExecutor>, config: HarnessConfig) -> Self {
        let runner = ProcessRunner::new(executor, package.root.clone())
            .with_debug_level(config.debug_level)
            .with_poll_seed(config.tools.make.clone(), config.poll_seed);
        Self {
            package,
            runner,
            config,
        }
    }

    pub fn package(&self) -> &Package {
        &self.package
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn runner(&self) -> &ProcessRunner {
        &self.runner
    }

    pub fn root(&self) -> &Path {
        &self.package.root
    }

    /// `make <target>` in the working copy.
    pub async fn make(&self, target: &str) -> Result<String> {
        Ok(self
            .runner
            .run(&self.config.tools.make, &argv([target]), false)
            .await?)
    }

    /// Run the replay tool. `expect_failure` inverts the exit-status contract.
    pub async fn replay(
        &self,
        request: &ReplayRequest,
        expect_failure: bool,
    ) -> std::result::Result<String, ProcessError> {
        self.runner
            .run(&self.config.tools.cb_test, &request.argv(), expect_failure)
            .await
    }

    pub async fn generate(&self, request: &GeneratorRequest) -> Result<String> {
        Ok(self
            .runner
            .run(&self.config.tools.generate_polls, &request.argv(), false)
            .await?)
    }

    pub fn bin_dir(&self) -> PathBuf {
        self.root().join(layout::BIN_DIR)
    }

    /// Built binaries of one flavor, sorted by name.
    pub fn binaries(&self, build: Build) -> Result<Vec<PathBuf>> {
        Ok(files_in(&self.bin_dir())?
            .into_iter()
            .filter(|p| build.matches(&file_name(p)))
            .collect())
    }

    /// File names of [`CheckContext::binaries`], as the replay tool expects them.
    pub fn binary_names(&self, build: Build) -> Result<Vec<String>> {
        Ok(self.binaries(build)?.iter().map(|p| file_name(p)).collect())
    }

    pub fn povs(&self) -> Result<Vec<PathBuf>> {
        files_in(&self.root().join(layout::POV_DIR))
    }

    /// Poll directories the variant declares that exist in the working copy.
    pub fn poll_dirs(&self) -> Vec<PathBuf> {
        let mut locations = vec![layout::POLLS_RELEASE];
        if self.package.variant.has_testing_polls() {
            locations.push(layout::POLLS_TESTING);
        }
        locations
            .into_iter()
            .map(|l| self.root().join(l))
            .filter(|p| p.is_dir())
            .collect()
    }

    /// XML polls in one poll directory.
    pub fn polls_in(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        Ok(files_in(dir)?
            .into_iter()
            .filter(|p| p.extension().is_some_and(|e| e == "xml"))
            .collect())
    }

    /// XML polls across every poll directory.
    pub fn polls(&self) -> Result<Vec<PathBuf>> {
        let mut polls = Vec::new();
        for dir in self.poll_dirs() {
            polls.extend(self.polls_in(&dir)?);
        }
        Ok(polls)
    }

    pub fn manifest(&self) -> Result<ManifestReport> {
        validate_manifest(&self.root().join(layout::MANIFEST), self.package.variant)
    }
}

pub(crate) fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}
