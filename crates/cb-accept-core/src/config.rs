//! Harness configuration.
//!
//! Defaults are layered under an optional JSON file, and the CLI applies its
//! flags on top of whatever that produces.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{HarnessError, Result};

/// Paths of the external collaborators.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ToolPaths {
    /// Build system driver.
    pub make: String,

    /// Replay tool that negotiates with and replays exchanges against binaries.
    pub cb_test: String,

    /// Poll generator.
    pub generate_polls: String,

    /// Verifier for XML-described polls and PoVs.
    pub xml_verifier: String,

    /// Verifier for raw binary PoV artifacts.
    pub pov_verifier: String,

    /// Tracing shim wrapped around replayed binaries.
    pub trace_shim: String,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            make: "make".to_string(),
            cb_test: "cb-test".to_string(),
            generate_polls: "generate-polls".to_string(),
            xml_verifier: "poll-validate".to_string(),
            pov_verifier: "pov-verify".to_string(),
            trace_shim: "cb-trace".to_string(),
        }
    }
}

/// Configuration for an acceptance run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HarnessConfig {
    pub tools: ToolPaths,

    /// Minimum number of polls a package must ship.
    pub min_polls: usize,

    /// Randomized trials for the seed-skip check.
    pub seed_skip_trials: u32,

    /// Upper bound (inclusive) of a random seed-skip value.
    pub seed_skip_max: u32,

    /// Longest tolerated run of consecutive single-byte transfers.
    pub sequential_io_threshold: usize,

    /// Replay timeout used with single-byte sends.
    pub segmented_timeout_secs: u64,

    /// Polls produced per generator invocation in the determinism check.
    pub generator_count: u32,

    /// Seed handed to the generator in the determinism check.
    pub generator_seed: i64,

    /// Generator depth when the manifest does not declare one.
    pub default_max_depth: u64,

    /// Fixed seed appended to poll generation builds.
    pub poll_seed: Option<i64>,

    /// 0 = silent, 1 = command lines, 2+ = full stream dumps.
    pub debug_level: u8,

    /// Escalate `warn_` failures to hard failures.
    pub strict: bool,

    /// Skip the trailing clean and retain working copies.
    pub keep_workdir: bool,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            tools: ToolPaths::default(),
            min_polls: 1000,
            seed_skip_trials: 256,
            seed_skip_max: 1000,
            sequential_io_threshold: 25,
            segmented_timeout_secs: 30,
            generator_count: 100,
            generator_seed: 1,
            default_max_depth: 10_000,
            poll_seed: None,
            debug_level: 0,
            strict: false,
            keep_workdir: false,
        }
    }
}

impl HarnessConfig {
    /// Load a JSON config file; absent keys keep their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            HarnessError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        let config: HarnessConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would make checks meaningless.
    pub fn validate(&self) -> Result<()> {
        if self.seed_skip_max == 0 {
            return Err(HarnessError::Config(
                "seed_skip_max must be at least 1".to_string(),
            ));
        }
        if self.tools.make.is_empty() || self.tools.cb_test.is_empty() {
            return Err(HarnessError::Config("tool paths must not be empty".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_harness_config_default() {
        let config = HarnessConfig::default();
        assert_eq!(config.tools.make, "make");
        assert_eq!(config.tools.cb_test, "cb-test");
        assert_eq!(config.min_polls, 1000);
        assert_eq!(config.seed_skip_trials, 256);
        assert_eq!(config.sequential_io_threshold, 25);
        assert!(config.poll_seed.is_none());
        assert!(!config.strict);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("harness.json");
        std::fs::write(
            &path,
            r#"{ "min_polls": 10, "tools": { "cb_test": "/opt/bin/cb-test" } }"#,
        )
        .unwrap();

        let config = HarnessConfig::from_json_file(&path).expect("load config");
        assert_eq!(config.min_polls, 10);
        assert_eq!(config.tools.cb_test, "/opt/bin/cb-test");
        assert_eq!(config.tools.make, "make");
        assert_eq!(config.seed_skip_trials, 256);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("harness.json");
        std::fs::write(&path, r#"{ "seed_skip_max": 0 }"#).unwrap();

        let err = HarnessConfig::from_json_file(&path).unwrap_err();
        assert!(err.to_string().contains("seed_skip_max"));
    }

    #[test]
    fn test_missing_config_file() {
        let err = HarnessConfig::from_json_file(Path::new("/nonexistent/harness.json"))
            .unwrap_err();
        assert!(matches!(err, HarnessError::Config(_)));
    }
}
