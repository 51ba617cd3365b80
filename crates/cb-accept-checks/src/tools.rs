//! Argument vectors for the external collaborators.

use std::path::{Path, PathBuf};

use cb_accept_core::{HarnessError, Result, ToolPaths};

/// Environment variable through which the trace shim learns where to write.
pub const TRACE_FILE_ENV: &str = "CB_TRACE_FILE";

/// Where the replay tool reads exchanges from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplaySource {
    /// Explicit poll or PoV files.
    Files(Vec<PathBuf>),
    /// Every poll in a directory.
    Directory(PathBuf),
}

/// One invocation of the replay tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayRequest {
    pub directory: PathBuf,
    pub binaries: Vec<String>,
    pub source: ReplaySource,
    pub should_core: bool,
    pub failure_ok: bool,
    pub negotiate_seed: bool,
    pub seed_skip: Option<u32>,
    pub seed_munge: bool,
    pub max_send: Option<u32>,
    pub timeout_secs: Option<u64>,
    pub wrapper: Option<String>,
    pub env: Vec<(String, String)>,
    pub debug: bool,
}

impl ReplayRequest {
    pub fn new(directory: impl Into<PathBuf>, binaries: Vec<String>, source: ReplaySource) -> Self {
        Self {
            directory: directory.into(),
            binaries,
            source,
            should_core: false,
            failure_ok: false,
            negotiate_seed: false,
            seed_skip: None,
            seed_munge: false,
            max_send: None,
            timeout_secs: None,
            wrapper: None,
            env: Vec::new(),
            debug: false,
        }
    }

    /// The binary must crash.
    pub fn should_core(mut self) -> Self {
        self.should_core = true;
        self
    }

    /// A failed exchange is tolerated.
    pub fn failure_ok(mut self) -> Self {
        self.failure_ok = true;
        self
    }

    pub fn negotiate_seed(mut self) -> Self {
        self.negotiate_seed = true;
        self
    }

    pub fn seed_skip(mut self, skip: u32) -> Self {
        self.seed_skip = Some(skip);
        self
    }

    pub fn seed_munge(mut self) -> Self {
        self.seed_munge = true;
        self
    }

    /// Cap each send at `bytes` and wait up to `timeout_secs`.
    pub fn segmented(mut self, bytes: u32, timeout_secs: u64) -> Self {
        self.max_send = Some(bytes);
        self.timeout_secs = Some(timeout_secs);
        self
    }

    pub fn wrapper(mut self, shim: impl Into<String>) -> Self {
        self.wrapper = Some(shim.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn debug(mut self, enabled: bool) -> Self {
        self.debug = enabled;
        self
    }

    pub fn argv(&self) -> Vec<String> {
        let mut args = vec!["--directory".to_string(), display(&self.directory)];

        args.push("--cb".to_string());
        args.extend(self.binaries.iter().cloned());

        match &self.source {
            ReplaySource::Files(files) => {
                args.push("--xml".to_string());
                args.extend(files.iter().map(|f| display(f)));
            }
            ReplaySource::Directory(dir) => {
                args.push("--xml_dir".to_string());
                args.push(display(dir));
            }
        }

        if self.should_core {
            args.push("--should_core".to_string());
        }
        if self.failure_ok {
            args.push("--failure_ok".to_string());
        }
        if self.negotiate_seed {
            args.push("--negotiate_seed".to_string());
        }
        if let Some(skip) = self.seed_skip {
            args.push("--cb_seed_skip".to_string());
            args.push(skip.to_string());
        }
        if self.seed_munge {
            args.push("--cb_seed_munge".to_string());
        }
        if let Some(bytes) = self.max_send {
            args.push("--max_send".to_string());
            args.push(bytes.to_string());
        }
        if let Some(timeout) = self.timeout_secs {
            args.push("--timeout".to_string());
            args.push(timeout.to_string());
        }
        if let Some(wrapper) = &self.wrapper {
            args.push("--wrapper".to_string());
            args.push(wrapper.clone());
        }
        for (key, value) in &self.env {
            args.push("--cb_env".to_string());
            args.push(format!("{key}={value}"));
        }
        if self.debug {
            args.push("--debug".to_string());
        }
        args
    }
}

/// One invocation of the poll generator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorRequest {
    pub machine: PathBuf,
    pub graph: PathBuf,
    pub output: PathBuf,
    pub count: Option<u32>,
    pub seed: Option<i64>,
    pub depth: Option<u64>,
}

impl GeneratorRequest {
    pub fn argv(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(count) = self.count {
            args.push("--count".to_string());
            args.push(count.to_string());
        }
        if let Some(seed) = self.seed {
            args.push("--seed".to_string());
            args.push(seed.to_string());
        }
        if let Some(depth) = self.depth {
            args.push("--depth".to_string());
            args.push(depth.to_string());
        }
        args.push(display(&self.machine));
        args.push(display(&self.graph));
        args.push(display(&self.output));
        args
    }
}

/// Verifier program for a PoV artifact, chosen by extension.
pub fn pov_verifier<'a>(tools: &'a ToolPaths, pov: &Path) -> Result<&'a str> {
    match pov.extension().and_then(|e| e.to_str()) {
        Some("xml") | Some("povxml") => Ok(tools.xml_verifier.as_str()),
        Some("pov") => Ok(tools.pov_verifier.as_str()),
        _ => Err(HarnessError::assertion(format!(
            "no verifier for PoV {}",
            pov.display()
        ))),
    }
}

fn display(path: &Path) -> String {
    path.to_string_lossy().to_string()
}
