//! External command execution.
//!
//! Commands are always spawned from an explicit argument vector; nothing is
//! ever handed to a shell.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::ProcessError;

/// One external command to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    pub env: Vec<(String, String)>,
}

impl Invocation {
    /// Render as a single line for logs and error messages.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Captured result of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, -1 when terminated by a signal.
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Seam between the harness and the operating system.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn execute(&self, invocation: &Invocation) -> std::io::Result<CommandOutput>;
}

/// Executes commands as real child processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemExecutor;

#[async_trait]
impl CommandExecutor for SystemExecutor {
    async fn execute(&self, invocation: &Invocation) -> std::io::Result<CommandOutput> {
        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args)
            .current_dir(&invocation.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        for (key, value) in &invocation.env {
            cmd.env(key, value);
        }

        let output = cmd.spawn()?.wait_with_output().await?;

        Ok(CommandOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}

/// Runs external commands inside one working directory.
#[derive(Clone)]
pub struct ProcessRunner {
    executor: Arc<dyn CommandExecutor>,
    cwd: PathBuf,
    debug_level: u8,
    make_program: String,
    poll_seed: Option<i64>,
}

impl ProcessRunner {
    pub fn new(executor: Arc<dyn CommandExecutor>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            executor,
            cwd: cwd.into(),
            debug_level: 0,
            make_program: "make".to_string(),
            poll_seed: None,
        }
    }

    /// 0 = silent, 1 = command lines, 2+ = full stream dumps.
    pub fn with_debug_level(mut self, level: u8) -> Self {
        self.debug_level = level;
        self
    }

    /// Append fixed poll seeds whenever `make_program` generates polls.
    pub fn with_poll_seed(mut self, make_program: impl Into<String>, seed: Option<i64>) -> Self {
        self.make_program = make_program.into();
        self.poll_seed = seed;
        self
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// Run a command, returning stdout on the expected exit status.
    pub async fn run(
        &self,
        program: &str,
        args: &[String],
        expect_failure: bool,
    ) -> Result<String, ProcessError> {
        self.run_with_env(program, args, &[], expect_failure).await
    }

    /// Like [`ProcessRunner::run`] with extra environment variables.
    pub async fn run_with_env(
        &self,
        program: &str,
        args: &[String],
        env: &[(String, String)],
        expect_failure: bool,
    ) -> Result<String, ProcessError> {
        let invocation = Invocation {
            program: program.to_string(),
            args: self.seeded_args(program, args),
            cwd: self.cwd.clone(),
            env: env.to_vec(),
        };
        let command = invocation.command_line();

        if self.debug_level >= 1 {
            info!(cwd = %self.cwd.display(), "running: {}", command);
        } else {
            debug!(cwd = %self.cwd.display(), "running: {}", command);
        }

        let output = self
            .executor
            .execute(&invocation)
            .await
            .map_err(|source| ProcessError::Spawn {
                command: command.clone(),
                source,
            })?;

        if self.debug_level >= 2 {
            info!(exit_code = output.exit_code, "stdout:\n{}", output.stdout);
            info!(exit_code = output.exit_code, "stderr:\n{}", output.stderr);
        }

        match (expect_failure, output.success()) {
            (false, true) | (true, false) => Ok(output.stdout),
            (true, true) => Err(ProcessError::UnexpectedSuccess {
                command,
                stdout: output.stdout,
                stderr: output.stderr,
            }),
            (false, false) => Err(ProcessError::NonZeroExit {
                command,
                exit_code: output.exit_code,
                stdout: output.stdout,
                stderr: output.stderr,
            }),
        }
    }

    fn seeded_args(&self, program: &str, args: &[String]) -> Vec<String> {
        let mut args = args.to_vec();
        let generates_polls = args.is_empty() || args.iter().any(|a| a == "generate-polls");
        if let Some(seed) = self.poll_seed {
            if program == self.make_program && generates_polls {
                args.push(format!("POLLS_RELEASE_SEED={seed}"));
                args.push(format!("POLLS_TESTING_SEED={seed}"));
            }
        }
        args
    }
}

/// Convenience for building owned argument vectors.
pub fn argv<I, S>(parts: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    parts.into_iter().map(Into::into).collect()
}
