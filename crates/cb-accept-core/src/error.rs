//! Error taxonomy for acceptance runs.

/// Failure of an external command.
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("command `{command}` exited with code {exit_code}")]
    NonZeroExit {
        command: String,
        exit_code: i32,
        stdout: String,
        stderr: String,
    },

    #[error("command `{command}` expected to fail, but did not")]
    UnexpectedSuccess {
        command: String,
        stdout: String,
        stderr: String,
    },

    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

impl ProcessError {
    /// Captured stdout, when the process got far enough to produce any.
    pub fn stdout(&self) -> &str {
        match self {
            ProcessError::NonZeroExit { stdout, .. } => stdout,
            ProcessError::UnexpectedSuccess { stdout, .. } => stdout,
            ProcessError::Spawn { .. } => "",
        }
    }

    /// The rendered command line.
    pub fn command(&self) -> &str {
        match self {
            ProcessError::NonZeroExit { command, .. } => command,
            ProcessError::UnexpectedSuccess { command, .. } => command,
            ProcessError::Spawn { command, .. } => command,
        }
    }
}

/// Harness errors.
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error("assertion failed: {0}")]
    Assertion(String),

    #[error("invalid package: {0}")]
    InvalidPackage(String),

    #[error("unknown check: {0}")]
    UnknownCheck(String),

    #[error("duplicate check: {0}")]
    DuplicateCheck(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl HarnessError {
    /// Shorthand for an assertion-style failure.
    pub fn assertion(message: impl Into<String>) -> Self {
        HarnessError::Assertion(message.into())
    }
}

/// Result type for harness operations.
pub type Result<T> = std::result::Result<T, HarnessError>;

/// Fail with an assertion error unless `cond` holds.
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $($arg:tt)+) => {
        if !$cond {
            return Err($crate::HarnessError::Assertion(format!($($arg)+)));
        }
    };
}
