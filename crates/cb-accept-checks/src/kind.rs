//! Check kinds and severity classes.

use std::fmt;
use std::str::FromStr;

use cb_accept_core::HarnessError;
use serde::{Deserialize, Serialize};

/// Lifecycle phase a check belongs to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum CheckKind {
    /// Needs `make build` (unpatched and patched binaries).
    Build,

    /// Needs `make pov`.
    Pov,

    /// Needs `make patched-so` and `make generate-polls`.
    Polls,

    /// Source-only inspection, no build.
    Static,

    /// Delegated to `make check-remote`.
    Remote,
}

impl CheckKind {
    pub const ALL: [CheckKind; 5] = [
        CheckKind::Build,
        CheckKind::Pov,
        CheckKind::Polls,
        CheckKind::Static,
        CheckKind::Remote,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            CheckKind::Build => "build",
            CheckKind::Pov => "pov",
            CheckKind::Polls => "polls",
            CheckKind::Static => "static",
            CheckKind::Remote => "remote",
        }
    }
}

impl fmt::Display for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CheckKind {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CheckKind::ALL
            .into_iter()
            .find(|k| k.name() == s.trim().to_ascii_lowercase())
            .ok_or_else(|| HarnessError::Config(format!("unknown check kind: {s}")))
    }
}

/// How a failing check affects the package verdict.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// `check_*`: failure fails the package.
    Hard,

    /// `warn_*`: failure is a warning unless strict mode is on.
    Soft,
}

impl Severity {
    /// Name prefix that carries this severity.
    pub fn prefix(&self) -> &'static str {
        match self {
            Severity::Hard => "check_",
            Severity::Soft => "warn_",
        }
    }

    /// Severity implied by a check name, if it follows the convention.
    pub fn from_name(name: &str) -> Option<Self> {
        [Severity::Hard, Severity::Soft]
            .into_iter()
            .find(|s| name.starts_with(s.prefix()) && name.len() > s.prefix().len())
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Hard => f.write_str("hard"),
            Severity::Soft => f.write_str("soft"),
        }
    }
}
