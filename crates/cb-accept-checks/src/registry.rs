//! Explicit registry of named checks.

use std::collections::BTreeMap;
use std::fmt;

use futures::future::BoxFuture;

use cb_accept_core::{HarnessError, Result};

use crate::context::CheckContext;
use crate::kind::{CheckKind, Severity};

/// A check body: an async predicate over a prepared package.
pub type CheckBody = for<'a> fn(&'a CheckContext) -> BoxFuture<'a, Result<()>>;

/// Everything the engine needs to schedule and run one check.
#[derive(Clone)]
pub struct CheckDescriptor {
    pub name: &'static str,
    pub kinds: &'static [CheckKind],
    pub severity: Severity,
    pub body: CheckBody,
}

impl CheckDescriptor {
    pub fn has_kind(&self, kind: CheckKind) -> bool {
        self.kinds.contains(&kind)
    }

    /// Whether the check runs under an optional kind filter.
    pub fn selected_by(&self, filter: Option<CheckKind>) -> bool {
        filter.map_or(true, |kind| self.has_kind(kind))
    }
}

impl fmt::Debug for CheckDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CheckDescriptor")
            .field("name", &self.name)
            .field("kinds", &self.kinds)
            .field("severity", &self.severity)
            .finish()
    }
}

/// Checks keyed by name; iteration is in name order.
#[derive(Debug, Default, Clone)]
pub struct CheckRegistry {
    checks: BTreeMap<&'static str, CheckDescriptor>,
}

impl CheckRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every built-in check.
    pub fn standard() -> Result<Self> {
        let mut registry = Self::new();
        crate::checks::register_all(&mut registry)?;
        Ok(registry)
    }

    /// Add a check. Names are unique and their prefix must match the severity.
    pub fn register(&mut self, descriptor: CheckDescriptor) -> Result<()> {
        if Severity::from_name(descriptor.name) != Some(descriptor.severity) {
            return Err(HarnessError::Config(format!(
                "check {} must be named {}<name> for {} severity",
                descriptor.name,
                descriptor.severity.prefix(),
                descriptor.severity
            )));
        }
        if self.checks.contains_key(descriptor.name) {
            return Err(HarnessError::DuplicateCheck(descriptor.name.to_string()));
        }
        self.checks.insert(descriptor.name, descriptor);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&CheckDescriptor> {
        self.checks.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CheckDescriptor> {
        self.checks.values()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.checks.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.checks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }
}
