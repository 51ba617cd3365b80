//! cb-acceptance core library
//!
//! Building blocks used by the check engine:
//! - `process`: argv-only external command runner with a swappable executor
//! - `checksum`: order-independent fingerprints over file sets
//! - `schema`: recursive package layout validation
//! - `manifest`: build manifest validation
//! - `trace`: sequential-I/O detection over execution traces

pub mod checksum;
pub mod config;
pub mod error;
pub mod fakes;
pub mod manifest;
pub mod package;
pub mod process;
pub mod schema;
pub mod telemetry;
pub mod trace;

pub use checksum::{checksum, duplicate_files, files_in, hash_file, Fingerprint};
pub use config::{HarnessConfig, ToolPaths};
pub use error::{HarnessError, ProcessError, Result};
pub use manifest::{
    validate_file as validate_manifest, Manifest, ManifestReport, ManifestSchema,
    ManifestViolation, ValueRule, INCLUDE_DIRECTIVE,
};
pub use package::{is_valid_package_name, layout, Package, Variant, WorkingCopy};
pub use process::{argv, CommandExecutor, CommandOutput, Invocation, ProcessRunner, SystemExecutor};
pub use schema::{
    validate_tree, FilePredicate, Overlay, Rule, RuleSet, SchemaValidator, SchemaViolation,
    ViolationKind,
};
pub use telemetry::{init_tracing, level_for_debug};
pub use trace::{find_sequential_run, Direction, SequentialRun};

/// cb-acceptance version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
