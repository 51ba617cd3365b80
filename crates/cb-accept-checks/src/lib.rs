//! cb-acceptance checks
//!
//! Drives acceptance checks against challenge packages:
//! - An explicit registry of named checks tagged with lifecycle kinds
//! - A lifecycle that cleans and prepares the working copy around each check
//! - An engine that turns every failure into a recorded outcome
//! - Package and batch reports

pub mod checks;
pub mod context;
pub mod engine;
pub mod kind;
pub mod lifecycle;
pub mod outcome;
pub mod registry;
pub mod report;
pub mod tools;

// Re-export key types
pub use context::{Build, CheckContext};
pub use engine::{CheckEngine, Selection};
pub use kind::{CheckKind, Severity};
pub use outcome::{BatchReport, CheckReport, Outcome, PackageReport};
pub use registry::{CheckBody, CheckDescriptor, CheckRegistry};
pub use report::{render_package, render_registry, write_batch_report_json};
pub use tools::{GeneratorRequest, ReplayRequest, ReplaySource};
