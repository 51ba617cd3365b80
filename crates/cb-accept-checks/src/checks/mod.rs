//! Built-in check bodies and their registration table.

pub mod artifacts;
pub mod build;
pub mod generator;
pub mod layout;
pub mod replay;
pub mod sequential_io;

use cb_accept_core::Result;

use crate::kind::{CheckKind, Severity};
use crate::registry::{CheckBody, CheckDescriptor, CheckRegistry};

use CheckKind::{Build, Polls, Pov, Remote, Static};

const STANDARD: &[(&str, &[CheckKind], Severity, CheckBody)] = &[
    ("check_build_determinism", &[Build], Severity::Hard, build::check_build_determinism),
    ("check_directories", &[Static], Severity::Hard, layout::check_directories),
    ("check_generator_determinism", &[Polls], Severity::Hard, generator::check_generator_determinism),
    ("check_ids", &[Build], Severity::Hard, build::check_ids),
    ("check_makefile", &[Static], Severity::Hard, layout::check_makefile),
    ("check_patched_differs", &[Build], Severity::Hard, build::check_patched_differs),
    ("check_polls", &[Polls], Severity::Hard, artifacts::check_polls),
    ("check_povs", &[Pov], Severity::Hard, artifacts::check_povs),
    ("check_remote", &[Remote], Severity::Hard, build::check_remote),
    ("check_replay_polls", &[Build, Polls], Severity::Hard, replay::check_replay_polls),
    ("check_replay_povs", &[Build, Pov], Severity::Hard, replay::check_replay_povs),
    ("check_seed_munge", &[Build, Polls], Severity::Hard, replay::check_seed_munge),
    ("check_seed_skip", &[Build, Pov], Severity::Hard, replay::check_seed_skip),
    ("check_segmented_writes", &[Build, Pov, Polls], Severity::Hard, replay::check_segmented_writes),
    ("warn_sequential_io", &[Build, Polls], Severity::Soft, sequential_io::warn_sequential_io),
];

/// Register every built-in check.
pub fn register_all(registry: &mut CheckRegistry) -> Result<()> {
    for &(name, kinds, severity, body) in STANDARD {
        registry.register(CheckDescriptor {
            name,
            kinds,
            severity,
            body,
        })?;
    }
    Ok(())
}
