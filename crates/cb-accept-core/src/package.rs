//! Challenge packages and their isolated working copies.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tempfile::TempDir;
use tracing::info;

use crate::error::{HarnessError, Result};

/// Version-control metadata directories, never copied or validated.
pub const VCS_DIRS: &[&str] = &[".git", ".svn", ".hg"];

/// Package flavor selecting which schema and manifest rules apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    #[default]
    Generic,
    Cqe,
    Cfe,
}

impl Variant {
    pub fn name(&self) -> &'static str {
        match self {
            Variant::Generic => "generic",
            Variant::Cqe => "cqe",
            Variant::Cfe => "cfe",
        }
    }

    /// Whether the package ships a `poller/for-testing` poll set.
    pub fn has_testing_polls(&self) -> bool {
        !matches!(self, Variant::Cfe)
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Variant {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "generic" => Ok(Variant::Generic),
            "cqe" => Ok(Variant::Cqe),
            "cfe" => Ok(Variant::Cfe),
            other => Err(HarnessError::Config(format!("unknown variant: {other}"))),
        }
    }
}

fn package_name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Z0-9]{5}_[0-9]{5}$").expect("valid package name regex"))
}

/// Whether `name` follows the `AAAAA_00001` convention.
pub fn is_valid_package_name(name: &str) -> bool {
    package_name_re().is_match(name)
}

/// A challenge package on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Package {
    pub name: String,
    pub root: PathBuf,
    pub variant: Variant,
}

impl Package {
    /// Open and sanity-check a package directory.
    pub fn open(path: &Path, variant: Variant) -> Result<Self> {
        if !path.is_dir() {
            return Err(HarnessError::InvalidPackage(format!(
                "{} is not a directory",
                path.display()
            )));
        }
        let root = path.canonicalize()?;
        let name = root
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        if !is_valid_package_name(&name) {
            return Err(HarnessError::InvalidPackage(format!(
                "package name '{name}' does not match AAAAA_00001"
            )));
        }
        if !root.join("Makefile").is_file() {
            return Err(HarnessError::InvalidPackage(format!(
                "{name} has no top-level Makefile"
            )));
        }

        Ok(Self {
            name,
            root,
            variant,
        })
    }

    /// `AAAAA` half of the package name.
    pub fn author_id(&self) -> &str {
        self.name.split('_').next().unwrap_or_default()
    }

    /// `00001` half of the package name.
    pub fn service_id(&self) -> &str {
        self.name.split('_').nth(1).unwrap_or_default()
    }

    /// Copy the package into a fresh temporary directory.
    pub fn working_copy(&self, keep: bool) -> Result<WorkingCopy> {
        let temp = tempfile::Builder::new()
            .prefix("cb-accept-")
            .tempdir()?;
        let dir = temp.path().join(&self.name);
        copy_tree(&self.root, &dir)?;
        Ok(WorkingCopy {
            package: Package {
                name: self.name.clone(),
                root: dir,
                variant: self.variant,
            },
            temp: Some(temp),
            keep,
        })
    }
}

/// A package copied into an isolated directory.
///
/// The directory is removed on drop unless it was asked to be kept.
#[derive(Debug)]
pub struct WorkingCopy {
    package: Package,
    temp: Option<TempDir>,
    keep: bool,
}

impl WorkingCopy {
    pub fn package(&self) -> &Package {
        &self.package
    }

    pub fn path(&self) -> &Path {
        &self.package.root
    }
}

impl Drop for WorkingCopy {
    fn drop(&mut self) {
        if !self.keep {
            return;
        }
        if let Some(temp) = self.temp.take() {
            let retained = temp.keep();
            info!(package = %self.package.name, path = %retained.display(), "retained working copy");
        }
    }
}

/// Recursively copy `src` into `dst`, skipping VCS metadata.
pub fn copy_tree(src: &Path, dst: &Path) -> Result<()> {
    std::fs::create_dir_all(dst)?;
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let path = entry.path();
        let name = entry.file_name();
        if VCS_DIRS.iter().any(|d| name == *d) {
            continue;
        }
        let target = dst.join(&name);
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            copy_tree(&path, &target)?;
        } else if file_type.is_file() {
            std::fs::copy(&path, &target)?;
        } else if file_type.is_symlink() {
            // Follow links so the copy is self-contained.
            if path.is_dir() {
                copy_tree(&path, &target)?;
            } else if path.is_file() {
                std::fs::copy(&path, &target)?;
            }
        }
    }
    Ok(())
}

/// Well-known locations inside a package.
pub mod layout {
    pub const BIN_DIR: &str = "bin";
    pub const POV_DIR: &str = "pov";
    pub const IDS_DIR: &str = "ids";
    pub const POLLS_RELEASE: &str = "poller/for-release";
    pub const POLLS_TESTING: &str = "poller/for-testing";
    pub const MANIFEST: &str = "Makefile";
    pub const STATE_MACHINE: &str = "machine.py";
    pub const STATE_GRAPH: &str = "state-graph.yaml";
    pub const PATCHED_MARKER: &str = "_patched";
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_package(parent: &Path, name: &str) -> PathBuf {
        let root = parent.join(name);
        std::fs::create_dir_all(root.join("src")).unwrap();
        std::fs::write(root.join("Makefile"), "SERVICE_ID=00001\n").unwrap();
        std::fs::write(root.join("src/service.c"), "int main(void) { return 0; }\n").unwrap();
        root
    }

    #[test]
    fn test_variant_parse() {
        assert_eq!("cqe".parse::<Variant>().unwrap(), Variant::Cqe);
        assert_eq!("CFE".parse::<Variant>().unwrap(), Variant::Cfe);
        assert_eq!("".parse::<Variant>().unwrap(), Variant::Generic);
        assert!("cgc".parse::<Variant>().is_err());
        assert!(!Variant::Cfe.has_testing_polls());
        assert!(Variant::Generic.has_testing_polls());
    }

    #[test]
    fn test_package_name_pattern() {
        assert!(is_valid_package_name("AAAAA_00001"));
        assert!(is_valid_package_name("CROMU_00042"));
        assert!(!is_valid_package_name("aaaaa_00001"));
        assert!(!is_valid_package_name("AAAA_00001"));
        assert!(!is_valid_package_name("AAAAA_0001"));
        assert!(!is_valid_package_name("AAAAA-00001"));
    }

    #[test]
    fn test_open_valid_package() {
        let dir = tempfile::tempdir().unwrap();
        let root = make_package(dir.path(), "AAAAA_00001");
        let package = Package::open(&root, Variant::Generic).unwrap();
        assert_eq!(package.name, "AAAAA_00001");
        assert_eq!(package.author_id(), "AAAAA");
        assert_eq!(package.service_id(), "00001");
    }

    #[test]
    fn test_open_rejects_bad_name() {
        let dir = tempfile::tempdir().unwrap();
        let root = make_package(dir.path(), "not_a_package");
        let err = Package::open(&root, Variant::Generic).unwrap_err();
        assert!(matches!(err, HarnessError::InvalidPackage(_)));
    }

    #[test]
    fn test_open_requires_makefile() {
        let dir = tempfile::tempdir().unwrap();
        let root = make_package(dir.path(), "AAAAA_00001");
        std::fs::remove_file(root.join("Makefile")).unwrap();
        let err = Package::open(&root, Variant::Generic).unwrap_err();
        assert!(err.to_string().contains("Makefile"));
    }

    #[test]
    fn test_working_copy_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let root = make_package(dir.path(), "AAAAA_00001");
        std::fs::create_dir_all(root.join(".git/objects")).unwrap();
        let package = Package::open(&root, Variant::Cqe).unwrap();

        let copy = package.working_copy(false).unwrap();
        let path = copy.path().to_path_buf();
        assert!(path.join("src/service.c").is_file());
        assert!(!path.join(".git").exists());
        assert_eq!(copy.package().variant, Variant::Cqe);
        drop(copy);
        assert!(!path.exists());
    }

    #[test]
    fn test_working_copy_kept() {
        let dir = tempfile::tempdir().unwrap();
        let root = make_package(dir.path(), "AAAAA_00001");
        let package = Package::open(&root, Variant::Generic).unwrap();

        let copy = package.working_copy(true).unwrap();
        let path = copy.path().to_path_buf();
        drop(copy);
        assert!(path.join("Makefile").is_file());
        std::fs::remove_dir_all(path.parent().unwrap()).unwrap();
    }
}
