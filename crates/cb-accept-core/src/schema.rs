//! Directory-layout validation for challenge packages.
//!
//! Rules are keyed by the location of a directory relative to the package
//! root (`""` is the root itself, `"poller/for-release"` a poll set). Each
//! variant starts from the same base table and applies an explicit overlay.
//! Nested IPC sub-packages (`cb_<n>`) are validated with the same table plus
//! a nested overlay.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;
use tracing::debug;

use crate::error::Result;
use crate::package::{Variant, VCS_DIRS};

/// Filenames rejected anywhere in a package.
pub const FORBIDDEN_FILES: &[&str] = &["libcgc.h", "libpov.h"];

/// Extensions accepted for source and header files.
pub const SOURCE_EXTENSIONS: &[&str] = &["c", "cc", "cpp", "cxx", "h", "hh", "hpp", "hxx", "s", "S"];

/// Directories that are only valid in a package without nested sub-packages.
const SINGLE_BINARY_DIRS: &[&str] = &["src", "lib", "include"];

const SUPPORT_DIR: &str = "support";

fn nested_package_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^cb_[0-9]+$").expect("valid nested package regex"))
}

fn numbered_pov_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^pov_[0-9]+$").expect("valid pov dir regex"))
}

fn pattern(re: &str) -> FilePredicate {
    FilePredicate::Pattern(Regex::new(re).expect("valid schema pattern"))
}

/// Predicate a filename must satisfy.
#[derive(Debug, Clone)]
pub enum FilePredicate {
    Pattern(Regex),
    Extensions(&'static [&'static str]),
}

impl FilePredicate {
    pub fn matches(&self, name: &str) -> bool {
        match self {
            FilePredicate::Pattern(re) => re.is_match(name),
            FilePredicate::Extensions(exts) => has_extension(name, exts),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            FilePredicate::Pattern(re) => format!("name matching {}", re.as_str()),
            FilePredicate::Extensions(exts) => format!("extension in {}", exts.join(",")),
        }
    }
}

fn has_extension(name: &str, exts: &[&str]) -> bool {
    Path::new(name)
        .extension()
        .map(|e| exts.iter().any(|x| e == *x))
        .unwrap_or(false)
}

/// A single rule attached to a location.
#[derive(Debug, Clone)]
pub enum Rule {
    /// Each named file must be present.
    RequiredFiles(Vec<&'static str>),
    /// Every file present must satisfy the predicate.
    Predicate(FilePredicate),
    /// No files may live here; subdirectories are still walked.
    Forbidden,
}

/// A delta applied on top of the base table.
#[derive(Debug, Clone)]
pub enum Overlay {
    Replace {
        location: &'static str,
        rules: Vec<Rule>,
    },
    Remove {
        location: &'static str,
    },
    NumberedPovDirs(bool),
}

/// Location-keyed rule table.
#[derive(Debug, Clone)]
pub struct RuleSet {
    locations: BTreeMap<String, Vec<Rule>>,
    numbered_pov_dirs: bool,
}

impl RuleSet {
    /// Rules shared by every variant.
    pub fn base() -> Self {
        let poll_files = r"^([A-Za-z0-9_.\-]+\.xml|machine\.py|state-graph\.yaml)$";
        let sources = || Rule::Predicate(FilePredicate::Extensions(SOURCE_EXTENSIONS));

        let mut locations = BTreeMap::new();
        locations.insert(
            String::new(),
            vec![
                Rule::RequiredFiles(vec!["Makefile", "README.md"]),
                Rule::Predicate(pattern(r"^(Makefile|README\.md)$")),
            ],
        );
        locations.insert("src".to_string(), vec![sources()]);
        locations.insert("lib".to_string(), vec![sources()]);
        locations.insert("include".to_string(), vec![sources()]);
        locations.insert("poller".to_string(), vec![Rule::Forbidden]);
        locations.insert(
            "poller/for-release".to_string(),
            vec![Rule::Predicate(pattern(poll_files))],
        );
        locations.insert(
            "poller/for-testing".to_string(),
            vec![Rule::Predicate(pattern(poll_files))],
        );
        locations.insert(
            "pov".to_string(),
            vec![Rule::Predicate(pattern(r"^POV_[0-9]{5}\.(xml|povxml)$"))],
        );
        locations.insert(
            "ids".to_string(),
            vec![Rule::Predicate(pattern(r"^[A-Za-z0-9_.\-]+\.rules$"))],
        );

        Self {
            locations,
            numbered_pov_dirs: true,
        }
    }

    /// Variant-specific deltas.
    pub fn variant_overlay(variant: Variant) -> Vec<Overlay> {
        match variant {
            Variant::Generic => Vec::new(),
            Variant::Cfe => vec![
                Overlay::Replace {
                    location: "pov",
                    rules: vec![Rule::Predicate(pattern(r"^POV_[0-9]{5}\.povxml$"))],
                },
                Overlay::Remove {
                    location: "poller/for-testing",
                },
            ],
            Variant::Cqe => vec![
                Overlay::Replace {
                    location: "pov",
                    rules: vec![Rule::Predicate(pattern(r"^POV_[0-9]{5}\.xml$"))],
                },
                Overlay::Remove { location: "ids" },
                Overlay::NumberedPovDirs(false),
            ],
        }
    }

    /// Base table with the variant overlay applied.
    pub fn for_variant(variant: Variant) -> Self {
        let mut rules = Self::base();
        rules.apply(Self::variant_overlay(variant));
        rules
    }

    /// The table used inside a `cb_<n>` sub-package: no files at its root.
    pub fn nested(&self) -> Self {
        let mut rules = self.clone();
        rules.apply([Overlay::Replace {
            location: "",
            rules: vec![Rule::Forbidden],
        }]);
        rules
    }

    pub fn apply(&mut self, overlays: impl IntoIterator<Item = Overlay>) {
        for overlay in overlays {
            match overlay {
                Overlay::Replace { location, rules } => {
                    self.locations.insert(location.to_string(), rules);
                }
                Overlay::Remove { location } => {
                    self.locations.remove(location);
                }
                Overlay::NumberedPovDirs(enabled) => self.numbered_pov_dirs = enabled,
            }
        }
    }

    pub fn rules_for(&self, location: &str) -> Option<&[Rule]> {
        self.locations.get(location).map(Vec::as_slice)
    }

    pub fn is_numbered_pov_dir(&self, location: &str) -> bool {
        self.numbered_pov_dirs && numbered_pov_re().is_match(location)
    }
}

/// What went wrong at a location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    EmptyDirectory,
    InvalidDirectory,
    MissingFile,
    UnexpectedFile,
    ForbiddenFile,
    UnexpectedSubdirectory,
    MissingDirectory,
    MisplacedDirectory,
}

/// One layout violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaViolation {
    pub kind: ViolationKind,
    /// Directory relative to the package root (`""` is the root).
    pub location: String,
    pub file: Option<String>,
    /// The rule that was broken, human readable.
    pub rule: String,
}

impl fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let location = if self.location.is_empty() {
            "."
        } else {
            self.location.as_str()
        };
        match &self.file {
            Some(file) => write!(f, "{:?} {}/{}: {}", self.kind, location, file, self.rule),
            None => write!(f, "{:?} {}: {}", self.kind, location, self.rule),
        }
    }
}

/// Walks a package tree and checks it against a [`RuleSet`].
#[derive(Debug, Clone)]
pub struct SchemaValidator {
    rules: RuleSet,
    nested_rules: RuleSet,
}

struct DirListing {
    files: Vec<String>,
    dirs: Vec<String>,
}

fn list_dir(dir: &Path) -> Result<DirListing> {
    let mut files = Vec::new();
    let mut dirs = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();
        let path = entry.path();
        if path.is_dir() {
            if !VCS_DIRS.contains(&name.as_str()) {
                dirs.push(name);
            }
        } else {
            files.push(name);
        }
    }
    files.sort();
    dirs.sort();
    Ok(DirListing { files, dirs })
}

fn join_location(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}/{name}")
    }
}

impl SchemaValidator {
    pub fn new(variant: Variant) -> Self {
        Self::with_rules(RuleSet::for_variant(variant))
    }

    pub fn with_rules(rules: RuleSet) -> Self {
        let nested_rules = rules.nested();
        Self {
            rules,
            nested_rules,
        }
    }

    /// Validate the tree at `root`, returning every violation found.
    pub fn validate(&self, root: &Path) -> Result<Vec<SchemaViolation>> {
        let mut violations = Vec::new();
        // (sub-package root, location prefix relative to `root`, nested?)
        let mut pending: Vec<(PathBuf, String, bool)> = vec![(root.to_path_buf(), String::new(), false)];
        let mut nested_count = 0usize;

        while let Some((package_root, prefix, nested)) = pending.pop() {
            debug!(package = %package_root.display(), nested, "validating layout");
            let rules = if nested { &self.nested_rules } else { &self.rules };
            let mut stack = vec![(package_root.clone(), String::new())];

            while let Some((dir, location)) = stack.pop() {
                let shown = join_location(&prefix, &location);

                if !nested
                    && (location == SUPPORT_DIR || location.starts_with("support/"))
                {
                    continue;
                }

                let listing = list_dir(&dir)?;
                if listing.files.is_empty() && listing.dirs.is_empty() {
                    violations.push(SchemaViolation {
                        kind: ViolationKind::EmptyDirectory,
                        location: shown,
                        file: None,
                        rule: "directories must not be empty".to_string(),
                    });
                    continue;
                }

                for file in &listing.files {
                    if FORBIDDEN_FILES.contains(&file.as_str()) {
                        violations.push(SchemaViolation {
                            kind: ViolationKind::ForbiddenFile,
                            location: shown.clone(),
                            file: Some(file.clone()),
                            rule: "file is provided by the platform and must not be shipped"
                                .to_string(),
                        });
                    }
                }

                if rules.is_numbered_pov_dir(&location) {
                    for sub in &listing.dirs {
                        violations.push(SchemaViolation {
                            kind: ViolationKind::UnexpectedSubdirectory,
                            location: shown.clone(),
                            file: Some(sub.clone()),
                            rule: "PoV source directories must be flat".to_string(),
                        });
                    }
                    for file in &listing.files {
                        if !has_extension(file, SOURCE_EXTENSIONS) {
                            violations.push(SchemaViolation {
                                kind: ViolationKind::UnexpectedFile,
                                location: shown.clone(),
                                file: Some(file.clone()),
                                rule: "PoV sources must be source or header files".to_string(),
                            });
                        }
                    }
                    continue;
                }

                match rules.rules_for(&location) {
                    None => violations.push(SchemaViolation {
                        kind: ViolationKind::InvalidDirectory,
                        location: shown.clone(),
                        file: None,
                        rule: "invalid directory".to_string(),
                    }),
                    Some(location_rules) => {
                        check_files(location_rules, &shown, &listing.files, &mut violations)
                    }
                }

                for sub in listing.dirs.iter().rev() {
                    let child = dir.join(sub);
                    if !nested && location.is_empty() && nested_package_re().is_match(sub) {
                        nested_count += 1;
                        pending.push((child, join_location(&prefix, sub), true));
                    } else {
                        stack.push((child, join_location(&location, sub)));
                    }
                }
            }

            if nested && !package_root.join("src").is_dir() {
                violations.push(SchemaViolation {
                    kind: ViolationKind::MissingDirectory,
                    location: prefix.clone(),
                    file: Some("src".to_string()),
                    rule: "sub-packages must have a src directory".to_string(),
                });
            }
        }

        if nested_count > 0 {
            for dir in SINGLE_BINARY_DIRS {
                if root.join(dir).is_dir() {
                    violations.push(SchemaViolation {
                        kind: ViolationKind::MisplacedDirectory,
                        location: String::new(),
                        file: Some(dir.to_string()),
                        rule: "packages with cb_<n> sub-packages must not have a top-level source tree"
                            .to_string(),
                    });
                }
            }
        } else if !root.join("src").is_dir() {
            violations.push(SchemaViolation {
                kind: ViolationKind::MissingDirectory,
                location: String::new(),
                file: Some("src".to_string()),
                rule: "src directory is required".to_string(),
            });
        }

        Ok(violations)
    }
}

fn check_files(rules: &[Rule], location: &str, files: &[String], out: &mut Vec<SchemaViolation>) {
    for rule in rules {
        match rule {
            Rule::RequiredFiles(names) => {
                for name in names {
                    if !files.iter().any(|f| f == name) {
                        out.push(SchemaViolation {
                            kind: ViolationKind::MissingFile,
                            location: location.to_string(),
                            file: Some(name.to_string()),
                            rule: "required file".to_string(),
                        });
                    }
                }
            }
            Rule::Predicate(predicate) => {
                for file in files {
                    if !predicate.matches(file) {
                        out.push(SchemaViolation {
                            kind: ViolationKind::UnexpectedFile,
                            location: location.to_string(),
                            file: Some(file.clone()),
                            rule: format!("expected {}", predicate.describe()),
                        });
                    }
                }
            }
            Rule::Forbidden => {
                for file in files {
                    out.push(SchemaViolation {
                        kind: ViolationKind::UnexpectedFile,
                        location: location.to_string(),
                        file: Some(file.clone()),
                        rule: "no files permitted here".to_string(),
                    });
                }
            }
        }
    }
}

/// Validate `root` with the rules for `variant`.
pub fn validate_tree(root: &Path, variant: Variant) -> Result<Vec<SchemaViolation>> {
    SchemaValidator::new(variant).validate(root)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variant_overlays() {
        let generic = RuleSet::for_variant(Variant::Generic);
        assert!(generic.rules_for("poller/for-testing").is_some());
        assert!(generic.rules_for("ids").is_some());
        assert!(generic.is_numbered_pov_dir("pov_1"));

        let cfe = RuleSet::for_variant(Variant::Cfe);
        assert!(cfe.rules_for("poller/for-testing").is_none());
        assert!(cfe.is_numbered_pov_dir("pov_12"));

        let cqe = RuleSet::for_variant(Variant::Cqe);
        assert!(cqe.rules_for("ids").is_none());
        assert!(!cqe.is_numbered_pov_dir("pov_1"));
    }

    #[test]
    fn test_pov_patterns_per_variant() {
        let accepts = |variant: Variant, name: &str| {
            RuleSet::for_variant(variant)
                .rules_for("pov")
                .unwrap()
                .iter()
                .all(|r| match r {
                    Rule::Predicate(p) => p.matches(name),
                    _ => true,
                })
        };
        assert!(accepts(Variant::Generic, "POV_00001.xml"));
        assert!(accepts(Variant::Generic, "POV_00001.povxml"));
        assert!(accepts(Variant::Cqe, "POV_00001.xml"));
        assert!(!accepts(Variant::Cqe, "POV_00001.povxml"));
        assert!(accepts(Variant::Cfe, "POV_00001.povxml"));
        assert!(!accepts(Variant::Cfe, "POV_00001.xml"));
    }

    #[test]
    fn test_nested_overlay_forbids_root_files() {
        let nested = RuleSet::base().nested();
        assert!(matches!(nested.rules_for("").unwrap(), [Rule::Forbidden]));
        assert!(nested.rules_for("src").is_some());
    }

    #[test]
    fn test_extension_predicate() {
        let p = FilePredicate::Extensions(SOURCE_EXTENSIONS);
        assert!(p.matches("service.c"));
        assert!(p.matches("service.h"));
        assert!(!p.matches("notes.txt"));
        assert!(!p.matches("Makefile"));
    }

    #[test]
    fn test_violation_display() {
        let v = SchemaViolation {
            kind: ViolationKind::UnexpectedFile,
            location: "src".to_string(),
            file: Some("notes.txt".to_string()),
            rule: "expected source".to_string(),
        };
        assert_eq!(v.to_string(), "UnexpectedFile src/notes.txt: expected source");
    }
}
