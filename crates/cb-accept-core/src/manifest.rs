//! Build manifest validation.
//!
//! The manifest is a restricted `KEY = value` file whose last non-blank line
//! must be the shared build include. Full-line comments (first character `#`)
//! are skipped; a `#` anywhere else is rejected, as are shell metacharacters.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::Path;

use serde::Serialize;

use crate::error::Result;
use crate::package::Variant;

/// The directive every manifest must end with.
pub const INCLUDE_DIRECTIVE: &str = "include /usr/share/cb-testing/cgc-cb.mk";

/// Characters that would let a manifest line escape into a shell.
pub const SHELL_METACHARACTERS: &[char] = &[';', '|', '>', '<', '`', '(', ')', '!', '$'];

/// Value constraint for a manifest key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueRule {
    /// ASCII digits only.
    Numeric,
    /// Optional leading `-`, then ASCII digits.
    SignedNumeric,
    /// Anything goes.
    Any,
}

impl ValueRule {
    pub fn accepts(&self, value: &str) -> bool {
        let digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
        match self {
            ValueRule::Numeric => digits(value),
            ValueRule::SignedNumeric => digits(value.strip_prefix('-').unwrap_or(value)),
            ValueRule::Any => true,
        }
    }
}

/// Required and optional keys for one variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestSchema {
    pub required: BTreeMap<&'static str, ValueRule>,
    pub optional: BTreeMap<&'static str, ValueRule>,
}

impl ManifestSchema {
    /// The base table, used as-is for `cqe`.
    pub fn base() -> Self {
        let required = BTreeMap::from([
            ("AUTHOR_ID", ValueRule::Any),
            ("SERVICE_ID", ValueRule::Numeric),
        ]);
        let optional = BTreeMap::from([
            ("CFLAGS", ValueRule::Any),
            ("CXXFLAGS", ValueRule::Any),
            ("LDFLAGS", ValueRule::Any),
            ("NO_STRIP", ValueRule::Numeric),
            ("POLLS_RELEASE_COUNT", ValueRule::Numeric),
            ("POLLS_RELEASE_SEED", ValueRule::SignedNumeric),
            ("POLLS_RELEASE_MAX_DEPTH", ValueRule::Numeric),
            ("POLLS_TESTING_COUNT", ValueRule::Numeric),
            ("POLLS_TESTING_SEED", ValueRule::SignedNumeric),
            ("POLLS_TESTING_MAX_DEPTH", ValueRule::Numeric),
        ]);
        Self { required, optional }
    }

    pub fn for_variant(variant: Variant) -> Self {
        let mut schema = Self::base();
        match variant {
            Variant::Cqe => {}
            Variant::Generic => {
                schema.optional.insert("VULN_COUNT", ValueRule::Numeric);
            }
            Variant::Cfe => {
                schema.required.insert("VULN_COUNT", ValueRule::Numeric);
                // Count and seed keys go, except the release count; depth keys stay.
                for key in [
                    "POLLS_RELEASE_SEED",
                    "POLLS_TESTING_COUNT",
                    "POLLS_TESTING_SEED",
                ] {
                    schema.optional.remove(key);
                }
            }
        }
        schema
    }

    fn rule_for(&self, key: &str) -> Option<ValueRule> {
        self.required
            .get(key)
            .or_else(|| self.optional.get(key))
            .copied()
    }
}

/// Why a manifest line was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ManifestViolation {
    InlineComment { line: usize },
    ShellMetacharacter { line: usize, character: char },
    MissingInclude { found: Option<String> },
    NotAnAssignment { line: usize },
    UnknownKey { line: usize, key: String },
    InvalidValue { line: usize, key: String, value: String },
    DuplicateKey { line: usize, key: String },
    MissingRequiredKey { key: String },
}

impl fmt::Display for ManifestViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InlineComment { line } => write!(f, "line {line}: comments are not allowed"),
            Self::ShellMetacharacter { line, character } => {
                write!(f, "line {line}: shell metacharacter '{character}' not allowed")
            }
            Self::MissingInclude { found: Some(found) } => write!(
                f,
                "last line must be '{INCLUDE_DIRECTIVE}', found '{found}'"
            ),
            Self::MissingInclude { found: None } => {
                write!(f, "manifest is empty; expected '{INCLUDE_DIRECTIVE}'")
            }
            Self::NotAnAssignment { line } => write!(f, "line {line}: expected KEY=value"),
            Self::UnknownKey { line, key } => write!(f, "line {line}: unknown variable {key}"),
            Self::InvalidValue { line, key, value } => {
                write!(f, "line {line}: invalid value for {key}: '{value}'")
            }
            Self::DuplicateKey { line, key } => write!(f, "line {line}: duplicate variable {key}"),
            Self::MissingRequiredKey { key } => write!(f, "missing required variable {key}"),
        }
    }
}

/// Parsed assignments, in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    pub entries: Vec<(String, String)>,
}

impl Manifest {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Manifest plus every violation found while reading it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestReport {
    pub manifest: Manifest,
    pub violations: Vec<ManifestViolation>,
}

impl ManifestReport {
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Validate manifest text for `variant`.
pub fn validate_str(content: &str, variant: Variant) -> ManifestReport {
    let schema = ManifestSchema::for_variant(variant);
    let mut report = ManifestReport::default();

    let lines: Vec<(usize, &str)> = content
        .lines()
        .enumerate()
        .map(|(i, l)| (i + 1, l))
        .filter(|(_, l)| !l.trim().is_empty())
        .collect();

    let include_line = match lines.last() {
        Some((number, line)) if line.trim() == INCLUDE_DIRECTIVE => Some(*number),
        Some((_, line)) => {
            report.violations.push(ManifestViolation::MissingInclude {
                found: Some(line.trim().to_string()),
            });
            None
        }
        None => {
            report
                .violations
                .push(ManifestViolation::MissingInclude { found: None });
            None
        }
    };

    let mut seen = HashSet::new();
    for (number, line) in lines {
        if Some(number) == include_line {
            continue;
        }
        if line.starts_with('#') {
            continue;
        }
        if line.contains('#') {
            report
                .violations
                .push(ManifestViolation::InlineComment { line: number });
        }
        if let Some(character) = line.chars().find(|c| SHELL_METACHARACTERS.contains(c)) {
            report.violations.push(ManifestViolation::ShellMetacharacter {
                line: number,
                character,
            });
        }

        let Some((raw_key, raw_value)) = line.split_once('=') else {
            report
                .violations
                .push(ManifestViolation::NotAnAssignment { line: number });
            continue;
        };
        let key = raw_key.trim_end().to_string();
        let value = raw_value.trim().to_string();

        if !seen.insert(key.clone()) {
            report.violations.push(ManifestViolation::DuplicateKey {
                line: number,
                key: key.clone(),
            });
        }

        match schema.rule_for(&key) {
            None => report
                .violations
                .push(ManifestViolation::UnknownKey { line: number, key: key.clone() }),
            Some(rule) if !rule.accepts(&value) => {
                report.violations.push(ManifestViolation::InvalidValue {
                    line: number,
                    key: key.clone(),
                    value: value.clone(),
                })
            }
            Some(_) => {}
        }

        report.manifest.entries.push((key, value));
    }

    for key in schema.required.keys() {
        if !seen.contains(*key) {
            report.violations.push(ManifestViolation::MissingRequiredKey {
                key: key.to_string(),
            });
        }
    }

    report
}

/// Read and validate the manifest at `path`.
pub fn validate_file(path: &Path, variant: Variant) -> Result<ManifestReport> {
    let content = std::fs::read_to_string(path)?;
    Ok(validate_str(&content, variant))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest(body: &str) -> String {
        format!("{body}\n{INCLUDE_DIRECTIVE}\n")
    }

    #[test]
    fn test_minimal_manifest_is_valid() {
        let report = validate_str(
            &manifest("SERVICE_ID=00001\nAUTHOR_ID=AAAAA"),
            Variant::Generic,
        );
        assert!(report.is_valid(), "{:?}", report.violations);
        assert_eq!(report.manifest.get("SERVICE_ID"), Some("00001"));
        assert_eq!(report.manifest.get("AUTHOR_ID"), Some("AAAAA"));
    }

    #[test]
    fn test_spacing_around_equals() {
        let report = validate_str(
            &manifest("SERVICE_ID = 00001\nAUTHOR_ID   =  AAAAA  \nCFLAGS = -O0 -g -Werror"),
            Variant::Cqe,
        );
        assert!(report.is_valid(), "{:?}", report.violations);
        assert_eq!(report.manifest.get("CFLAGS"), Some("-O0 -g -Werror"));
    }

    #[test]
    fn test_missing_include_rejected() {
        let report = validate_str("SERVICE_ID=00001\nAUTHOR_ID=AAAAA\n", Variant::Generic);
        assert!(report
            .violations
            .iter()
            .any(|v| matches!(v, ManifestViolation::MissingInclude { .. })));
    }

    #[test]
    fn test_include_must_be_last() {
        let content = format!("SERVICE_ID=00001\n{INCLUDE_DIRECTIVE}\nAUTHOR_ID=AAAAA\n");
        let report = validate_str(&content, Variant::Generic);
        assert!(report
            .violations
            .contains(&ManifestViolation::MissingInclude {
                found: Some("AUTHOR_ID=AAAAA".to_string())
            }));
        assert!(report
            .violations
            .contains(&ManifestViolation::NotAnAssignment { line: 2 }));
    }

    #[test]
    fn test_trailing_blank_lines_ignored() {
        let content = format!("SERVICE_ID=00001\nAUTHOR_ID=AAAAA\n{INCLUDE_DIRECTIVE}\n\n\n");
        assert!(validate_str(&content, Variant::Generic).is_valid());
    }

    #[test]
    fn test_empty_manifest() {
        let report = validate_str("", Variant::Generic);
        assert!(report
            .violations
            .contains(&ManifestViolation::MissingInclude { found: None }));
        assert!(report
            .violations
            .contains(&ManifestViolation::MissingRequiredKey {
                key: "SERVICE_ID".to_string()
            }));
    }

    #[test]
    fn test_duplicate_key_rejected() {
        let report = validate_str(
            &manifest("SERVICE_ID=00001\nAUTHOR_ID=AAAAA\nSERVICE_ID=00002"),
            Variant::Generic,
        );
        assert_eq!(
            report.violations,
            vec![ManifestViolation::DuplicateKey {
                line: 3,
                key: "SERVICE_ID".to_string()
            }]
        );
    }

    #[test]
    fn test_missing_required_key() {
        let report = validate_str(&manifest("AUTHOR_ID=AAAAA"), Variant::Generic);
        assert_eq!(
            report.violations,
            vec![ManifestViolation::MissingRequiredKey {
                key: "SERVICE_ID".to_string()
            }]
        );
    }

    #[test]
    fn test_semicolon_rejected_anywhere() {
        for body in [
            "SERVICE_ID=00001;\nAUTHOR_ID=AAAAA",
            "SERVICE_ID=00001\nAUTHOR_ID=AA;AAA",
            ";SERVICE_ID=00001\nAUTHOR_ID=AAAAA",
        ] {
            let report = validate_str(&manifest(body), Variant::Generic);
            assert!(
                report.violations.iter().any(|v| matches!(
                    v,
                    ManifestViolation::ShellMetacharacter { character: ';', .. }
                )),
                "expected rejection for {body:?}"
            );
        }
    }

    #[test]
    fn test_every_metacharacter_rejected() {
        for c in SHELL_METACHARACTERS {
            let body = format!("SERVICE_ID=00001\nAUTHOR_ID=AAAAA\nCFLAGS=-O0 {c}");
            let report = validate_str(&manifest(&body), Variant::Generic);
            assert!(!report.is_valid(), "{c} should be rejected");
        }
    }

    #[test]
    fn test_comment_asymmetry() {
        let full_line = validate_str(
            &manifest("# build settings\nSERVICE_ID=00001\nAUTHOR_ID=AAAAA"),
            Variant::Generic,
        );
        assert!(full_line.is_valid(), "{:?}", full_line.violations);

        let inline = validate_str(
            &manifest("SERVICE_ID=00001 # service\nAUTHOR_ID=AAAAA"),
            Variant::Generic,
        );
        assert!(inline
            .violations
            .contains(&ManifestViolation::InlineComment { line: 1 }));

        let indented = validate_str(
            &manifest("  # indented\nSERVICE_ID=00001\nAUTHOR_ID=AAAAA"),
            Variant::Generic,
        );
        assert!(indented
            .violations
            .contains(&ManifestViolation::InlineComment { line: 1 }));
    }

    #[test]
    fn test_unknown_key_and_bad_values() {
        let report = validate_str(
            &manifest("SERVICE_ID=0000x\nAUTHOR_ID=AAAAA\nFOO=bar\nPOLLS_RELEASE_SEED=-17"),
            Variant::Generic,
        );
        assert!(report.violations.contains(&ManifestViolation::InvalidValue {
            line: 1,
            key: "SERVICE_ID".to_string(),
            value: "0000x".to_string()
        }));
        assert!(report.violations.contains(&ManifestViolation::UnknownKey {
            line: 3,
            key: "FOO".to_string()
        }));
        assert_eq!(report.violations.len(), 2);
    }

    #[test]
    fn test_variant_tables() {
        let generic = ManifestSchema::for_variant(Variant::Generic);
        assert_eq!(generic.optional.get("VULN_COUNT"), Some(&ValueRule::Numeric));

        let cqe = ManifestSchema::for_variant(Variant::Cqe);
        assert!(cqe.rule_for("VULN_COUNT").is_none());

        let cfe = ManifestSchema::for_variant(Variant::Cfe);
        assert_eq!(cfe.required.get("VULN_COUNT"), Some(&ValueRule::Numeric));
        assert!(cfe.rule_for("POLLS_RELEASE_COUNT").is_some());
        assert!(cfe.rule_for("POLLS_TESTING_SEED").is_none());
        assert!(cfe.rule_for("POLLS_RELEASE_SEED").is_none());
        assert!(cfe.rule_for("POLLS_TESTING_COUNT").is_none());
        assert_eq!(cfe.rule_for("POLLS_RELEASE_MAX_DEPTH"), Some(ValueRule::Numeric));
    }

    #[test]
    fn test_cfe_accepts_release_depth() {
        let report = validate_str(
            &manifest("SERVICE_ID=00001\nAUTHOR_ID=AAAAA\nVULN_COUNT=1\nPOLLS_RELEASE_MAX_DEPTH=20"),
            Variant::Cfe,
        );
        assert!(report.is_valid(), "{:?}", report.violations);
        assert_eq!(report.manifest.get("POLLS_RELEASE_MAX_DEPTH"), Some("20"));
    }

    #[test]
    fn test_cfe_requires_vuln_count() {
        let report = validate_str(&manifest("SERVICE_ID=00001\nAUTHOR_ID=AAAAA"), Variant::Cfe);
        assert_eq!(
            report.violations,
            vec![ManifestViolation::MissingRequiredKey {
                key: "VULN_COUNT".to_string()
            }]
        );
    }

    #[test]
    fn test_key_is_only_right_trimmed() {
        let report = validate_str(
            &manifest(" SERVICE_ID=00001\nAUTHOR_ID=AAAAA"),
            Variant::Generic,
        );
        assert!(report.violations.contains(&ManifestViolation::UnknownKey {
            line: 1,
            key: " SERVICE_ID".to_string()
        }));
    }

    #[test]
    fn test_value_rules() {
        assert!(ValueRule::Numeric.accepts("00001"));
        assert!(!ValueRule::Numeric.accepts("-1"));
        assert!(!ValueRule::Numeric.accepts(""));
        assert!(ValueRule::SignedNumeric.accepts("-1"));
        assert!(ValueRule::SignedNumeric.accepts("42"));
        assert!(!ValueRule::SignedNumeric.accepts("-"));
        assert!(ValueRule::Any.accepts(""));
    }
}
