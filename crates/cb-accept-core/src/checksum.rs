//! Order-independent content fingerprints over file sets.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::error::Result;

/// Sorted list of per-file SHA-256 digests.
///
/// Two file sets are equivalent iff their fingerprints are equal, whatever
/// order the files were listed in.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Fingerprint(Vec<String>);

impl Fingerprint {
    pub fn digests(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether any two files in the set share content.
    pub fn has_duplicates(&self) -> bool {
        self.0.windows(2).any(|pair| pair[0] == pair[1])
    }
}

/// Hex SHA-256 of a single file.
pub fn hash_file(path: &Path) -> Result<String> {
    let content = std::fs::read(path)?;
    Ok(hex::encode(Sha256::digest(&content)))
}

/// Fingerprint a set of files.
pub fn checksum<P: AsRef<Path>>(files: &[P]) -> Result<Fingerprint> {
    let mut digests = files
        .iter()
        .map(|f| hash_file(f.as_ref()))
        .collect::<Result<Vec<_>>>()?;
    digests.sort();
    Ok(Fingerprint(digests))
}

/// Files among `files` whose content was already seen earlier in the list.
pub fn duplicate_files<P: AsRef<Path>>(files: &[P]) -> Result<Vec<PathBuf>> {
    let mut seen = HashSet::new();
    let mut duplicates = Vec::new();
    for file in files {
        let digest = hash_file(file.as_ref())?;
        if !seen.insert(digest) {
            duplicates.push(file.as_ref().to_path_buf());
        }
    }
    Ok(duplicates)
}

/// Regular files directly inside `dir`, sorted by name. Missing dir yields nothing.
pub fn files_in(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    if !dir.is_dir() {
        return Ok(files);
    }
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
