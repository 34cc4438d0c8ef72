//! Named image sets and the fuzz tolerance forwarded to similarity checks.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::error::{CoreError, Result};

/// Default image extensions picked up from a directory listing.
pub const DEFAULT_EXTENSIONS: &[&str] = &["jpg"];

/// A set of screenshots keyed by file name.
///
/// Identifiers are unique within a set and never contain path separators,
/// so they can be joined onto any output directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotSet {
    name: String,
    images: BTreeMap<String, PathBuf>,
}

impl SnapshotSet {
    pub fn empty(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            images: BTreeMap::new(),
        }
    }

    /// Build a set from `(identifier, location)` pairs of any backing store.
    ///
    /// Duplicate, empty, or path-like identifiers make the set malformed.
    pub fn from_listing<I>(name: impl Into<String>, listing: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, PathBuf)>,
    {
        let name = name.into();
        let mut images = BTreeMap::new();
        for (id, location) in listing {
            if id.is_empty() || id.contains('/') || id.contains('\\') {
                return Err(CoreError::MalformedSnapshotSet {
                    set: name,
                    reason: format!("invalid image identifier {id:?}"),
                });
            }
            if images.insert(id.clone(), location).is_some() {
                return Err(CoreError::MalformedSnapshotSet {
                    set: name,
                    reason: format!("duplicate image identifier {id:?}"),
                });
            }
        }
        Ok(Self { name, images })
    }

    /// Build a set from the regular files directly inside `dir` whose
    /// extension matches one of `extensions` (case-insensitive).
    pub fn from_dir<S: AsRef<str>>(
        name: impl Into<String>,
        dir: &Path,
        extensions: &[S],
    ) -> Result<Self> {
        let name = name.into();
        let unreadable = |e: std::io::Error| CoreError::MalformedSnapshotSet {
            set: name.clone(),
            reason: format!("unreadable listing {}: {e}", dir.display()),
        };

        let mut listing = Vec::new();
        for entry in std::fs::read_dir(dir).map_err(unreadable)? {
            let entry = entry.map_err(unreadable)?;
            if !entry.file_type().map_err(unreadable)?.is_file() {
                continue;
            }
            let path = entry.path();
            let matches = path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| {
                    extensions
                        .iter()
                        .any(|want| want.as_ref().eq_ignore_ascii_case(ext))
                })
                .unwrap_or(false);
            if !matches {
                continue;
            }
            let Some(id) = entry.file_name().to_str().map(str::to_string) else {
                return Err(CoreError::MalformedSnapshotSet {
                    set: name.clone(),
                    reason: format!("non UTF-8 file name in {}", dir.display()),
                });
            };
            listing.push((id, path));
        }

        Self::from_listing(name, listing)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.images.contains_key(id)
    }

    /// Identifiers in sorted order.
    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.images.keys().map(String::as_str)
    }

    pub fn location(&self, id: &str) -> Option<&Path> {
        self.images.get(id).map(PathBuf::as_path)
    }
}

/// Similarity threshold handed verbatim to the similarity checker.
///
/// The core never interprets the value (ImageMagick reads `"5%"` as a
/// colour distance, another checker may read it differently).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FuzzTolerance(String);

impl FuzzTolerance {
    pub fn new(raw: impl Into<String>) -> Result<Self> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(CoreError::InvalidFuzz(raw));
        }
        Ok(FuzzTolerance(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for FuzzTolerance {
    fn default() -> Self {
        FuzzTolerance("5%".to_string())
    }
}

impl TryFrom<String> for FuzzTolerance {
    type Error = CoreError;

    fn try_from(s: String) -> Result<Self> {
        FuzzTolerance::new(s)
    }
}

impl From<FuzzTolerance> for String {
    fn from(fuzz: FuzzTolerance) -> Self {
        fuzz.0
    }
}

impl fmt::Display for FuzzTolerance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(dir: &Path, name: &str) {
        std::fs::write(dir.join(name), b"img").unwrap();
    }

    #[test]
    fn from_listing_rejects_duplicates() {
        let err = SnapshotSet::from_listing(
            "actual",
            vec![
                ("login.jpg".to_string(), PathBuf::from("a/login.jpg")),
                ("login.jpg".to_string(), PathBuf::from("b/login.jpg")),
            ],
        )
        .unwrap_err();
        match err {
            CoreError::MalformedSnapshotSet { set, reason } => {
                assert_eq!(set, "actual");
                assert!(reason.contains("login.jpg"));
            }
            other => panic!("expected MalformedSnapshotSet, got {other:?}"),
        }
    }

    #[test]
    fn from_listing_rejects_path_like_identifiers() {
        let err = SnapshotSet::from_listing(
            "expected",
            vec![("../etc.jpg/x".to_string(), PathBuf::from("x"))],
        );
        assert!(matches!(err, Err(CoreError::MalformedSnapshotSet { .. })));
    }

    #[test]
    fn from_dir_filters_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "home.jpg");
        touch(dir.path(), "Settings.JPG");
        touch(dir.path(), "notes.txt");
        touch(dir.path(), "profile.png");
        std::fs::create_dir(dir.path().join("nested.jpg")).unwrap();

        let set = SnapshotSet::from_dir("actual", dir.path(), DEFAULT_EXTENSIONS).unwrap();
        let ids: Vec<&str> = set.identifiers().collect();
        assert_eq!(ids, vec!["Settings.JPG", "home.jpg"]);
        assert_eq!(
            set.location("home.jpg"),
            Some(dir.path().join("home.jpg").as_path())
        );

        let both = SnapshotSet::from_dir("actual", dir.path(), &["jpg", "png"]).unwrap();
        assert_eq!(both.len(), 3);
    }

    #[test]
    fn from_dir_missing_directory_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let err = SnapshotSet::from_dir("expected", &dir.path().join("missing"), &["jpg"]);
        assert!(matches!(err, Err(CoreError::MalformedSnapshotSet { .. })));
    }

    #[test]
    fn fuzz_rejects_blank_and_defaults_to_five_percent() {
        assert!(FuzzTolerance::new("  ").is_err());
        assert_eq!(FuzzTolerance::default().as_str(), "5%");
        assert_eq!(FuzzTolerance::new(" 10% ").unwrap().to_string(), "10%");
    }
}
