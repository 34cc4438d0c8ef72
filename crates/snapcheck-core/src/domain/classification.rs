//! Per-item comparison outcomes and the four-way classification.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::error::{CoreError, Result};

/// Result of one similarity check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ComparisonOutcome {
    Passed,
    Changed { diff: Option<PathBuf> },
}

/// Category an identifier ended up in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    New,
    Deleted,
    Changed,
    Passed,
}

/// What is known about a changed item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeDetail {
    /// Diff image written by the checker, if any.
    pub diff: Option<PathBuf>,
    /// Set when the check itself failed and the item was classified
    /// `Changed` without being evaluated.
    pub error: Option<String>,
}

/// Classification of every identifier in `expected ∪ actual`.
///
/// The four collections are pairwise disjoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub new_items: BTreeSet<String>,
    pub deleted_items: BTreeSet<String>,
    pub changed_items: BTreeMap<String, ChangeDetail>,
    pub passed_items: BTreeSet<String>,
}

impl ClassificationResult {
    pub fn total(&self) -> usize {
        self.new_items.len()
            + self.deleted_items.len()
            + self.changed_items.len()
            + self.passed_items.len()
    }

    /// True when nothing was added, removed or changed.
    pub fn is_clean(&self) -> bool {
        self.new_items.is_empty() && self.deleted_items.is_empty() && self.changed_items.is_empty()
    }

    pub fn category_of(&self, id: &str) -> Option<Category> {
        if self.new_items.contains(id) {
            Some(Category::New)
        } else if self.deleted_items.contains(id) {
            Some(Category::Deleted)
        } else if self.changed_items.contains_key(id) {
            Some(Category::Changed)
        } else if self.passed_items.contains(id) {
            Some(Category::Passed)
        } else {
            None
        }
    }

    /// Items whose similarity check could not be evaluated.
    pub fn failed_checks(&self) -> impl Iterator<Item = (&str, &str)> {
        self.changed_items
            .iter()
            .filter_map(|(id, detail)| detail.error.as_deref().map(|e| (id.as_str(), e)))
    }

    pub fn to_artifact(&self) -> ResultArtifact {
        ResultArtifact {
            passed_items: self.passed_items.iter().cloned().collect(),
            changed_items: self.changed_items.keys().cloned().collect(),
            new_items: self.new_items.iter().cloned().collect(),
            deleted_items: self.deleted_items.iter().cloned().collect(),
        }
    }
}

/// The `result.json` written next to the compared snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultArtifact {
    pub passed_items: Vec<String>,
    pub changed_items: Vec<String>,
    pub new_items: Vec<String>,
    pub deleted_items: Vec<String>,
}

/// Write `result.json` in pretty JSON format.
pub fn write_result_json(path: &Path, result: &ClassificationResult) -> Result<()> {
    let content = serde_json::to_string_pretty(&result.to_artifact())?;
    std::fs::write(path, content).map_err(|e| CoreError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> ClassificationResult {
        let mut result = ClassificationResult::default();
        result.new_items.insert("onboarding.jpg".to_string());
        result.passed_items.insert("home.jpg".to_string());
        result.changed_items.insert(
            "settings.jpg".to_string(),
            ChangeDetail {
                diff: Some(PathBuf::from("diff/settings.jpg")),
                error: None,
            },
        );
        result.changed_items.insert(
            "broken.jpg".to_string(),
            ChangeDetail {
                diff: None,
                error: Some("unreadable image".to_string()),
            },
        );
        result
    }

    #[test]
    fn category_lookup_and_counts() {
        let result = sample();
        assert_eq!(result.total(), 4);
        assert!(!result.is_clean());
        assert_eq!(result.category_of("home.jpg"), Some(Category::Passed));
        assert_eq!(result.category_of("settings.jpg"), Some(Category::Changed));
        assert_eq!(result.category_of("missing.jpg"), None);
    }

    #[test]
    fn failed_checks_lists_only_errored_items() {
        let result = sample();
        let failed: Vec<_> = result.failed_checks().collect();
        assert_eq!(failed, vec![("broken.jpg", "unreadable image")]);
    }

    #[test]
    fn result_artifact_has_expected_keys() {
        let raw = serde_json::to_value(sample().to_artifact()).unwrap();
        assert_eq!(raw["new_items"], json!(["onboarding.jpg"]));
        assert_eq!(raw["deleted_items"], json!([]));
        assert_eq!(raw["changed_items"], json!(["broken.jpg", "settings.jpg"]));
        assert_eq!(raw["passed_items"], json!(["home.jpg"]));
    }

    #[test]
    fn write_result_json_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("result.json");
        write_result_json(&path, &sample()).unwrap();
        let back: ResultArtifact =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(back, sample().to_artifact());
    }
}
