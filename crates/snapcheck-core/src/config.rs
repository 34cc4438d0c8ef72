//! Pipeline configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::domain::{FuzzTolerance, DEFAULT_EXTENSIONS};
use crate::engine::EngineConfig;
use crate::resolver::ListingPolicy;
use crate::workdir::resolve_path;

/// Settings for one snapshot pipeline run.
///
/// Missing fields fall back to their defaults when deserialized, so a
/// partial JSON document is a valid configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Branch whose history holds the baseline candidates.
    pub base_branch: String,
    pub fuzz: FuzzTolerance,
    /// Maximum number of similarity checks in flight.
    pub max_concurrent: usize,
    /// Image extensions picked up from the screenshot directory.
    pub extensions: Vec<String>,
    pub listing_policy: ListingPolicy,
    /// Scratch directory holding `actual/`, `expected/`, `diff/` and `result.json`.
    pub working_dir: PathBuf,
    /// Where the test run left its screenshots.
    pub screenshot_dir: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            base_branch: "master".to_string(),
            fuzz: FuzzTolerance::default(),
            max_concurrent: EngineConfig::default().max_concurrent,
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            listing_policy: ListingPolicy::default(),
            working_dir: PathBuf::from("snapshot-work"),
            screenshot_dir: PathBuf::from("screenshots"),
        }
    }
}

impl PipelineConfig {
    pub fn actual_dir(&self) -> PathBuf {
        self.working_dir.join("actual")
    }

    pub fn expected_dir(&self) -> PathBuf {
        self.working_dir.join("expected")
    }

    pub fn diff_dir(&self) -> PathBuf {
        self.working_dir.join("diff")
    }

    pub fn result_path(&self) -> PathBuf {
        self.working_dir.join("result.json")
    }

    /// Engine settings derived from this configuration.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            max_concurrent: self.max_concurrent,
            diff_dir: Some(self.diff_dir()),
        }
    }

    /// Whether the screenshot directory and the working directory overlap,
    /// either one containing the other.
    ///
    /// Paths are compared after [`resolve_path`], so relative, absolute,
    /// dotted and symlinked spellings of the same directory all match.
    pub fn screenshots_overlap_working_dir(&self) -> bool {
        let work = resolve_path(&self.working_dir);
        let shots = resolve_path(&self.screenshot_dir);
        shots.starts_with(&work) || work.starts_with(&shots)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_ci_conventions() {
        let cfg = PipelineConfig::default();
        assert_eq!(cfg.base_branch, "master");
        assert_eq!(cfg.fuzz.as_str(), "5%");
        assert_eq!(cfg.max_concurrent, 4);
        assert_eq!(cfg.extensions, vec!["jpg".to_string()]);
        assert_eq!(cfg.listing_policy, ListingPolicy::Reject);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let cfg: PipelineConfig =
            serde_json::from_str(r#"{"base_branch": "main", "listing_policy": "skip"}"#).unwrap();
        assert_eq!(cfg.base_branch, "main");
        assert_eq!(cfg.listing_policy, ListingPolicy::Skip);
        assert_eq!(cfg.fuzz.as_str(), "5%");
    }

    #[test]
    fn blank_fuzz_is_rejected_on_load() {
        let err = serde_json::from_str::<PipelineConfig>(r#"{"fuzz": "  "}"#);
        assert!(err.is_err());
    }

    #[test]
    fn working_layout_paths() {
        let cfg = PipelineConfig {
            working_dir: PathBuf::from("/tmp/work"),
            ..PipelineConfig::default()
        };
        assert_eq!(cfg.actual_dir(), PathBuf::from("/tmp/work/actual"));
        assert_eq!(cfg.result_path(), PathBuf::from("/tmp/work/result.json"));
        assert_eq!(
            cfg.engine_config().diff_dir,
            Some(PathBuf::from("/tmp/work/diff"))
        );
    }

    fn with_dirs(working_dir: &str, screenshot_dir: &str) -> PipelineConfig {
        PipelineConfig {
            working_dir: PathBuf::from(working_dir),
            screenshot_dir: PathBuf::from(screenshot_dir),
            ..PipelineConfig::default()
        }
    }

    #[test]
    fn overlap_detects_differently_spelled_paths() {
        assert!(with_dirs("work", "./work/actual").screenshots_overlap_working_dir());
        assert!(with_dirs("work", "shots/../work/actual").screenshots_overlap_working_dir());
        let cwd = std::env::current_dir().unwrap();
        let absolute_work = cwd.join("work");
        assert!(with_dirs(absolute_work.to_str().unwrap(), "work/actual")
            .screenshots_overlap_working_dir());
    }

    #[test]
    fn overlap_detects_working_dir_inside_screenshots() {
        assert!(with_dirs("./snapshot-work", ".").screenshots_overlap_working_dir());
    }

    #[test]
    fn separate_dirs_do_not_overlap() {
        assert!(!with_dirs("/tmp/work", "/tmp/shots").screenshots_overlap_working_dir());
        assert!(!with_dirs("work", "workshop").screenshots_overlap_working_dir());
    }
}
