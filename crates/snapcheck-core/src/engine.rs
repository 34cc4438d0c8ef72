//! Directory-level screenshot classification.
//!
//! Identifiers only in `actual` are new, only in `expected` are deleted, and
//! the intersection is run through the [`SimilarityChecker`] on a bounded
//! worker pool. A check that errors (or whose worker panics) classifies its
//! item as changed without a diff; it never aborts the comparison.

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tracing::{debug, instrument};

use crate::collaborators::SimilarityChecker;
use crate::domain::{
    ChangeDetail, ClassificationResult, CollaboratorResult, ComparisonOutcome, FuzzTolerance,
    SnapshotSet,
};
use crate::obs;

/// Diff engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineConfig {
    /// Maximum number of similarity checks in flight.
    pub max_concurrent: usize,
    /// Directory that receives diff images as `<diff_dir>/<identifier>`.
    pub diff_dir: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 4,
            diff_dir: None,
        }
    }
}

/// Compares an expected snapshot set against an actual one.
pub struct SnapshotDiffEngine {
    checker: Arc<dyn SimilarityChecker>,
    config: EngineConfig,
}

impl SnapshotDiffEngine {
    pub fn new(checker: Arc<dyn SimilarityChecker>, config: EngineConfig) -> Self {
        Self { checker, config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Classify every identifier of `expected ∪ actual`.
    #[instrument(skip_all, fields(expected = expected.len(), actual = actual.len()))]
    pub async fn compare(
        &self,
        expected: &SnapshotSet,
        actual: &SnapshotSet,
        fuzz: &FuzzTolerance,
    ) -> ClassificationResult {
        let mut result = ClassificationResult::default();

        for id in actual.identifiers() {
            if !expected.contains(id) {
                result.new_items.insert(id.to_string());
            }
        }
        for id in expected.identifiers() {
            if !actual.contains(id) {
                result.deleted_items.insert(id.to_string());
            }
        }

        let sem = Arc::new(Semaphore::new(self.config.max_concurrent.max(1)));
        let mut ids = Vec::new();
        let mut tasks = Vec::new();

        for id in actual.identifiers().filter(|id| expected.contains(id)) {
            let (Some(expected_path), Some(actual_path)) = (expected.location(id), actual.location(id))
            else {
                continue;
            };
            let expected_path = expected_path.to_path_buf();
            let actual_path = actual_path.to_path_buf();
            let diff_path = self.config.diff_dir.as_ref().map(|dir| dir.join(id));
            let checker = Arc::clone(&self.checker);
            let fuzz = fuzz.clone();
            let sem = Arc::clone(&sem);

            ids.push(id.to_string());
            tasks.push(tokio::spawn(async move {
                let _permit = sem.acquire_owned().await.ok();
                checker
                    .compare(&expected_path, &actual_path, diff_path.as_deref(), &fuzz)
                    .await
            }));
        }

        // Each task owns its outcome; merging happens here after all joins.
        let joined = futures::future::join_all(tasks).await;
        for (id, joined) in ids.into_iter().zip(joined) {
            let outcome: CollaboratorResult<ComparisonOutcome> = match joined {
                Ok(outcome) => outcome,
                Err(join_err) => {
                    obs::emit_item_check_failed(&id, &join_err);
                    result.changed_items.insert(
                        id,
                        ChangeDetail {
                            diff: None,
                            error: Some(format!("similarity worker aborted: {join_err}")),
                        },
                    );
                    continue;
                }
            };

            match outcome {
                Ok(ComparisonOutcome::Passed) => {
                    debug!(item = %id, "passed");
                    result.passed_items.insert(id);
                }
                Ok(ComparisonOutcome::Changed { diff }) => {
                    debug!(item = %id, "changed");
                    result
                        .changed_items
                        .insert(id, ChangeDetail { diff, error: None });
                }
                Err(e) => {
                    obs::emit_item_check_failed(&id, &e);
                    result.changed_items.insert(
                        id,
                        ChangeDetail {
                            diff: None,
                            error: Some(e.to_string()),
                        },
                    );
                }
            }
        }

        obs::emit_classified(&result);
        result
    }
}
