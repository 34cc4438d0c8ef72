//! End-to-end snapshot run: stage screenshots, resolve a baseline, compare,
//! persist, report.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, Instrument};

use crate::collaborators::{
    CommitHistoryProvider, Notifier, SimilarityChecker, SnapshotStore, SnapshotStoreIndex,
};
use crate::config::PipelineConfig;
use crate::domain::{
    write_result_json, ClassificationResult, CollaboratorResult, CommitHash, CoreError, Result,
    SnapshotSet,
};
use crate::engine::SnapshotDiffEngine;
use crate::obs;
use crate::report::{ImageLocator, Report, ReportBuilder, ReportRenderer};
use crate::resolver::BaselineResolver;
use crate::workdir::{copy_dir_all, reset_dir};

/// What a compare run ended with.
#[derive(Debug, Clone)]
pub enum PipelineOutcome {
    /// No stored snapshot exists for any eligible commit. Nothing was
    /// compared or uploaded.
    NoBaseline,
    Compared {
        baseline: CommitHash,
        result: ClassificationResult,
        report: Report,
        /// Rendered body handed to the notifier.
        body: String,
    },
}

impl PipelineOutcome {
    pub fn baseline(&self) -> Option<&CommitHash> {
        match self {
            PipelineOutcome::NoBaseline => None,
            PipelineOutcome::Compared { baseline, .. } => Some(baseline),
        }
    }
}

/// Exposes the listing half of a [`SnapshotStore`] to the resolver.
struct StoreListing(Arc<dyn SnapshotStore>);

#[async_trait]
impl SnapshotStoreIndex for StoreListing {
    async fn stored_entries(&self) -> CollaboratorResult<Vec<String>> {
        self.0.stored_entries().await
    }
}

/// Wires the resolver, the diff engine and reporting to concrete collaborators.
pub struct SnapshotPipeline {
    store: Arc<dyn SnapshotStore>,
    notifier: Arc<dyn Notifier>,
    renderer: Arc<dyn ReportRenderer>,
    resolver: BaselineResolver,
    engine: SnapshotDiffEngine,
    config: PipelineConfig,
}

impl SnapshotPipeline {
    pub fn new(
        config: PipelineConfig,
        history: Arc<dyn CommitHistoryProvider>,
        store: Arc<dyn SnapshotStore>,
        checker: Arc<dyn SimilarityChecker>,
        notifier: Arc<dyn Notifier>,
        renderer: Arc<dyn ReportRenderer>,
    ) -> Self {
        let resolver = BaselineResolver::new(history, Arc::new(StoreListing(store.clone())))
            .with_listing_policy(config.listing_policy);
        let engine = SnapshotDiffEngine::new(checker, config.engine_config());
        Self {
            store,
            notifier,
            renderer,
            resolver,
            engine,
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Resolve the baseline for `current_branch` without touching the
    /// working directory.
    pub async fn resolve(&self, current_branch: &str) -> Result<Option<CommitHash>> {
        self.resolver
            .resolve(&self.config.base_branch, current_branch)
            .await
    }

    /// Run a full comparison of the captured screenshots of
    /// `current_commit` against the resolved baseline.
    ///
    /// Stages the screenshots into `<working_dir>/actual`, fetches the
    /// baseline into `expected`, writes diffs and `result.json`, uploads the
    /// working directory under `current_commit`, then renders the report
    /// with `locator` and publishes it.
    pub async fn compare(
        &self,
        current_branch: &str,
        current_commit: &CommitHash,
        locator: &dyn ImageLocator,
    ) -> Result<PipelineOutcome> {
        self.compare_inner(current_branch, current_commit, locator)
            .instrument(obs::pipeline_span(current_commit))
            .await
    }

    async fn compare_inner(
        &self,
        current_branch: &str,
        current_commit: &CommitHash,
        locator: &dyn ImageLocator,
    ) -> Result<PipelineOutcome> {
        self.stage_screenshots()?;

        let Some(baseline) = self.resolve(current_branch).await? else {
            info!(
                base_branch = %self.config.base_branch,
                current_branch = %current_branch,
                "previous snapshot not found"
            );
            return Ok(PipelineOutcome::NoBaseline);
        };

        let expected_dir = self.config.expected_dir();
        reset_dir(&expected_dir)?;
        self.store
            .fetch(&baseline, &expected_dir)
            .await
            .map_err(CoreError::Store)?;
        reset_dir(&self.config.diff_dir())?;

        let expected =
            SnapshotSet::from_dir("expected", &expected_dir, &self.config.extensions)?;
        let actual =
            SnapshotSet::from_dir("actual", &self.config.actual_dir(), &self.config.extensions)?;
        let result = self
            .engine
            .compare(&expected, &actual, &self.config.fuzz)
            .await;

        write_result_json(&self.config.result_path(), &result)?;
        self.upload_working_dir(current_commit).await?;

        let report = ReportBuilder::new(locator)
            .commit(current_commit.clone())
            .baseline(baseline.clone())
            .build(&result);
        let body = self.renderer.render(&report)?;
        self.notifier
            .publish(&body)
            .await
            .map_err(CoreError::Notify)?;
        obs::emit_report_published(body.len());

        Ok(PipelineOutcome::Compared {
            baseline,
            result,
            report,
            body,
        })
    }

    /// Stage the screenshots and store them under `current_commit` without
    /// comparing, so later runs can use this commit as a baseline.
    pub async fn upload(&self, current_commit: &CommitHash) -> Result<()> {
        async {
            self.stage_screenshots()?;
            self.upload_working_dir(current_commit).await
        }
        .instrument(obs::pipeline_span(current_commit))
        .await
    }

    fn stage_screenshots(&self) -> Result<()> {
        if self.config.screenshots_overlap_working_dir() {
            return Err(CoreError::MalformedSnapshotSet {
                set: "actual".to_string(),
                reason: format!(
                    "screenshot dir {} overlaps working dir {}",
                    self.config.screenshot_dir.display(),
                    self.config.working_dir.display()
                ),
            });
        }
        let actual_dir = self.config.actual_dir();
        reset_dir(&actual_dir)?;
        let files = copy_dir_all(&self.config.screenshot_dir, &actual_dir)?;
        obs::emit_screenshots_staged(files);
        Ok(())
    }

    async fn upload_working_dir(&self, commit: &CommitHash) -> Result<()> {
        self.store
            .upload(&self.config.working_dir, commit)
            .await
            .map_err(CoreError::Store)?;
        obs::emit_snapshot_uploaded(commit);
        Ok(())
    }
}
