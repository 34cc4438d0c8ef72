//! Snapcheck Core
//!
//! Visual regression checks for CI screenshots: pick the stored snapshot
//! that a branch should be compared against, classify every screenshot as
//! new, deleted, changed or passed, and turn the result into a report.
//!
//! ## Key Components
//!
//! - `BaselineResolver`: merge-base plus store index to a baseline commit
//! - `SnapshotDiffEngine`: bounded-concurrency classification of two sets
//! - `ReportBuilder`: structured report, rendered by a `ReportRenderer`
//! - `SnapshotPipeline`: the compare/upload flow over injected collaborators
//! - `ScreenshotPublisher`: per-device screenshot grid posted without comparing
//!
//! Git, object storage, image comparison and delivery are behind the traits
//! in [`collaborators`]; the `snapcheck-adapters` crate implements them.

pub mod collaborators;
pub mod config;
pub mod device_grid;
pub mod domain;
pub mod engine;
pub mod fakes;
pub mod obs;
pub mod pipeline;
pub mod report;
pub mod resolver;
pub mod telemetry;
pub mod workdir;

pub use collaborators::{
    CommitHistoryProvider, Notifier, SimilarityChecker, SnapshotStore, SnapshotStoreIndex,
};
pub use config::PipelineConfig;
pub use device_grid::{
    DeviceGrid, DeviceGridRenderer, GridOutcome, GridRow, ScreenLocator, ScreenshotPublisher,
    DEVICE_GRID_HEADER,
};
pub use domain::{
    write_result_json, AncestorChain, Category, ChangeDetail, ClassificationResult,
    CollaboratorError, CollaboratorResult, CommitHash, ComparisonOutcome, CoreError,
    FuzzTolerance, Result, ResultArtifact, SnapshotSet, DEFAULT_EXTENSIONS,
};
pub use engine::{EngineConfig, SnapshotDiffEngine};
pub use pipeline::{PipelineOutcome, SnapshotPipeline};
pub use report::{
    ChangedEntry, DisplaySize, ImageKind, ImageLocator, ImageRef, JsonRenderer, MarkdownRenderer,
    NewEntry, RelativeLocator, Report, ReportBuilder, ReportRenderer, Summary, REPORT_HEADER,
};
pub use resolver::{parse_store_listing, scan_for_baseline, BaselineResolver, ListingPolicy};
pub use telemetry::init_tracing;
