//! Domain types shared by the resolver, the diff engine and reporting.

pub mod classification;
pub mod commit;
pub mod error;
pub mod snapshot;

pub use classification::{
    write_result_json, Category, ChangeDetail, ClassificationResult, ComparisonOutcome,
    ResultArtifact,
};
pub use commit::{AncestorChain, CommitHash};
pub use error::{CollaboratorError, CollaboratorResult, CoreError, Result};
pub use snapshot::{FuzzTolerance, SnapshotSet, DEFAULT_EXTENSIONS};
