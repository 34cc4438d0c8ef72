//! Snapcheck Adapters
//!
//! Concrete collaborators for `snapcheck-core`:
//!
//! - `GitCliHistory`: merge-base and ancestry from the `git` CLI
//! - `FsSnapshotStore` / `GcsSnapshotStore`: snapshot storage on disk or in a
//!   GCS bucket (via `gsutil`)
//! - `ImageMagickChecker`: fuzz-tolerant comparison with `compare`
//! - `FirebaseLocator`: report and device grid image URLs served by Firebase Storage
//! - `GithubNotifier` / `FileNotifier`: report delivery
//!
//! External I/O that can fail transiently goes through [`retry_with_backoff`].

mod error;
pub mod file_sink;
pub mod fs_store;
pub mod gcs_store;
pub mod git;
pub mod github;
pub mod imagemagick;
pub mod locator;
pub mod process;
pub mod retry;

pub use error::{AdapterError, AdapterResult};
pub use file_sink::FileNotifier;
pub use fs_store::FsSnapshotStore;
pub use gcs_store::{parse_gsutil_listing, GcsSnapshotStore};
pub use git::GitCliHistory;
pub use github::{fold_comment_body, has_header, GithubNotifier, GithubTarget, PreviousComments};
pub use imagemagick::ImageMagickChecker;
pub use locator::{form_escape, FirebaseLocator};
pub use retry::{retry_with_backoff, RetryConfig};
