//! Structured report built from a classification result.
//!
//! The [`Report`] is plain data: counts plus typed sections with image
//! references. Rendering lives behind [`ReportRenderer`] so the same report
//! can be posted as a GitHub comment or written out as JSON.

mod json;
mod markdown;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{ClassificationResult, CommitHash, Result};

pub use json::JsonRenderer;
pub(crate) use markdown::{escape_html, img_tag};
pub use markdown::{MarkdownRenderer, REPORT_HEADER};

/// Which copy of a screenshot an image reference points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageKind {
    Expected,
    Actual,
    Diff,
}

impl ImageKind {
    /// Directory name used by the snapshot store layout.
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageKind::Expected => "expected",
            ImageKind::Actual => "actual",
            ImageKind::Diff => "diff",
        }
    }
}

/// Pixel size an image should be displayed at.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DisplaySize {
    pub width: f64,
    pub height: f64,
}

impl DisplaySize {
    /// Scale `width × height` so the long side is `long_side` pixels.
    pub fn fit(width: u32, height: u32, long_side: f64) -> Option<Self> {
        if width == 0 || height == 0 {
            return None;
        }
        let ratio = f64::from(height) / f64::from(width);
        let size = if ratio >= 1.0 {
            DisplaySize {
                width: long_side / ratio,
                height: long_side,
            }
        } else {
            DisplaySize {
                width: long_side,
                height: long_side * ratio,
            }
        };
        Some(size)
    }
}

/// A renderable reference to one screenshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRef {
    pub url: String,
    pub size: Option<DisplaySize>,
}

/// Maps `(item, kind)` to where a reader can see the image.
pub trait ImageLocator: Send + Sync {
    fn locate(&self, item: &str, kind: ImageKind) -> ImageRef;
}

/// Locator producing `<prefix>/<kind>/<item>` references.
#[derive(Debug, Clone, Default)]
pub struct RelativeLocator {
    prefix: String,
}

impl RelativeLocator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// `parts` joined with `/` under the prefix.
    pub(crate) fn join(&self, parts: &[&str]) -> String {
        let tail = parts.join("/");
        if self.prefix.is_empty() {
            tail
        } else {
            format!("{}/{}", self.prefix.trim_end_matches('/'), tail)
        }
    }
}

impl ImageLocator for RelativeLocator {
    fn locate(&self, item: &str, kind: ImageKind) -> ImageRef {
        ImageRef {
            url: self.join(&[kind.as_str(), item]),
            size: None,
        }
    }
}

/// Per-category counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub new: usize,
    pub deleted: usize,
    pub changed: usize,
    pub passed: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangedEntry {
    pub name: String,
    pub before: ImageRef,
    pub after: ImageRef,
    pub diff: Option<ImageRef>,
    /// Why the item could not be evaluated, when it could not.
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewEntry {
    pub name: String,
    pub image: ImageRef,
}

/// Renderable result of one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub commit: Option<CommitHash>,
    pub baseline: Option<CommitHash>,
    pub generated_at: DateTime<Utc>,
    pub summary: Summary,
    pub changed: Vec<ChangedEntry>,
    pub new: Vec<NewEntry>,
    pub deleted: Vec<String>,
}

/// Builds a [`Report`] from a classification result.
pub struct ReportBuilder<'a> {
    locator: &'a dyn ImageLocator,
    commit: Option<CommitHash>,
    baseline: Option<CommitHash>,
}

impl<'a> ReportBuilder<'a> {
    pub fn new(locator: &'a dyn ImageLocator) -> Self {
        Self {
            locator,
            commit: None,
            baseline: None,
        }
    }

    pub fn commit(mut self, commit: CommitHash) -> Self {
        self.commit = Some(commit);
        self
    }

    pub fn baseline(mut self, baseline: CommitHash) -> Self {
        self.baseline = Some(baseline);
        self
    }

    pub fn build(&self, result: &ClassificationResult) -> Report {
        let summary = Summary {
            new: result.new_items.len(),
            deleted: result.deleted_items.len(),
            changed: result.changed_items.len(),
            passed: result.passed_items.len(),
        };

        let changed = result
            .changed_items
            .iter()
            .map(|(name, detail)| ChangedEntry {
                name: name.clone(),
                before: self.locator.locate(name, ImageKind::Expected),
                after: self.locator.locate(name, ImageKind::Actual),
                diff: detail
                    .diff
                    .as_ref()
                    .map(|_| self.locator.locate(name, ImageKind::Diff)),
                error: detail.error.clone(),
            })
            .collect();

        let new = result
            .new_items
            .iter()
            .map(|name| NewEntry {
                name: name.clone(),
                image: self.locator.locate(name, ImageKind::Actual),
            })
            .collect();

        Report {
            commit: self.commit.clone(),
            baseline: self.baseline.clone(),
            generated_at: Utc::now(),
            summary,
            changed,
            new,
            deleted: result.deleted_items.iter().cloned().collect(),
        }
    }
}

/// Turns a report into a delivery body.
pub trait ReportRenderer: Send + Sync {
    fn render(&self, report: &Report) -> Result<String>;
}
