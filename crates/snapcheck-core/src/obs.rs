//! Structured log events for the snapshot pipeline lifecycle.
//!
//! Every event carries an `event = "..."` field so CI log collectors can
//! filter on it regardless of the human-readable message.

use tracing::{info, warn};

use crate::domain::{ClassificationResult, CommitHash};

/// Span tagging everything logged during one run with the commit under test.
///
/// Attach it with `tracing::Instrument` so it follows the future across
/// await points.
pub fn pipeline_span(commit: &CommitHash) -> tracing::Span {
    tracing::info_span!("snapcheck.run", commit = %commit.short())
}

pub fn emit_store_listed(entries: usize, stored: usize) {
    info!(event = "store.listed", entries = entries, stored = stored);
}

pub fn emit_baseline_resolved(
    base_branch: &str,
    current_branch: &str,
    merge_base: &CommitHash,
    baseline: Option<&CommitHash>,
    scanned: usize,
) {
    match baseline {
        Some(commit) => info!(
            event = "baseline.resolved",
            base_branch = %base_branch,
            current_branch = %current_branch,
            merge_base = %merge_base,
            baseline = %commit,
            scanned = scanned,
        ),
        None => info!(
            event = "baseline.not_found",
            base_branch = %base_branch,
            current_branch = %current_branch,
            merge_base = %merge_base,
            scanned = scanned,
        ),
    }
}

/// Warning: a single similarity check could not be evaluated.
pub fn emit_item_check_failed(item: &str, error: &dyn std::fmt::Display) {
    warn!(event = "compare.item_failed", item = %item, error = %error);
}

pub fn emit_classified(result: &ClassificationResult) {
    info!(
        event = "compare.classified",
        new = result.new_items.len(),
        deleted = result.deleted_items.len(),
        changed = result.changed_items.len(),
        passed = result.passed_items.len(),
    );
}

pub fn emit_report_published(bytes: usize) {
    info!(event = "report.published", bytes = bytes);
}

pub fn emit_screenshots_staged(files: usize) {
    info!(event = "screenshots.staged", files = files);
}

pub fn emit_snapshot_uploaded(commit: &CommitHash) {
    info!(event = "snapshot.uploaded", commit = %commit);
}

pub fn emit_device_grid_published(devices: usize, screens: usize) {
    info!(event = "device_grid.published", devices = devices, screens = screens);
}
