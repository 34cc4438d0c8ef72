//! Screenshots of every device side by side, posted without a comparison.
//!
//! A screenshot directory holds one subdirectory per device. The grid has
//! one column per device and one row per screen of the first device; a
//! device that lacks a screen leaves its cell empty.

use std::path::Path;
use std::sync::Arc;

use tracing::{info, Instrument};

use crate::collaborators::{Notifier, SnapshotStore};
use crate::domain::{CommitHash, CoreError, Result, SnapshotSet, DEFAULT_EXTENSIONS};
use crate::obs;
use crate::report::{escape_html, img_tag, ImageRef, RelativeLocator};

/// First line of every device grid comment; earlier comments are matched on it.
pub const DEVICE_GRID_HEADER: &str = "## Screenshots of each devices";

/// Maps `(device, screen)` to where a reader can see the image.
pub trait ScreenLocator: Send + Sync {
    fn locate_screen(&self, device: &str, screen: &str) -> ImageRef;
}

impl ScreenLocator for RelativeLocator {
    fn locate_screen(&self, device: &str, screen: &str) -> ImageRef {
        ImageRef {
            url: self.join(&[device, screen]),
            size: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GridRow {
    pub screen: String,
    /// One cell per device, in column order.
    pub cells: Vec<Option<ImageRef>>,
}

/// Device columns and screen rows of a screenshot directory.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceGrid {
    pub devices: Vec<String>,
    pub rows: Vec<GridRow>,
}

impl DeviceGrid {
    /// Scan `dir` for device subdirectories (sorted by name) and their
    /// screenshots matching `extensions`.
    pub fn scan<S: AsRef<str>>(
        dir: &Path,
        extensions: &[S],
        locator: &dyn ScreenLocator,
    ) -> Result<Self> {
        let mut devices = Vec::new();
        for entry in std::fs::read_dir(dir).map_err(|e| CoreError::io(dir, e))? {
            let entry = entry.map_err(|e| CoreError::io(dir, e))?;
            if !entry
                .file_type()
                .map_err(|e| CoreError::io(entry.path(), e))?
                .is_dir()
            {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                return Err(CoreError::MalformedSnapshotSet {
                    set: "devices".to_string(),
                    reason: format!("non UTF-8 device directory in {}", dir.display()),
                });
            };
            devices.push(name);
        }
        devices.sort();

        let sets = devices
            .iter()
            .map(|device| SnapshotSet::from_dir(device.as_str(), &dir.join(device), extensions))
            .collect::<Result<Vec<_>>>()?;
        let Some(first) = sets.first() else {
            return Ok(Self::default());
        };

        let rows = first
            .identifiers()
            .map(|screen| GridRow {
                screen: screen.to_string(),
                cells: devices
                    .iter()
                    .zip(&sets)
                    .map(|(device, set)| {
                        set.contains(screen)
                            .then(|| locator.locate_screen(device, screen))
                    })
                    .collect(),
            })
            .collect();

        Ok(Self { devices, rows })
    }

    /// No device directories were found.
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

/// Renders a [`DeviceGrid`] as an HTML table under [`DEVICE_GRID_HEADER`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DeviceGridRenderer {
    /// Collapse the table into a `<details>` block.
    pub fold: bool,
}

impl DeviceGridRenderer {
    pub fn render(&self, grid: &DeviceGrid) -> String {
        let mut table = String::from("<table><tr><td>Screen Name</td>\n");
        for device in &grid.devices {
            table.push_str(&format!("<td>{}</td>\n", escape_html(device)));
        }
        table.push_str("</tr>");

        for row in &grid.rows {
            table.push_str(&format!("<tr><td>{}</td>\n", escape_html(&row.screen)));
            for cell in &row.cells {
                match cell {
                    Some(image) => table.push_str(&format!("<td>{}</td>\n", img_tag(image))),
                    None => table.push_str("<td></td>"),
                }
            }
            table.push_str("</tr>\n");
        }
        table.push_str("</table>");

        if self.fold {
            format!("{DEVICE_GRID_HEADER}\n\n<details><summary>Open</summary>{table}</details>")
        } else {
            format!("{DEVICE_GRID_HEADER}\n\n{table}")
        }
    }
}

/// What a device grid run ended with.
#[derive(Debug, Clone)]
pub enum GridOutcome {
    /// The screenshot directory has no device subdirectories. Nothing was
    /// published.
    Empty,
    Published { grid: DeviceGrid, body: String },
}

/// Uploads a screenshot directory and posts its device grid.
pub struct ScreenshotPublisher {
    store: Arc<dyn SnapshotStore>,
    notifier: Arc<dyn Notifier>,
    renderer: DeviceGridRenderer,
    extensions: Vec<String>,
}

impl ScreenshotPublisher {
    pub fn new(store: Arc<dyn SnapshotStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            store,
            notifier,
            renderer: DeviceGridRenderer::default(),
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
        }
    }

    pub fn with_renderer(mut self, renderer: DeviceGridRenderer) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn with_extensions(mut self, extensions: Vec<String>) -> Self {
        if !extensions.is_empty() {
            self.extensions = extensions;
        }
        self
    }

    /// Store `screenshot_dir` under `commit`, then publish its grid with
    /// image references from `locator`.
    pub async fn publish(
        &self,
        screenshot_dir: &Path,
        commit: &CommitHash,
        locator: &dyn ScreenLocator,
    ) -> Result<GridOutcome> {
        async {
            self.store
                .upload(screenshot_dir, commit)
                .await
                .map_err(CoreError::Store)?;
            obs::emit_snapshot_uploaded(commit);

            let grid = DeviceGrid::scan(screenshot_dir, &self.extensions, locator)?;
            if grid.is_empty() {
                info!(dir = %screenshot_dir.display(), "screenshot dir has no device directories");
                return Ok(GridOutcome::Empty);
            }

            let body = self.renderer.render(&grid);
            self.notifier
                .publish(&body)
                .await
                .map_err(CoreError::Notify)?;
            obs::emit_device_grid_published(grid.devices.len(), grid.rows.len());
            Ok(GridOutcome::Published { grid, body })
        }
        .instrument(obs::pipeline_span(commit))
        .await
    }
}
