//! Image references served from Firebase Storage.

use std::path::{Path, PathBuf};

use snapcheck_core::{CommitHash, DisplaySize, ImageKind, ImageLocator, ImageRef, ScreenLocator};
use tracing::debug;

const FIREBASE_BASE: &str = "https://firebasestorage.googleapis.com/v0/b";

/// Form-style escape: unreserved characters stay, space becomes `+`,
/// everything else is `%XX` per UTF-8 byte.
pub fn form_escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        match byte {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'_' | b'.' | b'-' | b'~' => {
                out.push(byte as char)
            }
            b' ' => out.push('+'),
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

/// Locates images uploaded under `<commit>/` in a bucket that Firebase
/// Storage serves: `<commit>/<kind>/<item>` for report images and
/// `<commit>/<device>/<screen>` for device grids.
///
/// With a long side set, each image is sized from its local copy under
/// `local_dir` (`actual/` for reports, the screenshot dir for grids);
/// otherwise references carry no size.
#[derive(Debug, Clone)]
pub struct FirebaseLocator {
    bucket: String,
    commit: CommitHash,
    local_dir: PathBuf,
    long_side: Option<f64>,
}

impl FirebaseLocator {
    pub fn new(bucket: impl Into<String>, commit: CommitHash, local_dir: impl Into<PathBuf>) -> Self {
        Self {
            bucket: bucket.into(),
            commit,
            local_dir: local_dir.into(),
            long_side: None,
        }
    }

    pub fn with_long_side(mut self, long_side: Option<f64>) -> Self {
        self.long_side = long_side;
        self
    }

    pub fn url(&self, item: &str, kind: ImageKind) -> String {
        self.object_url(&[kind.as_str(), item])
    }

    /// URL of `<commit>/<parts...>`.
    fn object_url(&self, parts: &[&str]) -> String {
        let object = format!("{}/{}", self.commit, parts.join("/"));
        format!(
            "{FIREBASE_BASE}/{}/o/{}?alt=media",
            self.bucket,
            form_escape(&object)
        )
    }

    fn display_size(&self, relative: &Path) -> Option<DisplaySize> {
        let long_side = self.long_side?;
        let path = self.local_dir.join(relative);
        match image::image_dimensions(&path) {
            Ok((width, height)) => DisplaySize::fit(width, height, long_side),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "cannot read image dimensions");
                None
            }
        }
    }
}

impl ImageLocator for FirebaseLocator {
    fn locate(&self, item: &str, kind: ImageKind) -> ImageRef {
        ImageRef {
            url: self.url(item, kind),
            size: self.display_size(Path::new(item)),
        }
    }
}

impl ScreenLocator for FirebaseLocator {
    fn locate_screen(&self, device: &str, screen: &str) -> ImageRef {
        ImageRef {
            url: self.object_url(&[device, screen]),
            size: self.display_size(&Path::new(device).join(screen)),
        }
    }
}
