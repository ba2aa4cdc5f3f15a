//! Output directory layout and public image references.

use std::path::{Component, Path, PathBuf};

use parcel_common::{sanitize_path_segment, ParcelRecord, ParcelVizError, ParcelVizResult};

/// URL prefix rendered images are served under.
pub const PUBLIC_PREFIX: &str = "/outputs";

/// Filesystem root holding one directory per parcel.
#[derive(Debug, Clone)]
pub struct OutputStore {
    root: PathBuf,
}

impl OutputStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory for `parcel`, without touching the filesystem.
    pub fn parcel_dir_path(&self, parcel: &ParcelRecord) -> PathBuf {
        self.root.join(parcel.output_segment())
    }

    /// Create (if absent) and return the directory for `parcel`.
    pub async fn parcel_dir(&self, parcel: &ParcelRecord) -> ParcelVizResult<PathBuf> {
        let dir = self.parcel_dir_path(parcel);
        tokio::fs::create_dir_all(&dir).await.map_err(|e| {
            ParcelVizError::Io(format!("failed to create {}: {}", dir.display(), e))
        })?;
        Ok(dir)
    }

    /// Image path for `layer` inside a parcel directory.
    pub fn layer_path(&self, parcel_dir: &Path, layer: &str) -> PathBuf {
        parcel_dir.join(format!("{}.png", sanitize_path_segment(layer)))
    }

    /// `/outputs/<relative path>` for files under the root, otherwise the
    /// path as given.
    pub fn public_url(&self, path: &Path) -> String {
        match path.strip_prefix(&self.root) {
            Ok(relative) => {
                let segments: Vec<String> = relative
                    .components()
                    .filter_map(|c| match c {
                        Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
                        _ => None,
                    })
                    .collect();
                format!("{}/{}", PUBLIC_PREFIX, segments.join("/"))
            }
            Err(_) => path.display().to_string(),
        }
    }
}
