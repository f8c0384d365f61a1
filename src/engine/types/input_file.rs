use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

/// One downloaded per-dataset file. Immutable once discovered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputFile {
    pub path: PathBuf,
    pub size_bytes: u64,
}

impl InputFile {
    pub fn new(path: impl Into<PathBuf>, size_bytes: u64) -> Self {
        Self {
            path: path.into(),
            size_bytes,
        }
    }

    /// Stats the path. An unreadable path is kept with size 0 so the
    /// processor can classify it instead of the discovery step.
    pub fn discover(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let size_bytes = match std::fs::metadata(&path) {
            Ok(meta) => meta.len(),
            Err(e) => {
                warn!(target: "input_file::discover", path = %path.display(), error = %e, "Cannot stat input file");
                0
            }
        };
        Self { path, size_bytes }
    }

    pub fn discover_all<I, P>(paths: I) -> Vec<Self>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        paths.into_iter().map(Self::discover).collect()
    }

    pub fn file_name(&self) -> String {
        display_name(&self.path)
    }
}

pub(crate) fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
