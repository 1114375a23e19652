//! Diff presenter that writes proposals next to a cache directory so any
//! external diff tool can compare them with the file on disk.

use std::{
    fmt::Write,
    fs, io,
    path::{Path, PathBuf},
};

use super::manager::{DiffPresenter, PendingDiff, Proposal};
use crate::error::Result;

/// Returns the directory where diff previews are written.
pub fn preview_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("coder-bridge/diffs")
}

pub struct PreviewFilePresenter {
    root: PathBuf,
}

impl PreviewFilePresenter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory holding the preview for one proposal id. Every byte of the
    /// id is hex-encoded, so distinct ids never share a directory and no id
    /// resolves to the root itself.
    pub fn entry_dir(&self, id: &str) -> PathBuf {
        self.root.join(entry_name(id))
    }

    /// Path of the preview file for a pending diff.
    pub fn preview_path(&self, diff: &PendingDiff) -> PathBuf {
        let name = diff
            .file_path
            .file_name()
            .map_or_else(|| "proposal".to_string(), |n| n.to_string_lossy().into_owned());
        let name = match diff.proposal {
            Proposal::Content(_) => name,
            Proposal::Patch(_) => format!("{name}.diff"),
        };
        self.entry_dir(&diff.id).join(name)
    }
}

impl Default for PreviewFilePresenter {
    fn default() -> Self {
        Self::new(preview_dir())
    }
}

impl DiffPresenter for PreviewFilePresenter {
    fn present(&mut self, diff: &PendingDiff) -> Result<()> {
        let dir = self.entry_dir(&diff.id);
        // Re-rendering starts from an empty directory.
        remove_dir(&dir)?;
        fs::create_dir_all(&dir)?;

        let path = self.preview_path(diff);
        let body = match &diff.proposal {
            Proposal::Content(content) | Proposal::Patch(content) => content,
        };
        fs::write(&path, body)?;
        tracing::info!(
            "Diff {}: {} <-> {}",
            diff.id,
            diff.file_path.display(),
            path.display()
        );
        Ok(())
    }

    fn retract(&mut self, id: &str) {
        let dir = self.entry_dir(id);
        if let Err(e) = remove_dir(&dir) {
            tracing::warn!("Failed to remove diff preview {}: {e}", dir.display());
        }
    }
}

fn entry_name(id: &str) -> String {
    id.bytes().fold(String::from("diff-"), |mut name, b| {
        let _ = write!(name, "{b:02x}");
        name
    })
}

fn remove_dir(dir: &Path) -> io::Result<()> {
    match fs::remove_dir_all(dir) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}
