//! Pending file-change proposals and their diff views.

use std::{collections::HashMap, path::PathBuf};

use crate::{bridge_ipc::FileChange, error::Result};

/// What the CLI proposes for a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Proposal {
    /// Full replacement content.
    Content(String),
    /// Unified diff against the file on disk.
    Patch(String),
}

/// A proposed change awaiting presentation or resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingDiff {
    pub id: String,
    pub file_path: PathBuf,
    pub proposal: Proposal,
    presented: bool,
}

impl PendingDiff {
    pub const fn is_presented(&self) -> bool {
        self.presented
    }
}

impl From<FileChange> for PendingDiff {
    fn from(change: FileChange) -> Self {
        let proposal = match (change.content, change.diff) {
            (Some(content), _) => Proposal::Content(content),
            (None, Some(diff)) => Proposal::Patch(diff),
            (None, None) => Proposal::Content(String::new()),
        };
        Self {
            id: change.id,
            file_path: change.file_path,
            proposal,
            presented: false,
        }
    }
}

/// Capability that renders and retracts diff views.
pub trait DiffPresenter {
    fn present(&mut self, diff: &PendingDiff) -> Result<()>;
    fn retract(&mut self, id: &str);
}

/// Tracks pending diffs keyed by proposal id.
///
/// Each id runs its own lifecycle (add, optionally show, close). A close is
/// terminal: a later change with the same id starts over.
pub struct DiffManager<P> {
    pending: HashMap<String, PendingDiff>,
    presenter: P,
}

impl<P: DiffPresenter> DiffManager<P> {
    pub fn new(presenter: P) -> Self {
        Self {
            pending: HashMap::new(),
            presenter,
        }
    }

    /// Record a change, replacing any earlier entry with the same id.
    /// A view still showing the replaced entry is retracted.
    pub fn add_pending_change(&mut self, change: FileChange) {
        let diff = PendingDiff::from(change);
        tracing::debug!("Pending change {} for {}", diff.id, diff.file_path.display());
        if let Some(previous) = self.pending.insert(diff.id.clone(), diff) {
            if previous.presented {
                tracing::info!("Replacing presented diff {}", previous.id);
                self.presenter.retract(&previous.id);
            }
        }
    }

    /// Present the diff for `id`. Returns `false` when the id is unknown or
    /// presentation failed.
    pub fn show_diff(&mut self, id: &str) -> bool {
        let Some(diff) = self.pending.get_mut(id) else {
            tracing::debug!("show_diff: no pending change {id}");
            return false;
        };
        match self.presenter.present(diff) {
            Ok(()) => {
                diff.presented = true;
                true
            }
            Err(e) => {
                tracing::error!("Failed to show diff {id}: {e}");
                false
            }
        }
    }

    /// Drop the entry for `id` and retract its view. Returns `false` when the
    /// id is unknown.
    pub fn close_diff(&mut self, id: &str) -> bool {
        let Some(diff) = self.pending.remove(id) else {
            tracing::debug!("close_diff: no pending change {id}");
            return false;
        };
        self.presenter.retract(&diff.id);
        tracing::info!("Closed diff {id}");
        true
    }

    pub fn pending(&self, id: &str) -> Option<&PendingDiff> {
        self.pending.get(id)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub const fn presenter(&self) -> &P {
        &self.presenter
    }

    /// Retract every open view and forget all pending changes.
    pub fn dispose(&mut self) {
        for (id, diff) in self.pending.drain() {
            if diff.presented {
                self.presenter.retract(&id);
            }
        }
    }
}
