//! Diff lifecycle for file changes proposed by the CLI.

mod manager;
mod preview;

pub use manager::{DiffManager, DiffPresenter, PendingDiff, Proposal};
pub use preview::{preview_dir, PreviewFilePresenter};
