//! Transfer engine boundary.
//!
//! The engine that actually moves bytes and renames files lives outside
//! this crate; the state machine drives it through [`TransferFile`] and
//! controls the originating network request through [`RequestHandle`].
//!
//! # Ownership
//!
//! A [`DownloadItem`](crate::DownloadItem) owns at most one boxed
//! `TransferFile` at a time. While a rename or initialization is in
//! flight, the box has physically moved into the spawned task and comes
//! back with the completion event. Teardown is final by construction:
//! [`TransferFile::detach`] and [`TransferFile::cancel`] consume the box,
//! so a released handle can never be driven again.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::interrupt::InterruptReason;

/// One download's file on disk, as managed by the transfer engine.
///
/// All methods report failure as an [`InterruptReason`], which the state
/// machine funnels into its single interrupt path.
#[async_trait]
pub trait TransferFile: Send {
    /// Prepares the on-disk file (creates/opens it, restores hash state
    /// when resuming).
    async fn initialize(&mut self) -> Result<(), InterruptReason>;

    /// Renames the file to a unique name in `target`'s directory and
    /// returns the chosen path.
    async fn rename_and_uniquify(&mut self, target: PathBuf) -> Result<PathBuf, InterruptReason>;

    /// Renames the file to its final name and applies origin metadata
    /// annotations; returns the final path.
    async fn rename_and_annotate(&mut self, target: PathBuf) -> Result<PathBuf, InterruptReason>;

    /// Releases the file, leaving it on disk (completion, or an interrupt
    /// whose resume mode can continue from the partial file).
    async fn detach(self: Box<Self>);

    /// Releases the file and deletes it from disk (cancellation, or an
    /// interrupt that forces a restart).
    async fn cancel(self: Box<Self>);
}

/// Control surface for the originating network request.
pub trait RequestHandle: Send {
    /// Pauses the underlying request.
    fn pause_request(&self);

    /// Resumes a paused request.
    fn resume_request(&self);

    /// Cancels the request. Idempotent.
    fn cancel_request(&self);
}

/// Request handle that does nothing.
///
/// Used for manual-save captures and history-imported items, which have
/// no live network request but still receive `pause`/`cancel` calls from
/// generic code paths.
#[derive(Debug, Default)]
pub struct NullRequestHandle;

impl RequestHandle for NullRequestHandle {
    fn pause_request(&self) {}
    fn resume_request(&self) {}
    fn cancel_request(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_request_handle_is_inert() {
        let handle = NullRequestHandle;
        handle.pause_request();
        handle.resume_request();
        handle.cancel_request();
    }
}
