//! Delegate boundary: the external authority for target paths, safety
//! gating and completion gating.
//!
//! The state machine never decides where a file belongs, whether it is
//! safe, or whether completion may proceed; it asks the delegate. All
//! methods have defaults so embedders implement only the decisions they
//! care about.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use url::Url;

use crate::danger::DangerType;
use crate::item::DownloadItem;
use crate::item::events::{CompletionRetry, DelayedOpen};

/// What to do when the target path already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TargetDisposition {
    /// Replace the existing file.
    #[default]
    Overwrite,
    /// Pick a unique variation of the name.
    Uniquify,
    /// Ask the user.
    Prompt,
}

/// The delegate's answer to target determination.
#[derive(Debug, Clone)]
pub struct TargetDetermination {
    /// Intended final path.
    pub target_path: PathBuf,
    /// Conflict policy for the target path.
    pub disposition: TargetDisposition,
    /// Safety classification of the content.
    pub danger_type: DangerType,
    /// Temporary name to download under. Must share a parent directory
    /// with `target_path` so the final rename stays on one volume.
    pub intermediate_path: PathBuf,
}

/// Owned snapshot of the item metadata relevant to target determination.
///
/// Target determination runs off the control task; the delegate gets a
/// value object instead of a borrow of the item.
#[derive(Debug, Clone)]
pub struct TargetRequest {
    /// The download's id.
    pub id: i64,
    /// Final URL of the redirect chain, if any.
    pub url: Option<Url>,
    /// Server-suggested filename (content-disposition or anchor hint).
    pub suggested_filename: String,
    /// Caller-mandated path override; empty when unset.
    pub forced_file_path: PathBuf,
    /// Effective MIME type.
    pub mime_type: String,
    /// Explicit display name; empty when unset.
    pub display_name: PathBuf,
}

/// Everything needed to re-establish the network request for a resumption.
///
/// For restart modes the offset and validators arrive already reset.
#[derive(Debug, Clone)]
pub struct ResumeRequest {
    /// URL to fetch (the original, pre-redirect URL).
    pub url: Option<Url>,
    /// Partial file to continue into; empty for restarts.
    pub file_path: PathBuf,
    /// Byte offset to continue from.
    pub offset: i64,
    /// Serialized digest-in-progress matching `offset`.
    pub hash_state: String,
    /// Last-Modified validator from the interrupted attempt.
    pub last_modified: String,
    /// ETag validator from the interrupted attempt.
    pub etag: String,
}

/// External authority consulted by the download state machine.
///
/// Synchronous methods run inline on the item's control task;
/// `determine_download_target` and `resume_interrupted_download` run on
/// spawned tasks and re-enter through the item's event channel.
#[async_trait]
pub trait DownloadDelegate: Send + Sync {
    /// Decides the target path, disposition, danger classification and
    /// intermediate name for a download. Returning `None` cancels the
    /// download.
    async fn determine_download_target(
        &self,
        request: TargetRequest,
    ) -> Option<TargetDetermination> {
        let _ = request;
        None
    }

    /// Completion gate. Return `false` to hold the download back and keep
    /// `retry` to re-open the gate later.
    fn should_complete_download(&self, item: &DownloadItem, retry: CompletionRetry) -> bool {
        let _ = (item, retry);
        true
    }

    /// Open gate, consulted once completion is committed. Return `false`
    /// to defer and resolve `delayed` later with the auto-open outcome.
    fn should_open_download(&self, item: &DownloadItem, delayed: DelayedOpen) -> bool {
        let _ = (item, delayed);
        true
    }

    /// Whether files with this path's extension are auto-opened.
    fn should_open_file_based_on_extension(&self, path: &Path) -> bool {
        let _ = path;
        false
    }

    /// Re-establishes the network request for an interrupted download.
    async fn resume_interrupted_download(&self, request: ResumeRequest, id: i64) {
        let _ = (request, id);
    }

    /// Makes the download visible in the embedder's UI.
    fn show_download(&self, item: &DownloadItem) {
        let _ = item;
    }

    /// Opens the completed download with the platform handler.
    fn open_download(&self, item: &DownloadItem) {
        let _ = item;
    }

    /// The item was removed from its collection.
    fn download_removed(&self, item: &DownloadItem) {
        let _ = item;
    }

    /// Spawn a check for whether the on-disk file still exists.
    fn check_for_file_removal(&self, item: &DownloadItem) {
        let _ = item;
    }

    /// An item took a reference to this delegate.
    fn attach(&self) {}

    /// An item released its reference to this delegate.
    fn detach(&self) {}

    /// Hook for embedder-side consistency checks at sensitive points.
    fn assert_state_consistent(&self, item: &DownloadItem) {
        let _ = item;
    }
}

/// Delegate that accepts every default. Useful for tests and for items
/// that never reach target determination.
#[derive(Debug, Default)]
pub struct NullDelegate;

#[async_trait]
impl DownloadDelegate for NullDelegate {}
