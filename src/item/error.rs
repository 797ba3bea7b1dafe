//! Error types for download item operations.
//!
//! These cover only precondition violations, which indicate a caller bug
//! rather than a runtime condition; racy or stale inputs are silently
//! dropped by the state guards instead of producing errors.

use thiserror::Error;

use crate::state::DownloadState;

/// Precondition violations on [`DownloadItem`](crate::DownloadItem)
/// operations.
#[derive(Debug, Error)]
pub enum ItemError {
    /// `start` was called while a transfer handle is already owned.
    #[error("download {id} already has an active transfer")]
    TransferAlreadyAttached {
        /// The download's id.
        id: i64,
    },

    /// `on_all_data_saved` was called twice for the same attempt.
    #[error("download {id} already has all data saved")]
    DuplicateCompletion {
        /// The download's id.
        id: i64,
    },

    /// An operation that requires a live transfer found the item in a
    /// different state.
    #[error("download {id} is {state}, expected in-progress")]
    NotInProgress {
        /// The download's id.
        id: i64,
        /// The externally visible state the item was actually in.
        state: DownloadState,
    },
}
