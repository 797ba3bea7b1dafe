//! Download lifecycle states.
//!
//! The state machine runs on five internal states while only four are ever
//! visible outside the crate: `Completing` is a committed-but-unfinalized
//! phase that projects to `InProgress`. The projection lives in exactly
//! one place ([`InternalState::external`]) so the two layers cannot
//! diverge.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Internal state of a download item.
///
/// `Completing` means the final rename succeeded and the transfer handle
/// has been released; cancels and interrupts arriving after that point are
/// ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum InternalState {
    /// Transfer is live (or waiting on target determination / the
    /// completion gate).
    InProgress,
    /// Committed to completion; awaiting the delegate's open decision.
    Completing,
    /// Terminal: data on disk under the target name.
    Complete,
    /// Terminal: cancelled by the user or shutdown.
    Cancelled,
    /// Semi-terminal: failed, possibly resumable.
    Interrupted,
}

impl InternalState {
    /// Projects to the externally visible state.
    ///
    /// This is the only place the `Completing` sub-state collapses; keep
    /// it that way.
    pub(crate) fn external(self) -> DownloadState {
        match self {
            Self::InProgress | Self::Completing => DownloadState::InProgress,
            Self::Complete => DownloadState::Complete,
            Self::Cancelled => DownloadState::Cancelled,
            Self::Interrupted => DownloadState::Interrupted,
        }
    }

    /// Whether the download is actively running in this state.
    ///
    /// Crossing the active/inactive edge emits the termination and
    /// resumption lifecycle events.
    pub(crate) fn is_active(self) -> bool {
        matches!(self, Self::InProgress | Self::Completing)
    }

    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::InProgress => "IN_PROGRESS",
            Self::Completing => "COMPLETING",
            Self::Complete => "COMPLETE",
            Self::Cancelled => "CANCELLED",
            Self::Interrupted => "INTERRUPTED",
        }
    }
}

impl fmt::Display for InternalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Externally visible state of a download item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadState {
    /// The download is live.
    InProgress,
    /// The download finished and the file carries its final name.
    Complete,
    /// The download was cancelled.
    Cancelled,
    /// The download failed; it may be resumable.
    Interrupted,
}

impl DownloadState {
    /// Maps a persisted external state back to an internal one.
    ///
    /// Only used when reconstructing items from history; the
    /// history-import corrections (a stored `InProgress` cannot survive a
    /// restart) are applied by the item constructor, not here.
    pub(crate) fn internal(self) -> InternalState {
        match self {
            Self::InProgress => InternalState::InProgress,
            Self::Complete => InternalState::Complete,
            Self::Cancelled => InternalState::Cancelled,
            Self::Interrupted => InternalState::Interrupted,
        }
    }

    /// Returns the database string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InProgress => "in_progress",
            Self::Complete => "complete",
            Self::Cancelled => "cancelled",
            Self::Interrupted => "interrupted",
        }
    }
}

impl fmt::Display for DownloadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for DownloadState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_progress" => Ok(Self::InProgress),
            "complete" => Ok(Self::Complete),
            "cancelled" => Ok(Self::Cancelled),
            "interrupted" => Ok(Self::Interrupted),
            _ => Err(format!("invalid download state: {s}")),
        }
    }
}
