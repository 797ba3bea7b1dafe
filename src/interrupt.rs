//! Interrupt reasons reported by the transfer engine and their
//! classification for resume decisions.
//!
//! When a transfer fails, the engine reports an [`InterruptReason`]. The
//! reason alone decides the *category* of recovery available; the final
//! [`ResumeMode`](crate::resume::ResumeMode) also factors in whether an
//! intermediate file exists and whether automatic retries are exhausted
//! (see [`crate::resume`]).
//!
//! # Classification
//!
//! | Reason | Class | Rationale |
//! |--------|-------|-----------|
//! | `FileTransientError`, `NetworkTimeout` | Transient | May succeed on a plain retry, partial data reusable |
//! | `ServerPrecondition`, `ServerNoRange`, `FileTooShort` | RestartRequired | Partial data is unusable, but a fresh attempt can work |
//! | `NetworkFailed`, `NetworkDisconnected`, `NetworkServerDown`, `ServerFailed`, `UserShutdown`, `Crash` | UserAction | Retry plausible but not worth attempting unprompted |
//! | `FileFailed`, `FileAccessDenied`, `FileNoSpace`, `FileNameTooLong`, `FileTooLarge` | Fatal | Local filesystem problem; only a user-driven restart makes sense |
//! | `FileVirusInfected`, `FileBlocked`, `FileSecurityCheckFailed`, `ServerBadContent`, `UserCanceled` | NotResumable | Retrying would not help or is not wanted |

use std::fmt;

use serde::{Deserialize, Serialize};

/// Reason a transfer was interrupted, as reported by the transfer engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterruptReason {
    /// Generic file operation failure.
    FileFailed,
    /// The file cannot be written due to access restrictions.
    FileAccessDenied,
    /// The target volume is out of space.
    FileNoSpace,
    /// The resulting file name exceeds filesystem limits.
    FileNameTooLong,
    /// The file is too large for the target filesystem.
    FileTooLarge,
    /// A security scan flagged the file as infected.
    FileVirusInfected,
    /// Transient file error (sharing violation, lock contention).
    FileTransientError,
    /// Local policy blocked writing the file.
    FileBlocked,
    /// A security check on the file could not complete.
    FileSecurityCheckFailed,
    /// The on-disk file is shorter than the resumption offset.
    FileTooShort,
    /// Generic network failure.
    NetworkFailed,
    /// The network operation timed out.
    NetworkTimeout,
    /// The connection was lost mid-transfer.
    NetworkDisconnected,
    /// The remote server became unreachable.
    NetworkServerDown,
    /// The server returned a failure response.
    ServerFailed,
    /// The server does not support byte-range requests.
    ServerNoRange,
    /// A range-request precondition (ETag/Last-Modified) failed.
    ServerPrecondition,
    /// The server delivered content it flagged as bad.
    ServerBadContent,
    /// The user cancelled the download.
    UserCanceled,
    /// The download was cut short by application shutdown.
    UserShutdown,
    /// The previous session crashed with the download in flight.
    Crash,
}

/// Recovery category derived purely from the interrupt reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeClass {
    /// Transient network/file error: continue from the partial file when
    /// one exists, restart otherwise.
    Transient,
    /// The partial file cannot be reused; a restart is required either way.
    RestartRequired,
    /// Plausibly recoverable, but automatic retry is not attempted.
    UserAction,
    /// Filesystem-fatal: only a user-driven restart is offered.
    Fatal,
    /// No resumption is possible or appropriate.
    NotResumable,
}

impl InterruptReason {
    /// Classifies this reason for resume-mode derivation.
    ///
    /// This is a pure function of the reason; see the module docs for the
    /// full table.
    #[must_use]
    pub fn resume_class(self) -> ResumeClass {
        match self {
            Self::FileTransientError | Self::NetworkTimeout => ResumeClass::Transient,

            Self::ServerPrecondition | Self::ServerNoRange | Self::FileTooShort => {
                ResumeClass::RestartRequired
            }

            Self::NetworkFailed
            | Self::NetworkDisconnected
            | Self::NetworkServerDown
            | Self::ServerFailed
            | Self::UserShutdown
            | Self::Crash => ResumeClass::UserAction,

            Self::FileFailed
            | Self::FileAccessDenied
            | Self::FileNoSpace
            | Self::FileNameTooLong
            | Self::FileTooLarge => ResumeClass::Fatal,

            Self::FileVirusInfected
            | Self::FileBlocked
            | Self::FileSecurityCheckFailed
            | Self::ServerBadContent
            | Self::UserCanceled => ResumeClass::NotResumable,
        }
    }

    /// Returns the stable string representation used in logs and the
    /// history store.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FileFailed => "file_failed",
            Self::FileAccessDenied => "file_access_denied",
            Self::FileNoSpace => "file_no_space",
            Self::FileNameTooLong => "file_name_too_long",
            Self::FileTooLarge => "file_too_large",
            Self::FileVirusInfected => "file_virus_infected",
            Self::FileTransientError => "file_transient_error",
            Self::FileBlocked => "file_blocked",
            Self::FileSecurityCheckFailed => "file_security_check_failed",
            Self::FileTooShort => "file_too_short",
            Self::NetworkFailed => "network_failed",
            Self::NetworkTimeout => "network_timeout",
            Self::NetworkDisconnected => "network_disconnected",
            Self::NetworkServerDown => "network_server_down",
            Self::ServerFailed => "server_failed",
            Self::ServerNoRange => "server_no_range",
            Self::ServerPrecondition => "server_precondition",
            Self::ServerBadContent => "server_bad_content",
            Self::UserCanceled => "user_canceled",
            Self::UserShutdown => "user_shutdown",
            Self::Crash => "crash",
        }
    }

    /// All reasons, for exhaustive table tests.
    pub const ALL: [Self; 21] = [
        Self::FileFailed,
        Self::FileAccessDenied,
        Self::FileNoSpace,
        Self::FileNameTooLong,
        Self::FileTooLarge,
        Self::FileVirusInfected,
        Self::FileTransientError,
        Self::FileBlocked,
        Self::FileSecurityCheckFailed,
        Self::FileTooShort,
        Self::NetworkFailed,
        Self::NetworkTimeout,
        Self::NetworkDisconnected,
        Self::NetworkServerDown,
        Self::ServerFailed,
        Self::ServerNoRange,
        Self::ServerPrecondition,
        Self::ServerBadContent,
        Self::UserCanceled,
        Self::UserShutdown,
        Self::Crash,
    ];
}

impl fmt::Display for InterruptReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for InterruptReason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|reason| reason.as_str() == s)
            .copied()
            .ok_or_else(|| format!("invalid interrupt reason: {s}"))
    }
}
