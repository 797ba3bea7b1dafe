//! Resume mode derivation for interrupted downloads.
//!
//! [`resume_mode`] is a pure function deciding how an interrupted download
//! may come back: automatically or only on user request, and continuing
//! from the partial file or restarting from scratch.
//!
//! # Decision table
//!
//! `restart` = no intermediate file on disk; `user` = auto-resume attempts
//! exhausted or the download is paused.
//!
//! | Reason class | neither | `user` | `restart` | both |
//! |---|---|---|---|---|
//! | Transient | ImmediateContinue | UserContinue | ImmediateRestart | UserRestart |
//! | RestartRequired | ImmediateRestart | UserRestart | ImmediateRestart | UserRestart |
//! | UserAction | UserContinue | UserContinue | UserRestart | UserRestart |
//! | Fatal | UserRestart | UserRestart | UserRestart | UserRestart |
//! | NotResumable / none | Invalid | Invalid | Invalid | Invalid |

use tracing::debug;

use crate::interrupt::{InterruptReason, ResumeClass};

/// Maximum number of automatic (non-user-initiated) resumption attempts.
pub const MAX_AUTO_RESUME_ATTEMPTS: u32 = 5;

/// Strategy for recovering an interrupted download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeMode {
    /// No resumption is possible or applicable.
    Invalid,
    /// Automatically continue from the intermediate file.
    ImmediateContinue,
    /// Automatically restart from byte zero.
    ImmediateRestart,
    /// Continuation is possible but requires explicit user action.
    UserContinue,
    /// Restart is possible but requires explicit user action.
    UserRestart,
}

impl ResumeMode {
    /// Whether this mode restarts from scratch rather than continuing.
    #[must_use]
    pub fn is_restart(self) -> bool {
        matches!(self, Self::ImmediateRestart | Self::UserRestart)
    }

    /// Whether this mode triggers resumption without user action.
    #[must_use]
    pub fn is_automatic(self) -> bool {
        matches!(self, Self::ImmediateRestart | Self::ImmediateContinue)
    }

    /// Debug string used in item logging.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Invalid => "invalid",
            Self::ImmediateContinue => "immediate_continue",
            Self::ImmediateRestart => "immediate_restart",
            Self::UserContinue => "user_continue",
            Self::UserRestart => "user_restart",
        }
    }
}

impl std::fmt::Display for ResumeMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Derives the resumption strategy for an interrupted download.
///
/// # Arguments
///
/// * `last_reason` - The most recent interrupt reason, if any
/// * `has_intermediate_file` - Whether a partial file exists on disk
///   (current path non-empty)
/// * `force_user` - Whether automatic resumption is off the table: the
///   auto-resume counter is at [`MAX_AUTO_RESUME_ATTEMPTS`] or the
///   download is paused
#[must_use]
pub fn resume_mode(
    last_reason: Option<InterruptReason>,
    has_intermediate_file: bool,
    force_user: bool,
) -> ResumeMode {
    let Some(reason) = last_reason else {
        return ResumeMode::Invalid;
    };

    // Without a handle on the intermediate file we can only restart.
    let force_restart = !has_intermediate_file;

    let mode = match reason.resume_class() {
        ResumeClass::Transient => match (force_restart, force_user) {
            (true, true) => ResumeMode::UserRestart,
            (true, false) => ResumeMode::ImmediateRestart,
            (false, true) => ResumeMode::UserContinue,
            (false, false) => ResumeMode::ImmediateContinue,
        },

        ResumeClass::RestartRequired => {
            if force_user {
                ResumeMode::UserRestart
            } else {
                ResumeMode::ImmediateRestart
            }
        }

        ResumeClass::UserAction => {
            if force_restart {
                ResumeMode::UserRestart
            } else {
                ResumeMode::UserContinue
            }
        }

        ResumeClass::Fatal => ResumeMode::UserRestart,

        ResumeClass::NotResumable => ResumeMode::Invalid,
    };

    debug!(
        reason = %reason,
        has_intermediate_file,
        force_user,
        mode = %mode,
        "derived resume mode"
    );

    mode
}
