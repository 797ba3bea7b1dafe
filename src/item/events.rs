//! Event vocabulary for the download item's single-writer loop.
//!
//! Everything that can change an item's state arrives as an [`ItemEvent`]:
//! user/engine commands from a [`DownloadHandle`](crate::DownloadHandle)
//! and completions of the asynchronous collaborator operations the item
//! itself spawned. Events are processed strictly in arrival order by the
//! owning task, which is what makes every handler's state re-validation
//! meaningful.

use tokio::sync::mpsc;

use crate::delegate::TargetDetermination;
use crate::interrupt::InterruptReason;
use crate::transfer::TransferFile;

/// Sender half of an item's event channel.
pub type EventSender = mpsc::UnboundedSender<ItemEvent>;

/// Receiver half of an item's event channel.
pub type EventReceiver = mpsc::UnboundedReceiver<ItemEvent>;

/// Creates the event channel for one download item.
#[must_use]
pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// A single input to the download state machine.
///
/// Variants carrying a `file` return ownership of the transfer handle
/// that was moved into the spawned operation.
pub enum ItemEvent {
    /// The transfer file finished (or failed) initialization.
    FileInitialized {
        /// Initialization outcome.
        result: Result<(), InterruptReason>,
        /// The transfer handle, returned from the init task.
        file: Box<dyn TransferFile>,
    },

    /// The delegate determined the target path. `None` means the delegate
    /// declined, which cancels the download.
    TargetDetermined(Option<TargetDetermination>),

    /// The intermediate (uniquifying) rename finished.
    IntermediateRenamed {
        /// Rename outcome; on success, the unique intermediate path.
        result: Result<std::path::PathBuf, InterruptReason>,
        /// The transfer handle, returned from the rename task.
        file: Box<dyn TransferFile>,
    },

    /// The final (annotating) rename finished.
    FinalRenamed {
        /// Rename outcome; on success, the final path.
        result: Result<std::path::PathBuf, InterruptReason>,
        /// The transfer handle, returned from the rename task.
        file: Box<dyn TransferFile>,
    },

    /// A delegate that previously deferred the completion gate asks for a
    /// re-check.
    RetryCompletion,

    /// A delegate that deferred the open decision delivered it.
    DelayedOpenDone {
        /// Whether the delegate auto-opened the download itself.
        auto_opened: bool,
    },

    /// Progress report from the transfer engine.
    Progress {
        /// Bytes written so far.
        bytes_so_far: i64,
        /// Current transfer rate.
        bytes_per_sec: i64,
        /// Serialized digest-in-progress, opaque to this crate.
        hash_state: String,
    },

    /// The transfer engine wrote the last byte.
    AllDataSaved {
        /// Final content hash.
        final_hash: String,
    },

    /// The transfer engine reported a failure.
    EngineError {
        /// Why the transfer failed.
        reason: InterruptReason,
    },

    /// Pause the download.
    Pause,

    /// Resume a paused or interrupted download.
    Resume,

    /// Cancel the download.
    Cancel {
        /// True for an explicit user cancel, false for shutdown.
        user_initiated: bool,
    },

    /// The user accepted a dangerous download.
    DangerValidated,

    /// Re-run the completion gate.
    MaybeComplete,

    /// Stop the event loop.
    Shutdown,
}

impl std::fmt::Debug for ItemEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::FileInitialized { .. } => "FileInitialized",
            Self::TargetDetermined(_) => "TargetDetermined",
            Self::IntermediateRenamed { .. } => "IntermediateRenamed",
            Self::FinalRenamed { .. } => "FinalRenamed",
            Self::RetryCompletion => "RetryCompletion",
            Self::DelayedOpenDone { .. } => "DelayedOpenDone",
            Self::Progress { .. } => "Progress",
            Self::AllDataSaved { .. } => "AllDataSaved",
            Self::EngineError { .. } => "EngineError",
            Self::Pause => "Pause",
            Self::Resume => "Resume",
            Self::Cancel { .. } => "Cancel",
            Self::DangerValidated => "DangerValidated",
            Self::MaybeComplete => "MaybeComplete",
            Self::Shutdown => "Shutdown",
        };
        f.write_str(name)
    }
}

/// Handed to the delegate when the completion gate is consulted.
///
/// A delegate that wants to hold up completion (say, a pending antivirus
/// scan) returns `false` from
/// [`should_complete_download`](crate::delegate::DownloadDelegate::should_complete_download),
/// keeps this handle, and calls [`notify`](Self::notify) once the hold
/// clears; the item then re-runs the gate.
#[derive(Clone)]
pub struct CompletionRetry {
    events: EventSender,
}

impl CompletionRetry {
    pub(crate) fn new(events: EventSender) -> Self {
        Self { events }
    }

    /// Asks the item to re-check the completion gate.
    pub fn notify(&self) {
        // Send failure means the item is gone; nothing left to complete.
        let _ = self.events.send(ItemEvent::RetryCompletion);
    }
}

/// Handed to the delegate when the open decision is consulted.
///
/// A delegate that cannot answer
/// [`should_open_download`](crate::delegate::DownloadDelegate::should_open_download)
/// synchronously returns `false`, keeps this handle, and resolves it later
/// with [`opened`](Self::opened); the item stays in its delayed-complete
/// holding pattern until then.
pub struct DelayedOpen {
    events: EventSender,
}

impl DelayedOpen {
    pub(crate) fn new(events: EventSender) -> Self {
        Self { events }
    }

    /// Delivers the deferred open decision.
    pub fn opened(self, auto_opened: bool) {
        let _ = self.events.send(ItemEvent::DelayedOpenDone { auto_opened });
    }
}
