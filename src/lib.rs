//! Download Lifecycle Library
//!
//! This library models the full lifecycle of a single download: a state
//! machine that owns the transfer-engine handles, drives the completion
//! cascade (target determination, intermediate rename, completion gate,
//! final rename), classifies interrupts, and decides how an interrupted
//! download may be resumed.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`item`] - The download item state machine and its event types
//! - [`actor`] - Single-owner event loop and command handle
//! - [`state`] - Internal and externally visible lifecycle states
//! - [`interrupt`] - Interrupt reasons and their resumability classes
//! - [`resume`] - Resume mode decision logic
//! - [`danger`] - Danger classification of downloaded content
//! - [`transfer`] - Traits the transfer engine implements
//! - [`delegate`] - Embedder hooks (target choice, completion gates, UI)
//! - [`observer`] - Item change notifications
//! - [`history`] - SQLite-backed download history

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod actor;
pub mod danger;
pub mod delegate;
pub mod history;
pub mod interrupt;
pub mod item;
pub mod observer;
pub mod resume;
pub mod state;
pub mod transfer;

// Re-export commonly used types
pub use actor::{DownloadActor, DownloadHandle};
pub use danger::DangerType;
pub use delegate::{
    DownloadDelegate, NullDelegate, ResumeRequest, TargetDetermination, TargetDisposition,
    TargetRequest,
};
pub use history::{DownloadRow, HistoryError, HistoryStore};
pub use interrupt::{InterruptReason, ResumeClass};
pub use item::events::{
    CompletionRetry, DelayedOpen, EventReceiver, EventSender, ItemEvent, event_channel,
};
pub use item::{DeleteReason, DownloadCreateInfo, DownloadItem, HistoryRecord, ItemError};
pub use observer::{DownloadObserver, ObserverRegistry};
pub use resume::{MAX_AUTO_RESUME_ATTEMPTS, ResumeMode};
pub use state::DownloadState;
pub use transfer::{NullRequestHandle, RequestHandle, TransferFile};
