//! The download state machine.
//!
//! A [`DownloadItem`] tracks one file transfer from initiation through
//! completion, interruption, cancellation and resumption. It owns the
//! transfer-engine handles, enforces transition legality, drives the
//! completion cascade and fans state changes out to observers.
//!
//! # Ownership and concurrency
//!
//! All mutation happens on the single task that owns the item (see
//! [`crate::actor`]). Long-running collaborator operations (transfer
//! file initialization, renames, delegate target determination) are
//! spawned onto other tasks and re-enter through the item's event
//! channel as [`ItemEvent`]s. Every handler re-validates current state
//! first, because the item may have been cancelled or interrupted while
//! the operation was in flight; stale inputs are dropped, not queued.
//!
//! A typical lifetime:
//!
//! 1. Created for a live transfer (or rebuilt from history, or created
//!    for a manual save capture).
//! 2. [`start`](DownloadItem::start) hands over the transfer file and
//!    request handles; the file initializes asynchronously.
//! 3. The delegate determines the target path; the file is renamed to a
//!    unique intermediate name in the target directory.
//! 4. Progress updates stream in; eventually all data is saved.
//! 5. The completion gate passes; the final rename lands the target
//!    name; the transfer handle is detached and the item completes.
//!
//! Interrupts divert to `Interrupted` with a derived
//! [`ResumeMode`](crate::resume::ResumeMode) and possibly an automatic
//! resumption; cancellation funnels the same handle-teardown path with
//! the file deleted.

pub mod error;
pub mod events;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use tracing::{debug, info, warn};
use url::Url;

use crate::danger::DangerType;
use crate::delegate::{
    DownloadDelegate, ResumeRequest, TargetDetermination, TargetDisposition, TargetRequest,
};
use crate::interrupt::InterruptReason;
use crate::observer::{DownloadObserver, ObserverRegistry};
use crate::resume::{MAX_AUTO_RESUME_ATTEMPTS, ResumeMode, resume_mode};
use crate::state::{DownloadState, InternalState};
use crate::transfer::{NullRequestHandle, RequestHandle, TransferFile};

pub use error::ItemError;

use events::{CompletionRetry, DelayedOpen, EventSender, ItemEvent};

/// Why a download is being deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteReason {
    /// The user discarded the download.
    UserDiscard,
    /// Application shutdown is discarding it.
    Shutdown,
}

/// Metadata captured when a new transfer begins.
#[derive(Debug, Clone)]
pub struct DownloadCreateInfo {
    /// Globally unique download id.
    pub id: i64,
    /// Redirect chain, first = original URL, last = final URL.
    pub url_chain: Vec<Url>,
    /// Referrer of the originating navigation.
    pub referrer_url: Option<Url>,
    /// Effective MIME type.
    pub mime_type: String,
    /// MIME type before sniffing.
    pub original_mime_type: String,
    /// Raw Content-Disposition header text.
    pub content_disposition: String,
    /// Server- or page-suggested filename.
    pub suggested_filename: String,
    /// Caller-mandated save path; empty when unset.
    pub forced_file_path: PathBuf,
    /// Whether the user should be prompted for a save location.
    pub prompt_for_save_location: bool,
    /// Expected size; 0 or negative when unknown.
    pub total_bytes: i64,
    /// When the transfer started.
    pub start_time: SystemTime,
}

impl DownloadCreateInfo {
    /// Creates info for a transfer of `url_chain` with everything else
    /// defaulted.
    #[must_use]
    pub fn new(id: i64, url_chain: Vec<Url>) -> Self {
        Self {
            id,
            url_chain,
            referrer_url: None,
            mime_type: String::new(),
            original_mime_type: String::new(),
            content_disposition: String::new(),
            suggested_filename: String::new(),
            forced_file_path: PathBuf::new(),
            prompt_for_save_location: false,
            total_bytes: 0,
            start_time: SystemTime::now(),
        }
    }
}

/// Persisted shape of a download, used to rebuild items across restarts.
///
/// See [`crate::history`] for the sqlite row form.
#[derive(Debug, Clone)]
pub struct HistoryRecord {
    /// Globally unique download id.
    pub id: i64,
    /// On-disk location at persist time (may be an intermediate name).
    pub current_path: PathBuf,
    /// Intended final path.
    pub target_path: PathBuf,
    /// Redirect chain.
    pub url_chain: Vec<Url>,
    /// Referrer of the originating navigation.
    pub referrer_url: Option<Url>,
    /// When the transfer started.
    pub start_time: SystemTime,
    /// When the transfer ended, for terminal states.
    pub end_time: Option<SystemTime>,
    /// Bytes written at persist time.
    pub received_bytes: i64,
    /// Expected size; 0 or negative when unknown.
    pub total_bytes: i64,
    /// Externally visible state at persist time.
    pub state: DownloadState,
    /// Safety classification.
    pub danger_type: DangerType,
    /// Most recent interrupt reason, if any.
    pub interrupt_reason: Option<InterruptReason>,
    /// Whether the user ever opened the download.
    pub opened: bool,
}

/// One tracked download.
///
/// See the module docs for the lifecycle. Construct with
/// [`new`](Self::new), [`from_history`](Self::from_history) or
/// [`new_manual_save`](Self::new_manual_save); drive with the public
/// operations or by pumping [`ItemEvent`]s through
/// [`handle_event`](Self::handle_event).
pub struct DownloadItem {
    // Identity and origin.
    id: i64,
    is_manual_save: bool,
    url_chain: Vec<Url>,
    referrer_url: Option<Url>,

    // Destination.
    current_path: PathBuf,
    target_path: PathBuf,
    target_disposition: TargetDisposition,
    forced_file_path: PathBuf,
    display_name: PathBuf,

    // Content metadata.
    suggested_filename: String,
    content_disposition: String,
    mime_type: String,
    original_mime_type: String,
    total_bytes: i64,
    received_bytes: i64,
    bytes_per_sec: i64,
    hash: String,
    hash_state: String,
    etag: String,
    last_modified: String,

    // Lifecycle.
    state: InternalState,
    danger_type: DangerType,
    last_reason: Option<InterruptReason>,
    start_time: SystemTime,
    end_time: Option<SystemTime>,
    start_tick: Instant,
    is_paused: bool,
    auto_resume_count: u32,
    open_when_complete: bool,
    auto_opened: bool,
    opened: bool,
    is_temporary: bool,
    all_data_saved: bool,
    file_externally_removed: bool,
    delegate_delayed_complete: bool,

    // Collaborators.
    delegate: Arc<dyn DownloadDelegate>,
    events: EventSender,
    file: Option<Box<dyn TransferFile>>,
    /// True while the transfer handle has moved into a spawned operation
    /// (initialize or rename) and will come back with its event.
    transfer_in_flight: bool,
    request: Option<Box<dyn RequestHandle>>,
    observers: ObserverRegistry,
}

impl DownloadItem {
    /// Creates an item for a live transfer.
    ///
    /// The item starts in `InProgress` but owns no transfer handle until
    /// [`start`](Self::start).
    #[must_use]
    pub fn new(
        delegate: Arc<dyn DownloadDelegate>,
        events: EventSender,
        info: DownloadCreateInfo,
    ) -> Self {
        delegate.attach();
        let is_temporary = !info.forced_file_path.as_os_str().is_empty();
        let target_disposition = if info.prompt_for_save_location {
            TargetDisposition::Prompt
        } else {
            TargetDisposition::Overwrite
        };
        let item = Self {
            id: info.id,
            is_manual_save: false,
            url_chain: info.url_chain,
            referrer_url: info.referrer_url,
            current_path: PathBuf::new(),
            target_path: PathBuf::new(),
            target_disposition,
            forced_file_path: info.forced_file_path,
            display_name: PathBuf::new(),
            suggested_filename: info.suggested_filename,
            content_disposition: info.content_disposition,
            mime_type: info.mime_type,
            original_mime_type: info.original_mime_type,
            total_bytes: info.total_bytes,
            received_bytes: 0,
            bytes_per_sec: 0,
            hash: String::new(),
            hash_state: String::new(),
            etag: String::new(),
            last_modified: String::new(),
            state: InternalState::InProgress,
            danger_type: DangerType::NotDangerous,
            last_reason: None,
            start_time: info.start_time,
            end_time: None,
            start_tick: Instant::now(),
            is_paused: false,
            auto_resume_count: 0,
            open_when_complete: false,
            auto_opened: false,
            opened: false,
            is_temporary,
            all_data_saved: false,
            file_externally_removed: false,
            delegate_delayed_complete: false,
            delegate,
            events,
            file: None,
            transfer_in_flight: false,
            request: None,
            observers: ObserverRegistry::new(),
        };
        info!(id = item.id, url = %item.debug_url(), "download item created");
        item
    }

    /// Reconstructs an item from a persisted record.
    ///
    /// Two corrections apply on import: a stored `InProgress` becomes
    /// `Cancelled` (a process restart cannot have a live transfer), and a
    /// stored `Complete` forces `all_data_saved`.
    #[must_use]
    pub fn from_history(
        delegate: Arc<dyn DownloadDelegate>,
        events: EventSender,
        record: HistoryRecord,
    ) -> Self {
        delegate.attach();
        let mut state = record.state.internal();
        let mut all_data_saved = false;
        if state == InternalState::InProgress {
            state = InternalState::Cancelled;
        }
        if state == InternalState::Complete {
            all_data_saved = true;
        }
        let item = Self {
            id: record.id,
            is_manual_save: false,
            url_chain: record.url_chain,
            referrer_url: record.referrer_url,
            current_path: record.current_path,
            target_path: record.target_path,
            target_disposition: TargetDisposition::Overwrite,
            forced_file_path: PathBuf::new(),
            display_name: PathBuf::new(),
            suggested_filename: String::new(),
            content_disposition: String::new(),
            mime_type: String::new(),
            original_mime_type: String::new(),
            total_bytes: record.total_bytes,
            received_bytes: record.received_bytes,
            bytes_per_sec: 0,
            hash: String::new(),
            hash_state: String::new(),
            etag: String::new(),
            last_modified: String::new(),
            state,
            danger_type: record.danger_type,
            last_reason: record.interrupt_reason,
            start_time: record.start_time,
            end_time: record.end_time,
            start_tick: Instant::now(),
            is_paused: false,
            auto_resume_count: 0,
            open_when_complete: false,
            auto_opened: false,
            opened: record.opened,
            is_temporary: false,
            all_data_saved,
            file_externally_removed: false,
            delegate_delayed_complete: false,
            delegate,
            events,
            file: None,
            transfer_in_flight: false,
            request: Some(Box::new(NullRequestHandle)),
            observers: ObserverRegistry::new(),
        };
        debug!(id = item.id, state = %item.state, "download item restored from history");
        item
    }

    /// Creates an item for a manual "save as" capture.
    ///
    /// The capture owns its own file writing; this item only tracks state
    /// and skips the rename steps of the completion cascade.
    #[must_use]
    pub fn new_manual_save(
        delegate: Arc<dyn DownloadDelegate>,
        events: EventSender,
        id: i64,
        path: PathBuf,
        url: Url,
        mime_type: String,
    ) -> Self {
        delegate.attach();
        let item = Self {
            id,
            is_manual_save: true,
            url_chain: vec![url],
            referrer_url: None,
            current_path: path.clone(),
            target_path: path,
            target_disposition: TargetDisposition::Overwrite,
            forced_file_path: PathBuf::new(),
            display_name: PathBuf::new(),
            suggested_filename: String::new(),
            content_disposition: String::new(),
            mime_type: mime_type.clone(),
            original_mime_type: mime_type,
            total_bytes: 0,
            received_bytes: 0,
            bytes_per_sec: 0,
            hash: String::new(),
            hash_state: String::new(),
            etag: String::new(),
            last_modified: String::new(),
            state: InternalState::InProgress,
            danger_type: DangerType::NotDangerous,
            last_reason: None,
            start_time: SystemTime::now(),
            end_time: None,
            start_tick: Instant::now(),
            is_paused: false,
            auto_resume_count: 0,
            open_when_complete: false,
            auto_opened: false,
            opened: false,
            is_temporary: false,
            all_data_saved: false,
            file_externally_removed: false,
            delegate_delayed_complete: false,
            delegate,
            events,
            file: None,
            transfer_in_flight: false,
            request: Some(Box::new(NullRequestHandle)),
            observers: ObserverRegistry::new(),
        };
        info!(id = item.id, path = %item.current_path.display(), "manual save item created");
        item
    }

    // ==================== Observers ====================

    /// Registers an observer at the end of the notification order.
    pub fn add_observer(&self, observer: Arc<dyn DownloadObserver>) {
        self.observers.add(observer);
    }

    /// Unregisters an observer.
    pub fn remove_observer(&self, observer: &Arc<dyn DownloadObserver>) {
        self.observers.remove(observer);
    }

    /// Notifies all observers that the item changed.
    pub fn update_observers(&self) {
        self.observers.for_each(|o| o.on_download_updated(self));
    }

    // ==================== Event dispatch ====================

    /// Applies one event to the state machine.
    ///
    /// Called by the owning [`DownloadActor`](crate::actor::DownloadActor)
    /// loop; callable directly in tests.
    pub fn handle_event(&mut self, event: ItemEvent) {
        debug!(id = self.id, event = ?event, state = %self.state, "handling event");
        match event {
            ItemEvent::FileInitialized { result, file } => self.on_file_initialized(result, file),
            ItemEvent::TargetDetermined(determined) => self.on_target_determined(determined),
            ItemEvent::IntermediateRenamed { result, file } => {
                self.on_intermediate_renamed(result, file);
            }
            ItemEvent::FinalRenamed { result, file } => self.on_final_renamed(result, file),
            ItemEvent::RetryCompletion | ItemEvent::MaybeComplete => {
                self.maybe_complete_download();
            }
            ItemEvent::DelayedOpenDone { auto_opened } => self.on_delayed_open_done(auto_opened),
            ItemEvent::Progress {
                bytes_so_far,
                bytes_per_sec,
                hash_state,
            } => self.update_progress(bytes_so_far, bytes_per_sec, hash_state),
            ItemEvent::AllDataSaved { final_hash } => self.destination_completed(final_hash),
            ItemEvent::EngineError { reason } => self.destination_error(reason),
            ItemEvent::Pause => self.pause(),
            ItemEvent::Resume => self.resume(),
            ItemEvent::Cancel { user_initiated } => self.cancel(user_initiated),
            ItemEvent::DangerValidated => self.validate_dangerous_download(),
            // Consumed by the actor loop; inert here.
            ItemEvent::Shutdown => {}
        }
    }

    // ==================== Download progression cascade ====================

    /// Takes ownership of the transfer handles and begins the transfer.
    ///
    /// The transfer file initializes asynchronously; its outcome re-enters
    /// through [`ItemEvent::FileInitialized`].
    ///
    /// # Errors
    ///
    /// [`ItemError::TransferAlreadyAttached`] if a transfer handle is
    /// already owned; calling `start` twice is a caller bug.
    pub fn start(
        &mut self,
        file: Box<dyn TransferFile>,
        request: Box<dyn RequestHandle>,
    ) -> Result<(), ItemError> {
        if self.file.is_some() || self.transfer_in_flight {
            return Err(ItemError::TransferAlreadyAttached { id: self.id });
        }

        self.request = Some(request);
        self.transition_to(InternalState::InProgress);
        self.last_reason = None;

        debug!(id = self.id, "starting transfer");
        self.transfer_in_flight = true;
        let events = self.events.clone();
        let mut file = file;
        tokio::spawn(async move {
            let result = file.initialize().await;
            let _ = events.send(ItemEvent::FileInitialized { result, file });
        });
        Ok(())
    }

    fn on_file_initialized(
        &mut self,
        result: Result<(), InterruptReason>,
        file: Box<dyn TransferFile>,
    ) {
        self.transfer_in_flight = false;
        if self.state != InternalState::InProgress {
            self.release_stale_file(file);
            return;
        }

        self.file = Some(file);

        if let Err(reason) = result {
            self.interrupt(reason);
            // Deliberately fall through: the target-determination flow
            // continues after an initialization failure so persistence and
            // observers see the same sequence as a healthy start. The
            // completion gate keeps an interrupted item from finishing.
        }

        // Resuming with a known target and intermediate file: skip name
        // determination.
        if !self.target_path.as_os_str().is_empty() && !self.current_path.as_os_str().is_empty() {
            self.delegate.show_download(self);
            self.maybe_complete_download();
            return;
        }

        // The target may be set with the current path empty if a previous
        // intermediate rename failed; redo name determination from scratch.
        self.target_path = PathBuf::new();

        let request = TargetRequest {
            id: self.id,
            url: self.url().cloned(),
            suggested_filename: self.suggested_filename.clone(),
            forced_file_path: self.forced_file_path.clone(),
            mime_type: self.mime_type.clone(),
            display_name: self.display_name.clone(),
        };
        let delegate = Arc::clone(&self.delegate);
        let events = self.events.clone();
        tokio::spawn(async move {
            let determined = delegate.determine_download_target(request).await;
            let _ = events.send(ItemEvent::TargetDetermined(determined));
        });
    }

    fn on_target_determined(&mut self, determined: Option<TargetDetermination>) {
        // The delegate declining to pick a target cancels the download.
        let Some(determined) = determined else {
            self.cancel(true);
            return;
        };

        debug!(
            id = self.id,
            target = %determined.target_path.display(),
            danger = %determined.danger_type,
            "download target determined"
        );

        // Intermediate and target must share a directory so both sit on
        // one volume under the same space and permission constraints.
        debug_assert_eq!(
            determined.intermediate_path.parent(),
            determined.target_path.parent()
        );

        self.target_path = determined.target_path;
        self.target_disposition = determined.disposition;
        self.set_danger_type(determined.danger_type);

        let Some(file) = self.file.take() else {
            // The handle was already discarded (initialization failed and
            // the interrupt released it). Finish the sequence without the
            // rename; the completion gate will hold the item back.
            self.delegate.show_download(self);
            self.maybe_complete_download();
            return;
        };

        self.transfer_in_flight = true;
        let events = self.events.clone();
        let intermediate = determined.intermediate_path;
        let mut file = file;
        tokio::spawn(async move {
            let result = file.rename_and_uniquify(intermediate).await;
            let _ = events.send(ItemEvent::IntermediateRenamed { result, file });
        });
    }

    fn on_intermediate_renamed(
        &mut self,
        result: Result<PathBuf, InterruptReason>,
        file: Box<dyn TransferFile>,
    ) {
        self.transfer_in_flight = false;
        if self.state != InternalState::InProgress {
            self.release_stale_file(file);
            return;
        }

        self.file = Some(file);
        match result {
            Err(reason) => self.interrupt(reason),
            Ok(full_path) => self.set_full_path(full_path),
        }

        self.delegate.show_download(self);
        self.maybe_complete_download();
    }

    /// Idempotent completion gate.
    ///
    /// If the download is ready (all data saved, not dangerous, in
    /// progress, target determined, same-directory rename possible,
    /// delegate gate open) this proceeds to the final rename;
    /// otherwise it is a no-op that runs again when the delegate signals
    /// a state change.
    pub fn maybe_complete_download(&mut self) {
        if !self.is_download_ready_for_completion() {
            return;
        }
        self.proceed_to_completion();
    }

    fn is_download_ready_for_completion(&mut self) -> bool {
        if !self.all_data_saved {
            return false;
        }

        // Dangerous and not yet validated: completion stays blocked.
        if self.danger_type.is_dangerous() {
            return false;
        }

        if self.state != InternalState::InProgress {
            return false;
        }

        if self.target_path.as_os_str().is_empty() {
            return false;
        }

        // Same-volume rename guarantee.
        if self.current_path.parent() != self.target_path.parent() {
            return false;
        }

        // The delegate may hold up a stop sign; it calls back through the
        // retry handle when its hold clears.
        let retry = CompletionRetry::new(self.events.clone());
        let delegate = Arc::clone(&self.delegate);
        if !delegate.should_complete_download(self, retry) {
            return false;
        }

        true
    }

    fn proceed_to_completion(&mut self) {
        if self.state != InternalState::InProgress {
            return;
        }
        debug_assert!(!self.target_path.as_os_str().is_empty());
        debug_assert!(!self.danger_type.is_dangerous());

        if self.is_manual_save {
            // The capture owns its file; there is nothing to rename.
            self.completed();
            return;
        }

        let Some(file) = self.file.take() else {
            debug!(id = self.id, "completion requested with rename in flight");
            return;
        };

        // Rename unconditionally; even an unchanged name needs the
        // metadata annotation.
        self.transfer_in_flight = true;
        let events = self.events.clone();
        let target = self.target_path.clone();
        let mut file = file;
        tokio::spawn(async move {
            let result = file.rename_and_annotate(target).await;
            let _ = events.send(ItemEvent::FinalRenamed { result, file });
        });
    }

    fn on_final_renamed(
        &mut self,
        result: Result<PathBuf, InterruptReason>,
        file: Box<dyn TransferFile>,
    ) {
        self.transfer_in_flight = false;
        // A cancel or interrupt won the race; the returned handle is
        // released under that outcome's file-retention rules.
        if self.state != InternalState::InProgress {
            self.release_stale_file(file);
            return;
        }

        let full_path = match result {
            Err(reason) => {
                self.file = Some(file);
                self.interrupt(reason);
                return;
            }
            Ok(full_path) => full_path,
        };

        debug_assert_eq!(full_path, self.target_path);
        if full_path != self.current_path {
            self.set_full_path(full_path);
        }

        // Committed to completion: release the engine's handle, keep the
        // file. Cancels and interrupts are ignored from here on.
        tokio::spawn(async move {
            file.detach().await;
        });
        self.transition_to(InternalState::Completing);

        let delayed = DelayedOpen::new(self.events.clone());
        let delegate = Arc::clone(&self.delegate);
        if delegate.should_open_download(self, delayed) {
            self.completed();
        } else {
            self.delegate_delayed_complete = true;
        }
    }

    fn on_delayed_open_done(&mut self, auto_opened: bool) {
        self.auto_opened = auto_opened;
        self.delegate_delayed_complete = false;
        self.completed();
    }

    fn completed(&mut self) {
        debug_assert!(self.all_data_saved);
        self.end_time = Some(SystemTime::now());
        self.transition_to(InternalState::Complete);
        info!(
            id = self.id,
            bytes = self.received_bytes,
            elapsed_ms = self.start_tick.elapsed().as_millis() as u64,
            "download completed"
        );

        if self.auto_opened {
            // The delegate already handled opening.
            return;
        }

        let delegate = Arc::clone(&self.delegate);
        let by_extension = delegate.should_open_file_based_on_extension(&self.user_verified_path());
        if self.open_when_complete || by_extension || self.is_temporary {
            // Temporary downloads are marked auto-opened without actually
            // opening, purely so shelf-style UIs can drop them.
            if !self.is_temporary {
                self.open_download();
            }
            self.auto_opened = true;
            self.update_observers();
        }
    }

    // ==================== End of progression cascade ====================

    /// Records an engine-reported failure and transitions to
    /// `Interrupted`.
    ///
    /// The first interrupt wins: duplicates and interrupts racing a
    /// cancel are silently dropped. Depending on the derived resume mode
    /// the partial file is deleted (restart) or kept (continuation), the
    /// originating request is cancelled, and an automatic resumption may
    /// be triggered.
    pub fn interrupt(&mut self, reason: InterruptReason) {
        if self.state != InternalState::InProgress {
            debug!(id = self.id, reason = %reason, state = %self.state, "late interrupt dropped");
            return;
        }

        self.last_reason = Some(reason);
        self.transition_to(InternalState::Interrupted);
        warn!(
            id = self.id,
            reason = %reason,
            received = self.received_bytes,
            total = self.total_bytes,
            "download interrupted"
        );

        let mode = self.resume_mode();
        // A restart cannot reuse the partial file; delete it. Otherwise
        // detach and keep it for a byte-range continuation.
        self.release_transfer_file(mode.is_restart());

        if let Some(request) = &self.request {
            request.cancel_request();
        }

        self.auto_resume_if_valid();
    }

    /// Cancels the download.
    ///
    /// No-op unless in progress or interrupted; in particular a download
    /// that already committed to completion ignores cancellation.
    pub fn cancel(&mut self, user_initiated: bool) {
        if !matches!(
            self.state,
            InternalState::InProgress | InternalState::Interrupted
        ) {
            // Small downloads may finish before a queued cancel runs.
            return;
        }

        info!(id = self.id, user_initiated, "cancelling download");
        let was_interrupted = self.state == InternalState::Interrupted;
        self.last_reason = Some(if user_initiated {
            InterruptReason::UserCanceled
        } else {
            InterruptReason::UserShutdown
        });

        self.release_transfer_file(true);

        if !was_interrupted {
            // Interrupt already cancelled the originating request.
            if let Some(request) = &self.request {
                request.cancel_request();
            }
        }

        self.transition_to(InternalState::Cancelled);
    }

    /// Pauses the underlying request. No-op outside a live, unpaused
    /// transfer.
    pub fn pause(&mut self) {
        if self.state != InternalState::InProgress || self.is_paused {
            return;
        }
        if let Some(request) = &self.request {
            request.pause_request();
        }
        self.is_paused = true;
        self.update_observers();
    }

    /// Resumes a paused download.
    ///
    /// For an interrupted download this resets the auto-resume counter
    /// (user input always gets a fresh budget) and re-establishes the
    /// transfer; for a live one it resumes the underlying request.
    pub fn resume(&mut self) {
        if !self.is_paused
            || matches!(
                self.state,
                InternalState::Complete | InternalState::Completing | InternalState::Cancelled
            )
        {
            return;
        }

        if self.state == InternalState::Interrupted {
            self.auto_resume_count = 0;
            self.resume_interrupted_download();
            return;
        }

        debug_assert_eq!(self.state, InternalState::InProgress);
        if let Some(request) = &self.request {
            request.resume_request();
        }
        self.is_paused = false;
        self.update_observers();
    }

    /// Reclassifies a dangerous download as user-validated and re-runs
    /// the completion gate, which danger may have been the only thing
    /// blocking.
    pub fn validate_dangerous_download(&mut self) {
        if self.state.external() != DownloadState::InProgress || !self.danger_type.is_dangerous() {
            return;
        }

        info!(id = self.id, danger = %self.danger_type, "dangerous download accepted by user");
        self.danger_type = DangerType::UserValidated;
        self.update_observers();
        self.maybe_complete_download();
    }

    // ==================== Transfer engine callbacks ====================

    /// Progress report from the transfer engine.
    ///
    /// Updates arriving after a cancel or interrupt race are dropped
    /// without mutating anything.
    pub fn update_progress(&mut self, bytes_so_far: i64, bytes_per_sec: i64, hash_state: String) {
        if self.state != InternalState::InProgress {
            debug!(id = self.id, bytes_so_far, "stale progress update dropped");
            return;
        }

        self.bytes_per_sec = bytes_per_sec;
        self.hash_state = hash_state;
        self.received_bytes = bytes_so_far;

        // More data than the server promised: revert to unknown-size mode
        // rather than erroring.
        if self.received_bytes > self.total_bytes {
            self.total_bytes = 0;
        }

        self.update_observers();
    }

    /// Engine-facing alias of [`update_progress`](Self::update_progress).
    pub fn destination_update(&mut self, bytes_so_far: i64, bytes_per_sec: i64, hash_state: String) {
        self.update_progress(bytes_so_far, bytes_per_sec, hash_state);
    }

    /// Engine-reported failure; funnels into [`interrupt`](Self::interrupt).
    pub fn destination_error(&mut self, reason: InterruptReason) {
        self.interrupt(reason);
    }

    /// The engine wrote the last byte; records the final hash and
    /// attempts completion. Stale or duplicate signals are dropped.
    pub fn destination_completed(&mut self, final_hash: String) {
        if self.state.external() != DownloadState::InProgress {
            return;
        }
        if self.all_data_saved {
            debug!(id = self.id, "duplicate completion signal dropped");
            return;
        }
        if self.on_all_data_saved(final_hash).is_ok() {
            self.maybe_complete_download();
        }
    }

    /// Marks all data saved and stores the final hash.
    ///
    /// # Errors
    ///
    /// [`ItemError::NotInProgress`] or [`ItemError::DuplicateCompletion`]
    /// on precondition violation; either indicates a caller bug (a
    /// duplicate completion path), not a runtime condition.
    pub fn on_all_data_saved(&mut self, final_hash: String) -> Result<(), ItemError> {
        if self.state != InternalState::InProgress {
            return Err(ItemError::NotInProgress {
                id: self.id,
                state: self.state.external(),
            });
        }
        if self.all_data_saved {
            return Err(ItemError::DuplicateCompletion { id: self.id });
        }

        self.all_data_saved = true;
        self.hash = final_hash;
        // The incremental digest is obsolete once the final hash exists.
        self.hash_state = String::new();
        debug!(id = self.id, "all data saved");
        self.update_observers();
        Ok(())
    }

    /// Finalizes a manual-save item whose capture finished writing.
    pub fn mark_as_complete(&mut self) {
        debug_assert!(self.all_data_saved);
        self.end_time = Some(SystemTime::now());
        self.transition_to(InternalState::Complete);
    }

    /// A post-save content check delivered a danger reclassification.
    pub fn on_content_check_completed(&mut self, danger_type: DangerType) {
        debug_assert!(self.all_data_saved);
        self.set_danger_type(danger_type);
        self.update_observers();
    }

    // ==================== User-facing operations ====================

    /// Opens the download, or toggles open-when-complete while it is
    /// still in progress.
    pub fn open_download(&mut self) {
        if self.state == InternalState::InProgress {
            // Temporary downloads never honor open-when-complete; the flag
            // would surface in UIs.
            if !self.is_temporary {
                self.open_when_complete = !self.open_when_complete;
            }
            return;
        }

        if self.state != InternalState::Complete || self.file_externally_removed {
            return;
        }

        // Errors from the external opener are not reported back; spawn a
        // removal check so the UI notices a deleted file in parallel.
        self.delegate.check_for_file_removal(self);
        self.opened = true;
        self.observers.for_each(|o| o.on_download_opened(self));
        self.delegate.open_download(self);
    }

    /// Reveals the download in the embedder's UI/shell.
    pub fn show_download(&self) {
        self.delegate.show_download(self);
    }

    /// Cancels and removes the item from its collection, notifying
    /// observers and the delegate.
    pub fn remove(&mut self) {
        self.delegate.assert_state_consistent(self);
        self.cancel(true);
        self.delegate.assert_state_consistent(self);

        self.observers.for_each(|o| o.on_download_removed(self));
        self.delegate.download_removed(self);
    }

    /// Deletes the partial file (when no transfer handle owns it) and
    /// removes the item.
    pub fn delete(&mut self, reason: DeleteReason) {
        info!(id = self.id, reason = ?reason, "deleting download");

        // When a transfer handle owns the file, its cancel path deletes it.
        if !self.current_path.as_os_str().is_empty() && !self.has_transfer_file() {
            let path = self.current_path.clone();
            tokio::spawn(async move {
                match tokio::fs::metadata(&path).await {
                    // Only ever delete files.
                    Ok(meta) if meta.is_file() => {
                        if let Err(error) = tokio::fs::remove_file(&path).await {
                            warn!(path = %path.display(), error = %error, "failed to delete download");
                        }
                    }
                    _ => {}
                }
            });
        }
        self.remove();
    }

    /// The on-disk file disappeared out from under us.
    pub fn on_downloaded_file_removed(&mut self) {
        self.file_externally_removed = true;
        self.update_observers();
    }

    // ==================== Resumption ====================

    /// The resumption strategy for the current interrupted state;
    /// [`ResumeMode::Invalid`] when not interrupted.
    #[must_use]
    pub fn resume_mode(&self) -> ResumeMode {
        if self.state.external() != DownloadState::Interrupted {
            return ResumeMode::Invalid;
        }

        let has_intermediate_file = !self.current_path.as_os_str().is_empty();
        let force_user = self.auto_resume_count >= MAX_AUTO_RESUME_ATTEMPTS || self.is_paused;
        resume_mode(self.last_reason, has_intermediate_file, force_user)
    }

    fn resume_interrupted_download(&mut self) {
        debug_assert_eq!(self.state, InternalState::Interrupted);

        let mode = self.resume_mode();
        if mode.is_restart() {
            // Restarting from scratch: the partial state is dead weight.
            self.received_bytes = 0;
            self.hash_state = String::new();
            self.last_modified = String::new();
            self.etag = String::new();
        }

        let request = ResumeRequest {
            url: self.original_url().cloned(),
            file_path: self.current_path.clone(),
            offset: self.received_bytes,
            hash_state: self.hash_state.clone(),
            last_modified: self.last_modified.clone(),
            etag: self.etag.clone(),
        };

        info!(id = self.id, mode = %mode, offset = request.offset, "resuming interrupted download");
        let delegate = Arc::clone(&self.delegate);
        let id = self.id;
        tokio::spawn(async move {
            delegate.resume_interrupted_download(request, id).await;
        });

        // In case the interrupt landed while paused.
        self.is_paused = false;
    }

    fn auto_resume_if_valid(&mut self) {
        let mode = self.resume_mode();
        if !mode.is_automatic() {
            return;
        }

        self.auto_resume_count += 1;
        debug!(
            id = self.id,
            attempt = self.auto_resume_count,
            max = MAX_AUTO_RESUME_ATTEMPTS,
            "automatic resumption"
        );
        self.resume_interrupted_download();
    }

    // ==================== State internals ====================

    fn transition_to(&mut self, new_state: InternalState) {
        if self.state == new_state {
            return;
        }

        let old_state = self.state;
        self.state = new_state;
        debug!(id = self.id, from = %old_state, to = %new_state, "state transition");

        // Observers only see externally visible changes; the
        // InProgress<->Completing edge is silent.
        if old_state.external() != new_state.external() {
            self.update_observers();
        }

        // Termination / resumption lifecycle events.
        if old_state.is_active() && !new_state.is_active() {
            info!(id = self.id, state = %new_state, "download no longer active");
        }
        if !old_state.is_active() && new_state.is_active() {
            info!(
                id = self.id,
                file = %self.file_name_to_report_user().display(),
                "download active"
            );
        }
    }

    fn set_danger_type(&mut self, danger_type: DangerType) {
        if danger_type != self.danger_type {
            debug!(id = self.id, from = %self.danger_type, to = %danger_type, "danger type updated");
        }
        self.danger_type = danger_type;
    }

    fn set_full_path(&mut self, new_path: PathBuf) {
        debug_assert!(!new_path.as_os_str().is_empty());
        debug!(
            id = self.id,
            from = %self.current_path.display(),
            to = %new_path.display(),
            "download file renamed"
        );
        self.current_path = new_path;
        self.update_observers();
    }

    /// Hands the transfer handle (if owned) to a teardown task: deleting
    /// the partial file when `delete`, keeping it otherwise. The item's
    /// reference is cleared synchronously before the handoff.
    fn release_transfer_file(&mut self, delete: bool) {
        let Some(file) = self.file.take() else {
            return;
        };
        tokio::spawn(async move {
            if delete {
                file.cancel().await;
            } else {
                file.detach().await;
            }
        });
    }

    /// Releases a handle returned by a rename that lost a race with a
    /// cancel or interrupt, honoring the current file-retention rules.
    fn release_stale_file(&self, file: Box<dyn TransferFile>) {
        let keep =
            self.state == InternalState::Interrupted && !self.resume_mode().is_restart();
        debug!(id = self.id, keep_partial_file = keep, "releasing stale transfer handle");
        tokio::spawn(async move {
            if keep {
                file.detach().await;
            } else {
                file.cancel().await;
            }
        });
    }

    // ==================== Accessors ====================

    /// Globally unique download id.
    #[must_use]
    pub fn id(&self) -> i64 {
        self.id
    }

    /// Externally visible state.
    #[must_use]
    pub fn state(&self) -> DownloadState {
        self.state.external()
    }

    /// Most recent interrupt reason, if any.
    #[must_use]
    pub fn last_reason(&self) -> Option<InterruptReason> {
        self.last_reason
    }

    /// Whether the download is paused.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.is_paused
    }

    /// Whether this is a temporary (forced-path) download.
    #[must_use]
    pub fn is_temporary(&self) -> bool {
        self.is_temporary
    }

    /// Whether this item tracks a manual "save as" capture.
    #[must_use]
    pub fn is_manual_save(&self) -> bool {
        self.is_manual_save
    }

    /// Whether the danger classification currently blocks completion.
    #[must_use]
    pub fn is_dangerous(&self) -> bool {
        self.danger_type.is_dangerous()
    }

    /// Safety classification.
    #[must_use]
    pub fn danger_type(&self) -> DangerType {
        self.danger_type
    }

    /// Final URL of the redirect chain.
    #[must_use]
    pub fn url(&self) -> Option<&Url> {
        self.url_chain.last()
    }

    /// First URL of the redirect chain.
    #[must_use]
    pub fn original_url(&self) -> Option<&Url> {
        self.url_chain.first()
    }

    /// Full redirect chain, insertion order.
    #[must_use]
    pub fn url_chain(&self) -> &[Url] {
        &self.url_chain
    }

    /// Referrer of the originating navigation.
    #[must_use]
    pub fn referrer_url(&self) -> Option<&Url> {
        self.referrer_url.as_ref()
    }

    /// Server- or page-suggested filename.
    #[must_use]
    pub fn suggested_filename(&self) -> &str {
        &self.suggested_filename
    }

    /// Raw Content-Disposition header text.
    #[must_use]
    pub fn content_disposition(&self) -> &str {
        &self.content_disposition
    }

    /// Effective MIME type.
    #[must_use]
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// MIME type before sniffing.
    #[must_use]
    pub fn original_mime_type(&self) -> &str {
        &self.original_mime_type
    }

    /// Where the file lives on disk right now (possibly an intermediate
    /// name). Empty until the intermediate rename lands.
    #[must_use]
    pub fn current_path(&self) -> &Path {
        &self.current_path
    }

    /// Intended final path. Empty until target determination completes.
    #[must_use]
    pub fn target_path(&self) -> &Path {
        &self.target_path
    }

    /// Caller-mandated path override; empty when unset.
    #[must_use]
    pub fn forced_file_path(&self) -> &Path {
        &self.forced_file_path
    }

    /// Conflict policy for the target path.
    #[must_use]
    pub fn target_disposition(&self) -> TargetDisposition {
        self.target_disposition
    }

    /// Name suitable for showing the user.
    #[must_use]
    pub fn file_name_to_report_user(&self) -> PathBuf {
        if !self.display_name.as_os_str().is_empty() {
            return self.display_name.clone();
        }
        self.target_path
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_default()
    }

    /// Path safe to hand to the user: the intermediate name while the
    /// content is dangerous or freshly validated, the target otherwise.
    #[must_use]
    pub fn user_verified_path(&self) -> PathBuf {
        if self.is_dangerous() || self.danger_type == DangerType::UserValidated {
            self.current_path.clone()
        } else {
            self.target_path.clone()
        }
    }

    /// Final content hash; empty until all data is saved.
    #[must_use]
    pub fn hash(&self) -> &str {
        &self.hash
    }

    /// Serialized digest-in-progress; opaque, empty once the final hash
    /// exists.
    #[must_use]
    pub fn hash_state(&self) -> &str {
        &self.hash_state
    }

    /// ETag validator for resumption.
    #[must_use]
    pub fn etag(&self) -> &str {
        &self.etag
    }

    /// Last-Modified validator for resumption.
    #[must_use]
    pub fn last_modified(&self) -> &str {
        &self.last_modified
    }

    /// Sets the resumption validators reported by the server.
    pub fn set_validators(&mut self, etag: String, last_modified: String) {
        self.etag = etag;
        self.last_modified = last_modified;
    }

    /// Whether the on-disk file was removed behind our back.
    #[must_use]
    pub fn file_externally_removed(&self) -> bool {
        self.file_externally_removed
    }

    /// Expected size; 0 or negative when unknown.
    #[must_use]
    pub fn total_bytes(&self) -> i64 {
        self.total_bytes
    }

    /// Overrides the expected size (late Content-Length discovery).
    pub fn set_total_bytes(&mut self, total_bytes: i64) {
        self.total_bytes = total_bytes;
    }

    /// Bytes written so far.
    #[must_use]
    pub fn received_bytes(&self) -> i64 {
        self.received_bytes
    }

    /// Whether the engine has written the last byte.
    #[must_use]
    pub fn all_data_saved(&self) -> bool {
        self.all_data_saved
    }

    /// Completion percentage (0-100), or -1 when the total is unknown or
    /// the delegate is delaying completion.
    #[must_use]
    pub fn percent_complete(&self) -> i32 {
        if self.delegate_delayed_complete || self.total_bytes <= 0 {
            return -1;
        }
        (self.received_bytes as f64 * 100.0 / self.total_bytes as f64) as i32
    }

    /// Current transfer rate; 0 while paused.
    #[must_use]
    pub fn current_speed(&self) -> i64 {
        if self.is_paused { 0 } else { self.bytes_per_sec }
    }

    /// Estimated time to completion, when the total size and a nonzero
    /// rate are known.
    #[must_use]
    pub fn time_remaining(&self) -> Option<Duration> {
        if self.total_bytes <= 0 {
            return None;
        }
        let speed = self.current_speed();
        if speed == 0 {
            return None;
        }
        let remaining = (self.total_bytes - self.received_bytes).max(0);
        Some(Duration::from_secs((remaining / speed).max(0) as u64))
    }

    /// When the transfer started.
    #[must_use]
    pub fn start_time(&self) -> SystemTime {
        self.start_time
    }

    /// When the transfer reached a terminal state, if it has.
    #[must_use]
    pub fn end_time(&self) -> Option<SystemTime> {
        self.end_time
    }

    /// Whether the file should open once complete.
    #[must_use]
    pub fn open_when_complete(&self) -> bool {
        self.open_when_complete
    }

    /// Sets the open-when-complete flag directly.
    pub fn set_open_when_complete(&mut self, open: bool) {
        self.open_when_complete = open;
    }

    /// Whether the download was opened automatically on completion.
    #[must_use]
    pub fn auto_opened(&self) -> bool {
        self.auto_opened
    }

    /// Whether the user ever opened the download.
    #[must_use]
    pub fn opened(&self) -> bool {
        self.opened
    }

    /// Marks the download opened (history import).
    pub fn set_opened(&mut self, opened: bool) {
        self.opened = opened;
    }

    /// Sets an explicit display name.
    pub fn set_display_name(&mut self, name: PathBuf) {
        self.display_name = name;
    }

    /// Marks the item temporary.
    pub fn set_is_temporary(&mut self, temporary: bool) {
        self.is_temporary = temporary;
    }

    /// Number of automatic resumption attempts since the last user
    /// action.
    #[must_use]
    pub fn auto_resume_count(&self) -> u32 {
        self.auto_resume_count
    }

    /// Whether a transfer handle is currently owned or in flight.
    #[must_use]
    pub fn has_transfer_file(&self) -> bool {
        self.file.is_some() || self.transfer_in_flight
    }

    /// Whether the file can be opened now or marked for opening on
    /// completion.
    #[must_use]
    pub fn can_open_download(&self) -> bool {
        matches!(
            self.state(),
            DownloadState::InProgress | DownloadState::Complete
        ) && !self.is_temporary
            && !self.file_externally_removed
    }

    /// Whether the file can be revealed in its folder.
    #[must_use]
    pub fn can_show_in_folder(&self) -> bool {
        self.can_open_download() && !self.current_path.as_os_str().is_empty()
    }

    /// Single-line description for diagnostics. `verbose` adds byte
    /// counts, resume state and paths.
    #[must_use]
    pub fn debug_string(&self, verbose: bool) -> String {
        if verbose {
            format!(
                "{{ id = {} state = {} total = {} received = {} reason = {} paused = {} \
                 resume_mode = {} auto_resume_count = {} danger = {} all_data_saved = {} \
                 url_chain = \"{}\" current_path = \"{}\" target_path = \"{}\" }}",
                self.id,
                self.state,
                self.total_bytes,
                self.received_bytes,
                self.last_reason.map_or("none", |reason| reason.as_str()),
                self.is_paused,
                self.resume_mode(),
                self.auto_resume_count,
                self.danger_type,
                self.all_data_saved,
                self.debug_url_chain(),
                self.current_path.display(),
                self.target_path.display(),
            )
        } else {
            format!(
                "{{ id = {} state = {} url = \"{}\" }}",
                self.id,
                self.state,
                self.debug_url()
            )
        }
    }

    fn debug_url(&self) -> String {
        self.url().map(Url::to_string).unwrap_or_default()
    }

    fn debug_url_chain(&self) -> String {
        self.url_chain
            .iter()
            .map(Url::as_str)
            .collect::<Vec<_>>()
            .join(" -> ")
    }
}

impl Drop for DownloadItem {
    fn drop(&mut self) {
        // The transfer handle should have been released (detached or
        // cancelled) before the item goes away.
        if self.has_transfer_file() {
            warn!(id = self.id, "download item dropped with live transfer handle");
        }

        self.observers.for_each(|o| o.on_download_destroyed(self));
        self.observers.clear();
        self.delegate.assert_state_consistent(self);
        self.delegate.detach();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::delegate::NullDelegate;
    use crate::item::events::event_channel;

    fn test_url() -> Url {
        Url::parse("https://example.com/file.bin").unwrap()
    }

    fn in_progress_item() -> DownloadItem {
        let (events, _rx) = event_channel();
        let mut info = DownloadCreateInfo::new(1, vec![test_url()]);
        info.total_bytes = 1000;
        DownloadItem::new(Arc::new(NullDelegate), events, info)
    }

    // ==================== Progress Tests ====================

    #[test]
    fn test_percent_complete_tracks_progress_and_clamps_total() {
        let mut item = in_progress_item();
        assert_eq!(item.total_bytes(), 1000);

        item.update_progress(500, 100, String::new());
        assert_eq!(item.percent_complete(), 50);
        assert_eq!(item.received_bytes(), 500);

        // More data than promised: total reverts to unknown.
        item.update_progress(1200, 100, String::new());
        assert!(item.total_bytes() <= 0);
        assert_eq!(item.percent_complete(), -1);
        assert_eq!(item.received_bytes(), 1200);
    }

    #[test]
    fn test_update_progress_dropped_when_not_in_progress() {
        let mut item = in_progress_item();
        item.cancel(true);
        assert_eq!(item.state(), DownloadState::Cancelled);

        item.update_progress(500, 100, "digest".to_string());
        assert_eq!(item.received_bytes(), 0);
        assert_eq!(item.hash_state(), "");

        item.destination_update(700, 100, "digest".to_string());
        assert_eq!(item.received_bytes(), 0);
    }

    #[test]
    fn test_time_remaining_requires_total_and_speed() {
        let mut item = in_progress_item();
        assert!(item.time_remaining().is_none());

        item.update_progress(500, 100, String::new());
        assert_eq!(item.time_remaining(), Some(Duration::from_secs(5)));

        item.pause();
        // Paused speed is zero.
        assert_eq!(item.current_speed(), 0);
        assert!(item.time_remaining().is_none());
    }

    // ==================== All-Data-Saved Tests ====================

    #[test]
    fn test_on_all_data_saved_stores_hash_and_clears_state() {
        let mut item = in_progress_item();
        item.update_progress(1000, 0, "partial-digest".to_string());

        item.on_all_data_saved("final-hash".to_string()).unwrap();
        assert!(item.all_data_saved());
        assert_eq!(item.hash(), "final-hash");
        assert_eq!(item.hash_state(), "");
    }

    #[test]
    fn test_on_all_data_saved_duplicate_is_error() {
        let mut item = in_progress_item();
        item.on_all_data_saved("h".to_string()).unwrap();

        let result = item.on_all_data_saved("h2".to_string());
        assert!(matches!(result, Err(ItemError::DuplicateCompletion { id: 1 })));
        // Monotonic: still saved, original hash kept.
        assert!(item.all_data_saved());
        assert_eq!(item.hash(), "h");
    }

    #[test]
    fn test_on_all_data_saved_requires_in_progress() {
        let mut item = in_progress_item();
        item.cancel(true);
        let result = item.on_all_data_saved("h".to_string());
        assert!(matches!(result, Err(ItemError::NotInProgress { .. })));
        assert!(!item.all_data_saved());
    }

    // ==================== Cancel Tests ====================

    #[test]
    fn test_cancel_is_idempotent() {
        let mut item = in_progress_item();
        item.cancel(true);
        assert_eq!(item.state(), DownloadState::Cancelled);
        assert_eq!(item.last_reason(), Some(InterruptReason::UserCanceled));

        item.cancel(true);
        assert_eq!(item.state(), DownloadState::Cancelled);
        assert_eq!(item.last_reason(), Some(InterruptReason::UserCanceled));
    }

    #[test]
    fn test_cancel_records_shutdown_reason() {
        let mut item = in_progress_item();
        item.cancel(false);
        assert_eq!(item.last_reason(), Some(InterruptReason::UserShutdown));
    }

    // ==================== Pause / Resume Tests ====================

    #[test]
    fn test_pause_only_while_in_progress() {
        let mut item = in_progress_item();
        item.pause();
        assert!(item.is_paused());

        // Second pause is a no-op.
        item.pause();
        assert!(item.is_paused());

        let mut cancelled = in_progress_item();
        cancelled.cancel(true);
        cancelled.pause();
        assert!(!cancelled.is_paused());
    }

    #[test]
    fn test_resume_noop_when_not_paused() {
        let mut item = in_progress_item();
        item.resume();
        assert!(!item.is_paused());
        assert_eq!(item.state(), DownloadState::InProgress);
    }

    // ==================== Danger Tests ====================

    #[test]
    fn test_validate_dangerous_download_reclassifies() {
        let mut item = in_progress_item();
        item.set_danger_type(DangerType::DangerousFile);
        assert!(item.is_dangerous());

        item.validate_dangerous_download();
        assert_eq!(item.danger_type(), DangerType::UserValidated);
        assert!(!item.is_dangerous());
    }

    #[test]
    fn test_validate_noop_when_not_dangerous() {
        let mut item = in_progress_item();
        item.validate_dangerous_download();
        assert_eq!(item.danger_type(), DangerType::NotDangerous);
    }

    // ==================== Resume Mode Tests ====================

    #[test]
    fn test_resume_mode_invalid_unless_interrupted() {
        let item = in_progress_item();
        assert_eq!(item.resume_mode(), ResumeMode::Invalid);
    }

    // ==================== History Reconstruction Tests ====================

    fn history_record(state: DownloadState) -> HistoryRecord {
        HistoryRecord {
            id: 11,
            current_path: PathBuf::from("/downloads/file.bin.part"),
            target_path: PathBuf::from("/downloads/file.bin"),
            url_chain: vec![test_url()],
            referrer_url: None,
            start_time: SystemTime::UNIX_EPOCH,
            end_time: None,
            received_bytes: 10,
            total_bytes: 100,
            state,
            danger_type: DangerType::NotDangerous,
            interrupt_reason: None,
            opened: false,
        }
    }

    #[test]
    fn test_from_history_corrects_in_progress_to_cancelled() {
        let (events, _rx) = event_channel();
        let item = DownloadItem::from_history(
            Arc::new(NullDelegate),
            events,
            history_record(DownloadState::InProgress),
        );
        assert_eq!(item.state(), DownloadState::Cancelled);
        assert!(!item.all_data_saved());
    }

    #[test]
    fn test_from_history_complete_forces_all_data_saved() {
        let (events, _rx) = event_channel();
        let item = DownloadItem::from_history(
            Arc::new(NullDelegate),
            events,
            history_record(DownloadState::Complete),
        );
        assert_eq!(item.state(), DownloadState::Complete);
        assert!(item.all_data_saved());
    }

    #[test]
    fn test_from_history_preserves_interrupted() {
        let (events, _rx) = event_channel();
        let mut record = history_record(DownloadState::Interrupted);
        record.interrupt_reason = Some(InterruptReason::NetworkTimeout);
        let item = DownloadItem::from_history(Arc::new(NullDelegate), events, record);
        assert_eq!(item.state(), DownloadState::Interrupted);
        assert_eq!(item.last_reason(), Some(InterruptReason::NetworkTimeout));
        // Intermediate file exists + fresh counter: continuation offered.
        assert_eq!(item.resume_mode(), ResumeMode::ImmediateContinue);
    }

    // ==================== Accessor Tests ====================

    #[test]
    fn test_url_chain_accessors() {
        let (events, _rx) = event_channel();
        let first = Url::parse("https://example.com/redirect").unwrap();
        let last = test_url();
        let info = DownloadCreateInfo::new(5, vec![first.clone(), last.clone()]);
        let item = DownloadItem::new(Arc::new(NullDelegate), events, info);

        assert_eq!(item.original_url(), Some(&first));
        assert_eq!(item.url(), Some(&last));
        assert_eq!(item.url_chain().len(), 2);
    }

    #[test]
    fn test_file_name_to_report_user_prefers_display_name() {
        let mut item = in_progress_item();
        assert_eq!(item.file_name_to_report_user(), PathBuf::new());

        item.set_display_name(PathBuf::from("shown.bin"));
        assert_eq!(item.file_name_to_report_user(), PathBuf::from("shown.bin"));
    }

    #[test]
    fn test_debug_string_contains_state_and_id() {
        let item = in_progress_item();
        let terse = item.debug_string(false);
        assert!(terse.contains("id = 1"));
        assert!(terse.contains("IN_PROGRESS"));

        let verbose = item.debug_string(true);
        assert!(verbose.contains("auto_resume_count = 0"));
        assert!(verbose.contains("example.com"));
    }

    #[test]
    fn test_manual_save_item_paths_preset() {
        let (events, _rx) = event_channel();
        let item = DownloadItem::new_manual_save(
            Arc::new(NullDelegate),
            events,
            9,
            PathBuf::from("/saves/page.html"),
            test_url(),
            "text/html".to_string(),
        );
        assert!(item.is_manual_save());
        assert_eq!(item.current_path(), Path::new("/saves/page.html"));
        assert_eq!(item.target_path(), Path::new("/saves/page.html"));
        assert_eq!(item.state(), DownloadState::InProgress);
    }

    #[test]
    fn test_mark_as_complete_finalizes_manual_save() {
        let (events, _rx) = event_channel();
        let mut item = DownloadItem::new_manual_save(
            Arc::new(NullDelegate),
            events,
            3,
            PathBuf::from("/saves/page.html"),
            test_url(),
            "text/html".to_string(),
        );
        item.on_all_data_saved("h".to_string()).unwrap();

        item.mark_as_complete();
        assert_eq!(item.state(), DownloadState::Complete);
        assert!(item.end_time().is_some());
    }

    #[test]
    fn test_content_check_reclassifies_after_save() {
        let mut item = in_progress_item();
        item.on_all_data_saved("h".to_string()).unwrap();

        item.on_content_check_completed(DangerType::UncommonContent);
        assert_eq!(item.danger_type(), DangerType::UncommonContent);
        assert!(item.is_dangerous());
    }

    #[test]
    fn test_can_open_and_show_in_folder() {
        let mut item = in_progress_item();
        assert!(item.can_open_download());
        // No on-disk file yet.
        assert!(!item.can_show_in_folder());

        item.on_downloaded_file_removed();
        assert!(!item.can_open_download());

        let mut cancelled = in_progress_item();
        cancelled.cancel(true);
        assert!(!cancelled.can_open_download());
    }

    #[test]
    fn test_temporary_flag_from_forced_path() {
        let (events, _rx) = event_channel();
        let mut info = DownloadCreateInfo::new(2, vec![test_url()]);
        info.forced_file_path = PathBuf::from("/tmp/drop.bin");
        let item = DownloadItem::new(Arc::new(NullDelegate), events, info);
        assert!(item.is_temporary());
    }
}
