//! Single-owner event loop for a download item.
//!
//! A [`DownloadItem`] is not `Sync` and never needs to be: exactly one
//! task owns it and applies events in arrival order. Everything else
//! (transfer engine callbacks, user commands, delegate deferrals) talks
//! to it through a cloneable [`DownloadHandle`] that feeds the same
//! channel the item's own spawned operations report back on.

use tracing::debug;

use crate::interrupt::InterruptReason;
use crate::item::DownloadItem;
use crate::item::events::{EventReceiver, EventSender, ItemEvent};

/// Owns a [`DownloadItem`] and pumps its event channel.
pub struct DownloadActor {
    item: DownloadItem,
    receiver: EventReceiver,
}

impl DownloadActor {
    /// Pairs an item with the receiving half of its event channel.
    ///
    /// The item must have been constructed with the matching sender, or
    /// its spawned operations will report into the void.
    #[must_use]
    pub fn new(item: DownloadItem, receiver: EventReceiver) -> Self {
        Self { item, receiver }
    }

    /// Runs until [`ItemEvent::Shutdown`] arrives, then returns the item
    /// for final inspection or persistence.
    pub async fn run(mut self) -> DownloadItem {
        while let Some(event) = self.receiver.recv().await {
            if matches!(event, ItemEvent::Shutdown) {
                break;
            }
            self.item.handle_event(event);
        }
        debug!(id = self.item.id(), "download actor stopped");
        self.item
    }
}

/// Cheap cloneable front for commanding a running [`DownloadActor`].
///
/// All methods are fire-and-forget: the event is applied when the actor
/// dequeues it, and events sent after the actor stopped are dropped.
#[derive(Clone)]
pub struct DownloadHandle {
    events: EventSender,
}

impl DownloadHandle {
    /// Wraps the sending half of an item's event channel.
    #[must_use]
    pub fn new(events: EventSender) -> Self {
        Self { events }
    }

    /// Pauses the download.
    pub fn pause(&self) {
        self.send(ItemEvent::Pause);
    }

    /// Resumes a paused download.
    pub fn resume(&self) {
        self.send(ItemEvent::Resume);
    }

    /// Cancels the download.
    pub fn cancel(&self, user_initiated: bool) {
        self.send(ItemEvent::Cancel { user_initiated });
    }

    /// Reports transfer progress.
    pub fn update_progress(&self, bytes_so_far: i64, bytes_per_sec: i64, hash_state: String) {
        self.send(ItemEvent::Progress {
            bytes_so_far,
            bytes_per_sec,
            hash_state,
        });
    }

    /// Reports that the engine wrote the last byte.
    pub fn all_data_saved(&self, final_hash: String) {
        self.send(ItemEvent::AllDataSaved { final_hash });
    }

    /// Reports an engine failure.
    pub fn engine_error(&self, reason: InterruptReason) {
        self.send(ItemEvent::EngineError { reason });
    }

    /// Records the user accepting a dangerous download.
    pub fn validate_dangerous(&self) {
        self.send(ItemEvent::DangerValidated);
    }

    /// Re-runs the completion gate.
    pub fn maybe_complete(&self) {
        self.send(ItemEvent::MaybeComplete);
    }

    /// Stops the actor loop. The item is returned by
    /// [`DownloadActor::run`].
    pub fn shutdown(&self) {
        self.send(ItemEvent::Shutdown);
    }

    fn send(&self, event: ItemEvent) {
        if self.events.send(event).is_err() {
            debug!("download actor gone; event dropped");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use url::Url;

    use super::*;
    use crate::delegate::NullDelegate;
    use crate::item::events::event_channel;
    use crate::item::DownloadCreateInfo;
    use crate::state::DownloadState;

    fn actor_pair() -> (DownloadActor, DownloadHandle) {
        let (events, receiver) = event_channel();
        let url = Url::parse("https://example.com/file.bin").unwrap();
        let mut info = DownloadCreateInfo::new(1, vec![url]);
        info.total_bytes = 100;
        let item = DownloadItem::new(Arc::new(NullDelegate), events.clone(), info);
        (
            DownloadActor::new(item, receiver),
            DownloadHandle::new(events),
        )
    }

    #[tokio::test]
    async fn test_actor_applies_events_in_order_and_returns_item() {
        let (actor, handle) = actor_pair();
        let join = tokio::spawn(actor.run());

        handle.update_progress(40, 10, String::new());
        handle.pause();
        handle.shutdown();

        let item = join.await.unwrap();
        assert_eq!(item.received_bytes(), 40);
        assert!(item.is_paused());
        assert_eq!(item.state(), DownloadState::InProgress);
    }

    #[tokio::test]
    async fn test_cancel_through_handle() {
        let (actor, handle) = actor_pair();
        let join = tokio::spawn(actor.run());

        handle.cancel(true);
        handle.shutdown();

        let item = join.await.unwrap();
        assert_eq!(item.state(), DownloadState::Cancelled);
    }

    #[tokio::test]
    async fn test_events_after_shutdown_are_dropped() {
        let (actor, handle) = actor_pair();
        let join = tokio::spawn(actor.run());

        handle.shutdown();
        let item = join.await.unwrap();

        // The actor is gone; this must not panic.
        handle.update_progress(99, 0, String::new());
        assert_eq!(item.received_bytes(), 0);
    }
}
