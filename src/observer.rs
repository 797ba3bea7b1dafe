//! Observer notification bus.
//!
//! Observers are notified synchronously, in registration order, on the
//! control task. Dispatch iterates over a snapshot of the registry, so an
//! observer callback may re-entrantly add or remove observers (including
//! itself) without invalidating the iteration.

use std::sync::{Arc, Mutex, PoisonError};

use crate::item::DownloadItem;

/// Receives lifecycle notifications for one download item.
///
/// All methods have empty defaults so implementors subscribe only to the
/// events they care about. Callbacks run synchronously on the item's
/// control task; long work belongs elsewhere.
pub trait DownloadObserver: Send + Sync {
    /// Externally visible state or metadata changed.
    fn on_download_updated(&self, item: &DownloadItem) {
        let _ = item;
    }

    /// The downloaded file was opened.
    fn on_download_opened(&self, item: &DownloadItem) {
        let _ = item;
    }

    /// The item is being removed from its collection.
    fn on_download_removed(&self, item: &DownloadItem) {
        let _ = item;
    }

    /// The item is being destroyed. Last notification an observer ever
    /// receives for this item.
    fn on_download_destroyed(&self, item: &DownloadItem) {
        let _ = item;
    }
}

/// Registry of observers for one download item.
///
/// Interior mutability lets observers mutate the registry from inside a
/// dispatch; the `Mutex` is never held across a callback.
#[derive(Default)]
pub struct ObserverRegistry {
    observers: Mutex<Vec<Arc<dyn DownloadObserver>>>,
}

impl ObserverRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an observer at the end of the registration order.
    pub fn add(&self, observer: Arc<dyn DownloadObserver>) {
        self.lock().push(observer);
    }

    /// Removes an observer by identity. No-op if it was never registered.
    pub fn remove(&self, observer: &Arc<dyn DownloadObserver>) {
        self.lock().retain(|o| !Arc::ptr_eq(o, observer));
    }

    /// Number of registered observers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Removes all observers.
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Dispatches `notify` to a snapshot of the current observers, in
    /// registration order.
    pub fn for_each(&self, notify: impl Fn(&dyn DownloadObserver)) {
        let snapshot: Vec<_> = self.lock().clone();
        for observer in snapshot {
            notify(observer.as_ref());
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Arc<dyn DownloadObserver>>> {
        // A poisoned registry still holds valid observer pointers.
        self.observers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    struct Recorder {
        tag: usize,
        log: Arc<Mutex<Vec<usize>>>,
    }

    impl DownloadObserver for Recorder {
        fn on_download_updated(&self, _item: &DownloadItem) {
            self.log.lock().unwrap().push(self.tag);
        }
    }

    fn registry_with(tags: &[usize], log: &Arc<Mutex<Vec<usize>>>) -> ObserverRegistry {
        let registry = ObserverRegistry::new();
        for &tag in tags {
            registry.add(Arc::new(Recorder {
                tag,
                log: Arc::clone(log),
            }));
        }
        registry
    }

    #[test]
    fn test_dispatch_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let registry = registry_with(&[1, 2, 3], &log);

        let counter = AtomicUsize::new(0);
        registry.for_each(|_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_remove_by_identity() {
        let registry = ObserverRegistry::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let first: Arc<dyn DownloadObserver> = Arc::new(Recorder {
            tag: 1,
            log: Arc::clone(&log),
        });
        let second: Arc<dyn DownloadObserver> = Arc::new(Recorder { tag: 2, log });

        registry.add(Arc::clone(&first));
        registry.add(Arc::clone(&second));
        assert_eq!(registry.len(), 2);

        registry.remove(&first);
        assert_eq!(registry.len(), 1);

        // Removing again is a no-op.
        registry.remove(&first);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_reentrant_mutation_during_dispatch_is_tolerated() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let registry = registry_with(&[1, 2], &log);

        // The first callback empties the registry; the snapshot keeps the
        // iteration valid and the second entry is still visited.
        let dispatched = AtomicUsize::new(0);
        registry.for_each(|_| {
            if dispatched.fetch_add(1, Ordering::SeqCst) == 0 {
                registry.clear();
            }
        });

        assert_eq!(dispatched.load(Ordering::SeqCst), 2);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_clear_empties_registry() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let registry = registry_with(&[1, 2], &log);
        registry.clear();
        assert!(registry.is_empty());
    }
}
