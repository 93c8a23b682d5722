//! Per-path cache entry
//!
//! An entry is three things at once: the memoised size for a path, the
//! handle on an in-progress computation, and a pub/sub channel for size
//! estimates. The first task to ask about a path creates the entry and owns
//! the sizer; everyone else subscribes.
//!
//! Invariants enforced here:
//! - `size` only ever grows while the entry is live (callers pass
//!   non-decreasing totals)
//! - `done` flips false → true exactly once
//! - the completion signal is raised only after every subscriber has seen
//!   the final size
//!
//! Subscribing, delivering updates, and unsubscribing all run under the one
//! entry mutex, so callbacks must not re-enter this entry's API. Legitimate
//! subscribers only touch sizer- or session-local state.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Notify;

/// Progress callback, invoked with the entry's current size in bytes
pub type ProgressFn = Box<dyn Fn(u64) + Send + Sync>;

#[derive(Default)]
struct EntryState {
    size: u64,
    done: bool,
    next_sub_id: u64,
    subscribers: HashMap<u64, ProgressFn>,
}

/// Cache entry for one normalised directory path
pub struct CacheEntry {
    path: String,
    state: Mutex<EntryState>,
    completed: Notify,
}

impl CacheEntry {
    pub(crate) fn new(path: String) -> Arc<Self> {
        Arc::new(Self {
            path,
            state: Mutex::new(EntryState::default()),
            completed: Notify::new(),
        })
    }

    /// Normalised path key this entry describes
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Current running total in bytes
    pub fn size(&self) -> u64 {
        self.state.lock().size
    }

    /// Whether the final size has been written
    pub fn is_done(&self) -> bool {
        self.state.lock().done
    }

    /// Register `on_progress` for size updates.
    ///
    /// If the entry is already done, the callback fires once synchronously
    /// with the final size and the returned handle is inert. Otherwise the
    /// callback fires once immediately with the current size (possibly 0)
    /// and on every subsequent update until it is removed.
    pub fn subscribe(self: &Arc<Self>, on_progress: ProgressFn) -> Subscription {
        let mut state = self.state.lock();

        if state.done {
            on_progress(state.size);
            return Subscription { entry: None, id: 0 };
        }

        let id = state.next_sub_id;
        state.next_sub_id += 1;

        on_progress(state.size);
        state.subscribers.insert(id, on_progress);

        Subscription {
            entry: Some(Arc::clone(self)),
            id,
        }
    }

    /// Publish a new running total to every subscriber.
    ///
    /// Callers must pass monotonically non-decreasing values. No-op once
    /// the entry is done.
    pub fn update_size(&self, size: u64) {
        let state = &mut *self.state.lock();
        if state.done {
            return;
        }
        state.size = size;
        for callback in state.subscribers.values() {
            callback(size);
        }
    }

    /// Finalise the entry: deliver the current size to every subscriber one
    /// last time, clear the subscriber set, and raise the completion
    /// signal. Idempotent.
    pub fn mark_done(&self) {
        {
            let state = &mut *self.state.lock();
            if state.done {
                return;
            }
            state.done = true;
            for callback in state.subscribers.values() {
                callback(state.size);
            }
            state.subscribers.clear();
        }
        self.completed.notify_waiters();
    }

    /// Suspend until the entry is done; returns immediately if it already
    /// is.
    pub async fn wait(&self) {
        let notified = self.completed.notified();
        tokio::pin!(notified);
        // Register before checking the flag so a concurrent mark_done
        // cannot slip between the check and the await.
        notified.as_mut().enable();
        if self.is_done() {
            return;
        }
        notified.await;
    }

    fn unsubscribe(&self, id: u64) {
        self.state.lock().subscribers.remove(&id);
    }
}

/// Handle that removes a progress registration; inert when the subscribe
/// took the already-done fast path.
pub struct Subscription {
    entry: Option<Arc<CacheEntry>>,
    id: u64,
}

impl Subscription {
    /// Remove the registration now instead of at drop time
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(entry) = self.entry.take() {
            entry.unsubscribe(self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recording() -> (Arc<Mutex<Vec<u64>>>, ProgressFn) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (seen, Box::new(move |size| sink.lock().push(size)))
    }

    #[test]
    fn test_subscribe_receives_current_then_updates() {
        let entry = CacheEntry::new("/r/d".to_string());
        let (seen, callback) = recording();

        let _sub = entry.subscribe(callback);
        entry.update_size(10);
        entry.update_size(25);

        assert_eq!(*seen.lock(), vec![0, 10, 25]);
    }

    #[test]
    fn test_mark_done_delivers_final_and_clears() {
        let entry = CacheEntry::new("/r/d".to_string());
        let (seen, callback) = recording();

        let _sub = entry.subscribe(callback);
        entry.update_size(100);
        entry.mark_done();

        // Final value is redelivered on completion; later updates are
        // dropped because the entry is sealed.
        entry.update_size(999);
        assert_eq!(*seen.lock(), vec![0, 100, 100]);
        assert!(entry.is_done());
        assert_eq!(entry.size(), 100);
    }

    #[test]
    fn test_subscribe_after_done_is_synchronous() {
        let entry = CacheEntry::new("/r/d".to_string());
        entry.update_size(42);
        entry.mark_done();

        let (seen, callback) = recording();
        let sub = entry.subscribe(callback);
        assert_eq!(*seen.lock(), vec![42]);

        // The inert handle must not panic or unregister anything.
        sub.unsubscribe();
    }

    #[test]
    fn test_unsubscribe_stops_updates() {
        let entry = CacheEntry::new("/r/d".to_string());
        let (seen, callback) = recording();

        let sub = entry.subscribe(callback);
        entry.update_size(5);
        sub.unsubscribe();
        entry.update_size(50);

        assert_eq!(*seen.lock(), vec![0, 5]);
    }

    #[test]
    fn test_mark_done_is_idempotent() {
        let entry = CacheEntry::new("/r/d".to_string());
        let (seen, callback) = recording();
        let _sub = entry.subscribe(callback);

        entry.mark_done();
        entry.mark_done();

        assert_eq!(*seen.lock(), vec![0, 0]);
    }

    #[tokio::test]
    async fn test_wait_returns_once_done() {
        let entry = CacheEntry::new("/r/d".to_string());

        let waiter = {
            let entry = Arc::clone(&entry);
            tokio::spawn(async move {
                entry.wait().await;
                entry.size()
            })
        };

        // Give the waiter a chance to park before completing the entry.
        tokio::task::yield_now().await;
        entry.update_size(7);
        entry.mark_done();

        assert_eq!(waiter.await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_wait_on_done_entry_is_immediate() {
        let entry = CacheEntry::new("/r/d".to_string());
        entry.mark_done();
        entry.wait().await;
    }
}
