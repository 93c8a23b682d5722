//! Recursive sizer task
//!
//! One sizer is bound to one cache entry for the entry's whole pre-done
//! life. It lists its directory once, accumulates file lengths, joins the
//! entries of subdirectory children through the registry (spawning new
//! sizers only where it is first to ask), and republishes a throttled
//! running total while children resolve.
//!
//! ```text
//! START → LISTING → AGGREGATING (children spawn/complete, ticker fires)
//!                      │
//!                      └─ all children done → FINALISE → DONE
//! Any state → DONE (FinishGuard) on panic or engine shutdown
//! ```

use super::entry::CacheEntry;
use super::{normalized_key, ScanEngine};
use humansize::{format_size, BINARY};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{self, Duration, MissedTickBehavior};
use tracing::{debug, error, warn};

/// Interval between published size estimates per entry
pub const PUBLISH_INTERVAL: Duration = Duration::from_millis(200);

/// Running aggregate for one directory
#[derive(Default)]
struct Aggregate {
    files_total: u64,
    sub_sizes: HashMap<String, u64>,
    dirty: bool,
}

impl Aggregate {
    fn total(&self) -> u64 {
        self.files_total + self.sub_sizes.values().sum::<u64>()
    }

    /// Take the current total if anything changed since the last publish
    fn take_if_dirty(&mut self) -> Option<u64> {
        if self.dirty {
            self.dirty = false;
            Some(self.total())
        } else {
            None
        }
    }
}

/// Marks the entry done on every exit path, panics included, so no waiter
/// is left suspended on an abandoned entry.
struct FinishGuard {
    entry: Arc<CacheEntry>,
}

impl Drop for FinishGuard {
    fn drop(&mut self) {
        if std::thread::panicking() {
            error!(
                path = self.entry.path(),
                "sizer panicked, sealing entry with partial total"
            );
        }
        self.entry.mark_done();
    }
}

/// Spawn the sizer task for `entry`.
///
/// Callers must hold the ownership result of `get_or_create`
/// (`existed == false`) for this path; spawning twice for one entry would
/// double-count.
pub(super) fn spawn(engine: Arc<ScanEngine>, path: String, entry: Arc<CacheEntry>) {
    tokio::spawn(async move {
        let _guard = FinishGuard {
            entry: Arc::clone(&entry),
        };
        size_directory(engine, &path, &entry).await;
    });
}

async fn size_directory(engine: Arc<ScanEngine>, path: &str, entry: &Arc<CacheEntry>) {
    let started = Instant::now();

    let children = match engine.reader().list(Path::new(path)).await {
        Ok(children) => children,
        Err(e) => {
            // The failing directory contributes zero bytes; siblings and
            // ancestors are unaffected.
            warn!(path, error = %e, "directory listing failed");
            return;
        }
    };

    let aggregate = Arc::new(Mutex::new(Aggregate::default()));
    let mut pending = Vec::new();

    for child in children {
        if child.is_dir {
            let child_key = normalized_key(&Path::new(path).join(&child.name));
            let sub_entry = engine.entry_for(&child_key);

            let slot = Arc::clone(&aggregate);
            let name = child.name;
            let subscription = sub_entry.subscribe(Box::new(move |size| {
                let mut agg = slot.lock();
                agg.sub_sizes.insert(name.clone(), size);
                agg.dirty = true;
            }));
            pending.push((sub_entry, subscription));
        } else {
            let mut agg = aggregate.lock();
            agg.files_total += child.size;
            agg.dirty = true;
        }
    }

    let child_count = pending.len();

    // Throttled publisher: caps the notification rate per entry no matter
    // how fast children report.
    let publisher = {
        let aggregate = Arc::clone(&aggregate);
        let entry = Arc::clone(entry);
        tokio::spawn(async move {
            let mut ticker = time::interval(PUBLISH_INTERVAL);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let published = aggregate.lock().take_if_dirty();
                if let Some(total) = published {
                    entry.update_size(total);
                }
            }
        })
    };

    let shutdown = engine.shutdown_token();
    let mut pending = pending.into_iter();
    for (sub_entry, subscription) in pending.by_ref() {
        tokio::select! {
            _ = sub_entry.wait() => {
                subscription.unsubscribe();
            }
            _ = shutdown.cancelled() => {
                debug!(path, "engine shutdown, sealing entry with partial total");
                break;
            }
        }
    }
    // Remaining subscriptions (shutdown path) unregister on drop.
    drop(pending);

    publisher.abort();
    let _ = publisher.await;

    let total = aggregate.lock().total();
    entry.update_size(total);

    debug!(
        path,
        size = %format_size(total, BINARY),
        children = child_count,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "directory sized"
    );
    // FinishGuard seals the entry.
}
