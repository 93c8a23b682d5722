//! Concurrent directory-sizing engine
//!
//! # Architecture
//!
//! ```text
//! Session ──────list──────▶ DirReader (global semaphore, 20 handles)
//!    │
//!    ├─get_or_create──▶ UsageCache ──▶ CacheEntry
//!    │                                 (memo + progress pub/sub + done signal)
//!    │                                      ▲
//!    └─subscribe───────────────────────────┤ update_size / mark_done
//!                                           │
//!                                    Sizer task (1:1 with entry)
//!                                           │
//!                                           └─ recurses through UsageCache,
//!                                              so overlapping requests share
//!                                              one computation per subtree
//! ```
//!
//! The registry is process-wide by design (cross-session deduplication) but
//! held as an explicit [`ScanEngine`] value handed to collaborators, which
//! keeps tests isolated.

mod cache;
mod entry;
mod reader;
mod session;
mod sizer;

pub use cache::{normalized_key, UsageCache};
pub use entry::{CacheEntry, ProgressFn, Subscription};
pub use reader::{ChildEntry, DirReader, MAX_CONCURRENT_LISTINGS};
pub use session::{run_session, FileItem, ItemStatus, UsageEvent, MAX_CONCURRENT_CHILDREN};
pub use sizer::PUBLISH_INTERVAL;

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Shared engine state: registry, I/O gate, shutdown signal, counters.
///
/// Constructed once at startup; sessions and sizers hold `Arc`s.
pub struct ScanEngine {
    cache: UsageCache,
    reader: DirReader,
    shutdown: CancellationToken,
    sizers_started: AtomicU64,
}

impl ScanEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            cache: UsageCache::new(),
            reader: DirReader::new(),
            shutdown: CancellationToken::new(),
            sizers_started: AtomicU64::new(0),
        })
    }

    /// The per-path registry
    pub fn cache(&self) -> &UsageCache {
        &self.cache
    }

    pub(crate) fn reader(&self) -> &DirReader {
        &self.reader
    }

    /// Clone of the engine-wide shutdown token
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Number of sizer tasks spawned since startup.
    ///
    /// Deduplication is observable here: N overlapping requests for one
    /// subtree bump this once.
    pub fn sizers_started(&self) -> u64 {
        self.sizers_started.load(Ordering::Relaxed)
    }

    /// Look up or create the entry for `key`, spawning its sizer when this
    /// call was the one that created it.
    pub fn entry_for(self: &Arc<Self>, key: &str) -> Arc<CacheEntry> {
        let (entry, existed) = self.cache.get_or_create(key);
        if !existed {
            self.sizers_started.fetch_add(1, Ordering::Relaxed);
            sizer::spawn(Arc::clone(self), key.to_string(), Arc::clone(&entry));
        }
        entry
    }

    /// Drop `path` and all its descendants from the registry so subsequent
    /// requests recompute.
    pub fn invalidate(&self, path: &Path) {
        let key = normalized_key(path);
        self.cache.invalidate(&key);
    }

    /// Signal engine shutdown; in-flight sizers seal their entries with
    /// partial totals.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}
