//! Process-wide registry mapping normalised paths to cache entries
//!
//! The registry arbitrates ownership: exactly one caller per path observes
//! `existed == false` from [`UsageCache::get_or_create`] and must start the
//! sizer; everyone else subscribes to the entry it got back. Readers
//! dominate, so the map sits behind a reader-writer lock with exclusive
//! upgrade only for insertion and invalidation.
//!
//! Lock order: never take an entry mutex while holding the registry lock.
//! Both `get_or_create` and `invalidate` only touch the map.

use super::entry::CacheEntry;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf, MAIN_SEPARATOR, MAIN_SEPARATOR_STR};
use std::sync::Arc;

/// Registry of in-flight and completed directory sizes
#[derive(Default)]
pub struct UsageCache {
    entries: RwLock<HashMap<String, Arc<CacheEntry>>>,
}

impl UsageCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomic lookup-or-insert.
    ///
    /// `existed == false` means the caller owns the computation and must
    /// start a sizer for the entry; `existed == true` means another task
    /// owns it and the caller should only subscribe.
    pub fn get_or_create(&self, key: &str) -> (Arc<CacheEntry>, bool) {
        let mut entries = self.entries.write();
        match entries.get(key) {
            Some(entry) => (Arc::clone(entry), true),
            None => {
                let entry = CacheEntry::new(key.to_string());
                entries.insert(key.to_string(), Arc::clone(&entry));
                (entry, false)
            }
        }
    }

    /// Shared-lock lookup without creating
    pub fn get(&self, key: &str) -> Option<Arc<CacheEntry>> {
        self.entries.read().get(key).map(Arc::clone)
    }

    /// Remove `key` and every key under it.
    ///
    /// Computations attached to removed entries keep running to completion;
    /// their results just become unreachable through the registry.
    pub fn invalidate(&self, key: &str) {
        let prefix = if key.ends_with(MAIN_SEPARATOR) {
            key.to_string()
        } else {
            format!("{key}{MAIN_SEPARATOR}")
        };

        let mut entries = self.entries.write();
        entries.retain(|k, _| k != key && !k.starts_with(&prefix));
    }

    /// Number of cached paths
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

/// Normalise a path into a cache key: `.` dropped, `..` resolved lexically,
/// redundant separators collapsed, case preserved.
pub fn normalized_key(path: &Path) -> String {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(prefix) => normalized.push(prefix.as_os_str()),
            Component::RootDir => normalized.push(MAIN_SEPARATOR_STR),
            Component::CurDir => {}
            // Lexical resolution only; pop refuses to cross the root
            Component::ParentDir => {
                normalized.pop();
            }
            Component::Normal(part) => normalized.push(part),
        }
    }
    normalized.to_string_lossy().into_owned()
}
