//! # Latest-value cache
//! Holds the most recent successful payload per source name.
//!
//! Each source gets its own slot with its own lock, so a refresh writing
//! `lastHour` never waits on a reader walking `summary`. The outer index lock
//! is only taken to look a slot up (read) or to register a new name (write).

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::source::SourceDescriptor;

/// Opaque result set as returned by the fetcher and forwarded to subscribers.
pub type Payload = serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub source: String,
    pub payload: Arc<Payload>,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug)]
struct Slot {
    entry: RwLock<Option<CacheEntry>>,
}

#[derive(Debug, Default)]
struct Index {
    by_name: HashMap<String, Arc<Slot>>,
    /// Registration order; catch-up replays sources in this order.
    order: Vec<Arc<Slot>>,
}

/// Thread-safe latest-value store keyed by source name.
#[derive(Debug, Default)]
pub struct Cache {
    index: RwLock<Index>,
}

impl Cache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-register one empty slot per source, in config order.
    pub fn with_sources(sources: &[SourceDescriptor]) -> Self {
        let cache = Self::new();
        for s in sources {
            cache.slot(&s.name);
        }
        cache
    }

    /// Replace the entry for `source` with `payload`, stamped with the current time.
    pub fn set(&self, source: &str, payload: Payload) {
        self.set_shared(source, Arc::new(payload));
    }

    /// Same as [`Cache::set`] for a payload that is already shared.
    pub fn set_shared(&self, source: &str, payload: Arc<Payload>) {
        self.set_then(source, payload, |_| ());
    }

    /// Replace the entry and run `then` while the slot is still write-locked.
    /// Paired with [`Cache::for_each`], a notifier and a catch-up reader of the
    /// same source can never deliver an older value after a newer one.
    /// `then` must not block or touch this cache.
    pub fn set_then(&self, source: &str, payload: Arc<Payload>, then: impl FnOnce(&CacheEntry)) {
        if source.is_empty() {
            tracing::warn!(target: "feed", "cache set with empty source name ignored");
            return;
        }
        let slot = self.slot(source);
        let entry = CacheEntry {
            source: source.to_string(),
            payload,
            last_updated: Utc::now(),
        };
        let mut guard = slot.entry.write();
        let stored = guard.insert(entry);
        then(stored);
    }

    /// Latest entry for `source`, or `None` if no fetch has succeeded yet.
    pub fn get(&self, source: &str) -> Option<CacheEntry> {
        let slot = self.index.read().by_name.get(source).cloned()?;
        let guard = slot.entry.read();
        guard.clone()
    }

    /// Every populated entry, in registration order. Unpopulated sources are omitted.
    pub fn get_all(&self) -> Vec<CacheEntry> {
        // Snapshot the slot list first so no per-key lock is taken under the index lock.
        let slots: Vec<Arc<Slot>> = self.index.read().order.clone();
        slots
            .iter()
            .filter_map(|slot| slot.entry.read().clone())
            .collect()
    }

    /// Visit every populated entry in registration order, holding that
    /// entry's read lock during the call. Returns the number visited.
    pub fn for_each(&self, mut f: impl FnMut(&CacheEntry)) -> usize {
        let slots: Vec<Arc<Slot>> = self.index.read().order.clone();
        let mut n = 0;
        for slot in &slots {
            if let Some(entry) = slot.entry.read().as_ref() {
                f(entry);
                n += 1;
            }
        }
        n
    }

    /// Number of sources that have at least one successful fetch.
    pub fn populated(&self) -> usize {
        let slots: Vec<Arc<Slot>> = self.index.read().order.clone();
        slots.iter().filter(|s| s.entry.read().is_some()).count()
    }

    fn slot(&self, source: &str) -> Arc<Slot> {
        if let Some(slot) = self.index.read().by_name.get(source) {
            return slot.clone();
        }
        let mut index = self.index.write();
        // Another writer may have registered it between the two locks.
        if let Some(slot) = index.by_name.get(source) {
            return slot.clone();
        }
        let slot = Arc::new(Slot {
            entry: RwLock::new(None),
        });
        index.by_name.insert(source.to_string(), slot.clone());
        index.order.push(slot.clone());
        slot
    }
}
