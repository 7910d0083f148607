//! Cache entries and the handles the cache gives out.

use chrono::{DateTime, Utc};

/// Point-in-time copy of one cached value and its metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry<V> {
    pub value: V,
    /// Incremented by every write to the key, local or remote.
    pub version: u64,
    /// The value has not been confirmed by the server yet.
    pub is_optimistic: bool,
    /// A consumer should refetch before trusting the value.
    pub is_stale: bool,
    pub updated_at: DateTime<Utc>,
}

/// Value (or absence) captured by `apply_optimistic`, restored by `rollback`.
///
/// Opaque to callers; it can only be consumed by the cache that issued it.
#[derive(Debug)]
pub struct SnapshotToken<K, V> {
    pub(crate) key: K,
    pub(crate) previous: Option<Captured<V>>,
    pub(crate) applied_version: u64,
}

#[derive(Debug, Clone)]
pub(crate) struct Captured<V> {
    pub(crate) value: V,
    pub(crate) is_optimistic: bool,
}

impl<K, V> SnapshotToken<K, V> {
    pub fn key(&self) -> &K {
        &self.key
    }

    /// Version the optimistic write produced.
    pub fn applied_version(&self) -> u64 {
        self.applied_version
    }

    /// Whether the key was absent before the optimistic write.
    pub fn captured_absent(&self) -> bool {
        self.previous.is_none()
    }
}

/// Tag carried by an in-flight refetch.
///
/// The fetched value is accepted only if the key's version and fetch
/// generation still match what they were when the ticket was issued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefetchTicket<K> {
    pub(crate) key: K,
    pub(crate) version: u64,
    pub(crate) generation: u64,
}

impl<K> RefetchTicket<K> {
    pub fn key(&self) -> &K {
        &self.key
    }

    pub fn version(&self) -> u64 {
        self.version
    }
}

/// What happened to a completed refetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefetchOutcome {
    /// The fetched value replaced the entry.
    Applied { version: u64 },
    /// The entry was written or the fetch was cancelled while it was in flight.
    Discarded,
}

impl RefetchOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, RefetchOutcome::Applied { .. })
    }
}
