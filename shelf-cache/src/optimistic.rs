//! Versioned key/value store with speculative writes.
//!
//! Every mutation goes through one of the public operations below and
//! bumps the key's version while holding the write lock, so version
//! checks in [`OptimisticCache::complete_refetch`] behave as a
//! compare-and-swap even when the cache is shared across threads.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::entry::{CacheEntry, Captured, RefetchOutcome, RefetchTicket, SnapshotToken};
use crate::error::{CacheError, CacheResult};
use crate::events::{CacheEvent, ChangeKind};

/// Configuration for the optimistic cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Buffered change events per subscriber before it starts lagging.
    pub event_capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            event_capacity: 256,
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the change event channel capacity.
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity.max(1);
        self
    }
}

/// Per-key state. Survives the value becoming absent so versions never reset.
#[derive(Debug)]
struct Slot<V> {
    value: Option<V>,
    version: u64,
    /// Bumped by `cancel_pending`; invalidates outstanding refetch tickets.
    generation: u64,
    is_optimistic: bool,
    is_stale: bool,
    updated_at: DateTime<Utc>,
}

impl<V> Default for Slot<V> {
    fn default() -> Self {
        Self {
            value: None,
            version: 0,
            generation: 0,
            is_optimistic: false,
            is_stale: false,
            updated_at: DateTime::UNIX_EPOCH,
        }
    }
}

impl<V> Slot<V> {
    fn store(&mut self, value: Option<V>, is_optimistic: bool) -> u64 {
        self.value = value;
        self.is_optimistic = is_optimistic;
        self.version += 1;
        self.updated_at = Utc::now();
        self.version
    }

    fn confirm(&mut self, value: V) -> u64 {
        self.is_stale = false;
        self.store(Some(value), false)
    }
}

/// In-memory optimistic cache.
///
/// `K` identifies a logical value (e.g. the cart), `V` is the value type.
/// Transforms passed to [`apply_optimistic`](Self::apply_optimistic) run
/// under the cache lock and must be pure.
pub struct OptimisticCache<K, V> {
    slots: RwLock<HashMap<K, Slot<V>>>,
    events: broadcast::Sender<CacheEvent<K>>,
    config: CacheConfig,
}

impl<K, V> OptimisticCache<K, V>
where
    K: Eq + Hash + Clone + fmt::Display,
    V: Clone,
{
    pub fn new(config: CacheConfig) -> Self {
        let (events, _rx) = broadcast::channel(config.event_capacity);
        Self {
            slots: RwLock::new(HashMap::new()),
            events,
            config,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(CacheConfig::default())
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Subscribe to change events for every key.
    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent<K>> {
        self.events.subscribe()
    }

    /// Latest known value, optimistic or confirmed.
    pub fn read(&self, key: &K) -> CacheResult<Option<V>> {
        let slots = self.read_slots()?;
        Ok(slots.get(key).and_then(|slot| slot.value.clone()))
    }

    /// Value plus version and flags.
    pub fn entry(&self, key: &K) -> CacheResult<Option<CacheEntry<V>>> {
        let slots = self.read_slots()?;
        Ok(slots.get(key).and_then(|slot| {
            slot.value.clone().map(|value| CacheEntry {
                value,
                version: slot.version,
                is_optimistic: slot.is_optimistic,
                is_stale: slot.is_stale,
                updated_at: slot.updated_at,
            })
        }))
    }

    /// Current version of a key (0 if it was never written).
    pub fn version(&self, key: &K) -> CacheResult<u64> {
        let slots = self.read_slots()?;
        Ok(slots.get(key).map(|slot| slot.version).unwrap_or(0))
    }

    /// Whether a consumer should refetch the key. Absent keys always need one.
    pub fn is_stale(&self, key: &K) -> CacheResult<bool> {
        let slots = self.read_slots()?;
        Ok(slots
            .get(key)
            .map(|slot| slot.value.is_none() || slot.is_stale)
            .unwrap_or(true))
    }

    /// Unconditionally store a confirmed value.
    pub fn write(&self, key: K, value: V) -> CacheResult<u64> {
        let version = {
            let mut slots = self.write_slots()?;
            slots.entry(key.clone()).or_default().confirm(value)
        };
        self.publish(key, version, ChangeKind::Written);
        Ok(version)
    }

    /// Speculatively apply `transform` to the current value (or `V::default()`
    /// if absent) and return a token that can undo exactly this write.
    ///
    /// Repeated calls stack: each transform sees the previous speculation.
    pub fn apply_optimistic<F>(&self, key: &K, transform: F) -> CacheResult<SnapshotToken<K, V>>
    where
        F: FnOnce(V) -> V,
        V: Default,
    {
        let token = {
            let mut slots = self.write_slots()?;
            let slot = slots.entry(key.clone()).or_default();
            let previous = slot.value.clone().map(|value| Captured {
                value,
                is_optimistic: slot.is_optimistic,
            });
            let base = slot.value.clone().unwrap_or_default();
            let applied_version = slot.store(Some(transform(base)), true);
            SnapshotToken {
                key: key.clone(),
                previous,
                applied_version,
            }
        };
        debug!(key = %key, version = token.applied_version, "Applied optimistic write");
        self.publish(key.clone(), token.applied_version, ChangeKind::Optimistic);
        Ok(token)
    }

    /// Restore the value captured by `token`.
    ///
    /// Writes made to the key after the token was issued are overwritten
    /// too; the last rollback wins and nothing is merged.
    pub fn rollback(&self, token: SnapshotToken<K, V>) -> CacheResult<u64> {
        let SnapshotToken {
            key,
            previous,
            applied_version,
        } = token;
        let (version, overwritten) = {
            let mut slots = self.write_slots()?;
            let slot = slots.entry(key.clone()).or_default();
            let overwritten = slot.version.saturating_sub(applied_version);
            let version = match previous {
                Some(captured) => slot.store(Some(captured.value), captured.is_optimistic),
                None => slot.store(None, false),
            };
            (version, overwritten)
        };
        if overwritten > 0 {
            warn!(
                key = %key,
                version,
                overwritten,
                "Rollback discarded writes made after the snapshot"
            );
        } else {
            debug!(key = %key, version, "Rolled back optimistic write");
        }
        self.publish(key, version, ChangeKind::RolledBack);
        Ok(version)
    }

    /// Accept the value written by `token` as server truth.
    ///
    /// Only succeeds while that write is still the latest one on the key;
    /// returns `false` and changes nothing otherwise.
    pub fn confirm(&self, token: &SnapshotToken<K, V>) -> CacheResult<bool> {
        let version = {
            let mut slots = self.write_slots()?;
            let Some(slot) = slots.get_mut(&token.key) else {
                return Ok(false);
            };
            if slot.version != token.applied_version {
                return Ok(false);
            }
            let Some(value) = slot.value.take() else {
                return Ok(false);
            };
            slot.confirm(value)
        };
        debug!(key = %token.key, version, "Confirmed optimistic write");
        self.publish(token.key.clone(), version, ChangeKind::Written);
        Ok(true)
    }

    /// Mark the key stale. The cache does not fetch; consumers do.
    pub fn invalidate(&self, key: &K) -> CacheResult<()> {
        let version = {
            let mut slots = self.write_slots()?;
            match slots.get_mut(key) {
                Some(slot) => {
                    slot.is_stale = true;
                    slot.version
                }
                None => return Ok(()),
            }
        };
        self.publish(key.clone(), version, ChangeKind::Invalidated);
        Ok(())
    }

    /// Make every outstanding refetch for `key` resolve as discarded.
    ///
    /// The fetches themselves keep running; only their results are ignored.
    pub fn cancel_pending(&self, key: &K) -> CacheResult<()> {
        let mut slots = self.write_slots()?;
        let slot = slots.entry(key.clone()).or_default();
        slot.generation += 1;
        debug!(key = %key, generation = slot.generation, "Cancelled pending refetches");
        Ok(())
    }

    /// Tag a refetch that is about to be issued.
    pub fn begin_refetch(&self, key: &K) -> CacheResult<RefetchTicket<K>> {
        let mut slots = self.write_slots()?;
        let slot = slots.entry(key.clone()).or_default();
        Ok(RefetchTicket {
            key: key.clone(),
            version: slot.version,
            generation: slot.generation,
        })
    }

    /// Store a refetched value unless the key moved on since the ticket was issued.
    pub fn complete_refetch(&self, ticket: RefetchTicket<K>, value: V) -> CacheResult<RefetchOutcome> {
        let outcome = {
            let mut slots = self.write_slots()?;
            let slot = slots.entry(ticket.key.clone()).or_default();
            if slot.version != ticket.version || slot.generation != ticket.generation {
                debug!(
                    key = %ticket.key,
                    ticket_version = ticket.version,
                    current_version = slot.version,
                    "Discarding refetch result superseded by newer state"
                );
                return Ok(RefetchOutcome::Discarded);
            }
            RefetchOutcome::Applied {
                version: slot.confirm(value),
            }
        };
        if let RefetchOutcome::Applied { version } = outcome {
            self.publish(ticket.key, version, ChangeKind::Refetched);
        }
        Ok(outcome)
    }

    fn publish(&self, key: K, version: u64, kind: ChangeKind) {
        if self.events.send(CacheEvent { key, version, kind }).is_err() {
            // No subscribers - this is fine
            debug!(kind = kind.as_str(), "No subscribers for cache event");
        }
    }

    fn read_slots(&self) -> CacheResult<RwLockReadGuard<'_, HashMap<K, Slot<V>>>> {
        self.slots.read().map_err(|_| CacheError::LockPoisoned)
    }

    fn write_slots(&self) -> CacheResult<RwLockWriteGuard<'_, HashMap<K, Slot<V>>>> {
        self.slots.write().map_err(|_| CacheError::LockPoisoned)
    }
}

impl<K, V> Default for OptimisticCache<K, V>
where
    K: Eq + Hash + Clone + fmt::Display,
    V: Clone,
{
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Cache = OptimisticCache<String, u32>;

    fn key() -> String {
        "cart".to_string()
    }

    #[test]
    fn test_write_bumps_version_and_confirms() -> CacheResult<()> {
        let cache = Cache::with_defaults();
        assert_eq!(cache.version(&key())?, 0);
        assert_eq!(cache.write(key(), 2)?, 1);
        let entry = cache.entry(&key())?.ok_or(CacheError::LockPoisoned)?;
        assert_eq!(entry.value, 2);
        assert_eq!(entry.version, 1);
        assert!(!entry.is_optimistic);
        Ok(())
    }

    #[test]
    fn test_apply_on_absent_uses_default() -> CacheResult<()> {
        let cache = Cache::with_defaults();
        let token = cache.apply_optimistic(&key(), |n| n + 5)?;
        assert!(token.captured_absent());
        assert_eq!(cache.read(&key())?, Some(5));
        cache.rollback(token)?;
        assert_eq!(cache.read(&key())?, None);
        Ok(())
    }

    #[test]
    fn test_optimistic_writes_stack() -> CacheResult<()> {
        let cache = Cache::with_defaults();
        cache.write(key(), 1)?;
        let first = cache.apply_optimistic(&key(), |n| n + 1)?;
        let second = cache.apply_optimistic(&key(), |n| n + 1)?;
        assert_eq!(cache.read(&key())?, Some(3));

        // Undoing only the second speculation keeps the first one visible
        cache.rollback(second)?;
        let entry = cache.entry(&key())?.ok_or(CacheError::LockPoisoned)?;
        assert_eq!(entry.value, 2);
        assert!(entry.is_optimistic);

        cache.rollback(first)?;
        let entry = cache.entry(&key())?.ok_or(CacheError::LockPoisoned)?;
        assert_eq!(entry.value, 1);
        assert!(!entry.is_optimistic);
        Ok(())
    }

    #[test]
    fn test_earlier_rollback_discards_later_speculation() -> CacheResult<()> {
        let cache = Cache::with_defaults();
        cache.write(key(), 10)?;
        let first = cache.apply_optimistic(&key(), |n| n + 1)?;
        let _second = cache.apply_optimistic(&key(), |n| n + 1)?;
        cache.rollback(first)?;
        assert_eq!(cache.read(&key())?, Some(10));
        Ok(())
    }

    #[test]
    fn test_refetch_applies_when_untouched() -> CacheResult<()> {
        let cache = Cache::with_defaults();
        cache.apply_optimistic(&key(), |n| n + 3)?;
        let ticket = cache.begin_refetch(&key())?;
        let outcome = cache.complete_refetch(ticket, 7)?;
        assert!(outcome.is_applied());
        let entry = cache.entry(&key())?.ok_or(CacheError::LockPoisoned)?;
        assert_eq!(entry.value, 7);
        assert!(!entry.is_optimistic);
        Ok(())
    }

    #[test]
    fn test_refetch_discarded_after_newer_write() -> CacheResult<()> {
        let cache = Cache::with_defaults();
        cache.write(key(), 1)?;
        let ticket = cache.begin_refetch(&key())?;
        cache.apply_optimistic(&key(), |n| n + 1)?;
        assert_eq!(cache.complete_refetch(ticket, 100)?, RefetchOutcome::Discarded);
        assert_eq!(cache.read(&key())?, Some(2));
        Ok(())
    }

    #[test]
    fn test_cancel_pending_discards_without_write() -> CacheResult<()> {
        let cache = Cache::with_defaults();
        cache.write(key(), 1)?;
        let ticket = cache.begin_refetch(&key())?;
        cache.cancel_pending(&key())?;
        assert_eq!(cache.complete_refetch(ticket, 100)?, RefetchOutcome::Discarded);
        assert_eq!(cache.read(&key())?, Some(1));

        // A ticket issued after the cancel is honoured
        let ticket = cache.begin_refetch(&key())?;
        assert!(cache.complete_refetch(ticket, 100)?.is_applied());
        Ok(())
    }

    #[test]
    fn test_confirm_only_latest_write() -> CacheResult<()> {
        let cache = Cache::with_defaults();
        let first = cache.apply_optimistic(&key(), |n| n + 1)?;
        let second = cache.apply_optimistic(&key(), |n| n + 1)?;
        assert!(!cache.confirm(&first)?);
        assert!(cache.entry(&key())?.map(|e| e.is_optimistic).unwrap_or(false));

        assert!(cache.confirm(&second)?);
        let entry = cache.entry(&key())?.ok_or(CacheError::LockPoisoned)?;
        assert_eq!(entry.value, 2);
        assert!(!entry.is_optimistic);
        assert_eq!(entry.version, second.applied_version() + 1);
        Ok(())
    }

    #[test]
    fn test_invalidate_marks_stale_until_confirmed() -> CacheResult<()> {
        let cache = Cache::with_defaults();
        assert!(cache.is_stale(&key())?);
        cache.write(key(), 1)?;
        assert!(!cache.is_stale(&key())?);
        cache.invalidate(&key())?;
        assert!(cache.is_stale(&key())?);
        assert_eq!(cache.read(&key())?, Some(1));
        let ticket = cache.begin_refetch(&key())?;
        cache.complete_refetch(ticket, 2)?;
        assert!(!cache.is_stale(&key())?);
        Ok(())
    }

    #[tokio::test]
    async fn test_subscribers_see_changes_in_order() -> CacheResult<()> {
        let cache = Cache::with_defaults();
        let mut rx = cache.subscribe();
        cache.write(key(), 1)?;
        let token = cache.apply_optimistic(&key(), |n| n + 1)?;
        cache.rollback(token)?;
        cache.invalidate(&key())?;

        let mut kinds = Vec::new();
        while let Ok(event) = rx.try_recv() {
            assert_eq!(event.key, key());
            kinds.push(event.kind);
        }
        assert_eq!(
            kinds,
            vec![
                ChangeKind::Written,
                ChangeKind::Optimistic,
                ChangeKind::RolledBack,
                ChangeKind::Invalidated,
            ]
        );
        Ok(())
    }
}
