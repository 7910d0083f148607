//! Mutation coordinator.
//!
//! Drives one user write through the optimistic protocol:
//!
//! 1. cancel outstanding refetches of the key,
//! 2. apply the predicted local effect and keep the snapshot token,
//! 3. issue the remote write (the only suspension point),
//! 4. settle: refetch (or confirm) on success, roll back on failure.
//!
//! Overlapping mutations on one key each run the full sequence and stack
//! their optimistic effects. If an earlier one fails, its rollback restores
//! the value from before it started and so also drops the later mutation's
//! effect until that one settles. Nothing is merged.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex, PoisonError};

use shelf_cache::{OptimisticCache, RefetchOutcome, SnapshotToken};
use tracing::{debug, warn};

use crate::error::{ClientResult, MutationError};
use crate::source::DataSource;

/// Lifecycle of one mutation. Both settled states are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationState {
    Idle,
    /// Local effect applied, remote write in flight.
    Optimistic,
    SettledSuccess,
    SettledFailure,
}

impl MutationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            MutationState::Idle => "idle",
            MutationState::Optimistic => "optimistic",
            MutationState::SettledSuccess => "settled_success",
            MutationState::SettledFailure => "settled_failure",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            MutationState::SettledSuccess | MutationState::SettledFailure
        )
    }

    pub fn can_advance_to(&self, next: MutationState) -> bool {
        matches!(
            (self, next),
            (MutationState::Idle, MutationState::Optimistic)
                | (MutationState::Optimistic, MutationState::SettledSuccess)
                | (MutationState::Optimistic, MutationState::SettledFailure)
        )
    }
}

impl fmt::Display for MutationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a successful mutation brings the cache back to server truth.
pub enum Settlement<V> {
    /// Refetch the key from its source.
    Refetch(Arc<dyn DataSource<V>>),
    /// No read endpoint exists; accept the optimistic value as confirmed.
    Confirm,
}

/// Result of a mutation whose remote write succeeded.
#[derive(Debug, Clone, PartialEq)]
pub struct Settled<T> {
    /// Body returned by the remote write.
    pub response: T,
    /// What happened to the settle refetch. `None` when settling by
    /// confirmation or when the refetch itself failed.
    pub refetch: Option<RefetchOutcome>,
}

/// Runs mutations against one cache.
pub struct MutationCoordinator<K, V> {
    cache: Arc<OptimisticCache<K, V>>,
    settlement: Settlement<V>,
    in_flight: Mutex<HashMap<K, usize>>,
}

impl<K, V> MutationCoordinator<K, V>
where
    K: Eq + Hash + Clone + fmt::Display + Send + Sync,
    V: Clone + Default + Send + Sync,
{
    pub fn new(cache: Arc<OptimisticCache<K, V>>, settlement: Settlement<V>) -> Self {
        Self {
            cache,
            settlement,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Coordinator that settles successful writes by refetching from `source`.
    pub fn with_refetch(cache: Arc<OptimisticCache<K, V>>, source: Arc<dyn DataSource<V>>) -> Self {
        Self::new(cache, Settlement::Refetch(source))
    }

    /// Coordinator that settles successful writes by confirming the optimistic value.
    pub fn with_confirm(cache: Arc<OptimisticCache<K, V>>) -> Self {
        Self::new(cache, Settlement::Confirm)
    }

    pub fn cache(&self) -> &Arc<OptimisticCache<K, V>> {
        &self.cache
    }

    /// Whether a mutation on `key` is between its optimistic apply and its settle.
    pub fn is_pending(&self, key: &K) -> bool {
        self.lock_in_flight().contains_key(key)
    }

    /// Run a mutation. `remote` is not polled until the optimistic value is in place.
    pub async fn execute<T, F, Fut>(
        &self,
        key: K,
        transform: F,
        remote: Fut,
    ) -> Result<Settled<T>, MutationError>
    where
        F: FnOnce(V) -> V,
        Fut: Future<Output = ClientResult<T>>,
    {
        let guard = self.enter(&key);
        let result = self.run(key, transform, remote).await;
        drop(guard);
        result
    }

    /// Like [`execute`](Self::execute), but returns `Ok(None)` without doing
    /// anything if a mutation on `key` is already in flight.
    pub async fn execute_exclusive<T, F, Fut>(
        &self,
        key: K,
        transform: F,
        remote: Fut,
    ) -> Result<Option<Settled<T>>, MutationError>
    where
        F: FnOnce(V) -> V,
        Fut: Future<Output = ClientResult<T>>,
    {
        let Some(guard) = self.try_enter(&key) else {
            debug!(key = %key, "Mutation already in flight; ignoring");
            return Ok(None);
        };
        let result = self.run(key, transform, remote).await;
        drop(guard);
        result.map(Some)
    }

    async fn run<T, F, Fut>(&self, key: K, transform: F, remote: Fut) -> Result<Settled<T>, MutationError>
    where
        F: FnOnce(V) -> V,
        Fut: Future<Output = ClientResult<T>>,
    {
        let mut state = Tracker::new(&key);

        self.cache.cancel_pending(&key)?;
        let token = self.cache.apply_optimistic(&key, transform)?;
        state.advance(MutationState::Optimistic);

        match remote.await {
            Ok(response) => {
                let refetch = self.settle_success(&key, &token).await?;
                state.advance(MutationState::SettledSuccess);
                Ok(Settled { response, refetch })
            }
            Err(source) => {
                // The remote failure is what the caller sees, even if the
                // local cleanup fails too.
                match self.cache.rollback(token) {
                    Ok(version) => {
                        warn!(key = %key, version, error = %source, "Remote write failed, rolled back")
                    }
                    Err(err) => {
                        warn!(key = %key, error = %source, cache_error = %err, "Remote write failed, rollback failed")
                    }
                }
                if let Err(err) = self.cache.invalidate(&key) {
                    warn!(key = %key, error = %err, "Failed to mark key stale after rollback");
                }
                state.advance(MutationState::SettledFailure);
                Err(MutationError::Remote {
                    key: key.to_string(),
                    source,
                })
            }
        }
    }

    async fn settle_success(
        &self,
        key: &K,
        token: &SnapshotToken<K, V>,
    ) -> Result<Option<RefetchOutcome>, MutationError> {
        match &self.settlement {
            Settlement::Refetch(source) => match refetch(&self.cache, key, source.as_ref()).await {
                Ok(outcome) => Ok(Some(outcome)),
                Err(err) => {
                    // Not escalated; the optimistic value stays until the next read refetches.
                    warn!(key = %key, error = %err, "Settle refetch failed");
                    Ok(None)
                }
            },
            Settlement::Confirm => {
                if !self.cache.confirm(token)? {
                    debug!(key = %key, "Newer write present, leaving it unconfirmed");
                }
                Ok(None)
            }
        }
    }

    fn lock_in_flight(&self) -> std::sync::MutexGuard<'_, HashMap<K, usize>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn enter(&self, key: &K) -> InFlight<'_, K> {
        *self.lock_in_flight().entry(key.clone()).or_insert(0) += 1;
        InFlight {
            in_flight: &self.in_flight,
            key: key.clone(),
        }
    }

    fn try_enter(&self, key: &K) -> Option<InFlight<'_, K>> {
        let mut in_flight = self.lock_in_flight();
        if in_flight.contains_key(key) {
            return None;
        }
        in_flight.insert(key.clone(), 1);
        Some(InFlight {
            in_flight: &self.in_flight,
            key: key.clone(),
        })
    }
}

/// Fetch `key` from `source` and store it unless newer state arrived meanwhile.
pub async fn refetch<K, V>(
    cache: &OptimisticCache<K, V>,
    key: &K,
    source: &dyn DataSource<V>,
) -> ClientResult<RefetchOutcome>
where
    K: Eq + Hash + Clone + fmt::Display,
    V: Clone,
{
    let ticket = cache.begin_refetch(key)?;
    let value = source.fetch().await?;
    let outcome = cache.complete_refetch(ticket, value)?;
    debug!(key = %key, applied = outcome.is_applied(), "Refetch completed");
    Ok(outcome)
}

/// Decrements the in-flight count for a key when the mutation ends,
/// including when its future is dropped mid-flight.
struct InFlight<'a, K: Eq + Hash> {
    in_flight: &'a Mutex<HashMap<K, usize>>,
    key: K,
}

impl<K: Eq + Hash> Drop for InFlight<'_, K> {
    fn drop(&mut self) {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(count) = in_flight.get_mut(&self.key) {
            *count -= 1;
            if *count == 0 {
                in_flight.remove(&self.key);
            }
        }
    }
}

struct Tracker {
    key: String,
    state: MutationState,
}

impl Tracker {
    fn new(key: &impl fmt::Display) -> Self {
        Self {
            key: key.to_string(),
            state: MutationState::Idle,
        }
    }

    fn advance(&mut self, next: MutationState) {
        debug_assert!(self.state.can_advance_to(next));
        debug!(key = %self.key, from = %self.state, to = %next, "Mutation state");
        self.state = next;
    }
}
