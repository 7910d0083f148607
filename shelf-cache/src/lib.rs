//! Optimistic cache layer.
//!
//! Holds the last known value per key together with a monotonically
//! increasing version, and lets callers speculate on top of it:
//!
//! - [`OptimisticCache::apply_optimistic`] edits a value locally and hands
//!   back a [`SnapshotToken`] that can restore the value it replaced.
//! - [`OptimisticCache::begin_refetch`] tags an outgoing fetch with the
//!   entry's version; [`OptimisticCache::complete_refetch`] drops the
//!   result if the entry was written or the fetch was cancelled meanwhile.
//!
//! The cache never fetches anything itself. Refetching is driven by the
//! caller, which is why [`OptimisticCache::invalidate`] only marks entries
//! stale.
//!
//! # Example
//!
//! ```ignore
//! let cache = OptimisticCache::<&str, u32>::with_defaults();
//! cache.write("cart", 2)?;
//!
//! let token = cache.apply_optimistic(&"cart", |count| count + 1)?;
//! assert_eq!(cache.read(&"cart")?, Some(3));
//!
//! // The backend rejected the write
//! cache.rollback(token)?;
//! assert_eq!(cache.read(&"cart")?, Some(2));
//! ```

pub mod entry;
pub mod error;
pub mod events;
pub mod optimistic;

pub use entry::{CacheEntry, RefetchOutcome, RefetchTicket, SnapshotToken};
pub use error::{CacheError, CacheResult};
pub use events::{CacheEvent, ChangeKind};
pub use optimistic::{CacheConfig, OptimisticCache};
