//! Change notifications published by the cache.

/// Why a key changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// Unconditional write of a confirmed value.
    Written,
    /// Local speculative edit.
    Optimistic,
    /// A snapshot token restored an earlier value.
    RolledBack,
    /// The entry was marked stale.
    Invalidated,
    /// A refetch result replaced the entry.
    Refetched,
}

/// Published to subscribers after every change to a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEvent<K> {
    pub key: K,
    pub version: u64,
    pub kind: ChangeKind,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Written => "written",
            ChangeKind::Optimistic => "optimistic",
            ChangeKind::RolledBack => "rolled_back",
            ChangeKind::Invalidated => "invalidated",
            ChangeKind::Refetched => "refetched",
        }
    }
}
