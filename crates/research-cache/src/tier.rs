use chrono::{DateTime, Utc};

use crate::entry::{CacheEntry, CacheError, EntryPatch};

/// Common contract of every cache tier.
pub trait CacheTier: Send + Sync {
    fn name(&self) -> &'static str;

    /// The stored row regardless of freshness.
    fn get(&self, key: &str) -> Result<Option<CacheEntry>, CacheError>;

    /// Upsert keyed by `entry.key`. Overwrites an existing row, keeping its
    /// steps when `entry.steps` is `None`.
    fn put(&self, entry: CacheEntry) -> Result<(), CacheError>;

    /// Stores narration steps: updates the row's steps if one exists,
    /// otherwise inserts `placeholder`. Never touches an existing artifact.
    fn put_steps(&self, placeholder: CacheEntry) -> Result<(), CacheError>;

    /// Partial update, last write wins. Returns whether a row was changed;
    /// a missing row is not an error.
    fn patch(&self, key: &str, patch: &EntryPatch) -> Result<bool, CacheError>;

    /// A live artifact entry, or `None` for a miss. Expired rows still
    /// exist but are misses.
    fn lookup(&self, key: &str, now: DateTime<Utc>) -> Result<Option<CacheEntry>, CacheError> {
        Ok(self.get(key)?.filter(|entry| entry.is_hit(now)))
    }

    /// Steps for `key`, ignoring artifact presence and freshness.
    fn lookup_steps(&self, key: &str) -> Result<Option<Vec<String>>, CacheError> {
        Ok(self.get(key)?.and_then(|entry| entry.steps))
    }
}
