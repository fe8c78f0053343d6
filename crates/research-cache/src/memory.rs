//! Process-local tier.
//!
//! Uses `DashMap` so concurrent readers never contend on a single lock.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::entry::{CacheEntry, CacheError, EntryPatch};
use crate::tier::CacheTier;

#[derive(Debug, Default)]
pub struct MemoryTier {
    entries: DashMap<String, CacheEntry>,
}

impl MemoryTier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}

impl CacheTier for MemoryTier {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn get(&self, key: &str) -> Result<Option<CacheEntry>, CacheError> {
        Ok(self.entries.get(key).map(|e| e.value().clone()))
    }

    fn put(&self, entry: CacheEntry) -> Result<(), CacheError> {
        match self.entries.entry(entry.key.clone()) {
            Entry::Occupied(mut slot) => {
                let merged = entry.merged_over(Some(slot.get()));
                slot.insert(merged);
            }
            Entry::Vacant(slot) => {
                slot.insert(entry);
            }
        }
        Ok(())
    }

    fn put_steps(&self, placeholder: CacheEntry) -> Result<(), CacheError> {
        match self.entries.entry(placeholder.key.clone()) {
            Entry::Occupied(mut slot) => {
                slot.get_mut().steps = placeholder.steps;
            }
            Entry::Vacant(slot) => {
                slot.insert(placeholder);
            }
        }
        Ok(())
    }

    fn patch(&self, key: &str, patch: &EntryPatch) -> Result<bool, CacheError> {
        Ok(self
            .entries
            .get_mut(key)
            .map(|mut entry| entry.apply(patch))
            .unwrap_or(false))
    }
}
