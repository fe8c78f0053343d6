//! Client-side tiers in read order: memory, then the durable file.

use std::path::Path;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::durable::DurableTier;
use crate::entry::{CacheEntry, CacheError, EntryPatch};
use crate::memory::MemoryTier;
use crate::tier::CacheTier;

pub struct LocalCache {
    memory: MemoryTier,
    durable: Option<DurableTier>,
}

impl LocalCache {
    /// Memory only, nothing survives the process.
    pub fn in_memory() -> Self {
        Self {
            memory: MemoryTier::new(),
            durable: None,
        }
    }

    pub fn with_durable_dir(dir: &Path) -> Result<Self, CacheError> {
        Ok(Self {
            memory: MemoryTier::new(),
            durable: Some(DurableTier::open(dir)?),
        })
    }

    pub fn memory(&self) -> &MemoryTier {
        &self.memory
    }

    /// Memory hit short-circuits; a durable hit is promoted into memory.
    /// Durable-tier errors count as a miss.
    pub fn get(&self, key: &str, now: DateTime<Utc>) -> Option<CacheEntry> {
        if let Ok(Some(entry)) = self.memory.lookup(key, now) {
            debug!(key, "Local memory hit");
            return Some(entry);
        }

        let durable = self.durable.as_ref()?;
        match durable.lookup(key, now) {
            Ok(Some(entry)) => {
                debug!(key, "Durable hit, promoting to memory");
                if let Err(e) = self.memory.put(entry.clone()) {
                    warn!(tier = self.memory.name(), "Failed to promote {} into memory: {}", key, e);
                }
                Some(entry)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(tier = durable.name(), "Cache read failed for {}: {}", key, e);
                None
            }
        }
    }

    /// Writes through both tiers. A durable write failure is logged and
    /// the memory copy is kept.
    pub fn store(&self, entry: CacheEntry) {
        if let Some(durable) = &self.durable {
            if let Err(e) = durable.put(entry.clone()) {
                warn!(tier = durable.name(), "Cache write failed for {}: {}", entry.key, e);
            }
        }
        if let Err(e) = self.memory.put(entry) {
            warn!(tier = self.memory.name(), "Cache write failed: {}", e);
        }
    }

    /// Applies `patch` to every tier holding `key`. Returns whether any
    /// tier changed.
    pub fn patch(&self, key: &str, patch: &EntryPatch) -> bool {
        let mut changed = self.memory.patch(key, patch).unwrap_or(false);
        if let Some(durable) = &self.durable {
            match durable.patch(key, patch) {
                Ok(updated) => changed |= updated,
                Err(e) => warn!(tier = durable.name(), "Cache patch failed for {}: {}", key, e),
            }
        }
        changed
    }

    /// Drops the memory tier, as when the user leaves the view.
    pub fn clear_memory(&self) {
        self.memory.clear();
    }
}
