//! Client-durable tier backed by a single JSON file.
//!
//! The whole map is rewritten on every mutation; it only ever holds the
//! handful of questions one client has opened.

use std::collections::HashMap;
use std::fs::{create_dir_all, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::warn;

use crate::entry::{CacheEntry, CacheError, EntryPatch};
use crate::tier::CacheTier;

const STATE_FILE: &str = "research-cache.json";

pub struct DurableTier {
    state_path: PathBuf,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl DurableTier {
    /// Opens (or creates) the cache file under `dir`. A corrupt file starts
    /// an empty cache rather than failing.
    pub fn open(dir: &Path) -> Result<Self, CacheError> {
        create_dir_all(dir)?;
        let state_path = dir.join(STATE_FILE);
        let entries = if state_path.exists() {
            let mut file = File::open(&state_path)?;
            let mut raw = String::new();
            file.read_to_string(&mut raw)?;
            serde_json::from_str::<HashMap<String, CacheEntry>>(&raw).unwrap_or_else(|e| {
                warn!("Discarding unreadable durable cache {}: {}", state_path.display(), e);
                HashMap::new()
            })
        } else {
            HashMap::new()
        };

        Ok(Self {
            state_path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.state_path
    }

    fn persist(&self, entries: &HashMap<String, CacheEntry>) -> Result<(), CacheError> {
        let data = serde_json::to_string_pretty(entries)?;
        let mut file = OpenOptions::new()
            .create(true)
            .truncate(true)
            .write(true)
            .open(&self.state_path)?;
        file.write_all(data.as_bytes())?;
        file.flush()?;
        Ok(())
    }

    /// The in-memory map only changes once the file write succeeded.
    fn mutate<T>(&self, f: impl FnOnce(&mut HashMap<String, CacheEntry>) -> T) -> Result<T, CacheError> {
        let mut entries = self.entries.lock().map_err(|_| CacheError::Poisoned)?;
        let mut next = entries.clone();
        let result = f(&mut next);
        self.persist(&next)?;
        *entries = next;
        Ok(result)
    }
}

impl CacheTier for DurableTier {
    fn name(&self) -> &'static str {
        "durable"
    }

    fn get(&self, key: &str) -> Result<Option<CacheEntry>, CacheError> {
        let entries = self.entries.lock().map_err(|_| CacheError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn put(&self, entry: CacheEntry) -> Result<(), CacheError> {
        self.mutate(|entries| {
            let key = entry.key.clone();
            let merged = entry.merged_over(entries.get(&key));
            entries.insert(key, merged);
        })
    }

    fn put_steps(&self, placeholder: CacheEntry) -> Result<(), CacheError> {
        self.mutate(|entries| match entries.get_mut(&placeholder.key) {
            Some(existing) => existing.steps = placeholder.steps,
            None => {
                entries.insert(placeholder.key.clone(), placeholder);
            }
        })
    }

    fn patch(&self, key: &str, patch: &EntryPatch) -> Result<bool, CacheError> {
        self.mutate(|entries| entries.get_mut(key).map(|e| e.apply(patch)).unwrap_or(false))
    }
}
