//! Three-tier research cache.
//!
//! * [`MemoryTier`]: process-local, lost on restart.
//! * [`DurableTier`]: client-local JSON file, survives restarts.
//! * [`SqliteTier`]: authoritative shared store with read-time expiry.
//!
//! All tiers implement [`CacheTier`]. Expired rows are never evicted; a
//! lookup simply ignores them until a newer `put` overwrites the key.

pub mod durable;
pub mod entry;
pub mod local;
pub mod memory;
pub mod sqlite;
pub mod tier;

pub use durable::DurableTier;
pub use entry::{CacheEntry, CacheError, EntryPatch};
pub use local::LocalCache;
pub use memory::MemoryTier;
pub use sqlite::SqliteTier;
pub use tier::CacheTier;
