//! Persistent catalog cache.
//!
//! - `KeyValueStore`: synchronous string storage (SQLite or in-memory)
//! - `CacheStore`: `{fetchedAt, payload}` envelope with a provenance tag,
//!   TTL freshness and a versioned key layout
//! - `CacheRead`: tells a cold cache apart from a corrupt one

mod kv;
mod store;
mod types;

pub use kv::{KeyValueStore, MemoryKv, SqliteKv};
pub use store::{CacheStore, DEFAULT_KEY, DEFAULT_VERSION};
pub use types::{CacheEntry, CacheRead, Provenance, Resolved};
