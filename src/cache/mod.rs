//! Content-addressed result cache.
//!
//! This module deduplicates inpainting runs: identical normalized requests
//! map to the same [`CacheKey`], and a stored result is served instead of
//! invoking the engine again.
//!
//! # Architecture
//!
//! * [`key`]: BLAKE3 key derivation over image, mask, prompt and parameters.
//! * [`store`]: Filesystem layout, lookup, write-once saves and invalidation.
//! * [`entry`]: The metadata record kept next to each entry.
//! * [`manager`]: Per-request orchestration on top of the store.
//!
//! # Cache Invalidation
//!
//! Entries are never evicted individually. The cache only grows until it is
//! cleared as a whole with [`CacheStore::invalidate`].

mod atomic;
pub mod entry;
pub mod key;
pub mod manager;
pub mod store;

pub use entry::{EntryMetadata, EntryPaths};
pub use key::{CacheKey, ContentHasher, KEY_HEX_LEN};
pub use manager::{CacheManager, Resolution};
pub use store::{CacheStore, StorageError};
