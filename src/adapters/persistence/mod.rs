//! Persistence Adapters - Small JSON Caches
//!
//! Implements the cache ports with atomic JSON files. No database
//! dependency; both caches are safe to delete by hand.

pub mod capability_cache;
pub mod economy_cache;
pub mod json_file;

pub use capability_cache::FileCapabilityStore;
pub use economy_cache::FileEconomyStore;
