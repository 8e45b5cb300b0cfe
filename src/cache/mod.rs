//! Embedding cache with request coalescing.
//!
//! Resolved vectors live in a size-bounded LRU ([`moka::sync::Cache`]) keyed by
//! [`crate::hashing::Fingerprint`], with optional TTL. Fingerprints being computed live in
//! a separate pending map; a second request for an in-flight fingerprint waits on the
//! first request's result instead of calling the provider again.

mod error;
mod store;


pub use error::{CacheError, CacheResult};
pub use store::{CacheConfig, CacheStats, EmbeddingCache, Resolved};
