//! Conditional response caching.
//!
//! The pieces, in the order a request meets them:
//!
//! - [`evaluator`] — answers `If-None-Match` with `304` when the stored
//!   fingerprint for the addressed resource matches.
//! - [`classify`] — sorts an outgoing payload into a [`Shape`].
//! - [`fingerprint`] — hashes the classified payload into a [`Fingerprint`].
//! - [`headers`] — emits `ETag`, `Cache-Control`, `Pragma`, `Last-Modified`
//!   and records the fingerprint.
//! - [`store`] — the [`CacheStore`] contract and the tenant-scoped [`EtagCache`].
//! - [`invalidation`] — drops fingerprints when content changes.

pub mod classify;
pub mod evaluator;
pub mod fingerprint;
pub mod headers;
pub mod identity;
pub mod invalidation;
#[cfg(feature = "redis")]
pub mod redis_store;
pub mod store;

pub use classify::{Shape, classify, is_resourceful};
pub use evaluator::{Evaluation, evaluate, parse_entity_tags};
pub use fingerprint::{Fingerprint, fingerprint, values_for_response};
pub use headers::{CacheHeaders, NO_CACHE, decorate, http_date};
pub use identity::{ResourceIdentity, cache_key};
pub use invalidation::{MutationAction, MutationEvent, invalidate};
#[cfg(feature = "redis")]
pub use redis_store::RedisStore;
pub use store::{CacheStore, EtagCache, MemoryStore, StoreError, StoreResult};
