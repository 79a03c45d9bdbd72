//! External collaborator traits: the contracts callers implement to
//! plug in a concrete L1 store, L2 store, value serializer, and data
//! source.
//!
//! # Architecture
//!
//! - `L1Store`: the caller's in-process cache (synchronous from the
//!   coordinator's point of view, but declared `async` so that an
//!   implementation backed by an async lock is not forced to block).
//! - `L2Store`: a byte-level distributed cache. The coordination core never
//!   talks to this directly — it goes through the framing adapter in
//!   [`crate::l2`].
//! - `Serializer`: pluggable value (de)serialization plus key
//!   stringification and a schema version used in the distributed key.
//! - `DataSource`: the upstream source of truth.
//!
//! # Example: custom L1 store
//!
//! ```rust,ignore
//! use tiered_cache_core::{L1Store, CacheEntry, async_trait};
//!
//! struct MyL1Store {
//!     // ...
//! }
//!
//! #[async_trait]
//! impl L1Store<i64> for MyL1Store {
//!     async fn try_get(&self, key: &str) -> Option<CacheEntry<i64>> {
//!         // ...
//!         None
//!     }
//!
//!     async fn set(&self, key: &str, entry: CacheEntry<i64>) {
//!         // ...
//!     }
//!
//!     async fn try_delete(&self, key: &str) -> bool {
//!         false
//!     }
//!
//!     async fn count(&self) -> u64 {
//!         0
//!     }
//! }
//! ```

use std::fmt::Debug;

use async_trait::async_trait;
use futures_util::stream::BoxStream;

use crate::entry::CacheEntry;

/// The caller's in-process cache tier.
///
/// Must be thread-safe and must never panic or return an error: a defective
/// implementation that panics is treated by the adapter as a miss, not
/// propagated. See [`crate::l1::L1Adapter`].
#[async_trait]
pub trait L1Store<V>: Send + Sync
where
    V: Send + Sync,
{
    /// Look up an entry by key. `None` means "not present" — expired
    /// entries may either be physically absent or returned as stale; the
    /// coordinator handles staleness itself.
    async fn try_get(&self, key: &str) -> Option<CacheEntry<V>>;

    /// Store (overwrite) an entry under a key.
    async fn set(&self, key: &str, entry: CacheEntry<V>);

    /// Remove an entry, if present. Returns whether anything was removed.
    async fn try_delete(&self, key: &str) -> bool;

    /// Approximate number of entries currently resident.
    async fn count(&self) -> u64;
}

/// The status an L2 byte-level read can report, before the framing adapter
/// interprets the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum L2RawStatus {
    Hit,
    Miss,
    Error,
}

/// The caller's out-of-process distributed cache tier, at the byte level.
///
/// Implementations report failures through the returned status rather than
/// `Result`, so the framing adapter can downgrade every failure mode
/// (connection error, timeout) to the same `Error` status uniformly.
#[async_trait]
pub trait L2Store: Send + Sync {
    /// Fetch raw bytes for a key. A `Hit` status must be paired with
    /// `Some(bytes)`; `Miss`/`Error` should return `None`.
    async fn get(&self, key: &str) -> (L2RawStatus, Option<Vec<u8>>);

    /// Store raw bytes under a key with an absolute time-to-live. Returns
    /// `false` on any failure (connection, timeout) rather than erroring.
    async fn set(&self, key: &str, bytes: Vec<u8>, ttl: std::time::Duration) -> bool;

    /// Remove a key. Returns `false` on failure; a no-op delete (key was
    /// already absent) still reports success.
    async fn delete(&self, key: &str) -> bool;
}

/// Pluggable value (de)serialization and key stringification.
///
/// `schema_version` is folded into the distributed key so that a writer and
/// reader running incompatible serializer versions address disjoint L2
/// keys rather than colliding.
pub trait Serializer<K, V>: Send + Sync + Debug {
    /// A version tag folded into the distributed key.
    fn schema_version(&self) -> u32;

    /// Render a key to its canonical string form for use in the
    /// distributed key and for logging.
    fn stringify_key(&self, key: &K) -> String;

    /// Serialize a value to bytes. Serializing a value-less entry is
    /// realized by the caller writing zero bytes, not by calling this.
    fn serialize_value(&self, value: &V) -> anyhow::Result<Vec<u8>>;

    /// Deserialize bytes produced by `serialize_value`.
    fn deserialize_value(&self, bytes: &[u8]) -> anyhow::Result<V>;
}

/// A single record yielded by a data-source load.
#[derive(Debug, Clone)]
pub struct SourceRecord<K, V> {
    pub key: K,
    pub value: V,
    pub time_to_live: std::time::Duration,
}

/// A stream of source records, as returned by [`DataSource::load`].
pub type SourceStream<'a, K, V> = BoxStream<'a, anyhow::Result<SourceRecord<K, V>>>;

/// The upstream source of truth behind both cache tiers.
///
/// May emit fewer records than requested (key misses, see the glossary's
/// "key miss"); must not emit a key outside the requested set; TTLs must be
/// non-negative. A `Result` item represents a per-record error — the
/// adapter drops the offending record and continues iterating. An error
/// returned from `load` itself (rather than from the stream) is a fatal
/// load error for the whole batch.
#[async_trait]
pub trait DataSource<K, V>: Send + Sync
where
    K: Send + Sync,
    V: Send + Sync,
{
    /// Open a stream of results for the given keys. Implementations that
    /// fail before producing any stream (e.g. cannot open a connection)
    /// should return `Err` here; failures discovered once iterating have
    /// already started should surface as `Err` items within the stream
    /// instead.
    async fn load<'a>(&'a self, keys: &'a [K]) -> anyhow::Result<SourceStream<'a, K, V>>;
}
