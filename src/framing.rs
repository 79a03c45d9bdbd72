//! Distributed record framing and key building.
//!
//! Wire format is little-endian, fixed-width header fields followed by an
//! optional serialized value. This module is deliberately independent of
//! the pluggable value `Serializer`: framing (how the core lays bytes on
//! the wire) and value serialization (how the caller's type becomes bytes)
//! are separate concerns — "options bitfield / creation time / eviction
//! time" is core-owned, "serialized value" is caller-owned.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::error::CacheError;

/// Bumped on any change to the framing layout. Readers that see an unknown
/// version treat the record as a read error, never as a miss. Timestamps
/// are signed 64-bit unix seconds throughout; header version 2 carries the
/// source `time_to_live` directly instead of a grace-inflated eviction
/// time, so a decoded record reports the same TTL it was written with.
pub const HEADER_VERSION: u16 = 2;

/// Currently-defined options bits. The field exists so future framing
/// changes (e.g. compression) don't require a header version bump.
const OPTIONS_NONE: u32 = 0;

/// A decoded distributed-cache record, prior to value deserialization.
///
/// `time_to_live` is the real, un-inflated TTL the entry was created with —
/// the same value `CacheEntry::is_stale` uses. The physical store's grace
/// window past this TTL (so a stale record can still serve as a fallback
/// while the source recovers) is a property of the byte-level TTL passed
/// to [`crate::traits::L2Store::set`], not of this record: it never round-
/// trips through `decode`, so it can't leak into the `CacheEntry` handed
/// back to the coordinator.
///
/// Kept separate from `CacheEntry<V>` because framing must be decodable
/// even when the caller-supplied value deserialization later fails (so the
/// L2 adapter can distinguish "bad header" from "bad value bytes", both of
/// which downgrade to `Error`, but only the latter needs the raw payload
/// to attempt decoding).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistributedRecord {
    pub creation_time: SystemTime,
    pub time_to_live: Duration,
    pub value_bytes: Vec<u8>,
    pub has_value: bool,
}

fn to_unix_seconds(t: SystemTime) -> i64 {
    match t.duration_since(UNIX_EPOCH) {
        Ok(d) => i64::try_from(d.as_secs()).unwrap_or(i64::MAX),
        Err(e) => -i64::try_from(e.duration().as_secs()).unwrap_or(i64::MIN),
    }
}

fn from_unix_seconds(secs: i64) -> SystemTime {
    if secs >= 0 {
        UNIX_EPOCH + Duration::from_secs(secs as u64)
    } else {
        UNIX_EPOCH - Duration::from_secs(secs.unsigned_abs())
    }
}

impl DistributedRecord {
    pub fn new(
        has_value: bool,
        value_bytes: Vec<u8>,
        creation_time: SystemTime,
        time_to_live: Duration,
    ) -> Self {
        Self {
            creation_time,
            time_to_live,
            value_bytes,
            has_value,
        }
    }

    /// Encode: 4-byte options, 8-byte signed creation time, 8-byte
    /// unsigned TTL in whole seconds, then the value bytes (empty when
    /// `has_value` is false).
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(4 + 8 + 8 + self.value_bytes.len());
        buf.put_u32_le(OPTIONS_NONE);
        buf.put_i64_le(to_unix_seconds(self.creation_time));
        buf.put_u64_le(self.time_to_live.as_secs());
        if self.has_value {
            buf.put_slice(&self.value_bytes);
        }
        buf.freeze()
    }

    /// Decode a frame written with the current `HEADER_VERSION`. The
    /// options bitfield is read but not interpreted (only "none" is
    /// currently defined); an unrecognized record shape is a decode error,
    /// never a miss.
    ///
    /// `has_value` is recovered from whether any value bytes remain after
    /// the fixed header — a zero-length payload means the entry was
    /// value-less when written.
    pub fn decode(mut bytes: Bytes) -> Result<Self, CacheError> {
        if bytes.len() < 20 {
            return Err(CacheError::MalformedRecord(format!(
                "expected at least 20 header bytes, got {}",
                bytes.len()
            )));
        }
        let _options = bytes.get_u32_le();
        let creation_time = from_unix_seconds(bytes.get_i64_le());
        let time_to_live = Duration::from_secs(bytes.get_u64_le());
        let has_value = bytes.has_remaining();
        let value_bytes = bytes.to_vec();
        Ok(Self {
            creation_time,
            time_to_live,
            value_bytes,
            has_value,
        })
    }
}

/// Builds the distributed key: `"{optional_prefix|}{cache_name}|{header_version}/{schema_version}|{stringified_key}"`.
///
/// No escaping or hashing is applied — the core trusts the serializer's
/// `stringify_key` to produce a stable, collision-free string.
pub fn build_distributed_key(
    key_prefix: &str,
    cache_name: &str,
    schema_version: u32,
    stringified_key: &str,
) -> String {
    let mut key = String::with_capacity(
        key_prefix.len() + cache_name.len() + stringified_key.len() + 16,
    );
    if !key_prefix.is_empty() {
        key.push_str(key_prefix);
        key.push('|');
    }
    key.push_str(cache_name);
    key.push('|');
    key.push_str(&HEADER_VERSION.to_string());
    key.push('/');
    key.push_str(&schema_version.to_string());
    key.push('|');
    key.push_str(stringified_key);
    key
}
