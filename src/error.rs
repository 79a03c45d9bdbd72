//! Crate error type.
//!
//! Most downstream failures (L2 transport/decode errors, data-source
//! per-record errors, serializer errors on write) are swallowed by the
//! adapters that see them first and never reach the caller as a `CacheError`.
//! `CacheError` exists for the one category that must surface synchronously:
//! caller misuse.

use thiserror::Error;

/// Errors that can legitimately escape the coordination core to the caller.
#[derive(Debug, Error)]
pub enum CacheError {
    /// A caller passed a key or value that violates a precondition (e.g. a
    /// key whose stringified form is empty, or a value equality contract
    /// that panics). This is the only error category the public API
    /// surfaces synchronously.
    #[error("precondition failed: {0}")]
    Precondition(String),

    /// A distributed record failed to decode: wrong length, unknown header
    /// version, or truncated payload.
    #[error("malformed distributed record: {0}")]
    MalformedRecord(String),
}
