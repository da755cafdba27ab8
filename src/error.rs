//! Error types for all cache operations.

use crate::value::Value;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by lookups, probes, and the mutation hook.
///
/// All of these surface to the caller when a [`LazyResult`](crate::LazyResult)
/// is first accessed, never at construction time. None are retried
/// internally; a cache-layer retry could mask a genuinely absent row as a
/// repeated freshness-probe race.
///
/// The enum is `Clone` so a resolved `LazyResult` can hand the same failure
/// back on every subsequent access.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// A dynamic finder was called with the wrong number of values.
    #[error("wrong number of finder arguments for {entity}: expected {expected}, got {given}")]
    InvalidArgument {
        entity: String,
        expected: usize,
        given: usize,
    },

    /// A dynamic finder named a column that does not exist on the record's
    /// schema. Distinct from [`finder::FinderName::parse`](crate::finder::FinderName::parse)
    /// returning `None`, which means the name is not a finder at all.
    #[error("finder references unknown column `{column}` on {entity}")]
    UnknownOperation { entity: String, column: String },

    /// One or more explicitly requested ids were absent after the fetch.
    /// Raised even when the fetch itself was a cache hit.
    #[error("records not found in {entity}: {ids:?}")]
    NotFound { entity: String, ids: Vec<Value> },

    /// The cache backend failed on a get or put. Never silently degraded
    /// into a forced miss.
    #[error("cache backend failure: {0}")]
    BackendFailure(String),

    /// The underlying query, hydration source, or forced-timestamp write
    /// failed.
    #[error("database failure: {0}")]
    PersistenceFailure(String),

    /// A cache entry could not be serialized for storage.
    #[error("cache entry serialization failed: {0}")]
    Serialization(String),

    /// A cache entry payload could not be deserialized.
    #[error("cache entry deserialization failed: {0}")]
    Deserialization(String),

    /// A stored entry is missing the envelope magic or is truncated.
    #[error("invalid cache entry envelope")]
    InvalidCacheEntry,

    /// A stored entry was written under a different schema version.
    #[error("cache entry schema version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },

    /// A row handed to hydration lacks a required column.
    #[error("row is missing column `{column}`")]
    MissingColumn { column: String },
}
