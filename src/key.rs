//! Fingerprinted cache key construction.
//!
//! A key is a structural composite of the normalized query shape and the
//! freshness signal observed at lookup time. Key identity itself encodes
//! validity: any relevant insert, update, or delete moves the signal and
//! with it the key, so stale entries are simply never addressed again.

use crate::probe::FreshnessSignal;
use crate::query::{CacheOptions, Filter, QueryKind, QueryShape, RawSql};
use crate::value::Value;
use serde::Serialize;

use crate::error::{Error, Result};

/// A structural cache key.
///
/// Field order is fixed by the struct definition and condition maps are
/// `BTreeMap`s, so [`CacheKey::canonical`] is deterministic: equal
/// shapes and signals always produce a bit-identical canonical form.
///
/// The namespace participates in key identity for storage routing only; it
/// plays no part in invalidation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheKey {
    class: &'static str,
    method: QueryKind,
    conditions: Filter,
    sql: Option<RawSql>,
    order: Option<String>,
    limit: Option<u64>,
    include: Vec<String>,
    updated_at: Option<serde_json::Value>,
    row_count: Option<u64>,
    row_id: Option<Value>,
    namespace: Option<String>,
}

impl CacheKey {
    /// Deterministic serialized form, used by backends that want a flat
    /// string key.
    pub fn canonical(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::Serialization(e.to_string()))
    }
}

/// Pure key derivation; no I/O.
pub struct KeyBuilder;

impl KeyBuilder {
    /// Derive the key for a shape under an observed freshness signal.
    pub fn build(shape: &QueryShape, signal: &FreshnessSignal, options: &CacheOptions) -> CacheKey {
        let (updated_at, row_count, row_id) = match signal {
            FreshnessSignal::Set {
                max_timestamp,
                row_count,
            } => (
                max_timestamp.as_ref().and_then(timestamp_repr),
                Some(*row_count),
                None,
            ),
            FreshnessSignal::First { row_id, timestamp } => (
                timestamp.as_ref().and_then(timestamp_repr),
                None,
                row_id.clone(),
            ),
        };
        CacheKey {
            class: shape.entity(),
            method: shape.kind(),
            conditions: shape.filter().clone(),
            sql: shape.sql().cloned(),
            order: shape.order().map(str::to_string),
            limit: shape.limit(),
            include: shape.include().to_vec(),
            updated_at,
            row_count,
            row_id,
            namespace: options.namespace.clone(),
        }
    }
}

/// Normalize a timestamp value so different in-memory representations of the
/// same instant collide: numeric kinds become one f64 form, text surrogates
/// stay verbatim.
fn timestamp_repr(ts: &Value) -> Option<serde_json::Value> {
    match ts {
        Value::Text(s) => Some(serde_json::Value::String(s.clone())),
        other => other
            .as_f64()
            .and_then(serde_json::Number::from_f64)
            .map(serde_json::Value::Number),
    }
}
