//! Core record trait that all cacheable entities must implement.

use crate::database::Row;
use crate::error::{Error, Result};
use crate::value::Value;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Schema surface and hydration boundary for a cached entity type.
///
/// The trait tells the engine which table to probe, which column carries the
/// freshness timestamp, and how to turn a database row back into a typed
/// record. Hydration itself stays on the implementor's side of the fence;
/// the engine only ever calls through this interface.
///
/// # Example
///
/// ```
/// use serde::{Deserialize, Serialize};
/// use lastmod_cache::{Record, Result, Row, Value};
/// use lastmod_cache::record::column_value;
///
/// #[derive(Clone, Serialize, Deserialize)]
/// pub struct Widget {
///     pub id: i64,
///     pub name: String,
///     pub updated_at: f64,
/// }
///
/// impl Record for Widget {
///     fn table() -> &'static str {
///         "widgets"
///     }
///
///     fn columns() -> &'static [&'static str] {
///         &["id", "name", "updated_at"]
///     }
///
///     fn id(&self) -> Value {
///         Value::Int(self.id)
///     }
///
///     fn timestamp(&self) -> Value {
///         Value::Float(self.updated_at)
///     }
///
///     fn set_timestamp(&mut self, ts: Value) {
///         if let Some(f) = ts.as_f64() {
///             self.updated_at = f;
///         }
///     }
///
///     fn from_row(row: &Row) -> Result<Self> {
///         Ok(Widget {
///             id: column_value(row, "id")?.as_i64().unwrap_or_default(),
///             name: column_value(row, "name")?.as_str().unwrap_or_default().to_string(),
///             updated_at: column_value(row, "updated_at")?.as_f64().unwrap_or_default(),
///         })
///     }
/// }
/// ```
pub trait Record: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {
    /// Backing table name.
    fn table() -> &'static str;

    /// Primary key column.
    fn primary_key() -> &'static str {
        "id"
    }

    /// Column carrying the freshness signal. May be a genuine timestamp or a
    /// numeric monotonically increasing surrogate; the engine never assumes
    /// calendar semantics.
    fn timestamp_column() -> &'static str {
        "updated_at"
    }

    /// All column names, used to validate dynamic finder lookups.
    fn columns() -> &'static [&'static str];

    /// Primary key value of this record.
    fn id(&self) -> Value;

    /// Current timestamp-column value of this record.
    fn timestamp(&self) -> Value;

    /// Update the in-memory timestamp field after a forced-staleness write.
    fn set_timestamp(&mut self, ts: Value);

    /// Hydrate a record from a database row.
    fn from_row(row: &Row) -> Result<Self>;

    /// Whether `column` exists on this record's schema.
    fn has_column(column: &str) -> bool {
        Self::columns().contains(&column)
    }
}

/// Fetch a column from a row, failing with [`Error::MissingColumn`] when the
/// row does not carry it. Convenience for `from_row` implementations.
pub fn column_value<'a>(row: &'a Row, column: &str) -> Result<&'a Value> {
    row.get(column).ok_or_else(|| Error::MissingColumn {
        column: column.to_string(),
    })
}
