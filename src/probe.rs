//! Minimal-cost freshness probes.
//!
//! A probe never fetches full rows. Set lookups get one table-wide
//! aggregate; single-row lookups get the primary key and timestamp of the
//! first matching row, nothing else.

use crate::database::Database;
use crate::error::Result;
use crate::query::Filter;
use crate::record::Record;
use crate::value::Value;

/// The freshness fingerprint a probe observed.
#[derive(Debug, Clone, PartialEq)]
pub enum FreshnessSignal {
    /// Table-wide signal for set lookups. `max_timestamp` is `None` for an
    /// empty table.
    Set {
        max_timestamp: Option<Value>,
        row_count: u64,
    },
    /// Per-row signal for single-row lookups. Both fields are `None` when no
    /// row matches the filter right now.
    First {
        row_id: Option<Value>,
        timestamp: Option<Value>,
    },
}

impl FreshnessSignal {
    pub fn row_id(&self) -> Option<&Value> {
        match self {
            FreshnessSignal::First { row_id, .. } => row_id.as_ref(),
            FreshnessSignal::Set { .. } => None,
        }
    }
}

/// Issues freshness queries against the database collaborator.
pub struct FreshnessProbe<'a, D: Database> {
    database: &'a D,
}

impl<'a, D: Database> FreshnessProbe<'a, D> {
    pub fn new(database: &'a D) -> Self {
        FreshnessProbe { database }
    }

    /// Table-wide `MAX(timestamp), COUNT(*)` signal.
    ///
    /// Deliberately ignores any filter: scoping the check to the filter
    /// would re-run the full predicate just to read a timestamp, defeating
    /// the cost savings. The coarser table-wide signal is still correct —
    /// any write to the table invalidates every cached set lookup on it.
    ///
    /// Timestamp-column precision is the final line of defense: two writes
    /// within one clock tick that leave the row count unchanged produce the
    /// same signal. Callers needing stronger guarantees should back the
    /// timestamp column with a monotonic counter.
    pub async fn probe_set<R: Record>(&self) -> Result<FreshnessSignal> {
        let (max_timestamp, row_count) = self
            .database
            .aggregate(R::table(), R::timestamp_column())
            .await?;
        debug!(
            "» freshness probe {}: max {:?}, {} rows",
            R::table(),
            max_timestamp,
            row_count
        );
        Ok(FreshnessSignal::Set {
            max_timestamp,
            row_count,
        })
    }

    /// Primary key + timestamp of the first row matching `filter`. Ordering
    /// is the caller's hint if any; first physical match otherwise.
    pub async fn probe_first<R: Record>(
        &self,
        filter: &Filter,
        order: Option<&str>,
    ) -> Result<FreshnessSignal> {
        let columns = [R::primary_key(), R::timestamp_column()];
        let row = self
            .database
            .select_first(R::table(), &columns, filter, order)
            .await?;
        let (row_id, timestamp) = match row {
            Some(row) => (
                row.get(R::primary_key()).cloned(),
                row.get(R::timestamp_column()).cloned(),
            ),
            None => (None, None),
        };
        debug!(
            "» freshness probe {}: first row {:?} at {:?}",
            R::table(),
            row_id,
            timestamp
        );
        Ok(FreshnessSignal::First { row_id, timestamp })
    }
}
