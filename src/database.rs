//! Database collaborator interface and an in-memory implementation.
//!
//! The engine never builds SQL strings itself; it describes what it needs
//! through this trait and the collaborator is responsible for safe quoting
//! and parameterized execution. The in-memory implementation ships in `src/`
//! because every engine test drives it, the same way the in-memory cache
//! backend does.

use crate::error::{Error, Result};
use crate::query::{Filter, FilterValue, QueryShape};
use crate::value::Value;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Arc;
use tokio::sync::RwLock;

/// One database row: column name → value.
pub type Row = BTreeMap<String, Value>;

/// Minimal query surface the cache engine consumes.
pub trait Database: Send + Sync {
    /// One aggregate round trip: `SELECT MAX(max_column), COUNT(*)`.
    /// Returns `(None, 0)` for an empty table.
    fn aggregate(
        &self,
        table: &str,
        max_column: &str,
    ) -> impl std::future::Future<Output = Result<(Option<Value>, u64)>> + Send;

    /// Select only `columns` from the first row matching `filter`, with an
    /// optional order hint. `None` when no row matches.
    fn select_first(
        &self,
        table: &str,
        columns: &[&str],
        filter: &Filter,
        order: Option<&str>,
    ) -> impl std::future::Future<Output = Result<Option<Row>>> + Send;

    /// Run a full query shape and return its rows.
    fn execute(
        &self,
        shape: &QueryShape,
    ) -> impl std::future::Future<Output = Result<Vec<Row>>> + Send;

    /// Write a single column of a single row, bypassing any model-level
    /// validation the collaborator might normally run.
    fn update_column(
        &self,
        table: &str,
        key_column: &str,
        id: &Value,
        column: &str,
        value: &Value,
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// In-memory database with per-operation counters.
///
/// Supports structured conditions, order hints of the form `"col"` /
/// `"col DESC"`, and limits. Raw predicates and explicit SQL are the real
/// collaborator's business and return `PersistenceFailure` here.
#[derive(Clone, Default)]
pub struct InMemoryDatabase {
    tables: Arc<RwLock<HashMap<String, Vec<Row>>>>,
    aggregates: Arc<AtomicUsize>,
    selects: Arc<AtomicUsize>,
    queries: Arc<AtomicUsize>,
}

impl InMemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, table: &str, row: Row) {
        let mut tables = self.tables.write().await;
        tables.entry(table.to_string()).or_default().push(row);
    }

    /// Remove every row whose `column` equals `value`.
    pub async fn delete_where(&self, table: &str, column: &str, value: &Value) {
        let mut tables = self.tables.write().await;
        if let Some(rows) = tables.get_mut(table) {
            rows.retain(|row| row.get(column) != Some(value));
        }
    }

    /// Out-of-band single-column write that the freshness signal cannot see.
    /// Test backdoor for simulating direct storage mutation.
    pub async fn poke(&self, table: &str, key_column: &str, id: &Value, column: &str, value: Value) {
        let mut tables = self.tables.write().await;
        if let Some(rows) = tables.get_mut(table) {
            for row in rows.iter_mut() {
                if row.get(key_column) == Some(id) {
                    row.insert(column.to_string(), value.clone());
                }
            }
        }
    }

    /// Number of aggregate (set freshness probe) round trips so far.
    pub fn aggregate_count(&self) -> usize {
        self.aggregates.load(AtomicOrdering::SeqCst)
    }

    /// Number of single-row (first freshness probe) round trips so far.
    pub fn select_count(&self) -> usize {
        self.selects.load(AtomicOrdering::SeqCst)
    }

    /// Number of full queries executed so far.
    pub fn query_count(&self) -> usize {
        self.queries.load(AtomicOrdering::SeqCst)
    }

    fn matching_rows(rows: &[Row], filter: &Filter) -> Result<Vec<Row>> {
        let mut matched = Vec::new();
        for row in rows {
            if row_matches(row, filter)? {
                matched.push(row.clone());
            }
        }
        Ok(matched)
    }

    fn apply_order(rows: &mut [Row], order: Option<&str>) {
        let Some(order) = order else {
            return;
        };
        let mut parts = order.split_whitespace();
        let Some(column) = parts.next() else {
            return;
        };
        let descending = parts
            .next()
            .is_some_and(|d| d.eq_ignore_ascii_case("desc"));
        rows.sort_by(|a, b| {
            let ordering = match (a.get(column), b.get(column)) {
                (Some(x), Some(y)) => x.compare(y).unwrap_or(Ordering::Equal),
                _ => Ordering::Equal,
            };
            if descending {
                ordering.reverse()
            } else {
                ordering
            }
        });
    }
}

fn row_matches(row: &Row, filter: &Filter) -> Result<bool> {
    match filter {
        Filter::All => Ok(true),
        Filter::Predicate(_) => Err(Error::PersistenceFailure(
            "raw predicates are not supported by the in-memory database".to_string(),
        )),
        Filter::Conditions(conditions) => {
            for (column, condition) in conditions {
                let matched = match condition {
                    FilterValue::One(value) => row.get(column) == Some(value),
                    FilterValue::In(values) => {
                        values.iter().any(|value| row.get(column) == Some(value))
                    }
                    FilterValue::Nested(_) => {
                        return Err(Error::PersistenceFailure(
                            "nested conditions are not supported by the in-memory database"
                                .to_string(),
                        ))
                    }
                };
                if !matched {
                    return Ok(false);
                }
            }
            Ok(true)
        }
    }
}

impl Database for InMemoryDatabase {
    async fn aggregate(&self, table: &str, max_column: &str) -> Result<(Option<Value>, u64)> {
        self.aggregates.fetch_add(1, AtomicOrdering::SeqCst);
        let tables = self.tables.read().await;
        let rows = tables.get(table).map(Vec::as_slice).unwrap_or_default();
        let mut max: Option<Value> = None;
        for row in rows {
            let Some(value) = row.get(max_column) else {
                continue;
            };
            if value.is_null() {
                continue;
            }
            let larger = match &max {
                Some(current) => value.compare(current) == Some(Ordering::Greater),
                None => true,
            };
            if larger {
                max = Some(value.clone());
            }
        }
        Ok((max, rows.len() as u64))
    }

    async fn select_first(
        &self,
        table: &str,
        columns: &[&str],
        filter: &Filter,
        order: Option<&str>,
    ) -> Result<Option<Row>> {
        self.selects.fetch_add(1, AtomicOrdering::SeqCst);
        let tables = self.tables.read().await;
        let rows = tables.get(table).map(Vec::as_slice).unwrap_or_default();
        let mut matched = Self::matching_rows(rows, filter)?;
        Self::apply_order(&mut matched, order);
        Ok(matched.first().map(|row| {
            columns
                .iter()
                .filter_map(|column| {
                    row.get(*column)
                        .map(|value| (column.to_string(), value.clone()))
                })
                .collect()
        }))
    }

    async fn execute(&self, shape: &QueryShape) -> Result<Vec<Row>> {
        self.queries.fetch_add(1, AtomicOrdering::SeqCst);
        if shape.sql().is_some() {
            return Err(Error::PersistenceFailure(
                "explicit SQL is not supported by the in-memory database".to_string(),
            ));
        }
        let tables = self.tables.read().await;
        let rows = tables
            .get(shape.entity())
            .map(Vec::as_slice)
            .unwrap_or_default();
        let mut matched = Self::matching_rows(rows, shape.filter())?;
        Self::apply_order(&mut matched, shape.order());
        if let Some(limit) = shape.limit() {
            matched.truncate(limit as usize);
        }
        Ok(matched)
    }

    async fn update_column(
        &self,
        table: &str,
        key_column: &str,
        id: &Value,
        column: &str,
        value: &Value,
    ) -> Result<()> {
        let mut tables = self.tables.write().await;
        let rows = tables.get_mut(table).ok_or_else(|| {
            Error::PersistenceFailure(format!("no such table: {}", table))
        })?;
        let mut touched = 0;
        for row in rows.iter_mut() {
            if row.get(key_column) == Some(id) {
                row.insert(column.to_string(), value.clone());
                touched += 1;
            }
        }
        if touched == 0 {
            return Err(Error::PersistenceFailure(format!(
                "no row in {} with {} = {:?}",
                table, key_column, id
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{QueryKind, QueryOptions};
    use crate::record::{column_value, Record};
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Item {
        id: i64,
        name: String,
        value: i64,
        updated_at: f64,
    }

    impl Record for Item {
        fn table() -> &'static str {
            "items"
        }

        fn columns() -> &'static [&'static str] {
            &["id", "name", "value", "updated_at"]
        }

        fn id(&self) -> Value {
            Value::Int(self.id)
        }

        fn timestamp(&self) -> Value {
            Value::Float(self.updated_at)
        }

        fn set_timestamp(&mut self, ts: Value) {
            if let Some(f) = ts.as_f64() {
                self.updated_at = f;
            }
        }

        fn from_row(row: &Row) -> Result<Self> {
            Ok(Item {
                id: column_value(row, "id")?.as_i64().unwrap_or_default(),
                name: column_value(row, "name")?
                    .as_str()
                    .unwrap_or_default()
                    .to_string(),
                value: column_value(row, "value")?.as_i64().unwrap_or_default(),
                updated_at: column_value(row, "updated_at")?.as_f64().unwrap_or_default(),
            })
        }
    }

    fn row(id: i64, name: &str, value: i64, ts: f64) -> Row {
        let mut row = Row::new();
        row.insert("id".to_string(), Value::Int(id));
        row.insert("name".to_string(), Value::from(name));
        row.insert("value".to_string(), Value::Int(value));
        row.insert("updated_at".to_string(), Value::Float(ts));
        row
    }

    async fn seeded() -> InMemoryDatabase {
        let db = InMemoryDatabase::new();
        db.insert("items", row(1, "one", 1, 1.0)).await;
        db.insert("items", row(2, "two", 2, 2.0)).await;
        db.insert("items", row(3, "three", 3, 3.0)).await;
        db
    }

    #[tokio::test]
    async fn test_aggregate_max_and_count() {
        let db = seeded().await;
        let (max, count) = db
            .aggregate("items", "updated_at")
            .await
            .expect("Failed to aggregate");
        assert_eq!(max, Some(Value::Float(3.0)));
        assert_eq!(count, 3);
        assert_eq!(db.aggregate_count(), 1);
    }

    #[tokio::test]
    async fn test_aggregate_empty_table() {
        let db = InMemoryDatabase::new();
        let (max, count) = db
            .aggregate("items", "updated_at")
            .await
            .expect("Failed to aggregate");
        assert_eq!(max, None);
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_select_first_projects_columns() {
        let db = seeded().await;
        let mut conditions = BTreeMap::new();
        conditions.insert(
            "name".to_string(),
            FilterValue::One(Value::from("two")),
        );
        let row = db
            .select_first(
                "items",
                &["id", "updated_at"],
                &Filter::Conditions(conditions),
                None,
            )
            .await
            .expect("Failed to select")
            .expect("Row not found");
        assert_eq!(row.len(), 2);
        assert_eq!(row.get("id"), Some(&Value::Int(2)));
        assert_eq!(row.get("updated_at"), Some(&Value::Float(2.0)));
    }

    #[tokio::test]
    async fn test_select_first_no_match() {
        let db = seeded().await;
        let mut conditions = BTreeMap::new();
        conditions.insert(
            "name".to_string(),
            FilterValue::One(Value::from("missing")),
        );
        let row = db
            .select_first("items", &["id"], &Filter::Conditions(conditions), None)
            .await
            .expect("Failed to select");
        assert_eq!(row, None);
    }

    #[tokio::test]
    async fn test_execute_with_membership_order_and_limit() {
        let db = seeded().await;
        let shape = QueryOptions::new()
            .with_condition(
                "name",
                FilterValue::In(vec![Value::from("one"), Value::from("two"), Value::from("three")]),
            )
            .with_order("value DESC")
            .with_limit(2)
            .shape_for::<Item>(QueryKind::FindAll);
        let rows = db.execute(&shape).await.expect("Failed to execute");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("id"), Some(&Value::Int(3)));
        assert_eq!(rows[1].get("id"), Some(&Value::Int(2)));
        assert_eq!(db.query_count(), 1);
    }

    #[tokio::test]
    async fn test_predicate_filters_are_rejected() {
        let db = seeded().await;
        let shape = QueryOptions::new()
            .with_predicate("value > 1")
            .shape_for::<Item>(QueryKind::FindAll);
        let result = db.execute(&shape).await;
        assert!(matches!(result, Err(Error::PersistenceFailure(_))));
    }

    #[tokio::test]
    async fn test_update_column_touches_one_column_only() {
        let db = seeded().await;
        db.update_column("items", "id", &Value::Int(2), "value", &Value::Int(9))
            .await
            .expect("Failed to update");
        let shape = QueryOptions::new()
            .with_condition("id", FilterValue::One(Value::Int(2)))
            .shape_for::<Item>(QueryKind::FindAll);
        let rows = db.execute(&shape).await.expect("Failed to execute");
        assert_eq!(rows[0].get("value"), Some(&Value::Int(9)));
        assert_eq!(rows[0].get("name"), Some(&Value::from("two")));
    }

    #[tokio::test]
    async fn test_update_column_missing_row() {
        let db = seeded().await;
        let result = db
            .update_column("items", "id", &Value::Int(99), "value", &Value::Int(9))
            .await;
        assert!(matches!(result, Err(Error::PersistenceFailure(_))));
    }

    #[tokio::test]
    async fn test_delete_where() {
        let db = seeded().await;
        db.delete_where("items", "id", &Value::Int(3)).await;
        let (_, count) = db
            .aggregate("items", "updated_at")
            .await
            .expect("Failed to aggregate");
        assert_eq!(count, 2);
    }
}
