//! Query shapes and the caller-facing options they are normalized from.

use crate::record::Record;
use crate::value::Value;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;

/// Which shape of lookup a query performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum QueryKind {
    /// Ordered sequence of records.
    #[serde(rename = "find_all")]
    FindAll,
    /// At most one record.
    #[serde(rename = "find_first")]
    FindFirst,
}

/// A single condition value: scalar equality, set membership, or a nested
/// mapping passed through to the database.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum FilterValue {
    One(Value),
    In(Vec<Value>),
    Nested(BTreeMap<String, FilterValue>),
}

/// Ordered column → condition mapping. `BTreeMap` keeps key order canonical
/// so permuted construction order cannot change a cache key.
pub type Conditions = BTreeMap<String, FilterValue>;

/// Row filter for a query.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub enum Filter {
    /// No filtering; every row matches.
    #[default]
    All,
    /// Structured column conditions.
    Conditions(Conditions),
    /// Raw predicate fragment, passed through verbatim.
    Predicate(String),
}

/// Explicit SQL with bound parameters, for callers that bring a fully built
/// query (e.g. a relation chain rendered to SQL).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawSql {
    pub sql: String,
    pub binds: Vec<Value>,
}

/// Options that affect storage routing at the cache backend, never
/// invalidation. The namespace participates in key identity so entries land
/// in the right place; the TTL is handed to the backend as-is.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CacheOptions {
    pub namespace: Option<String>,
    pub ttl: Option<Duration>,
}

/// Loosely-typed caller options, normalized into a [`QueryShape`] before any
/// key derivation happens. Construction performs no I/O.
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    conditions: Option<Conditions>,
    predicate: Option<String>,
    sql: Option<RawSql>,
    order: Option<String>,
    limit: Option<u64>,
    include: Vec<String>,
    cache: CacheOptions,
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a structured equality or membership condition.
    pub fn with_condition(mut self, column: impl Into<String>, value: FilterValue) -> Self {
        self.conditions
            .get_or_insert_with(BTreeMap::new)
            .insert(column.into(), value);
        self
    }

    /// Replace all conditions at once.
    pub fn with_conditions(mut self, conditions: Conditions) -> Self {
        self.conditions = Some(conditions);
        self
    }

    /// Raw predicate fragment. Ignored when structured conditions are set.
    pub fn with_predicate(mut self, predicate: impl Into<String>) -> Self {
        self.predicate = Some(predicate.into());
        self
    }

    /// Explicit SQL plus bound parameters; the shape keys on the SQL text and
    /// the bind values instead of structured conditions.
    pub fn with_sql(mut self, sql: impl Into<String>, binds: Vec<Value>) -> Self {
        self.sql = Some(RawSql {
            sql: sql.into(),
            binds,
        });
        self
    }

    pub fn with_order(mut self, order: impl Into<String>) -> Self {
        self.order = Some(order.into());
        self
    }

    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Eager-load specification, passed to the database and folded into the
    /// cache key.
    pub fn with_include(mut self, association: impl Into<String>) -> Self {
        self.include.push(association.into());
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.cache.namespace = Some(namespace.into());
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.cache.ttl = Some(ttl);
        self
    }

    pub(crate) fn set_conditions(&mut self, conditions: Conditions) {
        self.conditions = Some(conditions);
    }

    pub(crate) fn cache_options(&self) -> CacheOptions {
        self.cache.clone()
    }

    /// Normalize into an immutable shape for `kind` lookups on `R`'s table.
    pub(crate) fn shape_for<R: Record>(&self, kind: QueryKind) -> QueryShape {
        let filter = match (&self.conditions, &self.predicate) {
            (Some(conditions), _) => Filter::Conditions(conditions.clone()),
            (None, Some(predicate)) => Filter::Predicate(predicate.clone()),
            (None, None) => Filter::All,
        };
        QueryShape {
            entity: R::table(),
            kind,
            filter,
            sql: self.sql.clone(),
            order: self.order.clone(),
            limit: self.limit,
            include: self.include.clone(),
        }
    }
}

/// A normalized, immutable query: what to run and what to key on.
///
/// Two shapes with equal fields produce equal cache keys, whatever order
/// their conditions were supplied in.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryShape {
    entity: &'static str,
    kind: QueryKind,
    filter: Filter,
    sql: Option<RawSql>,
    order: Option<String>,
    limit: Option<u64>,
    include: Vec<String>,
}

impl QueryShape {
    /// Shape for a pinpoint re-fetch of a single row by primary key,
    /// preserving the original shape's order and eager-load spec.
    pub(crate) fn refetch_by_id<R: Record>(&self, id: Value) -> QueryShape {
        let mut conditions = BTreeMap::new();
        conditions.insert(R::primary_key().to_string(), FilterValue::One(id));
        QueryShape {
            entity: self.entity,
            kind: QueryKind::FindFirst,
            filter: Filter::Conditions(conditions),
            sql: None,
            order: self.order.clone(),
            limit: Some(1),
            include: self.include.clone(),
        }
    }

    pub fn entity(&self) -> &'static str {
        self.entity
    }

    pub fn kind(&self) -> QueryKind {
        self.kind
    }

    pub fn filter(&self) -> &Filter {
        &self.filter
    }

    pub fn sql(&self) -> Option<&RawSql> {
        self.sql.as_ref()
    }

    pub fn order(&self) -> Option<&str> {
        self.order.as_deref()
    }

    pub fn limit(&self) -> Option<u64> {
        self.limit
    }

    pub fn include(&self) -> &[String] {
        &self.include
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Row;
    use crate::error::Result;
    use crate::record::column_value;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Item {
        id: i64,
        name: String,
        updated_at: f64,
    }

    impl Record for Item {
        fn table() -> &'static str {
            "items"
        }

        fn columns() -> &'static [&'static str] {
            &["id", "name", "updated_at"]
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
                updated_at: column_value(row, "updated_at")?.as_f64().unwrap_or_default(),
            })
        }
    }

    #[test]
    fn test_conditions_take_precedence_over_predicate() {
        let options = QueryOptions::new()
            .with_predicate("value > 1")
            .with_condition("name", FilterValue::One(Value::from("two")));
        let shape = options.shape_for::<Item>(QueryKind::FindAll);
        assert!(matches!(shape.filter(), Filter::Conditions(_)));
    }

    #[test]
    fn test_default_options_filter_everything_in() {
        let shape = QueryOptions::new().shape_for::<Item>(QueryKind::FindAll);
        assert_eq!(shape.filter(), &Filter::All);
        assert_eq!(shape.entity(), "items");
        assert_eq!(shape.limit(), None);
    }

    #[test]
    fn test_equal_shapes_regardless_of_condition_order() {
        let a = QueryOptions::new()
            .with_condition("name", FilterValue::One(Value::from("two")))
            .with_condition("value", FilterValue::One(Value::Int(2)))
            .shape_for::<Item>(QueryKind::FindFirst);
        let b = QueryOptions::new()
            .with_condition("value", FilterValue::One(Value::Int(2)))
            .with_condition("name", FilterValue::One(Value::from("two")))
            .shape_for::<Item>(QueryKind::FindFirst);
        assert_eq!(a, b);
    }

    #[test]
    fn test_refetch_by_id_pins_to_primary_key() {
        let shape = QueryOptions::new()
            .with_condition("name", FilterValue::One(Value::from("two")))
            .with_order("value DESC")
            .with_include("widget")
            .shape_for::<Item>(QueryKind::FindFirst);
        let refetch = shape.refetch_by_id::<Item>(Value::Int(7));

        assert_eq!(refetch.limit(), Some(1));
        assert_eq!(refetch.order(), Some("value DESC"));
        assert_eq!(refetch.include(), &["widget".to_string()]);
        match refetch.filter() {
            Filter::Conditions(conditions) => {
                assert_eq!(
                    conditions.get("id"),
                    Some(&FilterValue::One(Value::Int(7)))
                );
            }
            other => panic!("Expected id conditions, got {:?}", other),
        }
    }

    #[test]
    fn test_cache_options_do_not_affect_shape() {
        let plain = QueryOptions::new().shape_for::<Item>(QueryKind::FindAll);
        let routed = QueryOptions::new()
            .with_namespace("test")
            .with_ttl(Duration::from_secs(60))
            .shape_for::<Item>(QueryKind::FindAll);
        assert_eq!(plain, routed);
    }
}
