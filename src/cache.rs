//! Query cache engine - main entry point for cached lookups.

use crate::backend::CacheBackend;
use crate::database::Database;
use crate::error::{Error, Result};
use crate::finder::{self, FinderKind, FinderName};
use crate::key::KeyBuilder;
use crate::lazy::LazyResult;
use crate::observability::{CacheMetrics, NoOpMetrics};
use crate::probe::{FreshnessProbe, FreshnessSignal};
use crate::query::{CacheOptions, FilterValue, QueryKind, QueryOptions, QueryShape};
use crate::record::Record;
use crate::serialization;
use crate::value::Value;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// Read-through query cache keyed on last-modified fingerprints.
///
/// Every lookup returns a [`LazyResult`] synchronously, without touching the
/// database or the backend. On first access the lazy result drives the
/// freshness probe, derives the fingerprinted key, and either serves the
/// cached snapshot or runs the real query and stores it. Invalidation is
/// implicit: a relevant insert, update, or delete moves the freshness signal,
/// which moves the key, so the stale entry is simply never addressed again.
///
/// The probe always runs before the fetch. Between the two a write can land;
/// the result may then reflect a newer state than the key implies, which is
/// the safe direction — the key pessimistically covers anything that existed
/// by probe time. Concurrent misses may both run the query and both write
/// the entry; last write wins.
///
/// # Example
///
/// ```ignore
/// use lastmod_cache::{InMemoryBackend, InMemoryDatabase, QueryCache, QueryOptions};
///
/// let cache = QueryCache::new(InMemoryBackend::new(), InMemoryDatabase::new());
/// let mut posts = cache.lookup_all::<Post>(QueryOptions::new());
/// let snapshot = posts.get().await?; // probe + cache + query happen here
/// ```
pub struct QueryCache<B: CacheBackend, D: Database> {
    backend: B,
    database: D,
    metrics: Box<dyn CacheMetrics>,
}

/// A dispatched dynamic finder: single-row or set, depending on the parsed
/// name.
pub enum DynLookup<'a, R: Record> {
    First(LazyResult<'a, Option<R>>),
    All(LazyResult<'a, Vec<R>>),
}

enum Outcome {
    Hit,
    Miss,
}

impl<B: CacheBackend, D: Database> QueryCache<B, D> {
    pub fn new(backend: B, database: D) -> Self {
        QueryCache {
            backend,
            database,
            metrics: Box::new(NoOpMetrics),
        }
    }

    /// Set custom metrics handler.
    pub fn with_metrics(mut self, metrics: Box<dyn CacheMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// All records matching the options, as a deferred snapshot.
    ///
    /// The cache entry is invalidated whenever the timestamp column advances
    /// on any record in the table or the row count changes.
    pub fn lookup_all<R: Record>(&self, options: QueryOptions) -> LazyResult<'_, Vec<R>> {
        let shape = options.shape_for::<R>(QueryKind::FindAll);
        let cache_options = options.cache_options();
        LazyResult::new(async move { self.run_set::<R>(shape, cache_options, None).await })
    }

    /// The first record matching the options, as a deferred snapshot.
    ///
    /// The cache entry is invalidated whenever that record's timestamp
    /// column changes, or when the first match becomes a different row.
    pub fn lookup_first<R: Record>(&self, options: QueryOptions) -> LazyResult<'_, Option<R>> {
        let shape = options.shape_for::<R>(QueryKind::FindFirst);
        let cache_options = options.cache_options();
        LazyResult::new(async move { self.run_first::<R>(shape, cache_options).await })
    }

    /// A single record by primary key. Absence is a hard [`Error::NotFound`],
    /// surfaced at first access regardless of cache state.
    pub fn lookup_by_id<R: Record>(&self, id: Value, options: QueryOptions) -> LazyResult<'_, R> {
        let mut options = options;
        let mut conditions = std::collections::BTreeMap::new();
        conditions.insert(
            R::primary_key().to_string(),
            FilterValue::One(id.clone()),
        );
        options.set_conditions(conditions);
        let shape = options.shape_for::<R>(QueryKind::FindFirst);
        let cache_options = options.cache_options();
        LazyResult::new(async move {
            match self.run_first::<R>(shape, cache_options).await? {
                Some(record) => Ok(record),
                None => Err(Error::NotFound {
                    entity: R::table().to_string(),
                    ids: vec![id],
                }),
            }
        })
    }

    /// Records for a set of primary keys. Any requested id absent from the
    /// result is a hard [`Error::NotFound`], even when the result itself was
    /// a cache hit.
    pub fn lookup_by_ids<R: Record>(
        &self,
        ids: Vec<Value>,
        options: QueryOptions,
    ) -> LazyResult<'_, Vec<R>> {
        let mut options = options;
        let mut conditions = std::collections::BTreeMap::new();
        conditions.insert(
            R::primary_key().to_string(),
            FilterValue::In(ids.clone()),
        );
        options.set_conditions(conditions);
        let shape = options.shape_for::<R>(QueryKind::FindAll);
        let cache_options = options.cache_options();
        LazyResult::new(async move {
            self.run_set::<R>(shape, cache_options, Some(ids)).await
        })
    }

    /// Route a method-like finder name ("find_by_name_and_value",
    /// "find_all_by_name") through the cache.
    ///
    /// Returns `None` when the name is not a finder at all, so callers can
    /// fall through to other dispatch. A recognized name with a bad column
    /// list yields `Some(Err(..))` with [`Error::UnknownOperation`] or
    /// [`Error::InvalidArgument`].
    pub fn dynamic<R: Record>(
        &self,
        name: &str,
        values: Vec<Value>,
        options: QueryOptions,
    ) -> Option<Result<DynLookup<'_, R>>> {
        let finder = FinderName::parse(name)?;
        Some(self.dispatch_finder::<R>(&finder, values, options))
    }

    /// Dispatch an already-parsed finder.
    pub fn dispatch_finder<R: Record>(
        &self,
        finder: &FinderName,
        values: Vec<Value>,
        mut options: QueryOptions,
    ) -> Result<DynLookup<'_, R>> {
        let conditions = finder::conditions_for::<R>(finder, values)?;
        options.set_conditions(conditions);
        Ok(match finder.kind {
            FinderKind::All => DynLookup::All(self.lookup_all::<R>(options)),
            FinderKind::First => DynLookup::First(self.lookup_first::<R>(options)),
        })
    }

    /// Force cache entries involving `record` to expire by advancing its
    /// timestamp column to the current clock, writing only that column and
    /// bypassing any model-level validation. The in-memory record is updated
    /// to match.
    pub async fn force_stale<R: Record>(&self, record: &mut R) -> Result<()> {
        let ts = Value::Float(unix_epoch_seconds());
        self.database
            .update_column(
                R::table(),
                R::primary_key(),
                &record.id(),
                R::timestamp_column(),
                &ts,
            )
            .await?;
        record.set_timestamp(ts);
        info!(
            "✓ advanced {} on {} for {:?}",
            R::timestamp_column(),
            R::table(),
            record.id()
        );
        Ok(())
    }

    /// Get backend reference (for advanced use).
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Get database reference (for advanced use).
    pub fn database(&self) -> &D {
        &self.database
    }

    async fn run_set<R: Record>(
        &self,
        shape: QueryShape,
        cache_options: CacheOptions,
        required_ids: Option<Vec<Value>>,
    ) -> Result<Vec<R>> {
        let timer = Instant::now();
        let probe = FreshnessProbe::new(&self.database);
        let signal = probe.probe_set::<R>().await?;
        let key = KeyBuilder::build(&shape, &signal, &cache_options);
        let key_repr = key.canonical()?;
        debug!("» set lookup on {} under {}", R::table(), key_repr);

        let records = match self.set_pipeline::<R>(&shape, &key, &cache_options).await {
            Ok((records, Outcome::Hit)) => {
                self.metrics.record_hit(&key_repr, timer.elapsed());
                debug!("✓ cache hit in {:?}", timer.elapsed());
                records
            }
            Ok((records, Outcome::Miss)) => {
                self.metrics.record_miss(&key_repr, timer.elapsed());
                debug!(
                    "✗ cache miss; stored {} records in {:?}",
                    records.len(),
                    timer.elapsed()
                );
                records
            }
            Err(e) => {
                self.metrics.record_error(&key_repr, &e.to_string());
                return Err(e);
            }
        };

        if let Some(ids) = required_ids {
            let missing: Vec<Value> = ids
                .into_iter()
                .filter(|id| !records.iter().any(|record| record.id() == *id))
                .collect();
            if !missing.is_empty() {
                return Err(Error::NotFound {
                    entity: R::table().to_string(),
                    ids: missing,
                });
            }
        }
        Ok(records)
    }

    async fn set_pipeline<R: Record>(
        &self,
        shape: &QueryShape,
        key: &crate::key::CacheKey,
        cache_options: &CacheOptions,
    ) -> Result<(Vec<R>, Outcome)> {
        if let Some(bytes) = self.backend.get(key).await? {
            let records = serialization::deserialize_from_cache(&bytes)?;
            return Ok((records, Outcome::Hit));
        }
        let rows = self.database.execute(shape).await?;
        let records = rows
            .iter()
            .map(R::from_row)
            .collect::<Result<Vec<R>>>()?;
        let bytes = serialization::serialize_for_cache(&records)?;
        self.backend.put(key, bytes, cache_options.ttl).await?;
        Ok((records, Outcome::Miss))
    }

    async fn run_first<R: Record>(
        &self,
        shape: QueryShape,
        cache_options: CacheOptions,
    ) -> Result<Option<R>> {
        let timer = Instant::now();
        let probe = FreshnessProbe::new(&self.database);
        let signal = probe
            .probe_first::<R>(shape.filter(), shape.order())
            .await?;
        let key = KeyBuilder::build(&shape, &signal, &cache_options);
        let key_repr = key.canonical()?;
        debug!("» single-row lookup on {} under {}", R::table(), key_repr);

        match self
            .first_pipeline::<R>(&shape, &signal, &key, &cache_options)
            .await
        {
            Ok((record, Outcome::Hit)) => {
                self.metrics.record_hit(&key_repr, timer.elapsed());
                debug!("✓ cache hit in {:?}", timer.elapsed());
                Ok(record)
            }
            Ok((record, Outcome::Miss)) => {
                self.metrics.record_miss(&key_repr, timer.elapsed());
                debug!("✗ cache miss; stored in {:?}", timer.elapsed());
                Ok(record)
            }
            Err(e) => {
                self.metrics.record_error(&key_repr, &e.to_string());
                Err(e)
            }
        }
    }

    async fn first_pipeline<R: Record>(
        &self,
        shape: &QueryShape,
        signal: &FreshnessSignal,
        key: &crate::key::CacheKey,
        cache_options: &CacheOptions,
    ) -> Result<(Option<R>, Outcome)> {
        if let Some(bytes) = self.backend.get(key).await? {
            let record = serialization::deserialize_from_cache(&bytes)?;
            return Ok((record, Outcome::Hit));
        }
        // The probe already identified the row; re-fetch it by primary key
        // instead of re-running the filter. No row at probe time means the
        // absence itself gets cached under the null signal.
        let record = match signal.row_id() {
            Some(id) => {
                let refetch = shape.refetch_by_id::<R>(id.clone());
                let rows = self.database.execute(&refetch).await?;
                rows.first().map(R::from_row).transpose()?
            }
            None => None,
        };
        let bytes = serialization::serialize_for_cache(&record)?;
        self.backend.put(key, bytes, cache_options.ttl).await?;
        Ok((record, Outcome::Miss))
    }
}

fn unix_epoch_seconds() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default()
}
