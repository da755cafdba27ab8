//! # lastmod-cache
//!
//! A lazy, self-invalidating query cache keyed on last-modified fingerprints.
//!
//! ## Features
//!
//! - **Fully Generic:** Cache results for any type `R` that implements `Record`
//! - **Implicit Invalidation:** Keys embed `max(updated_at)` + row count, so a
//!   relevant write changes the key instead of requiring an explicit purge
//! - **Lazy by Construction:** Lookups return a [`LazyResult`] that performs
//!   zero I/O until first accessed, then memoizes the outcome
//! - **Backend Agnostic:** In-memory backend included, custom backends via
//!   the `CacheBackend` trait
//! - **Database Agnostic:** Bring your own store via the `Database` trait
//! - **Dynamic Finders:** `find_by_*` / `find_all_by_*` names dispatch through
//!   the cache with fall-through for unrecognized names
//!
//! ## Quick Start
//!
//! ```ignore
//! use lastmod_cache::{
//!     InMemoryBackend, InMemoryDatabase, QueryCache, QueryOptions, Record,
//!     FilterValue, Value,
//! };
//!
//! // 1. Define your record and implement Record for it
//! #[derive(Clone, Serialize, Deserialize)]
//! struct Post {
//!     id: i64,
//!     title: String,
//!     updated_at: f64,
//! }
//!
//! // 2. Create the cache
//! let cache = QueryCache::new(InMemoryBackend::new(), InMemoryDatabase::new());
//!
//! // 3. Look things up; nothing runs until `.get()`
//! let mut posts = cache.lookup_all::<Post>(
//!     QueryOptions::new().with_condition("title", FilterValue::One(Value::from("hello"))),
//! );
//! let snapshot = posts.get().await?;
//! ```

#[macro_use]
extern crate log;

pub mod backend;
pub mod cache;
pub mod database;
pub mod error;
pub mod finder;
pub mod key;
pub mod lazy;
pub mod observability;
pub mod probe;
pub mod query;
pub mod record;
pub mod serialization;
pub mod value;

// Re-exports for convenience
pub use backend::{CacheBackend, InMemoryBackend};
pub use cache::{DynLookup, QueryCache};
pub use database::{Database, InMemoryDatabase, Row};
pub use error::{Error, Result};
pub use finder::{FinderKind, FinderName};
pub use key::{CacheKey, KeyBuilder};
pub use lazy::LazyResult;
pub use observability::{CacheMetrics, NoOpMetrics};
pub use probe::{FreshnessProbe, FreshnessSignal};
pub use query::{
    CacheOptions, Conditions, Filter, FilterValue, QueryKind, QueryOptions, QueryShape, RawSql,
};
pub use record::Record;
pub use value::Value;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
