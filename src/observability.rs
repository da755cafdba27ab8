//! Metrics hooks for cache operations.

use std::time::Duration;

/// Observer for lookup outcomes. All methods default to no-ops so an
/// implementation can pick the events it cares about.
pub trait CacheMetrics: Send + Sync {
    fn record_hit(&self, _key: &str, _duration: Duration) {}
    fn record_miss(&self, _key: &str, _duration: Duration) {}
    fn record_error(&self, _key: &str, _error: &str) {}
}

/// Default metrics handler that records nothing.
pub struct NoOpMetrics;

impl CacheMetrics for NoOpMetrics {}
