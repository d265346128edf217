//! Deferred, exactly-once construction wrapper around the pool engine

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::OnceLock;

use tracing::debug;

use crate::errors::PoolResult;
use crate::health::HealthStatus;
use crate::metrics::AffinityMetrics;
use crate::pool::{AffinityGuard, AffinityPool};
use crate::strategy::SelectionStrategy;

type InitFn<K, V> = Box<dyn Fn() -> PoolResult<AffinityPool<K, V>> + Send + Sync>;

/// A key-affinity pool handle whose engine is built on first use
///
/// Returned by [`KeyAffinityBuilder::build`]. Holding one is free: the
/// instances are only created when the first operation runs, and exactly
/// once even if many threads race to be first. After that, every operation
/// pays a lock-free presence check and delegates to the same engine.
///
/// If construction fails, the failure is memoized: the handle is
/// permanently poisoned and every later operation returns a clone of the
/// original [`ConstructionFailed`] error. Build a new handle to retry.
///
/// # Examples
///
/// ```
/// use affinity_pool::KeyAffinityBuilder;
///
/// let pool = KeyAffinityBuilder::new()
///     .factory(|| String::from("worker"))
///     .count(4)
///     .build::<u64>()
///     .unwrap();
///
/// // Nothing has been constructed yet.
/// assert!(!pool.is_initialized());
///
/// let worker = pool.acquire(42).unwrap();
/// assert_eq!(&*worker, "worker");
/// assert!(pool.is_initialized());
/// ```
///
/// [`KeyAffinityBuilder::build`]: crate::KeyAffinityBuilder::build
/// [`ConstructionFailed`]: crate::PoolError::ConstructionFailed
pub struct KeyAffinity<K: Eq + Hash, V> {
    strategy: SelectionStrategy,
    init: InitFn<K, V>,
    cell: OnceLock<PoolResult<AffinityPool<K, V>>>,
}

impl<K: Eq + Hash, V> KeyAffinity<K, V> {
    pub(crate) fn new<F>(strategy: SelectionStrategy, init: F) -> Self
    where
        F: Fn() -> PoolResult<AffinityPool<K, V>> + Send + Sync + 'static,
    {
        Self {
            strategy,
            init: Box::new(init),
            cell: OnceLock::new(),
        }
    }

    /// The single choke point: construct on first call, then hand out the
    /// memoized engine. A memoized failure is replayed to every caller.
    fn engine(&self) -> PoolResult<&AffinityPool<K, V>> {
        let result = self.cell.get_or_init(|| {
            debug!("constructing deferred affinity pool");
            (self.init)()
        });
        match result {
            Ok(pool) => Ok(pool),
            Err(err) => Err(err.clone()),
        }
    }

    /// Whether the engine has been successfully constructed.
    pub fn is_initialized(&self) -> bool {
        matches!(self.cell.get(), Some(Ok(_)))
    }

    /// The selection strategy resolved at build time.
    ///
    /// Reads the captured configuration; does not trigger construction.
    pub fn strategy(&self) -> SelectionStrategy {
        self.strategy
    }

    /// Acquire the instance bound to `key`, constructing the engine if this
    /// is the first operation on the handle.
    pub fn acquire(&self, key: K) -> PoolResult<AffinityGuard<'_, K, V>>
    where
        K: Clone,
    {
        self.engine()?.acquire(key)
    }

    /// Iterate over all pooled instances.
    pub fn iter(&self) -> PoolResult<impl Iterator<Item = &V> + '_> {
        Ok(self.engine()?.iter())
    }

    /// Number of instances in the pool.
    pub fn instance_count(&self) -> PoolResult<usize> {
        Ok(self.engine()?.instance_count())
    }

    /// Number of keys currently bound to an instance.
    pub fn active_bindings(&self) -> PoolResult<usize> {
        Ok(self.engine()?.active_bindings())
    }

    /// Total in-flight acquisitions across all instances.
    pub fn active_count(&self) -> PoolResult<usize> {
        Ok(self.engine()?.active_count())
    }

    /// Get pool metrics
    pub fn get_metrics(&self) -> PoolResult<AffinityMetrics> {
        Ok(self.engine()?.get_metrics())
    }

    /// Export metrics
    pub fn export_metrics(&self) -> PoolResult<HashMap<String, String>> {
        Ok(self.engine()?.export_metrics())
    }

    /// Export metrics in Prometheus format
    pub fn export_metrics_prometheus(
        &self,
        pool_name: &str,
        tags: Option<&HashMap<String, String>>,
    ) -> PoolResult<String> {
        Ok(self.engine()?.export_metrics_prometheus(pool_name, tags))
    }

    /// Get health status
    pub fn get_health_status(&self) -> PoolResult<HealthStatus> {
        Ok(self.engine()?.get_health_status())
    }

    /// Close the engine if it was ever constructed.
    ///
    /// A handle that was never used has nothing to dispose, so closing it
    /// does not trigger construction.
    pub fn close(&self) {
        if let Some(Ok(pool)) = self.cell.get() {
            pool.close();
        }
    }
}
