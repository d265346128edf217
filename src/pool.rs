//! Core key-affinity pool engine

use std::collections::HashMap;
use std::hash::Hash;
use std::ops::Deref;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use dashmap::DashMap;
use tracing::{debug, warn};

use crate::errors::{HookError, PoolError, PoolResult};
use crate::health::HealthStatus;
use crate::metrics::{AffinityMetrics, MetricsExporter, MetricsTracker};
use crate::strategy::SelectionStrategy;

/// Finalized resource factory, as captured by the builder.
pub(crate) type FactoryFn<V> = Arc<dyn Fn() -> Result<V, HookError> + Send + Sync>;

/// Finalized disposal hook, as captured by the builder.
pub(crate) type DeposeFn<V> = Arc<dyn Fn(&V) -> Result<(), HookError> + Send + Sync>;

/// A single pooled resource instance plus its active-holder count.
struct Instance<V> {
    value: V,
    active: AtomicUsize,
}

/// Pins a key to one instance while the key has in-flight acquisitions.
struct Binding<V> {
    instance: Arc<Instance<V>>,
    holders: AtomicUsize,
}

/// The fully-constructed pool engine behind a [`KeyAffinity`] handle.
///
/// Holds a fixed set of `count` instances created eagerly at construction,
/// plus the live key-to-instance bindings. Repeated acquisitions for a key
/// with in-flight holders reuse the bound instance; a key whose last holder
/// is released loses its binding and may bind to a different instance next
/// time, which is what spreads load across the pool over time.
///
/// [`KeyAffinity`]: crate::KeyAffinity
pub(crate) struct AffinityPool<K: Eq + Hash, V> {
    instances: Vec<Arc<Instance<V>>>,
    bindings: DashMap<K, Arc<Binding<V>>>,
    strategy: SelectionStrategy,
    depose: DeposeFn<V>,
    metrics: MetricsTracker,
    closed: AtomicBool,
}

impl<K: Eq + Hash, V> AffinityPool<K, V> {
    /// Create the engine, eagerly invoking the factory `count` times.
    ///
    /// The first factory failure aborts construction; instances created
    /// before the failure are dropped without the depose hook, since the
    /// pool never came alive.
    pub(crate) fn new(
        factory: &FactoryFn<V>,
        count: usize,
        depose: DeposeFn<V>,
        strategy: SelectionStrategy,
    ) -> PoolResult<Self> {
        let mut instances = Vec::with_capacity(count);
        for _ in 0..count {
            let value = factory().map_err(PoolError::ConstructionFailed)?;
            instances.push(Arc::new(Instance {
                value,
                active: AtomicUsize::new(0),
            }));
        }
        debug!(count, ?strategy, "affinity pool constructed");

        Ok(Self {
            instances,
            bindings: DashMap::new(),
            strategy,
            depose,
            metrics: MetricsTracker::new(),
            closed: AtomicBool::new(false),
        })
    }

    /// Acquire the instance bound to `key`, binding one first if needed.
    ///
    /// The returned guard releases the acquisition when dropped.
    pub fn acquire(&self, key: K) -> PoolResult<AffinityGuard<'_, K, V>>
    where
        K: Clone,
    {
        if self.closed.load(Ordering::Acquire) {
            return Err(PoolError::Closed);
        }

        // The holder increment happens under the entry's shard lock, so a
        // concurrent release cannot observe holders == 0 and unbind the
        // entry between our lookup and the increment.
        let binding = {
            let entry = self.bindings.entry(key.clone()).or_insert_with(|| {
                self.metrics.bindings_created.fetch_add(1, Ordering::Relaxed);
                Arc::new(Binding {
                    instance: self.pick_instance(),
                    holders: AtomicUsize::new(0),
                })
            });
            entry.holders.fetch_add(1, Ordering::Relaxed);
            Arc::clone(entry.value())
        };

        binding.instance.active.fetch_add(1, Ordering::Relaxed);
        self.metrics.total_acquired.fetch_add(1, Ordering::Relaxed);

        Ok(AffinityGuard {
            pool: self,
            key,
            binding,
        })
    }

    fn release(&self, key: &K, binding: &Arc<Binding<V>>) {
        binding.instance.active.fetch_sub(1, Ordering::Relaxed);
        self.metrics.total_released.fetch_add(1, Ordering::Relaxed);

        if binding.holders.fetch_sub(1, Ordering::Relaxed) == 1 {
            // Unbind only if no new holder slipped in; the predicate runs
            // under the shard lock shared with `acquire`.
            self.bindings
                .remove_if(key, |_, b| b.holders.load(Ordering::Relaxed) == 0);
        }
    }

    fn pick_instance(&self) -> Arc<Instance<V>> {
        let loads = self.instance_loads();
        let idx = self.strategy.select(&loads);
        Arc::clone(&self.instances[idx])
    }

    fn instance_loads(&self) -> Vec<usize> {
        self.instances
            .iter()
            .map(|i| i.active.load(Ordering::Relaxed))
            .collect()
    }

    /// Iterate over all pooled instances.
    pub fn iter(&self) -> impl Iterator<Item = &V> + '_ {
        self.instances.iter().map(|i| &i.value)
    }

    /// Number of instances in the pool.
    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    /// Number of keys currently bound to an instance.
    pub fn active_bindings(&self) -> usize {
        self.bindings.len()
    }

    /// Total in-flight acquisitions across all instances.
    pub fn active_count(&self) -> usize {
        self.instance_loads().iter().sum()
    }

    /// Get pool metrics
    pub fn get_metrics(&self) -> AffinityMetrics {
        self.metrics
            .snapshot(self.bindings.len(), self.instance_loads())
    }

    /// Export metrics
    pub fn export_metrics(&self) -> HashMap<String, String> {
        self.get_metrics().export()
    }

    /// Export metrics in Prometheus format
    pub fn export_metrics_prometheus(
        &self,
        pool_name: &str,
        tags: Option<&HashMap<String, String>>,
    ) -> String {
        MetricsExporter::export_prometheus(&self.get_metrics(), pool_name, tags)
    }

    /// Get health status
    pub fn get_health_status(&self) -> HealthStatus {
        HealthStatus::evaluate(
            &self.instance_loads(),
            self.bindings.len(),
            self.closed.load(Ordering::Acquire),
        )
    }

    /// Close the pool: drop all bindings and run the depose hook once per
    /// instance. Idempotent; later acquisitions fail with
    /// [`PoolError::Closed`].
    ///
    /// Hook failures are logged and do not stop disposal of the remaining
    /// instances.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        self.bindings.clear();
        for instance in &self.instances {
            if let Err(err) = (self.depose)(&instance.value) {
                warn!(error = %err, "depose hook failed during close");
            }
        }
        debug!(count = self.instances.len(), "affinity pool closed");
    }
}

impl<K: Eq + Hash, V> Drop for AffinityPool<K, V> {
    fn drop(&mut self) {
        self.close();
    }
}

/// An in-flight acquisition that automatically releases its key when dropped
///
/// Dereferences to the pooled instance. While at least one guard for a key
/// is alive, every acquisition for that key yields the same instance.
pub struct AffinityGuard<'a, K: Eq + Hash, V> {
    pool: &'a AffinityPool<K, V>,
    key: K,
    binding: Arc<Binding<V>>,
}

impl<K: Eq + Hash, V> Deref for AffinityGuard<'_, K, V> {
    type Target = V;

    fn deref(&self) -> &Self::Target {
        &self.binding.instance.value
    }
}

impl<K: Eq + Hash, V> Drop for AffinityGuard<'_, K, V> {
    fn drop(&mut self) {
        self.pool.release(&self.key, &self.binding);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    fn counting_factory(counter: Arc<AtomicUsize>) -> FactoryFn<usize> {
        Arc::new(move || Ok(counter.fetch_add(1, Ordering::SeqCst)))
    }

    fn noop_depose() -> DeposeFn<usize> {
        Arc::new(|_| Ok(()))
    }

    fn make_pool(count: usize, strategy: SelectionStrategy) -> AffinityPool<&'static str, usize> {
        let factory = counting_factory(Arc::new(AtomicUsize::new(0)));
        AffinityPool::new(&factory, count, noop_depose(), strategy).unwrap()
    }

    #[test]
    fn test_same_key_reuses_instance() {
        let pool = make_pool(4, SelectionStrategy::LeastConcurrency);

        let first = pool.acquire("job").unwrap();
        let second = pool.acquire("job").unwrap();
        assert_eq!(*first, *second);
        assert_eq!(pool.active_bindings(), 1);
        assert_eq!(pool.active_count(), 2);
    }

    #[test]
    fn test_binding_removed_after_last_release() {
        let pool = make_pool(4, SelectionStrategy::LeastConcurrency);

        let first = pool.acquire("job").unwrap();
        let second = pool.acquire("job").unwrap();
        drop(first);
        assert_eq!(pool.active_bindings(), 1);
        drop(second);
        assert_eq!(pool.active_bindings(), 0);
        assert_eq!(pool.active_count(), 0);
    }

    #[test]
    fn test_least_concurrency_spreads_held_keys() {
        let pool = make_pool(3, SelectionStrategy::LeastConcurrency);

        let a = pool.acquire("a").unwrap();
        let b = pool.acquire("b").unwrap();
        let c = pool.acquire("c").unwrap();

        let mut seen = vec![*a, *b, *c];
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), 3, "held keys must land on distinct instances");
    }

    #[test]
    fn test_random_strategy_stays_within_pool() {
        let pool = make_pool(2, SelectionStrategy::Random);

        for key in ["a", "b", "c", "d", "e", "f"] {
            let guard = pool.acquire(key).unwrap();
            assert!(*guard < 2);
        }
    }

    #[test]
    fn test_close_runs_depose_once_per_instance() {
        let deposed = Arc::new(AtomicUsize::new(0));
        let factory = counting_factory(Arc::new(AtomicUsize::new(0)));
        let depose: DeposeFn<usize> = {
            let deposed = Arc::clone(&deposed);
            Arc::new(move |_| {
                deposed.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
        };
        let pool: AffinityPool<u32, usize> =
            AffinityPool::new(&factory, 3, depose, SelectionStrategy::LeastConcurrency).unwrap();

        pool.close();
        assert_eq!(deposed.load(Ordering::SeqCst), 3);

        // Idempotent: a second close must not re-depose.
        pool.close();
        assert_eq!(deposed.load(Ordering::SeqCst), 3);

        assert!(matches!(pool.acquire(1), Err(PoolError::Closed)));
    }

    #[test]
    fn test_drop_closes_pool() {
        let deposed = Arc::new(AtomicUsize::new(0));
        let factory = counting_factory(Arc::new(AtomicUsize::new(0)));
        let depose: DeposeFn<usize> = {
            let deposed = Arc::clone(&deposed);
            Arc::new(move |_| {
                deposed.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
        };
        {
            let _pool: AffinityPool<u32, usize> =
                AffinityPool::new(&factory, 2, depose, SelectionStrategy::LeastConcurrency)
                    .unwrap();
        }
        assert_eq!(deposed.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_failing_depose_does_not_stop_close() {
        #[derive(Debug, thiserror::Error)]
        #[error("boom")]
        struct Boom;

        let attempts = Arc::new(AtomicUsize::new(0));
        let factory = counting_factory(Arc::new(AtomicUsize::new(0)));
        let depose: DeposeFn<usize> = {
            let attempts = Arc::clone(&attempts);
            Arc::new(move |_| {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(Arc::new(Boom) as HookError)
            })
        };
        let pool: AffinityPool<u32, usize> =
            AffinityPool::new(&factory, 3, depose, SelectionStrategy::LeastConcurrency).unwrap();

        pool.close();
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_construction_failure_propagates() {
        #[derive(Debug, thiserror::Error)]
        #[error("refused")]
        struct Refused;

        let factory: FactoryFn<usize> = Arc::new(|| Err(Arc::new(Refused) as HookError));
        let result: PoolResult<AffinityPool<u32, usize>> =
            AffinityPool::new(&factory, 2, noop_depose(), SelectionStrategy::Random);

        assert!(matches!(result, Err(PoolError::ConstructionFailed(_))));
    }

    #[test]
    fn test_iter_visits_every_instance() {
        let pool = make_pool(5, SelectionStrategy::LeastConcurrency);
        let mut values: Vec<usize> = pool.iter().copied().collect();
        values.sort_unstable();
        assert_eq!(values, vec![0, 1, 2, 3, 4]);
    }
}
