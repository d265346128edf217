//! Fluent configuration and validation for key-affinity pools

use std::hash::Hash;
use std::sync::Arc;

use crate::errors::{HookError, PoolError, PoolResult};
use crate::lazy::KeyAffinity;
use crate::pool::{AffinityPool, DeposeFn, FactoryFn};
use crate::strategy::SelectionStrategy;

/// Builder for a [`KeyAffinity`] pool handle
///
/// Accumulates a resource factory, a target instance count, an optional
/// disposal hook and an optional strategy flag, then validates the lot and
/// hands back a lazily-constructed handle. `build` consumes the builder, so
/// a produced handle can never be affected by later mutation.
///
/// Not safe for concurrent mutation; configure it from a single owner.
///
/// # Examples
///
/// ```
/// use affinity_pool::KeyAffinityBuilder;
///
/// let pool = KeyAffinityBuilder::new()
///     .factory(|| vec![0u8; 16])
///     .count(8)
///     .build::<String>()
///     .unwrap();
///
/// let buf = pool.acquire("session-1".to_string()).unwrap();
/// assert_eq!(buf.len(), 16);
/// ```
pub struct KeyAffinityBuilder<V> {
    factory: Option<FactoryFn<V>>,
    count: usize,
    depose: Option<DeposeFn<V>>,
    using_random: Option<bool>,
    arg_error: Option<PoolError>,
}

impl<V> KeyAffinityBuilder<V> {
    /// Create a builder with nothing configured.
    pub fn new() -> Self {
        Self {
            factory: None,
            count: 0,
            depose: None,
            using_random: None,
            arg_error: None,
        }
    }

    /// Set the resource factory. Required.
    ///
    /// The factory is not invoked here, nor by `build`; instances are only
    /// created on first use of the returned handle.
    pub fn factory<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> V + Send + Sync + 'static,
    {
        self.factory = Some(Arc::new(move || Ok(factory())));
        self
    }

    /// Set a fallible resource factory. Required (or [`factory`]).
    ///
    /// A factory error during deferred construction surfaces as
    /// [`PoolError::ConstructionFailed`] and poisons the handle.
    ///
    /// [`factory`]: Self::factory
    pub fn try_factory<F, E>(mut self, factory: F) -> Self
    where
        F: Fn() -> Result<V, E> + Send + Sync + 'static,
        E: std::error::Error + Send + Sync + 'static,
    {
        self.factory = Some(Arc::new(move || {
            factory().map_err(|e| Arc::new(e) as HookError)
        }));
        self
    }

    /// Set the target instance count. Required, must be positive.
    ///
    /// Zero is recorded as an invalid argument and surfaced by `build`.
    /// The last valid call wins.
    pub fn count(mut self, count: usize) -> Self {
        if count == 0 {
            self.record_error(PoolError::InvalidArgument("count must be positive"));
        } else {
            self.count = count;
        }
        self
    }

    /// Set the disposal hook, invoked once per instance when the pool is
    /// closed. Optional; defaults to a no-op.
    pub fn depose<F>(mut self, depose: F) -> Self
    where
        F: Fn(&V) + Send + Sync + 'static,
    {
        self.depose = Some(Arc::new(move |value| {
            depose(value);
            Ok(())
        }));
        self
    }

    /// Set a fallible disposal hook. Hook failures are logged at close time
    /// and never abort disposal of the remaining instances.
    pub fn try_depose<F, E>(mut self, depose: F) -> Self
    where
        F: Fn(&V) -> Result<(), E> + Send + Sync + 'static,
        E: std::error::Error + Send + Sync + 'static,
    {
        self.depose = Some(Arc::new(move |value| {
            depose(value).map_err(|e| Arc::new(e) as HookError)
        }));
        self
    }

    /// Explicitly pick the selection strategy: `true` routes new keys to a
    /// random instance, `false` to the least-concurrency instance.
    ///
    /// Optional; if never called the strategy is resolved from the count at
    /// build time, see [`SelectionStrategy::for_count`].
    pub fn using_random(mut self, value: bool) -> Self {
        self.using_random = Some(value);
        self
    }

    /// Validate the configuration, apply defaults and return a deferred
    /// pool handle bound to the key type `K`.
    ///
    /// No engine construction happens here; the factory runs only when the
    /// first operation is invoked on the handle.
    pub fn build<K>(self) -> PoolResult<KeyAffinity<K, V>>
    where
        K: Eq + Hash,
        V: 'static,
    {
        if let Some(err) = self.arg_error {
            return Err(err);
        }
        if self.count == 0 {
            return Err(PoolError::InvalidConfiguration("no count found"));
        }
        let factory = self
            .factory
            .ok_or(PoolError::InvalidConfiguration("no factory found"))?;
        let depose: DeposeFn<V> = self.depose.unwrap_or_else(|| Arc::new(|_| Ok(())));
        let strategy = match self.using_random {
            Some(true) => SelectionStrategy::Random,
            Some(false) => SelectionStrategy::LeastConcurrency,
            None => SelectionStrategy::for_count(self.count),
        };

        let count = self.count;
        Ok(KeyAffinity::new(strategy, move || {
            AffinityPool::new(&factory, count, Arc::clone(&depose), strategy)
        }))
    }

    fn record_error(&mut self, err: PoolError) {
        // First argument error wins; the chain was already broken there.
        if self.arg_error.is_none() {
            self.arg_error = Some(err);
        }
    }
}

impl<V> Default for KeyAffinityBuilder<V> {
    fn default() -> Self {
        Self::new()
    }
}
