//! # affinity-pool
//!
//! Thread-safe key-affinity resource pool: a bounded set of reusable
//! instances where repeated requests for the same key reuse the same
//! instance, while distinct keys spread across the pool.
//!
//! ## Features
//!
//! - Fluent builder with validation and size-based strategy defaulting
//! - Deferred pool construction: no instance is created until first use
//! - Exactly-once initialization under concurrent first use
//! - Random or least-concurrency instance selection
//! - Automatic release via RAII guards (Drop trait)
//! - Disposal hooks invoked on close
//! - Metrics with Prometheus-format export
//! - Load-balance health reporting
//!
//! ## Quick Start
//!
//! ```rust
//! use affinity_pool::KeyAffinityBuilder;
//!
//! let pool = KeyAffinityBuilder::new()
//!     .factory(|| String::from("worker"))
//!     .count(4)
//!     .build::<u64>()
//!     .unwrap();
//!
//! {
//!     let worker = pool.acquire(42).unwrap();
//!     println!("Got: {}", *worker);
//!     // The key is released when `worker` goes out of scope
//! }
//! ```

mod builder;
mod errors;
mod health;
mod lazy;
mod metrics;
mod pool;
mod strategy;

pub use builder::KeyAffinityBuilder;
pub use errors::{HookError, PoolError, PoolResult};
pub use health::HealthStatus;
pub use lazy::KeyAffinity;
pub use metrics::{AffinityMetrics, MetricsExporter};
pub use pool::AffinityGuard;
pub use strategy::SelectionStrategy;
