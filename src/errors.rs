//! Error types for the affinity pool

use std::sync::Arc;

use thiserror::Error;

/// Error produced by a user-supplied factory or depose hook.
///
/// Stored behind `Arc` so a memoized construction failure can be replayed
/// to every later caller of a poisoned handle.
pub type HookError = Arc<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Error, Debug, Clone)]
pub enum PoolError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(&'static str),

    #[error("Pool construction failed")]
    ConstructionFailed(#[source] HookError),

    #[error("Pool is closed")]
    Closed,
}

pub type PoolResult<T> = Result<T, PoolError>;
