//! Key-to-instance selection strategies

use rand::Rng;

/// Instance counts above this value default to the random strategy.
pub(crate) const RANDOM_THRESHOLD: usize = 20;

/// Strategy used to pick an instance for a key that has no binding yet
///
/// # Examples
///
/// ```
/// use affinity_pool::SelectionStrategy;
///
/// assert_eq!(SelectionStrategy::for_count(20), SelectionStrategy::LeastConcurrency);
/// assert_eq!(SelectionStrategy::for_count(21), SelectionStrategy::Random);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionStrategy {
    /// Route new keys to a pseudo-randomly chosen instance
    Random,

    /// Route new keys to the instance with the fewest active holders
    LeastConcurrency,
}

impl SelectionStrategy {
    /// Default strategy for a pool of `count` instances.
    ///
    /// Scanning every instance for the least loaded one stops paying off
    /// past a couple dozen instances; larger pools fall back to random
    /// spreading, smaller pools get the precise pick.
    pub fn for_count(count: usize) -> Self {
        if count > RANDOM_THRESHOLD {
            Self::Random
        } else {
            Self::LeastConcurrency
        }
    }

    /// Pick an index into `loads`, where `loads[i]` is the number of
    /// currently-active holders on instance `i`. `loads` must be non-empty.
    pub(crate) fn select(&self, loads: &[usize]) -> usize {
        match self {
            Self::Random => rand::rng().random_range(0..loads.len()),
            Self::LeastConcurrency => loads
                .iter()
                .enumerate()
                .min_by_key(|(_, load)| **load)
                .map(|(idx, _)| idx)
                .unwrap_or(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_strategy_threshold() {
        assert_eq!(SelectionStrategy::for_count(1), SelectionStrategy::LeastConcurrency);
        assert_eq!(SelectionStrategy::for_count(20), SelectionStrategy::LeastConcurrency);
        assert_eq!(SelectionStrategy::for_count(21), SelectionStrategy::Random);
        assert_eq!(SelectionStrategy::for_count(1000), SelectionStrategy::Random);
    }

    #[test]
    fn test_least_concurrency_picks_first_minimum() {
        let strategy = SelectionStrategy::LeastConcurrency;
        assert_eq!(strategy.select(&[3, 1, 2]), 1);
        assert_eq!(strategy.select(&[0, 0, 0]), 0);
        assert_eq!(strategy.select(&[5]), 0);
    }

    #[test]
    fn test_random_stays_in_range() {
        let strategy = SelectionStrategy::Random;
        for _ in 0..100 {
            assert!(strategy.select(&[0, 0, 0, 0]) < 4);
        }
    }
}
