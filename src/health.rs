//! Health reporting for affinity pools

/// Health snapshot of a pool's load distribution
///
/// The pool's contract is spreading traffic across its instances, so health
/// here means balance: a single instance soaking up most of the active
/// calls is reported as a warning.
///
/// # Examples
///
/// ```
/// use affinity_pool::KeyAffinityBuilder;
///
/// let pool = KeyAffinityBuilder::new()
///     .factory(|| 0u8)
///     .count(4)
///     .build::<u32>()
///     .unwrap();
///
/// let _guard = pool.acquire(1).unwrap();
/// let health = pool.get_health_status().unwrap();
/// assert!(health.is_healthy());
/// assert_eq!(health.instance_count, 4);
/// ```
#[derive(Debug, Clone)]
#[cfg_attr(feature = "metrics", derive(serde::Serialize))]
pub struct HealthStatus {
    /// Whether the pool is healthy
    pub is_healthy: bool,

    /// Number of warnings detected
    pub warning_count: usize,

    /// Fraction of instances with at least one active holder (0.0 to 1.0)
    pub utilization: f64,

    /// Keys currently bound to an instance
    pub active_bindings: usize,

    /// Number of instances in the pool
    pub instance_count: usize,

    /// Heaviest per-instance load
    pub max_load: usize,

    /// Warning messages
    pub warnings: Vec<String>,
}

impl HealthStatus {
    pub(crate) fn evaluate(loads: &[usize], active_bindings: usize, closed: bool) -> Self {
        let instance_count = loads.len();
        let total: usize = loads.iter().sum();
        let max_load = loads.iter().copied().max().unwrap_or(0);
        let busy = loads.iter().filter(|load| **load > 0).count();
        let utilization = if instance_count > 0 {
            busy as f64 / instance_count as f64
        } else {
            0.0
        };

        let mut warnings = Vec::new();
        let mut is_healthy = true;

        if closed {
            warnings.push("Pool is closed".to_string());
            is_healthy = false;
        }

        // Twice the mean load on one instance means affinity is defeating
        // the spread; ignore single-instance pools and trivial traffic.
        if instance_count > 1 && max_load > 1 && max_load * instance_count >= total * 2 {
            warnings.push(format!(
                "Unbalanced load: hottest instance holds {} of {} active calls",
                max_load, total
            ));
            is_healthy = false;
        }

        Self {
            is_healthy,
            warning_count: warnings.len(),
            utilization,
            active_bindings,
            instance_count,
            max_load,
            warnings,
        }
    }

    /// Check if the pool is healthy
    pub fn is_healthy(&self) -> bool {
        self.is_healthy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_balanced_pool_is_healthy() {
        let health = HealthStatus::evaluate(&[1, 1, 1, 1], 4, false);
        assert!(health.is_healthy());
        assert!(health.warnings.is_empty());
        assert!((health.utilization - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_skewed_load_raises_warning() {
        let health = HealthStatus::evaluate(&[6, 1, 1], 8, false);
        assert!(!health.is_healthy());
        assert_eq!(health.warning_count, 1);
        assert!(health.warnings[0].contains("Unbalanced load"));
        assert_eq!(health.max_load, 6);
    }

    #[test]
    fn test_light_traffic_does_not_warn() {
        // A lone call is always "skewed"; it should not trip the check.
        let health = HealthStatus::evaluate(&[1, 0, 0], 1, false);
        assert!(health.is_healthy());
    }

    #[test]
    fn test_closed_pool_is_unhealthy() {
        let health = HealthStatus::evaluate(&[0, 0], 0, true);
        assert!(!health.is_healthy());
        assert_eq!(health.warnings, vec!["Pool is closed".to_string()]);
    }

    #[test]
    fn test_single_instance_pool_never_flags_skew() {
        let health = HealthStatus::evaluate(&[10], 10, false);
        assert!(health.is_healthy());
    }
}
