//! Metrics collection and export for affinity pools

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Point-in-time metrics for an affinity pool
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
/// {
///     let _guard = pool.acquire(7).unwrap();
///     let metrics = pool.get_metrics().unwrap();
///     assert_eq!(metrics.total_acquired, 1);
///     assert_eq!(metrics.active_bindings, 1);
/// }
/// ```
#[derive(Debug, Clone)]
#[cfg_attr(feature = "metrics", derive(serde::Serialize))]
pub struct AffinityMetrics {
    /// Total acquisitions served
    pub total_acquired: usize,

    /// Total acquisitions released
    pub total_released: usize,

    /// Total key bindings ever created
    pub bindings_created: usize,

    /// Keys currently bound to an instance
    pub active_bindings: usize,

    /// Number of instances in the pool
    pub instance_count: usize,

    /// Active holders per instance, in instance order
    pub instance_loads: Vec<usize>,

    /// Heaviest per-instance load
    pub max_load: usize,

    /// Lightest per-instance load
    pub min_load: usize,

    /// Fraction of instances with at least one active holder (0.0 to 1.0)
    pub utilization: f64,
}

impl AffinityMetrics {
    /// Export metrics as a HashMap
    pub fn export(&self) -> HashMap<String, String> {
        let mut metrics = HashMap::new();
        metrics.insert("total_acquired".to_string(), self.total_acquired.to_string());
        metrics.insert("total_released".to_string(), self.total_released.to_string());
        metrics.insert("bindings_created".to_string(), self.bindings_created.to_string());
        metrics.insert("active_bindings".to_string(), self.active_bindings.to_string());
        metrics.insert("instance_count".to_string(), self.instance_count.to_string());
        metrics.insert(
            "instance_loads".to_string(),
            self.instance_loads
                .iter()
                .map(|load| load.to_string())
                .collect::<Vec<_>>()
                .join(","),
        );
        metrics.insert("max_load".to_string(), self.max_load.to_string());
        metrics.insert("min_load".to_string(), self.min_load.to_string());
        metrics.insert("utilization".to_string(), format!("{:.2}", self.utilization));
        metrics
    }
}

/// Metrics exporter for Prometheus format
pub struct MetricsExporter;

impl MetricsExporter {
    /// Export metrics in Prometheus exposition format
    ///
    /// # Examples
    ///
    /// ```
    /// use affinity_pool::KeyAffinityBuilder;
    /// use std::collections::HashMap;
    ///
    /// let pool = KeyAffinityBuilder::new()
    ///     .factory(|| 0u8)
    ///     .count(2)
    ///     .build::<u32>()
    ///     .unwrap();
    ///
    /// let mut tags = HashMap::new();
    /// tags.insert("service".to_string(), "api".to_string());
    ///
    /// let output = pool.export_metrics_prometheus("my_pool", Some(&tags)).unwrap();
    /// assert!(output.contains("affinity_pool_bindings_active"));
    /// assert!(output.contains("service=\"api\""));
    /// ```
    pub fn export_prometheus(
        metrics: &AffinityMetrics,
        pool_name: &str,
        tags: Option<&HashMap<String, String>>,
    ) -> String {
        let mut output = String::new();
        let labels = Self::format_labels(pool_name, tags);

        // Gauge metrics
        output.push_str("# HELP affinity_pool_instances Number of pooled instances\n");
        output.push_str("# TYPE affinity_pool_instances gauge\n");
        output.push_str(&format!(
            "affinity_pool_instances{{{}}} {}\n",
            labels, metrics.instance_count
        ));

        output.push_str("# HELP affinity_pool_bindings_active Keys currently bound\n");
        output.push_str("# TYPE affinity_pool_bindings_active gauge\n");
        output.push_str(&format!(
            "affinity_pool_bindings_active{{{}}} {}\n",
            labels, metrics.active_bindings
        ));

        output.push_str("# HELP affinity_pool_utilization Fraction of busy instances\n");
        output.push_str("# TYPE affinity_pool_utilization gauge\n");
        output.push_str(&format!(
            "affinity_pool_utilization{{{}}} {:.2}\n",
            labels, metrics.utilization
        ));

        output.push_str("# HELP affinity_pool_load_max Heaviest per-instance load\n");
        output.push_str("# TYPE affinity_pool_load_max gauge\n");
        output.push_str(&format!(
            "affinity_pool_load_max{{{}}} {}\n",
            labels, metrics.max_load
        ));

        // Counter metrics
        output.push_str("# HELP affinity_pool_acquired_total Total acquisitions served\n");
        output.push_str("# TYPE affinity_pool_acquired_total counter\n");
        output.push_str(&format!(
            "affinity_pool_acquired_total{{{}}} {}\n",
            labels, metrics.total_acquired
        ));

        output.push_str("# HELP affinity_pool_released_total Total acquisitions released\n");
        output.push_str("# TYPE affinity_pool_released_total counter\n");
        output.push_str(&format!(
            "affinity_pool_released_total{{{}}} {}\n",
            labels, metrics.total_released
        ));

        output.push_str("# HELP affinity_pool_bindings_created_total Key bindings ever created\n");
        output.push_str("# TYPE affinity_pool_bindings_created_total counter\n");
        output.push_str(&format!(
            "affinity_pool_bindings_created_total{{{}}} {}\n",
            labels, metrics.bindings_created
        ));

        output
    }

    fn format_labels(pool_name: &str, tags: Option<&HashMap<String, String>>) -> String {
        let mut labels = vec![format!("pool=\"{}\"", pool_name)];

        if let Some(tags) = tags {
            for (key, value) in tags {
                labels.push(format!("{}=\"{}\"", key, value));
            }
        }

        labels.join(",")
    }
}

/// Internal metrics tracker
pub(crate) struct MetricsTracker {
    pub total_acquired: AtomicUsize,
    pub total_released: AtomicUsize,
    pub bindings_created: AtomicUsize,
}

impl MetricsTracker {
    pub fn new() -> Self {
        Self {
            total_acquired: AtomicUsize::new(0),
            total_released: AtomicUsize::new(0),
            bindings_created: AtomicUsize::new(0),
        }
    }

    pub fn snapshot(&self, active_bindings: usize, instance_loads: Vec<usize>) -> AffinityMetrics {
        let instance_count = instance_loads.len();
        let max_load = instance_loads.iter().copied().max().unwrap_or(0);
        let min_load = instance_loads.iter().copied().min().unwrap_or(0);
        let busy = instance_loads.iter().filter(|load| **load > 0).count();
        let utilization = if instance_count > 0 {
            busy as f64 / instance_count as f64
        } else {
            0.0
        };

        AffinityMetrics {
            total_acquired: self.total_acquired.load(Ordering::Relaxed),
            total_released: self.total_released.load(Ordering::Relaxed),
            bindings_created: self.bindings_created.load(Ordering::Relaxed),
            active_bindings,
            instance_count,
            instance_loads,
            max_load,
            min_load,
            utilization,
        }
    }
}

impl Default for MetricsTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_derives_load_stats() {
        let tracker = MetricsTracker::new();
        tracker.total_acquired.store(5, Ordering::Relaxed);
        tracker.total_released.store(3, Ordering::Relaxed);

        let metrics = tracker.snapshot(2, vec![2, 0, 1]);
        assert_eq!(metrics.total_acquired, 5);
        assert_eq!(metrics.total_released, 3);
        assert_eq!(metrics.instance_count, 3);
        assert_eq!(metrics.max_load, 2);
        assert_eq!(metrics.min_load, 0);
        assert!((metrics.utilization - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_export_contains_every_field() {
        let metrics = MetricsTracker::new().snapshot(0, vec![0, 0]);
        let exported = metrics.export();
        assert_eq!(exported.get("instance_count").unwrap(), "2");
        assert_eq!(exported.get("instance_loads").unwrap(), "0,0");
        assert_eq!(exported.get("utilization").unwrap(), "0.00");
    }

    #[test]
    fn test_prometheus_format_and_labels() {
        let metrics = MetricsTracker::new().snapshot(1, vec![1, 0]);
        let output = MetricsExporter::export_prometheus(&metrics, "workers", None);
        assert!(output.contains("# TYPE affinity_pool_instances gauge"));
        assert!(output.contains("affinity_pool_instances{pool=\"workers\"} 2"));
        assert!(output.contains("# TYPE affinity_pool_acquired_total counter"));
    }
}
