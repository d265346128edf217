//! Basic usage examples for affinity-pool

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use affinity_pool::KeyAffinityBuilder;

fn main() {
    println!("=== affinity-pool - Basic Examples ===\n");

    // Example 1: Key affinity
    key_affinity();

    // Example 2: Deferred construction
    deferred_construction();

    // Example 3: Strategy defaults
    strategy_defaults();

    // Example 4: Metrics and health
    metrics_and_health();
}

fn key_affinity() {
    println!("1. Key Affinity:");
    let ids = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&ids);
    let pool = KeyAffinityBuilder::new()
        .factory(move || counter.fetch_add(1, Ordering::Relaxed))
        .count(4)
        .build::<&str>()
        .unwrap();

    let first = pool.acquire("user-7").unwrap();
    let again = pool.acquire("user-7").unwrap();
    println!("   user-7 -> instance {}", *first);
    println!("   user-7 again -> instance {} (same instance)", *again);

    let other = pool.acquire("user-9").unwrap();
    println!("   user-9 -> instance {} (own instance)\n", *other);
}

fn deferred_construction() {
    println!("2. Deferred Construction:");
    let created = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&created);
    let pool = KeyAffinityBuilder::new()
        .factory(move || counter.fetch_add(1, Ordering::Relaxed))
        .count(3)
        .build::<u32>()
        .unwrap();

    println!("   Instances after build: {}", created.load(Ordering::Relaxed));

    let _guard = pool.acquire(1).unwrap();
    println!(
        "   Instances after first acquire: {}\n",
        created.load(Ordering::Relaxed)
    );
}

fn strategy_defaults() {
    println!("3. Strategy Defaults:");

    let small = KeyAffinityBuilder::new()
        .factory(|| ())
        .count(4)
        .build::<u32>()
        .unwrap();
    println!("   count = 4  -> {:?}", small.strategy());

    let large = KeyAffinityBuilder::new()
        .factory(|| ())
        .count(64)
        .build::<u32>()
        .unwrap();
    println!("   count = 64 -> {:?}", large.strategy());

    let forced = KeyAffinityBuilder::new()
        .factory(|| ())
        .count(64)
        .using_random(false)
        .build::<u32>()
        .unwrap();
    println!("   count = 64, using_random(false) -> {:?}\n", forced.strategy());
}

fn metrics_and_health() {
    println!("4. Metrics and Health:");
    let pool = KeyAffinityBuilder::new()
        .factory(|| ())
        .count(5)
        .build::<&str>()
        .unwrap();

    {
        let _a = pool.acquire("a").unwrap();
        let _b = pool.acquire("b").unwrap();

        let health = pool.get_health_status().unwrap();
        println!(
            "   Health: {}",
            if health.is_healthy() { "Healthy" } else { "Unhealthy" }
        );
        println!("   Utilization: {:.1}%", health.utilization * 100.0);
        println!(
            "   Bindings: {}, Instances: {}",
            health.active_bindings, health.instance_count
        );
    }

    let metrics = pool.export_metrics().unwrap();
    println!("\n   Metrics:");
    for (key, value) in metrics {
        println!("     {}: {}", key, value);
    }
}
