// affinity-pool - key-affinity resource pool
// Thread-safe, lazily constructed, with load-aware instance selection

// This is just a binary wrapper - the actual library is in lib.rs
// Run examples with: cargo run --example basic

use std::sync::atomic::{AtomicUsize, Ordering};

use affinity_pool::KeyAffinityBuilder;

static NEXT_ID: AtomicUsize = AtomicUsize::new(0);

fn main() {
    println!("=== affinity-pool ===");
    println!("See demos/ directory for usage examples");
    println!("Run: cargo run --example basic");
    println!();

    // Quick demo
    println!("Quick Demo:");
    let pool = KeyAffinityBuilder::new()
        .factory(|| NEXT_ID.fetch_add(1, Ordering::Relaxed))
        .count(3)
        .build::<&str>()
        .unwrap();

    let first = pool.acquire("alpha").unwrap();
    let again = pool.acquire("alpha").unwrap();
    println!("  alpha -> instance {}", *first);
    println!("  alpha again -> instance {} (same instance)", *again);

    drop(again);
    drop(first);
    println!(
        "  Active bindings after release: {}",
        pool.active_bindings().unwrap()
    );
}
