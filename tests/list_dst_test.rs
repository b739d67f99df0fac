//! List Deterministic Simulation Tests
//!
//! VOPR-style tests for the list commands with multiple seeds.

use redis_kv::redis::{run_list_batch, summarize_list_batch, ListDSTConfig, ListDSTHarness};

// =============================================================================
// Standard Configuration Tests - 100 Seeds
// =============================================================================

#[tokio::test]
async fn test_list_dst_100_seeds_standard() {
    let results = run_list_batch(0, 100, 200, ListDSTConfig::new).await;
    let summary = summarize_list_batch(&results);
    println!("{}", summary);

    let passed = results.iter().filter(|r| r.is_success()).count();
    assert_eq!(passed, 100, "All 100 seeds should pass with standard config");
}

#[tokio::test]
async fn test_list_dst_100_seeds_high_churn() {
    let results = run_list_batch(1000, 100, 200, ListDSTConfig::high_churn).await;
    let summary = summarize_list_batch(&results);
    println!("{}", summary);

    let passed = results.iter().filter(|r| r.is_success()).count();
    assert_eq!(passed, 100, "All 100 seeds should pass with high churn");
}

// =============================================================================
// Fault Injection
// =============================================================================

#[tokio::test]
async fn test_list_dst_50_seeds_with_store_faults() {
    let results = run_list_batch(2000, 50, 200, ListDSTConfig::with_faults).await;
    let summary = summarize_list_batch(&results);
    println!("{}", summary);

    let passed = results.iter().filter(|r| r.is_success()).count();
    assert_eq!(passed, 50, "Store faults must never leave a partial list");
    let faults: u64 = results.iter().map(|r| r.store_faults).sum();
    assert!(faults > 0, "chaos profile should inject faults");
}

// =============================================================================
// Stress Tests
// =============================================================================

#[tokio::test]
async fn test_list_dst_stress_2000_ops() {
    let mut harness = ListDSTHarness::with_seed(42);
    harness.run(2000).await;
    let result = harness.result();
    println!("Stress 2000 ops: {}", result.summary());
    assert!(result.is_success(), "2000 ops should maintain invariants");
}

#[tokio::test]
async fn test_list_dst_grows_long_lists() {
    // Mostly pushes and inserts, so indexed access walks from both ends
    let config = ListDSTConfig {
        remove_prob: 0.05,
        insert_prob: 0.3,
        lset_prob: 0.1,
        read_prob: 0.15,
        ..ListDSTConfig::new(7)
    };
    let mut harness = ListDSTHarness::new(config);
    harness.run(600).await;

    let result = harness.result();
    println!("Long list: {} (final length {})", result.summary(), harness.model().len());
    assert!(result.is_success(), "{:?}", result.invariant_violations);
    assert!(harness.model().len() > 200);
}

// =============================================================================
// Determinism
// =============================================================================

#[tokio::test]
async fn test_list_dst_same_seed_same_run() {
    let mut first = ListDSTHarness::new(ListDSTConfig::with_faults(314));
    let mut second = ListDSTHarness::new(ListDSTConfig::with_faults(314));
    first.run(300).await;
    second.run(300).await;

    assert_eq!(first.result().summary(), second.result().summary());
    assert_eq!(first.model(), second.model());
}
