use futures::future::join_all;
use redis_kv::io::SimulatedRng;
use redis_kv::redis::{run_list_batch, run_sorted_set_batch, summarize_list_batch};
use redis_kv::redis::{ListDSTConfig, SortedSetDSTConfig};
use redis_kv::store::{MemoryEngine, SimulatedKvStore, SimulatedStoreConfig};
use redis_kv::{BlockingKvStore, CommandExecutor, EngineConfig, InMemoryKvStore};
use std::error::Error;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

type MainResult = Result<(), Box<dyn Error>>;

#[tokio::main]
async fn main() -> MainResult {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => EngineConfig::from_file(&path)?,
        None => EngineConfig::default(),
    };
    tracing::info!(namespace = %config.namespace, buckets = config.gate_buckets, "engine configured");

    println!("=== Redis KV Structures ===\n");

    test_lists(&config).await?;
    test_sets(&config).await?;
    test_concurrent_pushes(&config).await?;
    test_blocking_engine(&config).await?;
    test_fault_injection(&config).await?;
    test_simulation_sweep().await;

    println!("\n=== All scenarios completed successfully! ===");
    Ok(())
}

async fn test_lists(config: &EngineConfig) -> MainResult {
    println!("--- Test 1: Linked Lists ---");

    let exec = CommandExecutor::new(InMemoryKvStore::new(), config);
    for value in ["b", "c", "d"] {
        exec.rpush(b"letters", value).await?;
    }
    exec.lpush(b"letters", "a").await?;
    exec.linsert(b"letters", 2, "b2").await?;
    exec.lset(b"letters", -1, "D").await?;
    let popped = exec.lremove(b"letters", 1).await?;

    let values = exec.lrange(b"letters", 0, -1).await?;
    let report = exec.check_key(b"letters").await?;

    println!("  ✓ Removed {:?}, remaining {:?}", popped, values);
    println!("  ✓ {} nodes, {} records in store\n", report.length, exec.store().len());
    Ok(())
}

async fn test_sets(config: &EngineConfig) -> MainResult {
    println!("--- Test 2: Sets and Sorted Sets ---");

    let exec = CommandExecutor::new(InMemoryKvStore::new(), config);
    for member in ["pear", "apple", "fig", "apple"] {
        exec.sadd(b"fruit", member).await?;
    }
    for (score, member) in [(3.0, "carol"), (1.5, "alice"), (2.0, "bob"), (0.5, "carol")] {
        exec.zadd(b"board", score, member).await?;
    }

    let members = exec.smembers(b"fruit").await?;
    let board = exec.zmembers(b"board").await?;
    let report = exec.check_key(b"board").await?;

    println!("  ✓ Set members (sorted): {:?}", members);
    println!("  ✓ Leaderboard: {:?}", board);
    println!("  ✓ Skip list uses {} levels\n", report.levels);
    Ok(())
}

async fn test_concurrent_pushes(config: &EngineConfig) -> MainResult {
    println!("--- Test 3: Concurrent Pushes ---");

    let exec = Arc::new(CommandExecutor::new(InMemoryKvStore::new(), config));
    let tasks = (0..64).map(|i| {
        let exec = Arc::clone(&exec);
        tokio::spawn(async move { exec.rpush(b"queue", format!("job:{}", i)).await })
    });
    for outcome in join_all(tasks).await {
        outcome??;
    }

    let length = exec.llen(b"queue").await?;
    exec.check_key(b"queue").await?;
    assert_eq!(length, 64, "every push must land exactly once");

    println!("  ✓ 64 concurrent RPUSH calls produced length {}\n", length);
    Ok(())
}

async fn test_blocking_engine(config: &EngineConfig) -> MainResult {
    println!("--- Test 4: Blocking Engine Adapter ---");

    let exec = CommandExecutor::new(BlockingKvStore::new(MemoryEngine::new()), config);
    exec.set(b"greeting", "hello").await?;
    for i in 0..10 {
        exec.oadd(b"readings", i as f64 * 0.5, format!("r{}", i)).await?;
    }
    let value = exec.get(b"greeting").await?;
    let scores = exec.oscores(b"readings").await?;

    println!("  ✓ GET greeting = {:?}", value);
    println!("  ✓ {} ordered scores via spawn_blocking\n", scores.len());
    Ok(())
}

async fn test_fault_injection(config: &EngineConfig) -> MainResult {
    println!("--- Test 5: Fault Injection ---");

    let store = SimulatedKvStore::new(
        InMemoryKvStore::new(),
        SimulatedRng::new(42),
        SimulatedStoreConfig::high_chaos(),
    );
    let exec = CommandExecutor::new(store, config);

    let mut committed = 0u64;
    let mut rejected = 0u64;
    for i in 0..200 {
        match exec.rpush(b"events", format!("e{}", i)).await {
            Ok(_) => committed += 1,
            Err(e) if e.is_fatal() => return Err(e.into()),
            Err(_) => rejected += 1,
        }
    }

    exec.store().set_faults_enabled(false);
    let length = exec.llen(b"events").await?;
    exec.check_key(b"events").await?;
    assert_eq!(length, committed, "failed commits must not leave partial state");

    let stats = exec.store().stats();
    println!("  ✓ {} commits, {} rejected, length {}", committed, rejected, length);
    println!(
        "  ✓ Injected: {} get, {} write, {} timeouts\n",
        stats.get_failures, stats.write_failures, stats.timeouts
    );
    Ok(())
}

async fn test_simulation_sweep() {
    println!("--- Test 6: Deterministic Simulation Sweep ---");

    let lists = run_list_batch(0, 10, 200, ListDSTConfig::with_faults).await;
    println!("{}", summarize_list_batch(&lists));

    let zsets = run_sorted_set_batch(0, 10, 200, SortedSetDSTConfig::small_keyspace).await;
    let passed = zsets.iter().filter(|r| r.is_success()).count();
    println!("  ✓ Sorted sets: {}/{} seeds passed", passed, zsets.len());
}
