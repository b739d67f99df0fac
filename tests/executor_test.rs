//! Command scenarios across every value type
//!
//! Each test drives the public executor surface only and finishes with a
//! `check_key` walk, so structural breakage shows up even when the command
//! results look right.

use bytes::Bytes;
use redis_kv::redis::KeyType;
use redis_kv::{CommandError, CommandExecutor, EngineConfig, InMemoryKvStore};

fn executor() -> CommandExecutor<InMemoryKvStore> {
    CommandExecutor::new(InMemoryKvStore::new(), &EngineConfig::test())
}

// =============================================================================
// Lists
// =============================================================================

#[tokio::test]
async fn test_list_push_pop_delete_scenario() {
    let exec = executor();
    exec.lpush(b"k", "a").await.unwrap();
    exec.rpush(b"k", "b").await.unwrap();

    assert_eq!(exec.llen(b"k").await.unwrap(), 2);
    assert_eq!(exec.lindex(b"k", 0).await.unwrap(), "a");
    assert_eq!(exec.lindex(b"k", -1).await.unwrap(), "b");

    assert_eq!(exec.lpop(b"k").await.unwrap(), "a");
    assert_eq!(exec.llen(b"k").await.unwrap(), 1);

    exec.delete_key(b"k").await.unwrap();
    assert_eq!(exec.llen(b"k").await.unwrap(), 0);
    assert!(exec.store().is_empty(), "teardown must remove every record");
}

#[tokio::test]
async fn test_lindex_boundaries() {
    let exec = executor();
    for v in ["a", "b", "c"] {
        exec.rpush(b"k", v).await.unwrap();
    }

    assert_eq!(exec.lindex(b"k", 2).await.unwrap(), "c");
    assert_eq!(exec.lindex(b"k", -3).await.unwrap(), "a");

    let past_end = exec.lindex(b"k", 3).await.unwrap_err();
    assert!(matches!(past_end, CommandError::IndexOutOfRange { index: 3, length: 3 }));
    assert!(exec.lindex(b"k", -4).await.unwrap_err().is_validation());
}

#[tokio::test]
async fn test_lset_changes_only_its_index() {
    let exec = executor();
    for i in 0..9 {
        exec.rpush(b"k", format!("v{}", i)).await.unwrap();
    }
    exec.lset(b"k", 6, "six").await.unwrap();
    exec.lset(b"k", -8, "one").await.unwrap();

    let values = exec.lrange(b"k", 0, -1).await.unwrap();
    let expected = ["v0", "one", "v2", "v3", "v4", "v5", "six", "v7", "v8"];
    assert_eq!(values, expected.iter().map(|v| Bytes::from(*v)).collect::<Vec<_>>());
    exec.check_key(b"k").await.unwrap();
}

#[tokio::test]
async fn test_linsert_lands_where_asked_from_either_end() {
    let exec = executor();
    for v in ["a", "b", "c", "d", "e"] {
        exec.rpush(b"k", v).await.unwrap();
    }
    // Index 4 of 5 is walked from the tail
    exec.linsert(b"k", 4, "x").await.unwrap();
    // -6 of 6 is walked from the head; ends up second
    exec.linsert(b"k", -6, "y").await.unwrap();
    // -1 appends
    exec.linsert(b"k", -1, "z").await.unwrap();

    let values = exec.lrange(b"k", 0, -1).await.unwrap();
    assert_eq!(values, vec!["a", "y", "b", "c", "d", "x", "e", "z"]);
    exec.check_key(b"k").await.unwrap();
}

#[tokio::test]
async fn test_linsert_on_missing_key() {
    let exec = executor();
    assert!(exec.linsert(b"k", 1, "a").await.unwrap_err().is_validation());
    assert!(exec.store().is_empty());
    assert_eq!(exec.linsert(b"k", -1, "a").await.unwrap(), 1);
}

#[tokio::test]
async fn test_missing_list_errors_vs_empty_results() {
    let exec = executor();
    assert_eq!(exec.llen(b"none").await.unwrap(), 0);
    assert!(exec.lrange(b"none", 0, -1).await.unwrap().is_empty());

    assert!(exec.lpop(b"none").await.unwrap_err().is_not_found());
    assert!(exec.rpop(b"none").await.unwrap_err().is_not_found());
    assert!(exec.lindex(b"none", 0).await.unwrap_err().is_not_found());
    assert!(exec.lset(b"none", 0, "v").await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_lrange_clamps() {
    let exec = executor();
    for v in ["a", "b", "c", "d"] {
        exec.rpush(b"k", v).await.unwrap();
    }
    assert_eq!(exec.lrange(b"k", 1, 2).await.unwrap(), vec!["b", "c"]);
    assert_eq!(exec.lrange(b"k", -100, 100).await.unwrap().len(), 4);
    assert_eq!(exec.lrange(b"k", -2, -1).await.unwrap(), vec!["c", "d"]);
    assert!(exec.lrange(b"k", 3, 1).await.unwrap().is_empty());
    assert!(exec.lrange(b"k", 10, 20).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_list_rebuilt_after_emptying() {
    let exec = executor();
    exec.rpush(b"k", "a").await.unwrap();
    exec.rpush(b"k", "b").await.unwrap();
    exec.rpop(b"k").await.unwrap();
    exec.rpop(b"k").await.unwrap();
    assert!(!exec.exists(b"k").await.unwrap());

    // Sequence numbers restart; no stale node may collide
    exec.rpush(b"k", "c").await.unwrap();
    exec.rpush(b"k", "d").await.unwrap();
    assert_eq!(exec.lrange(b"k", 0, -1).await.unwrap(), vec!["c", "d"]);
    let report = exec.check_key(b"k").await.unwrap();
    assert_eq!(report.node_records, 2);
}

// =============================================================================
// Sets and Sorted Sets
// =============================================================================

#[tokio::test]
async fn test_srem_absent_is_idempotent() {
    let exec = executor();
    exec.sadd(b"s", "a").await.unwrap();
    exec.sadd(b"s", "b").await.unwrap();

    assert!(!exec.srem(b"s", "c").await.unwrap());
    assert_eq!(exec.smembers(b"s").await.unwrap(), vec!["a", "b"]);
}

#[tokio::test]
async fn test_zadd_rescore_scenario() {
    let exec = executor();
    exec.zadd(b"k", 1.0, "x").await.unwrap();
    exec.zadd(b"k", 2.0, "x").await.unwrap();

    assert_eq!(exec.zcard(b"k").await.unwrap(), 1);
    assert_eq!(exec.zscore(b"k", "x").await.unwrap(), Some(2.0));
    exec.check_key(b"k").await.unwrap();
}

#[tokio::test]
async fn test_skiplist_order_after_mixed_ops() {
    let exec = executor();
    for i in 0..60u32 {
        // Spread scores so inserts land before, between and after existing nodes
        let score = f64::from((i * 37) % 61) - 30.0;
        exec.zadd(b"z", score, format!("m{}", i)).await.unwrap();
    }
    for i in (0..60u32).step_by(3) {
        assert!(exec.zrem(b"z", format!("m{}", i)).await.unwrap());
    }

    let members = exec.zmembers(b"z").await.unwrap();
    assert_eq!(members.len(), 40);
    for pair in members.windows(2) {
        let ((m1, s1), (m2, s2)) = (&pair[0], &pair[1]);
        assert!(s1 < s2 || (s1 == s2 && m1 < m2), "not ascending: {:?}", pair);
    }

    let report = exec.check_key(b"z").await.unwrap();
    assert_eq!(report.length, 40);
}

#[tokio::test]
async fn test_set_teardown_with_many_levels() {
    let exec = executor();
    for i in 0..200 {
        exec.sadd(b"s", format!("member:{:03}", i)).await.unwrap();
    }
    let report = exec.check_key(b"s").await.unwrap();
    assert!(report.levels > 1);

    exec.delete_key(b"s").await.unwrap();
    assert!(exec.store().is_empty());
    assert_eq!(exec.scard(b"s").await.unwrap(), 0);
}

// =============================================================================
// Strings and Types
// =============================================================================

#[tokio::test]
async fn test_string_roundtrip_and_overwrite() {
    let exec = executor();
    assert_eq!(exec.get(b"s").await.unwrap(), None);
    exec.set(b"s", "one").await.unwrap();
    exec.set(b"s", "two").await.unwrap();
    assert_eq!(exec.get(b"s").await.unwrap().unwrap(), "two");
    assert_eq!(exec.key_type(b"s").await.unwrap(), Some(KeyType::String));
}

#[tokio::test]
async fn test_wrong_type_across_families() {
    let exec = executor();
    exec.set(b"s", "v").await.unwrap();
    exec.rpush(b"l", "v").await.unwrap();

    assert!(exec.lpush(b"s", "x").await.unwrap_err().is_validation());
    assert!(exec.zadd(b"l", 1.0, "x").await.unwrap_err().is_validation());
    assert!(exec.get(b"l").await.unwrap_err().is_validation());
    assert!(exec.set(b"l", "x").await.unwrap_err().is_validation());
    assert_eq!(exec.llen(b"l").await.unwrap(), 1);
}

#[tokio::test]
async fn test_keys_with_delimiters_stay_isolated() {
    let exec = executor();
    exec.rpush(b"a:b", "1").await.unwrap();
    exec.rpush(b"a", "2").await.unwrap();
    exec.rpush(b"a%3Ab", "3").await.unwrap();

    assert_eq!(exec.lrange(b"a:b", 0, -1).await.unwrap(), vec!["1"]);
    assert_eq!(exec.lrange(b"a", 0, -1).await.unwrap(), vec!["2"]);
    assert_eq!(exec.lrange(b"a%3Ab", 0, -1).await.unwrap(), vec!["3"]);

    exec.delete_key(b"a").await.unwrap();
    assert_eq!(exec.llen(b"a:b").await.unwrap(), 1);
    exec.check_key(b"a:b").await.unwrap();
}
