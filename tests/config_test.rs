//! Configuration loading tests

use redis_kv::config::{DEFAULT_GATE_BUCKETS, DEFAULT_NAMESPACE};
use redis_kv::{CommandExecutor, ConfigError, EngineConfig, InMemoryKvStore};
use std::io::Write;

#[test]
fn test_load_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "namespace = \"app:structures\"").unwrap();
    writeln!(file, "gate_buckets = 16").unwrap();
    writeln!(file, "seed = 9").unwrap();

    let config = EngineConfig::from_file(file.path()).unwrap();
    assert_eq!(config.namespace, "app:structures");
    assert_eq!(config.gate_buckets, 16);
    assert_eq!(config.seed, Some(9));
}

#[test]
fn test_empty_document_uses_defaults() {
    let config = EngineConfig::from_toml_str("").unwrap();
    assert_eq!(config.namespace, DEFAULT_NAMESPACE);
    assert_eq!(config.gate_buckets, DEFAULT_GATE_BUCKETS);
    assert_eq!(config, EngineConfig::default());
}

#[test]
fn test_missing_file_and_bad_values() {
    let dir = tempfile::tempdir().unwrap();
    let missing = EngineConfig::from_file(dir.path().join("absent.toml"));
    assert!(matches!(missing, Err(ConfigError::Io(_))));

    assert!(matches!(
        EngineConfig::from_toml_str("gate_buckets = \"many\""),
        Err(ConfigError::Parse(_))
    ));
    assert!(matches!(
        EngineConfig::from_toml_str("skiplist_min_height = 0"),
        Err(ConfigError::Invalid(_))
    ));
}

#[tokio::test]
async fn test_namespace_from_config_prefixes_records() {
    let config = EngineConfig::from_toml_str("namespace = \"tenant-a\"\nseed = 1").unwrap();
    let exec = CommandExecutor::new(InMemoryKvStore::new(), &config);
    exec.rpush(b"k", "v").await.unwrap();
    exec.zadd(b"z", 1.0, "m").await.unwrap();

    let keys = exec.store().keys();
    assert!(!keys.is_empty());
    assert!(keys.iter().all(|k| k.starts_with(b"tenant-a:")));
}
