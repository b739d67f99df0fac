//! Redis-style data structures persisted as records in an ordered key-value store.
//!
//! Strings, linked lists, sets and sorted sets are each decomposed into a
//! metadata record plus per-element node and payload records. Every command
//! stages its changes into one `WriteBatch`, so the store only ever observes
//! complete structures.

pub mod config;
pub mod io;
pub mod redis;
pub mod store;

pub use config::{ConfigError, EngineConfig};
pub use redis::{CommandError, CommandExecutor, CommandResult, KeyReport, KeyType};
pub use store::{BlockingKvStore, InMemoryKvStore, KvEngine, KvStore, StoreError, WriteBatch};
