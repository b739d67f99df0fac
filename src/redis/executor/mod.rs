//! Command facade over the store-backed structures.
//!
//! The implementation is split across multiple files:
//!
//! - `mod.rs` (this file): core struct, constructor, shared plumbing
//! - `string_ops.rs`: GET, SET
//! - `key_ops.rs`: DEL, EXISTS, TYPE, full teardown and structure checks
//! - `list_ops.rs`: LLEN, LPUSH, RPUSH, LINSERT, LPOP, RPOP, LINDEX, LSET, LRANGE
//! - `set_ops.rs`: SADD, SISMEMBER, SMEMBERS, SREM, SCARD
//! - `sorted_set_ops.rs`: ZADD, ZCARD, ZREM, ZSCORE, ZMEMBERS
//! - `ordered_ops.rs`: payloads keyed by a plain numeric score
//!
//! Every command follows the same shape: acquire the gate for the key, load
//! the metadata, check the type tag, stage all changes into one batch, commit
//! once, release the gate. An error before the commit leaves the store as it
//! was.

mod key_ops;
mod list_ops;
mod ordered_ops;
mod set_ops;
mod sorted_set_ops;
mod string_ops;

pub use key_ops::KeyReport;

use super::error::{CommandError, CommandResult};
use super::gate::KeyGate;
use super::keys::KeyEncoder;
use super::linked_list::LinkedList;
use super::meta::{KeyMeta, KeyType, MetaStore, NodeStore};
use super::skiplist::{LevelGenerator, SkipListSession};
use crate::config::EngineConfig;
use crate::io::SimulatedRng;
use crate::store::{KvStore, WriteBatch};

/// Async command surface over one ordered store
pub struct CommandExecutor<S: KvStore> {
    store: S,
    keys: KeyEncoder,
    gate: KeyGate,
    levels: LevelGenerator,
}

impl<S: KvStore> CommandExecutor<S> {
    pub fn new(store: S, config: &EngineConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => SimulatedRng::new(seed),
            None => SimulatedRng::from_entropy(),
        };
        CommandExecutor {
            store,
            keys: KeyEncoder::new(&config.namespace),
            gate: KeyGate::new(config.gate_buckets),
            levels: LevelGenerator::new(rng, config.skiplist_min_height),
        }
    }

    pub fn with_defaults(store: S) -> Self {
        Self::new(store, &EngineConfig::default())
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn keys(&self) -> &KeyEncoder {
        &self.keys
    }

    pub fn gate(&self) -> &KeyGate {
        &self.gate
    }

    pub(crate) fn metas(&self) -> MetaStore<'_, S> {
        MetaStore::new(&self.store, &self.keys)
    }

    pub(crate) fn nodes(&self) -> NodeStore<'_, S> {
        NodeStore::new(&self.store, &self.keys)
    }

    pub(crate) fn list<'a>(&'a self, key: &'a [u8]) -> LinkedList<'a, S> {
        LinkedList::new(self.metas(), self.nodes(), key)
    }

    pub(crate) fn skiplist<'a>(&'a self, key: &'a [u8], meta: KeyMeta) -> SkipListSession<'a, S> {
        SkipListSession::new(self.metas(), self.nodes(), key, &self.levels, meta)
    }

    /// Load metadata and reject a key holding another type
    pub(crate) async fn load_typed(
        &self,
        key: &[u8],
        expected: KeyType,
    ) -> CommandResult<Option<KeyMeta>> {
        let meta = self.metas().load(key).await?;
        if let Some(meta) = &meta {
            check_type(key, meta, expected)?;
        }
        Ok(meta)
    }

    /// Like `load_typed`, but the key must exist
    pub(crate) async fn require_typed(&self, key: &[u8], expected: KeyType) -> CommandResult<KeyMeta> {
        self.load_typed(key, expected)
            .await?
            .ok_or_else(|| CommandError::NoSuchKey(key.to_vec()))
    }

    pub(crate) async fn commit(&self, key: &[u8], batch: WriteBatch) -> CommandResult<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let ops = batch.len();
        self.store.write(batch).await.map_err(|e| {
            tracing::warn!(key = %String::from_utf8_lossy(key), error = %e, "commit failed");
            CommandError::from(e)
        })?;
        tracing::trace!(key = %String::from_utf8_lossy(key), ops, "batch committed");
        Ok(())
    }
}

pub(crate) fn check_type(key: &[u8], meta: &KeyMeta, expected: KeyType) -> CommandResult<()> {
    if meta.key_type != expected {
        return Err(CommandError::WrongType {
            key: key.to_vec(),
            expected,
            actual: meta.key_type,
        });
    }
    Ok(())
}
