//! Key command implementations for CommandExecutor.
//!
//! Handles: DEL, EXISTS, TYPE, full teardown and structure checks

use super::CommandExecutor;
use crate::redis::error::{CommandError, CommandResult};
use crate::redis::keys::Role;
use crate::redis::meta::{KeyMeta, KeyType};
use crate::store::{KvStore, WriteBatch};

/// Result of a full structural check of one key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyReport {
    pub key_type: Option<KeyType>,
    pub length: u64,
    /// Populated skip-list levels (0 for other types)
    pub levels: usize,
    pub node_records: usize,
    pub data_records: usize,
}

impl<S: KvStore> CommandExecutor<S> {
    pub async fn exists(&self, key: &[u8]) -> CommandResult<bool> {
        Ok(self.key_type(key).await?.is_some())
    }

    pub async fn key_type(&self, key: &[u8]) -> CommandResult<Option<KeyType>> {
        tracing::debug!(key = %String::from_utf8_lossy(key), "TYPE");
        let _guard = self.gate().acquire(key).await;
        Ok(self.metas().load(key).await?.map(|meta| meta.key_type))
    }

    /// Remove the key; returns whether it existed
    pub async fn delete(&self, key: &[u8]) -> CommandResult<bool> {
        tracing::debug!(key = %String::from_utf8_lossy(key), "DEL");
        let _guard = self.gate().acquire(key).await;
        let meta = match self.metas().load(key).await? {
            Some(meta) => meta,
            None => return Ok(false),
        };

        let batch = self.teardown(key, meta).await?;
        self.commit(key, batch).await?;
        Ok(true)
    }

    /// Full type-dispatched teardown; a missing key is a no-op
    pub async fn delete_key(&self, key: &[u8]) -> CommandResult<()> {
        self.delete(key).await.map(|_| ())
    }

    async fn teardown(&self, key: &[u8], meta: KeyMeta) -> CommandResult<WriteBatch> {
        let key_type = meta.key_type;
        match key_type {
            KeyType::String => {
                let mut batch = WriteBatch::new();
                batch.delete(self.keys().value_key(key));
                self.metas().remove(key, &mut batch);
                Ok(batch)
            }
            KeyType::List => {
                let mut batch = WriteBatch::new();
                let removed = self.list(key).deconstruct(&meta, &mut batch).await?;
                tracing::debug!(key = %String::from_utf8_lossy(key), removed, "list torn down");
                Ok(batch)
            }
            KeyType::OrderedSet | KeyType::OrderedSetUnique | KeyType::SortedSet => {
                let mut session = self.skiplist(key, meta);
                let removed = session.deconstruct().await?;
                tracing::debug!(key = %String::from_utf8_lossy(key), %key_type, removed, "skip list torn down");
                let (_, batch) = session.finish()?;
                Ok(batch)
            }
        }
    }

    /// Walk the whole structure and compare it against the persisted records.
    ///
    /// Any broken link, length mismatch or orphaned record is a consistency fault.
    pub async fn check_key(&self, key: &[u8]) -> CommandResult<KeyReport> {
        let _guard = self.gate().acquire(key).await;
        let nodes = self.nodes();
        let node_keys = nodes.scan_records(key, Role::Node).await?;
        let data_keys = nodes.scan_records(key, Role::Data).await?;

        let meta = match self.metas().load(key).await? {
            Some(meta) => meta,
            None => {
                self.expect_records(key, &node_keys, 0)?;
                self.expect_records(key, &data_keys, 0)?;
                return Ok(KeyReport {
                    key_type: None,
                    length: 0,
                    levels: 0,
                    node_records: 0,
                    data_records: 0,
                });
            }
        };

        let mut levels = 0;
        let expected = match meta.key_type {
            KeyType::String => {
                if self.store().get(&self.keys().value_key(key)).await?.is_none() {
                    return Err(CommandError::consistency(format!(
                        "string '{}' has no value record",
                        String::from_utf8_lossy(key)
                    )));
                }
                0
            }
            KeyType::List => {
                if meta.length == 0 {
                    return Err(CommandError::consistency("empty list kept its metadata"));
                }
                self.list(key).verify(&meta).await?.len()
            }
            KeyType::OrderedSet | KeyType::OrderedSetUnique | KeyType::SortedSet => {
                if meta.length == 0 {
                    return Err(CommandError::consistency("empty skip list kept its metadata"));
                }
                let length = meta.length as usize;
                levels = self.skiplist(key, meta.clone()).verify().await?;
                length
            }
        };

        self.expect_records(key, &node_keys, expected)?;
        self.expect_records(key, &data_keys, expected)?;
        Ok(KeyReport {
            key_type: Some(meta.key_type),
            length: meta.length,
            levels,
            node_records: node_keys.len(),
            data_records: data_keys.len(),
        })
    }

    fn expect_records(&self, key: &[u8], records: &[Vec<u8>], expected: usize) -> CommandResult<()> {
        if records.len() == expected {
            return Ok(());
        }
        let sample = records
            .first()
            .and_then(|raw| self.keys().decode(raw))
            .and_then(|(_, _, id)| id)
            .map(|id| String::from_utf8_lossy(&id).into_owned())
            .unwrap_or_default();
        Err(CommandError::consistency(format!(
            "key '{}' has {} records where {} are linked (first: '{}')",
            String::from_utf8_lossy(key),
            records.len(),
            expected,
            sample
        )))
    }
}
