//! String command implementations for CommandExecutor.
//!
//! Handles: GET, SET

use super::CommandExecutor;
use crate::redis::error::{CommandError, CommandResult};
use crate::redis::meta::{KeyMeta, KeyType};
use crate::store::{KvStore, WriteBatch};
use bytes::Bytes;

impl<S: KvStore> CommandExecutor<S> {
    pub async fn get(&self, key: &[u8]) -> CommandResult<Option<Bytes>> {
        tracing::debug!(key = %String::from_utf8_lossy(key), "GET");
        let _guard = self.gate().acquire(key).await;
        if self.load_typed(key, KeyType::String).await?.is_none() {
            return Ok(None);
        }
        match self.store().get(&self.keys().value_key(key)).await? {
            Some(value) => Ok(Some(value)),
            None => Err(CommandError::consistency(format!(
                "string '{}' has metadata but no value",
                String::from_utf8_lossy(key)
            ))),
        }
    }

    pub async fn set(&self, key: &[u8], value: impl Into<Bytes>) -> CommandResult<()> {
        tracing::debug!(key = %String::from_utf8_lossy(key), "SET");
        let _guard = self.gate().acquire(key).await;
        let meta = match self.load_typed(key, KeyType::String).await? {
            Some(meta) => meta,
            None => {
                let mut meta = KeyMeta::new(KeyType::String);
                meta.length = 1;
                meta
            }
        };

        let mut batch = WriteBatch::new();
        self.metas().save(key, &meta, &mut batch)?;
        batch.put(self.keys().value_key(key), value.into());
        self.commit(key, batch).await
    }
}
