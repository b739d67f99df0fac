//! Set command implementations for CommandExecutor.
//!
//! Handles: SADD, SISMEMBER, SMEMBERS, SREM, SCARD
//!
//! Sets are skip lists ordered by the member bytes, so SMEMBERS is sorted.

use super::CommandExecutor;
use crate::redis::error::{CommandError, CommandResult};
use crate::redis::meta::{KeyMeta, KeyType, Score};
use crate::store::KvStore;
use bytes::Bytes;

impl<S: KvStore> CommandExecutor<S> {
    /// Returns `true` when the member was added
    pub async fn sadd(&self, key: &[u8], member: impl AsRef<[u8]>) -> CommandResult<bool> {
        tracing::debug!(key = %String::from_utf8_lossy(key), "SADD");
        let score = Score::Member(member.as_ref().to_vec());
        let _guard = self.gate().acquire(key).await;
        let meta = self
            .load_typed(key, KeyType::OrderedSetUnique)
            .await?
            .unwrap_or_else(|| KeyMeta::new(KeyType::OrderedSetUnique));

        let mut session = self.skiplist(key, meta);
        if session.contains(&score).await? {
            return Ok(false);
        }
        session.insert(score, Bytes::new()).await?;
        let (_, batch) = session.finish()?;
        self.commit(key, batch).await?;
        Ok(true)
    }

    /// Membership test; the key must exist
    pub async fn sismember(&self, key: &[u8], member: impl AsRef<[u8]>) -> CommandResult<bool> {
        tracing::debug!(key = %String::from_utf8_lossy(key), "SISMEMBER");
        let score = Score::Member(member.as_ref().to_vec());
        let _guard = self.gate().acquire(key).await;
        let meta = self.require_typed(key, KeyType::OrderedSetUnique).await?;
        self.skiplist(key, meta).contains(&score).await
    }

    /// Members in ascending byte order
    pub async fn smembers(&self, key: &[u8]) -> CommandResult<Vec<Bytes>> {
        tracing::debug!(key = %String::from_utf8_lossy(key), "SMEMBERS");
        let _guard = self.gate().acquire(key).await;
        let meta = match self.load_typed(key, KeyType::OrderedSetUnique).await? {
            Some(meta) => meta,
            None => return Ok(Vec::new()),
        };

        self.skiplist(key, meta)
            .all_scores()
            .await?
            .into_iter()
            .map(|score| match score {
                Score::Member(m) => Ok(Bytes::from(m)),
                other => Err(CommandError::consistency(format!(
                    "set '{}' holds non-member score {}",
                    String::from_utf8_lossy(key),
                    other
                ))),
            })
            .collect()
    }

    /// Returns `true` when the member was removed; a missing key is not an error
    pub async fn srem(&self, key: &[u8], member: impl AsRef<[u8]>) -> CommandResult<bool> {
        tracing::debug!(key = %String::from_utf8_lossy(key), "SREM");
        let score = Score::Member(member.as_ref().to_vec());
        let _guard = self.gate().acquire(key).await;
        let meta = match self.load_typed(key, KeyType::OrderedSetUnique).await? {
            Some(meta) => meta,
            None => return Ok(false),
        };

        let mut session = self.skiplist(key, meta);
        if !session.remove_by_score(&score).await? {
            return Ok(false);
        }
        let (_, batch) = session.finish()?;
        self.commit(key, batch).await?;
        Ok(true)
    }

    pub async fn scard(&self, key: &[u8]) -> CommandResult<u64> {
        tracing::debug!(key = %String::from_utf8_lossy(key), "SCARD");
        let _guard = self.gate().acquire(key).await;
        Ok(self
            .load_typed(key, KeyType::OrderedSetUnique)
            .await?
            .map_or(0, |meta| meta.length))
    }
}
