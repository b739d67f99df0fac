//! Ordered set command implementations for CommandExecutor.
//!
//! Handles: OADD, OGET, OREM, OSCORES
//!
//! An ordered set maps a plain numeric score to one payload. Adding an
//! existing score overwrites its payload in place.

use super::CommandExecutor;
use crate::redis::error::{CommandError, CommandResult};
use crate::redis::meta::{KeyMeta, KeyType, Score};
use crate::store::KvStore;
use bytes::Bytes;

impl<S: KvStore> CommandExecutor<S> {
    /// Returns `true` when a new score was inserted
    pub async fn oadd(&self, key: &[u8], score: f64, value: impl Into<Bytes>) -> CommandResult<bool> {
        tracing::debug!(key = %String::from_utf8_lossy(key), score, "OADD");
        let score = Score::Number(Score::checked(score)?);
        let value = value.into();
        let _guard = self.gate().acquire(key).await;
        let meta = self
            .load_typed(key, KeyType::OrderedSet)
            .await?
            .unwrap_or_else(|| KeyMeta::new(KeyType::OrderedSet));

        let mut session = self.skiplist(key, meta);
        let inserted = session.insert(score, value).await?;
        let (_, batch) = session.finish()?;
        self.commit(key, batch).await?;
        Ok(inserted)
    }

    pub async fn oget(&self, key: &[u8], score: f64) -> CommandResult<Option<Bytes>> {
        tracing::debug!(key = %String::from_utf8_lossy(key), score, "OGET");
        let score = Score::Number(Score::checked(score)?);
        let _guard = self.gate().acquire(key).await;
        match self.load_typed(key, KeyType::OrderedSet).await? {
            Some(meta) => self.skiplist(key, meta).find_value_by_score(&score).await,
            None => Ok(None),
        }
    }

    pub async fn orem(&self, key: &[u8], score: f64) -> CommandResult<bool> {
        tracing::debug!(key = %String::from_utf8_lossy(key), score, "OREM");
        let score = Score::Number(Score::checked(score)?);
        let _guard = self.gate().acquire(key).await;
        let meta = match self.load_typed(key, KeyType::OrderedSet).await? {
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

    /// All scores, ascending
    pub async fn oscores(&self, key: &[u8]) -> CommandResult<Vec<f64>> {
        tracing::debug!(key = %String::from_utf8_lossy(key), "OSCORES");
        let _guard = self.gate().acquire(key).await;
        let meta = match self.load_typed(key, KeyType::OrderedSet).await? {
            Some(meta) => meta,
            None => return Ok(Vec::new()),
        };

        self.skiplist(key, meta)
            .all_scores()
            .await?
            .into_iter()
            .map(|score| match score {
                Score::Number(n) => Ok(n),
                other => Err(CommandError::consistency(format!(
                    "ordered set '{}' holds non-numeric score {}",
                    String::from_utf8_lossy(key),
                    other
                ))),
            })
            .collect()
    }
}
