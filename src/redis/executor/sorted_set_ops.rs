//! Sorted set command implementations for CommandExecutor.
//!
//! Handles: ZADD, ZCARD, ZREM, ZSCORE, ZMEMBERS
//!
//! Nodes are keyed by `(score, member)`; the payload record is keyed by the
//! member alone and holds its current score, so ZSCORE is one point read.
//!
//! # TigerStyle Invariants
//!
//! - ZADD of an existing member never changes ZCARD
//! - a member appears under exactly one score

use super::CommandExecutor;
use crate::redis::error::{CommandError, CommandResult};
use crate::redis::meta::{decode_record, encode_record, KeyMeta, KeyType, Score};
use crate::store::KvStore;
use bytes::Bytes;

impl<S: KvStore> CommandExecutor<S> {
    async fn member_score(&self, key: &[u8], member: &[u8]) -> CommandResult<Option<f64>> {
        match self.nodes().member_data(key, member).await? {
            Some(raw) => Ok(Some(decode_record(&raw, "sorted set score")?)),
            None => Ok(None),
        }
    }

    /// Returns `true` when the member is new.
    ///
    /// An existing member with a different score is removed and re-inserted
    /// in the same batch.
    pub async fn zadd(&self, key: &[u8], score: f64, member: impl AsRef<[u8]>) -> CommandResult<bool> {
        tracing::debug!(key = %String::from_utf8_lossy(key), score, "ZADD");
        let score = Score::checked(score)?;
        let member = member.as_ref();
        let _guard = self.gate().acquire(key).await;
        let meta = self
            .load_typed(key, KeyType::SortedSet)
            .await?
            .unwrap_or_else(|| KeyMeta::new(KeyType::SortedSet));
        let pre_length = meta.length;

        let previous = if pre_length > 0 {
            self.member_score(key, member).await?
        } else {
            None
        };
        if previous.map(|old| old.total_cmp(&score).is_eq()) == Some(true) {
            return Ok(false);
        }

        let mut session = self.skiplist(key, meta);
        if let Some(old) = previous {
            if !session.remove_by_score(&Score::Pair(old, member.to_vec())).await? {
                return Err(CommandError::consistency(format!(
                    "sorted set '{}' member has a score record but no node",
                    String::from_utf8_lossy(key)
                )));
            }
        }
        session
            .insert(Score::Pair(score, member.to_vec()), encode_record(&score)?)
            .await?;
        let (meta, batch) = session.finish()?;

        // TigerStyle: Postcondition - re-adding never double counts
        debug_assert_eq!(
            meta.length,
            pre_length + u64::from(previous.is_none()),
            "Postcondition violated: ZADD must add at most one node"
        );

        self.commit(key, batch).await?;
        Ok(previous.is_none())
    }

    pub async fn zcard(&self, key: &[u8]) -> CommandResult<u64> {
        tracing::debug!(key = %String::from_utf8_lossy(key), "ZCARD");
        let _guard = self.gate().acquire(key).await;
        Ok(self
            .load_typed(key, KeyType::SortedSet)
            .await?
            .map_or(0, |meta| meta.length))
    }

    pub async fn zrem(&self, key: &[u8], member: impl AsRef<[u8]>) -> CommandResult<bool> {
        tracing::debug!(key = %String::from_utf8_lossy(key), "ZREM");
        let member = member.as_ref();
        let _guard = self.gate().acquire(key).await;
        let meta = match self.load_typed(key, KeyType::SortedSet).await? {
            Some(meta) => meta,
            None => return Ok(false),
        };
        let score = match self.member_score(key, member).await? {
            Some(score) => score,
            None => return Ok(false),
        };

        let mut session = self.skiplist(key, meta);
        if !session.remove_by_score(&Score::Pair(score, member.to_vec())).await? {
            return Err(CommandError::consistency(format!(
                "sorted set '{}' member has a score record but no node",
                String::from_utf8_lossy(key)
            )));
        }
        let (_, batch) = session.finish()?;
        self.commit(key, batch).await?;
        Ok(true)
    }

    pub async fn zscore(&self, key: &[u8], member: impl AsRef<[u8]>) -> CommandResult<Option<f64>> {
        tracing::debug!(key = %String::from_utf8_lossy(key), "ZSCORE");
        let _guard = self.gate().acquire(key).await;
        if self.load_typed(key, KeyType::SortedSet).await?.is_none() {
            return Ok(None);
        }
        self.member_score(key, member.as_ref()).await
    }

    /// `(member, score)` pairs ordered by score, then member
    pub async fn zmembers(&self, key: &[u8]) -> CommandResult<Vec<(Bytes, f64)>> {
        tracing::debug!(key = %String::from_utf8_lossy(key), "ZMEMBERS");
        let _guard = self.gate().acquire(key).await;
        let meta = match self.load_typed(key, KeyType::SortedSet).await? {
            Some(meta) => meta,
            None => return Ok(Vec::new()),
        };

        self.skiplist(key, meta)
            .all_scores()
            .await?
            .into_iter()
            .map(|score| match score {
                Score::Pair(n, m) => Ok((Bytes::from(m), n)),
                other => Err(CommandError::consistency(format!(
                    "sorted set '{}' holds score {} without a member",
                    String::from_utf8_lossy(key),
                    other
                ))),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::executor;
    use bytes::Bytes;

    #[tokio::test]
    async fn test_readd_with_new_score_replaces() {
        let exec = executor();
        assert!(exec.zadd(b"z", 1.0, "x").await.unwrap());
        assert!(!exec.zadd(b"z", 2.0, "x").await.unwrap());

        assert_eq!(exec.zcard(b"z").await.unwrap(), 1);
        assert_eq!(exec.zscore(b"z", "x").await.unwrap(), Some(2.0));
        let report = exec.check_key(b"z").await.unwrap();
        assert_eq!(report.node_records, 1);
        assert_eq!(report.data_records, 1);
    }

    #[tokio::test]
    async fn test_readd_same_score_is_noop() {
        let exec = executor();
        exec.zadd(b"z", 1.5, "x").await.unwrap();
        let before = exec.store().keys();
        assert!(!exec.zadd(b"z", 1.5, "x").await.unwrap());
        assert_eq!(exec.store().keys(), before);
    }

    #[tokio::test]
    async fn test_members_order_by_score_then_member() {
        let exec = executor();
        exec.zadd(b"z", 2.0, "b").await.unwrap();
        exec.zadd(b"z", 1.0, "c").await.unwrap();
        exec.zadd(b"z", 2.0, "a").await.unwrap();
        exec.zadd(b"z", -3.0, "d").await.unwrap();

        let members = exec.zmembers(b"z").await.unwrap();
        assert_eq!(
            members,
            vec![
                (Bytes::from_static(b"d"), -3.0),
                (Bytes::from_static(b"c"), 1.0),
                (Bytes::from_static(b"a"), 2.0),
                (Bytes::from_static(b"b"), 2.0),
            ]
        );
    }

    #[tokio::test]
    async fn test_zrem_and_missing() {
        let exec = executor();
        exec.zadd(b"z", 1.0, "x").await.unwrap();
        exec.zadd(b"z", 2.0, "y").await.unwrap();

        assert!(exec.zrem(b"z", "x").await.unwrap());
        assert!(!exec.zrem(b"z", "x").await.unwrap());
        assert!(!exec.zrem(b"none", "x").await.unwrap());
        assert_eq!(exec.zscore(b"z", "x").await.unwrap(), None);
        assert_eq!(exec.zscore(b"none", "x").await.unwrap(), None);
        assert_eq!(exec.zcard(b"z").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_nan_rejected_before_any_write() {
        let exec = executor();
        let err = exec.zadd(b"z", f64::NAN, "x").await.unwrap_err();
        assert!(err.is_validation());
        assert!(exec.store().is_empty());
    }
}
