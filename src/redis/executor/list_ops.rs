//! List command implementations for CommandExecutor.
//!
//! Handles: LLEN, LPUSH, RPUSH, LINSERT, LPOP, RPOP, LREMOVE, LINDEX, LSET, LRANGE
//!
//! # TigerStyle Invariants
//!
//! - LPUSH/RPUSH/LINSERT: result length = pre_length + 1
//! - LPOP/RPOP/LREMOVE: result length = pre_length - 1; the key disappears at 0
//! - LLEN: 0 for a missing key
//! - LINDEX/LSET: index must satisfy -length <= index < length

use super::CommandExecutor;
use crate::redis::error::CommandResult;
use crate::redis::linked_list::{format_index, INSERT_SLACK};
use crate::redis::meta::KeyType;
use crate::store::{KvStore, WriteBatch};
use bytes::Bytes;

impl<S: KvStore> CommandExecutor<S> {
    pub async fn llen(&self, key: &[u8]) -> CommandResult<u64> {
        tracing::debug!(key = %String::from_utf8_lossy(key), "LLEN");
        let _guard = self.gate().acquire(key).await;
        Ok(self
            .load_typed(key, KeyType::List)
            .await?
            .map_or(0, |meta| meta.length))
    }

    pub async fn lpush(&self, key: &[u8], value: impl Into<Bytes>) -> CommandResult<u64> {
        self.linsert(key, 0, value).await
    }

    pub async fn rpush(&self, key: &[u8], value: impl Into<Bytes>) -> CommandResult<u64> {
        self.linsert(key, -1, value).await
    }

    /// Insert so the element ends up at `index` (`0` prepends, `-1` appends).
    ///
    /// Returns the new length.
    pub async fn linsert(&self, key: &[u8], index: i64, value: impl Into<Bytes>) -> CommandResult<u64> {
        tracing::debug!(key = %String::from_utf8_lossy(key), index, "LINSERT");
        let value = value.into();
        let _guard = self.gate().acquire(key).await;
        let list = self.list(key);
        let mut batch = WriteBatch::new();

        let length = match self.load_typed(key, KeyType::List).await? {
            Some(mut meta) => {
                let pre_length = meta.length;
                let length = list.insert(&mut meta, index, value, &mut batch).await?;

                // TigerStyle: Postcondition - length increased by one
                debug_assert_eq!(
                    length,
                    pre_length + 1,
                    "Postcondition violated: LINSERT length must increase by one"
                );
                length
            }
            None => {
                format_index(0, index, INSERT_SLACK)?;
                list.create(value, &mut batch)?.length
            }
        };

        self.commit(key, batch).await?;
        Ok(length)
    }

    pub async fn lpop(&self, key: &[u8]) -> CommandResult<Bytes> {
        self.lremove(key, 0).await
    }

    pub async fn rpop(&self, key: &[u8]) -> CommandResult<Bytes> {
        self.lremove(key, -1).await
    }

    /// Remove and return the element at `index`
    pub async fn lremove(&self, key: &[u8], index: i64) -> CommandResult<Bytes> {
        tracing::debug!(key = %String::from_utf8_lossy(key), index, "LREMOVE");
        let _guard = self.gate().acquire(key).await;
        let mut meta = self.require_typed(key, KeyType::List).await?;
        let pre_length = meta.length;

        let mut batch = WriteBatch::new();
        let value = self
            .list(key)
            .remove(&mut meta, index, &mut batch)
            .await?;

        // TigerStyle: Postcondition - length decreased by one
        debug_assert_eq!(
            meta.length + 1,
            pre_length,
            "Postcondition violated: LREMOVE length must decrease by one"
        );

        self.commit(key, batch).await?;
        Ok(value)
    }

    pub async fn lindex(&self, key: &[u8], index: i64) -> CommandResult<Bytes> {
        tracing::debug!(key = %String::from_utf8_lossy(key), index, "LINDEX");
        let _guard = self.gate().acquire(key).await;
        let meta = self.require_typed(key, KeyType::List).await?;
        self.list(key).get(&meta, index).await
    }

    pub async fn lset(&self, key: &[u8], index: i64, value: impl Into<Bytes>) -> CommandResult<()> {
        tracing::debug!(key = %String::from_utf8_lossy(key), index, "LSET");
        let value = value.into();
        let _guard = self.gate().acquire(key).await;
        let meta = self.require_typed(key, KeyType::List).await?;

        let mut batch = WriteBatch::new();
        self.list(key).set(&meta, index, value, &mut batch).await?;
        self.commit(key, batch).await
    }

    /// Elements from `start` to `stop` inclusive; out-of-range bounds are clamped
    pub async fn lrange(&self, key: &[u8], start: i64, stop: i64) -> CommandResult<Vec<Bytes>> {
        tracing::debug!(key = %String::from_utf8_lossy(key), start, stop, "LRANGE");
        let _guard = self.gate().acquire(key).await;
        match self.load_typed(key, KeyType::List).await? {
            Some(meta) => {
                let values = self.list(key).range(&meta, start, stop).await?;
                debug_assert!(values.len() as u64 <= meta.length);
                Ok(values)
            }
            None => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::executor;
    use crate::redis::error::CommandError;

    #[tokio::test]
    async fn test_push_pop_scenario() {
        let exec = executor();
        assert_eq!(exec.llen(b"l").await.unwrap(), 0);

        assert_eq!(exec.lpush(b"l", "a").await.unwrap(), 1);
        assert_eq!(exec.rpush(b"l", "b").await.unwrap(), 2);
        assert_eq!(exec.llen(b"l").await.unwrap(), 2);
        assert_eq!(exec.lindex(b"l", 0).await.unwrap(), "a");
        assert_eq!(exec.lindex(b"l", -1).await.unwrap(), "b");

        assert_eq!(exec.lpop(b"l").await.unwrap(), "a");
        assert_eq!(exec.llen(b"l").await.unwrap(), 1);

        exec.delete_key(b"l").await.unwrap();
        assert_eq!(exec.llen(b"l").await.unwrap(), 0);
        assert!(exec.store().is_empty());
    }

    #[tokio::test]
    async fn test_index_boundaries() {
        let exec = executor();
        for v in ["a", "b", "c"] {
            exec.rpush(b"l", v).await.unwrap();
        }

        assert_eq!(exec.lindex(b"l", 2).await.unwrap(), "c");
        assert_eq!(exec.lindex(b"l", -3).await.unwrap(), "a");
        assert!(exec.lindex(b"l", 3).await.unwrap_err().is_validation());
        assert!(exec.lindex(b"l", -4).await.unwrap_err().is_validation());
    }

    #[tokio::test]
    async fn test_lset_changes_only_target() {
        let exec = executor();
        for v in ["a", "b", "c", "d", "e"] {
            exec.rpush(b"l", v).await.unwrap();
        }
        exec.lset(b"l", 3, "X").await.unwrap();
        exec.lset(b"l", -5, "Y").await.unwrap();

        let all = exec.lrange(b"l", 0, -1).await.unwrap();
        assert_eq!(all, vec!["Y", "b", "c", "X", "e"]);
    }

    #[tokio::test]
    async fn test_linsert_middle_and_negative() {
        let exec = executor();
        for v in ["a", "b", "c", "d"] {
            exec.rpush(b"l", v).await.unwrap();
        }
        // Past the middle: walked from the tail
        exec.linsert(b"l", 3, "x").await.unwrap();
        exec.linsert(b"l", -2, "y").await.unwrap();
        exec.linsert(b"l", 1, "z").await.unwrap();

        let all = exec.lrange(b"l", 0, -1).await.unwrap();
        assert_eq!(all, vec!["a", "z", "b", "c", "x", "y", "d"]);
        exec.check_key(b"l").await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_key_errors() {
        let exec = executor();
        assert!(exec.lpop(b"none").await.unwrap_err().is_not_found());
        assert!(exec.lindex(b"none", 0).await.unwrap_err().is_not_found());
        assert!(exec.lset(b"none", 0, "v").await.unwrap_err().is_not_found());
        assert!(exec.lrange(b"none", 0, -1).await.unwrap().is_empty());

        let err = exec.linsert(b"none", 1, "v").await.unwrap_err();
        assert!(matches!(err, CommandError::IndexOutOfRange { index: 1, length: 0 }));
        assert!(exec.store().is_empty());
    }

    #[tokio::test]
    async fn test_lrange_clamps() {
        let exec = executor();
        for v in ["a", "b", "c"] {
            exec.rpush(b"l", v).await.unwrap();
        }
        assert_eq!(exec.lrange(b"l", -100, 100).await.unwrap().len(), 3);
        assert_eq!(exec.lrange(b"l", 1, 1).await.unwrap(), vec!["b"]);
        assert!(exec.lrange(b"l", 2, 1).await.unwrap().is_empty());
        assert!(exec.lrange(b"l", 5, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rpop_until_empty_removes_key() {
        let exec = executor();
        for v in ["a", "b"] {
            exec.rpush(b"l", v).await.unwrap();
        }
        assert_eq!(exec.rpop(b"l").await.unwrap(), "b");
        assert_eq!(exec.rpop(b"l").await.unwrap(), "a");
        assert!(!exec.exists(b"l").await.unwrap());
        assert!(exec.rpop(b"l").await.unwrap_err().is_not_found());
    }
}
