//! In-memory ordered store
//!
//! `MemoryEngine` is a `BTreeMap` behind a `parking_lot::RwLock`;
//! `InMemoryKvStore` is its async face. Batches are applied under a
//! single write lock, which gives the same all-or-nothing visibility as an
//! engine-level write batch.

use super::{
    BatchOp, KvEngine, KvPair, KvStore, ScanDirection, StoreError, StoreFuture, WriteBatch,
};
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;

/// Synchronous ordered map engine.
///
/// Clones share the same data, so a test can keep a handle for inspection
/// after moving another into a store.
#[derive(Debug, Default, Clone)]
pub struct MemoryEngine {
    data: Arc<RwLock<BTreeMap<Vec<u8>, Bytes>>>,
}

impl MemoryEngine {
    pub fn new() -> Self {
        MemoryEngine::default()
    }

    /// Number of stored records (for testing)
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Check if empty (for testing)
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// All keys in ascending order (for testing)
    pub fn keys(&self) -> Vec<Vec<u8>> {
        self.data.read().keys().cloned().collect()
    }

    fn collect<'a>(
        iter: impl DoubleEndedIterator<Item = (&'a Vec<u8>, &'a Bytes)>,
        direction: ScanDirection,
    ) -> Vec<KvPair> {
        let pairs = iter.map(|(k, v)| (k.clone(), v.clone()));
        match direction {
            ScanDirection::Ascending => pairs.collect(),
            ScanDirection::Descending => pairs.rev().collect(),
        }
    }
}

impl KvEngine for MemoryEngine {
    fn get(&self, key: &[u8]) -> Result<Option<Bytes>, StoreError> {
        Ok(self.data.read().get(key).cloned())
    }

    fn write(&self, batch: WriteBatch) -> Result<(), StoreError> {
        let mut data = self.data.write();
        for op in batch.into_ops() {
            match op {
                BatchOp::Put { key, value } => {
                    data.insert(key, value);
                }
                BatchOp::Delete { key } => {
                    data.remove(&key);
                }
            }
        }
        Ok(())
    }

    fn scan_prefix(&self, prefix: &[u8], direction: ScanDirection) -> Result<Vec<KvPair>, StoreError> {
        let data = self.data.read();
        let matching: Vec<(&Vec<u8>, &Bytes)> = data
            .range::<[u8], _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(|(k, _)| k.starts_with(prefix))
            .collect();
        Ok(Self::collect(matching.into_iter(), direction))
    }

    fn scan_range(
        &self,
        start: &[u8],
        end: &[u8],
        direction: ScanDirection,
    ) -> Result<Vec<KvPair>, StoreError> {
        if start > end {
            return Ok(Vec::new());
        }
        let data = self.data.read();
        let range = data.range::<[u8], _>((Bound::Included(start), Bound::Included(end)));
        Ok(Self::collect(range, direction))
    }
}

/// In-memory ordered key-value store for tests and the demo binary
#[derive(Debug, Default, Clone)]
pub struct InMemoryKvStore {
    engine: MemoryEngine,
}

impl InMemoryKvStore {
    pub fn new() -> Self {
        InMemoryKvStore::default()
    }

    /// Handle sharing this store's data
    pub fn engine(&self) -> MemoryEngine {
        self.engine.clone()
    }

    pub fn len(&self) -> usize {
        self.engine.len()
    }

    pub fn is_empty(&self) -> bool {
        self.engine.is_empty()
    }

    pub fn keys(&self) -> Vec<Vec<u8>> {
        self.engine.keys()
    }
}

impl KvStore for InMemoryKvStore {
    fn get<'a>(&'a self, key: &'a [u8]) -> StoreFuture<'a, Option<Bytes>> {
        Box::pin(async move { self.engine.get(key) })
    }

    fn write(&self, batch: WriteBatch) -> StoreFuture<'_, ()> {
        Box::pin(async move { self.engine.write(batch) })
    }

    fn scan_prefix<'a>(
        &'a self,
        prefix: &'a [u8],
        direction: ScanDirection,
    ) -> StoreFuture<'a, Vec<KvPair>> {
        Box::pin(async move { self.engine.scan_prefix(prefix, direction) })
    }

    fn scan_range<'a>(
        &'a self,
        start: &'a [u8],
        end: &'a [u8],
        direction: ScanDirection,
    ) -> StoreFuture<'a, Vec<KvPair>> {
        Box::pin(async move { self.engine.scan_range(start, end, direction) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch_of(pairs: &[(&str, &str)]) -> WriteBatch {
        let mut batch = WriteBatch::new();
        for (k, v) in pairs {
            batch.put(k.as_bytes().to_vec(), Bytes::copy_from_slice(v.as_bytes()));
        }
        batch
    }

    #[tokio::test]
    async fn test_put_get_delete() {
        let store = InMemoryKvStore::new();
        store.write(batch_of(&[("k1", "v1")])).await.unwrap();

        let value = store.get(b"k1").await.unwrap();
        assert_eq!(value, Some(Bytes::from_static(b"v1")));

        let mut batch = WriteBatch::new();
        batch.delete(b"k1".to_vec());
        store.write(batch).await.unwrap();
        assert_eq!(store.get(b"k1").await.unwrap(), None);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_later_op_wins() {
        let store = InMemoryKvStore::new();
        let mut batch = WriteBatch::new();
        batch.put(b"k".to_vec(), Bytes::from_static(b"old"));
        batch.delete(b"k".to_vec());
        batch.put(b"k".to_vec(), Bytes::from_static(b"new"));
        store.write(batch).await.unwrap();

        assert_eq!(
            store.get(b"k").await.unwrap(),
            Some(Bytes::from_static(b"new"))
        );
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_scan_prefix_both_directions() {
        let store = InMemoryKvStore::new();
        KvStore::write(
            &store,
            batch_of(&[("a:1", "x"), ("a:2", "y"), ("a;", "z"), ("b:1", "w")]),
        )
        .await
        .unwrap();

        let asc = store.scan_prefix(b"a:", ScanDirection::Ascending)
            .await
            .unwrap();
        let keys: Vec<Vec<u8>> = asc.into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec![b"a:1".to_vec(), b"a:2".to_vec()]);

        let desc = store.scan_prefix(b"a:", ScanDirection::Descending)
            .await
            .unwrap();
        assert_eq!(desc[0].0, b"a:2".to_vec());
    }

    #[tokio::test]
    async fn test_scan_range_inclusive() {
        let store = InMemoryKvStore::new();
        store.write(batch_of(&[("1", "a"), ("2", "b"), ("3", "c"), ("4", "d")]))
            .await
            .unwrap();

        let range = store.scan_range(b"2", b"3", ScanDirection::Ascending)
            .await
            .unwrap();
        assert_eq!(range.len(), 2);
        assert_eq!(range[0].0, b"2".to_vec());
        assert_eq!(range[1].0, b"3".to_vec());

        let empty = store.scan_range(b"4", b"1", ScanDirection::Ascending)
            .await
            .unwrap();
        assert!(empty.is_empty());
    }

    #[tokio::test]
    async fn test_clone_shares_data() {
        let store = InMemoryKvStore::new();
        let other = store.clone();
        store.write(batch_of(&[("shared", "1")])).await.unwrap();
        assert_eq!(other.len(), 1);
    }
}
