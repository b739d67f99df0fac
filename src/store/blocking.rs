//! Blocking engine adapter
//!
//! Embedded engines expose synchronous calls. `BlockingKvStore` moves each call
//! onto tokio's blocking pool so the async command path suspends at every store
//! boundary instead of stalling a runtime worker.

use super::{KvPair, KvStore, ScanDirection, StoreError, StoreFuture, WriteBatch};
use bytes::Bytes;
use std::sync::Arc;

/// Synchronous ordered key-value engine
pub trait KvEngine: Send + Sync + 'static {
    fn get(&self, key: &[u8]) -> Result<Option<Bytes>, StoreError>;

    fn write(&self, batch: WriteBatch) -> Result<(), StoreError>;

    fn scan_prefix(&self, prefix: &[u8], direction: ScanDirection) -> Result<Vec<KvPair>, StoreError>;

    fn scan_range(
        &self,
        start: &[u8],
        end: &[u8],
        direction: ScanDirection,
    ) -> Result<Vec<KvPair>, StoreError>;
}

/// `KvStore` over a blocking engine
#[derive(Debug)]
pub struct BlockingKvStore<E: KvEngine> {
    engine: Arc<E>,
}

impl<E: KvEngine> BlockingKvStore<E> {
    pub fn new(engine: E) -> Self {
        BlockingKvStore {
            engine: Arc::new(engine),
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    async fn run<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&E) -> Result<T, StoreError> + Send + 'static,
    {
        let engine = Arc::clone(&self.engine);
        tokio::task::spawn_blocking(move || f(&engine))
            .await
            .map_err(|e| StoreError::Unavailable(format!("blocking worker failed: {}", e)))?
    }
}

impl<E: KvEngine> Clone for BlockingKvStore<E> {
    fn clone(&self) -> Self {
        BlockingKvStore {
            engine: Arc::clone(&self.engine),
        }
    }
}

impl<E: KvEngine> KvStore for BlockingKvStore<E> {
    fn get<'a>(&'a self, key: &'a [u8]) -> StoreFuture<'a, Option<Bytes>> {
        let key = key.to_vec();
        Box::pin(self.run(move |engine| engine.get(&key)))
    }

    fn write(&self, batch: WriteBatch) -> StoreFuture<'_, ()> {
        Box::pin(self.run(move |engine| engine.write(batch)))
    }

    fn scan_prefix<'a>(
        &'a self,
        prefix: &'a [u8],
        direction: ScanDirection,
    ) -> StoreFuture<'a, Vec<KvPair>> {
        let prefix = prefix.to_vec();
        Box::pin(self.run(move |engine| engine.scan_prefix(&prefix, direction)))
    }

    fn scan_range<'a>(
        &'a self,
        start: &'a [u8],
        end: &'a [u8],
        direction: ScanDirection,
    ) -> StoreFuture<'a, Vec<KvPair>> {
        let start = start.to_vec();
        let end = end.to_vec();
        Box::pin(self.run(move |engine| engine.scan_range(&start, &end, direction)))
    }
}
