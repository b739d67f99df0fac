//! Ordered Key-Value Store Abstraction
//!
//! Every structure in this crate is persisted as plain key/value records in an
//! ordered store. The store is an external collaborator; this module only pins
//! down the contract the engines rely on:
//!
//! - point reads
//! - atomic, all-or-nothing batch writes
//! - prefix and inclusive range scans in either direction
//!
//! Implementations:
//! - `InMemoryKvStore`: ordered in-memory map, for tests and the demo binary
//! - `BlockingKvStore`: adapts a blocking `KvEngine` by running every call on
//!   tokio's blocking pool
//! - `SimulatedKvStore`: wraps another store and injects faults for DST

mod blocking;
mod memory;
mod simulated;

pub use blocking::{BlockingKvStore, KvEngine};
pub use memory::{InMemoryKvStore, MemoryEngine};
pub use simulated::{SimulatedKvStore, SimulatedStoreConfig, SimulatedStoreStats};

use bytes::Bytes;
use std::future::Future;
use std::io::{Error as IoError, ErrorKind};
use std::pin::Pin;
use std::sync::Arc;

/// Boxed future returned by every `KvStore` call
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

/// A key and its value as returned by scans
pub type KvPair = (Vec<u8>, Bytes);

/// Error type for store operations
#[derive(Debug)]
pub enum StoreError {
    /// I/O error from the underlying engine
    Io(IoError),
    /// The engine reported corrupted data
    Corruption(String),
    /// The engine is closed or its worker pool is gone
    Unavailable(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Io(e) => write!(f, "store I/O error: {}", e),
            StoreError::Corruption(msg) => write!(f, "store corruption: {}", msg),
            StoreError::Unavailable(msg) => write!(f, "store unavailable: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<IoError> for StoreError {
    fn from(e: IoError) -> Self {
        match e.kind() {
            ErrorKind::InvalidData => StoreError::Corruption(e.to_string()),
            _ => StoreError::Io(e),
        }
    }
}

/// A single staged mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    Put { key: Vec<u8>, value: Bytes },
    Delete { key: Vec<u8> },
}

impl BatchOp {
    pub fn key(&self) -> &[u8] {
        match self {
            BatchOp::Put { key, .. } | BatchOp::Delete { key } => key,
        }
    }
}

/// Ordered set of mutations applied atomically by `KvStore::write`.
///
/// Ops are applied in insertion order, so a later op on the same key wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteBatch {
    ops: Vec<BatchOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        WriteBatch { ops: Vec::new() }
    }

    pub fn put(&mut self, key: impl Into<Vec<u8>>, value: impl Into<Bytes>) {
        self.ops.push(BatchOp::Put {
            key: key.into(),
            value: value.into(),
        });
    }

    pub fn delete(&mut self, key: impl Into<Vec<u8>>) {
        self.ops.push(BatchOp::Delete { key: key.into() });
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn ops(&self) -> &[BatchOp] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<BatchOp> {
        self.ops
    }
}

/// Iteration order for scans
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanDirection {
    Ascending,
    Descending,
}

/// Ordered key-value store consumed by the engines.
///
/// Follows the boxed-future shape of the object store trait so implementations
/// stay object safe and need no proc-macro support.
pub trait KvStore: Send + Sync + 'static {
    /// Point read
    fn get<'a>(&'a self, key: &'a [u8]) -> StoreFuture<'a, Option<Bytes>>;

    /// Apply every op in the batch atomically
    fn write(&self, batch: WriteBatch) -> StoreFuture<'_, ()>;

    /// All records whose key starts with `prefix`
    fn scan_prefix<'a>(
        &'a self,
        prefix: &'a [u8],
        direction: ScanDirection,
    ) -> StoreFuture<'a, Vec<KvPair>>;

    /// All records with `start <= key <= end`
    ///
    /// The commands only need prefix scans; this is for embedders walking
    /// raw records, e.g. across several logical keys.
    fn scan_range<'a>(
        &'a self,
        start: &'a [u8],
        end: &'a [u8],
        direction: ScanDirection,
    ) -> StoreFuture<'a, Vec<KvPair>>;
}

impl<T: KvStore> KvStore for Arc<T> {
    fn get<'a>(&'a self, key: &'a [u8]) -> StoreFuture<'a, Option<Bytes>> {
        (**self).get(key)
    }

    fn write(&self, batch: WriteBatch) -> StoreFuture<'_, ()> {
        (**self).write(batch)
    }

    fn scan_prefix<'a>(
        &'a self,
        prefix: &'a [u8],
        direction: ScanDirection,
    ) -> StoreFuture<'a, Vec<KvPair>> {
        (**self).scan_prefix(prefix, direction)
    }

    fn scan_range<'a>(
        &'a self,
        start: &'a [u8],
        end: &'a [u8],
        direction: ScanDirection,
    ) -> StoreFuture<'a, Vec<KvPair>> {
        (**self).scan_range(start, end, direction)
    }
}
