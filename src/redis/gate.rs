//! Per-key serialization gate
//!
//! Logical keys hash into a fixed number of buckets. Each live bucket owns a
//! reference-counted async mutex; the entry is created by the first waiter
//! and dropped by the last one, so memory stays bounded by the bucket count.
//! Two keys in the same bucket contend, which only over-serializes.

use ahash::AHashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

struct BucketEntry {
    users: usize,
    lock: Arc<AsyncMutex<()>>,
}

type BucketTable = Arc<Mutex<AHashMap<usize, BucketEntry>>>;

/// Bounded table of per-bucket async locks
pub struct KeyGate {
    buckets: usize,
    table: BucketTable,
}

impl KeyGate {
    pub fn new(buckets: usize) -> Self {
        debug_assert!(buckets > 0, "gate needs at least one bucket");
        KeyGate {
            buckets: buckets.max(1),
            table: Arc::new(Mutex::new(AHashMap::new())),
        }
    }

    /// Bucket a key maps to (crc32, stable across processes)
    pub fn bucket_for(&self, key: &[u8]) -> usize {
        crc32fast::hash(key) as usize % self.buckets
    }

    /// Wait for exclusive access to `key`'s bucket.
    ///
    /// The returned guard releases on drop, including when the awaiting task
    /// is cancelled before or after the lock is granted.
    pub async fn acquire(&self, key: &[u8]) -> KeyGuard {
        let bucket = self.bucket_for(key);
        let lock = {
            let mut table = self.table.lock();
            let entry = table.entry(bucket).or_insert_with(|| BucketEntry {
                users: 0,
                lock: Arc::new(AsyncMutex::new(())),
            });
            entry.users += 1;
            Arc::clone(&entry.lock)
        };
        let registration = Registration {
            bucket,
            table: Arc::clone(&self.table),
        };

        let guard = lock.lock_owned().await;
        tracing::trace!(bucket, "gate acquired");
        KeyGuard {
            _guard: guard,
            _registration: registration,
        }
    }

    /// Number of buckets with at least one holder or waiter
    pub fn active_buckets(&self) -> usize {
        self.table.lock().len()
    }
}

/// Decrements the bucket's user count on drop
struct Registration {
    bucket: usize,
    table: BucketTable,
}

impl Drop for Registration {
    fn drop(&mut self) {
        let mut table = self.table.lock();
        if let Some(entry) = table.get_mut(&self.bucket) {
            entry.users -= 1;
            if entry.users == 0 {
                table.remove(&self.bucket);
            }
        }
    }
}

/// Scoped ownership of one gate bucket.
///
/// Field order matters: the lock is released before the registration drops.
pub struct KeyGuard {
    _guard: OwnedMutexGuard<()>,
    _registration: Registration,
}
