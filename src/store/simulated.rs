//! Simulated Store with Fault Injection
//!
//! DST wrapper around any `KvStore`. Faults are drawn from a seeded `Rng`, so a
//! failing seed replays the same fault schedule. A failed or timed-out write
//! never reaches the wrapped store.

use super::{KvPair, KvStore, ScanDirection, StoreError, StoreFuture, WriteBatch};
use crate::io::Rng;
use bytes::Bytes;
use parking_lot::Mutex;
use std::io::{Error as IoError, ErrorKind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Configuration for simulated fault injection
#[derive(Debug, Clone)]
pub struct SimulatedStoreConfig {
    /// Probability of a point read failing
    pub get_fail_prob: f64,
    /// Probability of a batch commit failing
    pub write_fail_prob: f64,
    /// Probability of a scan failing
    pub scan_fail_prob: f64,
    /// Probability of any call timing out
    pub timeout_prob: f64,
    /// Simulated latency range in microseconds (min, max)
    pub latency_range_us: (u64, u64),
}

impl Default for SimulatedStoreConfig {
    fn default() -> Self {
        SimulatedStoreConfig {
            get_fail_prob: 0.01,         // 1%
            write_fail_prob: 0.01,       // 1%
            scan_fail_prob: 0.01,        // 1%
            timeout_prob: 0.005,         // 0.5%
            latency_range_us: (0, 200), // up to 0.2ms
        }
    }
}

impl SimulatedStoreConfig {
    /// High chaos configuration for stress testing
    pub fn high_chaos() -> Self {
        SimulatedStoreConfig {
            get_fail_prob: 0.05,
            write_fail_prob: 0.10,
            scan_fail_prob: 0.05,
            timeout_prob: 0.02,
            latency_range_us: (0, 1_000),
        }
    }

    /// No faults - for baseline testing
    pub fn no_faults() -> Self {
        SimulatedStoreConfig {
            get_fail_prob: 0.0,
            write_fail_prob: 0.0,
            scan_fail_prob: 0.0,
            timeout_prob: 0.0,
            latency_range_us: (0, 0),
        }
    }
}

/// Statistics for fault injection
#[derive(Debug, Clone, Default)]
pub struct SimulatedStoreStats {
    pub get_attempts: u64,
    pub get_failures: u64,
    pub write_attempts: u64,
    pub write_failures: u64,
    pub scan_attempts: u64,
    pub scan_failures: u64,
    pub timeouts: u64,
}

struct SimulatedStoreInner<R: Rng> {
    rng: R,
    stats: SimulatedStoreStats,
}

#[derive(Clone, Copy)]
enum CallKind {
    Get,
    Write,
    Scan,
}

/// Store wrapper that injects faults before delegating
pub struct SimulatedKvStore<S: KvStore, R: Rng> {
    inner: S,
    config: SimulatedStoreConfig,
    state: Arc<Mutex<SimulatedStoreInner<R>>>,
    faults_enabled: AtomicBool,
}

impl<S: KvStore, R: Rng + 'static> SimulatedKvStore<S, R> {
    pub fn new(inner: S, rng: R, config: SimulatedStoreConfig) -> Self {
        SimulatedKvStore {
            inner,
            config,
            state: Arc::new(Mutex::new(SimulatedStoreInner {
                rng,
                stats: SimulatedStoreStats::default(),
            })),
            faults_enabled: AtomicBool::new(true),
        }
    }

    /// The wrapped store, bypassing fault injection
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Toggle fault injection; latency is still simulated while disabled
    pub fn set_faults_enabled(&self, enabled: bool) {
        self.faults_enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn stats(&self) -> SimulatedStoreStats {
        self.state.lock().stats.clone()
    }

    pub fn reset_stats(&self) {
        self.state.lock().stats = SimulatedStoreStats::default();
    }

    /// Roll the dice for one call. The state lock is released before any await.
    fn inject(&self, kind: CallKind) -> (Result<(), StoreError>, u64) {
        let faults = self.faults_enabled.load(Ordering::SeqCst);
        let mut s = self.state.lock();

        let fail_prob = match kind {
            CallKind::Get => {
                s.stats.get_attempts += 1;
                self.config.get_fail_prob
            }
            CallKind::Write => {
                s.stats.write_attempts += 1;
                self.config.write_fail_prob
            }
            CallKind::Scan => {
                s.stats.scan_attempts += 1;
                self.config.scan_fail_prob
            }
        };

        let (min, max) = self.config.latency_range_us;
        let latency_us = s.rng.gen_range(min, max);

        if faults && s.rng.gen_bool(self.config.timeout_prob) {
            s.stats.timeouts += 1;
            let err = IoError::new(ErrorKind::TimedOut, "simulated timeout");
            return (Err(StoreError::Io(err)), latency_us);
        }

        if faults && s.rng.gen_bool(fail_prob) {
            let label = match kind {
                CallKind::Get => {
                    s.stats.get_failures += 1;
                    "get"
                }
                CallKind::Write => {
                    s.stats.write_failures += 1;
                    "write"
                }
                CallKind::Scan => {
                    s.stats.scan_failures += 1;
                    "scan"
                }
            };
            let err = IoError::new(ErrorKind::Other, format!("simulated {} failure", label));
            return (Err(StoreError::Io(err)), latency_us);
        }

        (Ok(()), latency_us)
    }

    async fn gate(&self, kind: CallKind) -> Result<(), StoreError> {
        let (outcome, latency_us) = self.inject(kind);
        if latency_us > 0 {
            tokio::time::sleep(Duration::from_micros(latency_us)).await;
        }
        if let Err(e) = &outcome {
            tracing::trace!(error = %e, "injected store fault");
        }
        outcome
    }
}

impl<S: KvStore, R: Rng + 'static> KvStore for SimulatedKvStore<S, R> {
    fn get<'a>(&'a self, key: &'a [u8]) -> StoreFuture<'a, Option<Bytes>> {
        Box::pin(async move {
            self.gate(CallKind::Get).await?;
            self.inner.get(key).await
        })
    }

    fn write(&self, batch: WriteBatch) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            self.gate(CallKind::Write).await?;
            self.inner.write(batch).await
        })
    }

    fn scan_prefix<'a>(
        &'a self,
        prefix: &'a [u8],
        direction: ScanDirection,
    ) -> StoreFuture<'a, Vec<KvPair>> {
        Box::pin(async move {
            self.gate(CallKind::Scan).await?;
            self.inner.scan_prefix(prefix, direction).await
        })
    }

    fn scan_range<'a>(
        &'a self,
        start: &'a [u8],
        end: &'a [u8],
        direction: ScanDirection,
    ) -> StoreFuture<'a, Vec<KvPair>> {
        Box::pin(async move {
            self.gate(CallKind::Scan).await?;
            self.inner.scan_range(start, end, direction).await
        })
    }
}
