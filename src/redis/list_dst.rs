//! Deterministic Simulation Testing for Lists
//!
//! VOPR-style harness driving the list commands against a `VecDeque` model:
//! - Deterministic random operation generation
//! - Optional store fault injection through `SimulatedKvStore`
//! - Invariant checking after each operation, including a full `check_key`
//! - Seed-based reproducibility for debugging
//!
//! A command that fails with a store error must leave the model untouched.

use super::error::CommandError;
use super::{simulated_executor, SimulatedExecutor};
use crate::io::simulation::SimulatedRng;
use crate::io::Rng;
use crate::store::SimulatedStoreConfig;
use std::collections::VecDeque;

const KEY: &[u8] = b"dst:list";

/// Configuration for List DST
#[derive(Debug, Clone)]
pub struct ListDSTConfig {
    /// Random seed for reproducibility
    pub seed: u64,
    /// Number of unique values to use
    pub num_values: usize,
    /// Probability of a removal (pop or indexed remove)
    pub remove_prob: f64,
    /// Probability of an insert at a random index
    pub insert_prob: f64,
    /// Probability of lset
    pub lset_prob: f64,
    /// Probability of a read (lindex, including out-of-range probes)
    pub read_prob: f64,
    /// Faults injected into the store
    pub store: SimulatedStoreConfig,
}

impl Default for ListDSTConfig {
    fn default() -> Self {
        ListDSTConfig {
            seed: 0,
            num_values: 100,
            remove_prob: 0.3,
            insert_prob: 0.15,
            lset_prob: 0.1,
            read_prob: 0.1,
            store: SimulatedStoreConfig::no_faults(),
        }
    }
}

impl ListDSTConfig {
    pub fn new(seed: u64) -> Self {
        ListDSTConfig {
            seed,
            ..Default::default()
        }
    }

    /// Configuration with high churn (lots of push/pop)
    pub fn high_churn(seed: u64) -> Self {
        ListDSTConfig {
            seed,
            num_values: 20,
            remove_prob: 0.45,
            insert_prob: 0.1,
            lset_prob: 0.02,
            read_prob: 0.05,
            store: SimulatedStoreConfig::no_faults(),
        }
    }

    /// Default mix with store failures on reads, scans and commits
    pub fn with_faults(seed: u64) -> Self {
        ListDSTConfig {
            seed,
            store: SimulatedStoreConfig {
                latency_range_us: (0, 0),
                ..SimulatedStoreConfig::high_chaos()
            },
            ..Default::default()
        }
    }
}

/// Operation type for logging
#[derive(Debug, Clone)]
pub enum ListOp {
    LPush { value: String },
    RPush { value: String },
    LInsert { index: i64, value: String },
    LPop,
    RPop,
    LRemove { index: i64 },
    LSet { index: i64, value: String },
    LIndex { index: i64 },
}

/// Result of a List DST run
#[derive(Debug, Clone)]
pub struct ListDSTResult {
    pub seed: u64,
    pub total_operations: u64,
    pub pushes: u64,
    pub inserts: u64,
    pub removes: u64,
    pub lsets: u64,
    pub reads: u64,
    pub store_faults: u64,
    pub invariant_violations: Vec<String>,
    pub last_op: Option<ListOp>,
}

impl ListDSTResult {
    pub fn new(seed: u64) -> Self {
        ListDSTResult {
            seed,
            total_operations: 0,
            pushes: 0,
            inserts: 0,
            removes: 0,
            lsets: 0,
            reads: 0,
            store_faults: 0,
            invariant_violations: Vec::new(),
            last_op: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.invariant_violations.is_empty()
    }

    pub fn summary(&self) -> String {
        format!(
            "Seed {}: {} ops (push:{}, insert:{}, remove:{}, lset:{}, read:{}), {} store faults, {} violations",
            self.seed,
            self.total_operations,
            self.pushes,
            self.inserts,
            self.removes,
            self.lsets,
            self.reads,
            self.store_faults,
            self.invariant_violations.len()
        )
    }
}

/// DST harness for the list commands
pub struct ListDSTHarness {
    config: ListDSTConfig,
    rng: SimulatedRng,
    executor: SimulatedExecutor,
    model: VecDeque<String>,
    result: ListDSTResult,
}

impl ListDSTHarness {
    pub fn new(config: ListDSTConfig) -> Self {
        let rng = SimulatedRng::new(config.seed);
        ListDSTHarness {
            result: ListDSTResult::new(config.seed),
            executor: simulated_executor(config.seed, config.store.clone()),
            config,
            rng,
            model: VecDeque::new(),
        }
    }

    pub fn with_seed(seed: u64) -> Self {
        Self::new(ListDSTConfig::new(seed))
    }

    fn random_value(&mut self) -> String {
        let idx = self.rng.gen_range(0, self.config.num_values as u64);
        format!("value:{}", idx)
    }

    /// Signed index in `-(len + slack)..len + slack`
    fn random_index(&mut self, slack: usize) -> i64 {
        let span = (self.model.len() + slack) as u64;
        let offset = self.rng.gen_range(0, span) as i64;
        if self.rng.coin() {
            offset
        } else {
            -offset - 1
        }
    }

    fn position(&self, index: i64, slack: usize) -> usize {
        if index >= 0 {
            index as usize
        } else {
            (self.model.len() + slack) - index.unsigned_abs() as usize
        }
    }

    fn pick_op(&mut self) -> ListOp {
        let roll = self.rng.gen_range(0, 100);
        let remove = (self.config.remove_prob * 100.0) as u64;
        let insert = remove + (self.config.insert_prob * 100.0) as u64;
        let lset = insert + (self.config.lset_prob * 100.0) as u64;
        let read = lset + (self.config.read_prob * 100.0) as u64;

        if roll < remove && !self.model.is_empty() {
            match self.rng.gen_range(0, 3) {
                0 => ListOp::LPop,
                1 => ListOp::RPop,
                _ => ListOp::LRemove {
                    index: self.random_index(0),
                },
            }
        } else if roll < insert {
            ListOp::LInsert {
                index: self.random_index(1),
                value: self.random_value(),
            }
        } else if roll < lset && !self.model.is_empty() {
            ListOp::LSet {
                index: self.random_index(0),
                value: self.random_value(),
            }
        } else if roll < read {
            // One past either end now and then, which must be rejected
            ListOp::LIndex {
                index: self.random_index(1),
            }
        } else if self.rng.coin() {
            ListOp::LPush {
                value: self.random_value(),
            }
        } else {
            ListOp::RPush {
                value: self.random_value(),
            }
        }
    }

    /// Apply `op` to the executor and, if it committed, to the model
    async fn apply(&mut self, op: &ListOp) -> Result<(), String> {
        match op {
            ListOp::LPush { value } => {
                self.result.pushes += 1;
                self.insert_at(0, value).await
            }
            ListOp::RPush { value } => {
                self.result.pushes += 1;
                self.insert_at(-1, value).await
            }
            ListOp::LInsert { index, value } => {
                self.result.inserts += 1;
                self.insert_at(*index, value).await
            }
            ListOp::LPop => self.remove_at(0).await,
            ListOp::RPop => self.remove_at(-1).await,
            ListOp::LRemove { index } => self.remove_at(*index).await,
            ListOp::LSet { index, value } => {
                self.result.lsets += 1;
                match self.executor.lset(KEY, *index, value.clone()).await {
                    Ok(()) => {
                        let position = self.position(*index, 0);
                        self.model[position] = value.clone();
                        Ok(())
                    }
                    Err(e) => self.expect_store_error(e),
                }
            }
            ListOp::LIndex { index } => {
                self.result.reads += 1;
                let len = self.model.len();
                let in_range = if *index >= 0 {
                    (*index as usize) < len
                } else {
                    index.unsigned_abs() as usize <= len
                };
                match (self.executor.lindex(KEY, *index).await, in_range) {
                    (Ok(value), true) => {
                        let expected = self.model[self.position(*index, 0)].clone();
                        expect_eq("lindex", value_str(&value), expected)
                    }
                    (Err(e), false) if e.is_validation() || e.is_not_found() => Ok(()),
                    (Err(e), _) => self.expect_store_error(e),
                    (Ok(_), false) => Err(format!("lindex {} accepted on length {}", index, len)),
                }
            }
        }
    }

    async fn insert_at(&mut self, index: i64, value: &str) -> Result<(), String> {
        let position = self.position(index, 1);
        match self.executor.linsert(KEY, index, value.to_string()).await {
            Ok(new_len) => {
                self.model.insert(position, value.to_string());
                expect_eq("length", new_len as usize, self.model.len())
            }
            Err(e) => self.expect_store_error(e),
        }
    }

    async fn remove_at(&mut self, index: i64) -> Result<(), String> {
        self.result.removes += 1;
        let position = self.position(index, 0);
        match self.executor.lremove(KEY, index).await {
            Ok(value) => {
                let expected = self.model.remove(position);
                expect_eq("removed value", Some(value_str(&value)), expected)
            }
            Err(e) => self.expect_store_error(e),
        }
    }

    fn expect_store_error(&mut self, e: CommandError) -> Result<(), String> {
        match e {
            CommandError::Store(_) => {
                self.result.store_faults += 1;
                Ok(())
            }
            other => Err(format!("unexpected error: {}", other)),
        }
    }

    async fn run_single_op(&mut self) {
        let op = self.pick_op();
        self.result.last_op = Some(op.clone());
        self.result.total_operations += 1;

        let outcome = match self.apply(&op).await {
            Ok(()) => self.check_invariants().await,
            Err(e) => Err(e),
        };
        if let Err(violation) = outcome {
            self.result.invariant_violations.push(format!(
                "Op #{}: {:?} - {}",
                self.result.total_operations, self.result.last_op, violation
            ));
        }
    }

    async fn check_invariants(&mut self) -> Result<(), String> {
        let store = self.executor.store();
        store.set_faults_enabled(false);
        let outcome = self.verify_against_model().await;
        store.set_faults_enabled(true);
        outcome
    }

    async fn verify_against_model(&self) -> Result<(), String> {
        let exec = &self.executor;

        // Invariant 1: Length must match the model
        let len = exec.llen(KEY).await.map_err(|e| e.to_string())?;
        expect_eq("llen", len as usize, self.model.len())?;

        // Invariant 2: Every element matches, in order
        let all = exec.lrange(KEY, 0, -1).await.map_err(|e| e.to_string())?;
        let all: Vec<String> = all.iter().map(|v| value_str(v)).collect();
        expect_eq("lrange", &all, &self.model.iter().cloned().collect::<Vec<_>>())?;

        // Invariant 3: Links, length and persisted records agree
        let report = exec.check_key(KEY).await.map_err(|e| e.to_string())?;
        expect_eq("check_key length", report.length as usize, self.model.len())?;

        // Invariant 4: The key disappears with its last element
        let exists = exec.exists(KEY).await.map_err(|e| e.to_string())?;
        expect_eq("exists", exists, !self.model.is_empty())
    }

    pub async fn run(&mut self, operations: usize) {
        for _ in 0..operations {
            self.run_single_op().await;
            if !self.result.invariant_violations.is_empty() {
                break;
            }
        }
    }

    pub fn result(&self) -> &ListDSTResult {
        &self.result
    }

    pub fn model(&self) -> &VecDeque<String> {
        &self.model
    }
}

fn value_str(value: &[u8]) -> String {
    String::from_utf8_lossy(value).into_owned()
}

fn expect_eq<T: PartialEq + std::fmt::Debug>(what: &str, actual: T, expected: T) -> Result<(), String> {
    if actual == expected {
        Ok(())
    } else {
        Err(format!("{} mismatch: actual={:?}, expected={:?}", what, actual, expected))
    }
}

/// Run a batch of DST tests
pub async fn run_list_batch(
    start_seed: u64,
    num_seeds: usize,
    ops_per_seed: usize,
    config_fn: fn(u64) -> ListDSTConfig,
) -> Vec<ListDSTResult> {
    let mut results = Vec::with_capacity(num_seeds);
    for i in 0..num_seeds {
        let seed = start_seed + i as u64;
        let mut harness = ListDSTHarness::new(config_fn(seed));
        harness.run(ops_per_seed).await;
        results.push(harness.result().clone());
    }
    results
}

/// Summarize batch results
pub fn summarize_list_batch(results: &[ListDSTResult]) -> String {
    let total = results.len();
    let passed = results.iter().filter(|r| r.is_success()).count();
    let failed = total - passed;
    let total_ops: u64 = results.iter().map(|r| r.total_operations).sum();
    let faults: u64 = results.iter().map(|r| r.store_faults).sum();

    let mut summary = format!(
        "List DST Summary\n\
         ================\n\
         Seeds: {} total, {} passed, {} failed\n\
         Total operations: {}\n\
         Store faults absorbed: {}\n",
        total, passed, failed, total_ops, faults
    );

    if failed > 0 {
        summary.push_str("\nFailed seeds:\n");
        for result in results.iter().filter(|r| !r.is_success()) {
            summary.push_str(&format!("  Seed {}: {}\n", result.seed, result.summary()));
            for violation in &result.invariant_violations {
                summary.push_str(&format!("    - {}\n", violation));
            }
        }
    }

    summary
}
