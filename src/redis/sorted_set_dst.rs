//! Deterministic Simulation Testing for Sorted Sets
//!
//! Drives ZADD/ZREM/ZSCORE against a member -> score map and checks after
//! every operation that:
//! - ZCARD matches the model
//! - ZMEMBERS is ordered by score, then member, with each member exactly once
//! - every member's ZSCORE agrees with its position in ZMEMBERS
//! - the persisted skip list passes `check_key`

use super::error::CommandError;
use super::{simulated_executor, SimulatedExecutor};
use crate::io::simulation::SimulatedRng;
use crate::io::Rng;
use crate::store::SimulatedStoreConfig;
use std::collections::BTreeMap;

const KEY: &[u8] = b"dst:zset";

/// Configuration for Sorted Set DST
#[derive(Debug, Clone)]
pub struct SortedSetDSTConfig {
    /// Random seed for reproducibility
    pub seed: u64,
    /// Number of unique members to use (creates a bounded member space)
    pub num_members: usize,
    /// Probability of remove operation
    pub remove_prob: f64,
    /// Probability of a ZSCORE probe
    pub score_prob: f64,
    /// Scores are drawn in half steps from `[-max_score, max_score)`
    pub max_score: f64,
    /// Faults injected into the store
    pub store: SimulatedStoreConfig,
}

impl Default for SortedSetDSTConfig {
    fn default() -> Self {
        SortedSetDSTConfig {
            seed: 0,
            num_members: 100,
            remove_prob: 0.2,
            score_prob: 0.1,
            max_score: 1000.0,
            store: SimulatedStoreConfig::no_faults(),
        }
    }
}

impl SortedSetDSTConfig {
    /// Standard configuration with given seed
    pub fn new(seed: u64) -> Self {
        SortedSetDSTConfig {
            seed,
            ..Default::default()
        }
    }

    /// Few members and few scores: many re-adds, ties and same-score no-ops
    pub fn small_keyspace(seed: u64) -> Self {
        SortedSetDSTConfig {
            seed,
            num_members: 10,
            remove_prob: 0.25,
            max_score: 3.0,
            ..Default::default()
        }
    }

    pub fn with_faults(seed: u64) -> Self {
        SortedSetDSTConfig {
            seed,
            num_members: 20,
            max_score: 10.0,
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
pub enum SortedSetOp {
    Add { member: String, score: f64 },
    Remove { member: String },
    Score { member: String },
}

/// Result of a Sorted Set DST run
#[derive(Debug, Clone)]
pub struct SortedSetDSTResult {
    /// Seed used
    pub seed: u64,
    /// Total operations executed
    pub total_operations: u64,
    /// Add operations that created a member
    pub adds: u64,
    /// Add operations on an existing member
    pub updates: u64,
    /// Remove operations
    pub removes: u64,
    pub probes: u64,
    pub store_faults: u64,
    /// Invariant violations found (with operation context)
    pub invariant_violations: Vec<String>,
    /// Last operation before failure (if any)
    pub last_op: Option<SortedSetOp>,
}

impl SortedSetDSTResult {
    pub fn new(seed: u64) -> Self {
        SortedSetDSTResult {
            seed,
            total_operations: 0,
            adds: 0,
            updates: 0,
            removes: 0,
            probes: 0,
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
            "Seed {}: {} ops ({} adds, {} updates, {} removes, {} probes), {} store faults, {} violations",
            self.seed,
            self.total_operations,
            self.adds,
            self.updates,
            self.removes,
            self.probes,
            self.store_faults,
            self.invariant_violations.len()
        )
    }
}

/// DST harness for the sorted set commands
pub struct SortedSetDSTHarness {
    config: SortedSetDSTConfig,
    rng: SimulatedRng,
    executor: SimulatedExecutor,
    /// member -> score
    model: BTreeMap<String, f64>,
    result: SortedSetDSTResult,
}

impl SortedSetDSTHarness {
    pub fn new(config: SortedSetDSTConfig) -> Self {
        let rng = SimulatedRng::new(config.seed);
        SortedSetDSTHarness {
            result: SortedSetDSTResult::new(config.seed),
            executor: simulated_executor(config.seed, config.store.clone()),
            config,
            rng,
            model: BTreeMap::new(),
        }
    }

    pub fn with_seed(seed: u64) -> Self {
        Self::new(SortedSetDSTConfig::new(seed))
    }

    /// Generate a random member key
    fn random_member(&mut self) -> String {
        let idx = self.rng.gen_range(0, self.config.num_members as u64);
        format!("member:{}", idx)
    }

    /// Generate a random score
    fn random_score(&mut self) -> f64 {
        let steps = (self.config.max_score * 4.0) as u64;
        let raw = self.rng.gen_range(0, steps.max(1));
        raw as f64 / 2.0 - self.config.max_score
    }

    fn pick_op(&mut self) -> SortedSetOp {
        let roll = self.rng.gen_range(0, 100);
        let remove = (self.config.remove_prob * 100.0) as u64;
        let probe = remove + (self.config.score_prob * 100.0) as u64;
        let member = self.random_member();

        if roll < remove {
            SortedSetOp::Remove { member }
        } else if roll < probe {
            SortedSetOp::Score { member }
        } else {
            let score = self.random_score();
            SortedSetOp::Add { member, score }
        }
    }

    async fn apply(&mut self, op: &SortedSetOp) -> Result<(), String> {
        match op {
            SortedSetOp::Add { member, score } => match self.executor.zadd(KEY, *score, member).await {
                Ok(is_new) => {
                    if is_new {
                        self.result.adds += 1;
                    } else {
                        self.result.updates += 1;
                    }
                    let previous = self.model.insert(member.clone(), *score);
                    expect_eq("zadd result", is_new, previous.is_none())
                }
                Err(e) => self.expect_store_error(e),
            },
            SortedSetOp::Remove { member } => {
                self.result.removes += 1;
                match self.executor.zrem(KEY, member).await {
                    Ok(removed) => {
                        let previous = self.model.remove(member);
                        expect_eq("zrem result", removed, previous.is_some())
                    }
                    Err(e) => self.expect_store_error(e),
                }
            }
            SortedSetOp::Score { member } => {
                self.result.probes += 1;
                match self.executor.zscore(KEY, member).await {
                    Ok(score) => expect_eq("zscore", score, self.model.get(member).copied()),
                    Err(e) => self.expect_store_error(e),
                }
            }
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

    /// Run a single random operation
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

    /// Check all invariants with fault injection paused
    async fn check_invariants(&self) -> Result<(), String> {
        let store = self.executor.store();
        store.set_faults_enabled(false);
        let outcome = self.verify_against_model().await;
        store.set_faults_enabled(true);
        outcome
    }

    async fn verify_against_model(&self) -> Result<(), String> {
        let exec = &self.executor;

        // Invariant 1: cardinality matches the model
        let card = exec.zcard(KEY).await.map_err(|e| e.to_string())?;
        expect_eq("zcard", card as usize, self.model.len())?;

        // Invariant 2: ordered by (score, member), members exactly once
        let members: Vec<(String, f64)> = exec
            .zmembers(KEY)
            .await
            .map_err(|e| e.to_string())?
            .into_iter()
            .map(|(m, s)| (String::from_utf8_lossy(&m).into_owned(), s))
            .collect();
        let mut expected: Vec<(String, f64)> =
            self.model.iter().map(|(m, s)| (m.clone(), *s)).collect();
        expected.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        expect_eq("zmembers", &members, &expected)?;

        // Invariant 3: point lookups agree with the ordered walk
        for (member, score) in &members {
            let lookup = exec.zscore(KEY, member).await.map_err(|e| e.to_string())?;
            if lookup != Some(*score) {
                return Err(format!(
                    "Score mismatch for '{}': range={}, lookup={:?}",
                    member, score, lookup
                ));
            }
        }

        // Invariant 4: one node and one score record per member
        let report = exec.check_key(KEY).await.map_err(|e| e.to_string())?;
        expect_eq("node records", report.node_records, self.model.len())?;
        expect_eq("data records", report.data_records, self.model.len())
    }

    /// Run specified number of operations
    pub async fn run(&mut self, operations: usize) {
        for _ in 0..operations {
            self.run_single_op().await;

            // Stop early if we hit a violation
            if !self.result.invariant_violations.is_empty() {
                break;
            }
        }
    }

    /// Get the result
    pub fn result(&self) -> &SortedSetDSTResult {
        &self.result
    }

    pub fn model(&self) -> &BTreeMap<String, f64> {
        &self.model
    }
}

fn expect_eq<T: PartialEq + std::fmt::Debug>(what: &str, actual: T, expected: T) -> Result<(), String> {
    if actual == expected {
        Ok(())
    } else {
        Err(format!("{} mismatch: actual={:?}, expected={:?}", what, actual, expected))
    }
}

/// Run a batch of DST tests with different seeds
pub async fn run_sorted_set_batch(
    start_seed: u64,
    num_seeds: usize,
    ops_per_seed: usize,
    config_fn: fn(u64) -> SortedSetDSTConfig,
) -> Vec<SortedSetDSTResult> {
    let mut results = Vec::with_capacity(num_seeds);
    for i in 0..num_seeds {
        let seed = start_seed + i as u64;
        let mut harness = SortedSetDSTHarness::new(config_fn(seed));
        harness.run(ops_per_seed).await;
        results.push(harness.result().clone());
    }
    results
}

/// Summarize batch results
pub fn summarize_sorted_set_batch(results: &[SortedSetDSTResult]) -> String {
    let total = results.len();
    let passed = results.iter().filter(|r| r.is_success()).count();
    let failed = total - passed;
    let total_ops: u64 = results.iter().map(|r| r.total_operations).sum();
    let faults: u64 = results.iter().map(|r| r.store_faults).sum();

    let mut summary = format!(
        "Sorted Set DST Summary\n\
         ======================\n\
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
