//! Deterministic Simulation Testing for Sets
//!
//! Shadow-state harness for the set commands:
//! - Deterministic random operation generation
//! - Members that need key escaping (`:`, `%`, raw bytes)
//! - Invariant checking after each operation
//! - Seed-based reproducibility for debugging

use super::error::CommandError;
use super::{simulated_executor, SimulatedExecutor};
use crate::io::simulation::SimulatedRng;
use crate::io::Rng;
use crate::store::SimulatedStoreConfig;
use std::collections::BTreeSet;

const KEY: &[u8] = b"dst:set";

/// Configuration for Set DST
#[derive(Debug, Clone)]
pub struct SetDSTConfig {
    /// Random seed for reproducibility
    pub seed: u64,
    /// Number of unique members to use
    pub num_members: usize,
    /// Probability of remove operation
    pub remove_prob: f64,
    /// Probability of a membership probe
    pub probe_prob: f64,
    /// Faults injected into the store
    pub store: SimulatedStoreConfig,
}

impl Default for SetDSTConfig {
    fn default() -> Self {
        SetDSTConfig {
            seed: 0,
            num_members: 100,
            remove_prob: 0.25,
            probe_prob: 0.1,
            store: SimulatedStoreConfig::no_faults(),
        }
    }
}

impl SetDSTConfig {
    pub fn new(seed: u64) -> Self {
        SetDSTConfig {
            seed,
            ..Default::default()
        }
    }

    /// Configuration with small member space (more collisions)
    pub fn small_members(seed: u64) -> Self {
        SetDSTConfig {
            seed,
            num_members: 10,
            remove_prob: 0.3,
            ..Default::default()
        }
    }

    /// Configuration with high churn (lots of removes)
    pub fn high_churn(seed: u64) -> Self {
        SetDSTConfig {
            seed,
            num_members: 50,
            remove_prob: 0.45,
            ..Default::default()
        }
    }

    pub fn with_faults(seed: u64) -> Self {
        SetDSTConfig {
            seed,
            num_members: 30,
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
pub enum SetOp {
    Add { member: Vec<u8> },
    Remove { member: Vec<u8> },
    IsMember { member: Vec<u8> },
}

/// Result of a Set DST run
#[derive(Debug, Clone)]
pub struct SetDSTResult {
    pub seed: u64,
    pub total_operations: u64,
    pub adds: u64,
    pub add_existed: u64,
    pub removes: u64,
    pub remove_not_found: u64,
    pub probes: u64,
    pub store_faults: u64,
    pub invariant_violations: Vec<String>,
    pub last_op: Option<SetOp>,
}

impl SetDSTResult {
    pub fn new(seed: u64) -> Self {
        SetDSTResult {
            seed,
            total_operations: 0,
            adds: 0,
            add_existed: 0,
            removes: 0,
            remove_not_found: 0,
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
            "Seed {}: {} ops (adds:{}, existed:{}, removes:{}, not_found:{}, probes:{}), {} store faults, {} violations",
            self.seed,
            self.total_operations,
            self.adds,
            self.add_existed,
            self.removes,
            self.remove_not_found,
            self.probes,
            self.store_faults,
            self.invariant_violations.len()
        )
    }
}

/// DST harness for the set commands
pub struct SetDSTHarness {
    config: SetDSTConfig,
    rng: SimulatedRng,
    executor: SimulatedExecutor,
    result: SetDSTResult,
    /// Expected members, kept in the same byte order the set reports
    expected_members: BTreeSet<Vec<u8>>,
}

impl SetDSTHarness {
    pub fn new(config: SetDSTConfig) -> Self {
        let rng = SimulatedRng::new(config.seed);
        SetDSTHarness {
            result: SetDSTResult::new(config.seed),
            executor: simulated_executor(config.seed, config.store.clone()),
            config,
            rng,
            expected_members: BTreeSet::new(),
        }
    }

    pub fn with_seed(seed: u64) -> Self {
        Self::new(SetDSTConfig::new(seed))
    }

    /// Every fifth member id carries bytes that must be escaped in keys
    fn random_member(&mut self) -> Vec<u8> {
        let idx = self.rng.gen_range(0, self.config.num_members as u64);
        if idx % 5 == 0 {
            let mut member = format!("raw:{}%", idx).into_bytes();
            member.extend_from_slice(&[0x00, 0xff, b' ']);
            member
        } else {
            format!("member:{}", idx).into_bytes()
        }
    }

    fn pick_op(&mut self) -> SetOp {
        let roll = self.rng.gen_range(0, 100);
        let remove = (self.config.remove_prob * 100.0) as u64;
        let probe = remove + (self.config.probe_prob * 100.0) as u64;
        let member = self.random_member();

        if roll < remove {
            SetOp::Remove { member }
        } else if roll < probe {
            SetOp::IsMember { member }
        } else {
            SetOp::Add { member }
        }
    }

    async fn apply(&mut self, op: &SetOp) -> Result<(), String> {
        match op {
            SetOp::Add { member } => {
                self.result.adds += 1;
                match self.executor.sadd(KEY, member).await {
                    Ok(added) => {
                        if !added {
                            self.result.add_existed += 1;
                        }
                        let expected = self.expected_members.insert(member.clone());
                        expect_eq("sadd result", added, expected)
                    }
                    Err(e) => self.expect_store_error(e),
                }
            }
            SetOp::Remove { member } => {
                self.result.removes += 1;
                match self.executor.srem(KEY, member).await {
                    Ok(removed) => {
                        if !removed {
                            self.result.remove_not_found += 1;
                        }
                        let expected = self.expected_members.remove(member);
                        expect_eq("srem result", removed, expected)
                    }
                    Err(e) => self.expect_store_error(e),
                }
            }
            SetOp::IsMember { member } => {
                self.result.probes += 1;
                match self.executor.sismember(KEY, member).await {
                    Ok(found) => {
                        expect_eq("sismember", found, self.expected_members.contains(member))
                    }
                    Err(e) if e.is_not_found() && self.expected_members.is_empty() => Ok(()),
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

    async fn check_invariants(&self) -> Result<(), String> {
        let store = self.executor.store();
        store.set_faults_enabled(false);
        let outcome = self.verify_against_model().await;
        store.set_faults_enabled(true);
        outcome
    }

    async fn verify_against_model(&self) -> Result<(), String> {
        let exec = &self.executor;

        // Invariant 1: Cardinality must match expected
        let card = exec.scard(KEY).await.map_err(|e| e.to_string())?;
        expect_eq("scard", card as usize, self.expected_members.len())?;

        // Invariant 2: Members come back sorted and match exactly
        let members: Vec<Vec<u8>> = exec
            .smembers(KEY)
            .await
            .map_err(|e| e.to_string())?
            .into_iter()
            .map(|m| m.to_vec())
            .collect();
        let expected: Vec<Vec<u8>> = self.expected_members.iter().cloned().collect();
        expect_eq("smembers", &members, &expected)?;

        // Invariant 3: Every level is ordered and the records match the links
        let report = exec.check_key(KEY).await.map_err(|e| e.to_string())?;
        expect_eq("node records", report.node_records, self.expected_members.len())?;

        // Invariant 4: An empty set leaves no metadata behind
        let exists = exec.exists(KEY).await.map_err(|e| e.to_string())?;
        expect_eq("exists", exists, !self.expected_members.is_empty())
    }

    pub async fn run(&mut self, operations: usize) {
        for _ in 0..operations {
            self.run_single_op().await;
            if !self.result.invariant_violations.is_empty() {
                break;
            }
        }
    }

    pub fn result(&self) -> &SetDSTResult {
        &self.result
    }

    pub fn expected_members(&self) -> &BTreeSet<Vec<u8>> {
        &self.expected_members
    }
}

fn expect_eq<T: PartialEq + std::fmt::Debug>(what: &str, actual: T, expected: T) -> Result<(), String> {
    if actual == expected {
        Ok(())
    } else {
        Err(format!("{} mismatch: actual={:?}, expected={:?}", what, actual, expected))
    }
}

/// Run a batch of DST tests
pub async fn run_set_batch(
    start_seed: u64,
    num_seeds: usize,
    ops_per_seed: usize,
    config_fn: fn(u64) -> SetDSTConfig,
) -> Vec<SetDSTResult> {
    let mut results = Vec::with_capacity(num_seeds);
    for i in 0..num_seeds {
        let seed = start_seed + i as u64;
        let mut harness = SetDSTHarness::new(config_fn(seed));
        harness.run(ops_per_seed).await;
        results.push(harness.result().clone());
    }
    results
}

/// Summarize batch results
pub fn summarize_set_batch(results: &[SetDSTResult]) -> String {
    let total = results.len();
    let passed = results.iter().filter(|r| r.is_success()).count();
    let failed = total - passed;
    let total_ops: u64 = results.iter().map(|r| r.total_operations).sum();
    let faults: u64 = results.iter().map(|r| r.store_faults).sum();

    let mut summary = format!(
        "Set DST Summary\n\
         ===============\n\
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
