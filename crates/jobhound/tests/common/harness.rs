//! Test harness for isolated aggregator runs.
//!
//! The `TestHarness` owns a temporary directory with a file-backed database
//! and builds `JobAggregator`s over scripted provider chains, so several
//! aggregators in one test can share the same store.

#![allow(dead_code)]

use std::path::PathBuf;
use std::time::Duration;

use tempfile::TempDir;

use jobhound::config::ScrapeConfig;
use jobhound::db::Database;
use jobhound::{
    JobAggregator, JobStore, OperationSnapshot, Orchestrator, ProgressTracker, ProviderChain,
};

/// Per-provider budget used by harness aggregators.
pub const TEST_PROVIDER_TIMEOUT: Duration = Duration::from_millis(200);

/// Running operations a harness aggregator admits at once.
pub const TEST_MAX_OPERATIONS: u64 = 8;

pub struct TestHarness {
    temp_dir: TempDir,
    pub db_path: PathBuf,
    db: Database,
    grace_period: Duration,
    synthetic_fallback: bool,
}

impl TestHarness {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let db_path = temp_dir.path().join("data").join("jobhound.db");
        let db = Database::open(&db_path).expect("Failed to open test database");

        Self {
            temp_dir,
            db_path,
            db,
            grace_period: Duration::from_secs(10),
            synthetic_fallback: false,
        }
    }

    pub fn grace_period(mut self, grace: Duration) -> Self {
        self.grace_period = grace;
        self
    }

    pub fn synthetic_fallback(mut self, enabled: bool) -> Self {
        self.synthetic_fallback = enabled;
        self
    }

    pub fn store(&self) -> JobStore {
        JobStore::new(self.db.clone())
    }

    /// Builds an aggregator over the shared database.
    pub fn aggregator(&self, chains: Vec<ProviderChain>) -> JobAggregator {
        let mut orchestrator = Orchestrator::new(self.store(), &ScrapeConfig::default())
            .with_provider_timeout(TEST_PROVIDER_TIMEOUT)
            .with_synthetic_fallback(self.synthetic_fallback);
        for chain in chains {
            orchestrator.add_chain(chain);
        }
        let tracker = ProgressTracker::with_settings(self.grace_period, TEST_MAX_OPERATIONS, 256);
        JobAggregator::new(orchestrator, tracker).with_sweep_interval(Duration::from_millis(10))
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Polls until the operation reaches a terminal stage, returning every
/// snapshot observed along the way (the last one is terminal).
pub async fn poll_until_terminal(
    aggregator: &JobAggregator,
    operation_id: &str,
) -> Vec<OperationSnapshot> {
    let mut seen = Vec::new();
    for _ in 0..500 {
        let snapshot = aggregator.get_progress(operation_id);
        let terminal = snapshot.is_terminal();
        seen.push(snapshot);
        if terminal {
            return seen;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    panic!("operation {} never finished: {:?}", operation_id, seen.last());
}
