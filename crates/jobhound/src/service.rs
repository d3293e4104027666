//! Service surface: start scrapes, poll their progress, and read or
//! export the stored jobs.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures_util::FutureExt;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::db::Database;
use crate::error::{ConfigError, ExportError, OperationError, Result, ValidationError};
use crate::export::{self, ExportScope};
use crate::orchestrator::{Orchestrator, ScrapeRequest, ScrapeSummary, ValidatedScrape};
use crate::progress::{self, OperationProgress, OperationSnapshot, ProgressTracker};
use crate::store::{ClearSummary, Job, JobStore};

/// Default number of rows returned by [`JobAggregator::list_latest`].
pub const DEFAULT_LATEST_LIMIT: u64 = 50;

const LISTING_TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

/// A stored job as shown in listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobListing {
    pub id: i64,
    pub title: String,
    pub company: String,
    pub location: String,
    pub sources: Vec<String>,
    pub source_url: String,
    pub scraped_at: String,
}

impl From<Job> for JobListing {
    fn from(job: Job) -> Self {
        Self {
            scraped_at: job.scraped_at.format(LISTING_TIME_FORMAT).to_string(),
            id: job.id,
            title: job.title,
            company: job.company,
            location: job.location,
            sources: job.sources.into_iter().collect(),
            source_url: job.source_url,
        }
    }
}

type RunningMap = HashMap<String, CancellationToken>;

pub struct JobAggregator {
    orchestrator: Arc<Orchestrator>,
    tracker: ProgressTracker,
    running: Arc<Mutex<RunningMap>>,
    sweep_interval: Duration,
}

impl JobAggregator {
    pub fn new(orchestrator: Orchestrator, tracker: ProgressTracker) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
            tracker,
            running: Arc::new(Mutex::new(HashMap::new())),
            sweep_interval: Duration::from_secs(5),
        }
    }

    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Opens the configured database and builds HTTP feed chains.
    pub fn from_config(config: &Config) -> Result<Self> {
        let path = config
            .resolved_database_path()
            .ok_or_else(|| ConfigError::Validation {
                message: "Cannot determine database path: no home directory".to_string(),
            })?;
        let db = Database::open(&path)?;
        Self::from_config_with_database(config, db)
    }

    pub fn from_config_with_database(config: &Config, db: Database) -> Result<Self> {
        let orchestrator = Orchestrator::from_config(config, JobStore::new(db))?;
        let tracker = ProgressTracker::new(&config.progress);
        Ok(Self::new(orchestrator, tracker).with_sweep_interval(config.progress.sweep_interval()))
    }

    pub fn platforms(&self) -> Vec<&str> {
        self.orchestrator.platforms()
    }

    pub fn store(&self) -> &JobStore {
        self.orchestrator.store()
    }

    pub fn tracker(&self) -> &ProgressTracker {
        &self.tracker
    }

    /// Validates the request and schedules the run in the background.
    ///
    /// Returns the operation id immediately. Must be called from within a
    /// Tokio runtime.
    pub fn start_scrape(&self, request: ScrapeRequest) -> std::result::Result<String, ValidationError> {
        let scrape = self.orchestrator.validate(&request)?;
        let run = self.admit()?;
        let operation_id = run.progress.operation_id().to_string();

        log::info!(
            "Scheduling scrape {} for '{}' on {} (limit {})",
            operation_id,
            scrape.query.role,
            scrape.platform,
            scrape.query.limit
        );

        let orchestrator = Arc::clone(&self.orchestrator);
        tokio::spawn(async move {
            // Outcome is recorded on the progress handle.
            let _ = drive(&orchestrator, &scrape, &run).await;
        });

        Ok(operation_id)
    }

    /// Runs a scrape to completion on the current task.
    ///
    /// Dropping the returned future before it resolves records the
    /// operation as cancelled.
    pub async fn run_scrape(&self, request: ScrapeRequest) -> Result<ScrapeSummary> {
        let scrape = self.orchestrator.validate(&request)?;
        let run = self.admit()?;

        Ok(drive(&self.orchestrator, &scrape, &run).await?)
    }

    /// Latest snapshot, or the not-found stub.
    pub fn get_progress(&self, operation_id: &str) -> OperationSnapshot {
        self.tracker.read(operation_id)
    }

    /// Requests cancellation. Returns `false` if the operation is not running.
    pub fn cancel(&self, operation_id: &str) -> bool {
        match lock_running(&self.running).get(operation_id) {
            Some(token) => {
                log::info!("Cancelling scrape {}", operation_id);
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<OperationSnapshot>> {
        self.tracker.subscribe()
    }

    pub fn clear_all(&self) -> Result<ClearSummary> {
        Ok(self.store().clear_all()?)
    }

    /// Most recently scraped jobs, optionally only those from `platform`.
    pub fn list_latest(&self, platform: Option<&str>, limit: u64) -> Result<Vec<JobListing>> {
        let jobs = self.store().list_latest(platform, limit)?;
        Ok(jobs.into_iter().map(JobListing::from).collect())
    }

    /// Renders the selected jobs as a complete CSV document.
    pub fn export_csv(&self, scope: &ExportScope) -> std::result::Result<Vec<u8>, ExportError> {
        let jobs = self.store().jobs_for_export(scope.platform())?;
        let bytes = export::write_csv(&jobs)?;
        log::info!(
            "Exported {} jobs ({})",
            jobs.len(),
            export::export_filename(scope)
        );
        Ok(bytes)
    }

    /// Starts periodic reclamation of finished operations.
    pub fn spawn_sweeper(&self, shutdown: CancellationToken) -> JoinHandle<()> {
        progress::spawn_sweeper(self.tracker.clone(), self.sweep_interval, shutdown)
    }

    /// Starts tracking a new operation and registers its cancel token.
    fn admit(&self) -> std::result::Result<RunGuard, ValidationError> {
        let progress = self.tracker.begin()?;
        let cancel = CancellationToken::new();
        lock_running(&self.running)
            .insert(progress.operation_id().to_string(), cancel.clone());
        Ok(RunGuard {
            progress,
            cancel,
            running: Arc::clone(&self.running),
        })
    }
}

/// Owns one run's progress handle and cancel registration.
///
/// On drop the run is unregistered. A run dropped before recording a
/// terminal stage (caller abandoned the future, runtime shut down) is
/// settled as cancelled so it still finishes and gets reclaimed.
struct RunGuard {
    progress: OperationProgress,
    cancel: CancellationToken,
    running: Arc<Mutex<RunningMap>>,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        let operation_id = self.progress.operation_id();
        if self.progress.is_running() {
            log::warn!("Scrape {} dropped before finishing", operation_id);
            self.progress.cancelled();
        }
        lock_running(&self.running).remove(operation_id);
    }
}

/// Runs the orchestrator for one admitted run, turning a panic into a
/// failed operation.
async fn drive(
    orchestrator: &Orchestrator,
    scrape: &ValidatedScrape,
    run: &RunGuard,
) -> std::result::Result<ScrapeSummary, OperationError> {
    let outcome = AssertUnwindSafe(orchestrator.run(scrape, &run.progress, &run.cancel))
        .catch_unwind()
        .await;

    outcome.unwrap_or_else(|payload| {
        let reason = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        log::error!(
            "Scrape {} panicked: {}",
            run.progress.operation_id(),
            reason
        );
        run.progress.fail("task panicked");
        Err(OperationError::TaskFailed(reason))
    })
}

fn lock_running(running: &Mutex<RunningMap>) -> MutexGuard<'_, RunningMap> {
    running.lock().unwrap_or_else(|poisoned| {
        log::warn!("Running-operations lock was poisoned, recovering");
        poisoned.into_inner()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ChainStrategy, ScrapeConfig};
    use crate::error::AggregatorError;
    use crate::orchestrator::ProviderChain;
    use crate::progress::OperationStage;
    use crate::provider::mock::{StallingProvider, StaticProvider};
    use crate::provider::{ProviderError, ProviderResult, SearchQuery, SourceProvider};
    use async_trait::async_trait;

    struct PanickingProvider;

    #[async_trait]
    impl SourceProvider for PanickingProvider {
        fn name(&self) -> &str {
            "panicking"
        }

        async fn fetch(
            &self,
            _query: &SearchQuery,
        ) -> std::result::Result<Vec<ProviderResult>, ProviderError> {
            panic!("feed parser bug");
        }
    }

    async fn wait_terminal(aggregator: &JobAggregator, id: &str) -> OperationSnapshot {
        let mut snapshot = aggregator.get_progress(id);
        for _ in 0..100 {
            if snapshot.is_terminal() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
            snapshot = aggregator.get_progress(id);
        }
        snapshot
    }

    fn posting(title: &str) -> ProviderResult {
        ProviderResult {
            title: title.to_string(),
            company: "Acme".to_string(),
            location: "NYC".to_string(),
            description: String::new(),
            source_url: String::new(),
            platform: "mock".to_string(),
            synthetic: false,
        }
    }

    fn aggregator(chain: ProviderChain) -> JobAggregator {
        let store = JobStore::new(Database::open_in_memory().unwrap());
        let orchestrator = Orchestrator::new(store, &ScrapeConfig::default()).with_chain(chain);
        JobAggregator::new(
            orchestrator,
            ProgressTracker::with_settings(Duration::from_secs(10), 100, 16),
        )
    }

    fn stalling_chain() -> ProviderChain {
        ProviderChain::new("indeed", ChainStrategy::BestEffort)
            .with_provider(Arc::new(StallingProvider::new("slow")))
    }

    #[tokio::test]
    async fn test_run_scrape_and_list() {
        let chain = ProviderChain::new("indeed", ChainStrategy::BestEffort).with_provider(
            Arc::new(StaticProvider::new("feed", vec![posting("A"), posting("B")])),
        );
        let aggregator = aggregator(chain);
        let summary = aggregator
            .run_scrape(ScrapeRequest::new("indeed", "Engineer", "NYC", 10))
            .await
            .unwrap();
        assert_eq!(summary.created, 2);

        let listings = aggregator.list_latest(Some("indeed"), DEFAULT_LATEST_LIMIT).unwrap();
        assert_eq!(listings.len(), 2);
        assert_eq!(listings[0].sources, vec!["indeed"]);
        assert_eq!(listings[0].scraped_at.len(), "2026-01-01 00:00".len());
    }

    #[tokio::test]
    async fn test_cancel_unknown_operation() {
        let aggregator = aggregator(ProviderChain::new("indeed", ChainStrategy::BestEffort));
        assert!(!aggregator.cancel("nope"));
    }

    #[tokio::test]
    async fn test_cancel_running_operation() {
        let chain = ProviderChain::new("indeed", ChainStrategy::BestEffort)
            .with_provider(Arc::new(StallingProvider::new("slow")));
        let aggregator = aggregator(chain);
        let id = aggregator
            .start_scrape(ScrapeRequest::new("indeed", "Engineer", "NYC", 10))
            .unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(aggregator.cancel(&id));

        let mut snapshot = aggregator.get_progress(&id);
        for _ in 0..100 {
            if snapshot.is_terminal() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
            snapshot = aggregator.get_progress(&id);
        }
        assert_eq!(snapshot.stage, OperationStage::Error);
        assert_eq!(snapshot.message, "Scrape cancelled");
    }

    #[tokio::test]
    async fn test_export_csv_scope() {
        let chain = ProviderChain::new("indeed", ChainStrategy::BestEffort)
            .with_provider(Arc::new(StaticProvider::new("feed", vec![posting("A")])));
        let aggregator = aggregator(chain);
        aggregator
            .run_scrape(ScrapeRequest::new("indeed", "Engineer", "NYC", 10))
            .await
            .unwrap();

        let all = String::from_utf8(aggregator.export_csv(&ExportScope::All).unwrap()).unwrap();
        assert_eq!(all.lines().count(), 2);
        let other = String::from_utf8(
            aggregator
                .export_csv(&ExportScope::Platform("linkedin".into()))
                .unwrap(),
        )
        .unwrap();
        assert_eq!(other.lines().count(), 1);
    }

    #[tokio::test]
    async fn test_abandoned_run_scrape_is_settled_as_cancelled() {
        let aggregator = aggregator(stalling_chain());
        let mut updates = aggregator.subscribe();

        let result = tokio::time::timeout(
            Duration::from_millis(50),
            aggregator.run_scrape(ScrapeRequest::new("indeed", "Engineer", "NYC", 10)),
        )
        .await;
        assert!(result.is_err(), "run should still be stalled");

        let id = updates.recv().await.unwrap().operation_id.clone();
        let snapshot = aggregator.get_progress(&id);
        assert_eq!(snapshot.stage, OperationStage::Error);
        assert_eq!(snapshot.message, "Scrape cancelled");
        assert!(!aggregator.cancel(&id));
        assert_eq!(aggregator.tracker().running(), 0);
    }

    #[tokio::test]
    async fn test_panicking_run_is_marked_failed() {
        let chain = ProviderChain::new("indeed", ChainStrategy::BestEffort)
            .with_provider(Arc::new(PanickingProvider));
        let aggregator = aggregator(chain);
        let id = aggregator
            .start_scrape(ScrapeRequest::new("indeed", "Engineer", "NYC", 10))
            .unwrap();

        let snapshot = wait_terminal(&aggregator, &id).await;
        assert_eq!(snapshot.stage, OperationStage::Error);
        assert_eq!(snapshot.message, "Scrape failed: task panicked");
        assert!(!aggregator.cancel(&id));
    }

    #[tokio::test]
    async fn test_panicking_run_scrape_returns_error() {
        let chain = ProviderChain::new("indeed", ChainStrategy::BestEffort)
            .with_provider(Arc::new(PanickingProvider));
        let aggregator = aggregator(chain);
        let result = aggregator
            .run_scrape(ScrapeRequest::new("indeed", "Engineer", "NYC", 10))
            .await;
        assert!(matches!(
            result,
            Err(AggregatorError::Operation(OperationError::TaskFailed(ref reason)))
                if reason == "feed parser bug"
        ));
        assert_eq!(aggregator.tracker().running(), 0);
    }

    #[tokio::test]
    async fn test_start_scrape_refused_at_capacity() {
        let store = JobStore::new(Database::open_in_memory().unwrap());
        let orchestrator =
            Orchestrator::new(store, &ScrapeConfig::default()).with_chain(stalling_chain());
        let aggregator = JobAggregator::new(
            orchestrator,
            ProgressTracker::with_settings(Duration::from_secs(10), 1, 16),
        );
        let request = ScrapeRequest::new("indeed", "Engineer", "NYC", 10);

        let first = aggregator.start_scrape(request.clone()).unwrap();
        assert_eq!(
            aggregator.start_scrape(request.clone()),
            Err(ValidationError::TooManyOperations { max: 1 })
        );
        assert!(!aggregator.get_progress(&first).is_terminal());

        assert!(aggregator.cancel(&first));
        assert!(wait_terminal(&aggregator, &first).await.is_terminal());
        assert!(aggregator.start_scrape(request).is_ok());
    }
}
