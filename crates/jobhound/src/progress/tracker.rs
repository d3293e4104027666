//! Process-wide progress state for in-flight scrape operations.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use moka::sync::Cache;
use tokio::sync::broadcast;
use uuid::Uuid;

use super::snapshot::{OperationSnapshot, OperationStage, PROGRESS_TOTAL};
use crate::config::ProgressConfig;
use crate::error::ValidationError;
use crate::orchestrator::ScrapeSummary;

type LiveMap = HashMap<String, Arc<OperationSnapshot>>;

/// Keyed store of operation snapshots.
///
/// Running operations live in a plain map bounded by `max_operations` and
/// are never evicted. A terminal snapshot moves the entry into a moka
/// cache that drops it once the grace period has passed;
/// [`ProgressTracker::sweep`] reclaims the memory. Every write swaps in a
/// whole new `Arc<OperationSnapshot>`, so readers never see a half-written
/// record. Cloning is cheap and all clones share state.
#[derive(Clone)]
pub struct ProgressTracker {
    live: Arc<Mutex<LiveMap>>,
    finished: Cache<String, Arc<OperationSnapshot>>,
    max_live: u64,
    sender: broadcast::Sender<Arc<OperationSnapshot>>,
}

impl ProgressTracker {
    pub fn new(config: &ProgressConfig) -> Self {
        Self::with_settings(
            config.grace_period(),
            config.max_operations,
            config.channel_capacity,
        )
    }

    pub fn with_settings(grace_period: Duration, max_operations: u64, capacity: usize) -> Self {
        let finished = Cache::builder().time_to_live(grace_period).build();
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            live: Arc::new(Mutex::new(HashMap::new())),
            finished,
            max_live: max_operations.max(1),
            sender,
        }
    }

    /// Registers a new operation in the `initializing` stage and returns
    /// the handle its run uses to report progress.
    ///
    /// Fails without side effects when `max_operations` runs are already
    /// in flight.
    pub fn begin(&self) -> Result<OperationProgress, ValidationError> {
        let operation_id = Uuid::new_v4().to_string();
        let snapshot = Arc::new(OperationSnapshot::new(
            &operation_id,
            OperationStage::Initializing,
            0,
            PROGRESS_TOTAL,
            "Initializing scrape",
        ));

        {
            let mut live = self.lock_live();
            if live.len() as u64 >= self.max_live {
                log::warn!(
                    "Refusing new operation: {} already running",
                    live.len()
                );
                return Err(ValidationError::TooManyOperations { max: self.max_live });
            }
            live.insert(operation_id.clone(), Arc::clone(&snapshot));
        }
        self.publish(snapshot);

        Ok(OperationProgress {
            tracker: self.clone(),
            operation_id,
            started: Instant::now(),
            last_current: AtomicU64::new(0),
        })
    }

    /// Replaces the snapshot for its operation id.
    ///
    /// Only running operations accept updates. Returns `false` and leaves
    /// the stored record untouched when the operation is unknown or already
    /// finished, or when a non-terminal update would lower the percentage.
    pub fn update(&self, snapshot: OperationSnapshot) -> bool {
        let snapshot = Arc::new(snapshot);
        {
            let mut live = self.lock_live();
            let Some(previous) = live.get(&snapshot.operation_id) else {
                log::debug!(
                    "Ignoring update for unknown or finished operation {} ({})",
                    snapshot.operation_id,
                    snapshot.stage
                );
                return false;
            };

            if snapshot.is_terminal() {
                live.remove(&snapshot.operation_id);
                // Inserted while the live lock is held so readers never miss it.
                self.finished
                    .insert(snapshot.operation_id.clone(), Arc::clone(&snapshot));
            } else {
                if snapshot.percentage < previous.percentage {
                    log::debug!(
                        "Ignoring progress regression for {}: {}% -> {}%",
                        snapshot.operation_id,
                        previous.percentage,
                        snapshot.percentage
                    );
                    return false;
                }
                live.insert(snapshot.operation_id.clone(), Arc::clone(&snapshot));
            }
        }

        self.publish(snapshot);
        true
    }

    /// Current snapshot, or the not-found stub for unknown/expired ids.
    pub fn read(&self, operation_id: &str) -> OperationSnapshot {
        if let Some(snapshot) = self.lock_live().get(operation_id) {
            return (**snapshot).clone();
        }
        self.finished
            .get(operation_id)
            .map(|s| (*s).clone())
            .unwrap_or_else(|| OperationSnapshot::not_found(operation_id))
    }

    pub fn contains(&self, operation_id: &str) -> bool {
        self.is_running(operation_id) || self.finished.contains_key(operation_id)
    }

    /// Whether the operation has been started and not yet finished.
    pub fn is_running(&self, operation_id: &str) -> bool {
        self.lock_live().contains_key(operation_id)
    }

    /// Reclaims finished entries past their grace period.
    pub fn sweep(&self) {
        self.finished.run_pending_tasks();
    }

    /// Operations currently in flight.
    pub fn running(&self) -> usize {
        self.lock_live().len()
    }

    /// Number of retained operations; finished ones as of the last sweep.
    pub fn len(&self) -> u64 {
        self.running() as u64 + self.finished.entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Receives every snapshot written from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<OperationSnapshot>> {
        self.sender.subscribe()
    }

    fn publish(&self, snapshot: Arc<OperationSnapshot>) {
        if let Err(e) = self.sender.send(snapshot) {
            log::trace!("No progress subscribers: {}", e);
        }
    }

    fn lock_live(&self) -> MutexGuard<'_, LiveMap> {
        self.live.lock().unwrap_or_else(|poisoned| {
            log::warn!("Progress lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }
}

/// Progress handle owned by a single scrape run.
///
/// Reports against a fixed total of 100.
pub struct OperationProgress {
    tracker: ProgressTracker,
    operation_id: String,
    started: Instant,
    last_current: AtomicU64,
}

impl OperationProgress {
    pub fn operation_id(&self) -> &str {
        &self.operation_id
    }

    /// Writes a non-terminal stage at `current` out of 100.
    pub fn report(&self, stage: OperationStage, current: u64, message: &str) -> bool {
        let current = current.min(PROGRESS_TOTAL);
        let snapshot = OperationSnapshot::new(
            &self.operation_id,
            stage,
            current,
            PROGRESS_TOTAL,
            message,
        )
        .with_elapsed(self.elapsed_secs());

        let accepted = self.tracker.update(snapshot);
        if accepted {
            self.last_current.fetch_max(current, Ordering::SeqCst);
        }
        accepted
    }

    /// Marks the operation complete with its summary.
    pub fn complete(&self, summary: ScrapeSummary) -> bool {
        let message = format!("Scrape complete. Added/merged {} jobs.", summary.total());
        let snapshot = OperationSnapshot::new(
            &self.operation_id,
            OperationStage::Complete,
            PROGRESS_TOTAL,
            PROGRESS_TOTAL,
            message,
        )
        .with_elapsed(self.elapsed_secs())
        .with_outcome(summary);
        self.tracker.update(snapshot)
    }

    /// Marks the operation failed, keeping the last reported percentage.
    pub fn fail(&self, reason: &str) -> bool {
        self.finish_with_error(format!("Scrape failed: {}", reason))
    }

    /// Marks the operation cancelled by the caller.
    pub fn cancelled(&self) -> bool {
        self.finish_with_error("Scrape cancelled".to_string())
    }

    fn finish_with_error(&self, message: String) -> bool {
        let snapshot = OperationSnapshot::new(
            &self.operation_id,
            OperationStage::Error,
            self.last_current.load(Ordering::SeqCst),
            PROGRESS_TOTAL,
            message,
        )
        .with_elapsed(self.elapsed_secs());
        self.tracker.update(snapshot)
    }

    pub fn snapshot(&self) -> OperationSnapshot {
        self.tracker.read(&self.operation_id)
    }

    /// Whether no terminal stage has been recorded yet.
    pub fn is_running(&self) -> bool {
        self.tracker.is_running(&self.operation_id)
    }

    fn elapsed_secs(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }
}
