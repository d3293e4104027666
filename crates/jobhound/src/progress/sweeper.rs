//! Background reclamation of finished operations.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::ProgressTracker;

/// Runs [`ProgressTracker::sweep`] every `interval` until `shutdown` fires.
pub fn spawn_sweeper(
    tracker: ProgressTracker,
    interval: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        timer.tick().await; // skip immediate first tick

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    log::debug!("Progress sweeper stopped");
                    break;
                }
                _ = timer.tick() => {
                    tracker.sweep();
                    log::trace!("Progress sweep done, {} operations retained", tracker.len());
                }
            }
        }
    })
}
