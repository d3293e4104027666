//! Progress tracking for long-running scrape operations.

pub mod snapshot;
pub mod sweeper;
pub mod tracker;

pub use snapshot::{percentage, OperationSnapshot, OperationStage, PROGRESS_TOTAL};
pub use sweeper::spawn_sweeper;
pub use tracker::{OperationProgress, ProgressTracker};
