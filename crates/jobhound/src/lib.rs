pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod logging;
pub mod normalize;
pub mod orchestrator;
pub mod progress;
pub mod provider;
pub mod service;
pub mod store;

pub use config::{load_config, load_config_from_str, Config};
pub use error::{
    AggregatorError, ConfigError, ExportError, OperationError, Result, StoreError, ValidationError,
};
pub use export::ExportScope;
pub use orchestrator::{Orchestrator, ProviderChain, ScrapeRequest, ScrapeSummary};
pub use progress::{OperationSnapshot, OperationStage, ProgressTracker};
pub use provider::{ProviderError, ProviderResult, SearchQuery, SourceProvider};
pub use service::{JobAggregator, JobListing};
pub use store::{Job, JobCandidate, JobStore};
