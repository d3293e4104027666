//! Drives provider chains and feeds their postings into the job store.
//!
//! One run: rescrape policy, collection (best-effort or aggregate), then
//! normalization and upsert of each accepted posting. Progress is reported
//! on a fixed 0..100 scale:
//!
//! | stage               | band    |
//! |---------------------|---------|
//! | initializing        | 0       |
//! | rescrape applied    | 5       |
//! | scraping/<platform> | 10..60  |
//! | processing          | 70..95  |
//! | complete            | 100     |

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

pub mod chain;
pub mod request;

pub use chain::{attempt, FetchOutcome, ProviderChain};
pub use request::{ScrapeRequest, ValidatedScrape};

use crate::config::{ChainStrategy, Config, ScrapeConfig};
use crate::error::{ConfigError, OperationError, ValidationError};
use crate::progress::{OperationProgress, OperationStage};
use crate::provider::{ProviderResult, SampleGenerator};
use crate::store::{JobCandidate, JobStore};

const POLICY_APPLIED: u64 = 5;
const SCRAPE_START: u64 = 10;
const SCRAPE_SPAN: u64 = 50;
const PROCESS_START: u64 = 70;
const PROCESS_SPAN: u64 = 25;

/// What one run achieved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeSummary {
    pub platform: String,
    /// Jobs created by this run.
    pub created: usize,
    /// Existing jobs this run merged into.
    pub merged: usize,
    /// Postings that could not be saved.
    pub failed: usize,
    /// Providers whose postings were used.
    pub contributors: Vec<String>,
    /// Synthetic placeholders, shown to users but never stored.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub placeholders: Vec<ProviderResult>,
}

impl ScrapeSummary {
    pub fn new(platform: impl Into<String>) -> Self {
        Self {
            platform: platform.into(),
            ..Self::default()
        }
    }

    /// Jobs added or merged.
    pub fn total(&self) -> usize {
        self.created + self.merged
    }
}

fn band(start: u64, span: u64, done: usize, of: usize) -> u64 {
    if of == 0 {
        return start + span;
    }
    start + span * (done.min(of) as u64) / of as u64
}

pub struct Orchestrator {
    chains: HashMap<String, ProviderChain>,
    store: JobStore,
    provider_timeout: Duration,
    synthetic_fallback: bool,
    samples: SampleGenerator,
}

impl Orchestrator {
    pub fn new(store: JobStore, settings: &ScrapeConfig) -> Self {
        Self {
            chains: HashMap::new(),
            store,
            provider_timeout: settings.provider_timeout(),
            synthetic_fallback: settings.synthetic_fallback,
            samples: SampleGenerator::new(),
        }
    }

    /// Builds HTTP feed chains for every configured platform.
    pub fn from_config(config: &Config, store: JobStore) -> Result<Self, ConfigError> {
        let mut orchestrator = Self::new(store, &config.scrape);
        for platform in &config.platforms {
            orchestrator.add_chain(ProviderChain::from_config(platform)?);
        }
        Ok(orchestrator)
    }

    /// Overrides the per-provider time budget.
    pub fn with_provider_timeout(mut self, timeout: Duration) -> Self {
        self.provider_timeout = timeout;
        self
    }

    pub fn with_synthetic_fallback(mut self, enabled: bool) -> Self {
        self.synthetic_fallback = enabled;
        self
    }

    /// Registers (or replaces) the chain for `chain.platform`.
    pub fn add_chain(&mut self, chain: ProviderChain) {
        self.chains.insert(chain.platform.clone(), chain);
    }

    pub fn with_chain(mut self, chain: ProviderChain) -> Self {
        self.add_chain(chain);
        self
    }

    /// Supported platform names, sorted.
    pub fn platforms(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.chains.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn store(&self) -> &JobStore {
        &self.store
    }

    /// Validates a request. Has no side effects.
    pub fn validate(&self, request: &ScrapeRequest) -> Result<ValidatedScrape, ValidationError> {
        let platform = request.platform.trim();
        if !self.chains.contains_key(platform) {
            return Err(ValidationError::UnknownPlatform(request.platform.clone()));
        }
        let query = request.check_fields()?;
        Ok(ValidatedScrape {
            platform: platform.to_string(),
            query,
        })
    }

    /// Executes one run and records its terminal stage on `progress`.
    pub async fn run(
        &self,
        scrape: &ValidatedScrape,
        progress: &OperationProgress,
        cancel: &CancellationToken,
    ) -> Result<ScrapeSummary, OperationError> {
        let span = tracing::info_span!(
            "scrape",
            operation_id = %progress.operation_id(),
            platform = %scrape.platform,
            limit = scrape.query.limit,
        );

        let result = self.execute(scrape, progress, cancel).instrument(span).await;

        match &result {
            Ok(summary) => {
                log::info!(
                    "Scrape {} of '{}' complete: {} created, {} merged, {} failed",
                    progress.operation_id(),
                    scrape.platform,
                    summary.created,
                    summary.merged,
                    summary.failed
                );
                progress.complete(summary.clone());
            }
            Err(OperationError::Cancelled) => {
                log::info!("Scrape {} cancelled", progress.operation_id());
                progress.cancelled();
            }
            Err(e) => {
                log::error!("Scrape {} failed: {}", progress.operation_id(), e);
                progress.fail(&e.to_string());
            }
        }

        result
    }

    async fn execute(
        &self,
        scrape: &ValidatedScrape,
        progress: &OperationProgress,
        cancel: &CancellationToken,
    ) -> Result<ScrapeSummary, OperationError> {
        let platform = scrape.platform.as_str();
        let query = &scrape.query;
        let chain = self
            .chains
            .get(platform)
            .ok_or_else(|| OperationError::MissingChain(platform.to_string()))?;

        progress.report(
            OperationStage::Initializing,
            0,
            &format!("Preparing {} scrape for '{}'", platform, query.role),
        );

        self.store
            .apply_rescrape_policy(platform)
            .map_err(|source| OperationError::Prepare {
                platform: platform.to_string(),
                source,
            })?;
        progress.report(
            OperationStage::Initializing,
            POLICY_APPLIED,
            &format!("Cleared previous {} results", platform),
        );

        if cancel.is_cancelled() {
            return Err(OperationError::Cancelled);
        }

        let stage = OperationStage::Scraping(platform.to_string());
        progress.report(stage.clone(), SCRAPE_START, &format!("Scraping {}", platform));

        let limit = query.limit as usize;
        let on_progress = |found: usize, message: &str| {
            progress.report(
                stage.clone(),
                band(SCRAPE_START, SCRAPE_SPAN, found, limit),
                message,
            );
        };

        let collected = match chain.strategy {
            ChainStrategy::BestEffort => {
                chain::best_effort(chain, query, self.provider_timeout, cancel, on_progress).await?
            }
            ChainStrategy::Aggregate => {
                chain::aggregate(chain, query, self.provider_timeout, cancel, on_progress).await?
            }
        };

        let mut summary = ScrapeSummary::new(platform);
        summary.contributors = collected.contributors;

        if collected.results.is_empty() {
            log::warn!(
                "[{}] no postings from {} providers",
                platform,
                collected.attempted
            );
            if self.synthetic_fallback {
                summary.placeholders = self.samples.generate(query);
                log::info!(
                    "[{}] generated {} synthetic placeholders (not stored)",
                    platform,
                    summary.placeholders.len()
                );
            }
        }

        let total = collected.results.len();
        progress.report(
            OperationStage::Processing,
            PROCESS_START,
            &format!("Processing {} jobs", total),
        );

        for (index, result) in collected.results.iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(OperationError::Cancelled);
            }

            let candidate = JobCandidate::from_result(result);
            match self.store.upsert(&candidate, platform) {
                Ok(outcome) if outcome.created => summary.created += 1,
                Ok(_) => summary.merged += 1,
                Err(e) => {
                    log::warn!(
                        "[{}] skipping '{}' at '{}': {}",
                        platform,
                        candidate.title,
                        candidate.company,
                        e
                    );
                    summary.failed += 1;
                }
            }

            progress.report(
                OperationStage::Processing,
                band(PROCESS_START, PROCESS_SPAN, index + 1, total),
                &format!("Saved {} of {} jobs", index + 1, total),
            );
        }

        Ok(summary)
    }
}
