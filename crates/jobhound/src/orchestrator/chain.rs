//! Provider chains and the two collection strategies.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{FuturesOrdered, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::config::{ChainStrategy, PlatformConfig};
use crate::error::{ConfigError, OperationError};
use crate::normalize;
use crate::provider::{HttpFeedProvider, ProviderError, ProviderResult, SearchQuery, SourceProvider};

/// What one provider attempt produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Results(Vec<ProviderResult>),
    Empty,
    Failed(ProviderError),
}

/// Ordered providers for one platform.
#[derive(Clone)]
pub struct ProviderChain {
    pub platform: String,
    pub strategy: ChainStrategy,
    pub providers: Vec<Arc<dyn SourceProvider>>,
}

impl ProviderChain {
    pub fn new(platform: impl Into<String>, strategy: ChainStrategy) -> Self {
        Self {
            platform: platform.into(),
            strategy,
            providers: Vec::new(),
        }
    }

    pub fn with_provider(mut self, provider: Arc<dyn SourceProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    /// Builds a chain of HTTP feed providers from configuration.
    pub fn from_config(config: &PlatformConfig) -> Result<Self, ConfigError> {
        let mut chain = Self::new(&config.name, config.strategy);
        for provider in &config.providers {
            chain = chain.with_provider(Arc::new(HttpFeedProvider::from_config(provider)?));
        }
        Ok(chain)
    }
}

/// Postings gathered from a chain.
#[derive(Debug, Default)]
pub(crate) struct Collected {
    pub results: Vec<ProviderResult>,
    /// Providers that contributed at least one posting.
    pub contributors: Vec<String>,
    pub attempted: usize,
}

/// Runs one provider, bounded by `timeout` and abandoned on cancellation.
pub async fn attempt(
    provider: &dyn SourceProvider,
    query: &SearchQuery,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<FetchOutcome, OperationError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(OperationError::Cancelled),
        result = tokio::time::timeout(timeout, provider.fetch(query)) => Ok(match result {
            Err(_) => FetchOutcome::Failed(ProviderError::Timeout(timeout)),
            Ok(Ok(results)) if results.is_empty() => FetchOutcome::Empty,
            Ok(Ok(results)) => FetchOutcome::Results(results),
            Ok(Err(e)) => FetchOutcome::Failed(e),
        }),
    }
}

fn log_outcome(platform: &str, provider: &str, outcome: &FetchOutcome) {
    match outcome {
        FetchOutcome::Results(results) => {
            log::info!("[{}] {} returned {} postings", platform, provider, results.len())
        }
        FetchOutcome::Empty => log::info!("[{}] {} returned nothing", platform, provider),
        FetchOutcome::Failed(e) => log::warn!(
            "[{}] {} failed ({:?}): {}",
            platform,
            provider,
            e.kind(),
            e
        ),
    }
}

/// Tries providers in order; the first non-empty result wins and the rest
/// are never called.
pub(crate) async fn best_effort<F>(
    chain: &ProviderChain,
    query: &SearchQuery,
    timeout: Duration,
    cancel: &CancellationToken,
    mut on_progress: F,
) -> Result<Collected, OperationError>
where
    F: FnMut(usize, &str),
{
    let mut collected = Collected::default();

    for provider in &chain.providers {
        on_progress(0, &format!("Trying {}", provider.name()));
        collected.attempted += 1;

        let outcome = attempt(provider.as_ref(), query, timeout, cancel).await?;
        log_outcome(&chain.platform, provider.name(), &outcome);

        if let FetchOutcome::Results(mut results) = outcome {
            results.truncate(query.limit as usize);
            on_progress(
                results.len(),
                &format!("Found {} jobs via {}", results.len(), provider.name()),
            );
            collected.results = results;
            collected.contributors.push(provider.name().to_string());
            return Ok(collected);
        }
    }

    Ok(collected)
}

/// Runs every provider concurrently and merges their postings in chain
/// order, dropping repeats of the same (title, company).
pub(crate) async fn aggregate<F>(
    chain: &ProviderChain,
    query: &SearchQuery,
    timeout: Duration,
    cancel: &CancellationToken,
    mut on_progress: F,
) -> Result<Collected, OperationError>
where
    F: FnMut(usize, &str),
{
    let mut collected = Collected::default();
    let mut seen = HashSet::new();

    let mut pending: FuturesOrdered<_> = chain
        .providers
        .iter()
        .map(|provider| async move {
            let outcome = attempt(provider.as_ref(), query, timeout, cancel).await;
            (provider.name().to_string(), outcome)
        })
        .collect();

    on_progress(0, &format!("Querying {} sources", chain.providers.len()));

    while let Some((name, outcome)) = pending.next().await {
        let outcome = outcome?;
        collected.attempted += 1;
        log_outcome(&chain.platform, &name, &outcome);

        let FetchOutcome::Results(results) = outcome else {
            continue;
        };

        let before = collected.results.len();
        for result in results {
            if seen.insert(normalize::listing_key(&result.title, &result.company)) {
                collected.results.push(result);
            }
        }
        if collected.results.len() > before {
            collected.contributors.push(name.clone());
        }

        on_progress(
            collected.results.len(),
            &format!(
                "{} unique jobs after {}",
                collected.results.len(),
                name
            ),
        );
    }

    collected.results.truncate(query.limit as usize);
    Ok(collected)
}
