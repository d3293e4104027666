//! Source providers: one implementation per external job source.
//!
//! A provider fetches raw postings for a query and owns its own retry and
//! timeout policy. An empty result and an error are equivalent to the
//! orchestrator; both mean "no data from this source".

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub mod error;
pub mod http;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;
pub mod sample;

pub use error::{FailureKind, ProviderError};
pub use http::HttpFeedProvider;
pub use sample::SampleGenerator;

/// What to search for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub role: String,
    pub location: String,
    pub limit: u32,
}

/// A raw posting as delivered by a source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderResult {
    pub title: String,
    pub company: String,
    pub location: String,
    pub description: String,
    pub source_url: String,
    /// Provenance tag of the source that produced the posting.
    pub platform: String,
    /// Placeholder produced without scraping. Never persisted.
    #[serde(default)]
    pub synthetic: bool,
}

/// A job source.
#[async_trait]
pub trait SourceProvider: Send + Sync {
    /// Short name used in logs and progress messages.
    fn name(&self) -> &str;

    /// Fetches postings matching `query`. Must not mutate shared state.
    async fn fetch(&self, query: &SearchQuery) -> Result<Vec<ProviderResult>, ProviderError>;
}
