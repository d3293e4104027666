//! Scripted providers for tests, enabled by the `test-util` feature.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{ProviderError, ProviderResult, SearchQuery, SourceProvider};

/// Returns the same postings on every call.
pub struct StaticProvider {
    name: String,
    results: Vec<ProviderResult>,
    calls: AtomicUsize,
}

impl StaticProvider {
    pub fn new(name: impl Into<String>, results: Vec<ProviderResult>) -> Self {
        Self {
            name: name.into(),
            results,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn empty(name: impl Into<String>) -> Self {
        Self::new(name, Vec::new())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceProvider for StaticProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self, _query: &SearchQuery) -> Result<Vec<ProviderResult>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.results.clone())
    }
}

/// Always fails with the given error.
pub struct FailingProvider {
    name: String,
    error: ProviderError,
    calls: AtomicUsize,
}

impl FailingProvider {
    pub fn new(name: impl Into<String>, error: ProviderError) -> Self {
        Self {
            name: name.into(),
            error,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceProvider for FailingProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self, _query: &SearchQuery) -> Result<Vec<ProviderResult>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(self.error.clone())
    }
}

/// Never resolves. Exercises per-provider timeouts and cancellation.
pub struct StallingProvider {
    name: String,
    calls: AtomicUsize,
}

impl StallingProvider {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceProvider for StallingProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self, _query: &SearchQuery) -> Result<Vec<ProviderResult>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::future::pending().await
    }
}

/// Plays back a sequence of responses, one per call. The last response
/// repeats once the script is exhausted.
pub struct ScriptedProvider {
    name: String,
    script: Mutex<VecDeque<Result<Vec<ProviderResult>, ProviderError>>>,
    last: Mutex<Option<Result<Vec<ProviderResult>, ProviderError>>>,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new(
        name: impl Into<String>,
        script: Vec<Result<Vec<ProviderResult>, ProviderError>>,
    ) -> Self {
        Self {
            name: name.into(),
            script: Mutex::new(script.into()),
            last: Mutex::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceProvider for ScriptedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self, _query: &SearchQuery) -> Result<Vec<ProviderResult>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let next = match self.script.lock() {
            Ok(mut script) => script.pop_front(),
            Err(poisoned) => poisoned.into_inner().pop_front(),
        };
        let mut last = match self.last.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(response) = next {
            *last = Some(response);
        }
        last.clone().unwrap_or_else(|| Ok(Vec::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query() -> SearchQuery {
        SearchQuery {
            role: "Engineer".to_string(),
            location: "NYC".to_string(),
            limit: 10,
        }
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

    #[tokio::test]
    async fn test_static_provider_counts_calls() {
        let provider = StaticProvider::new("a", vec![posting("One")]);
        assert_eq!(provider.fetch(&query()).await.unwrap().len(), 1);
        assert_eq!(provider.fetch(&query()).await.unwrap().len(), 1);
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn test_failing_provider() {
        let provider = FailingProvider::new("b", ProviderError::Blocked(403));
        assert_eq!(
            provider.fetch(&query()).await.unwrap_err(),
            ProviderError::Blocked(403)
        );
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_stalling_provider_never_resolves() {
        let provider = StallingProvider::new("c");
        let result =
            tokio::time::timeout(std::time::Duration::from_millis(20), provider.fetch(&query()))
                .await;
        assert!(result.is_err());
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_scripted_provider_repeats_last() {
        let provider = ScriptedProvider::new(
            "d",
            vec![Ok(vec![posting("One")]), Ok(vec![posting("Two"), posting("Three")])],
        );
        assert_eq!(provider.fetch(&query()).await.unwrap().len(), 1);
        assert_eq!(provider.fetch(&query()).await.unwrap().len(), 2);
        assert_eq!(provider.fetch(&query()).await.unwrap().len(), 2);
        assert_eq!(provider.calls(), 3);
    }
}
