//! Generic JSON feed provider.
//!
//! Issues `GET <url>?q=<role>&l=<location>&limit=<n>` and accepts either a
//! bare array of postings or an object with a `jobs` array.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use super::{ProviderError, ProviderResult, SearchQuery, SourceProvider};
use crate::config::ProviderConfig;
use crate::error::ConfigError;

/// Default connect timeout for feed requests.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Maximum length for error bodies echoed into logs.
const MAX_ERROR_BODY_LENGTH: usize = 200;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FeedBody {
    List(Vec<FeedPosting>),
    Wrapped { jobs: Vec<FeedPosting> },
}

#[derive(Debug, Default, Deserialize)]
struct FeedPosting {
    #[serde(default, alias = "job_title")]
    title: Option<String>,
    #[serde(default, alias = "company_name")]
    company: Option<String>,
    #[serde(default)]
    location: Option<String>,
    #[serde(default, alias = "job_description")]
    description: Option<String>,
    #[serde(default, alias = "url")]
    source_url: Option<String>,
}

pub struct HttpFeedProvider {
    name: String,
    url: String,
    client: Client,
    max_attempts: u32,
    retry_base_delay: Duration,
    request_timeout: Duration,
}

impl HttpFeedProvider {
    pub fn from_config(config: &ProviderConfig) -> Result<Self, ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidProvider {
            name: config.name.clone(),
            reason,
        };

        let mut headers = HeaderMap::new();
        for (key, value) in &config.headers {
            let name = HeaderName::from_bytes(key.as_bytes())
                .map_err(|e| invalid(format!("Invalid header name '{}': {}", key, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| invalid(format!("Invalid value for header '{}': {}", key, e)))?;
            headers.insert(name, value);
        }

        let request_timeout = Duration::from_secs(config.request_timeout_secs);
        let client = Client::builder()
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT.min(request_timeout))
            .timeout(request_timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| invalid(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            name: config.name.clone(),
            url: config.url.clone(),
            client,
            max_attempts: config.max_attempts.max(1),
            retry_base_delay: Duration::from_millis(config.retry_base_delay_ms),
            request_timeout,
        })
    }

    async fn fetch_once(&self, query: &SearchQuery) -> Result<Vec<ProviderResult>, ProviderError> {
        let limit = query.limit.to_string();
        let response = self
            .client
            .get(&self.url)
            .query(&[
                ("q", query.role.as_str()),
                ("l", query.location.as_str()),
                ("limit", limit.as_str()),
            ])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(self.request_timeout)
                } else {
                    ProviderError::Unavailable(e.to_string())
                }
            })?;

        let status = response.status();
        if status == StatusCode::FORBIDDEN || status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ProviderError::Blocked(status.as_u16()));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::Unavailable(format!("Failed to read body: {}", e)))?;

        if !status.is_success() {
            log::debug!(
                "Provider '{}' returned {}: {}",
                self.name,
                status,
                truncate(&body)
            );
            return Err(ProviderError::HttpStatus(status.as_u16()));
        }

        let mut results = decode_body(&self.name, &body)?;
        results.truncate(query.limit as usize);
        Ok(results)
    }
}

#[async_trait]
impl SourceProvider for HttpFeedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    /// Retries transient errors with exponential backoff.
    async fn fetch(&self, query: &SearchQuery) -> Result<Vec<ProviderResult>, ProviderError> {
        let mut last_error = None;

        for attempt in 0..self.max_attempts {
            if attempt > 0 {
                let delay = backoff_delay(self.retry_base_delay, attempt);
                log::info!(
                    "Retrying provider '{}' (attempt {}/{}) after {:?}...",
                    self.name,
                    attempt + 1,
                    self.max_attempts,
                    delay
                );
                tokio::time::sleep(delay).await;
            }

            match self.fetch_once(query).await {
                Ok(results) => return Ok(results),
                Err(e) if e.is_retryable() && attempt + 1 < self.max_attempts => {
                    log::warn!("Provider '{}' failed with retryable error: {}", self.name, e);
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| {
            ProviderError::Unavailable(format!("Provider '{}' made no attempts", self.name))
        }))
    }
}

/// Delay before retry number `attempt` (1-based): doubles each time,
/// saturating instead of overflowing.
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(1 << attempt.saturating_sub(1).min(16))
}

/// Decodes a feed body into provider results.
///
/// Postings without a title or company are skipped. A non-empty feed where
/// every posting was skipped counts as a parse mismatch.
fn decode_body(source: &str, body: &str) -> Result<Vec<ProviderResult>, ProviderError> {
    let feed: FeedBody = serde_json::from_str(body)
        .map_err(|e| ProviderError::ParseMismatch(format!("Unrecognized feed body: {}", e)))?;

    let postings = match feed {
        FeedBody::List(postings) | FeedBody::Wrapped { jobs: postings } => postings,
    };
    let total = postings.len();

    let results: Vec<ProviderResult> = postings
        .into_iter()
        .filter_map(|p| {
            let title = p.title.filter(|t| !t.trim().is_empty())?;
            let company = p.company.filter(|c| !c.trim().is_empty())?;
            Some(ProviderResult {
                title,
                company,
                location: p.location.unwrap_or_default(),
                description: p.description.unwrap_or_default(),
                source_url: p.source_url.unwrap_or_default(),
                platform: source.to_string(),
                synthetic: false,
            })
        })
        .collect();

    if total > 0 && results.is_empty() {
        return Err(ProviderError::ParseMismatch(format!(
            "{} postings without title or company",
            total
        )));
    }
    if results.len() < total {
        log::debug!(
            "Provider '{}' skipped {} incomplete postings",
            source,
            total - results.len()
        );
    }

    Ok(results)
}

fn truncate(body: &str) -> String {
    if body.len() > MAX_ERROR_BODY_LENGTH {
        let cut = (0..=MAX_ERROR_BODY_LENGTH)
            .rev()
            .find(|i| body.is_char_boundary(*i))
            .unwrap_or(0);
        format!("{}... (truncated)", &body[..cut])
    } else {
        body.to_string()
    }
}
