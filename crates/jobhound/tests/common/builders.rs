//! Builder patterns for creating test data programmatically.

#![allow(dead_code)]

use std::collections::HashMap;

use jobhound::config::schema::{
    ChainStrategy, Config, LoggingConfig, PlatformConfig, ProgressConfig, ProviderConfig,
    ScrapeConfig,
};
use jobhound::ProviderResult;

/// Builder for creating `ProviderResult` instances.
pub struct PostingBuilder {
    posting: ProviderResult,
}

impl PostingBuilder {
    pub fn new(title: &str, company: &str) -> Self {
        Self {
            posting: ProviderResult {
                title: title.to_string(),
                company: company.to_string(),
                location: "New York, NY".to_string(),
                description: format!("{} role at {}", title, company),
                source_url: format!(
                    "https://jobs.example.com/{}",
                    title.to_lowercase().replace(' ', "-")
                ),
                platform: "test-feed".to_string(),
                synthetic: false,
            },
        }
    }

    pub fn location(mut self, location: &str) -> Self {
        self.posting.location = location.to_string();
        self
    }

    pub fn description(mut self, description: &str) -> Self {
        self.posting.description = description.to_string();
        self
    }

    pub fn platform(mut self, platform: &str) -> Self {
        self.posting.platform = platform.to_string();
        self
    }

    pub fn synthetic(mut self) -> Self {
        self.posting.synthetic = true;
        self
    }

    pub fn build(self) -> ProviderResult {
        self.posting
    }
}

/// Shorthand for a posting with default location.
pub fn posting(title: &str, company: &str) -> ProviderResult {
    PostingBuilder::new(title, company).build()
}

/// Builds postings from (title, company) pairs.
pub fn postings(pairs: &[(&str, &str)]) -> Vec<ProviderResult> {
    pairs.iter().map(|(t, c)| posting(t, c)).collect()
}

/// Builder for creating `Config` instances.
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder with sensible defaults for testing.
    pub fn new() -> Self {
        Self {
            config: Config {
                version: "1.0".to_string(),
                database_path: None,
                logging: LoggingConfig::default(),
                scrape: ScrapeConfig::default(),
                progress: ProgressConfig::default(),
                platforms: vec![],
            },
        }
    }

    pub fn version(mut self, version: &str) -> Self {
        self.config.version = version.to_string();
        self
    }

    pub fn database_path(mut self, path: &std::path::Path) -> Self {
        self.config.database_path = Some(path.to_path_buf());
        self
    }

    pub fn synthetic_fallback(mut self, enabled: bool) -> Self {
        self.config.scrape.synthetic_fallback = enabled;
        self
    }

    pub fn grace_period_secs(mut self, secs: u64) -> Self {
        self.config.progress.grace_period_secs = secs;
        self
    }

    /// Add a platform whose providers are HTTP feeds at the given URLs.
    pub fn platform(mut self, name: &str, strategy: ChainStrategy, urls: &[&str]) -> Self {
        let providers = urls
            .iter()
            .enumerate()
            .map(|(i, url)| ProviderConfig {
                name: format!("{}-{}", name, i + 1),
                url: url.to_string(),
                max_attempts: 1,
                retry_base_delay_ms: 1,
                request_timeout_secs: 5,
                headers: HashMap::new(),
            })
            .collect();
        self.config.platforms.push(PlatformConfig {
            name: name.to_string(),
            strategy,
            providers,
        });
        self
    }

    pub fn build(self) -> Config {
        self.config
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(&self.config).expect("Failed to serialize config")
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
