use std::collections::HashSet;
use std::path::Path;

use crate::config::schema::{Config, PlatformConfig};
use crate::error::ConfigError;

/// Upper bound for a provider's first retry delay.
pub const MAX_RETRY_BASE_DELAY_MS: u64 = 60_000;

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let config: Config = serde_json::from_str(content)?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != "1.0" {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    if config.scrape.provider_timeout_secs == 0 {
        return Err(ConfigError::Validation {
            message: "scrape.provider_timeout_secs must be greater than 0".to_string(),
        });
    }

    if config.progress.sweep_interval_secs == 0 {
        return Err(ConfigError::Validation {
            message: "progress.sweep_interval_secs must be greater than 0".to_string(),
        });
    }

    if config.progress.channel_capacity == 0 || config.progress.max_operations == 0 {
        return Err(ConfigError::Validation {
            message: "progress.channel_capacity and progress.max_operations must be greater than 0"
                .to_string(),
        });
    }

    let mut names = HashSet::new();
    for platform in &config.platforms {
        if !names.insert(platform.name.as_str()) {
            return Err(ConfigError::InvalidPlatform {
                name: platform.name.clone(),
                reason: "Duplicate platform name".to_string(),
            });
        }
        validate_platform(platform)?;
    }

    Ok(())
}

fn validate_platform(platform: &PlatformConfig) -> Result<(), ConfigError> {
    let valid_name = !platform.name.is_empty()
        && platform
            .name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-');
    if !valid_name {
        return Err(ConfigError::InvalidPlatform {
            name: platform.name.clone(),
            reason: "Name must match [a-z0-9_-]+".to_string(),
        });
    }

    for provider in &platform.providers {
        if let Err(e) = reqwest::Url::parse(&provider.url) {
            return Err(ConfigError::InvalidProvider {
                name: provider.name.clone(),
                reason: format!("Invalid URL '{}': {}", provider.url, e),
            });
        }
        if provider.max_attempts == 0 {
            return Err(ConfigError::InvalidProvider {
                name: provider.name.clone(),
                reason: "max_attempts must be greater than 0".to_string(),
            });
        }
        if provider.retry_base_delay_ms > MAX_RETRY_BASE_DELAY_MS {
            return Err(ConfigError::InvalidProvider {
                name: provider.name.clone(),
                reason: format!(
                    "retry_base_delay_ms must be at most {}",
                    MAX_RETRY_BASE_DELAY_MS
                ),
            });
        }
        if provider.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidProvider {
                name: provider.name.clone(),
                reason: "request_timeout_secs must be greater than 0".to_string(),
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::ChainStrategy;
    use std::io::Write;

    #[test]
    fn test_load_valid_config() {
        let config_json = r#"
        {
            "version": "1.0",
            "database_path": "/tmp/jobs.db",
            "scrape": { "provider_timeout_secs": 15, "synthetic_fallback": true },
            "platforms": [
                {
                    "name": "indeed",
                    "providers": [
                        { "name": "indeed-feed", "url": "https://feeds.example.com/indeed" }
                    ]
                },
                {
                    "name": "all",
                    "strategy": "aggregate",
                    "providers": [
                        { "name": "a", "url": "https://a.example.com/jobs", "max_attempts": 1 },
                        { "name": "b", "url": "https://b.example.com/jobs" }
                    ]
                }
            ]
        }
        "#;

        let config = load_config_from_str(config_json).unwrap();
        assert_eq!(config.version, "1.0");
        assert_eq!(config.scrape.provider_timeout_secs, 15);
        assert!(config.scrape.synthetic_fallback);
        assert_eq!(config.platforms.len(), 2);
        assert_eq!(
            config.platform("all").unwrap().strategy,
            ChainStrategy::Aggregate
        );
        assert_eq!(config.platform("all").unwrap().providers[0].max_attempts, 1);
    }

    #[test]
    fn test_invalid_version() {
        let err = load_config_from_str(r#"{ "version": "2.0" }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Validation { .. }));
    }

    #[test]
    fn test_malformed_json() {
        let err = load_config_from_str("{ not json").unwrap_err();
        assert!(matches!(err, ConfigError::ParseJson(_)));
    }

    #[test]
    fn test_duplicate_platform_rejected() {
        let err = load_config_from_str(
            r#"{ "version": "1.0", "platforms": [ { "name": "indeed" }, { "name": "indeed" } ] }"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPlatform { .. }));
    }

    #[test]
    fn test_platform_name_charset() {
        let err = load_config_from_str(
            r#"{ "version": "1.0", "platforms": [ { "name": "Indeed Jobs" } ] }"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPlatform { .. }));
    }

    #[test]
    fn test_invalid_provider_url() {
        let err = load_config_from_str(
            r#"{ "version": "1.0", "platforms": [
                { "name": "indeed", "providers": [ { "name": "feed", "url": "not a url" } ] }
            ] }"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidProvider { .. }));
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let err = load_config_from_str(
            r#"{ "version": "1.0", "platforms": [
                { "name": "indeed", "providers": [
                    { "name": "feed", "url": "http://localhost/", "max_attempts": 0 }
                ] }
            ] }"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidProvider { .. }));
    }

    #[test]
    fn test_zero_provider_timeout_rejected() {
        let err = load_config_from_str(
            r#"{ "version": "1.0", "scrape": { "provider_timeout_secs": 0 } }"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Validation { .. }));
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(br#"{ "version": "1.0" }"#).unwrap();
        let config = load_config(file.path()).unwrap();
        assert!(config.platforms.is_empty());
    }

    #[test]
    fn test_load_config_missing_file() {
        let err = load_config("/nonexistent/jobhound.json").unwrap_err();
        assert!(matches!(err, ConfigError::ReadFile { .. }));
    }
}
