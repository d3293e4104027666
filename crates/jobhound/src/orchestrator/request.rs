//! Scrape request parameters and their validation.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::provider::SearchQuery;

pub const MIN_LIMIT: u32 = 1;
pub const MAX_LIMIT: u32 = 100;
pub const MAX_FIELD_CHARS: usize = 100;

pub const DEFAULT_ROLE: &str = "Software Engineer";
pub const DEFAULT_LOCATION: &str = "New York, NY";
pub const DEFAULT_LIMIT: u32 = 20;

/// Caller-supplied parameters of one scrape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeRequest {
    pub platform: String,
    pub role: String,
    pub location: String,
    pub limit: u32,
}

impl ScrapeRequest {
    pub fn new(
        platform: impl Into<String>,
        role: impl Into<String>,
        location: impl Into<String>,
        limit: u32,
    ) -> Self {
        Self {
            platform: platform.into(),
            role: role.into(),
            location: location.into(),
            limit,
        }
    }

    /// Checks everything except platform membership, which depends on
    /// the configured chains.
    pub(crate) fn check_fields(&self) -> Result<SearchQuery, ValidationError> {
        if !(MIN_LIMIT..=MAX_LIMIT).contains(&self.limit) {
            return Err(ValidationError::LimitOutOfRange {
                value: self.limit,
                min: MIN_LIMIT,
                max: MAX_LIMIT,
            });
        }
        let role = check_text("role", &self.role)?;
        let location = check_text("location", &self.location)?;

        Ok(SearchQuery {
            role,
            location,
            limit: self.limit,
        })
    }
}

impl Default for ScrapeRequest {
    fn default() -> Self {
        Self {
            platform: String::new(),
            role: DEFAULT_ROLE.to_string(),
            location: DEFAULT_LOCATION.to_string(),
            limit: DEFAULT_LIMIT,
        }
    }
}

fn check_text(field: &'static str, value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField { field });
    }
    if trimmed.chars().count() > MAX_FIELD_CHARS {
        return Err(ValidationError::FieldTooLong {
            field,
            max: MAX_FIELD_CHARS,
        });
    }
    Ok(trimmed.to_string())
}

/// A request that passed validation against a configured platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedScrape {
    pub platform: String,
    pub query: SearchQuery,
}
