//! Source provider error types.

use std::time::Duration;
use thiserror::Error;

/// How the orchestrator classifies a provider failure. Both kinds are
/// non-fatal and mean "no data from this source".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Network failure, timeout, or anti-bot block.
    Unavailable,
    /// Source reachable but nothing could be extracted.
    ParseMismatch,
}

/// Errors raised by a single provider attempt.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// Connection-level failure.
    #[error("Source unavailable: {0}")]
    Unavailable(String),

    /// Non-success HTTP status other than a block.
    #[error("Source returned HTTP {0}")]
    HttpStatus(u16),

    /// The source refused the request (403/429).
    #[error("Request blocked by source (HTTP {0})")]
    Blocked(u16),

    /// The attempt exceeded its time budget.
    #[error("Source timed out after {0:?}")]
    Timeout(Duration),

    /// Response arrived but held no extractable postings.
    #[error("Could not extract postings: {0}")]
    ParseMismatch(String),
}

impl ProviderError {
    pub fn kind(&self) -> FailureKind {
        match self {
            ProviderError::ParseMismatch(_) => FailureKind::ParseMismatch,
            _ => FailureKind::Unavailable,
        }
    }

    /// Returns true if the error is likely transient and the request can be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::Unavailable(_) | ProviderError::Timeout(_) => true,
            ProviderError::HttpStatus(code) => *code >= 500,
            ProviderError::Blocked(_) | ProviderError::ParseMismatch(_) => false,
        }
    }
}
