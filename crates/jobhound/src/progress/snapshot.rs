//! Immutable progress records.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::orchestrator::ScrapeSummary;

/// Scale every run reports against.
pub const PROGRESS_TOTAL: u64 = 100;

/// Message of the stub returned for unknown or expired operations.
pub const NOT_FOUND_MESSAGE: &str = "Progress not available";

/// Stage of a scrape operation.
///
/// Serialized as a plain string: `initializing`, `scraping/<platform>`,
/// `processing`, `complete`, `error`, `unknown`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum OperationStage {
    Initializing,
    Scraping(String),
    Processing,
    Complete,
    Error,
    /// Placeholder stage of the not-found stub.
    Unknown,
}

impl OperationStage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, OperationStage::Complete | OperationStage::Error)
    }
}

impl fmt::Display for OperationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationStage::Initializing => write!(f, "initializing"),
            OperationStage::Scraping(platform) => write!(f, "scraping/{}", platform),
            OperationStage::Processing => write!(f, "processing"),
            OperationStage::Complete => write!(f, "complete"),
            OperationStage::Error => write!(f, "error"),
            OperationStage::Unknown => write!(f, "unknown"),
        }
    }
}

impl FromStr for OperationStage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "initializing" => Ok(OperationStage::Initializing),
            "processing" => Ok(OperationStage::Processing),
            "complete" => Ok(OperationStage::Complete),
            "error" => Ok(OperationStage::Error),
            "unknown" => Ok(OperationStage::Unknown),
            other => match other.strip_prefix("scraping/") {
                Some(platform) if !platform.is_empty() => {
                    Ok(OperationStage::Scraping(platform.to_string()))
                }
                _ => Err(format!("Unknown operation stage: {}", other)),
            },
        }
    }
}

impl From<OperationStage> for String {
    fn from(stage: OperationStage) -> Self {
        stage.to_string()
    }
}

impl TryFrom<String> for OperationStage {
    type Error = String;

    fn try_from(value: String) -> Result<Self, String> {
        value.parse()
    }
}

/// Point-in-time view of one operation. Replaced wholesale on every update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationSnapshot {
    pub operation_id: String,
    pub stage: OperationStage,
    pub current: u64,
    pub total: u64,
    pub percentage: u8,
    pub message: String,
    /// Seconds since the operation started.
    pub elapsed_time: f64,
    /// When this snapshot was written.
    pub timestamp: DateTime<Utc>,
    /// Present once the operation completed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<ScrapeSummary>,
}

impl OperationSnapshot {
    pub fn new(
        operation_id: &str,
        stage: OperationStage,
        current: u64,
        total: u64,
        message: impl Into<String>,
    ) -> Self {
        Self {
            operation_id: operation_id.to_string(),
            stage,
            current,
            total,
            percentage: percentage(current, total),
            message: message.into(),
            elapsed_time: 0.0,
            timestamp: Utc::now(),
            outcome: None,
        }
    }

    /// The stub returned for ids that are unknown or already reclaimed.
    pub fn not_found(operation_id: &str) -> Self {
        Self::new(
            operation_id,
            OperationStage::Unknown,
            0,
            PROGRESS_TOTAL,
            NOT_FOUND_MESSAGE,
        )
    }

    pub fn with_elapsed(mut self, elapsed_secs: f64) -> Self {
        self.elapsed_time = elapsed_secs;
        self
    }

    pub fn with_outcome(mut self, outcome: ScrapeSummary) -> Self {
        self.outcome = Some(outcome);
        self
    }

    pub fn is_terminal(&self) -> bool {
        self.stage.is_terminal()
    }
}

/// `floor(100 * current / total)` capped at 100, or 0 when `total` is 0.
pub fn percentage(current: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    ((current.saturating_mul(100)) / total).min(100) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentage() {
        assert_eq!(percentage(0, 100), 0);
        assert_eq!(percentage(33, 100), 33);
        assert_eq!(percentage(1, 3), 33);
        assert_eq!(percentage(2, 3), 66);
        assert_eq!(percentage(5, 0), 0);
        assert_eq!(percentage(250, 100), 100);
    }

    #[test]
    fn test_stage_round_trips_through_strings() {
        for stage in [
            OperationStage::Initializing,
            OperationStage::Scraping("indeed".to_string()),
            OperationStage::Processing,
            OperationStage::Complete,
            OperationStage::Error,
            OperationStage::Unknown,
        ] {
            let text = stage.to_string();
            assert_eq!(text.parse::<OperationStage>().unwrap(), stage);
        }
        assert!("scraping/".parse::<OperationStage>().is_err());
        assert!("paused".parse::<OperationStage>().is_err());
    }

    #[test]
    fn test_stage_serializes_as_string() {
        let json = serde_json::to_string(&OperationStage::Scraping("linkedin".into())).unwrap();
        assert_eq!(json, r#""scraping/linkedin""#);
    }

    #[test]
    fn test_terminal_stages() {
        assert!(OperationStage::Complete.is_terminal());
        assert!(OperationStage::Error.is_terminal());
        assert!(!OperationStage::Processing.is_terminal());
        assert!(!OperationStage::Unknown.is_terminal());
    }

    #[test]
    fn test_not_found_stub() {
        let stub = OperationSnapshot::not_found("missing");
        assert_eq!(stub.operation_id, "missing");
        assert_eq!(stub.stage, OperationStage::Unknown);
        assert_eq!(stub.current, 0);
        assert_eq!(stub.total, PROGRESS_TOTAL);
        assert_eq!(stub.percentage, 0);
        assert_eq!(stub.message, NOT_FOUND_MESSAGE);
        assert_eq!(stub.elapsed_time, 0.0);
        assert!(stub.outcome.is_none());
    }
}
