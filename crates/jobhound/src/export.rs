//! CSV export of stored jobs.

use crate::error::ExportError;
use crate::store::Job;

pub const CSV_HEADER: [&str; 7] = [
    "Job Title",
    "Company Name",
    "Job Location",
    "Job Description",
    "Source URL",
    "Sources",
    "Scraped At",
];

const SCRAPED_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Which jobs to export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportScope {
    All,
    Platform(String),
}

impl ExportScope {
    /// `"all"` (any case) selects every job; anything else is a platform.
    pub fn parse(value: &str) -> Self {
        let value = value.trim();
        if value.eq_ignore_ascii_case("all") {
            ExportScope::All
        } else {
            ExportScope::Platform(value.to_string())
        }
    }

    pub fn platform(&self) -> Option<&str> {
        match self {
            ExportScope::All => None,
            ExportScope::Platform(p) => Some(p.as_str()),
        }
    }
}

/// Download name: `jobs_<platform>.csv` or `jobs_all.csv`.
pub fn export_filename(scope: &ExportScope) -> String {
    format!("jobs_{}.csv", scope.platform().unwrap_or("all"))
}

/// Renders jobs as CSV into memory.
///
/// The whole document is built before anything is returned, so a failure
/// never leaves a truncated file behind.
pub fn write_csv(jobs: &[Job]) -> Result<Vec<u8>, ExportError> {
    let mut writer = csv::WriterBuilder::new().from_writer(Vec::new());
    writer.write_record(CSV_HEADER)?;

    for job in jobs {
        let sources = job
            .sources
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        let scraped_at = job.scraped_at.format(SCRAPED_AT_FORMAT).to_string();
        writer.write_record([
            job.title.as_str(),
            job.company.as_str(),
            job.location.as_str(),
            job.description.as_str(),
            job.source_url.as_str(),
            sources.as_str(),
            scraped_at.as_str(),
        ])?;
    }

    writer
        .into_inner()
        .map_err(|e| ExportError::Finalize(e.to_string()))
}
