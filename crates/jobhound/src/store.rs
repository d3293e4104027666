//! Job store: the fingerprint-keyed merge engine over the database.
//!
//! One job exists per (fingerprint, company). Saving a posting that is
//! already known only attaches the platform tag; all other fields keep the
//! values of the posting that created the job.

use std::collections::BTreeSet;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::db::company_repo;
use crate::db::job_repo::{self, JobRow, NewJob};
use crate::db::Database;
use crate::error::StoreError;
use crate::normalize;
use crate::provider::ProviderResult;

// ─── Helpers ────────────────────────────────────────────────────────────────

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|e| {
            log::warn!("parse_timestamp: failed to parse '{}': {}", s, e);
            Utc::now()
        })
}

/// Fixed-width RFC 3339 so stored timestamps sort lexicographically.
fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

// ─── Domain types ───────────────────────────────────────────────────────────

/// A posting ready to be merged into the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobCandidate {
    pub title: String,
    /// Company identity: trimmed, otherwise exact.
    pub company: String,
    pub location: String,
    pub description: String,
    pub source_url: String,
    pub fingerprint: String,
    pub posted_at: Option<DateTime<Utc>>,
    pub synthetic: bool,
}

impl JobCandidate {
    pub fn from_result(result: &ProviderResult) -> Self {
        let title = result.title.trim().to_string();
        let company = result.company.trim().to_string();
        let location = result.location.trim().to_string();
        let fingerprint = normalize::fingerprint(&title, &company, &location);

        Self {
            title,
            company,
            location,
            description: result.description.trim().to_string(),
            source_url: result.source_url.trim().to_string(),
            fingerprint,
            posted_at: None,
            synthetic: result.synthetic,
        }
    }

    fn validate(&self) -> Result<(), StoreError> {
        if self.synthetic {
            return Err(StoreError::SyntheticCandidate {
                title: self.title.clone(),
            });
        }
        if self.title.is_empty() {
            return Err(StoreError::InvalidCandidate("empty title".to_string()));
        }
        if self.company.is_empty() {
            return Err(StoreError::InvalidCandidate(format!(
                "empty company for '{}'",
                self.title
            )));
        }
        Ok(())
    }
}

/// A persisted job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: i64,
    pub title: String,
    pub company: String,
    pub location: String,
    pub description: String,
    pub source_url: String,
    pub sources: BTreeSet<String>,
    pub fingerprint: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub posted_at: Option<DateTime<Utc>>,
    pub scraped_at: DateTime<Utc>,
}

impl Job {
    pub fn from_row(row: JobRow) -> Self {
        Self {
            scraped_at: parse_timestamp(&row.scraped_at),
            posted_at: row.posted_at.as_deref().map(parse_timestamp),
            id: row.id,
            title: row.title,
            company: row.company_name,
            location: row.location,
            description: row.description,
            source_url: row.source_url,
            sources: row.sources.into_iter().collect(),
            fingerprint: row.fingerprint,
        }
    }
}

/// Result of [`JobStore::upsert`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertOutcome {
    pub job: Job,
    /// `false` when an existing job was merged.
    pub created: bool,
}

/// Result of [`JobStore::apply_rescrape_policy`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RescrapeSummary {
    /// Platform tags detached from jobs.
    pub tags_removed: usize,
    /// Jobs deleted because no tag remained.
    pub jobs_deleted: usize,
}

/// Result of [`JobStore::clear_all`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClearSummary {
    pub jobs: usize,
    pub companies: usize,
}

// ─── JobStore ───────────────────────────────────────────────────────────────

/// Business layer over the job and company tables. Cloning is cheap.
#[derive(Clone)]
pub struct JobStore {
    db: Database,
}

impl JobStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Creates the job or merges `platform` into the existing one.
    ///
    /// Runs in one transaction; the unique (fingerprint, company) constraint
    /// makes racing upserts of the same key converge on a single row.
    pub fn upsert(
        &self,
        candidate: &JobCandidate,
        platform: &str,
    ) -> Result<UpsertOutcome, StoreError> {
        candidate.validate()?;
        let now = format_timestamp(Utc::now());
        let posted_at = candidate.posted_at.map(format_timestamp);

        self.db.with_transaction(|tx| {
            let company = company_repo::resolve_or_create(tx, &candidate.company, &now)?;

            let new_job = NewJob {
                title: &candidate.title,
                location: &candidate.location,
                description: &candidate.description,
                company_id: company.id,
                source_url: &candidate.source_url,
                fingerprint: &candidate.fingerprint,
                posted_at: posted_at.as_deref(),
                scraped_at: &now,
            };

            let (job_id, created) = match job_repo::insert_if_absent(tx, &new_job)? {
                Some(id) => (id, true),
                None => {
                    let existing = job_repo::find_by_key(tx, &candidate.fingerprint, company.id)?
                        .ok_or_else(|| {
                            StoreError::InvalidCandidate(format!(
                                "job '{}' vanished during merge",
                                candidate.fingerprint
                            ))
                        })?;
                    (existing.id, false)
                }
            };

            if job_repo::add_source(tx, job_id, platform, &now)? {
                log::debug!(
                    "Tagged job {} with '{}' ({})",
                    job_id,
                    platform,
                    if created { "created" } else { "merged" }
                );
            }

            let row = job_repo::find_by_id(tx, job_id)?.ok_or_else(|| {
                StoreError::InvalidCandidate(format!("job {} vanished during merge", job_id))
            })?;

            Ok(UpsertOutcome {
                job: Job::from_row(row),
                created,
            })
        })
    }

    /// Prepares a fresh scrape of `platform`: detaches its tag from every
    /// job and deletes the jobs left without any source. Jobs also found on
    /// other platforms survive.
    pub fn apply_rescrape_policy(&self, platform: &str) -> Result<RescrapeSummary, StoreError> {
        let summary = self.db.with_transaction(|tx| {
            let tags_removed = job_repo::strip_platform(tx, platform)?;
            let jobs_deleted = job_repo::delete_sourceless(tx)?;
            Ok::<_, StoreError>(RescrapeSummary {
                tags_removed,
                jobs_deleted,
            })
        })?;

        log::info!(
            "Rescrape of '{}': detached {} tags, deleted {} jobs",
            platform,
            summary.tags_removed,
            summary.jobs_deleted
        );
        Ok(summary)
    }

    /// Deletes every job and company.
    pub fn clear_all(&self) -> Result<ClearSummary, StoreError> {
        let summary = self.db.with_transaction(|tx| {
            let jobs = job_repo::delete_all(tx)?;
            let companies = company_repo::delete_all(tx)?;
            Ok::<_, StoreError>(ClearSummary { jobs, companies })
        })?;

        log::info!(
            "Cleared {} jobs and {} companies",
            summary.jobs,
            summary.companies
        );
        Ok(summary)
    }

    /// Most recently scraped jobs first.
    pub fn list_latest(&self, platform: Option<&str>, limit: u64) -> Result<Vec<Job>, StoreError> {
        let rows = self
            .db
            .with_conn(|conn| job_repo::list_recent(conn, platform, Some(limit)))?;
        Ok(rows.into_iter().map(Job::from_row).collect())
    }

    /// Every job (optionally only those tagged with `platform`), newest first.
    pub fn jobs_for_export(&self, platform: Option<&str>) -> Result<Vec<Job>, StoreError> {
        let rows = self
            .db
            .with_conn(|conn| job_repo::list_recent(conn, platform, None))?;
        Ok(rows.into_iter().map(Job::from_row).collect())
    }

    pub fn count_jobs(&self) -> Result<u64, StoreError> {
        Ok(self.db.with_conn(job_repo::count)?)
    }

    pub fn count_companies(&self) -> Result<u64, StoreError> {
        Ok(self.db.with_conn(company_repo::count)?)
    }
}
