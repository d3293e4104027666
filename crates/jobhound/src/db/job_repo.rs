//! Job repository: raw SQL over the `jobs` and `job_sources` tables.
//!
//! Every function takes a plain `&Connection` so callers can compose them
//! inside a single transaction.

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::DatabaseError;

const SELECT_JOB: &str = "SELECT j.id, j.title, j.location, j.description, j.company_id,
            c.name AS company_name, j.source_url, j.fingerprint, j.posted_at, j.scraped_at
     FROM jobs j
     JOIN companies c ON c.id = j.company_id";

/// A job row joined with its company name and source tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRow {
    pub id: i64,
    pub title: String,
    pub location: String,
    pub description: String,
    pub company_id: i64,
    pub company_name: String,
    pub source_url: String,
    pub fingerprint: String,
    pub posted_at: Option<String>,
    pub scraped_at: String,
    /// Platform tags in the order they were attached.
    pub sources: Vec<String>,
}

impl JobRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            title: row.get("title")?,
            location: row.get("location")?,
            description: row.get("description")?,
            company_id: row.get("company_id")?,
            company_name: row.get("company_name")?,
            source_url: row.get("source_url")?,
            fingerprint: row.get("fingerprint")?,
            posted_at: row.get("posted_at")?,
            scraped_at: row.get("scraped_at")?,
            sources: Vec::new(),
        })
    }
}

/// Fields for a job about to be created.
#[derive(Debug, Clone)]
pub struct NewJob<'a> {
    pub title: &'a str,
    pub location: &'a str,
    pub description: &'a str,
    pub company_id: i64,
    pub source_url: &'a str,
    pub fingerprint: &'a str,
    pub posted_at: Option<&'a str>,
    pub scraped_at: &'a str,
}

/// Inserts the job unless one with the same (fingerprint, company) exists.
///
/// Returns the new row id, or `None` when the key was already taken.
pub fn insert_if_absent(conn: &Connection, job: &NewJob<'_>) -> Result<Option<i64>, DatabaseError> {
    let inserted = conn.execute(
        "INSERT INTO jobs (title, location, description, company_id, source_url,
             fingerprint, posted_at, scraped_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT(fingerprint, company_id) DO NOTHING",
        params![
            job.title,
            job.location,
            job.description,
            job.company_id,
            job.source_url,
            job.fingerprint,
            job.posted_at,
            job.scraped_at,
        ],
    )?;

    if inserted == 1 {
        Ok(Some(conn.last_insert_rowid()))
    } else {
        Ok(None)
    }
}

/// Finds a job by its dedup key.
pub fn find_by_key(
    conn: &Connection,
    fingerprint: &str,
    company_id: i64,
) -> Result<Option<JobRow>, DatabaseError> {
    let sql = format!("{SELECT_JOB} WHERE j.fingerprint = ?1 AND j.company_id = ?2");
    let row = conn
        .query_row(&sql, params![fingerprint, company_id], JobRow::from_row)
        .optional()?;
    row.map(|r| with_sources(conn, r)).transpose()
}

/// Finds a job by id.
pub fn find_by_id(conn: &Connection, id: i64) -> Result<Option<JobRow>, DatabaseError> {
    let sql = format!("{SELECT_JOB} WHERE j.id = ?1");
    let row = conn
        .query_row(&sql, params![id], JobRow::from_row)
        .optional()?;
    row.map(|r| with_sources(conn, r)).transpose()
}

/// Attaches a platform tag. Returns `false` when the tag was already present.
pub fn add_source(
    conn: &Connection,
    job_id: i64,
    platform: &str,
    added_at: &str,
) -> Result<bool, DatabaseError> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO job_sources (job_id, platform, added_at) VALUES (?1, ?2, ?3)",
        params![job_id, platform, added_at],
    )?;
    Ok(inserted == 1)
}

/// Returns a job's platform tags in attachment order.
pub fn sources(conn: &Connection, job_id: i64) -> Result<Vec<String>, DatabaseError> {
    let mut stmt =
        conn.prepare("SELECT platform FROM job_sources WHERE job_id = ?1 ORDER BY rowid")?;
    let rows = stmt.query_map(params![job_id], |r| r.get(0))?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

/// Removes `platform` from every job carrying it. Returns the number of tags removed.
pub fn strip_platform(conn: &Connection, platform: &str) -> Result<usize, DatabaseError> {
    Ok(conn.execute(
        "DELETE FROM job_sources WHERE platform = ?1",
        params![platform],
    )?)
}

/// Deletes jobs that no longer carry any platform tag.
pub fn delete_sourceless(conn: &Connection) -> Result<usize, DatabaseError> {
    Ok(conn.execute(
        "DELETE FROM jobs WHERE NOT EXISTS (
             SELECT 1 FROM job_sources s WHERE s.job_id = jobs.id
         )",
        [],
    )?)
}

/// Counts all jobs.
pub fn count(conn: &Connection) -> Result<u64, DatabaseError> {
    let count: u64 = conn.query_row("SELECT COUNT(*) FROM jobs", [], |r| r.get(0))?;
    Ok(count)
}

/// Deletes every job. Returns the number of rows removed.
pub fn delete_all(conn: &Connection) -> Result<usize, DatabaseError> {
    Ok(conn.execute("DELETE FROM jobs", [])?)
}

/// Lists jobs most-recent-first, optionally only those tagged with
/// `platform`. `limit = None` returns every match.
pub fn list_recent(
    conn: &Connection,
    platform: Option<&str>,
    limit: Option<u64>,
) -> Result<Vec<JobRow>, DatabaseError> {
    let mut sql = String::from(SELECT_JOB);
    let mut bind: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

    if let Some(platform) = platform {
        sql.push_str(
            " WHERE EXISTS (SELECT 1 FROM job_sources s WHERE s.job_id = j.id AND s.platform = ?)",
        );
        bind.push(Box::new(platform.to_string()));
    }

    sql.push_str(" ORDER BY j.scraped_at DESC, j.id DESC");

    if let Some(limit) = limit {
        sql.push_str(" LIMIT ?");
        bind.push(Box::new(limit as i64));
    }

    let mut stmt = conn.prepare(&sql)?;
    let refs: Vec<&dyn rusqlite::types::ToSql> = bind.iter().map(|b| b.as_ref()).collect();
    let rows = stmt.query_map(refs.as_slice(), JobRow::from_row)?;

    let mut out = Vec::new();
    for row in rows {
        out.push(with_sources(conn, row?)?);
    }
    Ok(out)
}

fn with_sources(conn: &Connection, mut row: JobRow) -> Result<JobRow, DatabaseError> {
    row.sources = sources(conn, row.id)?;
    Ok(row)
}
