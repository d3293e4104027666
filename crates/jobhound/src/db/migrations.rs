//! Database migration system.
//!
//! Tracks applied migrations in a `_migrations` table and applies
//! pending ones in order.

use rusqlite::Connection;

use super::error::DatabaseError;

/// A single migration definition.
struct Migration {
    version: u32,
    description: &'static str,
    sql: &'static str,
}

/// All migrations in order. Each is applied at most once.
const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "create_companies_table",
        sql: include_str!("sql/001_create_companies.sql"),
    },
    Migration {
        version: 2,
        description: "create_jobs_table",
        sql: include_str!("sql/002_create_jobs.sql"),
    },
    Migration {
        version: 3,
        description: "create_job_sources_table",
        sql: include_str!("sql/003_create_job_sources.sql"),
    },
];

/// Runs all pending migrations on the given connection.
pub fn run_all(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    let current_version: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM _migrations",
        [],
        |r| r.get(0),
    )?;

    for migration in MIGRATIONS {
        if migration.version <= current_version {
            continue;
        }

        log::info!(
            "Running migration v{}: {}",
            migration.version,
            migration.description
        );

        conn.execute_batch(migration.sql)
            .map_err(|e| DatabaseError::Migration {
                version: migration.version,
                reason: e.to_string(),
            })?;

        conn.execute(
            "INSERT INTO _migrations (version, description) VALUES (?1, ?2)",
            rusqlite::params![migration.version, migration.description],
        )?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys=ON;").unwrap();
        run_all(&conn).unwrap();
        conn
    }

    #[test]
    fn test_migrations_run_on_fresh_db() {
        let conn = fresh();
        let count: u32 = conn
            .query_row("SELECT COUNT(*) FROM _migrations", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, MIGRATIONS.len() as u32);
    }

    #[test]
    fn test_migrations_are_idempotent() {
        let conn = fresh();
        run_all(&conn).unwrap();

        let count: u32 = conn
            .query_row("SELECT COUNT(*) FROM _migrations", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, MIGRATIONS.len() as u32);
    }

    #[test]
    fn test_jobs_unique_on_fingerprint_and_company() {
        let conn = fresh();
        conn.execute(
            "INSERT INTO companies (name, created_at) VALUES ('Acme', '2026-01-01')",
            [],
        )
        .unwrap();
        let insert = "INSERT INTO jobs (title, location, company_id, fingerprint, scraped_at)
                      VALUES ('Engineer', 'NYC', 1, 'engineer|acme|nyc', '2026-01-01')";
        conn.execute(insert, []).unwrap();
        assert!(conn.execute(insert, []).is_err());
    }

    #[test]
    fn test_deleting_job_cascades_to_sources() {
        let conn = fresh();
        conn.execute_batch(
            "INSERT INTO companies (name, created_at) VALUES ('Acme', '2026-01-01');
             INSERT INTO jobs (title, location, company_id, fingerprint, scraped_at)
                 VALUES ('Engineer', 'NYC', 1, 'engineer|acme|nyc', '2026-01-01');
             INSERT INTO job_sources (job_id, platform, added_at) VALUES (1, 'indeed', '2026-01-01');
             DELETE FROM jobs;",
        )
        .unwrap();
        let count: u32 = conn
            .query_row("SELECT COUNT(*) FROM job_sources", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }
}
