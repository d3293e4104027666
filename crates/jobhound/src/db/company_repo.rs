//! Company repository: lookups and lazy creation for the `companies` table.

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::DatabaseError;

/// A raw company row from the database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompanyRow {
    pub id: i64,
    pub name: String,
    pub website: Option<String>,
    pub email: Option<String>,
    pub created_at: String,
}

impl CompanyRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            website: row.get("website")?,
            email: row.get("email")?,
            created_at: row.get("created_at")?,
        })
    }
}

/// Returns the company with exactly this name, creating it if absent.
///
/// Race-safe: the insert is a no-op when another writer already created the
/// row, and the follow-up select always sees the single surviving row.
pub fn resolve_or_create(
    conn: &Connection,
    name: &str,
    created_at: &str,
) -> Result<CompanyRow, DatabaseError> {
    conn.execute(
        "INSERT INTO companies (name, created_at) VALUES (?1, ?2)
         ON CONFLICT(name) DO NOTHING",
        params![name, created_at],
    )?;

    find_by_name(conn, name)?.ok_or_else(|| DatabaseError::InvalidValue {
        column: "name",
        value: name.to_string(),
    })
}

/// Finds a company by exact (case-sensitive) name.
pub fn find_by_name(conn: &Connection, name: &str) -> Result<Option<CompanyRow>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT * FROM companies WHERE name = ?1",
            params![name],
            CompanyRow::from_row,
        )
        .optional()?;
    Ok(row)
}

/// Counts all companies.
pub fn count(conn: &Connection) -> Result<u64, DatabaseError> {
    let count: u64 = conn.query_row("SELECT COUNT(*) FROM companies", [], |r| r.get(0))?;
    Ok(count)
}

/// Deletes every company. Jobs cascade. Returns the number of rows removed.
pub fn delete_all(conn: &Connection) -> Result<usize, DatabaseError> {
    Ok(conn.execute("DELETE FROM companies", [])?)
}
