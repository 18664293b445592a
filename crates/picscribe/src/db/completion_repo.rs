//! Completion repository: reads and upserts for the `completions` table.

use rusqlite::params;

use super::{Database, DatabaseError};

/// A raw completion row from the database.
///
/// `description == None` is the "already described" sentinel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRow {
    pub path: String,
    pub description: Option<String>,
    pub model: Option<String>,
    pub recorded_at: String,
}

/// Inserts or overwrites the completion record for `row.path`.
pub fn upsert(db: &Database, row: &CompletionRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO completions (path, description, model, recorded_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(path) DO UPDATE SET
                description = excluded.description,
                model = excluded.model,
                recorded_at = excluded.recorded_at",
            params![row.path, row.description, row.model, row.recorded_at],
        )?;
        Ok(())
    })
}

/// Finds the completion record for one path.
pub fn find_by_path(db: &Database, path: &str) -> Result<Option<CompletionRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT path, description, model, recorded_at FROM completions WHERE path = ?1",
        )?;
        let mut rows = stmt.query_map(params![path], map_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// Loads every completion record.
pub fn find_all(db: &Database) -> Result<Vec<CompletionRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt =
            conn.prepare("SELECT path, description, model, recorded_at FROM completions")?;
        let rows = stmt
            .query_map([], map_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Counts completion records.
pub fn count(db: &Database) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row("SELECT COUNT(*) FROM completions", [], |r| r.get(0))?;
        Ok(count)
    })
}

fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<CompletionRow> {
    Ok(CompletionRow {
        path: row.get(0)?,
        description: row.get(1)?,
        model: row.get(2)?,
        recorded_at: row.get(3)?,
    })
}
