//! Existence checks and creation for the ledger table.

use super::schema::TableDefinition;
use crate::error::Result;
use rusqlite::{params, Connection, OpenFlags};
use std::path::Path;
use tracing::{info, warn};

/// Returns true only if every table in `tables` exists.
///
/// Driver errors are reported as "not present" and logged, never returned.
/// An empty list is never present.
pub fn tables_exist<S: AsRef<str>>(conn: &Connection, tables: &[S]) -> bool {
    if tables.is_empty() {
        return false;
    }
    match query_tables_exist(conn, tables) {
        Ok(exists) => exists,
        Err(e) => {
            warn!("Treating tables as absent after database error: {}", e);
            false
        }
    }
}

fn query_tables_exist<S: AsRef<str>>(conn: &Connection, tables: &[S]) -> rusqlite::Result<bool> {
    // Identifiers are case-insensitive in SQLite
    let mut stmt = conn.prepare(
        "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1 COLLATE NOCASE",
    )?;
    for table in tables {
        let count: i64 = stmt.query_row(params![table.as_ref()], |row| row.get(0))?;
        if count == 0 {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Like [`tables_exist`], but establishes the connection itself.
///
/// The database file is never created; a connection that cannot be
/// established counts as "not present".
pub fn tables_exist_at<P: AsRef<Path>, S: AsRef<str>>(db_path: P, tables: &[S]) -> bool {
    if tables.is_empty() {
        return false;
    }
    let flags = OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX;
    match Connection::open_with_flags(db_path.as_ref(), flags) {
        Ok(conn) => tables_exist(&conn, tables),
        Err(e) => {
            warn!(
                "Could not connect to {:?}, treating tables as absent: {}",
                db_path.as_ref(),
                e
            );
            false
        }
    }
}

/// Creates the ledger table and its index.
pub fn declare_table(conn: &Connection, table_name: &str) -> Result<()> {
    let table = TableDefinition::ledger(table_name)?;
    table.create(conn)
}

/// Creates the ledger table if it is absent, returning whether it was created.
pub fn ensure_table_exists(conn: &Connection, table_name: &str) -> Result<bool> {
    let table = TableDefinition::ledger(table_name)?;
    if tables_exist(conn, &[table_name]) {
        return Ok(false);
    }
    info!("Creating fixture ledger table {}", table_name);
    table.create(conn)?;
    Ok(true)
}

/// Checks that an existing ledger table has the expected shape.
pub fn validate_table(conn: &Connection, table_name: &str) -> Result<()> {
    TableDefinition::ledger(table_name)?.validate(conn)
}
