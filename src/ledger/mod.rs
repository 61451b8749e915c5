//! The fixture ledger: an append-only table of applied fixtures.
//!
//! One row is written every time a fixture is successfully applied. Rows are
//! never updated or deleted, so a versioned fixture that gets re-applied
//! leaves one row per applied version.

pub mod checker;
pub mod schema;

pub use checker::{declare_table, ensure_table_exists, tables_exist, tables_exist_at, validate_table};
pub use schema::{validate_table_name, DEFAULT_TABLE, MAX_VALUE_LENGTH};

use crate::error::{FixtureError, Result};
use crate::fixture::version::compare_versions;
use chrono::{DateTime, Utc};
use rusqlite::{params, types::Type, Connection};
use std::cmp::Ordering;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    pub id: i64,
    pub class_name: String,
    pub version: Option<String>,
    pub loaded_at: DateTime<Utc>,
}

/// Highest recorded version per fixture identifier.
#[derive(Debug, Clone, Default)]
pub struct LoadedFixtures {
    versions: HashMap<String, Option<String>>,
}

impl LoadedFixtures {
    pub fn from_entries<'a, I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, Option<&'a str>)>,
    {
        let mut loaded = Self::default();
        for (name, version) in entries {
            loaded.insert(name, version);
        }
        loaded
    }

    pub(crate) fn insert(&mut self, name: &str, version: Option<&str>) {
        let slot = self.versions.entry(name.to_string()).or_insert(None);
        match (slot.as_deref(), version) {
            (_, None) => {}
            (None, Some(v)) => *slot = Some(v.to_string()),
            (Some(current), Some(v)) => {
                if compare_versions(v, current) == Ordering::Greater {
                    *slot = Some(v.to_string());
                }
            }
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.versions.contains_key(name)
    }

    /// Highest version recorded for `name`, `None` if never loaded or only
    /// loaded without a version.
    pub fn loaded_version(&self, name: &str) -> Option<&str> {
        self.versions.get(name).and_then(|v| v.as_deref())
    }

    pub fn is_applied(&self, name: &str, version: Option<&str>) -> bool {
        match (self.versions.get(name), version) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(None), Some(_)) => false,
            (Some(Some(loaded)), Some(current)) => {
                compare_versions(loaded, current) != Ordering::Less
            }
        }
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }
}

/// Reads and appends rows of the ledger table.
#[derive(Debug, Clone)]
pub struct FixtureLedger {
    table: String,
}

impl FixtureLedger {
    pub fn new(table: &str) -> Result<Self> {
        validate_table_name(table)?;
        Ok(Self {
            table: table.to_string(),
        })
    }

    pub fn table_name(&self) -> &str {
        &self.table
    }

    fn row_to_entry(row: &rusqlite::Row) -> rusqlite::Result<LedgerEntry> {
        let loaded_at_str: String = row.get("loaded_at")?;
        let loaded_at = DateTime::parse_from_rfc3339(&loaded_at_str)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(e)))?;
        Ok(LedgerEntry {
            id: row.get("id")?,
            class_name: row.get("class_name")?,
            version: row.get("version")?,
            loaded_at,
        })
    }

    /// All rows in insertion order.
    pub fn entries(&self, conn: &Connection) -> Result<Vec<LedgerEntry>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT id, class_name, version, loaded_at FROM {} ORDER BY id",
            self.table
        ))?;
        let entries = stmt
            .query_map([], Self::row_to_entry)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    pub fn loaded_state(&self, conn: &Connection) -> Result<LoadedFixtures> {
        let mut stmt = conn.prepare(&format!("SELECT class_name, version FROM {}", self.table))?;
        let mut rows = stmt.query([])?;
        let mut loaded = LoadedFixtures::default();
        while let Some(row) = rows.next()? {
            let name: String = row.get(0)?;
            let version: Option<String> = row.get(1)?;
            loaded.insert(&name, version.as_deref());
        }
        Ok(loaded)
    }

    /// Loaded state restricted to a single fixture.
    pub fn loaded_state_of(&self, conn: &Connection, class_name: &str) -> Result<LoadedFixtures> {
        let mut stmt = conn.prepare(&format!(
            "SELECT version FROM {} WHERE class_name = ?1",
            self.table
        ))?;
        let mut rows = stmt.query(params![class_name])?;
        let mut loaded = LoadedFixtures::default();
        while let Some(row) = rows.next()? {
            let version: Option<String> = row.get(0)?;
            loaded.insert(class_name, version.as_deref());
        }
        Ok(loaded)
    }

    /// Appends a row for an applied fixture.
    pub fn record(
        &self,
        conn: &Connection,
        class_name: &str,
        version: Option<&str>,
    ) -> Result<LedgerEntry> {
        check_length("class_name", class_name)?;
        if let Some(version) = version {
            check_length("version", version)?;
        }
        let loaded_at = Utc::now();
        conn.execute(
            &format!(
                "INSERT INTO {} (class_name, version, loaded_at) VALUES (?1, ?2, ?3)",
                self.table
            ),
            params![class_name, version, loaded_at.to_rfc3339()],
        )?;
        Ok(LedgerEntry {
            id: conn.last_insert_rowid(),
            class_name: class_name.to_string(),
            version: version.map(str::to_string),
            loaded_at,
        })
    }
}

fn check_length(field: &'static str, value: &str) -> Result<()> {
    if value.chars().count() > MAX_VALUE_LENGTH {
        return Err(FixtureError::ValueTooLong {
            field,
            value: value.to_string(),
            max: MAX_VALUE_LENGTH,
        });
    }
    Ok(())
}
