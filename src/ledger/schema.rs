//! SQLite table definition for the fixture ledger.
//!
//! The ledger is a single table whose name is chosen at runtime, so the
//! definition carries an owned name and a static column set.

use crate::error::{FixtureError, Result};
use lazy_static::lazy_static;
use regex::Regex;
use rusqlite::{params, types::Type, Connection, OptionalExtension};

/// Table name used when the configuration does not override it.
pub const DEFAULT_TABLE: &str = "fixture_data";

/// Maximum length of the `class_name` and `version` columns.
pub const MAX_VALUE_LENGTH: usize = 255;

#[macro_export]
macro_rules! sqlite_column {
    ($name:expr, $sql_type:expr $(, $field:ident = $value:expr)*) => {
        {
            // Allow unused_mut because the variable is only mutated when optional
            // field assignments are passed to the macro (e.g., `is_primary_key = true`)
            #[allow(unused_mut)]
            let mut column = $crate::ledger::schema::Column {
                name: $name,
                sql_type: $sql_type,
                is_primary_key: false,
                is_autoincrement: false,
                non_null: false,
            };
            $(
                column.$field = $value;
            )*
            column
        }
    };
}

#[derive(Debug, PartialEq, Eq)]
pub enum SqlType {
    Text,
    Integer,
}

impl SqlType {
    fn as_sql(&self) -> &'static str {
        match self {
            SqlType::Text => "TEXT",
            SqlType::Integer => "INTEGER",
        }
    }
}

#[derive(Debug)]
pub struct Column<'a, S: AsRef<str>> {
    pub name: S,
    pub sql_type: &'a SqlType,
    pub is_primary_key: bool,
    pub is_autoincrement: bool,
    pub non_null: bool,
}

/// Columns of the ledger table, in declaration order.
pub const LEDGER_COLUMNS: &[Column<'static, &'static str>] = &[
    sqlite_column!(
        "id",
        &SqlType::Integer,
        is_primary_key = true,
        is_autoincrement = true,
        non_null = true
    ),
    sqlite_column!("class_name", &SqlType::Text, non_null = true),
    sqlite_column!("version", &SqlType::Text),
    sqlite_column!("loaded_at", &SqlType::Text, non_null = true),
];

lazy_static! {
    static ref TABLE_NAME_RE: Regex = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap();
}

/// Rejects names that cannot be interpolated into SQL as a bare identifier.
pub fn validate_table_name(name: &str) -> Result<()> {
    if TABLE_NAME_RE.is_match(name) && !name.to_ascii_lowercase().starts_with("sqlite_") {
        Ok(())
    } else {
        Err(FixtureError::InvalidTableName(name.to_string()))
    }
}

pub struct TableDefinition {
    pub name: String,
    pub columns: &'static [Column<'static, &'static str>],
    /// (index name suffix, column list); the full name is `idx_<table>_<suffix>`.
    pub indices: &'static [(&'static str, &'static str)],
}

impl TableDefinition {
    /// The ledger table definition for the given table name.
    pub fn ledger(name: &str) -> Result<Self> {
        validate_table_name(name)?;
        Ok(Self {
            name: name.to_string(),
            columns: LEDGER_COLUMNS,
            indices: &[("class_name", "class_name")],
        })
    }

    pub fn index_name(&self, suffix: &str) -> String {
        format!("idx_{}_{}", self.name, suffix)
    }

    pub fn create_sql(&self) -> String {
        let mut create_sql = format!("CREATE TABLE {} (", self.name);
        for (column_index, column) in self.columns.iter().enumerate() {
            if column_index > 0 {
                create_sql.push_str(", ");
            }
            create_sql.push_str(&format!("{} {}", column.name, column.sql_type.as_sql()));
            if column.is_primary_key {
                create_sql.push_str(" PRIMARY KEY");
            }
            if column.is_autoincrement {
                create_sql.push_str(" AUTOINCREMENT");
            }
            if column.non_null && !column.is_primary_key {
                create_sql.push_str(" NOT NULL");
            }
        }
        create_sql.push_str(");");
        create_sql
    }

    /// Creates the table and its indices in a single transaction.
    pub fn create(&self, conn: &Connection) -> Result<()> {
        let tx = conn.unchecked_transaction()?;
        tx.execute(&self.create_sql(), params![])?;
        for (suffix, column_names) in self.indices {
            tx.execute(
                &format!(
                    "CREATE INDEX {} ON {}({});",
                    self.index_name(suffix),
                    self.name,
                    column_names
                ),
                params![],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn mismatch(&self, reason: String) -> FixtureError {
        FixtureError::SchemaMismatch {
            table: self.name.clone(),
            reason,
        }
    }

    /// Checks an existing table against this definition.
    pub fn validate(&self, conn: &Connection) -> Result<()> {
        let mut stmt = conn.prepare(&format!("PRAGMA table_info({});", self.name))?;
        let actual_columns: Vec<Column<'_, String>> = stmt
            .query_map(params![], |row| {
                let name = row.get::<usize, String>(1)?;
                let sql_type = match row.get::<_, String>(2)?.to_ascii_uppercase().as_str() {
                    "TEXT" => &SqlType::Text,
                    "INTEGER" => &SqlType::Integer,
                    _ => {
                        return Err(rusqlite::Error::InvalidColumnType(
                            2,
                            name,
                            Type::Text,
                        ))
                    }
                };
                let is_primary_key = row.get::<_, i32>(5)? >= 1;
                Ok(Column {
                    name,
                    sql_type,
                    // SQLite reports notnull = 0 for an INTEGER PRIMARY KEY alias of rowid
                    non_null: row.get::<_, i32>(3)? == 1 || is_primary_key,
                    is_primary_key,
                    is_autoincrement: false,
                })
            })?
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| self.mismatch(format!("unreadable column definition: {}", e)))?;

        if actual_columns.is_empty() {
            return Err(self.mismatch("table does not exist".to_string()));
        }

        if actual_columns.len() != self.columns.len() {
            return Err(self.mismatch(format!(
                "found {} columns ({}), expected {} ({})",
                actual_columns.len(),
                actual_columns
                    .iter()
                    .map(|c| c.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
                self.columns.len(),
                self.columns
                    .iter()
                    .map(|c| c.name)
                    .collect::<Vec<_>>()
                    .join(", ")
            )));
        }

        for (actual_column, expected_column) in actual_columns.iter().zip(self.columns.iter()) {
            if actual_column.name != expected_column.name {
                return Err(self.mismatch(format!(
                    "column name mismatch: expected {}, got {}",
                    expected_column.name, actual_column.name
                )));
            }
            if actual_column.sql_type != expected_column.sql_type {
                return Err(self.mismatch(format!(
                    "column {} type mismatch: expected {:?}, got {:?}",
                    expected_column.name, expected_column.sql_type, actual_column.sql_type
                )));
            }
            if actual_column.non_null != expected_column.non_null {
                return Err(self.mismatch(format!(
                    "column {} non-null mismatch: expected {}, got {}",
                    expected_column.name, expected_column.non_null, actual_column.non_null
                )));
            }
            if actual_column.is_primary_key != expected_column.is_primary_key {
                return Err(self.mismatch(format!(
                    "column {} primary key mismatch: expected {}, got {}",
                    expected_column.name,
                    expected_column.is_primary_key,
                    actual_column.is_primary_key
                )));
            }
        }

        if self.columns.iter().any(|c| c.is_autoincrement) {
            // AUTOINCREMENT is only visible in the stored CREATE statement
            let create_sql: String = conn.query_row(
                "SELECT sql FROM sqlite_master WHERE type='table' AND name=?1 COLLATE NOCASE",
                params![self.name],
                |row| row.get(0),
            )?;
            if !create_sql.to_ascii_uppercase().contains("AUTOINCREMENT") {
                return Err(self.mismatch("primary key is not AUTOINCREMENT".to_string()));
            }
        }

        for (suffix, _columns) in self.indices {
            let index_name = self.index_name(suffix);
            let index_exists = conn
                .query_row(
                    "SELECT 1 FROM sqlite_master \
                     WHERE type='index' AND name=?1 COLLATE NOCASE AND tbl_name=?2 COLLATE NOCASE",
                    params![index_name, self.name],
                    |_| Ok(true),
                )
                .optional()?
                .unwrap_or(false);

            if !index_exists {
                return Err(self.mismatch(format!("missing index '{}'", index_name)));
            }
        }
        Ok(())
    }
}
