use thiserror::Error;

/// Errors that can occur while discovering or applying data fixtures.
#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid ledger table name: {0:?}")]
    InvalidTableName(String),

    #[error("Ledger table {table} does not match the expected schema: {reason}")]
    SchemaMismatch { table: String, reason: String },

    #[error("Invalid fixture {name}: {reason}")]
    InvalidFixture { name: String, reason: String },

    #[error("Fixture {fixture} depends on unknown fixture {dependency}")]
    MissingDependency { fixture: String, dependency: String },

    #[error("Circular dependency between fixtures: {}", .0.join(", "))]
    CircularDependency(Vec<String>),

    #[error("Fixture {name} failed after {} applied fixture(s): {source}", .applied.len())]
    FixtureFailed {
        name: String,
        applied: Vec<String>,
        #[source]
        source: Box<FixtureError>,
    },

    #[error("{field} is longer than {max} characters: {value:?}")]
    ValueTooLong {
        field: &'static str,
        value: String,
        max: usize,
    },
}

impl FixtureError {
    /// Process exit code to report for this error. Never 0.
    pub fn exit_code(&self) -> i32 {
        match self {
            FixtureError::Database(_) => 2,
            FixtureError::Io { .. } => 3,
            FixtureError::InvalidTableName(_) | FixtureError::SchemaMismatch { .. } => 4,
            FixtureError::InvalidFixture { .. }
            | FixtureError::MissingDependency { .. }
            | FixtureError::CircularDependency(_) => 5,
            FixtureError::FixtureFailed { .. } => 6,
            FixtureError::ValueTooLong { .. } => 1,
        }
    }

    pub(crate) fn io(path: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
        FixtureError::Io {
            path: path.as_ref().display().to_string(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, FixtureError>;
