//! Fixture definitions.
//!
//! A fixture is a unit of seed or demo data that is applied once. Fixtures
//! come either from `*.sql` files found in module directories or from code
//! implementing [`DataFixture`].

mod sql_file;
pub mod version;

pub use sql_file::SqlFileFixture;

use crate::error::Result;
use clap::ValueEnum;
use rusqlite::Transaction;
use std::fmt;

/// Which set of fixtures a run loads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum FixturesType {
    /// Data the application needs to work.
    #[default]
    Main,
    /// Sample data for demonstrations.
    Demo,
}

impl FixturesType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FixturesType::Main => "main",
            FixturesType::Demo => "demo",
        }
    }
}

impl fmt::Display for FixturesType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Context handed to a fixture while it is applied.
#[derive(Debug, Clone)]
pub struct FixtureContext<'a> {
    pub fixtures_type: FixturesType,
    /// Version recorded by a previous application of this fixture, if it
    /// was versioned at the time.
    pub loaded_version: Option<&'a str>,
}

/// A unit of data that is applied to the database at most once per version.
pub trait DataFixture {
    /// Identifier recorded in the ledger, `<module>:<name>`.
    fn name(&self) -> &str;

    /// Current version. Unversioned fixtures are applied only once; versioned
    /// ones are applied again whenever the version goes up.
    fn version(&self) -> Option<&str> {
        None
    }

    /// Identifiers of fixtures that have to be applied before this one.
    fn dependencies(&self) -> &[String] {
        &[]
    }

    /// Applies the data. Runs inside a transaction that also records the
    /// ledger row, so an error rolls back both.
    fn load(&self, tx: &Transaction, ctx: &FixtureContext) -> Result<()>;
}

/// Module part of a fixture identifier, if it has one.
fn module_of(name: &str) -> Option<&str> {
    name.split_once(':').map(|(module, _)| module)
}

/// Resolves a dependency reference written by `fixture`.
///
/// References without a module are taken to be in the fixture's own module.
pub fn qualify_dependency(fixture: &str, dependency: &str) -> String {
    if dependency.contains(':') {
        return dependency.to_string();
    }
    match module_of(fixture) {
        Some(module) => format!("{}:{}", module, dependency),
        None => dependency.to_string(),
    }
}
