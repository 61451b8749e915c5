//! Data fixture loader
//!
//! Discovers fixtures across application modules, keeps a ledger table of
//! the fixtures (and versions) already applied, and applies the rest once.

pub mod command;
pub mod config;
pub mod error;
pub mod executor;
pub mod fixture;
pub mod ledger;
pub mod loader;

// Re-export commonly used types for convenience
pub use command::{LoadCommand, LoadOptions, LoadOutcome};
pub use error::{FixtureError, Result};
pub use executor::{DataFixturesExecutor, ExecutionReport, FixturesEvent, FixturesListener};
pub use fixture::{DataFixture, FixtureContext, FixturesType, SqlFileFixture};
pub use ledger::{FixtureLedger, LedgerEntry, LoadedFixtures};
pub use loader::{DataFixturesLoader, PendingFixture};
