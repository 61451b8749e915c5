//! Common test infrastructure
//!
//! Tests build a throwaway application tree with [`TestProject`], write SQL
//! fixtures into its modules and run the load command against it.
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use common::{TestProject, APP};
//!
//! #[test]
//! fn test_loads_countries() {
//!     let project = TestProject::new();
//!     project.write_main(APP, "countries.sql", "INSERT INTO t VALUES (1);");
//!     let run = project.load(&Default::default());
//!     assert!(run.result.is_ok());
//! }
//! ```

mod constants;
mod fixtures;

pub use constants::*;
pub use fixtures::TestProject;
