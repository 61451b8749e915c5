//! The load command: ties configuration, discovery and execution together.

use crate::config::AppConfig;
use crate::error::{FixtureError, Result};
use crate::executor::{DataFixturesExecutor, ExecutionReport, FixturesListener};
use crate::fixture::FixturesType;
use crate::ledger::{self, FixtureLedger};
use crate::loader::{DataFixturesLoader, PendingFixture};
use rusqlite::Connection;
use std::cell::RefCell;
use std::io::Write;
use std::time::Duration;
use tracing::{debug, info, warn};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    pub fixtures_type: FixturesType,
    /// List pending fixtures without applying them.
    pub dry_run: bool,
    /// Only load fixtures from these modules. Empty means all modules.
    pub bundles: Vec<String>,
    /// Skip fixtures from these modules.
    pub exclude: Vec<String>,
}

impl LoadOptions {
    fn includes(&self, module: &str) -> bool {
        if !self.bundles.is_empty() && !self.bundles.iter().any(|b| b == module) {
            return false;
        }
        !self.exclude.iter().any(|e| e == module)
    }
}

#[derive(Debug)]
pub enum LoadOutcome {
    /// No fixture was pending.
    NothingToLoad,
    /// Dry run: pending fixtures, in application order.
    Listed(Vec<String>),
    Applied(ExecutionReport),
}

pub struct LoadCommand {
    config: AppConfig,
    listeners: Vec<Box<dyn FixturesListener>>,
}

impl LoadCommand {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            listeners: Vec::new(),
        }
    }

    pub fn add_listener<L: FixturesListener + 'static>(&mut self, listener: L) {
        self.listeners.push(Box::new(listener));
    }

    /// Opens the configured database, creating the file if needed.
    pub fn open_connection(&self) -> Result<Connection> {
        info!("Opening fixtures database at {:?}", self.config.database);
        let conn = Connection::open(&self.config.database)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(conn)
    }

    /// Creates the ledger table if it is missing and checks its shape.
    pub fn ensure_table_exist(&self, conn: &Connection) -> Result<()> {
        ledger::ensure_table_exists(conn, &self.config.table)?;
        ledger::validate_table(conn, &self.config.table)
    }

    /// Adds the fixtures of every module selected by `options` to `loader`.
    pub fn collect_fixtures(
        &self,
        options: &LoadOptions,
        loader: &mut DataFixturesLoader,
    ) -> Result<()> {
        let modules = self.config.all_modules();
        for name in options.bundles.iter().chain(options.exclude.iter()) {
            if !modules.iter().any(|m| &m.name == name) {
                warn!("Unknown module {:?} in module filters", name);
            }
        }

        for module in modules {
            if !options.includes(&module.name) {
                debug!("Skipping fixtures of module {}", module.name);
                continue;
            }
            let dir = self
                .config
                .fixtures_dir(&module.path, options.fixtures_type);
            loader.load_from_directory(&module.name, &dir)?;
        }
        Ok(())
    }

    pub fn run<W: Write>(
        &mut self,
        conn: &mut Connection,
        options: &LoadOptions,
        out: &mut W,
    ) -> Result<LoadOutcome> {
        self.run_with_loader(conn, options, DataFixturesLoader::new(), out)
    }

    /// Runs with a loader that may already hold code-defined fixtures.
    pub fn run_with_loader<W: Write>(
        &mut self,
        conn: &mut Connection,
        options: &LoadOptions,
        mut loader: DataFixturesLoader,
        out: &mut W,
    ) -> Result<LoadOutcome> {
        self.ensure_table_exist(conn)?;
        self.collect_fixtures(options, &mut loader)?;

        let ledger = FixtureLedger::new(&self.config.table)?;
        let loaded = ledger.loaded_state(conn)?;
        let pending = loader.into_pending(&loaded)?;
        if pending.is_empty() {
            info!("No {} fixtures to load", options.fixtures_type);
            return Ok(LoadOutcome::NothingToLoad);
        }

        if options.dry_run {
            return self.output_fixtures(options.fixtures_type, &pending, out);
        }
        self.process_fixtures(conn, ledger, options.fixtures_type, pending, out)
    }

    fn output_fixtures<W: Write>(
        &self,
        fixtures_type: FixturesType,
        pending: &[PendingFixture],
        out: &mut W,
    ) -> Result<LoadOutcome> {
        write_line(out, &format!("List of \"{}\" data fixtures ...", fixtures_type))?;
        for fixture in pending {
            write_line(out, &format!("  > {}", fixture.name()))?;
        }
        Ok(LoadOutcome::Listed(
            pending.iter().map(|p| p.name().to_string()).collect(),
        ))
    }

    fn process_fixtures<W: Write>(
        &mut self,
        conn: &mut Connection,
        ledger: FixtureLedger,
        fixtures_type: FixturesType,
        pending: Vec<PendingFixture>,
        out: &mut W,
    ) -> Result<LoadOutcome> {
        write_line(out, &format!("Loading \"{}\" data fixtures ...", fixtures_type))?;

        let out = RefCell::new(out);
        let mut executor = DataFixturesExecutor::new(conn, ledger);
        executor.set_logger(|message| {
            if let Err(e) = write_line(&mut **out.borrow_mut(), &format!("  > {}", message)) {
                warn!("Could not write progress message: {}", e);
            }
        });
        for listener in self.listeners.drain(..) {
            executor.add_listener(listener);
        }
        let report = executor.execute(pending, fixtures_type)?;
        Ok(LoadOutcome::Applied(report))
    }
}

fn write_line<W: Write + ?Sized>(out: &mut W, line: &str) -> Result<()> {
    writeln!(out, "{}", line).map_err(|e| FixtureError::io("<output>", e))
}
