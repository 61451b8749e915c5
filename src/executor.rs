//! Applies pending fixtures and records them in the ledger.
//!
//! Every fixture runs in its own IMMEDIATE transaction together with its
//! ledger row. The ledger is re-read inside that transaction, so a fixture
//! applied by a concurrent run in the meantime is skipped instead of being
//! applied twice. The first failure stops the run; fixtures committed
//! before it stay applied and recorded.

use crate::error::{FixtureError, Result};
use crate::fixture::{FixtureContext, FixturesType};
use crate::ledger::{FixtureLedger, LedgerEntry};
use crate::loader::PendingFixture;
use rusqlite::{Connection, TransactionBehavior};
use tracing::{info, warn};

/// Payload of the pre-load and post-load events.
#[derive(Debug, Clone)]
pub struct FixturesEvent<'a> {
    pub fixtures_type: FixturesType,
    /// Before loading: fixtures about to run. After loading: fixtures applied.
    pub fixtures: &'a [String],
}

/// Hooks around a fixtures run.
pub trait FixturesListener {
    /// Called before any fixture is applied. An error aborts the run.
    fn pre_load(&mut self, _conn: &Connection, _event: &FixturesEvent) -> Result<()> {
        Ok(())
    }

    /// Called once all fixtures were applied successfully.
    fn post_load(&mut self, _conn: &Connection, _event: &FixturesEvent) -> Result<()> {
        Ok(())
    }
}

impl<T: FixturesListener + ?Sized> FixturesListener for Box<T> {
    fn pre_load(&mut self, conn: &Connection, event: &FixturesEvent) -> Result<()> {
        (**self).pre_load(conn, event)
    }

    fn post_load(&mut self, conn: &Connection, event: &FixturesEvent) -> Result<()> {
        (**self).post_load(conn, event)
    }
}

#[derive(Debug, Clone)]
pub struct ExecutionReport {
    pub fixtures_type: FixturesType,
    pub applied: Vec<LedgerEntry>,
    /// Fixtures found already applied when their transaction started.
    pub skipped: Vec<String>,
}

impl ExecutionReport {
    pub fn applied_names(&self) -> Vec<String> {
        self.applied.iter().map(|e| e.class_name.clone()).collect()
    }
}

pub struct DataFixturesExecutor<'c> {
    conn: &'c mut Connection,
    ledger: FixtureLedger,
    logger: Option<Box<dyn Fn(&str) + 'c>>,
    listeners: Vec<Box<dyn FixturesListener + 'c>>,
}

impl<'c> DataFixturesExecutor<'c> {
    pub fn new(conn: &'c mut Connection, ledger: FixtureLedger) -> Self {
        Self {
            conn,
            ledger,
            logger: None,
            listeners: Vec::new(),
        }
    }

    /// Receives a line per progress message, in addition to tracing.
    pub fn set_logger<F: Fn(&str) + 'c>(&mut self, logger: F) {
        self.logger = Some(Box::new(logger));
    }

    pub fn add_listener<L: FixturesListener + 'c>(&mut self, listener: L) {
        self.listeners.push(Box::new(listener));
    }

    fn log(&self, message: &str) {
        info!("{}", message);
        if let Some(logger) = &self.logger {
            logger(message);
        }
    }

    pub fn execute(
        &mut self,
        fixtures: Vec<PendingFixture>,
        fixtures_type: FixturesType,
    ) -> Result<ExecutionReport> {
        let names: Vec<String> = fixtures.iter().map(|f| f.name().to_string()).collect();
        let event = FixturesEvent {
            fixtures_type,
            fixtures: &names,
        };
        for listener in self.listeners.iter_mut() {
            listener.pre_load(&*self.conn, &event)?;
        }

        let mut report = ExecutionReport {
            fixtures_type,
            applied: Vec::new(),
            skipped: Vec::new(),
        };
        for pending in &fixtures {
            match self.version_message(pending) {
                Some(message) => self.log(&message),
                None => self.log(&format!("loading {}", pending.name())),
            }
            match self.apply(pending, fixtures_type) {
                Ok(Some(entry)) => report.applied.push(entry),
                Ok(None) => {
                    self.log(&format!(
                        "skipping {}, it was applied by another run",
                        pending.name()
                    ));
                    report.skipped.push(pending.name().to_string());
                }
                Err(e) => {
                    warn!("Fixture {} failed: {}", pending.name(), e);
                    return Err(FixtureError::FixtureFailed {
                        name: pending.name().to_string(),
                        applied: report.applied_names(),
                        source: Box::new(e),
                    });
                }
            }
        }

        let applied = report.applied_names();
        let event = FixturesEvent {
            fixtures_type,
            fixtures: &applied,
        };
        for listener in self.listeners.iter_mut() {
            listener.post_load(&*self.conn, &event)?;
        }
        Ok(report)
    }

    fn version_message(&self, pending: &PendingFixture) -> Option<String> {
        let version = pending.version()?;
        Some(match pending.loaded_version.as_deref() {
            Some(previous) => format!(
                "loading {} (version {}, previously {})",
                pending.name(),
                version,
                previous
            ),
            None => format!("loading {} (version {})", pending.name(), version),
        })
    }

    fn apply(
        &mut self,
        pending: &PendingFixture,
        fixtures_type: FixturesType,
    ) -> Result<Option<LedgerEntry>> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let loaded = self.ledger.loaded_state_of(&tx, pending.name())?;
        if loaded.is_applied(pending.name(), pending.version()) {
            return Ok(None);
        }

        let ctx = FixtureContext {
            fixtures_type,
            loaded_version: loaded.loaded_version(pending.name()),
        };
        pending.fixture.load(&tx, &ctx)?;
        let entry = self
            .ledger
            .record(&tx, pending.name(), pending.version())?;
        tx.commit()?;
        Ok(Some(entry))
    }
}
