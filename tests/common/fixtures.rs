//! Temporary application trees with modules and fixture files.

use super::constants::*;
use fixture_loader::config::{AppConfig, CliConfig, FileConfig, ModuleConfig};
use fixture_loader::{FixtureLedger, LedgerEntry, LoadCommand, LoadOptions, LoadOutcome, Result};
use fixture_loader::{DataFixturesLoader, FixturesType};
use rusqlite::Connection;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Output of a single load command run.
pub struct LoadRun {
    pub result: Result<LoadOutcome>,
    pub output: String,
}

impl LoadRun {
    pub fn lines(&self) -> Vec<&str> {
        self.output.lines().collect()
    }
}

/// An application root with the `Catalog` and `Shop` modules configured
/// and a database file next to it.
pub struct TestProject {
    pub dir: TempDir,
    pub db_path: PathBuf,
}

impl TestProject {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = dir.path().join("app.db");
        Self { dir, db_path }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    fn module_path(&self, module: &str) -> PathBuf {
        match module {
            APP => self.root().to_path_buf(),
            CATALOG => self.root().join(CATALOG_PATH),
            SHOP => self.root().join(SHOP_PATH),
            other => panic!("Unknown test module {}", other),
        }
    }

    /// Writes `file` below the fixtures directory of `module` for the given
    /// fixtures type.
    pub fn write(&self, module: &str, fixtures_type: FixturesType, file: &str, sql: &str) {
        let path = self
            .module_path(module)
            .join("fixtures")
            .join(fixtures_type.as_str())
            .join(file);
        fs::create_dir_all(path.parent().unwrap()).expect("Failed to create fixtures dir");
        fs::write(&path, sql).expect("Failed to write fixture");
    }

    pub fn write_main(&self, module: &str, file: &str, sql: &str) {
        self.write(module, FixturesType::Main, file, sql);
    }

    pub fn config(&self) -> AppConfig {
        let cli = CliConfig {
            database: Some(self.db_path.clone()),
            root_dir: Some(self.root().to_path_buf()),
            table: None,
        };
        let file_config = FileConfig {
            modules: vec![
                ModuleConfig {
                    name: CATALOG.to_string(),
                    path: CATALOG_PATH.to_string(),
                },
                ModuleConfig {
                    name: SHOP.to_string(),
                    path: SHOP_PATH.to_string(),
                },
            ],
            ..Default::default()
        };
        AppConfig::resolve(&cli, Some(file_config)).expect("Failed to resolve test config")
    }

    pub fn load(&self, options: &LoadOptions) -> LoadRun {
        self.load_with(options, DataFixturesLoader::new())
    }

    pub fn load_with(&self, options: &LoadOptions, loader: DataFixturesLoader) -> LoadRun {
        let mut command = LoadCommand::new(self.config());
        let mut conn = command.open_connection().expect("Failed to open database");
        let mut output = Vec::new();
        let result = command.run_with_loader(&mut conn, options, loader, &mut output);
        LoadRun {
            result,
            output: String::from_utf8(output).expect("Output is not UTF-8"),
        }
    }

    pub fn connection(&self) -> Connection {
        Connection::open(&self.db_path).expect("Failed to open database")
    }

    pub fn ledger_entries(&self) -> Vec<LedgerEntry> {
        let conn = self.connection();
        FixtureLedger::new(LEDGER_TABLE)
            .unwrap()
            .entries(&conn)
            .expect("Failed to read ledger")
    }

    pub fn ledger_names(&self) -> Vec<String> {
        self.ledger_entries()
            .into_iter()
            .map(|e| e.class_name)
            .collect()
    }

    pub fn count(&self, table: &str) -> i64 {
        self.connection()
            .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
                row.get(0)
            })
            .expect("Failed to count rows")
    }

    pub fn table_exists(&self, table: &str) -> bool {
        self.connection()
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
                [table],
                |row| row.get::<_, i64>(0),
            )
            .map(|n| n > 0)
            .unwrap_or(false)
    }
}
