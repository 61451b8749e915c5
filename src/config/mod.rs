mod file_config;

pub use file_config::{FileConfig, ModuleConfig};

use crate::fixture::FixturesType;
use crate::ledger::{validate_table_name, DEFAULT_TABLE};
use anyhow::{bail, Result};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Name of the implicit module rooted at the application directory.
pub const APP_MODULE: &str = "App";

pub const DEFAULT_PATH_MAIN: &str = "fixtures/main";
pub const DEFAULT_PATH_DEMO: &str = "fixtures/demo";

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub database: Option<PathBuf>,
    pub root_dir: Option<PathBuf>,
    pub table: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleSettings {
    pub name: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database: PathBuf,
    pub root_dir: PathBuf,
    pub table: String,
    pub path_main: String,
    pub path_demo: String,
    /// Configured modules, without the implicit application module.
    pub modules: Vec<ModuleSettings>,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let database = file
            .database
            .map(PathBuf::from)
            .or_else(|| cli.database.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("database must be specified via --database or in config file")
            })?;

        let root_dir = match file.root_dir.map(PathBuf::from).or_else(|| cli.root_dir.clone()) {
            Some(dir) => dir,
            None => std::env::current_dir()?,
        };
        if !root_dir.is_dir() {
            bail!("root_dir is not a directory: {:?}", root_dir);
        }

        let table = file
            .table
            .or_else(|| cli.table.clone())
            .unwrap_or_else(|| DEFAULT_TABLE.to_string());
        if validate_table_name(&table).is_err() {
            bail!("Invalid ledger table name: {:?}", table);
        }

        let path_main = file
            .path_main
            .unwrap_or_else(|| DEFAULT_PATH_MAIN.to_string());
        let path_demo = file
            .path_demo
            .unwrap_or_else(|| DEFAULT_PATH_DEMO.to_string());

        let mut seen = HashSet::new();
        let mut modules = Vec::with_capacity(file.modules.len());
        for module in file.modules {
            if module.name.trim().is_empty() {
                bail!("Module names must not be empty");
            }
            if module.name == APP_MODULE {
                bail!("Module name {:?} is reserved for the application root", APP_MODULE);
            }
            if module.name.contains(':') {
                bail!("Module name {:?} must not contain ':'", module.name);
            }
            if !seen.insert(module.name.clone()) {
                bail!("Module {:?} is configured more than once", module.name);
            }
            let path = PathBuf::from(&module.path);
            let path = if path.is_absolute() {
                path
            } else {
                root_dir.join(path)
            };
            modules.push(ModuleSettings {
                name: module.name,
                path,
            });
        }

        Ok(Self {
            database,
            root_dir,
            table,
            path_main,
            path_demo,
            modules,
        })
    }

    /// Configured modules followed by the application module.
    pub fn all_modules(&self) -> Vec<ModuleSettings> {
        let mut modules = self.modules.clone();
        modules.push(ModuleSettings {
            name: APP_MODULE.to_string(),
            path: self.root_dir.clone(),
        });
        modules
    }

    /// Fixture directory below a module for the given fixtures type.
    pub fn fixture_relative_path(&self, fixtures_type: FixturesType) -> PathBuf {
        let configured = match fixtures_type {
            FixturesType::Main => &self.path_main,
            FixturesType::Demo => &self.path_demo,
        };
        configured
            .split('/')
            .filter(|part| !part.is_empty())
            .collect()
    }

    pub fn fixtures_dir(&self, module_path: &Path, fixtures_type: FixturesType) -> PathBuf {
        module_path.join(self.fixture_relative_path(fixtures_type))
    }
}
