use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub database: Option<String>,
    pub root_dir: Option<String>,
    pub table: Option<String>,

    // Fixture directories, relative to each module's path
    pub path_main: Option<String>,
    pub path_demo: Option<String>,

    pub modules: Vec<ModuleConfig>,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct ModuleConfig {
    pub name: String,
    pub path: String,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let config: FileConfig = toml::from_str(
            r#"
            database = "/var/lib/app/app.db"
            table = "seed_ledger"
            path_main = "data/main"

            [[modules]]
            name = "Catalog"
            path = "modules/catalog"

            [[modules]]
            name = "Shop"
            path = "/opt/shop"
            "#,
        )
        .unwrap();

        assert_eq!(config.database.as_deref(), Some("/var/lib/app/app.db"));
        assert_eq!(config.table.as_deref(), Some("seed_ledger"));
        assert_eq!(config.path_main.as_deref(), Some("data/main"));
        assert_eq!(config.path_demo, None);
        assert_eq!(config.modules.len(), 2);
        assert_eq!(config.modules[1].name, "Shop");
    }

    #[test]
    fn test_empty_config_is_default() {
        let config: FileConfig = toml::from_str("").unwrap();
        assert!(config.database.is_none());
        assert!(config.modules.is_empty());
    }

    #[test]
    fn test_load_reports_missing_file() {
        let result = FileConfig::load(Path::new("/nonexistent/fixtures.toml"));
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Failed to read config file"));
    }
}
