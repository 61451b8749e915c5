use super::{qualify_dependency, DataFixture, FixtureContext};
use crate::error::{FixtureError, Result};
use lazy_static::lazy_static;
use regex::Regex;
use rusqlite::Transaction;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

lazy_static! {
    static ref DIRECTIVE_RE: Regex =
        Regex::new(r"(?i)^--\s*(version|depends)\s*:\s*(.*?)\s*$").unwrap();
}

/// A fixture backed by a `.sql` file.
///
/// Leading comment lines may declare a version and dependencies:
///
/// ```sql
/// -- version: 1.2
/// -- depends: countries, App:currencies
/// INSERT INTO regions (code, country) VALUES ('BY', 'DE');
/// ```
#[derive(Debug, Clone)]
pub struct SqlFileFixture {
    name: String,
    path: Option<PathBuf>,
    version: Option<String>,
    dependencies: Vec<String>,
    sql: String,
}

impl SqlFileFixture {
    /// Reads the fixture at `path`, naming it after its location below
    /// `fixtures_dir`.
    pub fn from_file(module: &str, fixtures_dir: &Path, path: &Path) -> Result<Self> {
        let name = fixture_name(module, fixtures_dir, path)?;
        let contents = std::fs::read_to_string(path).map_err(|e| FixtureError::io(path, e))?;
        let mut fixture = Self::parse(name, &contents)?;
        fixture.path = Some(path.to_path_buf());
        Ok(fixture)
    }

    pub fn parse(name: String, contents: &str) -> Result<Self> {
        let mut version = None;
        let mut dependencies = Vec::new();
        let mut has_statements = false;

        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if !line.starts_with("--") {
                has_statements = true;
                break;
            }
            let Some(captures) = DIRECTIVE_RE.captures(line) else {
                continue;
            };
            let value = &captures[2];
            if captures[1].eq_ignore_ascii_case("version") {
                if value.is_empty() {
                    return Err(invalid(&name, "empty version directive"));
                }
                if version.is_some() {
                    return Err(invalid(&name, "version declared more than once"));
                }
                version = Some(value.to_string());
            } else {
                for dependency in value.split(',').map(str::trim).filter(|d| !d.is_empty()) {
                    let qualified = qualify_dependency(&name, dependency);
                    if qualified == name {
                        return Err(invalid(&name, "fixture depends on itself"));
                    }
                    if !dependencies.contains(&qualified) {
                        dependencies.push(qualified);
                    }
                }
            }
        }

        if !has_statements {
            return Err(invalid(&name, "no SQL statements"));
        }

        debug!(
            "Parsed fixture {} (version {:?}, {} dependencies)",
            name,
            version,
            dependencies.len()
        );
        Ok(Self {
            name,
            path: None,
            version,
            dependencies,
            sql: contents.to_string(),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

impl DataFixture for SqlFileFixture {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    fn load(&self, tx: &Transaction, _ctx: &FixtureContext) -> Result<()> {
        tx.execute_batch(&self.sql)?;
        Ok(())
    }
}

fn invalid(name: &str, reason: &str) -> FixtureError {
    FixtureError::InvalidFixture {
        name: name.to_string(),
        reason: reason.to_string(),
    }
}

/// `<module>:<relative path without extension>`, always with `/` separators.
fn fixture_name(module: &str, fixtures_dir: &Path, path: &Path) -> Result<String> {
    let relative = path.strip_prefix(fixtures_dir).map_err(|_| FixtureError::InvalidFixture {
        name: path.display().to_string(),
        reason: format!("not inside {}", fixtures_dir.display()),
    })?;
    let relative = relative.with_extension("");
    let parts: Vec<String> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().to_string()),
            _ => None,
        })
        .collect();
    if parts.is_empty() {
        return Err(invalid(&path.display().to_string(), "empty fixture name"));
    }
    Ok(format!("{}:{}", module, parts.join("/")))
}
