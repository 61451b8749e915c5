//! Fixture discovery and ordering.

use crate::error::{FixtureError, Result};
use crate::fixture::{DataFixture, SqlFileFixture};
use crate::ledger::LoadedFixtures;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

/// A fixture that still has to be applied.
pub struct PendingFixture {
    pub fixture: Box<dyn DataFixture>,
    /// Version recorded the last time this fixture was applied.
    pub loaded_version: Option<String>,
}

impl PendingFixture {
    pub fn name(&self) -> &str {
        self.fixture.name()
    }

    pub fn version(&self) -> Option<&str> {
        self.fixture.version()
    }
}

impl std::fmt::Debug for PendingFixture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingFixture")
            .field("name", &self.name())
            .field("version", &self.version())
            .field("loaded_version", &self.loaded_version)
            .finish()
    }
}

/// Collects fixtures from module directories and code, then orders them.
#[derive(Default)]
pub struct DataFixturesLoader {
    fixtures: Vec<Box<dyn DataFixture>>,
    names: HashSet<String>,
    loaded_dirs: HashSet<PathBuf>,
}

impl DataFixturesLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds every `*.sql` file below `dir` as a fixture of `module`.
    ///
    /// A missing directory adds nothing. Returns how many new fixtures were
    /// added; already known identifiers and directories are skipped.
    pub fn load_from_directory(&mut self, module: &str, dir: &Path) -> Result<usize> {
        if !dir.is_dir() {
            debug!("No fixture directory at {:?}", dir);
            return Ok(0);
        }
        let canonical = dir.canonicalize().map_err(|e| FixtureError::io(dir, e))?;
        if !self.loaded_dirs.insert(canonical) {
            debug!("Fixture directory {:?} already loaded", dir);
            return Ok(0);
        }

        let mut added = 0;
        for entry in WalkDir::new(dir).follow_links(true).sort_by_file_name() {
            let entry = entry.map_err(|e| FixtureError::io(dir, e.into()))?;
            let path = entry.path();
            if !entry.file_type().is_file()
                || path.extension().and_then(|s| s.to_str()) != Some("sql")
            {
                continue;
            }
            let fixture = SqlFileFixture::from_file(module, dir, path)?;
            if self.add_fixture(Box::new(fixture)) {
                added += 1;
            }
        }
        info!("Found {} fixtures for {} in {:?}", added, module, dir);
        Ok(added)
    }

    /// Registers a fixture, returning false if one with the same identifier
    /// is already known.
    pub fn add_fixture(&mut self, fixture: Box<dyn DataFixture>) -> bool {
        if !self.names.insert(fixture.name().to_string()) {
            debug!("Skipping duplicate fixture {}", fixture.name());
            return false;
        }
        self.fixtures.push(fixture);
        true
    }

    pub fn len(&self) -> usize {
        self.fixtures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fixtures.is_empty()
    }

    /// All known fixtures, dependencies first.
    pub fn fixtures(&self) -> Result<Vec<&dyn DataFixture>> {
        let order = self.ordering(&LoadedFixtures::default())?;
        Ok(order.into_iter().map(|i| self.fixtures[i].as_ref()).collect())
    }

    /// Fixtures the ledger does not record as applied, dependencies first.
    ///
    /// A dependency that is no longer discovered but is recorded in the
    /// ledger counts as satisfied.
    pub fn into_pending(self, loaded: &LoadedFixtures) -> Result<Vec<PendingFixture>> {
        let order = self.ordering(loaded)?;
        let mut slots: Vec<Option<Box<dyn DataFixture>>> =
            self.fixtures.into_iter().map(Some).collect();

        let mut pending = Vec::new();
        for index in order {
            let Some(fixture) = slots[index].take() else {
                continue;
            };
            if loaded.is_applied(fixture.name(), fixture.version()) {
                debug!("Fixture {} already applied", fixture.name());
                continue;
            }
            let loaded_version = loaded.loaded_version(fixture.name()).map(str::to_string);
            pending.push(PendingFixture {
                fixture,
                loaded_version,
            });
        }
        Ok(pending)
    }

    /// Topological order of fixture indices. Among fixtures whose
    /// dependencies are met, the one discovered first comes first.
    fn ordering(&self, loaded: &LoadedFixtures) -> Result<Vec<usize>> {
        let index_by_name: HashMap<&str, usize> = self
            .fixtures
            .iter()
            .enumerate()
            .map(|(i, f)| (f.name(), i))
            .collect();

        let mut in_degree = vec![0usize; self.fixtures.len()];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); self.fixtures.len()];
        for (index, fixture) in self.fixtures.iter().enumerate() {
            for dependency in fixture.dependencies() {
                match index_by_name.get(dependency.as_str()) {
                    Some(&dep_index) => {
                        in_degree[index] += 1;
                        dependents[dep_index].push(index);
                    }
                    None if loaded.contains(dependency) => {}
                    None => {
                        return Err(FixtureError::MissingDependency {
                            fixture: fixture.name().to_string(),
                            dependency: dependency.clone(),
                        })
                    }
                }
            }
        }

        let mut ready: BTreeSet<usize> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, degree)| **degree == 0)
            .map(|(i, _)| i)
            .collect();
        let mut order = Vec::with_capacity(self.fixtures.len());
        while let Some(index) = ready.pop_first() {
            order.push(index);
            for &dependent in &dependents[index] {
                in_degree[dependent] -= 1;
                if in_degree[dependent] == 0 {
                    ready.insert(dependent);
                }
            }
        }

        if order.len() < self.fixtures.len() {
            // Unordered fixtures are either on a cycle or downstream of one
            let cycle = in_degree
                .iter()
                .enumerate()
                .filter(|(i, degree)| **degree > 0 && on_cycle(&dependents, *i))
                .map(|(i, _)| self.fixtures[i].name().to_string())
                .collect();
            return Err(FixtureError::CircularDependency(cycle));
        }
        Ok(order)
    }
}

/// Whether `start` can reach itself through its dependents.
fn on_cycle(dependents: &[Vec<usize>], start: usize) -> bool {
    let mut visited = HashSet::new();
    let mut stack: Vec<usize> = dependents[start].clone();
    while let Some(index) = stack.pop() {
        if index == start {
            return true;
        }
        if visited.insert(index) {
            stack.extend(dependents[index].iter().copied());
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::FixtureContext;
    use rusqlite::Transaction;
    use tempfile::TempDir;

    struct CodeFixture {
        name: String,
        version: Option<String>,
        dependencies: Vec<String>,
    }

    impl CodeFixture {
        fn boxed(name: &str, version: Option<&str>, dependencies: &[&str]) -> Box<dyn DataFixture> {
            Box::new(Self {
                name: name.to_string(),
                version: version.map(str::to_string),
                dependencies: dependencies.iter().map(|d| d.to_string()).collect(),
            })
        }
    }

    impl DataFixture for CodeFixture {
        fn name(&self) -> &str {
            &self.name
        }
        fn version(&self) -> Option<&str> {
            self.version.as_deref()
        }
        fn dependencies(&self) -> &[String] {
            &self.dependencies
        }
        fn load(&self, _tx: &Transaction, _ctx: &FixtureContext) -> Result<()> {
            Ok(())
        }
    }

    fn names(fixtures: &[&dyn DataFixture]) -> Vec<String> {
        fixtures.iter().map(|f| f.name().to_string()).collect()
    }

    #[test]
    fn test_dependencies_come_first() {
        let mut loader = DataFixturesLoader::new();
        loader.add_fixture(CodeFixture::boxed("App:orders", None, &["App:users", "App:products"]));
        loader.add_fixture(CodeFixture::boxed("App:users", None, &[]));
        loader.add_fixture(CodeFixture::boxed("App:products", None, &["App:users"]));
        loader.add_fixture(CodeFixture::boxed("App:settings", None, &[]));

        let ordered = loader.fixtures().unwrap();
        assert_eq!(
            names(&ordered),
            vec!["App:users", "App:products", "App:orders", "App:settings"]
        );
    }

    #[test]
    fn test_independent_fixtures_keep_discovery_order() {
        let mut loader = DataFixturesLoader::new();
        loader.add_fixture(CodeFixture::boxed("App:c", None, &[]));
        loader.add_fixture(CodeFixture::boxed("App:a", None, &[]));
        loader.add_fixture(CodeFixture::boxed("App:b", None, &[]));

        assert_eq!(names(&loader.fixtures().unwrap()), vec!["App:c", "App:a", "App:b"]);
    }

    #[test]
    fn test_duplicate_names_are_ignored() {
        let mut loader = DataFixturesLoader::new();
        assert!(loader.add_fixture(CodeFixture::boxed("App:a", None, &[])));
        assert!(!loader.add_fixture(CodeFixture::boxed("App:a", Some("2"), &[])));
        assert_eq!(loader.len(), 1);
        assert_eq!(loader.fixtures().unwrap()[0].version(), None);
    }

    #[test]
    fn test_missing_dependency_is_an_error() {
        let mut loader = DataFixturesLoader::new();
        loader.add_fixture(CodeFixture::boxed("App:orders", None, &["App:users"]));

        let err = loader.fixtures().err().unwrap();
        assert!(matches!(
            err,
            FixtureError::MissingDependency { ref fixture, ref dependency }
                if fixture == "App:orders" && dependency == "App:users"
        ));
    }

    #[test]
    fn test_dependency_satisfied_by_ledger() {
        let mut loader = DataFixturesLoader::new();
        loader.add_fixture(CodeFixture::boxed("App:orders", None, &["App:users"]));

        let loaded = LoadedFixtures::from_entries([("App:users", None)]);
        let pending = loader.into_pending(&loaded).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].name(), "App:orders");
    }

    #[test]
    fn test_cycle_is_an_error() {
        let mut loader = DataFixturesLoader::new();
        loader.add_fixture(CodeFixture::boxed("App:a", None, &["App:b"]));
        loader.add_fixture(CodeFixture::boxed("App:b", None, &["App:a"]));
        loader.add_fixture(CodeFixture::boxed("App:c", None, &[]));

        match loader.fixtures() {
            Err(FixtureError::CircularDependency(names)) => {
                assert_eq!(names, vec!["App:a".to_string(), "App:b".to_string()]);
            }
            other => panic!("expected a cycle, got {:?}", other.map(|f| names(&f))),
        }
    }

    #[test]
    fn test_cycle_error_names_only_cycle_members() {
        let mut loader = DataFixturesLoader::new();
        loader.add_fixture(CodeFixture::boxed("App:c", None, &["App:a"]));
        loader.add_fixture(CodeFixture::boxed("App:a", None, &["App:b"]));
        loader.add_fixture(CodeFixture::boxed("App:b", None, &["App:a"]));
        loader.add_fixture(CodeFixture::boxed("App:d", None, &["App:c"]));

        match loader.fixtures() {
            Err(FixtureError::CircularDependency(names)) => {
                assert_eq!(names, vec!["App:a".to_string(), "App:b".to_string()]);
            }
            other => panic!("expected a cycle, got {:?}", other.map(|f| names(&f))),
        }
    }

    #[test]
    fn test_into_pending_skips_applied() {
        let mut loader = DataFixturesLoader::new();
        loader.add_fixture(CodeFixture::boxed("App:plain", None, &[]));
        loader.add_fixture(CodeFixture::boxed("App:current", Some("1.0"), &[]));
        loader.add_fixture(CodeFixture::boxed("App:bumped", Some("2.0"), &[]));
        loader.add_fixture(CodeFixture::boxed("App:new", None, &[]));

        let loaded = LoadedFixtures::from_entries([
            ("App:plain", None),
            ("App:current", Some("1.0")),
            ("App:bumped", Some("1.0")),
        ]);
        let pending = loader.into_pending(&loaded).unwrap();
        let pending_names: Vec<&str> = pending.iter().map(|p| p.name()).collect();
        assert_eq!(pending_names, vec!["App:bumped", "App:new"]);
        assert_eq!(pending[0].loaded_version.as_deref(), Some("1.0"));
        assert_eq!(pending[1].loaded_version, None);
    }

    #[test]
    fn test_load_from_directory() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("fixtures/main");
        std::fs::create_dir_all(dir.join("nested")).unwrap();
        std::fs::write(dir.join("b.sql"), "-- depends: nested/a\nSELECT 1;").unwrap();
        std::fs::write(dir.join("nested/a.sql"), "SELECT 1;").unwrap();
        std::fs::write(dir.join("README.md"), "not a fixture").unwrap();

        let mut loader = DataFixturesLoader::new();
        assert_eq!(loader.load_from_directory("Shop", &dir).unwrap(), 2);
        // Loading the same directory again adds nothing
        assert_eq!(loader.load_from_directory("Shop", &dir).unwrap(), 0);

        let ordered = loader.fixtures().unwrap();
        assert_eq!(names(&ordered), vec!["Shop:nested/a", "Shop:b"]);
    }

    #[test]
    fn test_load_from_missing_directory_is_noop() {
        let temp_dir = TempDir::new().unwrap();
        let mut loader = DataFixturesLoader::new();
        let added = loader
            .load_from_directory("App", &temp_dir.path().join("nope"))
            .unwrap();
        assert_eq!(added, 0);
        assert!(loader.is_empty());
    }

    #[test]
    fn test_load_from_directory_reports_bad_fixture() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("empty.sql"), "-- nothing here\n").unwrap();

        let mut loader = DataFixturesLoader::new();
        let result = loader.load_from_directory("App", temp_dir.path());
        assert!(matches!(result, Err(FixtureError::InvalidFixture { .. })));
    }
}
