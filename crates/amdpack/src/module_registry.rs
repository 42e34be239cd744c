//! Module record cache
//!
//! The registry is the single source of truth for what has been analyzed:
//! one immutable [`ModuleRecord`] per normalized identifier, plus the ids
//! that failed or whose source was missing.

use std::rc::Rc;

use indexmap::IndexMap;
use rustc_hash::{FxHashSet, FxHasher};
use swc_core::ecma::ast::{Expr, Script};

use crate::error::AnalyzeError;

/// Type alias for FxHasher-based IndexMap
pub type FxIndexMap<K, V> = IndexMap<K, V, std::hash::BuildHasherDefault<FxHasher>>;

/// Dependency lists of a module under construction
#[derive(Debug, Clone, Default)]
pub struct DependencySet {
    /// Ids as written in the source, in declaration order
    literal: Vec<String>,
    /// Normalized ids, deduplicated
    real: Vec<String>,
    index: FxHashSet<String>,
}

impl DependencySet {
    /// Add a declared dependency; the literal list keeps duplicates
    pub fn push_declared(&mut self, literal: String, normalized: String) {
        self.literal.push(literal);
        self.push_real(normalized);
    }

    /// Add a dynamically required dependency; the literal is kept only once
    pub fn push_dynamic(&mut self, literal: String, normalized: String) {
        if !self.literal.contains(&literal) {
            self.literal.push(literal);
        }
        self.push_real(normalized);
    }

    fn push_real(&mut self, normalized: String) {
        if self.index.insert(normalized.clone()) {
            self.real.push(normalized);
        }
    }

    pub fn literal(&self) -> &[String] {
        &self.literal
    }
}

/// Everything known about one analyzed module
#[derive(Debug, Clone)]
pub struct ModuleRecord {
    /// Normalized identifier, including any resource suffix
    pub id: String,
    /// The resource part of a `plugin!resource` id
    pub resource_id: Option<String>,
    /// Dependencies as written, in declaration order
    pub literal_dependencies: Vec<String>,
    /// Normalized dependencies, deduplicated
    pub dependencies: Vec<String>,
    pub dependencies_index: FxHashSet<String>,
    /// The macro-resolved tree; absent for synthetic records
    pub tree: Option<Script>,
    /// Factory of the `define` call; absent for synthetic records
    pub factory: Option<Box<Expr>>,
    /// Emitted code for this module
    pub built_code: String,
}

impl ModuleRecord {
    /// Record standing for a bare package name: one dependency on the
    /// package's main module and no code of its own
    pub fn package_alias(id: &str, main_id: String) -> Self {
        Self {
            id: id.to_owned(),
            resource_id: None,
            literal_dependencies: vec![main_id.clone()],
            dependencies_index: std::iter::once(main_id.clone()).collect(),
            dependencies: vec![main_id],
            tree: None,
            factory: None,
            built_code: String::new(),
        }
    }

    /// Leaf record for a `plugin!resource` id
    pub fn resource(id: &str, resource_id: &str, built_code: String) -> Self {
        Self {
            id: id.to_owned(),
            resource_id: Some(resource_id.to_owned()),
            literal_dependencies: Vec::new(),
            dependencies: Vec::new(),
            dependencies_index: FxHashSet::default(),
            tree: None,
            factory: None,
            built_code,
        }
    }

    /// Record for a parsed source module
    pub fn source(
        id: &str,
        deps: DependencySet,
        tree: Script,
        factory: Option<Box<Expr>>,
        built_code: String,
    ) -> Self {
        Self {
            id: id.to_owned(),
            resource_id: None,
            literal_dependencies: deps.literal,
            dependencies: deps.real,
            dependencies_index: deps.index,
            tree: Some(tree),
            factory,
            built_code,
        }
    }

    pub fn depends_on(&self, id: &str) -> bool {
        self.dependencies_index.contains(id)
    }
}

/// Cache of analyzed modules and per-module diagnostics
#[derive(Debug, Default)]
pub struct ModuleRegistry {
    records: FxIndexMap<String, Rc<ModuleRecord>>,
    failures: FxIndexMap<String, AnalyzeError>,
    missing: FxIndexMap<String, std::path::PathBuf>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<&Rc<ModuleRecord>> {
        self.records.get(id)
    }

    /// Store a record, returning the shared handle
    pub fn insert(&mut self, record: ModuleRecord) -> Rc<ModuleRecord> {
        let record = Rc::new(record);
        self.records.insert(record.id.clone(), Rc::clone(&record));
        record
    }

    pub fn record_failure(&mut self, error: AnalyzeError) {
        self.failures.insert(error.id().to_owned(), error);
    }

    pub fn mark_missing(&mut self, id: &str, path: std::path::PathBuf) {
        self.missing.insert(id.to_owned(), path);
    }

    /// Whether an earlier attempt at `id` failed or found no source
    pub fn is_unavailable(&self, id: &str) -> bool {
        self.failures.contains_key(id) || self.missing.contains_key(id)
    }

    pub fn records(&self) -> impl Iterator<Item = &Rc<ModuleRecord>> {
        self.records.values()
    }

    pub fn failures(&self) -> impl Iterator<Item = &AnalyzeError> {
        self.failures.values()
    }

    /// Ids whose source file was not found, with the path that was tried
    pub fn missing(&self) -> impl Iterator<Item = (&str, &std::path::Path)> {
        self.missing
            .iter()
            .map(|(id, path)| (id.as_str(), path.as_path()))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Drop every record and diagnostic
    pub fn clear(&mut self) {
        self.records.clear();
        self.failures.clear();
        self.missing.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dependency_set_dedup_rules() {
        let mut deps = DependencySet::default();
        deps.push_declared("./a".to_owned(), "x/a".to_owned());
        deps.push_declared("./a".to_owned(), "x/a".to_owned());
        deps.push_dynamic("./b".to_owned(), "x/b".to_owned());
        deps.push_dynamic("./b".to_owned(), "x/b".to_owned());

        assert_eq!(deps.literal(), ["./a", "./a", "./b"]);
        assert_eq!(deps.real, vec!["x/a", "x/b"]);
    }

    #[test]
    fn test_insert_shares_record() {
        let mut registry = ModuleRegistry::new();
        let record = registry.insert(ModuleRecord::package_alias("pkg", "pkg/main".to_owned()));
        let cached = registry.get("pkg").expect("cached");

        assert!(Rc::ptr_eq(&record, cached));
        assert!(record.depends_on("pkg/main"));
        assert!(record.built_code.is_empty());
    }

    #[test]
    fn test_failures_and_missing_mark_unavailable() {
        let mut registry = ModuleRegistry::new();
        registry.record_failure(AnalyzeError::Parse {
            id: "bad".to_owned(),
            message: "line 1".to_owned(),
        });
        registry.mark_missing("gone", "/src/gone.js".into());

        assert!(registry.is_unavailable("bad"));
        assert!(registry.is_unavailable("gone"));
        assert!(!registry.is_unavailable("fine"));

        registry.clear();
        assert!(!registry.is_unavailable("bad"));
        assert_eq!(registry.failures().count(), 0);
    }
}
