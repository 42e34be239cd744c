//! Dependency analysis
//!
//! Each module is read, parsed, macro-resolved and rewritten at most once per
//! analyzer; the resulting [`ModuleRecord`] is cached and shared. Deep
//! analysis walks the cached dependency lists to produce a module's full
//! transitive closure.

use std::{fmt, rc::Rc};

use log::{debug, trace, warn};
use rustc_hash::FxHashSet;
use swc_core::{
    common::{SourceMap, sync::Lrc},
    ecma::visit::VisitMutWith,
};

use crate::{
    error::AnalyzeError,
    macros::{self, MacroRegistry},
    module_id::{BUILTIN_MODULES, ParsedId, is_builtin},
    module_registry::{DependencySet, ModuleRecord, ModuleRegistry},
    resolver::ModuleResolver,
    resource_loader::ResourceLoaders,
    source_reader::{FsSourceReader, SourceReader},
    syntax::{parse_script, print_script},
    visitors::{DefineCall, DefineRewriter, RequireCallCollector},
};

/// An identifier as a JavaScript string literal
fn quote(id: &str) -> String {
    serde_json::Value::from(id).to_string()
}

pub struct DependencyAnalyzer {
    resolver: ModuleResolver,
    macros: MacroRegistry,
    resources: ResourceLoaders,
    reader: Box<dyn SourceReader>,
    cm: Lrc<SourceMap>,
    registry: ModuleRegistry,
}

impl fmt::Debug for DependencyAnalyzer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DependencyAnalyzer")
            .field("resolver", &self.resolver)
            .field("macros", &self.macros)
            .field("resources", &self.resources)
            .field("records", &self.registry.len())
            .finish_non_exhaustive()
    }
}

impl DependencyAnalyzer {
    /// An analyzer reading sources from the filesystem
    pub fn new(resolver: ModuleResolver, macros: MacroRegistry, resources: ResourceLoaders) -> Self {
        Self {
            resolver,
            macros,
            resources,
            reader: Box::new(FsSourceReader),
            cm: Lrc::default(),
            registry: ModuleRegistry::new(),
        }
    }

    /// Replace the source reader
    pub fn with_reader(mut self, reader: impl SourceReader + 'static) -> Self {
        self.reader = Box::new(reader);
        self
    }

    /// Dependencies of `id`, minus `exclude`d ids and packages.
    ///
    /// `visited` is shared by a whole traversal: an id already in it yields
    /// `None`, as does an id that cannot be analyzed. When `deep`, the
    /// transitive dependencies that are not already direct dependencies are
    /// appended.
    pub fn analyze(
        &mut self,
        id: &str,
        deep: bool,
        visited: &mut FxHashSet<String>,
        exclude: &[String],
    ) -> Option<Vec<String>> {
        if !visited.insert(id.to_owned()) {
            return None;
        }

        let record = self.load_record(id)?;
        let mut result: Vec<String> = record
            .dependencies
            .iter()
            .filter(|dep| !self.is_excluded(dep, exclude))
            .cloned()
            .collect();

        if deep {
            let mut seen: FxHashSet<String> = result.iter().cloned().collect();
            seen.insert(id.to_owned());

            let mut transitive = Vec::new();
            for dep in &result {
                if is_builtin(dep) {
                    continue;
                }
                let Some(dep_deps) = self.analyze(dep, true, visited, exclude) else {
                    continue;
                };
                for dep_dep in dep_deps {
                    if seen.insert(dep_dep.clone()) {
                        transitive.push(dep_dep);
                    }
                }
            }
            result.extend(transitive);
        }

        trace!("`{id}` has {} dependencies (deep: {deep})", result.len());
        Some(result)
    }

    /// Full dependency closure of an entry module with the loader built-ins
    /// removed; `None` when the entry itself cannot be analyzed
    pub fn analyze_entry(&mut self, id: &str, exclude: &[String]) -> Option<Vec<String>> {
        let mut visited = FxHashSet::default();
        let deps = self.analyze(id, true, &mut visited, exclude)?;
        Some(deps.into_iter().filter(|dep| !is_builtin(dep)).collect())
    }

    fn is_excluded(&self, id: &str, exclude: &[String]) -> bool {
        if exclude.is_empty() {
            return false;
        }
        exclude.iter().any(|excluded| excluded == id)
            || self
                .resolver
                .package_of(id)
                .is_some_and(|package| exclude.contains(&package.name))
    }

    /// The cached record of `id`, building it on first use
    fn load_record(&mut self, id: &str) -> Option<Rc<ModuleRecord>> {
        if let Some(record) = self.registry.get(id) {
            return Some(Rc::clone(record));
        }
        if self.registry.is_unavailable(id) {
            return None;
        }

        match self.build_record(id) {
            Ok(Some(record)) => {
                debug!("Analyzed `{id}`");
                Some(self.registry.insert(record))
            }
            Ok(None) => None,
            Err(err) => {
                warn!("{err}");
                self.registry.record_failure(err);
                None
            }
        }
    }

    fn build_record(&mut self, id: &str) -> Result<Option<ModuleRecord>, AnalyzeError> {
        if let Some(package) = self.resolver.package_named(id) {
            return Ok(Some(ModuleRecord::package_alias(id, package.main_id())));
        }

        if let Some(ParsedId {
            module,
            resource: Some(resource),
        }) = ParsedId::parse(id)
        {
            return self.build_resource(id, module, resource);
        }

        self.build_source(id)
    }

    /// Leaf record wrapping a transformed resource in its own registration
    fn build_resource(
        &mut self,
        id: &str,
        plugin: &str,
        resource: &str,
    ) -> Result<Option<ModuleRecord>, AnalyzeError> {
        let Some(loader) = self.resources.get(plugin) else {
            return Err(AnalyzeError::UnknownResourceLoader {
                id: id.to_owned(),
                plugin: plugin.to_owned(),
            });
        };

        let path = self.resolver.resource_path(resource);
        let Some(content) = self.reader.read(&path) else {
            warn!("Resource `{id}` not found at {}", path.display());
            self.registry.mark_missing(id, path);
            return Ok(None);
        };

        let expression = loader
            .transform(plugin, resource, &content)
            .map_err(|source| AnalyzeError::Resource {
                id: id.to_owned(),
                source,
            })?;
        let code = format!(
            "define({}, [], function () {{ return {expression}; }});\n",
            quote(resource)
        );
        Ok(Some(ModuleRecord::resource(id, resource, code)))
    }

    fn build_source(&mut self, id: &str) -> Result<Option<ModuleRecord>, AnalyzeError> {
        let path = self.resolver.module_path(id);
        let Some(source) = self.reader.read(&path) else {
            warn!("Source of `{id}` not found at {}", path.display());
            self.registry.mark_missing(id, path);
            return Ok(None);
        };

        let mut script = parse_script(&self.cm, id, &source).map_err(|err| AnalyzeError::Parse {
            id: id.to_owned(),
            message: err.to_string(),
        })?;
        macros::apply(&self.macros, &mut script);

        let define = DefineCall::find(&script).map_err(|source| AnalyzeError::CannotEvaluate {
            id: id.to_owned(),
            source,
        })?;
        let print_error = |source| AnalyzeError::Print {
            id: id.to_owned(),
            source,
        };

        let Some(define) = define else {
            warn!("`{id}` has no define call; it is emitted as is, without dependencies");
            let code = print_script(&self.cm, &script, false).map_err(print_error)?;
            return Ok(Some(ModuleRecord::source(
                id,
                DependencySet::default(),
                script,
                None,
                code,
            )));
        };
        if let Some(declared) = define.declared_id.as_deref().filter(|declared| *declared != id) {
            debug!("`{id}` declares itself as `{declared}`; registering it as `{id}`");
        }

        let (deps, require_name) = self.collect_dependencies(id, &define);
        let mut rewriter = DefineRewriter::new(id, deps.literal(), require_name.as_deref());
        script.visit_mut_with(&mut rewriter);

        let mut code = print_script(&self.cm, &script, false).map_err(print_error)?;
        if let Some(shim) = self.package_shim(id) {
            code.insert_str(0, &shim);
        }

        Ok(Some(ModuleRecord::source(
            id,
            deps,
            script,
            Some(define.factory),
            code,
        )))
    }

    /// Declared (or inferred) dependencies plus the dynamic `require` calls
    /// on the parameter bound to `require`, which is also returned
    fn collect_dependencies(&self, id: &str, define: &DefineCall) -> (DependencySet, Option<String>) {
        let params = define.factory_params();
        let declared = define.dependencies.clone().unwrap_or_else(|| {
            BUILTIN_MODULES
                .iter()
                .take(params.len())
                .map(|&dep| dep.to_owned())
                .collect()
        });

        let mut deps = DependencySet::default();
        for dep in &declared {
            deps.push_declared(dep.clone(), self.resolver.normalize(dep, id));
        }

        let require_name = declared
            .iter()
            .zip(&params)
            .find(|(dep, _)| *dep == "require")
            .and_then(|(_, param)| param.clone());

        if let Some(name) = &require_name {
            for literal in RequireCallCollector::collect(&define.factory, name) {
                let normalized = self.resolver.normalize(&literal, id);
                deps.push_dynamic(literal, normalized);
            }
        }

        (deps, require_name)
    }

    /// Registration that lets a package's bare name resolve to its main
    /// module at runtime
    fn package_shim(&self, id: &str) -> Option<String> {
        let package = self.resolver.package_of(id)?;
        (package.main_id() == id).then(|| {
            format!(
                "define({}, [{}], function (main) {{ return main; }});\n",
                quote(&package.name),
                quote(id)
            )
        })
    }

    /// The cached record of `id`, if it has been analyzed
    pub fn record(&self, id: &str) -> Option<&Rc<ModuleRecord>> {
        self.registry.get(id)
    }

    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    pub fn resolver(&self) -> &ModuleResolver {
        &self.resolver
    }

    /// Forget every cached record and diagnostic
    pub fn clear(&mut self) {
        self.registry.clear();
    }
}
