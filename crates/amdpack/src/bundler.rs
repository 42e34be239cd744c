//! Build orchestration: analyse, plan, emit

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, bail};
use log::{info, warn};
use rustc_hash::FxHashSet;

use crate::{
    analyzer::DependencyAnalyzer,
    bundle_plan::{AnalyzedPart, BundlePlan, BundlePlanner},
    config::Config,
    emit::{Artifact, BundleEmitter, write_artifacts},
    graph::DependencyGraph,
    macros::MacroRegistry,
    resolver::ModuleResolver,
    resource_loader::ResourceLoaders,
    source_reader::SourceReader,
    syntax::{Compressor, SwcCompressor},
};

/// What a build produces besides the dependency listings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BundleMode {
    /// Dependency listings only
    Analyse,
    /// Core bundle plus one bundle per part
    Demand,
    /// A single wrapped bundle holding everything
    All,
}

/// Outcome of a build
#[derive(Debug)]
pub struct BuildReport {
    pub plan: BundlePlan,
    /// Paths written, relative to the output directory
    pub written: Vec<PathBuf>,
    /// `id: reason` for every module that failed analysis
    pub failures: Vec<String>,
    /// Modules whose source file was not found
    pub missing: Vec<MissingModule>,
    /// Groups of modules that require each other synchronously
    pub cycles: Vec<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingModule {
    pub id: String,
    pub path: PathBuf,
    /// Analyzed modules depending on it
    pub required_by: Vec<String>,
}

impl BuildReport {
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}

pub struct Bundler {
    config: Config,
    analyzer: DependencyAnalyzer,
    compressor: Box<dyn Compressor>,
}

impl std::fmt::Debug for Bundler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bundler")
            .field("config", &self.config)
            .field("analyzer", &self.analyzer)
            .finish_non_exhaustive()
    }
}

impl Bundler {
    pub fn new(config: Config) -> Self {
        let analyzer = DependencyAnalyzer::new(
            ModuleResolver::new(&config.loader),
            MacroRegistry::from_config(&config.macros),
            ResourceLoaders::from_config(&config.resources),
        );
        Self {
            config,
            analyzer,
            compressor: Box::new(SwcCompressor),
        }
    }

    /// Replace the source reader of the analyzer
    pub fn with_reader(mut self, reader: impl SourceReader + 'static) -> Self {
        self.analyzer = self.analyzer.with_reader(reader);
        self
    }

    pub fn with_compressor(mut self, compressor: impl Compressor + 'static) -> Self {
        self.compressor = Box::new(compressor);
        self
    }

    pub fn analyzer(&self) -> &DependencyAnalyzer {
        &self.analyzer
    }

    /// Analyse the entry and every part, then partition them
    pub fn plan(&mut self) -> Result<BundlePlan> {
        let bundle = &self.config.bundle;
        if bundle.main.is_empty() {
            bail!("No entry module configured (`bundle.main`)");
        }

        let Some(main_dependencies) = self.analyzer.analyze_entry(&bundle.main, &[]) else {
            bail!("Entry module `{}` could not be analyzed", bundle.main);
        };
        info!(
            "`{}` depends on {} modules",
            bundle.main,
            main_dependencies.len()
        );

        let mut parts = Vec::with_capacity(bundle.parts.len());
        for part in &bundle.parts {
            let dependencies = self
                .analyzer
                .analyze_entry(&part.id, &part.exclude)
                .unwrap_or_else(|| {
                    warn!("Part `{}` could not be analyzed", part.id);
                    Vec::new()
                });
            // Extra includes ship without their dependencies, but their own
            // code still has to be loaded
            for extra in &part.extra_includes {
                if self.analyzer.analyze(extra, false, &mut FxHashSet::default(), &[]).is_none() {
                    warn!("Extra include `{extra}` of `{}` could not be analyzed", part.id);
                }
            }
            parts.push(AnalyzedPart {
                id: part.id.clone(),
                weight: part.weight,
                dependencies,
                exclude: part.exclude.clone(),
                extra_includes: part.extra_includes.clone(),
            });
        }

        Ok(BundlePlanner::new(bundle.high_weight).plan(&bundle.main, main_dependencies, parts))
    }

    /// Run a full build and write its artifacts under `dist`
    pub fn run(&mut self, mode: BundleMode, dist: &Path) -> Result<BuildReport> {
        let plan = self.plan()?;

        let (prelude, epilogue) = self.wrapper_text()?;
        let registry = self.analyzer.registry();
        let emitter = BundleEmitter::new(registry, self.compressor.as_ref())
            .with_wrapper(prelude, epilogue);

        let mut artifacts: Vec<Artifact> = emitter.analysis_listings(&plan);
        match mode {
            BundleMode::Analyse => {}
            BundleMode::Demand => artifacts.extend(emitter.demand_bundles(&plan)),
            BundleMode::All => artifacts.extend(emitter.all_in_one(&plan)),
        }
        write_artifacts(dist, &artifacts)?;
        info!("Wrote {} files to {}", artifacts.len(), dist.display());

        let graph = DependencyGraph::from_registry(registry);
        let missing: Vec<MissingModule> = registry
            .missing()
            .map(|(id, path)| MissingModule {
                id: id.to_owned(),
                path: path.to_path_buf(),
                required_by: graph.dependents(id).into_iter().map(str::to_owned).collect(),
            })
            .collect();
        for module in &missing {
            warn!(
                "Module `{}` not found at {} (required by {})",
                module.id,
                module.path.display(),
                module.required_by.join(", ")
            );
        }
        let cycles = graph.cycles();
        for cycle in &cycles {
            warn!(
                "Circular dependency between {}; one side receives partial exports",
                cycle.join(", ")
            );
        }

        Ok(BuildReport {
            plan,
            written: artifacts.into_iter().map(|artifact| artifact.path).collect(),
            failures: registry
                .failures()
                .map(|err| format!("{}: {err:#}", err.id()))
                .collect(),
            missing,
            cycles,
        })
    }

    /// Prelude and epilogue of the all-in-one bundle
    fn wrapper_text(&self) -> Result<(String, String)> {
        let read = |path: Option<&Path>| -> Result<String> {
            match path {
                Some(path) => fs::read_to_string(path)
                    .with_context(|| format!("Failed to read wrapper file {}", path.display())),
                None => Ok(String::new()),
            }
        };
        Ok((
            read(self.config.output.prelude.as_deref())?,
            read(self.config.output.epilogue.as_deref())?,
        ))
    }
}
