//! Bundle artifact generation
//!
//! Turns a [`BundlePlan`] into file contents: dependency listings, the
//! on-demand bundles and the all-in-one bundle. Every bundle is written
//! twice, as readable source and compressed.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use cow_utils::CowUtils;
use log::{debug, warn};

use crate::{
    bundle_plan::BundlePlan, module_registry::ModuleRegistry, runtime::LOADER_BOOTSTRAP,
    syntax::Compressor,
};

/// A file to write, relative to the output directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub path: PathBuf,
    pub contents: String,
}

impl Artifact {
    fn new(path: impl Into<PathBuf>, contents: String) -> Self {
        Self {
            path: path.into(),
            contents,
        }
    }
}

/// File stem of a bundle: the id without its first segment, when it has
/// more than one
pub fn bundle_stem(id: &str) -> &str {
    id.split_once('/').map_or(id, |(_, rest)| rest)
}

/// Name of the dependency listing of `id`
fn listing_name(id: &str) -> String {
    format!("analyses/{}.dependencies", id.cow_replace('/', "."))
}

pub struct BundleEmitter<'a> {
    registry: &'a ModuleRegistry,
    compressor: &'a dyn Compressor,
    prelude: String,
    epilogue: String,
}

impl std::fmt::Debug for BundleEmitter<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BundleEmitter")
            .field("records", &self.registry.len())
            .field("prelude", &self.prelude.len())
            .field("epilogue", &self.epilogue.len())
            .finish_non_exhaustive()
    }
}

impl<'a> BundleEmitter<'a> {
    pub fn new(registry: &'a ModuleRegistry, compressor: &'a dyn Compressor) -> Self {
        Self {
            registry,
            compressor,
            prelude: String::new(),
            epilogue: String::new(),
        }
    }

    /// Text wrapped around the all-in-one bundle
    pub fn with_wrapper(mut self, prelude: String, epilogue: String) -> Self {
        self.prelude = prelude;
        self.epilogue = epilogue;
        self
    }

    /// `analyses/<id>.dependencies` and `.dependencies.expect` for the entry
    /// and every part
    pub fn analysis_listings(&self, plan: &BundlePlan) -> Vec<Artifact> {
        let mut artifacts = Vec::with_capacity(2 * (plan.parts.len() + 1));
        let entries = std::iter::once((
            &plan.main.id,
            &plan.main.dependencies,
            &plan.main.expect_dependencies,
        ))
        .chain(
            plan.parts
                .iter()
                .map(|part| (&part.id, &part.dependencies, &part.expect_dependencies)),
        );

        for (id, dependencies, expect) in entries {
            let name = listing_name(id);
            artifacts.push(Artifact::new(&name, dependencies.join("\n")));
            artifacts.push(Artifact::new(format!("{name}.expect"), expect.join("\n")));
        }
        artifacts
    }

    /// The core bundle (bootstrap, entry and promoted modules) and one bundle
    /// per part
    pub fn demand_bundles(&self, plan: &BundlePlan) -> Vec<Artifact> {
        let mut artifacts = Vec::new();

        let mut core = String::from(LOADER_BOOTSTRAP);
        self.append_modules(
            &mut core,
            std::iter::once(&plan.main.id).chain(&plan.main.expect_dependencies),
        );
        artifacts.extend(self.bundle_pair(bundle_stem(&plan.main.id), core));

        for part in &plan.parts {
            let mut code = String::new();
            self.append_modules(
                &mut code,
                std::iter::once(&part.id).chain(&part.expect_dependencies),
            );
            artifacts.extend(self.bundle_pair(bundle_stem(&part.id), code));
        }
        artifacts
    }

    /// Everything in one file, wrapped in the prelude and epilogue
    pub fn all_in_one(&self, plan: &BundlePlan) -> Vec<Artifact> {
        let modules = plan.all_modules();
        debug!("All-in-one bundle holds {} modules", modules.len());

        let mut code = self.prelude.clone();
        code.push_str(LOADER_BOOTSTRAP);
        self.append_modules(&mut code, &modules);
        code.push_str(&self.epilogue);

        let stem = format!("{}-all", bundle_stem(&plan.main.id));
        self.bundle_pair(&stem, code)
    }

    fn append_modules<'i>(&self, out: &mut String, ids: impl IntoIterator<Item = &'i String>) {
        for id in ids {
            let Some(record) = self.registry.get(id) else {
                debug!("Skipping `{id}`: no analyzed record");
                continue;
            };
            if record.built_code.is_empty() {
                continue;
            }
            if !out.is_empty() && !out.ends_with('\n') {
                out.push('\n');
            }
            out.push_str(&record.built_code);
        }
    }

    /// `<stem>.source.js` plus the compressed `<stem>.js`; a compressor
    /// failure only loses the latter
    fn bundle_pair(&self, stem: &str, source: String) -> Vec<Artifact> {
        let compressed = match self.compressor.compress(&source) {
            Ok(compressed) => Some(Artifact::new(format!("{stem}.js"), compressed)),
            Err(err) => {
                warn!("Failed to compress {stem}.js, only the source bundle is written: {err:#}");
                None
            }
        };
        std::iter::once(Artifact::new(format!("{stem}.source.js"), source))
            .chain(compressed)
            .collect()
    }
}

/// Write every artifact under `dist`, creating directories as needed
pub fn write_artifacts(dist: &Path, artifacts: &[Artifact]) -> Result<()> {
    for artifact in artifacts {
        let path = dist.join(&artifact.path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }
        fs::write(&path, &artifact.contents)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        debug!("Wrote {}", path.display());
    }
    Ok(())
}
