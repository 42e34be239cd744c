//! Computes a [`BundlePlan`] from analyzed entries

use log::debug;

use super::{BundlePlan, MainEntry, PartEntry, intersect, subtract, union};
use crate::config::DEFAULT_HIGH_WEIGHT;

/// A part whose dependency closure has been computed
#[derive(Debug, Clone, Default)]
pub struct AnalyzedPart {
    pub id: String,
    pub weight: u32,
    pub dependencies: Vec<String>,
    pub exclude: Vec<String>,
    pub extra_includes: Vec<String>,
}

/// Partitions modules between the core bundle and the parts
#[derive(Debug, Clone, Copy)]
pub struct BundlePlanner {
    high_weight: u32,
}

impl Default for BundlePlanner {
    fn default() -> Self {
        Self::new(DEFAULT_HIGH_WEIGHT)
    }
}

impl BundlePlanner {
    /// Parts weighing at least `high_weight` take part in the core
    /// intersection
    pub fn new(high_weight: u32) -> Self {
        Self { high_weight }
    }

    pub fn plan(
        &self,
        main_id: &str,
        main_dependencies: Vec<String>,
        parts: Vec<AnalyzedPart>,
    ) -> BundlePlan {
        let core = parts
            .iter()
            .filter(|part| part.weight >= self.high_weight)
            .map(|part| part.dependencies.clone())
            .reduce(|core, deps| intersect(&core, &deps));
        if let Some(core) = &core {
            debug!("Promoting {} shared modules into the core bundle", core.len());
        }

        let main_expect = union(&main_dependencies, core.as_deref().unwrap_or_default());

        let parts = parts
            .into_iter()
            .map(|part| {
                let mut expect = subtract(&part.dependencies, &main_expect);
                expect.extend(part.extra_includes.iter().cloned());
                PartEntry {
                    id: part.id,
                    weight: part.weight,
                    dependencies: part.dependencies,
                    expect_dependencies: expect,
                    exclude: part.exclude,
                    extra_includes: part.extra_includes,
                }
            })
            .collect();

        BundlePlan {
            main: MainEntry {
                id: main_id.to_owned(),
                dependencies: main_dependencies,
                expect_dependencies: main_expect,
            },
            parts,
            core,
        }
    }
}
