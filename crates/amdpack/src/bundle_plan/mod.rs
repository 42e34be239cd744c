//! Bundle partition planning
//!
//! The plan decides which analyzed modules ship in the core bundle and which
//! stay with the on-demand part that needs them. Modules needed by every
//! high-weight part are promoted into the core so they load once.

pub mod builder;
pub mod set_ops;

#[cfg(test)]
mod tests;

pub use builder::{AnalyzedPart, BundlePlanner};
pub use set_ops::{intersect, subtract, union};

/// The core entry module
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MainEntry {
    pub id: String,
    /// Full dependency closure, built-ins removed
    pub dependencies: Vec<String>,
    /// Modules shipped in the core bundle besides the entry itself
    pub expect_dependencies: Vec<String>,
}

/// An on-demand part
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartEntry {
    pub id: String,
    pub weight: u32,
    pub dependencies: Vec<String>,
    /// Modules shipped with this part besides the part itself
    pub expect_dependencies: Vec<String>,
    pub exclude: Vec<String>,
    pub extra_includes: Vec<String>,
}

/// Membership of every bundle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundlePlan {
    pub main: MainEntry,
    pub parts: Vec<PartEntry>,
    /// Intersection of the high-weight parts' dependencies, `None` when no
    /// part reached the threshold
    pub core: Option<Vec<String>>,
}

impl BundlePlan {
    /// Every module of every bundle, in all-in-one emission order: the
    /// entry, the core, then each part followed by its own modules
    pub fn all_modules(&self) -> Vec<String> {
        let mut modules = union(std::slice::from_ref(&self.main.id), &self.main.expect_dependencies);
        for part in &self.parts {
            modules = union(&modules, std::slice::from_ref(&part.id));
            modules = union(&modules, &part.expect_dependencies);
        }
        modules
    }
}
