//! AMD module bundler
//!
//! Analyses the dependency closure of an entry module and a set of weighted
//! parts, partitions the modules into a shared core bundle and on-demand
//! part bundles, and emits them together with a small lazy loader.

pub mod analyzer;
pub mod bundle_plan;
pub mod bundler;
pub mod config;
pub mod emit;
pub mod error;
pub mod graph;
pub mod macros;
pub mod module_id;
pub mod module_registry;
pub mod resolver;
pub mod resource_loader;
pub mod runtime;
pub mod source_reader;
pub mod static_eval;
pub mod syntax;
pub mod visitors;
