use thiserror::Error;

use crate::static_eval::CannotEvaluate;

/// Why a single module could not be analyzed.
///
/// These are recorded per module; analysis of sibling modules continues.
#[derive(Debug, Error)]
pub enum AnalyzeError {
    #[error("failed to parse `{id}`: {message}")]
    Parse { id: String, message: String },

    #[error("dependencies of `{id}` are not literal")]
    CannotEvaluate {
        id: String,
        #[source]
        source: CannotEvaluate,
    },

    #[error("no resource loader registered for plugin `{plugin}` (needed by `{id}`)")]
    UnknownResourceLoader { id: String, plugin: String },

    #[error("failed to load resource `{id}`")]
    Resource {
        id: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to print `{id}`")]
    Print {
        id: String,
        #[source]
        source: anyhow::Error,
    },
}

impl AnalyzeError {
    /// Identifier of the module the error belongs to
    pub fn id(&self) -> &str {
        match self {
            Self::Parse { id, .. }
            | Self::CannotEvaluate { id, .. }
            | Self::UnknownResourceLoader { id, .. }
            | Self::Resource { id, .. }
            | Self::Print { id, .. } => id,
        }
    }
}
