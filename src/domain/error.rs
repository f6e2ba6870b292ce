//! Domain-level errors (no external dependencies)

use std::path::PathBuf;
use thiserror::Error;

/// Domain errors represent structural misconfiguration of the build tree.
/// None of them is transient; callers abort the configuration phase.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid output path {path}: {reason}")]
    InvalidPath { path: PathBuf, reason: String },

    #[error(
        "evaluation order '{dependent}' after '{required}' would create a cycle: {}",
        cycle.join(" -> ")
    )]
    CyclicDependency {
        dependent: String,
        required: String,
        /// Nodes of the cycle that the edge would close, in configuration order.
        cycle: Vec<String>,
    },

    #[error("unknown module: {0}")]
    UnknownNode(String),

    #[error("duplicate module: {0}")]
    DuplicateNode(String),

    #[error("invalid module name '{0}': must be a single path segment matching [A-Za-z0-9][A-Za-z0-9_.-]*")]
    InvalidModuleName(String),

    #[error("task already registered: {0}")]
    DuplicateTask(String),

    #[error("invalid plugin coordinate '{0}': expected group:artifact:version")]
    InvalidCoordinate(String),

    #[error("invalid repository '{0}'")]
    InvalidRepository(String),
}

impl DomainError {
    pub(crate) fn invalid_path(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
