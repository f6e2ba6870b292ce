//! Error conversion helpers for filesystem operations

use std::io;
use std::path::Path;

use crate::application::{ApplicationError, ApplicationResult};
use crate::domain::DomainError;

/// Extension trait for converting `io::Result` to `ApplicationResult` with context.
pub trait IoResultExt<T> {
    /// Add path context to an I/O error.
    ///
    /// # Example
    /// ```ignore
    /// fs.canonicalize(project_dir)
    ///     .with_path_context("resolve project directory", project_dir)?;
    /// ```
    fn with_path_context(self, action: &str, path: &Path) -> ApplicationResult<T>;

    /// Report a failed write below an output directory as an invalid output path.
    fn or_invalid_path(self, path: &Path) -> ApplicationResult<T>;
}

impl<T> IoResultExt<T> for io::Result<T> {
    fn with_path_context(self, action: &str, path: &Path) -> ApplicationResult<T> {
        self.map_err(|e| ApplicationError::OperationFailed {
            context: format!("{}: {}", action, path.display()),
            source: Box::new(e),
        })
    }

    fn or_invalid_path(self, path: &Path) -> ApplicationResult<T> {
        self.map_err(|e| {
            ApplicationError::Domain(DomainError::InvalidPath {
                path: path.to_path_buf(),
                reason: format!("not writable: {e}"),
            })
        })
    }
}
