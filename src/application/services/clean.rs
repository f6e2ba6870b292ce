//! Clean task execution
//!
//! Deletes a clean task's target directory. Idempotent: an absent target is
//! not an error. Never follows symlinks out of the target.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, instrument};

use crate::application::{ApplicationResult, IoResultExt};
use crate::domain::{CleanTask, DomainError};
use crate::infrastructure::traits::{DirUsage, FileSystem};
use crate::util::path::is_ancestor_or_self;

/// Outcome of running a clean task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanReport {
    pub task: String,
    pub target: PathBuf,
    /// False when the target did not exist (or on dry runs)
    pub removed: bool,
    pub dry_run: bool,
    /// Content found below the target before deletion
    pub usage: DirUsage,
}

pub struct CleanService {
    fs: Arc<dyn FileSystem>,
}

impl CleanService {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self { fs }
    }

    /// Run `task`, refusing targets that would take `project_dir` with them,
    /// including through symlinked parent directories.
    #[instrument(level = "debug", skip(self, task), fields(task = %task.name))]
    pub fn run(&self, task: &CleanTask, project_dir: &Path, dry_run: bool) -> ApplicationResult<CleanReport> {
        let target = &task.target;
        self.guard(target, project_dir)?;

        let mut report = CleanReport {
            task: task.name.clone(),
            target: target.clone(),
            removed: false,
            dry_run,
            usage: DirUsage::default(),
        };

        if self.fs.is_symlink(target) {
            debug!("target is a symlink, removing link only");
            if !dry_run {
                self.fs
                    .remove_file(target)
                    .with_path_context("remove symlink", target)?;
                report.removed = true;
            }
            return Ok(report);
        }

        if !self.fs.exists(target) {
            debug!("nothing to clean at {}", target.display());
            return Ok(report);
        }

        if self.fs.is_dir(target) {
            report.usage = self
                .fs
                .usage(target)
                .with_path_context("scan output directory", target)?;
        } else {
            report.usage.files = 1;
        }

        if dry_run {
            return Ok(report);
        }

        if self.fs.is_dir(target) {
            self.fs
                .remove_dir_all(target)
                .with_path_context("remove output directory", target)?;
        } else {
            self.fs
                .remove_file(target)
                .with_path_context("remove output file", target)?;
        }
        report.removed = true;
        info!(
            "cleaned {} ({} files, {} bytes)",
            target.display(),
            report.usage.files,
            report.usage.bytes
        );
        Ok(report)
    }

    fn guard(&self, target: &Path, project_dir: &Path) -> Result<(), DomainError> {
        if !target.is_absolute() {
            return Err(DomainError::invalid_path(target, "clean target must be absolute"));
        }
        if target.parent().is_none() {
            return Err(DomainError::invalid_path(
                target,
                "refusing to delete the filesystem root",
            ));
        }
        let resolved = self.resolve_parent(target);
        let project = self.fs.canonicalize(project_dir).unwrap_or_else(|_| project_dir.to_path_buf());
        if is_ancestor_or_self(target, project_dir) || is_ancestor_or_self(&resolved, &project) {
            return Err(DomainError::invalid_path(
                target,
                format!("refusing to delete a directory containing the project {}", project_dir.display()),
            ));
        }
        Ok(())
    }

    /// Resolve symlinks in the parent of `target`, keeping the last component.
    ///
    /// Canonicalizes the deepest existing ancestor and re-appends the rest. The
    /// final component stays unresolved since a symlinked target is only unlinked.
    fn resolve_parent(&self, target: &Path) -> PathBuf {
        let (Some(parent), Some(name)) = (target.parent(), target.file_name()) else {
            return target.to_path_buf();
        };
        for ancestor in parent.ancestors() {
            if let Ok(real) = self.fs.canonicalize(ancestor) {
                let rest = parent.strip_prefix(ancestor).unwrap_or(Path::new(""));
                return real.join(rest).join(name);
            }
        }
        target.to_path_buf()
    }
}
