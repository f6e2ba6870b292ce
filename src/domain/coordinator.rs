//! Build layout coordinator.
//!
//! Runs once per invocation, in a fixed sequence:
//! relocate output directories → enforce evaluation order → register clean.

use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument};

use crate::domain::error::DomainError;
use crate::domain::tree::{BuildTree, CleanTask};
use crate::util::path::normalize_lexically;

/// Owns a [`BuildTree`] for the duration of the configuration phase.
#[derive(Debug)]
pub struct BuildLayoutCoordinator {
    tree: BuildTree,
}

impl BuildLayoutCoordinator {
    pub fn new(tree: BuildTree) -> Self {
        Self { tree }
    }

    pub fn tree(&self) -> &BuildTree {
        &self.tree
    }

    /// Hand the configured tree off, read-only.
    pub fn finish(self) -> BuildTree {
        self.tree
    }

    /// Move the root output directory to `root default / relative_offset` and
    /// give every child its own `<new root>/<child name>` directory.
    ///
    /// Always resolves from the root's default output directory, so repeating
    /// the call with the same offset gives the same result.
    #[instrument(level = "debug", skip(self), fields(offset = %relative_offset.display()))]
    pub fn relocate_output_directory(&mut self, relative_offset: &Path) -> Result<PathBuf, DomainError> {
        if relative_offset.as_os_str().is_empty() {
            return Err(DomainError::invalid_path(relative_offset, "offset is empty"));
        }
        if relative_offset.has_root() || relative_offset.is_absolute() {
            return Err(DomainError::invalid_path(
                relative_offset,
                "offset must be relative to the root output directory",
            ));
        }

        let base = self.tree.root().default_output_dir();
        if !base.is_absolute() {
            return Err(DomainError::invalid_path(
                base,
                "root output directory must be absolute",
            ));
        }

        let joined = base.join(relative_offset);
        let new_root = normalize_lexically(&joined)
            .ok_or_else(|| DomainError::invalid_path(&joined, "offset climbs above the filesystem root"))?;
        if new_root.parent().is_none() {
            return Err(DomainError::invalid_path(
                &joined,
                "offset resolves to the filesystem root",
            ));
        }

        self.tree.root_mut().set_declared_output_dir(new_root.clone());
        for child in self.tree.children_mut() {
            let dir = new_root.join(child.name());
            debug!("{} -> {}", child.name(), dir.display());
            child.set_declared_output_dir(dir);
        }
        info!("relocated build output to {}", new_root.display());
        Ok(new_root)
    }

    /// Require `required` to be fully configured before `dependent` starts.
    ///
    /// Rejects edges that would close a cycle, directly or transitively,
    /// leaving the tree unchanged.
    #[instrument(level = "debug", skip(self))]
    pub fn enforce_evaluation_order(&mut self, dependent: &str, required: &str) -> Result<(), DomainError> {
        let added = self.tree.graph_mut().add_edge(dependent, required)?;
        if added {
            self.tree
                .node_mut(dependent)
                .ok_or_else(|| DomainError::UnknownNode(dependent.to_string()))?
                .add_evaluation_dependency(required);
        }
        Ok(())
    }

    /// Every child other than `primary` waits for `primary`.
    #[instrument(level = "debug", skip(self))]
    pub fn enforce_primary_first(&mut self, primary: &str) -> Result<(), DomainError> {
        if self.tree.node(primary).is_none() {
            return Err(DomainError::UnknownNode(primary.to_string()));
        }
        let dependents: Vec<String> = self
            .tree
            .children()
            .iter()
            .map(|c| c.name().to_string())
            .filter(|name| name != primary)
            .collect();
        for dependent in dependents {
            self.enforce_evaluation_order(&dependent, primary)?;
        }
        Ok(())
    }

    /// Register a task deleting the root's declared output directory.
    #[instrument(level = "debug", skip(self))]
    pub fn register_clean_task(&mut self, name: &str) -> Result<&CleanTask, DomainError> {
        let task = CleanTask {
            name: name.to_string(),
            target: self.tree.root().declared_output_dir().to_path_buf(),
        };
        self.tree.insert_task(task)?;
        self.tree
            .clean_task(name)
            .ok_or_else(|| DomainError::UnknownNode(name.to_string()))
    }
}
