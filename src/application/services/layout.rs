//! Build layout service
//!
//! Assembles the build tree from settings, drives the coordinator through the
//! configuration phase and materializes output directories.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::application::{ApplicationResult, IoResultExt};
use crate::config::{ModuleDecl, Settings};
use crate::domain::{
    validate_module_name, BuildLayoutCoordinator, BuildScript, BuildTree, CleanTask, DomainError,
    ProjectNode,
};
use crate::infrastructure::traits::FileSystem;
use crate::util::path::normalize_lexically;

/// Output of one configuration phase.
#[derive(Debug, Clone)]
pub struct BuildPlan {
    /// Canonical project (root module) directory
    pub project_dir: PathBuf,
    /// Relocated output root
    pub output_root: PathBuf,
    /// Finished, read-only tree
    pub tree: BuildTree,
    pub buildscript: BuildScript,
    /// Name of the registered clean task
    pub clean_task: String,
}

impl BuildPlan {
    pub fn clean(&self) -> Option<&CleanTask> {
        self.tree.clean_task(&self.clean_task)
    }
}

/// Service computing the build layout for a project.
pub struct LayoutService {
    fs: Arc<dyn FileSystem>,
}

impl LayoutService {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self { fs }
    }

    /// Run the configuration phase: relocate → order → register clean.
    ///
    /// Any failure aborts the phase; no partial plan is returned.
    #[instrument(level = "debug", skip(self, settings))]
    pub fn configure(&self, project_dir: &Path, settings: &Settings) -> ApplicationResult<BuildPlan> {
        let project_dir = self
            .fs
            .canonicalize(project_dir)
            .with_path_context("resolve project directory", project_dir)?;

        let buildscript = BuildScript::parse(
            &settings.buildscript.repositories,
            &settings.buildscript.plugins,
            &settings.repositories,
        )?;

        let tree = self.load_tree(&project_dir, settings)?;
        let mut coordinator = BuildLayoutCoordinator::new(tree);

        let output_root = coordinator.relocate_output_directory(&settings.output_offset)?;

        for rule in &settings.ordering {
            coordinator.enforce_evaluation_order(&rule.dependent, &rule.required)?;
        }
        if settings.enforce_primary_first {
            coordinator.enforce_primary_first(&settings.primary_module)?;
        }

        coordinator.register_clean_task(&settings.clean_task)?;

        let tree = coordinator.finish();
        info!(
            "configured {} modules in {} waves",
            tree.module_count(),
            tree.configuration_waves().len()
        );

        Ok(BuildPlan {
            project_dir,
            output_root,
            tree,
            buildscript,
            clean_task: settings.clean_task.clone(),
        })
    }

    /// Build the module tree for `project_dir` (must be absolute).
    ///
    /// Declared modules take precedence; without declarations modules are
    /// discovered from marker files.
    #[instrument(level = "debug", skip(self, settings))]
    pub fn load_tree(&self, project_dir: &Path, settings: &Settings) -> ApplicationResult<BuildTree> {
        let root_name = match &settings.root_name {
            Some(name) => name.clone(),
            None => project_dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .ok_or_else(|| {
                    DomainError::invalid_path(project_dir, "project directory has no name")
                })?,
        };
        let root = ProjectNode::new(root_name, project_dir.join("build"));

        let modules = if settings.modules.is_empty() {
            self.discover_modules(project_dir, &settings.module_markers)?
        } else {
            settings.modules.clone()
        };

        let mut children = Vec::with_capacity(modules.len());
        for module in &modules {
            let joined = project_dir.join(module.dir()).join("build");
            let default_output = normalize_lexically(&joined)
                .ok_or_else(|| DomainError::invalid_path(&joined, "module path climbs above the filesystem root"))?;
            debug!("module {} default output {}", module.name, default_output.display());
            children.push(ProjectNode::new(module.name.clone(), default_output));
        }

        Ok(BuildTree::new(root, children)?)
    }

    /// Immediate subdirectories holding one of `markers`, sorted by name.
    pub fn discover_modules(&self, project_dir: &Path, markers: &[String]) -> ApplicationResult<Vec<ModuleDecl>> {
        let mut modules = Vec::new();
        let subdirs = self
            .fs
            .subdirs(project_dir)
            .with_path_context("scan project directory", project_dir)?;

        for dir in subdirs {
            let Some(name) = dir.file_name().map(|n| n.to_string_lossy().into_owned()) else {
                continue;
            };
            if name.starts_with('.') {
                continue;
            }
            if !markers.iter().any(|m| self.fs.exists(&dir.join(m))) {
                continue;
            }
            if let Err(e) = validate_module_name(&name) {
                warn!("skipping {}: {}", dir.display(), e);
                continue;
            }
            modules.push(ModuleDecl::new(name));
        }

        debug!("discovered {} modules", modules.len());
        Ok(modules)
    }

    /// Create every declared output directory.
    ///
    /// This is the first write below the relocated root, so unwritable or
    /// malformed locations surface here as invalid paths.
    #[instrument(level = "debug", skip(self, plan))]
    pub fn prepare_output_dirs(&self, plan: &BuildPlan) -> ApplicationResult<Vec<PathBuf>> {
        let mut created = Vec::new();
        for node in plan.tree.nodes() {
            let dir = node.declared_output_dir();
            self.fs.create_dir_all(dir).or_invalid_path(dir)?;
            created.push(dir.to_path_buf());
        }
        Ok(created)
    }
}
