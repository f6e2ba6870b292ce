//! Build tree: modules, their output directories and evaluation dependencies.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::domain::error::DomainError;
use crate::domain::graph::{EvaluationEdge, EvaluationGraph};

static MODULE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.\-]*$").expect("static regex"));

/// Check that `name` can be used as a single output path segment.
pub fn validate_module_name(name: &str) -> Result<(), DomainError> {
    if MODULE_NAME.is_match(name) && name != "." && name != ".." {
        Ok(())
    } else {
        Err(DomainError::InvalidModuleName(name.to_string()))
    }
}

/// One independently buildable module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectNode {
    name: String,
    default_output_dir: PathBuf,
    declared_output_dir: PathBuf,
    evaluation_dependencies: BTreeSet<String>,
}

impl ProjectNode {
    /// Create a node whose declared output dir starts at the module-local default.
    pub fn new(name: impl Into<String>, default_output_dir: impl Into<PathBuf>) -> Self {
        let default_output_dir = default_output_dir.into();
        Self {
            name: name.into(),
            declared_output_dir: default_output_dir.clone(),
            default_output_dir,
            evaluation_dependencies: BTreeSet::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn default_output_dir(&self) -> &Path {
        &self.default_output_dir
    }

    pub fn declared_output_dir(&self) -> &Path {
        &self.declared_output_dir
    }

    /// Modules that must be fully configured before this one.
    pub fn evaluation_dependencies(&self) -> &BTreeSet<String> {
        &self.evaluation_dependencies
    }

    pub(crate) fn set_declared_output_dir(&mut self, dir: PathBuf) {
        self.declared_output_dir = dir;
    }

    pub(crate) fn add_evaluation_dependency(&mut self, required: &str) {
        self.evaluation_dependencies.insert(required.to_string());
    }
}

impl fmt::Display for ProjectNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.name, self.declared_output_dir.display())
    }
}

/// Named action that recursively deletes `target`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanTask {
    pub name: String,
    pub target: PathBuf,
}

/// The set of modules for one build invocation.
///
/// The node set is fixed at construction. Mutation is crate-private and
/// happens only through [`crate::domain::BuildLayoutCoordinator`]; the
/// finished tree is read-only.
#[derive(Debug, Clone)]
pub struct BuildTree {
    root: ProjectNode,
    children: Vec<ProjectNode>,
    graph: EvaluationGraph,
    tasks: BTreeMap<String, CleanTask>,
}

impl BuildTree {
    /// Child names become output path segments and must pass
    /// [`validate_module_name`]. The root only needs a non-empty unique name,
    /// since its output directory is the relocated root itself.
    pub fn new(root: ProjectNode, children: Vec<ProjectNode>) -> Result<Self, DomainError> {
        if root.name().trim().is_empty() {
            return Err(DomainError::InvalidModuleName(root.name().to_string()));
        }
        let mut graph = EvaluationGraph::new();
        graph.add_node(root.name())?;
        for child in &children {
            validate_module_name(child.name())?;
            graph.add_node(child.name())?;
        }
        Ok(Self {
            root,
            children,
            graph,
            tasks: BTreeMap::new(),
        })
    }

    pub fn root(&self) -> &ProjectNode {
        &self.root
    }

    pub fn children(&self) -> &[ProjectNode] {
        &self.children
    }

    /// Root first, then children in declaration order.
    pub fn nodes(&self) -> impl Iterator<Item = &ProjectNode> {
        std::iter::once(&self.root).chain(self.children.iter())
    }

    pub fn node(&self, name: &str) -> Option<&ProjectNode> {
        self.nodes().find(|n| n.name() == name)
    }

    /// Root plus children.
    pub fn module_count(&self) -> usize {
        1 + self.children.len()
    }

    pub fn evaluation_edges(&self) -> Vec<EvaluationEdge> {
        self.graph.edges()
    }

    pub fn configuration_order(&self) -> Vec<String> {
        self.graph.order()
    }

    pub fn configuration_waves(&self) -> Vec<Vec<String>> {
        self.graph.waves()
    }

    pub fn may_configure_concurrently(&self, a: &str, b: &str) -> Result<bool, DomainError> {
        self.graph.may_configure_concurrently(a, b)
    }

    pub fn clean_task(&self, name: &str) -> Option<&CleanTask> {
        self.tasks.get(name)
    }

    pub(crate) fn root_mut(&mut self) -> &mut ProjectNode {
        &mut self.root
    }

    pub(crate) fn children_mut(&mut self) -> &mut [ProjectNode] {
        &mut self.children
    }

    pub(crate) fn node_mut(&mut self, name: &str) -> Option<&mut ProjectNode> {
        if self.root.name() == name {
            return Some(&mut self.root);
        }
        self.children.iter_mut().find(|n| n.name() == name)
    }

    pub(crate) fn graph_mut(&mut self) -> &mut EvaluationGraph {
        &mut self.graph
    }

    pub(crate) fn insert_task(&mut self, task: CleanTask) -> Result<(), DomainError> {
        if self.tasks.contains_key(&task.name) {
            return Err(DomainError::DuplicateTask(task.name));
        }
        self.tasks.insert(task.name.clone(), task);
        Ok(())
    }
}
