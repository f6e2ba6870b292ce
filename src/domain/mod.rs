//! Domain layer: build tree, evaluation graph and the layout coordinator
//!
//! This layer is independent of external concerns (no I/O, no CLI, no config loading).

pub mod buildscript;
pub mod coordinator;
pub mod error;
pub mod graph;
pub mod tree;

pub use buildscript::{BuildScript, PluginDependency, Repository};
pub use coordinator::BuildLayoutCoordinator;
pub use error::DomainError;
pub use graph::{EvaluationEdge, EvaluationGraph};
pub use tree::{validate_module_name, BuildTree, CleanTask, ProjectNode};
