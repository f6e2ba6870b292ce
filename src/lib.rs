//! Build layout coordination for multi-module projects.
//!
//! Relocates the shared build-output directory, records cross-module
//! evaluation order as a cycle-checked DAG and registers an idempotent
//! clean action.

pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod exitcode;
pub mod infrastructure;
pub mod util;
