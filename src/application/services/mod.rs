//! Application services
//!
//! Concrete service implementations that orchestrate domain logic.
//! Services depend on the FileSystem boundary trait but are themselves
//! concrete structs, not traits.

mod clean;
mod layout;

pub use clean::{CleanReport, CleanService};
pub use layout::{BuildPlan, LayoutService};
