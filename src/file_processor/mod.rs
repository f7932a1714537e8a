//! File discovery and the per-notebook formatting pipeline.

mod discovery;
mod processing;

pub use discovery::*;
pub use processing::*;
