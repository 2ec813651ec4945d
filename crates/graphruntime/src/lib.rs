//! Workflow execution runtime
//!
//! This crate provides the engine that runs workflows in the background,
//! the executor registry, and the depth-first graph traversal.

mod executor;
mod registry;
mod runtime;

pub use executor::{resolve_inputs, WorkflowExecutor};
pub use registry::ExecutorRegistry;
pub use runtime::{EngineConfig, WorkflowEngine};
