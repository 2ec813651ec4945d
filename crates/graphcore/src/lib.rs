//! Core abstractions for the workflow engine
//!
//! This crate provides the workflow graph model, execution records, the
//! executor contract and the error taxonomy shared by every other crate.

mod error;
mod events;
mod execution;
mod executor;
pub mod kinds;
pub mod value;
mod workflow;

pub use error::{EngineError, ErrorKind, NodeError};
pub use events::{EventBus, EventEmitter, ExecutionEvent, NodeEvent};
pub use execution::{
    new_execution_id, Execution, ExecutionId, ExecutionStatus, NodeExecutionResult, NodeStatus,
};
pub use executor::{ExecutionContext, Executor, NodeInputs};
pub use value::{Map, Value};
pub use workflow::{
    Edge, EdgeKind, InputSpec, Node, NodeData, NodeId, NodeType, OutputSpec, Position, Workflow,
    WorkflowId,
};

/// Result type for engine-level operations
pub type Result<T> = std::result::Result<T, EngineError>;
