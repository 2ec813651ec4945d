use crate::workflow::NodeType;
use thiserror::Error;

/// Failure of a single node. Contained at the node and routed along error edges.
#[derive(Error, Debug, Clone)]
pub enum NodeError {
    #[error("{0}")]
    MissingInput(String),

    #[error("Invalid input type for '{field}': expected {expected}, got {actual}")]
    InvalidInputType {
        field: String,
        expected: String,
        actual: String,
    },

    #[error("Unsupported {category} type: {kind}")]
    Unsupported { category: NodeType, kind: String },

    #[error("{0}")]
    Collaborator(String),

    #[error("Executor initialization failed: {0}")]
    Initialization(String),

    #[error("Cancelled")]
    Cancelled,
}

/// Broad classes of node failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InputValidation,
    Configuration,
    Collaborator,
    Cancellation,
}

impl NodeError {
    pub fn missing_input(message: impl Into<String>) -> Self {
        NodeError::MissingInput(message.into())
    }

    pub fn collaborator(message: impl Into<String>) -> Self {
        NodeError::Collaborator(message.into())
    }

    pub fn invalid_type(
        field: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        NodeError::InvalidInputType {
            field: field.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            NodeError::MissingInput(_) | NodeError::InvalidInputType { .. } => {
                ErrorKind::InputValidation
            }
            NodeError::Unsupported { .. } | NodeError::Initialization(_) => {
                ErrorKind::Configuration
            }
            NodeError::Collaborator(_) => ErrorKind::Collaborator,
            NodeError::Cancelled => ErrorKind::Cancellation,
        }
    }
}

/// Run-level and lifecycle failures of the engine.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("No executor found for node type: {0}")]
    NoExecutor(NodeType),

    #[error("Executor registry is not initialized")]
    RegistryNotInitialized,

    #[error("Failed to initialize {node_type} executor: {source}")]
    Initialization {
        node_type: NodeType,
        #[source]
        source: NodeError,
    },

    #[error("Workflow must have at least one trigger node")]
    NoTriggerNode,

    #[error("Execution was cancelled")]
    Cancelled,

    #[error("Engine is shutting down")]
    ShuttingDown,

    #[error("Execution {0} ended without a record")]
    ExecutionLost(String),

    #[error("Executor shutdown reported {} error(s)", .0.len())]
    Shutdown(Vec<(NodeType, NodeError)>),
}
