use crate::value::Map;
use crate::workflow::{NodeId, WorkflowId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

pub type ExecutionId = String;

/// Generate a fresh `exec_`-prefixed execution id.
pub fn new_execution_id() -> ExecutionId {
    format!("exec_{}", Uuid::new_v4().simple())
}

/// Lifecycle of one workflow run.
///
/// `Pending -> Running -> {Completed | Failed | Cancelled}`; a run cancelled
/// while still queued goes straight from `Pending` to `Cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl ExecutionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExecutionStatus::Completed | ExecutionStatus::Failed | ExecutionStatus::Cancelled
        )
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExecutionStatus::Pending => "pending",
            ExecutionStatus::Running => "running",
            ExecutionStatus::Completed => "completed",
            ExecutionStatus::Failed => "failed",
            ExecutionStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Record of one workflow run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Execution {
    pub id: ExecutionId,
    pub workflow_id: WorkflowId,
    pub status: ExecutionStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub input: Map,
    pub results: HashMap<NodeId, NodeExecutionResult>,
    pub error: Option<String>,
}

impl Execution {
    pub fn new(workflow_id: impl Into<String>, input: Map) -> Self {
        Self {
            id: new_execution_id(),
            workflow_id: workflow_id.into(),
            status: ExecutionStatus::Pending,
            started_at: Utc::now(),
            completed_at: None,
            input,
            results: HashMap::new(),
            error: None,
        }
    }

    pub fn mark_running(&mut self) {
        self.status = ExecutionStatus::Running;
    }

    /// Move to a terminal status. Calls after the first are ignored.
    pub fn finish(&mut self, status: ExecutionStatus, error: Option<String>) {
        if self.status.is_terminal() {
            return;
        }
        self.status = status;
        self.error = error;
        self.completed_at = Some(Utc::now());
    }

    pub fn result(&self, node_id: &str) -> Option<&NodeExecutionResult> {
        self.results.get(node_id)
    }

    /// Node results ordered by start time.
    pub fn ordered_results(&self) -> Vec<&NodeExecutionResult> {
        let mut results: Vec<_> = self.results.values().collect();
        results.sort_by_key(|r| r.sequence);
        results
    }
}

/// Status of a single node invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    Running,
    Success,
    Error,
}

/// Outcome of one node within a run. Transitions `Running -> Success | Error` once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeExecutionResult {
    pub node_id: NodeId,
    pub status: NodeStatus,
    pub output: Option<Map>,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_seconds: Option<f64>,
    /// Position of this node in the run's start order.
    pub sequence: usize,
}

impl NodeExecutionResult {
    pub fn started(node_id: impl Into<String>, sequence: usize) -> Self {
        Self {
            node_id: node_id.into(),
            status: NodeStatus::Running,
            output: None,
            error: None,
            started_at: Utc::now(),
            completed_at: None,
            duration_seconds: None,
            sequence,
        }
    }

    pub fn succeed(&mut self, output: Map, duration_seconds: f64) {
        if self.status != NodeStatus::Running {
            return;
        }
        self.status = NodeStatus::Success;
        self.output = Some(output);
        self.duration_seconds = Some(duration_seconds);
        self.completed_at = Some(Utc::now());
    }

    pub fn fail(&mut self, error: impl Into<String>, duration_seconds: f64) {
        if self.status != NodeStatus::Running {
            return;
        }
        self.status = NodeStatus::Error;
        self.error = Some(error.into());
        self.duration_seconds = Some(duration_seconds);
        self.completed_at = Some(Utc::now());
    }
}
