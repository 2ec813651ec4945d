use crate::error::NodeError;
use crate::events::{EventEmitter, ExecutionEvent};
use crate::execution::ExecutionId;
use crate::value::{type_name, Map, Value};
use crate::workflow::{Node, NodeId, NodeType};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

/// Behavior of one node category.
///
/// One instance serves every node of its type across all runs, so `execute`
/// takes `&self`; per-run state lives in the [`ExecutionContext`].
#[async_trait]
pub trait Executor: Send + Sync {
    /// Node category this executor handles
    fn node_type(&self) -> NodeType;

    /// Acquire owned resources. Called once before any execution.
    async fn initialize(&mut self) -> Result<(), NodeError> {
        Ok(())
    }

    /// Release owned resources. Must succeed even if `initialize` never ran.
    async fn shutdown(&mut self) -> Result<(), NodeError> {
        Ok(())
    }

    /// Run `node` with its resolved inputs and return its outputs.
    async fn execute(
        &self,
        node: &Node,
        inputs: &NodeInputs,
        ctx: &ExecutionContext,
    ) -> Result<Map, NodeError>;
}

/// Per-run state shared by every node invocation of one execution.
///
/// Owned by the task driving the run; executors only ever see it by shared
/// reference while the engine writes between node visits.
#[derive(Debug)]
pub struct ExecutionContext {
    pub execution_id: ExecutionId,
    /// Input payload the run was started with
    pub input: Map,
    /// Published node outputs keyed `"{node_id}.{output_id}"`
    pub results: Map,
    /// Error message per failed node
    pub errors: HashMap<NodeId, String>,
    pub cancellation: CancellationToken,
    events: broadcast::Sender<ExecutionEvent>,
}

impl ExecutionContext {
    pub fn new(execution_id: impl Into<String>, input: Map) -> Self {
        let (events, _) = broadcast::channel(1);
        Self {
            execution_id: execution_id.into(),
            input,
            results: Map::new(),
            errors: HashMap::new(),
            cancellation: CancellationToken::new(),
            events,
        }
    }

    pub fn with_events(mut self, events: broadcast::Sender<ExecutionEvent>) -> Self {
        self.events = events;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn emitter(&self, node_id: &str) -> EventEmitter {
        EventEmitter::new(
            self.execution_id.clone(),
            node_id.to_string(),
            self.events.clone(),
        )
    }

    pub fn publish(&mut self, node_id: &str, output_id: &str, value: Value) {
        self.results.insert(format!("{}.{}", node_id, output_id), value);
    }

    pub fn result(&self, node_id: &str, output_id: &str) -> Option<&Value> {
        self.results.get(&format!("{}.{}", node_id, output_id))
    }

    pub fn record_error(&mut self, node_id: &str, message: impl Into<String>) {
        self.errors.insert(node_id.to_string(), message.into());
    }
}

/// Resolved inputs for one node invocation
#[derive(Debug, Clone, Default)]
pub struct NodeInputs(Map);

impl NodeInputs {
    pub fn new() -> Self {
        Self(Map::new())
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.0.insert(name.into(), value);
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value.into());
        self
    }

    pub fn as_map(&self) -> &Map {
        &self.0
    }

    /// Value of `name`, treating JSON `null` as absent
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name).filter(|v| !v.is_null())
    }

    /// Required input; absent or `null` fails with `message`
    pub fn require(&self, name: &str, message: &str) -> Result<&Value, NodeError> {
        self.get(name).ok_or_else(|| NodeError::missing_input(message))
    }

    /// Required non-empty string input
    pub fn require_str(&self, name: &str, message: &str) -> Result<&str, NodeError> {
        match self.require(name, message)? {
            Value::String(s) if s.is_empty() => Err(NodeError::missing_input(message)),
            Value::String(s) => Ok(s),
            other => Err(NodeError::invalid_type(name, "string", type_name(other))),
        }
    }

    pub fn str_or<'a>(&'a self, name: &str, default: &'a str) -> &'a str {
        self.get(name).and_then(Value::as_str).unwrap_or(default)
    }

    /// Object input, or an empty object when absent
    pub fn object_or_empty(&self, name: &str) -> Result<Map, NodeError> {
        match self.get(name) {
            None => Ok(Map::new()),
            Some(Value::Object(map)) => Ok(map.clone()),
            Some(other) => Err(NodeError::invalid_type(name, "object", type_name(other))),
        }
    }

    pub fn value_or(&self, name: &str, default: Value) -> Value {
        self.get(name).cloned().unwrap_or(default)
    }
}

impl From<Map> for NodeInputs {
    fn from(map: Map) -> Self {
        Self(map)
    }
}
