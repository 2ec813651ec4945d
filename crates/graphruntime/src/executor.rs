use crate::registry::ExecutorRegistry;
use chrono::Utc;
use graphcore::{
    EdgeKind, EngineError, EventBus, Execution, ExecutionContext, ExecutionEvent, Map, Node,
    NodeError, NodeExecutionResult, NodeInputs, Workflow,
};
use std::time::Instant;

/// Drives one run through a workflow graph.
///
/// Traversal is sequential and depth-first: triggers in declaration order,
/// successors in edge-list order. A node that already has a result in the
/// execution is never invoked again, so converging paths and cycles each
/// enter a node at most once.
pub struct WorkflowExecutor<'a> {
    registry: &'a ExecutorRegistry,
    events: &'a EventBus,
}

enum Outcome {
    Success,
    Failure,
}

impl<'a> WorkflowExecutor<'a> {
    pub fn new(registry: &'a ExecutorRegistry, events: &'a EventBus) -> Self {
        Self { registry, events }
    }

    /// Visit every node reachable from the workflow's triggers.
    ///
    /// Node failures are recorded and routed along error edges; only
    /// structural problems, cancellation and missing executors come back as `Err`.
    pub async fn run(
        &self,
        workflow: &Workflow,
        execution: &mut Execution,
        ctx: &mut ExecutionContext,
    ) -> Result<(), EngineError> {
        let triggers: Vec<&Node> = workflow.trigger_nodes().collect();
        if triggers.is_empty() {
            return Err(EngineError::NoTriggerNode);
        }

        for trigger in triggers {
            let mut stack = vec![trigger];

            while let Some(node) = stack.pop() {
                if ctx.cancellation.is_cancelled() {
                    return Err(EngineError::Cancelled);
                }
                if execution.results.contains_key(&node.id) {
                    tracing::debug!("Node {} already executed, skipping", node.id);
                    continue;
                }

                let kind = match self.execute_node(node, execution, ctx).await? {
                    Outcome::Success => EdgeKind::Default,
                    Outcome::Failure => EdgeKind::Error,
                };

                // reversed so the first edge is visited first
                let next: Vec<&Node> = workflow.successors(&node.id, kind).collect();
                stack.extend(next.into_iter().rev());
            }
        }

        Ok(())
    }

    async fn execute_node(
        &self,
        node: &Node,
        execution: &mut Execution,
        ctx: &mut ExecutionContext,
    ) -> Result<Outcome, EngineError> {
        let executor = self.registry.get(node.node_type)?;
        let execution_id = execution.id.clone();

        let sequence = execution.results.len();
        execution
            .results
            .insert(node.id.clone(), NodeExecutionResult::started(&node.id, sequence));

        tracing::info!(
            "Executing node {} ({}) of type {}",
            node.id,
            node.label(),
            node.node_type
        );
        self.events.emit(ExecutionEvent::NodeStarted {
            execution_id: execution_id.clone(),
            node_id: node.id.clone(),
            node_type: node.node_type,
            timestamp: Utc::now(),
        });

        let start = Instant::now();
        let outcome = match resolve_inputs(node, ctx) {
            Ok(inputs) => executor.execute(node, &inputs, ctx).await,
            Err(e) => Err(e),
        };
        let elapsed = start.elapsed();

        let result = match execution.results.get_mut(&node.id) {
            Some(result) => result,
            None => return Err(EngineError::ExecutionLost(execution_id)),
        };

        match outcome {
            Ok(output) => {
                for spec in &node.data.outputs {
                    if let Some(value) = output.get(&spec.id) {
                        ctx.publish(&node.id, &spec.id, value.clone());
                    }
                }
                result.succeed(output, elapsed.as_secs_f64());

                tracing::info!("Node {} completed in {}ms", node.id, elapsed.as_millis());
                self.events.emit(ExecutionEvent::NodeCompleted {
                    execution_id,
                    node_id: node.id.clone(),
                    duration_ms: elapsed.as_millis() as u64,
                    timestamp: Utc::now(),
                });
                Ok(Outcome::Success)
            }
            Err(e) => {
                let message = e.to_string();
                tracing::error!("Error executing node {}: {}", node.id, message);

                result.fail(message.clone(), elapsed.as_secs_f64());
                ctx.record_error(&node.id, message.clone());

                self.events.emit(ExecutionEvent::NodeFailed {
                    execution_id,
                    node_id: node.id.clone(),
                    error: message,
                    timestamp: Utc::now(),
                });
                Ok(Outcome::Failure)
            }
        }
    }
}

/// Resolve a node's declared inputs.
///
/// Precedence: run input, then node config, then the declared default. A
/// required input with none of these is an input-validation error.
pub fn resolve_inputs(node: &Node, ctx: &ExecutionContext) -> Result<NodeInputs, NodeError> {
    let mut inputs = Map::new();

    for spec in &node.data.inputs {
        let value = ctx
            .input
            .get(&spec.id)
            .or_else(|| node.data.config.get(&spec.id))
            .or(spec.default.as_ref());

        match value {
            Some(value) => {
                inputs.insert(spec.id.clone(), value.clone());
            }
            None if spec.required => {
                return Err(NodeError::missing_input(format!(
                    "Required input {} not provided for node {}",
                    spec.id, node.id
                )));
            }
            None => {}
        }
    }

    Ok(NodeInputs::from(inputs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphcore::{InputSpec, NodeType};
    use serde_json::json;

    fn ctx_with(input: serde_json::Value) -> ExecutionContext {
        let input = match input {
            serde_json::Value::Object(map) => map,
            _ => Map::new(),
        };
        ExecutionContext::new("exec_test", input)
    }

    #[test]
    fn run_input_beats_config_beats_default() {
        let node = Node::new("n", NodeType::Action)
            .with_config("a", "from-config")
            .with_config("b", "from-config")
            .with_input(InputSpec::required("a"))
            .with_input(InputSpec::required("b").with_default("from-default"))
            .with_input(InputSpec::optional("c").with_default("from-default"));

        let inputs = resolve_inputs(&node, &ctx_with(json!({"a": "from-input"}))).unwrap();

        assert_eq!(inputs.get("a"), Some(&json!("from-input")));
        assert_eq!(inputs.get("b"), Some(&json!("from-config")));
        assert_eq!(inputs.get("c"), Some(&json!("from-default")));
    }

    #[test]
    fn missing_required_input_is_validation_error() {
        let node = Node::new("n", NodeType::Action).with_input(InputSpec::required("url"));
        let err = resolve_inputs(&node, &ctx_with(json!({}))).unwrap_err();

        assert_eq!(err.kind(), graphcore::ErrorKind::InputValidation);
        assert_eq!(err.to_string(), "Required input url not provided for node n");
    }

    #[test]
    fn optional_inputs_without_value_are_omitted() {
        let node = Node::new("n", NodeType::Action).with_input(InputSpec::optional("headers"));
        let inputs = resolve_inputs(&node, &ctx_with(json!({}))).unwrap();
        assert!(inputs.as_map().is_empty());
    }
}
