use async_trait::async_trait;
use chrono::Utc;
use graphcore::kinds::TriggerKind;
use graphcore::{ExecutionContext, Executor, Map, Node, NodeError, NodeInputs, NodeType, Value};

/// Entry point of a workflow; turns the run input into the trigger's payload.
pub struct TriggerExecutor;

impl TriggerExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TriggerExecutor {
    fn default() -> Self {
        Self::new()
    }
}

fn config_str<'a>(node: &'a Node, key: &str, default: &'a str) -> &'a str {
    node.config(key).and_then(Value::as_str).unwrap_or(default)
}

#[async_trait]
impl Executor for TriggerExecutor {
    fn node_type(&self) -> NodeType {
        NodeType::Trigger
    }

    async fn execute(
        &self,
        node: &Node,
        _inputs: &NodeInputs,
        ctx: &ExecutionContext,
    ) -> Result<Map, NodeError> {
        let mut output = Map::new();

        match TriggerKind::lenient(node) {
            TriggerKind::Manual => {
                output.insert("payload".into(), Value::Object(ctx.input.clone()));
            }
            TriggerKind::Webhook => {
                let field = |name: &str, default: Value| {
                    ctx.input
                        .get(name)
                        .filter(|v| !v.is_null())
                        .cloned()
                        .unwrap_or(default)
                };
                output.insert("payload".into(), field("payload", Value::Object(Map::new())));
                output.insert("headers".into(), field("headers", Value::Object(Map::new())));
                output.insert("method".into(), field("method", Value::from("POST")));
            }
            TriggerKind::Schedule => {
                output.insert("timestamp".into(), Value::from(Utc::now().to_rfc3339()));
                output.insert("schedule".into(), Value::from(config_str(node, "schedule", "")));
                output.insert("timezone".into(), Value::from(config_str(node, "timezone", "UTC")));
            }
        }

        tracing::debug!("Trigger {} fired", node.id);
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx(input: Value) -> ExecutionContext {
        let input = match input {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        ExecutionContext::new("exec_test", input)
    }

    #[tokio::test]
    async fn manual_passes_input_through() {
        let node = Node::new("t", NodeType::Trigger);
        let out = TriggerExecutor::new()
            .execute(&node, &NodeInputs::new(), &ctx(json!({"a": 1})))
            .await
            .unwrap();
        assert_eq!(out["payload"], json!({"a": 1}));
    }

    #[tokio::test]
    async fn unknown_kind_behaves_as_manual() {
        let node = Node::new("t", NodeType::Trigger).with_kind("telepathy");
        let out = TriggerExecutor::new()
            .execute(&node, &NodeInputs::new(), &ctx(json!({"a": 1})))
            .await
            .unwrap();
        assert_eq!(out["payload"], json!({"a": 1}));
    }

    #[tokio::test]
    async fn webhook_extracts_request_parts() {
        let node = Node::new("t", NodeType::Trigger).with_kind("webhook");
        let out = TriggerExecutor::new()
            .execute(
                &node,
                &NodeInputs::new(),
                &ctx(json!({"payload": {"id": 7}, "method": "PUT"})),
            )
            .await
            .unwrap();
        assert_eq!(out["payload"], json!({"id": 7}));
        assert_eq!(out["headers"], json!({}));
        assert_eq!(out["method"], json!("PUT"));
    }

    #[tokio::test]
    async fn schedule_reports_config() {
        let node = Node::new("t", NodeType::Trigger)
            .with_kind("schedule")
            .with_config("schedule", "0 * * * *");
        let out = TriggerExecutor::new()
            .execute(&node, &NodeInputs::new(), &ctx(json!({})))
            .await
            .unwrap();
        assert_eq!(out["schedule"], json!("0 * * * *"));
        assert_eq!(out["timezone"], json!("UTC"));
        let ts = out["timestamp"].as_str().unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(ts).is_ok());
    }
}
