use async_trait::async_trait;
use graphcore::kinds::{ConditionKind, SubType};
use graphcore::value::{is_truthy, type_name};
use graphcore::{ExecutionContext, Executor, Map, Node, NodeError, NodeInputs, NodeType, Value};

/// Branch decisions. The outputs describe the decision; routing is left to
/// the workflow's edges.
pub struct ConditionExecutor;

impl ConditionExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ConditionExecutor {
    fn default() -> Self {
        Self::new()
    }
}

fn if_else(inputs: &NodeInputs) -> Result<Map, NodeError> {
    let result = is_truthy(inputs.require("condition", "Condition input is required")?);

    let mut output = Map::new();
    output.insert("result".into(), Value::Bool(result));
    output.insert("true".into(), Value::Bool(result));
    output.insert("false".into(), Value::Bool(!result));
    Ok(output)
}

/// First case whose `value` equals the input wins.
fn switch(inputs: &NodeInputs) -> Result<Map, NodeError> {
    let value = inputs.require("value", "Switch value is required")?;
    let cases = match inputs.value_or("cases", Value::Array(Vec::new())) {
        Value::Array(cases) => cases,
        other => return Err(NodeError::invalid_type("cases", "array", type_name(&other))),
    };

    let matched = cases
        .iter()
        .find(|case| case.get("value") == Some(value));

    let mut output = Map::new();
    output.insert("value".into(), value.clone());
    output.insert("matched".into(), Value::Bool(matched.is_some()));
    output.insert("default".into(), Value::Bool(matched.is_none()));
    if let Some(case) = matched {
        output.insert(
            "case".into(),
            case.get("id").cloned().unwrap_or(Value::Null),
        );
        output.insert(
            "output".into(),
            case.get("output").cloned().unwrap_or(Value::Null),
        );
    }
    Ok(output)
}

#[async_trait]
impl Executor for ConditionExecutor {
    fn node_type(&self) -> NodeType {
        NodeType::Condition
    }

    async fn execute(
        &self,
        node: &Node,
        inputs: &NodeInputs,
        _ctx: &ExecutionContext,
    ) -> Result<Map, NodeError> {
        match ConditionKind::of(node)? {
            ConditionKind::IfElse => if_else(inputs),
            ConditionKind::Switch => switch(inputs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn if_else_coerces_truthiness() {
        for (input, expected) in [
            (json!(true), true),
            (json!("yes"), true),
            (json!(1), true),
            (json!(false), false),
            (json!(0), false),
            (json!(""), false),
            (json!([]), false),
        ] {
            let out = if_else(&NodeInputs::new().with("condition", input)).unwrap();
            assert_eq!(out["result"], json!(expected));
            assert_eq!(out["true"], json!(expected));
            assert_eq!(out["false"], json!(!expected));
        }
    }

    #[test]
    fn if_else_requires_condition() {
        assert!(matches!(
            if_else(&NodeInputs::new()),
            Err(NodeError::MissingInput(_))
        ));
    }

    #[test]
    fn switch_first_match_wins() {
        let inputs = NodeInputs::new().with("value", "b").with(
            "cases",
            json!([
                {"id": "one", "value": "a", "output": 1},
                {"id": "two", "value": "b", "output": 2},
                {"id": "three", "value": "b", "output": 3}
            ]),
        );
        let out = switch(&inputs).unwrap();
        assert_eq!(out["matched"], json!(true));
        assert_eq!(out["default"], json!(false));
        assert_eq!(out["case"], json!("two"));
        assert_eq!(out["output"], json!(2));
    }

    #[test]
    fn switch_falls_to_default() {
        let inputs = NodeInputs::new().with("value", 42);
        let out = switch(&inputs).unwrap();
        assert_eq!(out["value"], json!(42));
        assert_eq!(out["matched"], json!(false));
        assert_eq!(out["default"], json!(true));
        assert!(out.get("case").is_none());
    }

    #[tokio::test]
    async fn dispatches_on_kind() {
        let node = Node::new("c", NodeType::Condition).with_kind("switch");
        let ctx = ExecutionContext::new("exec_test", Map::new());
        let out = ConditionExecutor::new()
            .execute(&node, &NodeInputs::new().with("value", 1), &ctx)
            .await
            .unwrap();
        assert_eq!(out["default"], json!(true));
    }
}
