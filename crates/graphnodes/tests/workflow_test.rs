// crates/graphnodes/tests/workflow_test.rs

use graphcore::{ExecutionStatus, InputSpec, Map, Node, NodeStatus, NodeType, Workflow};
use graphnodes::{registry_with_builtins, ExecutorSettings};
use graphruntime::{EngineConfig, WorkflowEngine};
use serde_json::{json, Value};
use std::path::Path;

async fn engine(storage: &Path) -> WorkflowEngine {
    let settings = ExecutorSettings {
        storage_path: storage.to_path_buf(),
        ..ExecutorSettings::default()
    };
    let engine = WorkflowEngine::new(registry_with_builtins(&settings), EngineConfig::default());
    engine.initialize().await.unwrap();
    engine
}

fn input(value: Value) -> Option<Map> {
    match value {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

#[tokio::test]
async fn test_builtins_cover_every_node_type() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(dir.path()).await;
    assert_eq!(engine.node_types().await, NodeType::ALL.to_vec());
}

#[tokio::test]
async fn test_if_else_routes_default_edge() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(dir.path()).await;

    let mut wf = Workflow::new("branching").with_name("Branching");
    wf.add_node(Node::new("start", NodeType::Trigger));
    wf.add_node(
        Node::new("check", NodeType::Condition)
            .with_kind("if_else")
            .with_input(InputSpec::required("condition")),
    );
    wf.add_node(
        Node::new("a", NodeType::Output)
            .with_kind("http_response")
            .with_config("body", "took the default edge"),
    );
    wf.add_node(
        Node::new("b", NodeType::Output)
            .with_kind("http_response")
            .with_config("body", "took the error edge"),
    );
    wf.connect("start", "check");
    wf.connect("check", "a");
    wf.connect_on_error("check", "b");

    // outputs read body from config, so declare it as an input
    for node in wf.nodes.iter_mut().filter(|n| n.node_type == NodeType::Output) {
        node.data.inputs.push(InputSpec::required("body"));
    }

    let execution = engine
        .run_to_completion(wf, input(json!({"condition": true})))
        .await
        .unwrap();

    assert_eq!(execution.status, ExecutionStatus::Completed);
    let check = execution.result("check").unwrap();
    assert_eq!(check.status, NodeStatus::Success);
    assert_eq!(
        Value::Object(check.output.clone().unwrap()),
        json!({"result": true, "true": true, "false": false})
    );
    assert_eq!(execution.result("a").unwrap().status, NodeStatus::Success);
    assert!(execution.result("b").is_none());
}

#[tokio::test]
async fn test_missing_condition_takes_error_edge() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(dir.path()).await;

    let mut wf = Workflow::new("branching");
    wf.add_node(Node::new("start", NodeType::Trigger));
    wf.add_node(Node::new("check", NodeType::Condition));
    wf.add_node(
        Node::new("fallback", NodeType::Output)
            .with_input(InputSpec::optional("body").with_default("no condition")),
    );
    wf.connect("start", "check");
    wf.connect_on_error("check", "fallback");

    let execution = engine.run_to_completion(wf, None).await.unwrap();

    assert_eq!(execution.status, ExecutionStatus::Completed);
    let check = execution.result("check").unwrap();
    assert_eq!(check.status, NodeStatus::Error);
    assert_eq!(check.error.as_deref(), Some("Condition input is required"));
    let fallback = execution.result("fallback").unwrap();
    assert_eq!(fallback.output.as_ref().unwrap()["body"], json!("no condition"));
}

#[tokio::test]
async fn test_transformations_in_a_workflow() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(dir.path()).await;

    let mut wf = Workflow::new("transforms");
    wf.add_node(Node::new("start", NodeType::Trigger));
    wf.add_node(
        Node::new("reshape", NodeType::Transformation)
            .with_kind("json_transform")
            .with_config("template", json!({"x": {"$select": "a.b"}}))
            .with_input(InputSpec::required("input"))
            .with_input(InputSpec::required("template")),
    );
    wf.add_node(
        Node::new("greet", NodeType::Transformation)
            .with_kind("text_template")
            .with_config("template", "Hello {{name}}! {{missing}}")
            .with_input(InputSpec::required("template"))
            .with_input(InputSpec::optional("variables")),
    );
    wf.connect("start", "reshape");
    wf.connect("reshape", "greet");

    let execution = engine
        .run_to_completion(
            wf,
            input(json!({"input": {"a": {"b": 5}}, "variables": {"name": "World"}})),
        )
        .await
        .unwrap();

    assert_eq!(execution.status, ExecutionStatus::Completed);
    let reshape = execution.result("reshape").unwrap().output.clone().unwrap();
    assert_eq!(reshape["output"], json!({"x": 5}));
    let greet = execution.result("greet").unwrap().output.clone().unwrap();
    assert_eq!(greet["output"], json!("Hello World! {{missing}}"));
}

#[tokio::test]
async fn test_file_round_trip_through_storage() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(dir.path()).await;

    let mut wf = Workflow::new("files");
    wf.add_node(Node::new("start", NodeType::Trigger));
    wf.add_node(
        Node::new("write", NodeType::Output)
            .with_kind("file_writer")
            .with_config("path", "report.txt")
            .with_config("content", "quarterly numbers")
            .with_input(InputSpec::required("path"))
            .with_input(InputSpec::required("content")),
    );
    wf.add_node(
        Node::new("read", NodeType::DataSource)
            .with_kind("file_reader")
            .with_config("path", "report.txt")
            .with_input(InputSpec::required("path"))
            .with_output("content"),
    );
    wf.connect("start", "write");
    wf.connect("write", "read");

    let execution = engine.run_to_completion(wf, None).await.unwrap();

    assert_eq!(execution.status, ExecutionStatus::Completed);
    let read = execution.result("read").unwrap().output.clone().unwrap();
    assert_eq!(read["content"], json!("quarterly numbers"));
    assert_eq!(read["size"], json!(17));
    assert!(dir.path().join("report.txt").exists());
}

#[tokio::test]
async fn test_unknown_subtype_fails_only_that_node() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(dir.path()).await;

    let mut wf = Workflow::new("unsupported");
    wf.add_node(Node::new("start", NodeType::Trigger).with_kind("carrier_pigeon"));
    wf.add_node(Node::new("act", NodeType::Action).with_kind("fax"));
    wf.connect("start", "act");

    let execution = engine.run_to_completion(wf, None).await.unwrap();

    assert_eq!(execution.status, ExecutionStatus::Completed);
    assert_eq!(execution.result("start").unwrap().status, NodeStatus::Success);
    let act = execution.result("act").unwrap();
    assert_eq!(act.status, NodeStatus::Error);
    assert_eq!(act.error.as_deref(), Some("Unsupported action type: fax"));
}

#[tokio::test]
async fn test_editor_json_workflow_runs() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(dir.path()).await;

    let wf: Workflow = serde_json::from_value(json!({
        "id": "editor",
        "name": "From the editor",
        "nodes": [
            {"id": "t", "type": "trigger", "position": {"x": 0, "y": 0},
             "data": {"label": "Start", "config": {"type": "manual"}}},
            {"id": "s", "type": "condition", "position": {"x": 200, "y": 0},
             "data": {
                "label": "Route",
                "inputs": [{"id": "value", "type": "string", "required": true},
                           {"id": "cases", "type": "array"}],
                "outputs": [{"id": "matched", "type": "boolean"}],
                "config": {"type": "switch", "cases": [
                    {"id": "hi", "value": "high", "output": "escalate"},
                    {"id": "lo", "value": "low", "output": "ignore"}
                ]}
             }}
        ],
        "edges": [{"id": "e1", "source": "t", "target": "s"}]
    }))
    .unwrap();

    let execution = engine
        .run_to_completion(wf, input(json!({"value": "low"})))
        .await
        .unwrap();

    let routed = execution.result("s").unwrap().output.clone().unwrap();
    assert_eq!(routed["case"], json!("lo"));
    assert_eq!(routed["output"], json!("ignore"));
    assert_eq!(routed["matched"], json!(true));
}
