// crates/graphcli/src/main.rs

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use graphcore::kinds::{
    ActionKind, ConditionKind, DataSourceKind, ModelKind, OutputKind, SubType, TransformKind,
};
use graphcore::{
    Execution, ExecutionEvent, ExecutionStatus, InputSpec, Map, Node, NodeEvent, NodeStatus,
    NodeType, Workflow,
};
use graphnodes::{registry_with_builtins, Settings};
use graphruntime::WorkflowEngine;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "graphflow")]
#[command(about = "Workflow graph runner", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a workflow file
    Run {
        /// Path to workflow JSON file
        #[arg(short, long)]
        file: PathBuf,

        /// Input data as JSON object
        #[arg(short, long)]
        input: Option<String>,

        /// Path to a TOML settings file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Show verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Validate a workflow file
    Validate {
        /// Path to workflow JSON file
        file: PathBuf,
    },

    /// List available node types
    Nodes,

    /// Create a new example workflow
    Init {
        /// Output file path
        #[arg(short, long, default_value = "workflow.json")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            file,
            input,
            config,
            verbose,
        } => {
            init_logging(verbose);
            run_workflow(&file, input, config.as_deref()).await?;
        }

        Commands::Validate { file } => {
            validate_workflow(&file)?;
        }

        Commands::Nodes => {
            list_nodes();
        }

        Commands::Init { output } => {
            create_example_workflow(&output)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn load_workflow(file: &Path) -> Result<Workflow> {
    let json = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read workflow {}", file.display()))?;
    serde_json::from_str(&json).with_context(|| format!("Invalid workflow {}", file.display()))
}

fn parse_input(input: Option<String>) -> Result<Option<Map>> {
    let Some(raw) = input else {
        return Ok(None);
    };
    match serde_json::from_str(&raw).context("Input is not valid JSON")? {
        serde_json::Value::Object(map) => Ok(Some(map)),
        _ => bail!("Input must be a JSON object"),
    }
}

async fn run_workflow(file: &Path, input: Option<String>, config: Option<&Path>) -> Result<()> {
    println!("🚀 Loading workflow from: {}", file.display());

    let settings = Settings::load(config)?;
    let workflow = load_workflow(file)?;
    let input = parse_input(input)?;

    println!("📋 Workflow: {}", display_name(&workflow));
    println!("   Nodes: {}", workflow.nodes.len());
    println!("   Edges: {}", workflow.edges.len());
    println!();

    let engine = WorkflowEngine::new(
        registry_with_builtins(&settings.executors),
        settings.engine.clone(),
    );
    engine.initialize().await?;

    let mut events = engine.subscribe_events();
    let event_task = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            print_event(event);
        }
    });

    let pending = engine.execute(workflow, input).await?;
    let timeout = engine.config().execution_timeout();
    let execution = match tokio::time::timeout(timeout, engine.get_execution(&pending.id)).await {
        Ok(execution) => execution,
        Err(_) => {
            tracing::warn!(
                "Execution {} exceeded {}s, cancelling",
                pending.id,
                timeout.as_secs()
            );
            engine.cancel_execution(&pending.id).await;
            engine.get_execution(&pending.id).await
        }
    }
    .with_context(|| format!("Execution {} disappeared", pending.id))?;

    // Let buffered events print before the summary
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    event_task.abort();

    print_summary(&execution);
    engine.shutdown().await?;

    if execution.status != ExecutionStatus::Completed {
        bail!(
            "Execution {} {}: {}",
            execution.id,
            execution.status,
            execution.error.as_deref().unwrap_or("no error recorded")
        );
    }
    Ok(())
}

fn display_name(workflow: &Workflow) -> &str {
    if workflow.name.is_empty() {
        &workflow.id
    } else {
        &workflow.name
    }
}

fn print_event(event: ExecutionEvent) {
    match event {
        ExecutionEvent::ExecutionStarted { .. } => {
            println!("▶️  Workflow started");
        }
        ExecutionEvent::NodeStarted {
            node_id, node_type, ..
        } => {
            println!("  ⚡ Starting node: {} ({})", node_id, node_type);
        }
        ExecutionEvent::NodeCompleted {
            node_id,
            duration_ms,
            ..
        } => {
            println!("  ✅ Node {} completed in {}ms", node_id, duration_ms);
        }
        ExecutionEvent::NodeFailed { node_id, error, .. } => {
            println!("  ❌ Node {} failed: {}", node_id, error);
        }
        ExecutionEvent::NodeEvent { node_id, event, .. } => match event {
            NodeEvent::Info { message } => println!("     ℹ️  [{}] {}", node_id, message),
            NodeEvent::Warning { message } => println!("     ⚠️  [{}] {}", node_id, message),
        },
        ExecutionEvent::ExecutionFinished {
            status,
            duration_ms,
            ..
        } => match status {
            ExecutionStatus::Completed => {
                println!("✨ Workflow completed successfully in {}ms", duration_ms)
            }
            other => println!("💥 Workflow {} after {}ms", other, duration_ms),
        },
    }
}

fn print_summary(execution: &Execution) {
    let failed = execution
        .results
        .values()
        .filter(|r| r.status == NodeStatus::Error)
        .count();

    println!();
    println!("📊 Execution Summary:");
    println!("   Execution ID: {}", execution.id);
    println!("   Status: {}", execution.status);
    println!(
        "   Nodes run: {} ({} failed)",
        execution.results.len(),
        failed
    );
    if let Some(error) = &execution.error {
        println!("   Error: {}", error);
    }

    let results = execution.ordered_results();
    if results.iter().any(|r| r.output.is_some()) {
        println!();
        println!("📤 Outputs:");
        for result in results {
            if let Some(output) = &result.output {
                println!("   Node {}:", result.node_id);
                for (key, value) in output {
                    println!("     {}: {}", key, value);
                }
            }
        }
    }
}

/// Problems that would make a run fail or behave unexpectedly.
fn check_workflow(workflow: &Workflow) -> (Vec<String>, Vec<String>) {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    if workflow.trigger_nodes().next().is_none() {
        errors.push("Workflow must have at least one trigger node".to_string());
    }

    let mut seen = HashSet::new();
    for node in &workflow.nodes {
        if !seen.insert(node.id.as_str()) {
            errors.push(format!("Duplicate node id: {}", node.id));
        }
        if let Err(e) = check_kind(node) {
            errors.push(format!("Node {}: {}", node.id, e));
        }
    }

    for edge in &workflow.edges {
        for endpoint in [&edge.source, &edge.target] {
            if workflow.find_node(endpoint).is_none() {
                warnings.push(format!(
                    "Edge {} references unknown node {}; it will be ignored",
                    edge.id, endpoint
                ));
            }
        }
    }

    (errors, warnings)
}

fn check_kind(node: &Node) -> Result<(), graphcore::NodeError> {
    match node.node_type {
        // unknown trigger kinds run as manual
        NodeType::Trigger => Ok(()),
        NodeType::Action => ActionKind::of(node).map(drop),
        NodeType::Condition => ConditionKind::of(node).map(drop),
        NodeType::Transformation => TransformKind::of(node).map(drop),
        NodeType::ModelCall => ModelKind::of(node).map(drop),
        NodeType::DataSource => DataSourceKind::of(node).map(drop),
        NodeType::Output => OutputKind::of(node).map(drop),
    }
}

fn validate_workflow(file: &Path) -> Result<()> {
    println!("🔍 Validating workflow: {}", file.display());

    let workflow = load_workflow(file)?;
    let (errors, warnings) = check_workflow(&workflow);

    for warning in &warnings {
        println!("⚠️  {}", warning);
    }
    if !errors.is_empty() {
        for error in &errors {
            println!("❌ {}", error);
        }
        bail!("Workflow has {} error(s)", errors.len());
    }

    println!("✅ Workflow is valid:");
    println!("   Name: {}", display_name(&workflow));
    println!("   Nodes: {}", workflow.nodes.len());
    println!("   Edges: {}", workflow.edges.len());
    Ok(())
}

fn list_nodes() {
    println!("📦 Available Node Types:");
    println!();

    for node_type in NodeType::ALL {
        let (description, kinds) = match node_type {
            NodeType::Trigger => ("Starts a run", "manual, webhook, schedule"),
            NodeType::Action => ("Performs a side effect", "http_request, send_email"),
            NodeType::Condition => ("Decides a branch", "if_else, switch"),
            NodeType::Transformation => ("Reshapes data", "json_transform, text_template"),
            NodeType::ModelCall => ("Calls a model API", "text_generation, image_generation"),
            NodeType::DataSource => (
                "Reads data",
                "database_query, file_reader, api_request",
            ),
            NodeType::Output => ("Emits a result", "http_response, file_writer, webhook"),
        };
        println!("  • {}", node_type);
        println!("    {}", description);
        println!("    config.type: {}", kinds);
    }
}

fn example_workflow() -> Workflow {
    let mut workflow = Workflow::new("example").with_name("Example Greeting Workflow");
    workflow.description = Some("Renders a greeting and writes it to storage".to_string());

    workflow.add_node(
        Node::new("start", NodeType::Trigger)
            .with_label("Start")
            .with_kind("manual")
            .with_output("payload")
            .with_position(100.0, 100.0),
    );
    workflow.add_node(
        Node::new("greet", NodeType::Transformation)
            .with_label("Render Greeting")
            .with_kind("text_template")
            .with_config("template", "Hello {{name}}!")
            .with_input(InputSpec::required("template"))
            .with_input(InputSpec::optional("variables"))
            .with_output("output")
            .with_position(300.0, 100.0),
    );
    workflow.add_node(
        Node::new("save", NodeType::Output)
            .with_label("Save Greeting")
            .with_kind("file_writer")
            .with_config("path", "greeting.txt")
            .with_config("content", "greeting rendered")
            .with_input(InputSpec::required("path"))
            .with_input(InputSpec::required("content"))
            .with_position(500.0, 100.0),
    );
    workflow.add_node(
        Node::new("report", NodeType::Output)
            .with_label("Report Failure")
            .with_kind("http_response")
            .with_config("body", "greeting failed")
            .with_config("statusCode", 500)
            .with_input(InputSpec::required("body"))
            .with_input(InputSpec::optional("statusCode"))
            .with_position(500.0, 250.0),
    );

    workflow.connect("start", "greet");
    workflow.connect("greet", "save");
    workflow.connect_on_error("greet", "report");
    workflow
}

fn create_example_workflow(output: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(&example_workflow())?;
    std::fs::write(output, json)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    println!("✨ Created example workflow: {}", output.display());
    println!();
    println!("Run it with:");
    println!(
        "  graphflow run --file {} --input '{{\"variables\": {{\"name\": \"World\"}}}}'",
        output.display()
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn example_workflow_is_valid() {
        let (errors, warnings) = check_workflow(&example_workflow());
        assert!(errors.is_empty(), "{:?}", errors);
        assert!(warnings.is_empty(), "{:?}", warnings);
    }

    #[test]
    fn check_reports_structural_problems() {
        let mut workflow = Workflow::new("broken");
        workflow.add_node(Node::new("a", NodeType::Action).with_kind("fax"));
        workflow.add_node(Node::new("a", NodeType::Output));
        workflow.connect("a", "ghost");

        let (errors, warnings) = check_workflow(&workflow);
        assert!(errors.iter().any(|e| e.contains("trigger")));
        assert!(errors.iter().any(|e| e == "Duplicate node id: a"));
        assert!(errors
            .iter()
            .any(|e| e == "Node a: Unsupported action type: fax"));
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn input_must_be_an_object() {
        assert!(parse_input(None).unwrap().is_none());
        assert!(parse_input(Some(r#"{"a": 1}"#.into())).unwrap().is_some());
        assert!(parse_input(Some("[1, 2]".into())).is_err());
        assert!(parse_input(Some("not json".into())).is_err());
    }
}
