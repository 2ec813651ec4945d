use crate::value::{Map, Value};
use serde::{Deserialize, Serialize};
use std::fmt;

pub type WorkflowId = String;
pub type NodeId = String;

/// Complete workflow definition.
///
/// Fields beyond `id`, `nodes` and `edges` are carried for callers but never
/// read by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    pub id: WorkflowId,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl Workflow {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            description: None,
            nodes: Vec::new(),
            edges: Vec::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn add_node(&mut self, node: Node) -> NodeId {
        let id = node.id.clone();
        self.nodes.push(node);
        id
    }

    /// Add a success edge from `source` to `target`.
    pub fn connect(&mut self, source: impl Into<String>, target: impl Into<String>) {
        self.push_edge(source.into(), target.into(), EdgeKind::Default);
    }

    /// Add an edge that is only followed when `source` fails.
    pub fn connect_on_error(&mut self, source: impl Into<String>, target: impl Into<String>) {
        self.push_edge(source.into(), target.into(), EdgeKind::Error);
    }

    fn push_edge(&mut self, source: NodeId, target: NodeId, kind: EdgeKind) {
        let id = format!("e{}-{}-{}", self.edges.len(), source, target);
        self.edges.push(Edge {
            id,
            source,
            target,
            kind,
        });
    }

    pub fn find_node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Trigger nodes in declaration order.
    pub fn trigger_nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes
            .iter()
            .filter(|n| n.node_type == NodeType::Trigger)
    }

    /// Targets of `kind` edges leaving `source`, in edge-list order.
    ///
    /// Edges pointing at unknown node ids are skipped.
    pub fn successors<'a>(
        &'a self,
        source: &'a str,
        kind: EdgeKind,
    ) -> impl Iterator<Item = &'a Node> + 'a {
        self.edges
            .iter()
            .filter(move |e| e.source == source && e.kind == kind)
            .filter_map(move |e| self.find_node(&e.target))
    }
}

/// Category of a node; selects the executor that runs it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    Trigger,
    Action,
    Condition,
    Transformation,
    #[serde(alias = "ai_model")]
    ModelCall,
    DataSource,
    Output,
}

impl NodeType {
    pub const ALL: [NodeType; 7] = [
        NodeType::Trigger,
        NodeType::Action,
        NodeType::Condition,
        NodeType::Transformation,
        NodeType::ModelCall,
        NodeType::DataSource,
        NodeType::Output,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::Trigger => "trigger",
            NodeType::Action => "action",
            NodeType::Condition => "condition",
            NodeType::Transformation => "transformation",
            NodeType::ModelCall => "model_call",
            NodeType::DataSource => "data_source",
            NodeType::Output => "output",
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Node in a workflow graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    pub data: NodeData,
}

impl Node {
    pub fn new(id: impl Into<String>, node_type: NodeType) -> Self {
        let id = id.into();
        Self {
            data: NodeData {
                label: id.clone(),
                description: None,
                inputs: Vec::new(),
                outputs: Vec::new(),
                config: Map::new(),
            },
            id,
            node_type,
            position: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.data.label = label.into();
        self
    }

    pub fn with_config(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.config.insert(key.into(), value.into());
        self
    }

    /// Shorthand for setting `config["type"]`, the node's sub-type.
    pub fn with_kind(self, kind: &str) -> Self {
        self.with_config("type", kind)
    }

    pub fn with_input(mut self, input: InputSpec) -> Self {
        self.data.inputs.push(input);
        self
    }

    pub fn with_output(mut self, id: impl Into<String>) -> Self {
        self.data.outputs.push(OutputSpec {
            id: id.into(),
            value_type: "any".to_string(),
        });
        self
    }

    pub fn with_position(mut self, x: f32, y: f32) -> Self {
        self.position = Some(Position { x, y });
        self
    }

    pub fn label(&self) -> &str {
        &self.data.label
    }

    pub fn config(&self, key: &str) -> Option<&Value> {
        self.data.config.get(key)
    }
}

/// Node payload authored in the editor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeData {
    #[serde(default)]
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub inputs: Vec<InputSpec>,
    #[serde(default)]
    pub outputs: Vec<OutputSpec>,
    #[serde(default)]
    pub config: Map,
}

/// Declared node input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputSpec {
    pub id: String,
    #[serde(rename = "type", default = "any_type")]
    pub value_type: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl InputSpec {
    pub fn required(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            value_type: any_type(),
            required: true,
            default: None,
        }
    }

    pub fn optional(id: impl Into<String>) -> Self {
        Self {
            required: false,
            ..Self::required(id)
        }
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }
}

/// Declared node output. The type is informational only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputSpec {
    pub id: String,
    #[serde(rename = "type", default = "any_type")]
    pub value_type: String,
}

fn any_type() -> String {
    "any".to_string()
}

/// Directed connection between two nodes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub id: String,
    pub source: NodeId,
    pub target: NodeId,
    #[serde(rename = "type", default)]
    pub kind: EdgeKind,
}

/// Which outcome of the source node an edge follows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    #[default]
    #[serde(alias = "success")]
    Default,
    Error,
}

/// Node position in the visual editor; ignored by the engine.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}
