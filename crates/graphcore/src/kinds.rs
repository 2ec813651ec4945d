//! Sub-types of each node category, selected by `config["type"]`.

use crate::error::NodeError;
use crate::workflow::{Node, NodeType};
use serde::de::DeserializeOwned;
use serde::Deserialize;

/// A closed set of behaviors for one node category.
pub trait SubType: DeserializeOwned + Default {
    const CATEGORY: NodeType;

    /// Resolve from `config["type"]`, falling back to the default when absent.
    fn of(node: &Node) -> Result<Self, NodeError> {
        match node.config("type") {
            None => Ok(Self::default()),
            Some(value) => serde_json::from_value(value.clone()).map_err(|_| {
                NodeError::Unsupported {
                    category: Self::CATEGORY,
                    kind: value
                        .as_str()
                        .map(str::to_string)
                        .unwrap_or_else(|| value.to_string()),
                }
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    #[default]
    Manual,
    Webhook,
    Schedule,
}

impl TriggerKind {
    /// Triggers never fail on their sub-type; anything unknown is manual.
    pub fn lenient(node: &Node) -> Self {
        Self::of(node).unwrap_or_default()
    }
}

impl SubType for TriggerKind {
    const CATEGORY: NodeType = NodeType::Trigger;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    #[default]
    HttpRequest,
    SendEmail,
}

impl SubType for ActionKind {
    const CATEGORY: NodeType = NodeType::Action;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionKind {
    #[default]
    IfElse,
    Switch,
}

impl SubType for ConditionKind {
    const CATEGORY: NodeType = NodeType::Condition;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformKind {
    #[default]
    JsonTransform,
    TextTemplate,
}

impl SubType for TransformKind {
    const CATEGORY: NodeType = NodeType::Transformation;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    #[default]
    TextGeneration,
    ImageGeneration,
}

impl SubType for ModelKind {
    const CATEGORY: NodeType = NodeType::ModelCall;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSourceKind {
    #[default]
    DatabaseQuery,
    FileReader,
    ApiRequest,
}

impl SubType for DataSourceKind {
    const CATEGORY: NodeType = NodeType::DataSource;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputKind {
    #[default]
    HttpResponse,
    FileWriter,
    Webhook,
}

impl SubType for OutputKind {
    const CATEGORY: NodeType = NodeType::Output;
}
