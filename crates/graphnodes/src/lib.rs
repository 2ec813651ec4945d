//! Built-in executors
//!
//! One executor per node category, plus the settings they are built from.

mod action;
mod condition;
mod data_source;
mod http;
mod model;
mod output;
pub mod settings;
mod storage;
mod transform;
mod trigger;

pub use action::{ActionExecutor, EmailMessage, LogMessageSender, MessageSender};
pub use condition::ConditionExecutor;
pub use data_source::DataSourceExecutor;
pub use model::ModelCallExecutor;
pub use output::OutputExecutor;
pub use settings::{ExecutorSettings, Settings, SettingsError};
pub use storage::StorageRoot;
pub use transform::{apply_template, render_text, select_path, TransformExecutor};
pub use trigger::TriggerExecutor;

use graphruntime::ExecutorRegistry;

/// A registry with the built-in executor for every node type
pub fn registry_with_builtins(settings: &ExecutorSettings) -> ExecutorRegistry {
    let mut registry = ExecutorRegistry::new();
    registry.register(Box::new(TriggerExecutor::new()));
    registry.register(Box::new(ActionExecutor::new(settings)));
    registry.register(Box::new(ConditionExecutor::new()));
    registry.register(Box::new(TransformExecutor::new()));
    registry.register(Box::new(ModelCallExecutor::new(settings)));
    registry.register(Box::new(DataSourceExecutor::new(settings)));
    registry.register(Box::new(OutputExecutor::new(settings)));
    registry
}
