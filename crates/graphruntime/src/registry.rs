use graphcore::{EngineError, Executor, NodeError, NodeType};
use std::collections::HashMap;

/// Registry of executors, one per node type.
///
/// Owns executor lifecycle: every registered executor is initialized by
/// [`ExecutorRegistry::initialize`] and torn down by [`ExecutorRegistry::shutdown`].
pub struct ExecutorRegistry {
    executors: HashMap<NodeType, Box<dyn Executor>>,
    initialized: bool,
}

impl ExecutorRegistry {
    pub fn new() -> Self {
        Self {
            executors: HashMap::new(),
            initialized: false,
        }
    }

    /// Register an executor, replacing any previous one for the same node type.
    ///
    /// Executors must be registered before [`initialize`](Self::initialize).
    pub fn register(&mut self, executor: Box<dyn Executor>) -> Option<Box<dyn Executor>> {
        let node_type = executor.node_type();
        tracing::debug!("Registering executor for node type: {}", node_type);
        self.executors.insert(node_type, executor)
    }

    /// Initialize every executor in node-type order, stopping at the first failure.
    ///
    /// Executors already initialized when a later one fails are shut down
    /// again before the error is returned.
    pub async fn initialize(&mut self) -> Result<(), EngineError> {
        if self.initialized {
            return Ok(());
        }
        tracing::info!("Initializing {} node executors", self.executors.len());

        let mut started = Vec::new();
        for node_type in NodeType::ALL {
            let Some(executor) = self.executors.get_mut(&node_type) else {
                continue;
            };
            tracing::debug!("Initializing {} executor", node_type);
            let result = executor.initialize().await;
            if let Err(source) = result {
                self.shutdown_started(&started).await;
                return Err(EngineError::Initialization { node_type, source });
            }
            started.push(node_type);
        }

        self.initialized = true;
        Ok(())
    }

    /// Shut down every executor, collecting failures instead of stopping early.
    pub async fn shutdown(&mut self) -> Result<(), EngineError> {
        tracing::info!("Shutting down node executors");
        let mut failures: Vec<(NodeType, NodeError)> = Vec::new();

        for node_type in NodeType::ALL {
            if let Some(executor) = self.executors.get_mut(&node_type) {
                tracing::debug!("Shutting down {} executor", node_type);
                if let Err(e) = executor.shutdown().await {
                    tracing::error!("Failed to shut down {} executor: {}", node_type, e);
                    failures.push((node_type, e));
                }
            }
        }

        self.initialized = false;
        if failures.is_empty() {
            Ok(())
        } else {
            Err(EngineError::Shutdown(failures))
        }
    }

    async fn shutdown_started(&mut self, started: &[NodeType]) {
        for node_type in started {
            if let Some(executor) = self.executors.get_mut(node_type) {
                if let Err(e) = executor.shutdown().await {
                    tracing::warn!("Failed to shut down {} executor: {}", node_type, e);
                }
            }
        }
    }

    /// Executor for `node_type`
    pub fn get(&self, node_type: NodeType) -> Result<&dyn Executor, EngineError> {
        if !self.initialized {
            return Err(EngineError::RegistryNotInitialized);
        }
        self.executors
            .get(&node_type)
            .map(|e| e.as_ref())
            .ok_or(EngineError::NoExecutor(node_type))
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Registered node types in declaration order
    pub fn node_types(&self) -> Vec<NodeType> {
        NodeType::ALL
            .into_iter()
            .filter(|t| self.executors.contains_key(t))
            .collect()
    }
}

impl Default for ExecutorRegistry {
    fn default() -> Self {
        Self::new()
    }
}
