use crate::{ExecutorRegistry, WorkflowExecutor};
use chrono::Utc;
use futures::FutureExt;
use graphcore::{
    EngineError, EventBus, Execution, ExecutionContext, ExecutionEvent, ExecutionId,
    ExecutionStatus, Map, NodeType, Workflow,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, RwLock, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// Configuration consumed by the engine itself
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Runs allowed to traverse at once; further runs queue
    pub max_concurrent_executions: usize,
    /// Upper bound a wrapping caller may enforce by cancelling; not enforced here
    pub execution_timeout_seconds: u64,
    pub event_buffer_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_executions: 10,
            execution_timeout_seconds: 300,
            event_buffer_size: 1000,
        }
    }
}

impl EngineConfig {
    pub fn execution_timeout(&self) -> Duration {
        Duration::from_secs(self.execution_timeout_seconds)
    }
}

/// Runs workflows in the background, bounded by a concurrency limit.
///
/// Cloning is cheap; clones share the same run table and executors.
#[derive(Clone)]
pub struct WorkflowEngine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    config: EngineConfig,
    registry: RwLock<ExecutorRegistry>,
    permits: Semaphore,
    events: EventBus,
    runs: RwLock<RunTable>,
    shutting_down: AtomicBool,
}

#[derive(Default)]
struct RunTable {
    active: HashMap<ExecutionId, ActiveRun>,
    finished: HashMap<ExecutionId, Execution>,
}

struct ActiveRun {
    cancel: CancellationToken,
    status: watch::Receiver<ExecutionStatus>,
    handle: Option<JoinHandle<()>>,
}

impl WorkflowEngine {
    pub fn new(registry: ExecutorRegistry, config: EngineConfig) -> Self {
        let permits = config.max_concurrent_executions.max(1);
        let events = EventBus::new(config.event_buffer_size);

        Self {
            inner: Arc::new(EngineInner {
                config,
                registry: RwLock::new(registry),
                permits: Semaphore::new(permits),
                events,
                runs: RwLock::new(RunTable::default()),
                shutting_down: AtomicBool::new(false),
            }),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Initialize every registered executor
    pub async fn initialize(&self) -> Result<(), EngineError> {
        tracing::info!("Initializing workflow engine");
        self.inner.registry.write().await.initialize().await
    }

    /// Cancel all active runs, wait for them to finish, then shut down executors.
    pub async fn shutdown(&self) -> Result<(), EngineError> {
        tracing::info!("Shutting down workflow engine");

        let handles: Vec<(ExecutionId, JoinHandle<()>)> = {
            let mut runs = self.inner.runs.write().await;
            self.inner.shutting_down.store(true, Ordering::SeqCst);
            runs.active
                .iter_mut()
                .filter_map(|(id, run)| {
                    tracing::info!("Cancelling execution {}", id);
                    run.cancel.cancel();
                    run.handle.take().map(|h| (id.clone(), h))
                })
                .collect()
        };

        for (id, handle) in handles {
            if let Err(e) = handle.await {
                tracing::warn!("Execution {} did not finish cleanly: {}", id, e);
            }
        }

        self.inner.registry.write().await.shutdown().await
    }

    /// Start a run in the background and return its `pending` record.
    pub async fn execute(
        &self,
        workflow: Workflow,
        input: Option<Map>,
    ) -> Result<Execution, EngineError> {
        // Admission is decided under the same lock shutdown takes.
        let mut runs = self.inner.runs.write().await;
        if self.inner.shutting_down.load(Ordering::SeqCst) {
            return Err(EngineError::ShuttingDown);
        }

        let execution = Execution::new(workflow.id.clone(), input.unwrap_or_default());
        let snapshot = execution.clone();
        let cancel = CancellationToken::new();
        let (status_tx, status_rx) = watch::channel(ExecutionStatus::Pending);

        // The table stays locked while spawning so the run is registered before it can finish.
        let handle = tokio::spawn(self.inner.clone().drive(
            workflow,
            execution,
            cancel.clone(),
            status_tx,
        ));
        runs.active.insert(
            snapshot.id.clone(),
            ActiveRun {
                cancel,
                status: status_rx,
                handle: Some(handle),
            },
        );

        tracing::debug!("Scheduled execution {}", snapshot.id);
        Ok(snapshot)
    }

    /// Terminal record of a run.
    ///
    /// For a run still in flight this waits for the worker to finish; it
    /// never returns a partially-updated record. Unknown ids yield `None`.
    pub async fn get_execution(&self, id: &str) -> Option<Execution> {
        let mut status = {
            let runs = self.inner.runs.read().await;
            if let Some(done) = runs.finished.get(id) {
                return Some(done.clone());
            }
            runs.active.get(id)?.status.clone()
        };

        // An Err means the worker is gone; fall through to the table either way.
        let _ = status.wait_for(|s| s.is_terminal()).await;
        self.inner.runs.read().await.finished.get(id).cloned()
    }

    /// Current status without waiting
    pub async fn status(&self, id: &str) -> Option<ExecutionStatus> {
        let runs = self.inner.runs.read().await;
        if let Some(done) = runs.finished.get(id) {
            return Some(done.status);
        }
        runs.active.get(id).map(|run| *run.status.borrow())
    }

    /// Signal cancellation. Returns `false` for unknown or finished runs.
    pub async fn cancel_execution(&self, id: &str) -> bool {
        let runs = self.inner.runs.read().await;
        match runs.active.get(id) {
            Some(run) if !run.status.borrow().is_terminal() => {
                tracing::info!("Cancelling execution {}", id);
                run.cancel.cancel();
                true
            }
            _ => false,
        }
    }

    /// Drop a finished record from the table
    pub async fn forget_execution(&self, id: &str) -> Option<Execution> {
        self.inner.runs.write().await.finished.remove(id)
    }

    /// Ids of runs that have not finished yet
    pub async fn active_executions(&self) -> Vec<ExecutionId> {
        self.inner.runs.read().await.active.keys().cloned().collect()
    }

    /// Number of runs currently traversing
    pub async fn running_count(&self) -> usize {
        self.inner
            .runs
            .read()
            .await
            .active
            .values()
            .filter(|run| *run.status.borrow() == ExecutionStatus::Running)
            .count()
    }

    /// Start a run and wait for its terminal record.
    pub async fn run_to_completion(
        &self,
        workflow: Workflow,
        input: Option<Map>,
    ) -> Result<Execution, EngineError> {
        let pending = self.execute(workflow, input).await?;
        self.get_execution(&pending.id)
            .await
            .ok_or(EngineError::ExecutionLost(pending.id))
    }

    pub fn subscribe_events(&self) -> tokio::sync::broadcast::Receiver<ExecutionEvent> {
        self.inner.events.subscribe()
    }

    /// Node types with a registered executor
    pub async fn node_types(&self) -> Vec<NodeType> {
        self.inner.registry.read().await.node_types()
    }
}

impl EngineInner {
    /// Body of the background task for one run; always leaves a terminal record.
    async fn drive(
        self: Arc<Self>,
        workflow: Workflow,
        mut execution: Execution,
        cancel: CancellationToken,
        status_tx: watch::Sender<ExecutionStatus>,
    ) {
        let span = tracing::info_span!(
            "execution",
            execution_id = %execution.id,
            workflow_id = %workflow.id
        );

        async move {
            let started = Instant::now();
            let outcome = AssertUnwindSafe(self.traverse(
                &workflow,
                &mut execution,
                &cancel,
                &status_tx,
            ))
            .catch_unwind()
            .await;

            match outcome {
                Ok(Ok(())) => {
                    tracing::info!("Completed execution {}", execution.id);
                    execution.finish(ExecutionStatus::Completed, None);
                }
                Ok(Err(EngineError::Cancelled)) => {
                    tracing::warn!("Execution {} was cancelled", execution.id);
                    execution.finish(
                        ExecutionStatus::Cancelled,
                        Some(EngineError::Cancelled.to_string()),
                    );
                }
                Ok(Err(e)) => {
                    tracing::error!("Error executing workflow {}: {}", workflow.id, e);
                    execution.finish(ExecutionStatus::Failed, Some(e.to_string()));
                }
                Err(_) => {
                    tracing::error!("Execution {} panicked", execution.id);
                    execution.finish(
                        ExecutionStatus::Failed,
                        Some("Execution panicked".to_string()),
                    );
                }
            }

            self.events.emit(ExecutionEvent::ExecutionFinished {
                execution_id: execution.id.clone(),
                status: execution.status,
                duration_ms: started.elapsed().as_millis() as u64,
                timestamp: Utc::now(),
            });

            let status = execution.status;
            {
                let mut runs = self.runs.write().await;
                runs.active.remove(&execution.id);
                runs.finished.insert(execution.id.clone(), execution);
            }
            status_tx.send_replace(status);
        }
        .instrument(span)
        .await
    }

    async fn traverse(
        &self,
        workflow: &Workflow,
        execution: &mut Execution,
        cancel: &CancellationToken,
        status_tx: &watch::Sender<ExecutionStatus>,
    ) -> Result<(), EngineError> {
        let _permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(EngineError::Cancelled),
            permit = self.permits.acquire() => permit.map_err(|_| EngineError::ShuttingDown)?,
        };

        tracing::info!(
            "Starting execution {} of workflow {}",
            execution.id,
            workflow.id
        );
        execution.mark_running();
        status_tx.send_replace(ExecutionStatus::Running);
        self.events.emit(ExecutionEvent::ExecutionStarted {
            execution_id: execution.id.clone(),
            workflow_id: workflow.id.clone(),
            timestamp: Utc::now(),
        });

        let registry = self.registry.read().await;
        let mut ctx = ExecutionContext::new(execution.id.clone(), execution.input.clone())
            .with_events(self.events.sender())
            .with_cancellation(cancel.clone());

        WorkflowExecutor::new(&registry, &self.events)
            .run(workflow, execution, &mut ctx)
            .await
    }
}
