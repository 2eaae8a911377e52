//! Built-in logging extension.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde_json::Value;

use super::{Extension, Invocation, Next, OnTaskCompletion, OnTaskException, OnTaskExecution};
use crate::app::ExecutionContext;
use crate::domain::TaskRecord;
use crate::error::{ExecutionError, ExtensionError};
use crate::typed::TaskDefinition;

/// Logs task start, duration and outcome through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogExtension;

impl LogExtension {
    pub fn new() -> Self {
        Self
    }
}

impl Extension for LogExtension {
    fn name(&self) -> &str {
        "log"
    }

    fn as_exception_hook(self: Arc<Self>) -> Option<Arc<dyn OnTaskException>> {
        Some(self)
    }

    fn as_completion_hook(self: Arc<Self>) -> Option<Arc<dyn OnTaskCompletion>> {
        Some(self)
    }

    fn as_execution_middleware(self: Arc<Self>) -> Option<Arc<dyn OnTaskExecution>> {
        Some(self)
    }
}

#[async_trait]
impl OnTaskExecution for LogExtension {
    async fn on_task_execution(
        &self,
        invocation: Invocation<'_>,
        next: Next<'_>,
    ) -> Result<Value, ExecutionError> {
        let task_id = invocation.record.id;
        let task_name = invocation.definition.name().clone();
        let requeue_count = invocation.record.requeue_count;
        tracing::info!(%task_id, %task_name, requeue_count, "task started");

        let started = Instant::now();
        let outcome = next.run(invocation).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match &outcome {
            Ok(_) => tracing::info!(%task_id, %task_name, elapsed_ms, "task finished"),
            Err(e) => tracing::warn!(
                %task_id,
                %task_name,
                elapsed_ms,
                kind = e.as_label(),
                "task raised: {e}"
            ),
        }
        outcome
    }
}

#[async_trait]
impl OnTaskException for LogExtension {
    async fn on_task_exception(
        &self,
        task: &TaskRecord,
        definition: &TaskDefinition,
        _context: &ExecutionContext,
        error: &ExecutionError,
    ) -> Result<(), ExtensionError> {
        tracing::error!(
            task_id = %task.id,
            task_name = %definition.name(),
            requeue_count = task.requeue_count,
            kind = error.as_label(),
            "task failed, left for redelivery: {error}"
        );
        Ok(())
    }
}

#[async_trait]
impl OnTaskCompletion for LogExtension {
    async fn on_task_completion(
        &self,
        task: &TaskRecord,
        definition: &TaskDefinition,
        _context: &ExecutionContext,
        result: &Value,
    ) -> Result<(), ExtensionError> {
        tracing::debug!(
            task_id = %task.id,
            task_name = %definition.name(),
            %result,
            "task completed"
        );
        Ok(())
    }
}
