//! Completion / exception hooks.
//!
//! Hooks run in registration order, after the task's acknowledgment has been
//! settled. An `Err` from a hook is not caught by the executor: it stops the
//! worker (see `WorkerError::Extension`).

use async_trait::async_trait;
use serde_json::Value;

use crate::app::ExecutionContext;
use crate::domain::TaskRecord;
use crate::error::{ExecutionError, ExtensionError};
use crate::typed::TaskDefinition;

#[async_trait]
pub trait OnTaskException: Send + Sync {
    async fn on_task_exception(
        &self,
        task: &TaskRecord,
        definition: &TaskDefinition,
        context: &ExecutionContext,
        error: &ExecutionError,
    ) -> Result<(), ExtensionError>;
}

#[async_trait]
pub trait OnTaskCompletion: Send + Sync {
    /// `result` is the task output as stored in the result backend
    /// (`Value::Null` for tasks returning `()`).
    async fn on_task_completion(
        &self,
        task: &TaskRecord,
        definition: &TaskDefinition,
        context: &ExecutionContext,
        result: &Value,
    ) -> Result<(), ExtensionError>;
}
