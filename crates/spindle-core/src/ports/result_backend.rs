//! ResultBackend port - タスク結果の保存先

use async_trait::async_trait;

use crate::domain::TaskId;

#[derive(Debug, thiserror::Error)]
pub enum ResultError {
    #[error("result backend error: {0}")]
    Backend(String),
}

/// ResultBackend は task_id をキーに結果を保存する
#[async_trait]
pub trait ResultBackend: Send + Sync {
    async fn set(&self, task_id: TaskId, value: &serde_json::Value) -> Result<(), ResultError>;

    async fn get(&self, task_id: TaskId) -> Result<Option<serde_json::Value>, ResultError>;
}
