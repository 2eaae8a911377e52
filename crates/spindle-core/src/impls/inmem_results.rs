//! InMemoryResultBackend - タスク結果の保存先（開発用）

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::domain::TaskId;
use crate::ports::{ResultBackend, ResultError};

#[derive(Default)]
pub struct InMemoryResultBackend {
    results: Mutex<HashMap<TaskId, Value>>,
}

impl InMemoryResultBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.results.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.results.lock().await.is_empty()
    }
}

#[async_trait]
impl ResultBackend for InMemoryResultBackend {
    async fn set(&self, task_id: TaskId, value: &Value) -> Result<(), ResultError> {
        self.results.lock().await.insert(task_id, value.clone());
        Ok(())
    }

    async fn get(&self, task_id: TaskId) -> Result<Option<Value>, ResultError> {
        Ok(self.results.lock().await.get(&task_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use ulid::Ulid;

    #[tokio::test]
    async fn set_overwrites_and_get_reads_back() {
        let backend = InMemoryResultBackend::new();
        let id = TaskId::from_ulid(Ulid::new());

        assert_eq!(backend.get(id).await.unwrap(), None);
        backend.set(id, &json!(1)).await.unwrap();
        backend.set(id, &json!({ "n": 2 })).await.unwrap();

        assert_eq!(backend.get(id).await.unwrap(), Some(json!({ "n": 2 })));
        assert_eq!(backend.len().await, 1);
    }
}
