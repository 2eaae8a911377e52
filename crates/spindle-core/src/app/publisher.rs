//! Publisher - 型付きタスクを broker に投入する
//!
//! # フロー
//! 1. IdGenerator で task_id を採番
//! 2. Clock で enqueue_time を決定
//! 3. Serializers の既定 backend で引数をエンコード
//! 4. Broker::enqueue()

use std::sync::Arc;

use crate::domain::{TaskId, TaskName, TaskRecord};
use crate::ports::{Broker, BrokerError, Clock, IdGenerator};
use crate::typed::{CodecError, Serializers, Task};

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("encoding task arguments failed: {0}")]
    Codec(#[from] CodecError),

    #[error("enqueue failed: {0}")]
    Broker(#[from] BrokerError),
}

#[derive(Clone)]
pub struct Publisher {
    broker: Arc<dyn Broker>,
    serializers: Serializers,
    ids: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
}

impl Publisher {
    pub fn new(
        broker: Arc<dyn Broker>,
        serializers: Serializers,
        ids: Arc<dyn IdGenerator>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            broker,
            serializers,
            ids,
            clock,
        }
    }

    /// Build the wire record for `task` without submitting it.
    pub fn record<T: Task>(&self, task: &T) -> Result<TaskRecord, CodecError> {
        let (args, kwargs) = self.serializers.encode_task(task)?;
        Ok(TaskRecord::new(
            self.ids.generate_task_id(),
            TaskName::new(T::NAME),
            self.clock.now(),
        )
        .with_args(args)
        .with_kwargs(kwargs))
    }

    pub async fn enqueue<T: Task>(&self, task: &T) -> Result<TaskId, PublishError> {
        let record = self.record(task)?;
        let id = record.id;
        self.broker.enqueue(record).await?;
        tracing::debug!(task_id = %id, task_name = T::NAME, "task enqueued");
        Ok(id)
    }
}
