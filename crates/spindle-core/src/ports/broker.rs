//! Broker port - タスクメッセージの供給元
//!
//! worker はこの trait だけに依存します。
//! 永続化・転送の方式（Redis, PG, InMemory など）は実装側の責務です。
//!
//! # 契約
//! - `read()` は待機してよい（0 件以上を返す）
//! - `ack()` で削除（確定）
//! - `tasks_healthcheck()` で lease を一括更新
//! - `run_worker_maintenance_tasks()` は worker と同じ寿命の定期処理
//! - `start()` / `close()` で broker の寿命をスコープとして扱う

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::config::Configuration;
use crate::domain::{BrokerTask, DeliveryTag, TaskRecord};

#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error("broker is closed")]
    Closed,

    #[error("unknown delivery tag {0}")]
    UnknownDelivery(DeliveryTag),

    #[error("broker backend error: {0}")]
    Backend(String),
}

/// Broker は read / ack / lease 更新を提供する
///
/// Implementations are shared by reference across all executors and must be
/// safe for concurrent use; the worker adds no locking around them.
#[async_trait]
pub trait Broker: Send + Sync {
    /// Open the broker. Called once before any other operation.
    async fn start(&self) -> Result<(), BrokerError> {
        Ok(())
    }

    /// Close the broker. Called once when the worker stops, even after a failure.
    async fn close(&self) {}

    /// Submit a new task.
    async fn enqueue(&self, task: TaskRecord) -> Result<(), BrokerError>;

    /// Read the next batch of messages. May wait; may return an empty batch.
    async fn read(&self) -> Result<Vec<BrokerTask>, BrokerError>;

    /// Acknowledge (remove) a message.
    async fn ack(&self, task: &BrokerTask) -> Result<(), BrokerError>;

    /// Renew the lease of every given message.
    async fn tasks_healthcheck(&self, tasks: &[BrokerTask]) -> Result<(), BrokerError>;

    /// Broker-owned periodic upkeep. Must return once `stop` is cancelled.
    async fn run_worker_maintenance_tasks(
        &self,
        stop: CancellationToken,
        _config: &Configuration,
    ) -> Result<(), BrokerError> {
        stop.cancelled().await;
        Ok(())
    }
}

/// Scoped acknowledgment around one unit of work.
///
/// - `commit()` acks the message.
/// - `abandon()` leaves it unacknowledged (eligible for redelivery).
/// - Dropping an unsettled context is an implicit `abandon()`; this is the
///   path taken when an executor is cancelled mid-flight.
pub struct AckContext<'a> {
    broker: &'a dyn Broker,
    task: &'a BrokerTask,
    settled: bool,
}

impl<'a> AckContext<'a> {
    pub fn begin(broker: &'a dyn Broker, task: &'a BrokerTask) -> Self {
        Self {
            broker,
            task,
            settled: false,
        }
    }

    pub async fn commit(mut self) -> Result<(), BrokerError> {
        self.settled = true;
        self.broker.ack(self.task).await
    }

    pub fn abandon(mut self) {
        self.settled = true;
        tracing::debug!(task_id = %self.task.id(), "leaving message unacknowledged");
    }
}

impl Drop for AckContext<'_> {
    fn drop(&mut self) {
        if !self.settled {
            tracing::debug!(
                task_id = %self.task.id(),
                delivery = %self.task.delivery,
                "ack context dropped before settling, message left unacknowledged"
            );
        }
    }
}
