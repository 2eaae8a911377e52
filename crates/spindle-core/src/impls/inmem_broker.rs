//! InMemoryBroker - 開発用・テスト用の broker
//!
//! # 学習ポイント
//! - tokio::sync::Mutex + Notify による待機付き read
//! - lease（pending）と期限切れ回収による at-least-once 配送
//!
//! # 状態遷移
//! ```text
//! enqueue ─► ready ─read─► pending ─ack─► (削除)
//!                ▲            │
//!                └─ requeue ──┘  lease 期限切れ（maintenance）
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::Configuration;
use crate::domain::{BrokerTask, DeliveryTag, TaskId, TaskRecord};
use crate::ports::{Broker, BrokerError};

struct Lease {
    message: BrokerTask,
    renewed_at: Instant,
}

#[derive(Default)]
struct InMemoryBrokerState {
    ready: VecDeque<TaskRecord>,
    pending: HashMap<DeliveryTag, Lease>,
    acked: Vec<TaskId>,
    healthchecks: Vec<Vec<TaskId>>,
    next_delivery: u64,
}

impl InMemoryBrokerState {
    fn deliver(&mut self, record: TaskRecord) -> BrokerTask {
        self.next_delivery += 1;
        let message = BrokerTask::new(record, DeliveryTag::new(format!("mem-{}", self.next_delivery)));
        self.pending.insert(
            message.delivery.clone(),
            Lease {
                message: message.clone(),
                renewed_at: Instant::now(),
            },
        );
        message
    }

    /// Move every lease older than `timeout` back to ready. Returns how many.
    fn reclaim_expired(&mut self, timeout: Duration) -> usize {
        let now = Instant::now();
        let expired: Vec<DeliveryTag> = self
            .pending
            .iter()
            .filter(|(_, lease)| now.duration_since(lease.renewed_at) >= timeout)
            .map(|(tag, _)| tag.clone())
            .collect();

        for tag in &expired {
            if let Some(lease) = self.pending.remove(tag) {
                let mut record = lease.message.task;
                record.requeue_count += 1;
                tracing::debug!(
                    task_id = %record.id,
                    requeue_count = record.requeue_count,
                    "lease expired, message requeued"
                );
                self.ready.push_back(record);
            }
        }
        expired.len()
    }
}

/// In-memory broker.
///
/// # 使用例
/// ```ignore
/// let broker = Arc::new(InMemoryBroker::new().with_batch_size(16));
/// let worker = WorkerBuilder::new(broker.clone(), registry).build()?;
/// ```
pub struct InMemoryBroker {
    state: Mutex<InMemoryBrokerState>,
    notify: Notify,
    read_timeout: Duration,
    batch_size: usize,
    maintenance_interval: Duration,
    started: AtomicBool,
    closed: AtomicBool,
    acked_count: AtomicUsize,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(InMemoryBrokerState::default()),
            notify: Notify::new(),
            read_timeout: Duration::from_millis(100),
            batch_size: 10,
            maintenance_interval: Duration::from_secs(1),
            started: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            acked_count: AtomicUsize::new(0),
        }
    }

    /// How long `read()` waits for a message before returning an empty batch.
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Tick of the lease-expiry scan run by the maintenance task.
    pub fn with_maintenance_interval(mut self, interval: Duration) -> Self {
        self.maintenance_interval = interval;
        self
    }

    fn ensure_open(&self) -> Result<(), BrokerError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(BrokerError::Closed);
        }
        Ok(())
    }

    /// Ids acknowledged so far, in ack order.
    pub async fn acked(&self) -> Vec<TaskId> {
        self.state.lock().await.acked.clone()
    }

    pub fn acked_count(&self) -> usize {
        self.acked_count.load(Ordering::Acquire)
    }

    /// Messages handed out and not yet acknowledged.
    pub async fn pending_len(&self) -> usize {
        self.state.lock().await.pending.len()
    }

    pub async fn ready_len(&self) -> usize {
        self.state.lock().await.ready.len()
    }

    /// Ids passed to each `tasks_healthcheck` call, in call order.
    pub async fn healthchecks(&self) -> Vec<Vec<TaskId>> {
        self.state.lock().await.healthchecks.clone()
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Broker for InMemoryBroker {
    async fn start(&self) -> Result<(), BrokerError> {
        self.ensure_open()?;
        self.started.store(true, Ordering::Release);
        Ok(())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }

    async fn enqueue(&self, task: TaskRecord) -> Result<(), BrokerError> {
        self.ensure_open()?;
        self.state.lock().await.ready.push_back(task);
        self.notify.notify_one();
        Ok(())
    }

    async fn read(&self) -> Result<Vec<BrokerTask>, BrokerError> {
        let deadline = Instant::now() + self.read_timeout;
        loop {
            self.ensure_open()?;
            {
                let mut state = self.state.lock().await;
                if !state.ready.is_empty() {
                    let n = state.ready.len().min(self.batch_size);
                    let records: Vec<TaskRecord> = state.ready.drain(..n).collect();
                    let batch = records.into_iter().map(|r| state.deliver(r)).collect();
                    return Ok(batch);
                }
            }

            if tokio::time::timeout_at(deadline, self.notify.notified())
                .await
                .is_err()
            {
                return Ok(Vec::new());
            }
        }
    }

    async fn ack(&self, task: &BrokerTask) -> Result<(), BrokerError> {
        self.ensure_open()?;
        let mut state = self.state.lock().await;
        if state.pending.remove(&task.delivery).is_none() {
            return Err(BrokerError::UnknownDelivery(task.delivery.clone()));
        }
        state.acked.push(task.id());
        self.acked_count.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    async fn tasks_healthcheck(&self, tasks: &[BrokerTask]) -> Result<(), BrokerError> {
        self.ensure_open()?;
        let now = Instant::now();
        let mut state = self.state.lock().await;
        for task in tasks {
            // already acked deliveries are ignored
            if let Some(lease) = state.pending.get_mut(&task.delivery) {
                lease.renewed_at = now;
            }
        }
        state
            .healthchecks
            .push(tasks.iter().map(BrokerTask::id).collect());
        Ok(())
    }

    async fn run_worker_maintenance_tasks(
        &self,
        stop: CancellationToken,
        config: &Configuration,
    ) -> Result<(), BrokerError> {
        let timeout = config.task.timeout_interval;
        loop {
            tokio::select! {
                _ = stop.cancelled() => return Ok(()),
                _ = tokio::time::sleep(self.maintenance_interval) => {}
            }
            let reclaimed = self.state.lock().await.reclaim_expired(timeout);
            if reclaimed > 0 {
                tracing::info!(reclaimed, "requeued messages with expired leases");
                self.notify.notify_one();
            }
        }
    }
}
