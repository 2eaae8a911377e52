//! Intake loop - broker から読み、dispatch channel に流す
//!
//! # フロー
//! 1. `broker.read()` を stop と競合させる
//! 2. 配送回数を使い切ったメッセージは ack して捨てる（実行しない）
//! 3. それ以外は channel に送る（満杯なら待つ = backpressure）
//!
//! loop を抜けると sender が drop され、channel が閉じます。

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::domain::BrokerTask;
use crate::ports::{Broker, BrokerError};

pub async fn run(
    broker: Arc<dyn Broker>,
    dispatch: mpsc::Sender<BrokerTask>,
    stop: CancellationToken,
    max_delivery_attempts: u32,
) -> Result<(), BrokerError> {
    loop {
        let batch = tokio::select! {
            biased;
            _ = stop.cancelled() => break,
            batch = broker.read() => batch?,
        };

        for message in batch {
            if message.task.requeue_count >= max_delivery_attempts {
                tracing::warn!(
                    task_id = %message.id(),
                    task_name = %message.task.task_name,
                    requeue_count = message.task.requeue_count,
                    max_delivery_attempts,
                    "delivery attempts exhausted, dropping message"
                );
                broker.ack(&message).await?;
                continue;
            }

            let task_id = message.id();
            tokio::select! {
                biased;
                _ = stop.cancelled() => {
                    tracing::debug!(%task_id, "stopping, message left for redelivery");
                    return Ok(());
                }
                sent = dispatch.send(message) => {
                    if sent.is_err() {
                        // every executor is gone
                        return Ok(());
                    }
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{TaskId, TaskName, TaskRecord};
    use crate::impls::InMemoryBroker;
    use chrono::Utc;
    use std::time::Duration;
    use ulid::Ulid;

    fn record(requeue_count: u32) -> TaskRecord {
        TaskRecord::new(
            TaskId::from_ulid(Ulid::new()),
            TaskName::new("test-task"),
            Utc::now(),
        )
        .with_requeue_count(requeue_count)
    }

    #[tokio::test]
    async fn exhausted_messages_are_acked_not_dispatched() {
        let broker = Arc::new(InMemoryBroker::new());
        let exhausted = record(3);
        let fresh = record(2);
        broker.enqueue(exhausted.clone()).await.unwrap();
        broker.enqueue(fresh.clone()).await.unwrap();

        let (tx, mut rx) = mpsc::channel(4);
        let stop = CancellationToken::new();
        let handle = tokio::spawn(run(broker.clone(), tx, stop.clone(), 3));

        let got = rx.recv().await.unwrap();
        assert_eq!(got.id(), fresh.id);

        stop.cancel();
        handle.await.unwrap().unwrap();
        assert_eq!(broker.acked().await, vec![exhausted.id]);
        // channel closed once intake returned
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn full_channel_blocks_without_error() {
        let broker = Arc::new(InMemoryBroker::new());
        for _ in 0..5 {
            broker.enqueue(record(0)).await.unwrap();
        }

        let (tx, rx) = mpsc::channel(2);
        let stop = CancellationToken::new();
        let handle = tokio::spawn(run(broker.clone(), tx, stop.clone(), 3));

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!handle.is_finished());
        assert_eq!(rx.len(), 2);

        stop.cancel();
        handle.await.unwrap().unwrap();
        assert_eq!(rx.len(), 2);
    }

    #[tokio::test]
    async fn stop_during_a_blocked_send_leaves_the_message_unacked() {
        let broker = Arc::new(InMemoryBroker::new());
        let first = record(0);
        let blocked = record(0);
        broker.enqueue(first.clone()).await.unwrap();
        broker.enqueue(blocked.clone()).await.unwrap();

        let (tx, mut rx) = mpsc::channel(1);
        let stop = CancellationToken::new();
        let handle = tokio::spawn(run(broker.clone(), tx, stop.clone(), 3));

        // the second message waits for room in the channel
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!handle.is_finished());

        stop.cancel();
        handle.await.unwrap().unwrap();

        assert_eq!(rx.recv().await.unwrap().id(), first.id);
        assert!(rx.recv().await.is_none());
        assert!(broker.acked().await.is_empty());
        assert_eq!(broker.pending_len().await, 2);
    }

    #[tokio::test]
    async fn stop_interrupts_a_waiting_read() {
        let broker = Arc::new(InMemoryBroker::new().with_read_timeout(Duration::from_secs(60)));
        let (tx, _rx) = mpsc::channel(1);
        let stop = CancellationToken::new();
        let handle = tokio::spawn(run(broker, tx, stop.clone(), 3));

        stop.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn read_failure_is_returned() {
        let broker = Arc::new(InMemoryBroker::new());
        broker.close().await;
        let (tx, _rx) = mpsc::channel(1);

        let err = run(broker, tx, CancellationToken::new(), 3).await.unwrap_err();
        assert!(matches!(err, BrokerError::Closed));
    }
}
