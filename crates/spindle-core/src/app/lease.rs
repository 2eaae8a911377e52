//! Lease renewal - 実行中タスクの lease を定期的に延長する

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::inflight::InFlightRegistry;
use crate::ports::{Broker, BrokerError};

pub async fn run(
    broker: Arc<dyn Broker>,
    inflight: InFlightRegistry,
    interval: Duration,
    stop: CancellationToken,
) -> Result<(), BrokerError> {
    loop {
        let snapshot = inflight.snapshot();
        if !snapshot.is_empty() {
            tracing::trace!(count = snapshot.len(), "renewing leases");
            broker.tasks_healthcheck(&snapshot).await?;
        }

        tokio::select! {
            _ = stop.cancelled() => return Ok(()),
            _ = tokio::time::sleep(interval) => {}
        }
    }
}
