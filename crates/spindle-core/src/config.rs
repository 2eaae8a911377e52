//! # Worker configuration.
//!
//! [`Configuration`] is the settings surface consumed by the worker engine and
//! by broker maintenance tasks. It is plain data (serde-friendly); extensions
//! are not part of it and are handed to the builder instead.
//!
//! ## Sentinel values
//! - `worker.dispatch_capacity = 0` → same as `worker.concurrency`

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Task lifecycle settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskConfiguration {
    /// A message whose `requeue_count` reaches this value is acknowledged
    /// without being executed.
    pub max_delivery_attempts: u32,

    /// Maximum time to wait for in-flight work when stopping, before the
    /// remaining executors are cancelled.
    pub shutdown_deadline: Duration,

    /// Period of the lease-renewal loop.
    pub healthcheck_interval: Duration,

    /// Lease length a broker grants to a delivered message. Consumed by
    /// broker maintenance (reclaiming abandoned messages), not by the worker.
    pub timeout_interval: Duration,
}

impl Default for TaskConfiguration {
    fn default() -> Self {
        Self {
            max_delivery_attempts: 3,
            shutdown_deadline: Duration::from_secs(10),
            healthcheck_interval: Duration::from_secs(5),
            timeout_interval: Duration::from_secs(60),
        }
    }
}

/// Executor pool settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfiguration {
    /// Number of concurrent executors.
    pub concurrency: usize,

    /// Bound of the dispatch channel (`0` = same as `concurrency`).
    pub dispatch_capacity: usize,

    /// Install SIGINT/SIGTERM handlers that stop the worker.
    pub handle_signals: bool,
}

impl Default for WorkerConfiguration {
    fn default() -> Self {
        Self {
            concurrency: 4,
            dispatch_capacity: 0,
            handle_signals: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerializationConfiguration {
    /// Backend id used by the publisher to encode arguments.
    pub default_backend: String,
}

impl Default for SerializationConfiguration {
    fn default() -> Self {
        Self {
            default_backend: crate::typed::codec::JSON_BACKEND_ID.to_string(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    pub task: TaskConfiguration,
    pub worker: WorkerConfiguration,
    pub serialization: SerializationConfiguration,
}

impl Configuration {
    /// Dispatch channel bound, with the `0` sentinel resolved and clamped to ≥ 1.
    #[inline]
    pub fn dispatch_capacity(&self) -> usize {
        match self.worker.dispatch_capacity {
            0 => self.worker.concurrency.max(1),
            n => n,
        }
    }
}
