//! Wire records: what the broker hands to the worker.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{TaskId, TaskName};

/// One serialized argument, tagged with the id of the backend that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializedValue {
    pub backend: String,
    pub value: String,
}

impl SerializedValue {
    pub fn new(backend: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            backend: backend.into(),
            value: value.into(),
        }
    }
}

/// A decoded task message.
///
/// Design:
/// - Immutable once read from the broker (the worker only borrows it).
/// - `requeue_count` is maintained by the broker, not by the worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: TaskId,
    pub task_name: TaskName,

    /// How many times this message has been redelivered.
    pub requeue_count: u32,

    pub enqueue_time: DateTime<Utc>,

    /// Positional arguments, bound to the definition's declared params in order.
    #[serde(default)]
    pub args: Vec<SerializedValue>,

    /// Keyword arguments.
    #[serde(default)]
    pub kwargs: BTreeMap<String, SerializedValue>,
}

impl TaskRecord {
    pub fn new(id: TaskId, task_name: TaskName, enqueue_time: DateTime<Utc>) -> Self {
        Self {
            id,
            task_name,
            requeue_count: 0,
            enqueue_time,
            args: Vec::new(),
            kwargs: BTreeMap::new(),
        }
    }

    pub fn with_args(mut self, args: Vec<SerializedValue>) -> Self {
        self.args = args;
        self
    }

    pub fn with_kwargs(mut self, kwargs: BTreeMap<String, SerializedValue>) -> Self {
        self.kwargs = kwargs;
        self
    }

    pub fn with_requeue_count(mut self, requeue_count: u32) -> Self {
        self.requeue_count = requeue_count;
        self
    }
}

/// Opaque broker-owned delivery token (lease / ack handle).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeliveryTag(String);

impl DeliveryTag {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeliveryTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A `TaskRecord` plus the delivery metadata of the broker that handed it out.
///
/// The worker owns this from claim until ack (or abandonment); the broker
/// keeps only the `DeliveryTag`.
#[derive(Debug, Clone, PartialEq)]
pub struct BrokerTask {
    pub task: TaskRecord,
    pub delivery: DeliveryTag,
}

impl BrokerTask {
    pub fn new(task: TaskRecord, delivery: DeliveryTag) -> Self {
        Self { task, delivery }
    }

    pub fn id(&self) -> TaskId {
        self.task.id
    }
}
