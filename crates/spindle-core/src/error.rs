//! Error types used by the worker engine.
//!
//! - [`ExecutionError`] : a single task failed. Reported to on-exception
//!   hooks; never stops the worker.
//! - [`ExtensionError`] : a hook raised. Not caught by the pipeline.
//! - [`WorkerError`] : the worker itself cannot continue.

use std::error::Error;

use thiserror::Error;

use crate::domain::TaskError;
use crate::ports::{BrokerError, ResultError};
use crate::typed::CodecError;

/// Failure of one task execution.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("argument decoding failed: {0}")]
    Decode(#[from] CodecError),

    #[error("task failed: {0}")]
    Task(#[from] TaskError),

    #[error("acknowledgment failed: {0}")]
    Ack(#[source] BrokerError),

    /// Raised by an on-execution extension rather than by the task body.
    #[error("middleware failed: {0}")]
    Middleware(String),
}

impl ExecutionError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            ExecutionError::Decode(_) => "task_decode",
            ExecutionError::Task(_) => "task_failed",
            ExecutionError::Ack(_) => "task_ack",
            ExecutionError::Middleware(_) => "task_middleware",
        }
    }
}

/// Error raised by an extension hook.
#[derive(Debug, Error)]
#[error("extension '{extension}' failed: {source}")]
pub struct ExtensionError {
    pub extension: String,
    #[source]
    pub source: Box<dyn Error + Send + Sync + 'static>,
}

impl ExtensionError {
    pub fn new(
        extension: impl Into<String>,
        source: impl Into<Box<dyn Error + Send + Sync + 'static>>,
    ) -> Self {
        Self {
            extension: extension.into(),
            source: source.into(),
        }
    }
}

/// Fatal worker errors. Any of these stops the whole worker.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum WorkerError {
    /// The broker connection is unhealthy (intake, lease renewal or maintenance).
    #[error("broker failure: {0}")]
    Broker(#[from] BrokerError),

    #[error("storing a task result failed: {0}")]
    ResultBackend(#[from] ResultError),

    #[error(transparent)]
    Extension(#[from] ExtensionError),

    /// A tracked background task panicked.
    #[error("background task '{name}' panicked: {message}")]
    Panicked { name: String, message: String },
}

impl WorkerError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            WorkerError::Broker(_) => "worker_broker",
            WorkerError::ResultBackend(_) => "worker_result_backend",
            WorkerError::Extension(_) => "worker_extension",
            WorkerError::Panicked { .. } => "worker_panicked",
        }
    }
}
