//! ExecutionContext - worker 全体で共有する読み取り専用の値
//!
//! worker 起動時に一度だけ構築し、`Arc<ExecutionContext>` として
//! executor / hook / middleware / handler（注入時）に渡します。

use std::sync::Arc;

use super::publisher::Publisher;
use crate::config::Configuration;
use crate::ports::{Broker, ResultBackend};
use crate::typed::TaskRegistry;

pub struct ExecutionContext {
    pub configuration: Arc<Configuration>,
    pub broker: Arc<dyn Broker>,
    pub publisher: Publisher,
    pub result_backend: Option<Arc<dyn ResultBackend>>,
    pub tasks: Arc<TaskRegistry>,
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("configuration", &self.configuration)
            .field("result_backend", &self.result_backend.is_some())
            .field("tasks", &self.tasks.names())
            .finish_non_exhaustive()
    }
}
