//! Test fixtures shared by the unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::app::{ExecutionContext, Publisher};
use crate::config::Configuration;
use crate::domain::{TaskError, TaskId, TaskRecord};
use crate::error::{ExecutionError, ExtensionError};
use crate::extensions::{Extension, OnTaskCompletion, OnTaskException};
use crate::impls::{InMemoryBroker, InMemoryResultBackend};
use crate::ports::{ResultBackend, SystemClock, UlidGenerator};
use crate::typed::{Dependencies, Handler, Injectable, NoArgs, Serializers, Task, TaskDefinition, TaskRegistry};

pub const FAILING_TASK: &str = "always.fails";

#[derive(Debug, Serialize, Deserialize)]
pub struct NoopTask(pub NoArgs);

impl Task for NoopTask {
    const NAME: &'static str = "test-task";
    type Output = ();
}

pub struct Noop;

#[async_trait]
impl Handler<NoopTask> for Noop {
    async fn handle(&self, _task: NoopTask, _deps: Dependencies) -> Result<(), TaskError> {
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ParamsTask {
    pub a: i64,
    pub b: String,
}

impl Task for ParamsTask {
    const NAME: &'static str = "task-with-params";
    const PARAMS: &'static [&'static str] = &["a", "b"];
    type Output = String;
}

pub struct ParamsEcho;

#[async_trait]
impl Handler<ParamsTask> for ParamsEcho {
    async fn handle(&self, task: ParamsTask, _deps: Dependencies) -> Result<String, TaskError> {
        Ok(format!("{}:{}", task.a, task.b))
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AddTask {
    pub a: i64,
    pub b: i64,
}

impl Task for AddTask {
    const NAME: &'static str = "math.add";
    const PARAMS: &'static [&'static str] = &["a", "b"];
    type Output = i64;
}

pub struct Adder;

#[async_trait]
impl Handler<AddTask> for Adder {
    async fn handle(&self, task: AddTask, _deps: Dependencies) -> Result<i64, TaskError> {
        Ok(task.a + task.b)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ContextTask {}

impl Task for ContextTask {
    const NAME: &'static str = "context.inspect";
    type Output = ();
}

/// Keeps every injected context so tests can compare identities.
#[derive(Default, Clone)]
pub struct ContextInspector {
    pub seen: Arc<Mutex<Vec<Arc<ExecutionContext>>>>,
}

#[async_trait]
impl Handler<ContextTask> for ContextInspector {
    const INJECT: &'static [Injectable] = &[Injectable::ExecutionContext];

    async fn handle(&self, _task: ContextTask, deps: Dependencies) -> Result<(), TaskError> {
        let ctx = deps.context()?;
        self.seen.lock().unwrap().push(Arc::clone(ctx));
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FailingTask {}

impl Task for FailingTask {
    const NAME: &'static str = FAILING_TASK;
    type Output = ();
}

pub struct Failing;

#[async_trait]
impl Handler<FailingTask> for Failing {
    async fn handle(&self, _task: FailingTask, _deps: Dependencies) -> Result<(), TaskError> {
        Err(TaskError::new("this task always fails"))
    }
}

/// Fails the first `failures` calls made to the same handler instance.
#[derive(Debug, Serialize, Deserialize)]
pub struct FlakyTask {
    pub failures: usize,
}

impl Task for FlakyTask {
    const NAME: &'static str = "flaky";
    type Output = String;
}

#[derive(Default)]
pub struct Flaky {
    calls: AtomicUsize,
}

#[async_trait]
impl Handler<FlakyTask> for Flaky {
    async fn handle(&self, task: FlakyTask, _deps: Dependencies) -> Result<String, TaskError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < task.failures {
            return Err(TaskError::new(format!("flaky failure #{}", call + 1)));
        }
        Ok("ok".to_string())
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SleepTask {
    pub millis: u64,
}

impl Task for SleepTask {
    const NAME: &'static str = "sleep";
    type Output = ();
}

pub struct Sleeper;

#[async_trait]
impl Handler<SleepTask> for Sleeper {
    async fn handle(&self, task: SleepTask, _deps: Dependencies) -> Result<(), TaskError> {
        tokio::time::sleep(Duration::from_millis(task.millis)).await;
        Ok(())
    }
}

/// A registry with every fixture task.
pub fn registry() -> TaskRegistry {
    let mut registry = TaskRegistry::new();
    registry.register::<NoopTask, _>(Noop).unwrap();
    registry.register::<ParamsTask, _>(ParamsEcho).unwrap();
    registry.register::<AddTask, _>(Adder).unwrap();
    registry
        .register::<ContextTask, _>(ContextInspector::default())
        .unwrap();
    registry.register::<FailingTask, _>(Failing).unwrap();
    registry.register::<FlakyTask, _>(Flaky::default()).unwrap();
    registry.register::<SleepTask, _>(Sleeper).unwrap();
    registry
}

pub fn context_with(
    broker: Arc<InMemoryBroker>,
    results: Option<Arc<InMemoryResultBackend>>,
) -> Arc<ExecutionContext> {
    let publisher = Publisher::new(
        broker.clone(),
        Serializers::json(),
        Arc::new(UlidGenerator::new(SystemClock)),
        Arc::new(SystemClock),
    );
    Arc::new(ExecutionContext {
        configuration: Arc::new(Configuration::default()),
        broker,
        publisher,
        result_backend: results.map(|r| r as Arc<dyn ResultBackend>),
        tasks: Arc::new(registry()),
    })
}

pub fn execution_context() -> Arc<ExecutionContext> {
    context_with(Arc::new(InMemoryBroker::new()), None)
}

/// Records every hook invocation.
#[derive(Default)]
pub struct Recorder {
    completions: Mutex<Vec<(TaskId, Value)>>,
    exceptions: Mutex<Vec<(TaskId, &'static str)>>,
}

impl Recorder {
    pub fn completions(&self) -> Vec<(TaskId, Value)> {
        self.completions.lock().unwrap().clone()
    }

    /// `(task id, error label)` pairs.
    pub fn exceptions(&self) -> Vec<(TaskId, &'static str)> {
        self.exceptions.lock().unwrap().clone()
    }
}

impl Extension for Recorder {
    fn name(&self) -> &str {
        "recorder"
    }

    fn as_exception_hook(self: Arc<Self>) -> Option<Arc<dyn OnTaskException>> {
        Some(self)
    }

    fn as_completion_hook(self: Arc<Self>) -> Option<Arc<dyn OnTaskCompletion>> {
        Some(self)
    }
}

#[async_trait]
impl OnTaskException for Recorder {
    async fn on_task_exception(
        &self,
        task: &TaskRecord,
        _definition: &TaskDefinition,
        _context: &ExecutionContext,
        error: &ExecutionError,
    ) -> Result<(), ExtensionError> {
        self.exceptions.lock().unwrap().push((task.id, error.as_label()));
        Ok(())
    }
}

#[async_trait]
impl OnTaskCompletion for Recorder {
    async fn on_task_completion(
        &self,
        task: &TaskRecord,
        _definition: &TaskDefinition,
        _context: &ExecutionContext,
        result: &Value,
    ) -> Result<(), ExtensionError> {
        self.completions.lock().unwrap().push((task.id, result.clone()));
        Ok(())
    }
}

/// A completion hook that always fails.
pub struct BrokenHook;

impl Extension for BrokenHook {
    fn name(&self) -> &str {
        "broken"
    }

    fn as_completion_hook(self: Arc<Self>) -> Option<Arc<dyn OnTaskCompletion>> {
        Some(self)
    }
}

#[async_trait]
impl OnTaskCompletion for BrokenHook {
    async fn on_task_completion(
        &self,
        _task: &TaskRecord,
        _definition: &TaskDefinition,
        _context: &ExecutionContext,
        _result: &Value,
    ) -> Result<(), ExtensionError> {
        Err(ExtensionError::new("broken", "hook exploded"))
    }
}
