//! Executor - dispatch channel から受け取ったタスクを 1 件ずつ実行する
//!
//! # フロー（1 件あたり）
//! 1. in-flight に claim（重複配送ならスキップ）
//! 2. TaskDefinition を引く（未登録なら ack せずスキップ）
//! 3. AckContext を開始
//! 4. 引数をデシリアライズし、依存を解決
//! 5. middleware stack 越しに handler を呼ぶ
//! 6. 成功なら commit、失敗なら abandon
//! 7. 失敗 → exception hooks / 成功 → 結果保存 → completion hooks
//! 8. claim を解放（`?` で抜けても guard の Drop で外れる）
//!
//! タスク自身の失敗は worker を止めません。hook と結果保存の失敗は止めます。

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{Mutex, mpsc};

use super::context::ExecutionContext;
use super::inflight::InFlightRegistry;
use crate::domain::BrokerTask;
use crate::error::{ExecutionError, WorkerError};
use crate::extensions::{Extensions, Invocation, MiddlewareStack};
use crate::ports::AckContext;
use crate::typed::{Dependencies, Serializers, TaskDefinition};

pub type SharedReceiver = Arc<Mutex<mpsc::Receiver<BrokerTask>>>;

/// Everything an executor needs; cloned once per executor.
#[derive(Clone)]
pub struct Executor {
    pub(crate) context: Arc<ExecutionContext>,
    pub(crate) serializers: Serializers,
    pub(crate) extensions: Extensions,
    pub(crate) inflight: InFlightRegistry,
}

impl Executor {
    /// Pull from `dispatch` until the channel is closed and drained.
    pub async fn run(self, id: usize, dispatch: SharedReceiver) -> Result<(), WorkerError> {
        tracing::debug!(executor = id, "executor started");
        loop {
            // the lock is held only while waiting for the next item
            let next = dispatch.lock().await.recv().await;
            let Some(task) = next else { break };
            self.process(&task).await?;
        }
        tracing::debug!(executor = id, "executor finished");
        Ok(())
    }

    /// Execute one message end to end.
    pub async fn process(&self, message: &BrokerTask) -> Result<(), WorkerError> {
        let record = &message.task;

        let Some(claim) = self.inflight.claim(message) else {
            tracing::warn!(
                task_id = %record.id,
                task_name = %record.task_name,
                "task is already executing, skipping duplicate delivery"
            );
            return Ok(());
        };

        let Some(definition) = self.context.tasks.get(record.task_name.as_str()) else {
            tracing::error!(
                task_id = %record.id,
                task_name = %record.task_name,
                "no task registered under this name, message left unacknowledged"
            );
            return Ok(());
        };

        let ack = AckContext::begin(self.context.broker.as_ref(), message);
        let outcome = match self.call(message, &definition).await {
            Ok(value) => match ack.commit().await {
                Ok(()) => Ok(value),
                Err(e) => Err(ExecutionError::Ack(e)),
            },
            Err(e) => {
                ack.abandon();
                Err(e)
            }
        };

        match outcome {
            Err(error) => {
                for hook in self.extensions.exception_hooks() {
                    hook.on_task_exception(record, &definition, &self.context, &error)
                        .await?;
                }
            }
            Ok(value) => {
                if let Some(results) = &self.context.result_backend {
                    results.set(record.id, &value).await?;
                }
                for hook in self.extensions.completion_hooks() {
                    hook.on_task_completion(record, &definition, &self.context, &value)
                        .await?;
                }
            }
        }
        drop(claim);
        Ok(())
    }

    async fn call(
        &self,
        message: &BrokerTask,
        definition: &TaskDefinition,
    ) -> Result<Value, ExecutionError> {
        let arguments = self.serializers.deserialize(definition, &message.task)?;
        let dependencies = Dependencies::resolve(definition.injections(), &self.context);

        MiddlewareStack::new(self.extensions.middlewares(), definition)
            .call(Invocation {
                record: &message.task,
                definition,
                context: &self.context,
                arguments,
                dependencies,
            })
            .await
    }
}
