//! WorkerBuilder - worker の構築とワイヤリング
//!
//! # 学習ポイント
//! - Builder パターンの実装
//! - 起動時検証（Fail-fast 設計）
//! - 開発体験の改善（明確なエラーメッセージ）

use std::sync::Arc;

use super::context::ExecutionContext;
use super::executor::Executor;
use super::inflight::InFlightRegistry;
use super::publisher::Publisher;
use super::worker::Worker;
use crate::config::Configuration;
use crate::extensions::{Extension, Extensions};
use crate::ports::{Broker, Clock, IdGenerator, ResultBackend, SystemClock, UlidGenerator};
use crate::typed::{Handler, RegistryError, SerializationBackend, Serializers, Task, TaskRegistry};

/// WorkerBuilder は Worker を構築
///
/// # 使用例
/// ```ignore
/// let worker = WorkerBuilder::new(broker, registry)
///     .configuration(cfg)
///     .result_backend(results)
///     .extension(Arc::new(LogExtension::new()))
///     .expect_tasks(&["mail.send"])
///     .build()?;
/// ```
///
/// # Fail-fast 設計
/// - build() 時に設定値と「期待集合 ⊆ 登録済み集合」をチェック
/// - 不足があれば BuildError を返す
pub struct WorkerBuilder {
    broker: Arc<dyn Broker>,
    registry: TaskRegistry,
    configuration: Configuration,
    result_backend: Option<Arc<dyn ResultBackend>>,
    extensions: Vec<Arc<dyn Extension>>,
    serializers: Serializers,
    clock: Arc<dyn Clock>,
    ids: Option<Arc<dyn IdGenerator>>,
    expected_tasks: Option<Vec<String>>,
}

/// BuildError は worker 構築時のエラー
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum BuildError {
    #[error("worker.concurrency must be at least 1")]
    ZeroConcurrency,

    #[error("task.max_delivery_attempts must be at least 1")]
    ZeroDeliveryAttempts,

    #[error("serialization backend '{0}' is not registered")]
    UnknownSerializationBackend(String),

    #[error("Missing task types: {0:?}. These tasks were expected but not registered.")]
    MissingTaskTypes(Vec<String>),
}

impl WorkerBuilder {
    pub fn new(broker: Arc<dyn Broker>, registry: TaskRegistry) -> Self {
        Self {
            broker,
            registry,
            configuration: Configuration::default(),
            result_backend: None,
            extensions: Vec::new(),
            serializers: Serializers::json(),
            clock: Arc::new(SystemClock),
            ids: None,
            expected_tasks: None,
        }
    }

    /// Handler を追加登録
    pub fn register<T: Task, H: Handler<T> + 'static>(
        mut self,
        handler: H,
    ) -> Result<Self, RegistryError> {
        self.registry.register::<T, H>(handler)?;
        Ok(self)
    }

    pub fn configuration(mut self, configuration: Configuration) -> Self {
        self.configuration = configuration;
        self
    }

    pub fn result_backend(mut self, backend: Arc<dyn ResultBackend>) -> Self {
        self.result_backend = Some(backend);
        self
    }

    /// Extensions run in the order they are added.
    pub fn extension(mut self, extension: Arc<dyn Extension>) -> Self {
        self.extensions.push(extension);
        self
    }

    pub fn serialization_backend(mut self, backend: Arc<dyn SerializationBackend>) -> Self {
        self.serializers = self.serializers.with_backend(backend);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Defaults to a ULID generator driven by the configured clock.
    pub fn id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    /// 期待される task 名のリストを設定
    pub fn expect_tasks(mut self, names: &[&str]) -> Self {
        self.expected_tasks = Some(names.iter().map(|n| n.to_string()).collect());
        self
    }

    /// # 検証
    /// - concurrency / max_delivery_attempts が 0 でないこと
    /// - 既定の serialization backend が登録済みであること
    /// - expect_tasks() の task が全て登録されていること
    pub fn build(self) -> Result<Worker, BuildError> {
        let cfg = self.configuration;
        if cfg.worker.concurrency == 0 {
            return Err(BuildError::ZeroConcurrency);
        }
        if cfg.task.max_delivery_attempts == 0 {
            return Err(BuildError::ZeroDeliveryAttempts);
        }
        let default_backend = cfg.serialization.default_backend.clone();
        if !self.serializers.contains(&default_backend) {
            return Err(BuildError::UnknownSerializationBackend(default_backend));
        }
        if let Some(expected) = &self.expected_tasks {
            let missing: Vec<String> = expected
                .iter()
                .filter(|name| !self.registry.contains(name))
                .cloned()
                .collect();
            if !missing.is_empty() {
                return Err(BuildError::MissingTaskTypes(missing));
            }
        }

        let serializers = self.serializers.with_default(default_backend);
        let ids = self
            .ids
            .unwrap_or_else(|| Arc::new(UlidGenerator::new(Arc::clone(&self.clock))) as Arc<dyn IdGenerator>);
        let publisher = Publisher::new(
            Arc::clone(&self.broker),
            serializers.clone(),
            ids,
            self.clock,
        );

        let context = Arc::new(ExecutionContext {
            configuration: Arc::new(cfg),
            broker: self.broker,
            publisher,
            result_backend: self.result_backend,
            tasks: Arc::new(self.registry),
        });

        Ok(Worker::new(Executor {
            context,
            serializers,
            extensions: Extensions::from_list(&self.extensions),
            inflight: InFlightRegistry::new(),
        }))
    }
}
