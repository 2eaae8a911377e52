//! spindle-core
//!
//! Worker engine of a distributed task queue: pulls task messages from a
//! broker, runs them on a bounded pool of executors, renews leases for
//! in-flight work, acknowledges on success and shuts down within a deadline.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（TaskId, TaskName, TaskRecord, BrokerTask, TaskError）
//! - **ports**: 抽象化レイヤー（Broker, ResultBackend, Clock, IdGenerator）
//! - **typed**: 型付き Task API（Task, Handler, TaskRegistry, Serializers）
//! - **extensions**: hook と middleware
//! - **app**: worker エンジン（builder, intake, executor, lease, shutdown）
//! - **impls**: 実装（InMemoryBroker など開発用）
//! - **config**: 設定
//! - **error**: worker / 実行時のエラー型

pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod extensions;
pub mod impls;
pub mod ports;
pub mod typed;

#[cfg(test)]
pub(crate) mod testing;

pub use crate::app::{BuildError, ExecutionContext, PublishError, Publisher, Worker, WorkerBuilder};
pub use crate::config::Configuration;
pub use crate::domain::{TaskError, TaskId, TaskName, TaskRecord};
pub use crate::error::{ExecutionError, ExtensionError, WorkerError};
pub use crate::extensions::{Extension, LogExtension};
pub use crate::typed::{Dependencies, Handler, Injectable, NoArgs, Task, TaskRegistry};
