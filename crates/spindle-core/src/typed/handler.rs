//! Handler trait - Task を実行する Handler の定義
//!
//! # 学習ポイント
//! - ジェネリック trait (Handler<T>)
//! - Object-safe trait (DynHandler)
//! - Type erasure パターン (TypedHandler<T, H> → DynHandler)

use std::marker::PhantomData;

use async_trait::async_trait;
use serde_json::Value;

use super::inject::{Dependencies, Injectable};
use super::task::Task;
use crate::domain::TaskError;
use crate::error::ExecutionError;
use crate::typed::codec::CodecError;

/// Handler は Task を実行して `T::Output` を返す
///
/// # 使用例
/// ```ignore
/// struct SendMailHandler;
///
/// #[async_trait]
/// impl Handler<SendMail> for SendMailHandler {
///     const INJECT: &'static [Injectable] = &[Injectable::ExecutionContext];
///
///     async fn handle(&self, task: SendMail, deps: Dependencies) -> Result<(), TaskError> {
///         let ctx = deps.context()?;
///         ...
///     }
/// }
/// ```
///
/// # ジェネリクスによる型安全性
/// - `Handler<SendMail>` は `SendMail` しか受け取れない
/// - コンパイル時に Task と Handler の対応が保証される
#[async_trait]
pub trait Handler<T: Task>: Send + Sync {
    /// Values the worker should inject on every call.
    const INJECT: &'static [Injectable] = &[];

    async fn handle(&self, task: T, deps: Dependencies) -> Result<T::Output, TaskError>;
}

/// DynHandler は object-safe な Handler の抽象化
///
/// TypedHandler<T, H> を DynHandler に変換することで、
/// HashMap<TaskName, Arc<TaskDefinition>> に格納可能にします。
#[async_trait]
pub trait DynHandler: Send + Sync {
    async fn call(&self, arguments: Value, deps: Dependencies) -> Result<Value, ExecutionError>;
}

pub struct TypedHandler<T: Task, H: Handler<T>> {
    handler: H,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Task, H: Handler<T>> TypedHandler<T, H> {
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<T: Task, H: Handler<T>> DynHandler for TypedHandler<T, H> {
    async fn call(&self, arguments: Value, deps: Dependencies) -> Result<Value, ExecutionError> {
        let task: T = serde_json::from_value(arguments).map_err(CodecError::from)?;
        let output = self.handler.handle(task, deps).await?;
        Ok(serde_json::to_value(output).map_err(CodecError::from)?)
    }
}
