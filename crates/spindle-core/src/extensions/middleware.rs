//! Middleware stack around the task call.
//!
//! ```text
//! ext[0] ──► ext[1] ──► ... ──► ext[n-1] ──► task fn
//!   └────────── each wraps everything to its right ──────────┘
//! ```
//!
//! `Next` is `Copy`, so an extension may call it more than once (retries).

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::app::ExecutionContext;
use crate::domain::TaskRecord;
use crate::error::ExecutionError;
use crate::typed::{Dependencies, DynHandler, TaskDefinition};

pub type CallFuture<'a> = Pin<Box<dyn Future<Output = Result<Value, ExecutionError>> + Send + 'a>>;

/// One resolved call: decoded arguments and injected dependencies, plus
/// read-only views of the record, its definition and the shared context.
#[derive(Clone)]
pub struct Invocation<'a> {
    pub record: &'a TaskRecord,
    pub definition: &'a TaskDefinition,
    pub context: &'a Arc<ExecutionContext>,
    pub arguments: Value,
    pub dependencies: Dependencies,
}

#[async_trait]
pub trait OnTaskExecution: Send + Sync {
    async fn on_task_execution(
        &self,
        invocation: Invocation<'_>,
        next: Next<'_>,
    ) -> Result<Value, ExecutionError>;
}

/// The rest of the chain, as seen from one extension.
#[derive(Clone, Copy)]
pub struct Next<'a> {
    middlewares: &'a [Arc<dyn OnTaskExecution>],
    handler: &'a dyn DynHandler,
}

impl<'a> Next<'a> {
    pub fn run(self, invocation: Invocation<'a>) -> CallFuture<'a> {
        Box::pin(async move {
            match self.middlewares.split_first() {
                Some((first, rest)) => {
                    let next = Next {
                        middlewares: rest,
                        handler: self.handler,
                    };
                    first.on_task_execution(invocation, next).await
                }
                None => {
                    self.handler
                        .call(invocation.arguments, invocation.dependencies)
                        .await
                }
            }
        })
    }
}

/// Ordered on-execution extensions bound to one definition's handler.
pub struct MiddlewareStack<'a> {
    middlewares: &'a [Arc<dyn OnTaskExecution>],
    definition: &'a TaskDefinition,
}

impl<'a> MiddlewareStack<'a> {
    pub fn new(middlewares: &'a [Arc<dyn OnTaskExecution>], definition: &'a TaskDefinition) -> Self {
        Self {
            middlewares,
            definition,
        }
    }

    /// Run the whole chain. With no middlewares this is a direct call.
    pub async fn call(&self, invocation: Invocation<'a>) -> Result<Value, ExecutionError> {
        let next = Next {
            middlewares: self.middlewares,
            handler: self.definition.handler().as_ref(),
        };
        next.run(invocation).await
    }
}
