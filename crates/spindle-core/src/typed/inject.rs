//! Dependency injection for task handlers.
//!
//! A handler declares what it wants injected with `Handler::INJECT`. The
//! plan is copied onto the `TaskDefinition` once, at registration time, and
//! resolved against the worker's shared values on every call.

use std::sync::Arc;

use crate::app::ExecutionContext;
use crate::domain::TaskError;

/// Kinds of values the worker can inject into a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Injectable {
    /// The worker-wide [`ExecutionContext`].
    ExecutionContext,
}

/// Values resolved from a definition's injection plan.
#[derive(Clone, Default)]
pub struct Dependencies {
    context: Option<Arc<ExecutionContext>>,
}

impl Dependencies {
    /// Resolve `plan` against the worker's shared values.
    ///
    /// The same `Arc` is handed out on every call; nothing is constructed
    /// per task.
    pub fn resolve(plan: &[Injectable], context: &Arc<ExecutionContext>) -> Self {
        let mut deps = Self::default();
        for injectable in plan {
            match injectable {
                Injectable::ExecutionContext => deps.context = Some(Arc::clone(context)),
            }
        }
        deps
    }

    /// The shared execution context, if the handler declared it.
    pub fn context(&self) -> Result<&Arc<ExecutionContext>, TaskError> {
        self.context.as_ref().ok_or_else(|| {
            TaskError::new("execution context was not declared in Handler::INJECT")
        })
    }

    pub fn is_empty(&self) -> bool {
        self.context.is_none()
    }
}

impl std::fmt::Debug for Dependencies {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dependencies")
            .field("context", &self.context.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    #[test]
    fn empty_plan_injects_nothing() {
        let ctx = testing::execution_context();
        let deps = Dependencies::resolve(&[], &ctx);

        assert!(deps.is_empty());
        assert!(deps.context().is_err());
    }

    #[test]
    fn context_is_the_shared_instance() {
        let ctx = testing::execution_context();
        let first = Dependencies::resolve(&[Injectable::ExecutionContext], &ctx);
        let second = Dependencies::resolve(&[Injectable::ExecutionContext], &ctx);

        assert!(Arc::ptr_eq(first.context().unwrap(), &ctx));
        assert!(Arc::ptr_eq(first.context().unwrap(), second.context().unwrap()));
    }
}
