//! Extensions - worker の振る舞いを外側から拡張する
//!
//! 1 つの extension は次の capability を任意に組み合わせて持ちます。
//! - **OnTaskException**: タスク失敗時の hook
//! - **OnTaskCompletion**: タスク成功時の hook
//! - **OnTaskExecution**: タスク呼び出しを包む middleware
//!
//! capability の振り分けは起動時に一度だけ行い (`Extensions::from_list`)、
//! 実行中は振り分け済みのリストだけを参照します。

pub mod hooks;
pub mod log;
pub mod middleware;

use std::sync::Arc;

pub use self::hooks::{OnTaskCompletion, OnTaskException};
pub use self::log::LogExtension;
pub use self::middleware::{Invocation, MiddlewareStack, Next, OnTaskExecution};

/// A worker extension.
///
/// Implement the capability traits you need and override the matching
/// accessor to return `Some(self)`:
///
/// ```ignore
/// impl Extension for Audit {
///     fn name(&self) -> &str { "audit" }
///     fn as_exception_hook(self: Arc<Self>) -> Option<Arc<dyn OnTaskException>> {
///         Some(self)
///     }
/// }
/// ```
pub trait Extension: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn as_exception_hook(self: Arc<Self>) -> Option<Arc<dyn OnTaskException>> {
        None
    }

    fn as_completion_hook(self: Arc<Self>) -> Option<Arc<dyn OnTaskCompletion>> {
        None
    }

    fn as_execution_middleware(self: Arc<Self>) -> Option<Arc<dyn OnTaskExecution>> {
        None
    }
}

/// Extensions split by capability, each list in registration order.
#[derive(Clone, Default)]
pub struct Extensions {
    exception_hooks: Vec<Arc<dyn OnTaskException>>,
    completion_hooks: Vec<Arc<dyn OnTaskCompletion>>,
    middlewares: Vec<Arc<dyn OnTaskExecution>>,
}

impl Extensions {
    pub fn from_list(extensions: &[Arc<dyn Extension>]) -> Self {
        let mut out = Self::default();
        for ext in extensions {
            if let Some(hook) = Arc::clone(ext).as_exception_hook() {
                out.exception_hooks.push(hook);
            }
            if let Some(hook) = Arc::clone(ext).as_completion_hook() {
                out.completion_hooks.push(hook);
            }
            if let Some(mw) = Arc::clone(ext).as_execution_middleware() {
                out.middlewares.push(mw);
            }
        }
        out
    }

    pub fn exception_hooks(&self) -> &[Arc<dyn OnTaskException>] {
        &self.exception_hooks
    }

    pub fn completion_hooks(&self) -> &[Arc<dyn OnTaskCompletion>] {
        &self.completion_hooks
    }

    pub fn middlewares(&self) -> &[Arc<dyn OnTaskExecution>] {
        &self.middlewares
    }
}

impl std::fmt::Debug for Extensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Extensions")
            .field("exception_hooks", &self.exception_hooks.len())
            .field("completion_hooks", &self.completion_hooks.len())
            .field("middlewares", &self.middlewares.len())
            .finish()
    }
}
