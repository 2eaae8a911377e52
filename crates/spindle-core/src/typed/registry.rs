//! TaskRegistry - タスク定義の登録と管理
//!
//! # 学習ポイント
//! - HashMap での型消去された trait object の管理
//! - Generic methods での登録と型安全性
//! - Arc による共有所有権
//!
//! 起動時に可変で構築し、worker 実行中は読み取り専用で共有します。

use std::collections::HashMap;
use std::sync::Arc;

use super::handler::{DynHandler, Handler, TypedHandler};
use super::inject::Injectable;
use super::task::Task;
use crate::domain::TaskName;

/// One registered task: its name, declared signature and handler.
///
/// The injection plan is captured at registration and never recomputed.
pub struct TaskDefinition {
    name: TaskName,
    params: &'static [&'static str],
    injections: Vec<Injectable>,
    handler: Arc<dyn DynHandler>,
}

impl TaskDefinition {
    fn of<T: Task, H: Handler<T> + 'static>(handler: H) -> Self {
        Self {
            name: TaskName::new(T::NAME),
            params: T::PARAMS,
            injections: H::INJECT.to_vec(),
            handler: Arc::new(TypedHandler::<T, H>::new(handler)),
        }
    }

    pub fn name(&self) -> &TaskName {
        &self.name
    }

    pub fn params(&self) -> &'static [&'static str] {
        self.params
    }

    pub fn injections(&self) -> &[Injectable] {
        &self.injections
    }

    pub fn handler(&self) -> &Arc<dyn DynHandler> {
        &self.handler
    }
}

impl std::fmt::Debug for TaskDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskDefinition")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("injections", &self.injections)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Handler for task '{0}' is already registered")]
    AlreadyRegistered(String),
}

/// TaskRegistry は task 名 → TaskDefinition の対応表
///
/// # 使用例
/// ```ignore
/// let mut registry = TaskRegistry::new();
/// registry.register::<SendMail, _>(SendMailHandler)?;
///
/// let definition = registry.get("mail.send");
/// ```
#[derive(Default)]
pub struct TaskRegistry {
    tasks: HashMap<String, Arc<TaskDefinition>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self {
            tasks: HashMap::new(),
        }
    }

    pub fn register<T: Task, H: Handler<T> + 'static>(
        &mut self,
        handler: H,
    ) -> Result<(), RegistryError> {
        let name = T::NAME.to_string();
        if self.tasks.contains_key(&name) {
            return Err(RegistryError::AlreadyRegistered(name));
        }
        self.tasks
            .insert(name, Arc::new(TaskDefinition::of::<T, H>(handler)));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<TaskDefinition>> {
        self.tasks.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tasks.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tasks.keys().cloned().collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{AddTask, Adder, ContextInspector, ContextTask, NoopTask, Noop};

    #[test]
    fn test_register_and_get() {
        let mut registry = TaskRegistry::new();
        registry.register::<NoopTask, _>(Noop).unwrap();

        let definition = registry.get(NoopTask::NAME).unwrap();
        assert_eq!(definition.name().as_str(), "test-task");
        assert!(definition.params().is_empty());
        assert!(registry.contains(NoopTask::NAME));
    }

    #[test]
    fn test_double_registration() {
        let mut registry = TaskRegistry::new();
        registry.register::<NoopTask, _>(Noop).unwrap();
        let result = registry.register::<NoopTask, _>(Noop);
        assert!(matches!(result, Err(RegistryError::AlreadyRegistered(name)) if name == "test-task"));
    }

    #[test]
    fn test_names_are_sorted() {
        let mut registry = TaskRegistry::new();
        registry.register::<NoopTask, _>(Noop).unwrap();
        registry.register::<AddTask, _>(Adder).unwrap();

        assert_eq!(registry.names(), vec!["math.add".to_string(), "test-task".to_string()]);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn injection_plan_is_captured_at_registration() {
        let mut registry = TaskRegistry::new();
        registry.register::<NoopTask, _>(Noop).unwrap();
        registry
            .register::<ContextTask, _>(ContextInspector::default())
            .unwrap();

        assert!(registry.get(NoopTask::NAME).unwrap().injections().is_empty());
        assert_eq!(
            registry.get(ContextTask::NAME).unwrap().injections(),
            &[Injectable::ExecutionContext]
        );
    }
}
