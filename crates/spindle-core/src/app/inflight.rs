//! In-flight registry - 実行中タスクの集合
//!
//! lease 更新ループが snapshot を取り、executor が claim / release します。
//! ロックは `.await` を跨いで保持しません。

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::domain::{BrokerTask, TaskId};

#[derive(Debug, Default, Clone)]
pub struct InFlightRegistry {
    inner: Arc<Mutex<HashMap<TaskId, BrokerTask>>>,
}

impl InFlightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<TaskId, BrokerTask>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register `task` as executing.
    ///
    /// Returns `None` when the same id is already in flight (duplicate
    /// delivery); the caller must not execute it.
    pub fn claim(&self, task: &BrokerTask) -> Option<InFlightGuard> {
        let id = task.id();
        let mut map = self.lock();
        if map.contains_key(&id) {
            return None;
        }
        map.insert(id, task.clone());
        Some(InFlightGuard {
            registry: self.clone(),
            id,
        })
    }

    pub fn snapshot(&self) -> Vec<BrokerTask> {
        self.lock().values().cloned().collect()
    }

    pub fn contains(&self, id: TaskId) -> bool {
        self.lock().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

/// Removes its entry from the registry when dropped.
#[derive(Debug)]
pub struct InFlightGuard {
    registry: InFlightRegistry,
    id: TaskId,
}

impl InFlightGuard {
    pub fn id(&self) -> TaskId {
        self.id
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.registry.lock().remove(&self.id);
    }
}
