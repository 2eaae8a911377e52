//! IdGenerator port - task_id の採番
//!
//! Publisher が新しいメッセージを作るたびに呼びます。

use ulid::Ulid;

use crate::domain::TaskId;
use crate::ports::Clock;

pub trait IdGenerator: Send + Sync {
    fn generate_task_id(&self) -> TaskId;
}

/// ULID: 上位 48bit が clock の時刻、残りが乱数
///
/// 同じ broker に複数の publisher がいても衝突しない前提で使えます。
pub struct UlidGenerator<C> {
    clock: C,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }
}

impl<C: Clock> IdGenerator for UlidGenerator<C> {
    fn generate_task_id(&self) -> TaskId {
        let ms = u64::try_from(self.clock.now().timestamp_millis()).unwrap_or(0);
        TaskId::from(Ulid::from_parts(ms, rand::random()))
    }
}
