//! Task trait - 型付き Task の定義
//!
//! # 学習ポイント
//! - Associated Constants (`const NAME`, `const PARAMS`)
//! - Associated Type (`type Output`)
//! - Trait bounds の組み合わせ (Serialize + DeserializeOwned + Send + Sync + 'static)

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Task は task 名と引数の型を対応付ける
///
/// 実装する型そのものが「呼び出し引数」です。
/// 引数のない task は [`NoArgs`] を包んだ newtype にします
/// （`struct Ping(NoArgs);`、wire 上は空の kwargs）。
///
/// # 使用例
/// ```ignore
/// #[derive(Serialize, Deserialize)]
/// struct SendMail {
///     to: String,
///     subject: String,
/// }
///
/// impl Task for SendMail {
///     const NAME: &'static str = "mail.send";
///     const PARAMS: &'static [&'static str] = &["to", "subject"];
///     type Output = ();
/// }
/// ```
pub trait Task: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Registry key; also the `task_name` carried on the wire.
    const NAME: &'static str;

    /// Declared parameter names in positional order.
    ///
    /// Positional wire arguments are bound to these names before the
    /// arguments are decoded into `Self`. Tasks that are only ever called
    /// with keyword arguments can leave this empty.
    const PARAMS: &'static [&'static str] = &[];

    /// Value produced by the task; stored in the result backend.
    type Output: Serialize + Send + 'static;
}

/// Arguments of a parameterless task.
///
/// Encodes as an empty JSON object, so a task wrapping it carries no
/// args and no kwargs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoArgs {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{TaskId, TaskName, TaskRecord};
    use crate::testing::{self, NoopTask};
    use crate::typed::Serializers;
    use serde_json::json;
    use ulid::Ulid;

    #[test]
    fn parameterless_task_has_no_wire_arguments() {
        let (args, kwargs) = Serializers::json().encode_task(&NoopTask(NoArgs {})).unwrap();
        assert!(args.is_empty());
        assert!(kwargs.is_empty());
    }

    #[test]
    fn empty_record_decodes_into_no_args() {
        let registry = testing::registry();
        let definition = registry.get(NoopTask::NAME).unwrap();
        let record = TaskRecord::new(
            TaskId::from_ulid(Ulid::new()),
            TaskName::new(NoopTask::NAME),
            chrono::Utc::now(),
        );

        let arguments = Serializers::json().deserialize(&definition, &record).unwrap();
        assert_eq!(arguments, json!({}));
        let task: NoopTask = serde_json::from_value(arguments).unwrap();
        assert_eq!(task.0, NoArgs::default());
    }
}
