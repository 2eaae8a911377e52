//! Domain model (ids, task names, wire records, task errors).

pub mod errors;
pub mod ids;
pub mod record;
pub mod task_name;

pub use self::errors::TaskError;
pub use self::ids::TaskId;
pub use self::record::{BrokerTask, DeliveryTag, SerializedValue, TaskRecord};
pub use self::task_name::TaskName;
