//! App - worker エンジン
//!
//! ports と typed を組み合わせて、タスクの受信から実行・確定までを行います。
//!
//! # 主要コンポーネント
//! - **WorkerBuilder**: 構築と起動時検証
//! - **Worker**: intake / executor / lease / maintenance の監督と停止
//! - **Executor**: 1 件ずつの実行パイプライン
//! - **Publisher**: 型付きタスクの投入
//! - **InFlightRegistry**: 実行中タスクの追跡

pub mod builder;
pub mod context;
pub mod executor;
pub mod inflight;
pub mod intake;
pub mod lease;
pub mod publisher;
pub mod signals;
pub mod worker;

pub use self::builder::{BuildError, WorkerBuilder};
pub use self::context::ExecutionContext;
pub use self::executor::Executor;
pub use self::inflight::{InFlightGuard, InFlightRegistry};
pub use self::publisher::{PublishError, Publisher};
pub use self::signals::wait_for_shutdown_signal;
pub use self::worker::Worker;
