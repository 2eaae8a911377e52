//! Ports - 抽象化レイヤー
//!
//! worker が依存する外部システム（broker, result backend）と
//! テストで差し替えたい環境（clock, id 採番）へのインターフェースです。

pub mod broker;
pub mod clock;
pub mod id_generator;
pub mod result_backend;

pub use self::broker::{AckContext, Broker, BrokerError};
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::result_backend::{ResultBackend, ResultError};
