//! Impls - 実装（開発用・テスト用）
//!
//! このモジュールには ports の実装を含めます。
//!
//! # 含まれる実装
//! - **InMemoryBroker**: 開発用の broker（lease / 期限切れ回収つき）
//! - **InMemoryResultBackend**: 開発用の結果保存先
//!
//! # 本番用実装
//! Redis / PostgreSQL などの broker は別クレートに配置します。

pub mod inmem_broker;
pub mod inmem_results;

pub use self::inmem_broker::InMemoryBroker;
pub use self::inmem_results::InMemoryResultBackend;
