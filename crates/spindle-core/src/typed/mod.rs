//! Typed - 型付き Task API
//!
//! task 名の typo を型で排除し、Handler との対応付けを静的に保証します。
//!
//! # 二層構造
//! - **表層（Typed）**: `Task` trait, `Handler<T>` trait - 型安全
//! - **内部（Dyn）**: `DynHandler` trait - object-safe, type erasure
//!
//! wire 上の引数は `codec` で JSON object に組み立てられ、
//! 最内側の `TypedHandler` で `T` にデコードされます。

pub mod codec;
pub mod handler;
pub mod inject;
pub mod registry;
pub mod task;

pub use self::codec::{CodecError, JsonBackend, SerializationBackend, Serializers};
pub use self::handler::{DynHandler, Handler};
pub use self::inject::{Dependencies, Injectable};
pub use self::registry::{RegistryError, TaskDefinition, TaskRegistry};
pub use self::task::{NoArgs, Task};
