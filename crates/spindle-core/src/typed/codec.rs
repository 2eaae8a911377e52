//! Serialization layer - wire 上の引数と呼び出し引数の相互変換
//!
//! # デシリアライズフロー
//! 1. 各引数をタグ（backend id）の backend で `serde_json::Value` に戻す
//! 2. 位置引数を `TaskDefinition::params()` の名前に順番に束縛する
//! 3. キーワード引数をマージする（位置引数との重複はエラー）
//! 4. JSON object を返す（`T` への型付きデコードは TypedHandler で行う）

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};

use super::registry::TaskDefinition;
use crate::domain::{SerializedValue, TaskRecord};

pub const JSON_BACKEND_ID: &str = "json";

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("unknown serialization backend '{0}'")]
    UnknownBackend(String),

    #[error("too many positional arguments: expected at most {expected}, got {got}")]
    TooManyPositional { expected: usize, got: usize },

    #[error("argument '{0}' given both positionally and by keyword")]
    DuplicateArgument(String),

    #[error("task arguments must serialize to an object, an array or null")]
    UnsupportedShape,

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}

/// SerializationBackend は 1 つの引数値を文字列に変換する
pub trait SerializationBackend: Send + Sync {
    fn id(&self) -> &str;

    fn serialize(&self, value: &Value) -> Result<String, CodecError>;

    fn deserialize(&self, raw: &str) -> Result<Value, CodecError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonBackend;

impl SerializationBackend for JsonBackend {
    fn id(&self) -> &str {
        JSON_BACKEND_ID
    }

    fn serialize(&self, value: &Value) -> Result<String, CodecError> {
        Ok(serde_json::to_string(value)?)
    }

    fn deserialize(&self, raw: &str) -> Result<Value, CodecError> {
        Ok(serde_json::from_str(raw)?)
    }
}

pub type EncodedArguments = (Vec<SerializedValue>, BTreeMap<String, SerializedValue>);

/// Set of serialization backends keyed by id, plus the default used for encoding.
#[derive(Clone)]
pub struct Serializers {
    backends: HashMap<String, Arc<dyn SerializationBackend>>,
    default_backend: String,
}

impl Serializers {
    /// Only the JSON backend, which is also the default.
    pub fn json() -> Self {
        Self {
            backends: HashMap::from([(
                JSON_BACKEND_ID.to_string(),
                Arc::new(JsonBackend) as Arc<dyn SerializationBackend>,
            )]),
            default_backend: JSON_BACKEND_ID.to_string(),
        }
    }

    pub fn with_backend(mut self, backend: Arc<dyn SerializationBackend>) -> Self {
        self.backends.insert(backend.id().to_string(), backend);
        self
    }

    pub fn with_default(mut self, id: impl Into<String>) -> Self {
        self.default_backend = id.into();
        self
    }

    pub fn contains(&self, id: &str) -> bool {
        self.backends.contains_key(id)
    }

    pub fn default_backend(&self) -> &str {
        &self.default_backend
    }

    fn backend(&self, id: &str) -> Result<&Arc<dyn SerializationBackend>, CodecError> {
        self.backends
            .get(id)
            .ok_or_else(|| CodecError::UnknownBackend(id.to_string()))
    }

    fn encode_value(&self, value: &Value) -> Result<SerializedValue, CodecError> {
        let backend = self.backend(&self.default_backend)?;
        Ok(SerializedValue::new(backend.id(), backend.serialize(value)?))
    }

    fn decode_value(&self, value: &SerializedValue) -> Result<Value, CodecError> {
        self.backend(&value.backend)?.deserialize(&value.value)
    }

    /// Encode a task's fields with the default backend.
    ///
    /// Structs become keyword arguments, tuple structs positional ones.
    pub fn encode_task<T: Serialize>(&self, task: &T) -> Result<EncodedArguments, CodecError> {
        match serde_json::to_value(task)? {
            Value::Object(fields) => {
                let mut kwargs = BTreeMap::new();
                for (name, value) in &fields {
                    kwargs.insert(name.clone(), self.encode_value(value)?);
                }
                Ok((Vec::new(), kwargs))
            }
            Value::Array(items) => {
                let args = items
                    .iter()
                    .map(|v| self.encode_value(v))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok((args, BTreeMap::new()))
            }
            Value::Null => Ok((Vec::new(), BTreeMap::new())),
            _ => Err(CodecError::UnsupportedShape),
        }
    }

    /// Turn a record's wire arguments into call arguments for `definition`.
    pub fn deserialize(
        &self,
        definition: &TaskDefinition,
        record: &TaskRecord,
    ) -> Result<Value, CodecError> {
        let params = definition.params();
        if record.args.len() > params.len() {
            return Err(CodecError::TooManyPositional {
                expected: params.len(),
                got: record.args.len(),
            });
        }

        let mut arguments = Map::new();
        for (name, raw) in params.iter().zip(&record.args) {
            arguments.insert((*name).to_string(), self.decode_value(raw)?);
        }
        for (name, raw) in &record.kwargs {
            if arguments.contains_key(name) {
                return Err(CodecError::DuplicateArgument(name.clone()));
            }
            arguments.insert(name.clone(), self.decode_value(raw)?);
        }
        Ok(Value::Object(arguments))
    }
}

impl Default for Serializers {
    fn default() -> Self {
        Self::json()
    }
}
