//! Cache Value Module
//!
//! Defines the tagged payload type stored in the cache. Primitive kinds are
//! built in; anything else travels as a named custom payload that must be
//! registered before it can be written to a snapshot.

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::error::{CacheError, Result};

// == Custom Type ==
/// A user type that can be stored in the cache as a [`Value::Custom`].
///
/// `TYPE_NAME` is written into snapshots and must stay stable across
/// releases.
pub trait CustomType: Serialize + DeserializeOwned {
    const TYPE_NAME: &'static str;
}

// == Value ==
/// A cached payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    List(Vec<Value>),
    Custom {
        type_name: String,
        payload: serde_json::Value,
    },
}

impl Value {
    // == Custom Constructor ==
    /// Wraps a registered user type.
    pub fn custom<T: CustomType>(value: &T) -> Result<Self> {
        let payload = serde_json::to_value(value)?;
        Ok(Value::Custom {
            type_name: T::TYPE_NAME.to_string(),
            payload,
        })
    }

    // == Custom Decoder ==
    /// Decodes a custom payload back into `T`.
    ///
    /// Fails with [`CacheError::Encoding`] when the value is not a custom
    /// payload or carries a different type name.
    pub fn decode<T: CustomType>(&self) -> Result<T> {
        match self {
            Value::Custom { type_name, payload } if type_name == T::TYPE_NAME => {
                Ok(serde_json::from_value(payload.clone())?)
            }
            Value::Custom { type_name, .. } => Err(CacheError::Encoding(format!(
                "expected custom type {}, found {}",
                T::TYPE_NAME,
                type_name
            ))),
            other => Err(CacheError::Encoding(format!(
                "expected custom type {}, found {} value",
                T::TYPE_NAME,
                other.kind()
            ))),
        }
    }

    /// Short name of the payload kind, used in messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::Bytes(_) => "bytes",
            Value::List(_) => "list",
            Value::Custom { .. } => "custom",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }
}

// == Conversions ==
impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Bytes(b)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}
