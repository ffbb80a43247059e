//! Value types, flags and handles shared by the registry and the store.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize, Serializer};

/// Semantic type of a configuration variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VarType {
    Int,
    #[serde(alias = "string")]
    Str,
    Blob,
    Opaque,
}

impl fmt::Display for VarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            VarType::Int => "int",
            VarType::Str => "string",
            VarType::Blob => "blob",
            VarType::Opaque => "opaque",
        };
        f.write_str(name)
    }
}

/// Process-local opaque handle stored in a generation.
///
/// Compared by identity; never serialized.
#[derive(Clone)]
pub struct Opaque(Arc<dyn Any + Send + Sync>);

impl Opaque {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Arc::new(value))
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }
}

impl fmt::Debug for Opaque {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Opaque({:p})", Arc::as_ptr(&self.0))
    }
}

impl PartialEq for Opaque {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// The current value of one variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Value {
    Int(i64),
    Str(Arc<str>),
    Blob(Arc<[u8]>),
    #[serde(skip_deserializing, serialize_with = "serialize_opaque")]
    Opaque(Option<Opaque>),
}

fn serialize_opaque<S: Serializer>(value: &Option<Opaque>, s: S) -> Result<S::Ok, S::Error> {
    match value {
        Some(_) => s.serialize_str("<opaque>"),
        None => s.serialize_none(),
    }
}

impl Value {
    pub fn var_type(&self) -> VarType {
        match self {
            Value::Int(_) => VarType::Int,
            Value::Str(_) => VarType::Str,
            Value::Blob(_) => VarType::Blob,
            Value::Opaque(_) => VarType::Opaque,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_blob(&self) -> Option<&[u8]> {
        match self {
            Value::Blob(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_opaque(&self) -> Option<&Opaque> {
        match self {
            Value::Opaque(v) => v.as_ref(),
            _ => None,
        }
    }

    /// Converts textual administrative input into a value of `ty`.
    ///
    /// The error carries a description of the rejected input.
    pub fn from_input(ty: VarType, input: &str) -> Result<Value, String> {
        match ty {
            VarType::Int => input
                .trim()
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|_| format!("non-numeric input '{}'", input)),
            VarType::Str => Ok(Value::Str(Arc::from(input))),
            VarType::Blob => Ok(Value::Blob(Arc::from(input.as_bytes()))),
            VarType::Opaque => Err("opaque values cannot be set from text".to_string()),
        }
    }

    /// Copy with freshly allocated string/blob storage.
    pub(crate) fn detached(&self) -> Value {
        match self {
            Value::Str(s) => Value::Str(Arc::from(&**s)),
            Value::Blob(b) => Value::Blob(Arc::from(&**b)),
            other => other.clone(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{}", v),
            Value::Str(s) => write!(f, "\"{}\"", s),
            Value::Blob(b) => write!(f, "<{} bytes>", b.len()),
            Value::Opaque(Some(_)) => f.write_str("<opaque>"),
            Value::Opaque(None) => f.write_str("<null>"),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(Arc::from(v))
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Blob(Arc::from(v))
    }
}

bitflags::bitflags! {
    /// Behavioural flags of a variable.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct VarFlags: u8 {
        /// May be changed as a single variable without a multi-variable transaction.
        const ATOMIC = 1 << 0;
        /// Rejects every runtime change.
        const READ_ONLY = 1 << 1;
        /// The per-worker callback fires in one worker only, not in every worker.
        const CB_ONLY_ONCE = 1 << 2;
    }
}

/// Stable index of a group inside every generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GroupHandle(pub(crate) usize);

impl GroupHandle {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Stable index of a variable inside every generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VarHandle {
    pub(crate) group: usize,
    pub(crate) var: usize,
}

impl VarHandle {
    pub fn group(&self) -> GroupHandle {
        GroupHandle(self.group)
    }
}
