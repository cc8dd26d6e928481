//! The runtime value model: every result an operation can produce.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::optree::OpTreeNode;

/// Errors a protocol program can produce as an ordinary `Value`.
///
/// These are not `core::error::Error` in the library-plumbing sense — they are
/// data. A `TypeError` on the wire propagates through arithmetic the same way
/// a `42` would.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum RuntimeError {
    #[error("type error: {0}")]
    TypeError(String),
    #[error("name error: unbound name {0:?}")]
    NameError(String),
    #[error("protocol mismatch: {0}")]
    ProtocolMismatchError(String),
}

/// Non-error control-flow signals that also propagate like ordinary values.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlFlowInstruction {
    /// Raised by a generator body to stop `GenerateList` without it being an error.
    InterruptGenerator,
}

/// A sub op-tree bound to a fixed set of parameter names, plus whether its
/// body runs against the caller's pad or a fresh child pad.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Callable {
    pub body: Arc<OpTreeNode>,
    pub argument_names: Vec<String>,
    pub inherits_scope: bool,
}

/// The tagged union of everything that can flow through a continuation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Value {
    Int32(i32),
    Bool(bool),
    Octets(Arc<Vec<u8>>),
    Callable(Callable),
    DynamicList(Arc<Vec<Value>>),
    Dictionary(Arc<BTreeMap<Vec<u8>, Value>>),
    Error(RuntimeError),
    ControlFlow(ControlFlowInstruction),
}

impl Value {
    pub fn octets(bytes: impl Into<Vec<u8>>) -> Value {
        Value::Octets(Arc::new(bytes.into()))
    }

    pub fn list(values: Vec<Value>) -> Value {
        Value::DynamicList(Arc::new(values))
    }

    pub fn dict(map: BTreeMap<Vec<u8>, Value>) -> Value {
        Value::Dictionary(Arc::new(map))
    }

    pub fn type_error(msg: impl Into<String>) -> Value {
        Value::Error(RuntimeError::TypeError(msg.into()))
    }

    pub fn name_error(name: impl Into<String>) -> Value {
        Value::Error(RuntimeError::NameError(name.into()))
    }

    pub fn protocol_mismatch(msg: impl Into<String>) -> Value {
        Value::Error(RuntimeError::ProtocolMismatchError(msg.into()))
    }

    /// Errors and control-flow instructions pass through pure operations unchanged.
    pub fn is_absorbing(&self) -> bool {
        matches!(self, Value::Error(_) | Value::ControlFlow(_))
    }

    pub fn as_int32(&self) -> Result<i32, Value> {
        match self {
            Value::Int32(n) => Ok(*n),
            other if other.is_absorbing() => Err(other.clone()),
            other => Err(Value::type_error(format!("expected Int32, found {other}"))),
        }
    }

    pub fn as_bool(&self) -> Result<bool, Value> {
        match self {
            Value::Bool(b) => Ok(*b),
            other if other.is_absorbing() => Err(other.clone()),
            other => Err(Value::type_error(format!("expected Bool, found {other}"))),
        }
    }

    pub fn as_octets(&self) -> Result<&Arc<Vec<u8>>, Value> {
        match self {
            Value::Octets(o) => Ok(o),
            other if other.is_absorbing() => Err(other.clone()),
            other => Err(Value::type_error(format!("expected Octets, found {other}"))),
        }
    }

    pub fn as_callable(&self) -> Result<&Callable, Value> {
        match self {
            Value::Callable(c) => Ok(c),
            other if other.is_absorbing() => Err(other.clone()),
            other => Err(Value::type_error(format!("expected Callable, found {other}"))),
        }
    }

    pub fn as_list(&self) -> Result<&Arc<Vec<Value>>, Value> {
        match self {
            Value::DynamicList(l) => Ok(l),
            other if other.is_absorbing() => Err(other.clone()),
            other => Err(Value::type_error(format!("expected DynamicList, found {other}"))),
        }
    }

    pub fn as_dict(&self) -> Result<&Arc<BTreeMap<Vec<u8>, Value>>, Value> {
        match self {
            Value::Dictionary(d) => Ok(d),
            other if other.is_absorbing() => Err(other.clone()),
            other => Err(Value::type_error(format!("expected Dictionary, found {other}"))),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int32(n) => write!(f, "Int32({n})"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Octets(o) => write!(f, "Octets({} bytes)", o.len()),
            Value::Callable(_) => write!(f, "Callable"),
            Value::DynamicList(l) => write!(f, "DynamicList({} items)", l.len()),
            Value::Dictionary(d) => write!(f, "Dictionary({} keys)", d.len()),
            Value::Error(e) => write!(f, "Error({e})"),
            Value::ControlFlow(c) => write!(f, "ControlFlow({c:?})"),
        }
    }
}

/// Picks the earliest absorbing operand, left to right; `None` if there is none.
pub fn first_absorbing<'a>(operands: impl IntoIterator<Item = &'a Value>) -> Option<Value> {
    operands.into_iter().find(|v| v.is_absorbing()).cloned()
}
