//! Lexical-pad operations: pure relative to the current scope.

use std::sync::Arc;

use super::OperationOutcome;
use crate::pad::LexicalPad;
use crate::value::Value;

pub fn get(pad: &Arc<LexicalPad>, name: &str) -> OperationOutcome {
    OperationOutcome::Done(pad.get(name))
}

pub fn set(pad: &Arc<LexicalPad>, name: &str, value: Value) -> OperationOutcome {
    OperationOutcome::Done(pad.set(name, value))
}

pub fn initialize(pad: &Arc<LexicalPad>, name: &str, value: Value) -> OperationOutcome {
    pad.initialize(name.to_string(), value.clone());
    OperationOutcome::Done(value)
}

pub fn initialize_global(pad: &Arc<LexicalPad>, name: &str, value: Value) -> OperationOutcome {
    pad.initialize_global(name.to_string(), value.clone());
    OperationOutcome::Done(value)
}

pub fn as_dict(pad: &Arc<LexicalPad>) -> OperationOutcome {
    OperationOutcome::Done(pad.as_dict())
}
