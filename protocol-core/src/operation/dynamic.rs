//! Dynamic-input operations: accept a variable-length, already-evaluated
//! sequence of operands.

use super::{Operation, OperationOutcome};
use crate::value::Value;

/// Whether evaluation of further children should stop once `latest` arrives,
/// independent of how many children the node declares.
pub fn should_short_circuit(op: &Operation, latest: &Value) -> bool {
    matches!(op, Operation::OpSequence) && latest.is_absorbing()
}

pub fn execute(op: &Operation, operands: &[Value]) -> OperationOutcome {
    let result = match op {
        Operation::OpSequence => operands
            .last()
            .cloned()
            .unwrap_or_else(|| Value::type_error("empty OpSequence")),
        Operation::DynamicListCtor => Value::list(operands.to_vec()),
        _ => unreachable!("non-dynamic operation routed to dynamic::execute"),
    };
    OperationOutcome::Done(result)
}
