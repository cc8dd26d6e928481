//! Pure, fixed-arity operations over already-evaluated operands.

use super::{Operation, OperationOutcome};
use crate::value::{first_absorbing, Value};

pub fn execute(op: &Operation, operands: &[Value]) -> OperationOutcome {
    let result = match op {
        Operation::Int32Literal(n) => Value::Int32(*n),
        Operation::BoolLiteral(b) => Value::Bool(*b),
        Operation::OctetsLiteral(bytes) => Value::Octets(bytes.clone()),
        Operation::CallableLiteral {
            body,
            argument_names,
            inherits_scope,
        } => Value::Callable(crate::value::Callable {
            body: body.clone(),
            argument_names: argument_names.clone(),
            inherits_scope: *inherits_scope,
        }),

        Operation::Add => binary_int(operands, |a, b| a.checked_add(b)),
        Operation::Subtract => binary_int(operands, |a, b| a.checked_sub(b)),
        Operation::Multiply => binary_int(operands, |a, b| a.checked_mul(b)),

        Operation::Equal => match first_absorbing(operands) {
            Some(e) => e,
            None => match values_equal(&operands[0], &operands[1]) {
                Ok(b) => Value::Bool(b),
                Err(e) => e,
            },
        },
        Operation::LessOrEqual => match first_absorbing(operands) {
            Some(e) => e,
            None => match (operands[0].as_int32(), operands[1].as_int32()) {
                (Ok(a), Ok(b)) => Value::Bool(a <= b),
                (Err(e), _) | (_, Err(e)) => e,
            },
        },

        Operation::IntToAscii => match first_absorbing(operands) {
            Some(e) => e,
            None => match operands[0].as_int32() {
                Ok(n) => Value::octets(n.to_string().into_bytes()),
                Err(e) => e,
            },
        },
        Operation::AsciiToInt => match first_absorbing(operands) {
            Some(e) => e,
            None => match operands[0].as_octets() {
                Ok(bytes) => match std::str::from_utf8(bytes)
                    .ok()
                    .and_then(|s| s.parse::<i32>().ok())
                {
                    Some(n) => Value::Int32(n),
                    None => Value::type_error("octets do not hold a decimal integer"),
                },
                Err(e) => e,
            },
        },

        Operation::DictionaryNew => Value::dict(Default::default()),
        Operation::DictionaryGet => match first_absorbing(operands) {
            Some(e) => e,
            None => match (operands[0].as_dict(), operands[1].as_octets()) {
                (Ok(d), Ok(k)) => d.get(k.as_ref()).cloned().unwrap_or_else(|| {
                    Value::name_error(String::from_utf8_lossy(k).into_owned())
                }),
                (Err(e), _) | (_, Err(e)) => e,
            },
        },
        Operation::DictionaryInitialize => match first_absorbing(operands) {
            Some(e) => e,
            None => match (operands[0].as_dict(), operands[1].as_octets()) {
                (Ok(d), Ok(k)) => {
                    let mut map = (**d).clone();
                    map.insert(k.as_ref().clone(), operands[2].clone());
                    Value::dict(map)
                }
                (Err(e), _) | (_, Err(e)) => e,
            },
        },

        _ => unreachable!("non-interpreted operation routed to interpreted::execute"),
    };
    OperationOutcome::Done(result)
}

fn binary_int(operands: &[Value], f: impl Fn(i32, i32) -> Option<i32>) -> Value {
    match first_absorbing(operands) {
        Some(e) => e,
        None => match (operands[0].as_int32(), operands[1].as_int32()) {
            (Ok(a), Ok(b)) => match f(a, b) {
                Some(r) => Value::Int32(r),
                None => Value::type_error("integer overflow"),
            },
            (Err(e), _) | (_, Err(e)) => e,
        },
    }
}

/// Only an `Int32`/`Int32` pair is a valid comparison; every other pairing,
/// matching or not, is a `TypeError` — `Eq` is not a general-purpose
/// equality check.
fn values_equal(a: &Value, b: &Value) -> Result<bool, Value> {
    match (a, b) {
        (Value::Int32(x), Value::Int32(y)) => Ok(x == y),
        _ => Err(Value::type_error(format!(
            "Eq expects two Int32 operands, found {a} and {b}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::RuntimeError;

    #[test]
    fn add_absorbs_leftmost_error() {
        let err = Value::Error(RuntimeError::TypeError("bad".into()));
        let outcome = execute(&Operation::Add, &[err.clone(), Value::Int32(1)]);
        let OperationOutcome::Done(v) = outcome else {
            panic!("expected Done")
        };
        assert!(matches!(v, Value::Error(RuntimeError::TypeError(_))));
    }

    #[test]
    fn add_overflow_is_type_error() {
        let outcome = execute(&Operation::Add, &[Value::Int32(i32::MAX), Value::Int32(1)]);
        let OperationOutcome::Done(v) = outcome else {
            panic!("expected Done")
        };
        assert!(matches!(v, Value::Error(RuntimeError::TypeError(_))));
    }

    #[test]
    fn equal_compares_matching_variants() {
        let outcome = execute(&Operation::Equal, &[Value::Int32(10), Value::Int32(10)]);
        let OperationOutcome::Done(Value::Bool(b)) = outcome else {
            panic!("expected Bool")
        };
        assert!(b);
    }

    #[test]
    fn equal_on_mismatched_types_is_type_error() {
        let callable = Value::Callable(crate::value::Callable {
            body: crate::optree::OpTreeNode::leaf(Operation::BoolLiteral(true)),
            argument_names: Vec::new(),
            inherits_scope: true,
        });
        let outcome = execute(&Operation::Equal, &[Value::Int32(20), callable]);
        let OperationOutcome::Done(v) = outcome else {
            panic!("expected Done")
        };
        assert!(matches!(v, Value::Error(RuntimeError::TypeError(_))));
    }

    #[test]
    fn int_to_ascii_then_ascii_to_int_round_trips() {
        let Ok(ascii) = (match execute(&Operation::IntToAscii, &[Value::Int32(42)]) {
            OperationOutcome::Done(v) => v.as_octets().map(|o| o.clone()),
            _ => unreachable!(),
        }) else {
            panic!("expected octets")
        };
        let outcome = execute(&Operation::AsciiToInt, &[Value::Octets(ascii)]);
        let OperationOutcome::Done(v) = outcome else {
            panic!("expected Done")
        };
        assert!(matches!(v, Value::Int32(42)));
    }
}
