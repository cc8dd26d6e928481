//! Control-flow operations: push a chosen Callable as a new continuation
//! frame, resume once it returns a value.

use super::{Operation, OperationOutcome, ReasonForBlockedOperation};
use crate::frame::ControlFlowOperationContext;
use crate::value::{first_absorbing, Value};

fn invoke(ctx: &mut ControlFlowOperationContext, callable: crate::value::Callable, args: Vec<Value>) -> OperationOutcome {
    ctx.chosen = Some(callable);
    ctx.arguments = args;
    ctx.returned = None;
    OperationOutcome::Blocked(ReasonForBlockedOperation::WaitingForCallableInvocation)
}

pub fn execute(
    op: &Operation,
    operands: &[Value],
    ctx: &mut ControlFlowOperationContext,
) -> OperationOutcome {
    match op {
        Operation::FunctionCall => {
            if let Some(v) = ctx.returned.take() {
                return OperationOutcome::Done(v);
            }
            if let Some(e) = first_absorbing(operands) {
                return OperationOutcome::Done(e);
            }
            match operands[0].as_callable() {
                Ok(callable) => invoke(ctx, callable.clone(), operands[1..].to_vec()),
                Err(e) => OperationOutcome::Done(e),
            }
        }

        Operation::If => {
            if let Some(v) = ctx.returned.take() {
                return OperationOutcome::Done(v);
            }
            if let Some(e) = first_absorbing(operands) {
                return OperationOutcome::Done(e);
            }
            let cond = match operands[0].as_bool() {
                Ok(b) => b,
                Err(e) => return OperationOutcome::Done(e),
            };
            let branch = if cond { &operands[1] } else { &operands[2] };
            match branch.as_callable() {
                Ok(callable) => invoke(ctx, callable.clone(), Vec::new()),
                Err(e) => OperationOutcome::Done(e),
            }
        }

        Operation::FunctionCallForEach { unpack_as_arguments } => {
            if let Some(returned) = ctx.returned.take() {
                if returned.is_absorbing() {
                    return OperationOutcome::Done(returned);
                }
                ctx.accumulator.push(returned);
                ctx.iteration_index += 1;
            }
            if ctx.iteration_index == 0 && ctx.accumulator.is_empty() {
                if let Some(e) = first_absorbing(operands) {
                    return OperationOutcome::Done(e);
                }
            }
            let list = match operands[0].as_list() {
                Ok(l) => l.clone(),
                Err(e) => return OperationOutcome::Done(e),
            };
            let callable = match operands[1].as_callable() {
                Ok(c) => c.clone(),
                Err(e) => return OperationOutcome::Done(e),
            };
            if ctx.iteration_index >= list.len() {
                return OperationOutcome::Done(Value::list(std::mem::take(&mut ctx.accumulator)));
            }
            let element = list[ctx.iteration_index].clone();
            let args = if *unpack_as_arguments {
                match element.as_list() {
                    Ok(items) => (**items).clone(),
                    Err(e) => return OperationOutcome::Done(e),
                }
            } else {
                vec![element]
            };
            invoke(ctx, callable, args)
        }

        Operation::GenerateList => {
            if let Some(returned) = ctx.returned.take() {
                match returned {
                    Value::ControlFlow(crate::value::ControlFlowInstruction::InterruptGenerator) => {
                        return OperationOutcome::Done(Value::list(std::mem::take(
                            &mut ctx.accumulator,
                        )));
                    }
                    v if v.is_absorbing() => return OperationOutcome::Done(v),
                    v => ctx.accumulator.push(v),
                }
            } else if let Some(e) = first_absorbing(operands) {
                return OperationOutcome::Done(e);
            }
            let callable = match operands[0].as_callable() {
                Ok(c) => c.clone(),
                Err(e) => return OperationOutcome::Done(e),
            };
            invoke(ctx, callable, Vec::new())
        }

        _ => unreachable!("non-control-flow operation routed to control_flow::execute"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::continuation::Continuation;
    use crate::optree::OpTreeNode;
    use crate::pad::LexicalPad;
    use std::sync::Arc;

    #[test]
    fn if_chooses_then_branch() {
        let then_body = OpTreeNode::leaf(Operation::Int32Literal(1));
        let else_body = OpTreeNode::leaf(Operation::Int32Literal(2));
        let cond = OpTreeNode::leaf(Operation::BoolLiteral(true));
        let then_lit = OpTreeNode::leaf(Operation::CallableLiteral {
            body: then_body,
            argument_names: vec![],
            inherits_scope: true,
        });
        let else_lit = OpTreeNode::leaf(Operation::CallableLiteral {
            body: else_body,
            argument_names: vec![],
            inherits_scope: true,
        });
        let node = OpTreeNode::with_children(Operation::If, vec![cond, then_lit, else_lit]);

        let pad = LexicalPad::root();
        let mut cont = Continuation::new(node, pad);
        let result = cont.run_to_completion();
        assert!(matches!(result, Value::Int32(1)));
    }
}
