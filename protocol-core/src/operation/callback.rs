//! Callback operations: hand one argument to the host by name, block until
//! it answers.

use super::{OperationOutcome, ReasonForBlockedOperation};
use crate::frame::CallbackOperationContext;
use crate::value::{first_absorbing, Value};

pub fn execute(
    _name: &str,
    operands: &[Value],
    ctx: &mut CallbackOperationContext,
) -> OperationOutcome {
    if let Some(v) = ctx.returned.take() {
        return OperationOutcome::Done(v);
    }
    if let Some(e) = first_absorbing(operands) {
        return OperationOutcome::Done(e);
    }
    if !ctx.called {
        OperationOutcome::Blocked(ReasonForBlockedOperation::WaitingForCallback)
    } else {
        OperationOutcome::Blocked(ReasonForBlockedOperation::WaitingCallbackData)
    }
}
