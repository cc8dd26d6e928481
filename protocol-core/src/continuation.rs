//! The step loop: advances one stack of frames over an op-tree.

use std::sync::Arc;

use crate::frame::ExecutionStackFrame;
use crate::operation::{Operation, OperationOutcome, ReasonForBlockedOperation};
use crate::optree::OpTreeNode;
use crate::pad::LexicalPad;
use crate::value::Value;

/// Where a continuation currently stands.
pub enum ContinuationState {
    MissingArguments,
    Ready,
    Blocked(ReasonForBlockedOperation),
    Exited,
}

/// A single thread of execution over a shared-owned op-tree.
pub struct Continuation {
    stack: Vec<ExecutionStackFrame>,
    state: ContinuationState,
    result: Option<Value>,
    /// Set by `step` the instant a callback operation first asks to be
    /// dispatched; the host/runner drains this into the interpreter's
    /// request queue.
    pending_callback_request: Option<(String, Vec<Value>)>,
}

impl Continuation {
    pub fn new(root: Arc<OpTreeNode>, pad: Arc<LexicalPad>) -> Continuation {
        Continuation {
            stack: vec![ExecutionStackFrame::new(root, pad)],
            state: ContinuationState::MissingArguments,
            result: None,
            pending_callback_request: None,
        }
    }

    pub fn state(&self) -> &ContinuationState {
        &self.state
    }

    pub fn is_exited(&self) -> bool {
        matches!(self.state, ContinuationState::Exited)
    }

    pub fn result(&self) -> Option<&Value> {
        self.result.as_ref()
    }

    pub fn take_pending_callback_request(&mut self) -> Option<(String, Vec<Value>)> {
        self.pending_callback_request.take()
    }

    /// Deliver a callback's answer to the frame that requested it and put
    /// the continuation back in a runnable state.
    pub fn push_callback_response(&mut self, value: Value) {
        let top = self.stack.last_mut().expect("continuation has exited");
        top.context.callback().returned = Some(value);
        self.state = ContinuationState::Ready;
    }

    /// Feed bytes to the I/O operation currently blocked on `WaitingForRead`.
    /// Returns the number of bytes actually consumed.
    pub fn handle_read(&mut self, input: &[u8]) -> usize {
        let top = self.stack.last_mut().expect("continuation has exited");
        let consumed = crate::operation::io_handle_read(&top.node.operation, top.context.io(), input);
        self.state = ContinuationState::Ready;
        consumed
    }

    pub fn handle_eof(&mut self) {
        let top = self.stack.last_mut().expect("continuation has exited");
        top.context.io().eof = true;
        self.state = ContinuationState::Ready;
    }

    pub fn get_write_buffer(&self) -> &[u8] {
        let top = self.stack.last().expect("continuation has exited");
        match &top.context {
            crate::frame::FrameContext::Io(ctx) => crate::operation::io_get_write_buffer(ctx),
            _ => &[],
        }
    }

    pub fn handle_write(&mut self, n: usize) {
        let top = self.stack.last_mut().expect("continuation has exited");
        crate::operation::io_handle_write(top.context.io(), n);
        self.state = ContinuationState::Ready;
    }

    /// Advance by exactly one unit of work. Call in a loop until `Blocked` or
    /// `Exited`.
    pub fn step(&mut self) {
        let Some(top) = self.stack.last_mut() else {
            self.state = ContinuationState::Exited;
            return;
        };

        if !top.children_ready() && !top.node.operation.should_short_circuit(
            top.accumulator.last().unwrap_or(&Value::Bool(false)),
        ) {
            let child = top.node.children[top.next_child].clone();
            top.next_child += 1;
            let child_pad = top.pad.clone();
            self.stack.push(ExecutionStackFrame::new(child, child_pad));
            self.state = ContinuationState::MissingArguments;
            return;
        }

        let outcome = {
            let top = self.stack.last_mut().expect("checked above");
            top.node
                .operation
                .execute(&top.accumulator, &mut top.context, &top.pad)
        };

        match outcome {
            OperationOutcome::Done(value) => self.resolve(value),
            OperationOutcome::Blocked(ReasonForBlockedOperation::WaitingForCallableInvocation) => {
                self.push_invocation();
            }
            OperationOutcome::Blocked(ReasonForBlockedOperation::WaitingForCallback) => {
                let top = self.stack.last_mut().expect("checked above");
                let Operation::UnaryCallback(name) = &top.node.operation else {
                    unreachable!("WaitingForCallback from a non-callback operation")
                };
                self.pending_callback_request = Some((name.clone(), top.accumulator.clone()));
                top.context.callback().called = true;
                self.state = ContinuationState::Blocked(ReasonForBlockedOperation::WaitingForCallback);
            }
            OperationOutcome::Blocked(reason) => {
                self.state = ContinuationState::Blocked(reason);
            }
        }
    }

    /// Push a frame for the Callable a control-flow/state-machine operation
    /// just chose, binding its arguments into scope.
    fn push_invocation(&mut self) {
        let top = self.stack.last_mut().expect("checked by caller");
        let (callable, arguments) = top
            .context
            .take_pending_invocation()
            .expect("WaitingForCallableInvocation implies a chosen callable");
        top.context.mark_invoked();

        let invocation_pad = if callable.inherits_scope {
            top.pad.clone()
        } else {
            let child = LexicalPad::child(&top.pad);
            for (name, value) in callable.argument_names.iter().zip(arguments.iter()) {
                child.initialize(name.clone(), value.clone());
            }
            child
        };

        self.stack
            .push(ExecutionStackFrame::new(callable.body, invocation_pad));
        self.state = ContinuationState::MissingArguments;
    }

    /// A frame produced its final value: pop it and hand the value to
    /// whatever is now on top (an accumulator slot, an awaited invocation
    /// result, or the continuation's own terminal result).
    fn resolve(&mut self, value: Value) {
        self.stack.pop();
        match self.stack.last_mut() {
            None => {
                self.result = Some(value);
                self.state = ContinuationState::Exited;
            }
            Some(parent) if parent.context.awaiting_invocation_result() => {
                parent.context.accept_invocation_result(value);
                self.state = ContinuationState::Ready;
            }
            Some(parent) => {
                parent.accumulator.push(value);
                self.state = ContinuationState::Ready;
            }
        }
    }

    /// Runs `step` until the continuation blocks or exits. Intended for
    /// tests and for pure (non-I/O, non-callback) programs.
    pub fn run_to_completion(&mut self) -> Value {
        loop {
            match self.state {
                ContinuationState::Blocked(_) => {
                    panic!("run_to_completion used on a program that actually blocks")
                }
                ContinuationState::Exited => return self.result.take().expect("set on exit"),
                _ => self.step(),
            }
        }
    }
}
