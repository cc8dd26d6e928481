//! One op-tree node under active evaluation.

use std::sync::Arc;

use crate::optree::OpTreeNode;
use crate::pad::LexicalPad;
use crate::value::{Callable, Value};

/// Context carried by a control-flow operation across the invocation of the
/// Callable it chose (see the taxonomy's control-flow concept).
#[derive(Default)]
pub struct ControlFlowOperationContext {
    pub chosen: Option<Callable>,
    pub invoked: bool,
    pub returned: Option<Value>,
    pub arguments: Vec<Value>,
    /// Cross-invocation accumulator for `FunctionCallForEach` / `GenerateList`.
    pub accumulator: Vec<Value>,
    pub iteration_index: usize,
}

/// Which half of one state-machine cycle is in flight.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum StateMachinePhase {
    #[default]
    EnterState,
    RunTransition,
}

/// Context carried by `StateMachineOperation` across an entry-callable /
/// transition-callable pair and across every state the machine visits.
pub struct StateMachineContext {
    pub current_state: String,
    pub phase: StateMachinePhase,
    pub chosen: Option<Callable>,
    pub invoked: bool,
    pub returned: Option<Value>,
    pub arguments: Vec<Value>,
    pub pending_label: Option<Vec<u8>>,
}

impl StateMachineContext {
    pub fn new(initial_state: String) -> StateMachineContext {
        StateMachineContext {
            current_state: initial_state,
            phase: StateMachinePhase::EnterState,
            chosen: None,
            invoked: false,
            returned: None,
            arguments: Vec::new(),
            pending_label: None,
        }
    }
}

/// Context carried by a callback operation across the host round-trip.
#[derive(Default)]
pub struct CallbackOperationContext {
    pub called: bool,
    pub returned: Option<Value>,
}

/// Context carried by an I/O operation across partial reads/writes.
#[derive(Default)]
pub struct InputOutputOperationContext {
    /// Bytes accumulated so far (read side) or queued for transmission (write side).
    pub buffer: Vec<u8>,
    pub eof: bool,
    pub ready: bool,
    /// Set by `TerminateListIfReadAhead`'s lookahead scan the instant a byte
    /// definitely fails to extend the terminator prefix, before EOF.
    pub mismatched: bool,
    /// How many bytes of `buffer` the host has already consumed via `handle_write`.
    pub write_consumed: usize,
    /// Unmatched tail kept by scanning read operations across `handle_read` calls
    /// (terminator/escape-sequence matching, terminator lookahead).
    pub scratch: Vec<u8>,
}

/// The per-kind context a frame carries alongside its accumulator.
pub enum FrameContext {
    Plain,
    ControlFlow(ControlFlowOperationContext),
    StateMachine(StateMachineContext),
    Callback(CallbackOperationContext),
    Io(InputOutputOperationContext),
}

impl FrameContext {
    pub fn control_flow(&mut self) -> &mut ControlFlowOperationContext {
        match self {
            FrameContext::ControlFlow(ctx) => ctx,
            _ => unreachable!("frame context kind must match its operation's category"),
        }
    }

    pub fn state_machine(&mut self) -> &mut StateMachineContext {
        match self {
            FrameContext::StateMachine(ctx) => ctx,
            _ => unreachable!("frame context kind must match its operation's category"),
        }
    }

    pub fn callback(&mut self) -> &mut CallbackOperationContext {
        match self {
            FrameContext::Callback(ctx) => ctx,
            _ => unreachable!("frame context kind must match its operation's category"),
        }
    }

    pub fn io(&mut self) -> &mut InputOutputOperationContext {
        match self {
            FrameContext::Io(ctx) => ctx,
            _ => unreachable!("frame context kind must match its operation's category"),
        }
    }

    /// If this frame is mid-invocation of a chosen Callable, take the
    /// callable and its arguments so the step loop can push a frame for it.
    pub fn take_pending_invocation(&mut self) -> Option<(Callable, Vec<Value>)> {
        match self {
            FrameContext::ControlFlow(ctx) => {
                ctx.chosen.take().map(|c| (c, std::mem::take(&mut ctx.arguments)))
            }
            FrameContext::StateMachine(ctx) => {
                ctx.chosen.take().map(|c| (c, std::mem::take(&mut ctx.arguments)))
            }
            _ => None,
        }
    }

    pub fn mark_invoked(&mut self) {
        match self {
            FrameContext::ControlFlow(ctx) => ctx.invoked = true,
            FrameContext::StateMachine(ctx) => ctx.invoked = true,
            _ => unreachable!("mark_invoked on a non-invoking context"),
        }
    }

    /// Deliver the result of a nested Callable invocation back to whichever
    /// context kind requested it.
    pub fn accept_invocation_result(&mut self, value: Value) {
        match self {
            FrameContext::ControlFlow(ctx) => ctx.returned = Some(value),
            FrameContext::StateMachine(ctx) => ctx.returned = Some(value),
            _ => unreachable!("accept_invocation_result on a non-invoking context"),
        }
    }

    pub fn awaiting_invocation_result(&self) -> bool {
        match self {
            FrameContext::ControlFlow(ctx) => ctx.invoked && ctx.returned.is_none(),
            FrameContext::StateMachine(ctx) => ctx.invoked && ctx.returned.is_none(),
            _ => false,
        }
    }
}

/// A single frame on the continuation's stack: a node under evaluation, the
/// accumulated results of its children so far, and the lexical pad in effect.
pub struct ExecutionStackFrame {
    pub node: Arc<OpTreeNode>,
    pub pad: Arc<LexicalPad>,
    pub accumulator: Vec<Value>,
    pub next_child: usize,
    pub context: FrameContext,
}

impl ExecutionStackFrame {
    pub fn new(node: Arc<OpTreeNode>, pad: Arc<LexicalPad>) -> ExecutionStackFrame {
        let context = node.operation.fresh_context();
        ExecutionStackFrame {
            node,
            pad,
            accumulator: Vec::new(),
            next_child: 0,
            context,
        }
    }

    pub fn children_ready(&self) -> bool {
        self.next_child >= self.node.children.len()
    }
}
