//! The operation taxonomy: every node kind an op-tree can hold, grouped by
//! the five invocation concepts described for the interpreter.

mod callback;
mod control_flow;
mod dynamic;
mod interpreted;
mod io;
mod lexical;
mod state_machine;

pub use io::IoOutcome;
pub use state_machine::{StateInfo, StateMap, TransitionInfo};

/// Host-facing hook: feed bytes to the I/O operation blocked on `WaitingForRead`.
pub fn io_handle_read(op: &Operation, ctx: &mut InputOutputOperationContext, input: &[u8]) -> usize {
    io::handle_read(op, ctx, input)
}

pub fn io_get_write_buffer(ctx: &InputOutputOperationContext) -> &[u8] {
    io::get_write_buffer(ctx)
}

pub fn io_handle_write(ctx: &mut InputOutputOperationContext, n: usize) {
    io::handle_write(ctx, n)
}

use std::sync::Arc;

use crate::frame::{
    CallbackOperationContext, ControlFlowOperationContext, FrameContext,
    InputOutputOperationContext,
};
use crate::optree::OpTreeNode;
use crate::pad::LexicalPad;
use crate::value::Value;

/// Why a continuation stopped advancing and what will resume it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReasonForBlockedOperation {
    WaitingForRead,
    WaitingForWrite,
    WaitingForCallback,
    WaitingCallbackData,
    WaitingForCallableInvocation,
    WaitingForCallableResult,
}

/// The result of evaluating one operation against its now-ready operands.
pub enum OperationOutcome {
    Done(Value),
    Blocked(ReasonForBlockedOperation),
}

/// Every operation kind an op-tree node can carry.
#[derive(Debug)]
pub enum Operation {
    // -- Interpreted --
    Int32Literal(i32),
    BoolLiteral(bool),
    OctetsLiteral(Arc<Vec<u8>>),
    CallableLiteral {
        body: Arc<OpTreeNode>,
        argument_names: Vec<String>,
        inherits_scope: bool,
    },
    Add,
    Subtract,
    Multiply,
    Equal,
    LessOrEqual,
    IntToAscii,
    AsciiToInt,
    DictionaryNew,
    DictionaryGet,
    DictionaryInitialize,

    // -- Dynamic-input --
    OpSequence,
    DynamicListCtor,

    // -- Control-flow --
    FunctionCall,
    If,
    FunctionCallForEach { unpack_as_arguments: bool },
    GenerateList,
    StateMachineOperation(Arc<StateMap>),

    // -- Callback --
    UnaryCallback(String),

    // -- Lexical pad --
    PadGet(String),
    PadSet(String),
    PadInitialize(String),
    PadInitializeGlobal(String),
    PadAsDict,

    // -- I/O --
    ReadStaticOctets(Arc<Vec<u8>>),
    ReadOctetsUntilTerminator {
        terminator: Arc<Vec<u8>>,
        escape: Option<(u8, Arc<Vec<u8>>)>,
    },
    ReadInt32Native,
    ReadIntFromAscii,
    WriteStaticOctets(Arc<Vec<u8>>),
    WriteInt32Native,
    WriteOctets,
    WriteOctetsWithEscape {
        escaped_char: u8,
        escape_sequence: Arc<Vec<u8>>,
    },
    TerminateListIfReadAhead(Arc<Vec<u8>>),
}

impl Operation {
    /// Whether this operation is I/O, and thus has an `InputOutputOperationContext`.
    pub fn is_io(&self) -> bool {
        matches!(
            self,
            Operation::ReadStaticOctets(_)
                | Operation::ReadOctetsUntilTerminator { .. }
                | Operation::ReadInt32Native
                | Operation::ReadIntFromAscii
                | Operation::WriteStaticOctets(_)
                | Operation::WriteInt32Native
                | Operation::WriteOctets
                | Operation::WriteOctetsWithEscape { .. }
                | Operation::TerminateListIfReadAhead(_)
        )
    }

    /// The context shape this operation's frame needs, freshly initialized.
    pub fn fresh_context(&self) -> FrameContext {
        match self {
            Operation::FunctionCall
            | Operation::If
            | Operation::FunctionCallForEach { .. }
            | Operation::GenerateList => {
                FrameContext::ControlFlow(ControlFlowOperationContext::default())
            }
            Operation::StateMachineOperation(map) => FrameContext::StateMachine(
                crate::frame::StateMachineContext::new(map.initial_state.clone()),
            ),
            Operation::UnaryCallback(_) => {
                FrameContext::Callback(CallbackOperationContext::default())
            }
            op if op.is_io() => FrameContext::Io(InputOutputOperationContext::default()),
            _ => FrameContext::Plain,
        }
    }

    /// Whether to stop evaluating further children once `latest` has arrived,
    /// regardless of how many children the node declares.
    pub fn should_short_circuit(&self, latest: &Value) -> bool {
        dynamic::should_short_circuit(self, latest)
    }

    /// How many children must be evaluated before this operation can run.
    ///
    /// Control-flow and I/O operations manage their own readiness beyond
    /// this count (callable invocation, byte availability), so this is only
    /// the count of *operand* children, not a full readiness check.
    pub fn arity(&self, declared_children: usize) -> usize {
        declared_children
    }

    pub fn execute(
        &self,
        operands: &[Value],
        context: &mut FrameContext,
        pad: &Arc<LexicalPad>,
    ) -> OperationOutcome {
        match self {
            Operation::Int32Literal(_)
            | Operation::BoolLiteral(_)
            | Operation::OctetsLiteral(_)
            | Operation::CallableLiteral { .. }
            | Operation::Add
            | Operation::Subtract
            | Operation::Multiply
            | Operation::Equal
            | Operation::LessOrEqual
            | Operation::IntToAscii
            | Operation::AsciiToInt
            | Operation::DictionaryNew
            | Operation::DictionaryGet
            | Operation::DictionaryInitialize => interpreted::execute(self, operands),

            Operation::OpSequence | Operation::DynamicListCtor => {
                dynamic::execute(self, operands)
            }

            Operation::FunctionCall
            | Operation::If
            | Operation::FunctionCallForEach { .. }
            | Operation::GenerateList => {
                control_flow::execute(self, operands, context.control_flow())
            }
            Operation::StateMachineOperation(map) => {
                state_machine::execute(map, context.state_machine())
            }

            Operation::UnaryCallback(name) => {
                callback::execute(name, operands, context.callback())
            }

            Operation::PadGet(name) => lexical::get(pad, name),
            Operation::PadSet(name) => {
                lexical::set(pad, name, operands.first().cloned().unwrap_or(Value::Bool(false)))
            }
            Operation::PadInitialize(name) => lexical::initialize(
                pad,
                name,
                operands.first().cloned().unwrap_or(Value::Bool(false)),
            ),
            Operation::PadInitializeGlobal(name) => lexical::initialize_global(
                pad,
                name,
                operands.first().cloned().unwrap_or(Value::Bool(false)),
            ),
            Operation::PadAsDict => lexical::as_dict(pad),

            Operation::ReadStaticOctets(_)
            | Operation::ReadOctetsUntilTerminator { .. }
            | Operation::ReadInt32Native
            | Operation::ReadIntFromAscii
            | Operation::WriteStaticOctets(_)
            | Operation::WriteInt32Native
            | Operation::WriteOctets
            | Operation::WriteOctetsWithEscape { .. }
            | Operation::TerminateListIfReadAhead(_) => {
                match io::execute(self, operands, context.io()) {
                    IoOutcome::Done(v) => OperationOutcome::Done(v),
                    IoOutcome::Blocked(r) => OperationOutcome::Blocked(r),
                }
            }
        }
    }
}
