//! A hand-built demo protocol: read a decimal-ASCII number terminated by a
//! newline, hand it to a host callback named `"double"`, write the answer
//! back the same way. Stands in for what a DSL front end would otherwise
//! compile into an op-tree.

use std::sync::Arc;

use protocol_core::operation::Operation;
use protocol_core::optree::{OpTree, OpTreeNode};

pub fn build_program() -> OpTree {
    let read_line = OpTreeNode::leaf(Operation::ReadOctetsUntilTerminator {
        terminator: Arc::new(b"\n".to_vec()),
        escape: None,
    });
    let parse_int = OpTreeNode::with_children(Operation::AsciiToInt, vec![read_line]);
    let doubled = OpTreeNode::with_children(
        Operation::UnaryCallback("double".to_string()),
        vec![parse_int],
    );
    let to_ascii = OpTreeNode::with_children(Operation::IntToAscii, vec![doubled]);
    let write_answer = OpTreeNode::with_children(Operation::WriteOctets, vec![to_ascii]);
    let write_newline = OpTreeNode::leaf(Operation::WriteStaticOctets(Arc::new(b"\n".to_vec())));

    let root = OpTreeNode::with_children(Operation::OpSequence, vec![write_answer, write_newline]);

    OpTree {
        root,
        globals: Default::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use protocol_core::continuation::{Continuation, ContinuationState};
    use protocol_core::pad::LexicalPad;
    use protocol_core::value::Value;

    #[test]
    fn reads_parses_doubles_and_writes() {
        let program = build_program();
        let mut cont = Continuation::new(program.root, LexicalPad::root());

        loop {
            match cont.state() {
                ContinuationState::Blocked(protocol_core::operation::ReasonForBlockedOperation::WaitingForRead) => {
                    let consumed = cont.handle_read(b"21\n");
                    assert_eq!(consumed, 3);
                }
                ContinuationState::Blocked(protocol_core::operation::ReasonForBlockedOperation::WaitingForCallback) => {
                    let (name, args) = cont.take_pending_callback_request().unwrap();
                    assert_eq!(name, "double");
                    let Value::Int32(n) = args[0] else { panic!("expected Int32") };
                    cont.push_callback_response(Value::Int32(n * 2));
                }
                ContinuationState::Blocked(protocol_core::operation::ReasonForBlockedOperation::WaitingForWrite) => {
                    let buf = cont.get_write_buffer().to_vec();
                    cont.handle_write(buf.len());
                }
                ContinuationState::Exited => break,
                _ => cont.step(),
            }
        }
    }
}
