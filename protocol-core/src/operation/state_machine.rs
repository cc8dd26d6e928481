//! The state-machine operation: realizes a declared protocol state graph at
//! runtime by alternating entry callables and transition callables.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::{OperationOutcome, ReasonForBlockedOperation};
use crate::frame::{StateMachineContext, StateMachinePhase};
use crate::value::{Callable, Value};

/// One declared transition out of a state.
#[derive(Clone, Debug)]
pub struct TransitionInfo {
    pub callback: Callable,
    pub argument_names: Vec<String>,
    pub target_state: String,
}

/// One declared state: its entry action (absent for a terminal state) and
/// its outgoing transitions keyed by label.
#[derive(Clone, Debug, Default)]
pub struct StateInfo {
    pub entry: Option<Callable>,
    pub transitions: BTreeMap<String, TransitionInfo>,
}

/// The full declared protocol state graph.
#[derive(Clone, Debug)]
pub struct StateMap {
    pub initial_state: String,
    pub states: BTreeMap<String, StateInfo>,
}

pub fn execute(
    map: &Arc<StateMap>,
    ctx: &mut StateMachineContext,
) -> OperationOutcome {
    if let Some(returned) = ctx.returned.take() {
        if returned.is_absorbing() {
            return OperationOutcome::Done(returned);
        }
        return match ctx.phase {
            StateMachinePhase::EnterState => handle_entry_result(map, ctx, returned),
            StateMachinePhase::RunTransition => handle_transition_result(map, ctx, returned),
        };
    }

    if ctx.chosen.is_none() && !ctx.invoked {
        return enter_current_state(map, ctx);
    }

    unreachable!("state machine stepped with no pending work")
}

fn enter_current_state(map: &Arc<StateMap>, ctx: &mut StateMachineContext) -> OperationOutcome {
    match map.states.get(&ctx.current_state).and_then(|s| s.entry.clone()) {
        Some(entry) => {
            ctx.phase = StateMachinePhase::EnterState;
            ctx.chosen = Some(entry);
            ctx.arguments = Vec::new();
            OperationOutcome::Blocked(ReasonForBlockedOperation::WaitingForCallableInvocation)
        }
        None => OperationOutcome::Done(Value::Bool(true)),
    }
}

fn handle_entry_result(
    map: &Arc<StateMap>,
    ctx: &mut StateMachineContext,
    returned: Value,
) -> OperationOutcome {
    let list = match returned.as_list() {
        Ok(l) => l.clone(),
        Err(e) => return OperationOutcome::Done(e),
    };
    if list.len() != 2 {
        return OperationOutcome::Done(Value::protocol_mismatch(
            "state entry must return [label, captures]",
        ));
    }
    let label = match list[0].as_octets() {
        Ok(o) => o.clone(),
        Err(e) => return OperationOutcome::Done(e),
    };
    let captures = match list[1].as_dict() {
        Ok(d) => d.clone(),
        Err(e) => return OperationOutcome::Done(e),
    };

    let label_str = String::from_utf8_lossy(&label).into_owned();
    if label_str.is_empty() {
        return OperationOutcome::Done(Value::dict((*captures).clone()));
    }
    let transition = match map
        .states
        .get(&ctx.current_state)
        .and_then(|s| s.transitions.get(&label_str))
    {
        Some(t) => t,
        None => {
            return OperationOutcome::Done(Value::protocol_mismatch(format!(
                "no transition {label_str:?} from state {:?}",
                ctx.current_state
            )))
        }
    };

    let mut arguments = Vec::with_capacity(transition.argument_names.len());
    for name in &transition.argument_names {
        match captures.get(name.as_bytes()) {
            Some(v) => arguments.push(v.clone()),
            None => return OperationOutcome::Done(Value::name_error(name.clone())),
        }
    }

    ctx.phase = StateMachinePhase::RunTransition;
    ctx.chosen = Some(transition.callback.clone());
    ctx.arguments = arguments;
    ctx.pending_label = Some(label.as_ref().clone());
    OperationOutcome::Blocked(ReasonForBlockedOperation::WaitingForCallableInvocation)
}

fn handle_transition_result(
    map: &Arc<StateMap>,
    ctx: &mut StateMachineContext,
    returned: Value,
) -> OperationOutcome {
    let label_bytes = ctx.pending_label.take().unwrap_or_default();
    let label_str = String::from_utf8_lossy(&label_bytes).into_owned();
    let target = map
        .states
        .get(&ctx.current_state)
        .and_then(|s| s.transitions.get(&label_str))
        .map(|t| t.target_state.clone())
        .expect("transition looked up in handle_entry_result must still resolve");

    ctx.current_state = target;
    ctx.phase = StateMachinePhase::EnterState;

    match map.states.get(&ctx.current_state).and_then(|s| s.entry.clone()) {
        Some(entry) => {
            ctx.chosen = Some(entry);
            ctx.arguments = Vec::new();
            OperationOutcome::Blocked(ReasonForBlockedOperation::WaitingForCallableInvocation)
        }
        None => OperationOutcome::Done(returned),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::continuation::Continuation;
    use crate::optree::OpTreeNode;
    use crate::pad::LexicalPad;
    use std::collections::BTreeMap;

    fn entry_returning(label: &'static [u8]) -> Callable {
        let label_lit = OpTreeNode::leaf(crate::operation::Operation::OctetsLiteral(Arc::new(
            label.to_vec(),
        )));
        let captures_lit = OpTreeNode::leaf(crate::operation::Operation::DictionaryNew);
        let body = OpTreeNode::with_children(
            crate::operation::Operation::DynamicListCtor,
            vec![label_lit, captures_lit],
        );
        Callable {
            body,
            argument_names: Vec::new(),
            inherits_scope: true,
        }
    }

    /// A terminal state's entry returning an empty label exits the operation
    /// normally with the entry's captures, instead of failing transition lookup.
    #[test]
    fn empty_label_from_terminal_state_exits_normally() {
        let mut states = BTreeMap::new();
        states.insert(
            "Closed".to_string(),
            StateInfo {
                entry: Some(entry_returning(b"")),
                transitions: BTreeMap::new(),
            },
        );
        let map = Arc::new(StateMap {
            initial_state: "Closed".to_string(),
            states,
        });

        let node = OpTreeNode::leaf(crate::operation::Operation::StateMachineOperation(map));
        let mut cont = Continuation::new(node, LexicalPad::root());
        let result = cont.run_to_completion();
        assert!(matches!(result, Value::Dictionary(_)));
    }

    /// A non-empty label with no matching transition is a protocol mismatch,
    /// not a panic or a silent no-op.
    #[test]
    fn unmatched_label_is_protocol_mismatch() {
        let mut states = BTreeMap::new();
        states.insert(
            "Open".to_string(),
            StateInfo {
                entry: Some(entry_returning(b"unexpected")),
                transitions: BTreeMap::new(),
            },
        );
        let map = Arc::new(StateMap {
            initial_state: "Open".to_string(),
            states,
        });

        let node = OpTreeNode::leaf(crate::operation::Operation::StateMachineOperation(map));
        let mut cont = Continuation::new(node, LexicalPad::root());
        let result = cont.run_to_completion();
        assert!(matches!(
            result,
            Value::Error(crate::value::RuntimeError::ProtocolMismatchError(_))
        ));
    }
}
