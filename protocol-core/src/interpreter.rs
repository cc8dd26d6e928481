//! Per-connection state: one continuation plus the queues a host drives it
//! through.

use std::sync::{Arc, Mutex};

use tokio::sync::oneshot;

use crate::continuation::{Continuation, ContinuationState};
use crate::optree::OpTree;
use crate::pad::LexicalPad;
use crate::support::queue::MutexLockQueue;
use crate::value::Value;

/// A callback request an interpreter has queued for the host: the name it
/// was registered under, plus the marshalled arguments.
pub type CallbackRequest = (String, Vec<Value>);

/// One connection's execution state. Owns the continuation and the byte /
/// callback queues a host and the runner interact through; never touches a
/// socket itself.
pub struct Interpreter {
    continuation: Mutex<Continuation>,
    pub inbound: MutexLockQueue<u8>,
    pub outbound: MutexLockQueue<u8>,
    pub callback_requests: MutexLockQueue<CallbackRequest>,
    result_tx: Mutex<Option<oneshot::Sender<Value>>>,
    result_rx: Mutex<Option<oneshot::Receiver<Value>>>,
}

impl Interpreter {
    pub fn new(program: &OpTree) -> Interpreter {
        let root_pad = LexicalPad::root();
        for (name, value) in &program.globals {
            root_pad.initialize(name.clone(), value.clone());
        }
        let continuation = Continuation::new(program.root.clone(), root_pad);
        let (tx, rx) = oneshot::channel();
        Interpreter {
            continuation: Mutex::new(continuation),
            inbound: MutexLockQueue::new(),
            outbound: MutexLockQueue::new(),
            callback_requests: MutexLockQueue::new(),
            result_tx: Mutex::new(Some(tx)),
            result_rx: Mutex::new(Some(rx)),
        }
    }

    /// Takes the one-shot receiver for this interpreter's terminal value.
    /// May only be called once.
    pub fn take_result_receiver(&self) -> oneshot::Receiver<Value> {
        self.result_rx
            .lock()
            .unwrap()
            .take()
            .expect("result receiver already taken")
    }

    pub fn has_exited(&self) -> bool {
        matches!(
            self.continuation.lock().unwrap().state(),
            ContinuationState::Exited
        )
    }

    /// Advances the continuation until it blocks or exits, draining any
    /// ready bytes/callback responses it can consume along the way.
    pub fn drive(&self) {
        loop {
            {
                let mut cont = self.continuation.lock().unwrap();
                loop {
                    match cont.state() {
                        ContinuationState::Exited => break,
                        ContinuationState::Blocked(reason) => {
                            if !self.try_unblock(&mut cont, *reason) {
                                return;
                            }
                            break;
                        }
                        _ => cont.step(),
                    }
                }
                if cont.is_exited() {
                    if let Some(tx) = self.result_tx.lock().unwrap().take() {
                        let _ = tx.send(cont.result().cloned().unwrap_or(Value::Bool(false)));
                    }
                    return;
                }
            }
        }
    }

    fn try_unblock(
        &self,
        cont: &mut Continuation,
        reason: crate::operation::ReasonForBlockedOperation,
    ) -> bool {
        use crate::operation::ReasonForBlockedOperation::*;
        match reason {
            WaitingForRead => {
                let bytes = self.inbound.drain_all();
                if bytes.is_empty() {
                    if self.inbound.is_closed() {
                        cont.handle_eof();
                        true
                    } else {
                        false
                    }
                } else {
                    let consumed = cont.handle_read(&bytes);
                    self.inbound.extend_front(bytes[consumed..].iter().copied());
                    true
                }
            }
            WaitingForWrite => {
                let buf = cont.get_write_buffer().to_vec();
                if buf.is_empty() {
                    true
                } else {
                    self.outbound.extend_back(buf.iter().copied());
                    cont.handle_write(buf.len());
                    true
                }
            }
            WaitingForCallback => {
                if let Some((name, args)) = cont.take_pending_callback_request() {
                    self.callback_requests.push_back((name, args));
                }
                false
            }
            WaitingCallbackData => false,
            WaitingForCallableInvocation | WaitingForCallableResult => true,
        }
    }

    /// Delivers a callback's answer and resumes the continuation.
    pub fn complete_callback(&self, value: Value) {
        let mut cont = self.continuation.lock().unwrap();
        cont.push_callback_response(value);
    }
}

impl std::fmt::Debug for Interpreter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interpreter")
            .field("exited", &self.has_exited())
            .finish()
    }
}
