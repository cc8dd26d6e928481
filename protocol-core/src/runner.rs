//! The interpreter runner: the two threads that cooperatively drive every
//! interpreter in a collection — one advancing continuations, one
//! dispatching callbacks to the host.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::collection::InterpreterCollectionManager;
use crate::value::Value;

/// A host-registered function a `UnaryCallback` operation can invoke by name.
pub type CallbackFn = Arc<dyn Fn(Vec<Value>) -> Value + Send + Sync>;

const POLL_INTERVAL: Duration = Duration::from_millis(200);

pub struct InterpreterRunner {
    manager: Arc<InterpreterCollectionManager>,
    callbacks: BTreeMap<String, CallbackFn>,
    exit_when_done: Arc<AtomicBool>,
}

/// Join handles for the runner's two threads.
pub struct RunnerHandles {
    pub interpreter_thread: std::thread::JoinHandle<()>,
    pub callback_thread: std::thread::JoinHandle<()>,
}

impl InterpreterRunner {
    pub fn new(
        manager: Arc<InterpreterCollectionManager>,
        callbacks: BTreeMap<String, CallbackFn>,
    ) -> InterpreterRunner {
        InterpreterRunner {
            manager,
            callbacks,
            exit_when_done: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Signals both loops to stop once currently-live interpreters finish or
    /// block, instead of waiting indefinitely for new work.
    pub fn exit_when_done_handle(&self) -> Arc<AtomicBool> {
        self.exit_when_done.clone()
    }

    pub fn spawn(self: Arc<Self>) -> RunnerHandles {
        let interpreter_runner = self.clone();
        let interpreter_thread = std::thread::Builder::new()
            .name("protocol-interpreter".into())
            .spawn(move || interpreter_runner.interpreter_loop())
            .expect("failed to spawn interpreter thread");

        let callback_runner = self;
        let callback_thread = std::thread::Builder::new()
            .name("protocol-callback".into())
            .spawn(move || callback_runner.callback_loop())
            .expect("failed to spawn callback thread");

        RunnerHandles {
            interpreter_thread,
            callback_thread,
        }
    }

    fn interpreter_loop(&self) {
        loop {
            let done = self.exit_when_done.load(Ordering::Acquire);
            self.manager.wake_up_interpreter.wait_timeout(POLL_INTERVAL);

            let snapshot = self.manager.snapshot();
            if snapshot.is_empty() && done {
                debug!("interpreter loop exiting: collection empty and exit_when_done set");
                return;
            }
            for (id, interpreter) in snapshot.iter() {
                if interpreter.has_exited() {
                    continue;
                }
                debug!(connection = id, "stepping interpreter");
                interpreter.drive();
            }
        }
    }

    fn callback_loop(&self) {
        loop {
            let done = self.exit_when_done.load(Ordering::Acquire);
            self.manager.wake_up_for_callback.wait_timeout(POLL_INTERVAL);

            let snapshot = self.manager.snapshot();
            if snapshot.is_empty() && done {
                debug!("callback loop exiting: collection empty and exit_when_done set");
                return;
            }
            for (id, interpreter) in snapshot.iter() {
                let Some((name, args)) = interpreter.callback_requests.pop_front() else {
                    continue;
                };
                let response = match self.callbacks.get(&name) {
                    Some(f) => f(args),
                    None => {
                        warn!(connection = id, callback = name, "no handler registered");
                        Value::name_error(name.clone())
                    }
                };
                interpreter.complete_callback(response);
                interpreter.drive();
            }
        }
    }
}
