//! Integration tests: exercise the interpreter/collection/runner stack
//! end-to-end, including a real loopback TCP connection driving the demo
//! protocol.

#[path = "../src/demo.rs"]
mod demo;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use protocol_core::collection::InterpreterCollectionManager;
use protocol_core::interpreter::Interpreter;
use protocol_core::runner::{CallbackFn, InterpreterRunner};
use protocol_core::value::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

fn double_callbacks() -> BTreeMap<String, CallbackFn> {
    let mut callbacks: BTreeMap<String, CallbackFn> = BTreeMap::new();
    callbacks.insert(
        "double".to_string(),
        Arc::new(|args: Vec<Value>| match args.first() {
            Some(Value::Int32(n)) => Value::Int32(n.saturating_mul(2)),
            _ => Value::type_error("double expects a single Int32 argument"),
        }),
    );
    callbacks
}

async fn accept_one(listener: TcpListener, manager: Arc<InterpreterCollectionManager>) {
    let (mut socket, _) = listener.accept().await.unwrap();
    let interpreter = Arc::new(Interpreter::new(&demo::build_program()));
    manager.insert(0, interpreter.clone()).unwrap();
    manager.wake_up_interpreter.notify();

    let mut buf = [0u8; 256];
    loop {
        if let Ok(n) = tokio::time::timeout(Duration::from_millis(50), socket.read(&mut buf)).await
        {
            match n {
                Ok(0) => {
                    interpreter.inbound.close();
                    manager.wake_up_interpreter.notify();
                }
                Ok(n) => {
                    interpreter.inbound.extend_back(buf[..n].iter().copied());
                    manager.wake_up_interpreter.notify();
                }
                Err(_) => break,
            }
        }
        let pending = interpreter.outbound.drain_all();
        if !pending.is_empty() {
            let _ = socket.write_all(&pending).await;
        }
        if interpreter.has_exited() && interpreter.outbound.is_empty() {
            break;
        }
    }
}

/// Full lifecycle over a real socket: connect, send a number, get back the
/// doubled answer, server-side interpreter exits cleanly.
#[tokio::test]
async fn test_full_lifecycle_over_tcp() {
    let manager = Arc::new(InterpreterCollectionManager::new());
    let runner = Arc::new(InterpreterRunner::new(manager.clone(), double_callbacks()));
    let exit_when_done = runner.exit_when_done_handle();
    let _handles = runner.clone().spawn();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(accept_one(listener, manager.clone()));

    let mut client = TcpStream::connect(addr).await.unwrap();
    client.write_all(b"21\n").await.unwrap();

    let mut response = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        let n = client.read(&mut byte).await.unwrap();
        if n == 0 || byte[0] == b'\n' {
            break;
        }
        response.push(byte[0]);
    }
    assert_eq!(response, b"42");

    server.await.unwrap();
    exit_when_done.store(true, std::sync::atomic::Ordering::Release);
}

/// Two sequential connections each get their own independent interpreter
/// state; the second is unaffected by the first having already exited.
#[tokio::test]
async fn test_collection_reuses_slot_after_exit() {
    let manager = Arc::new(InterpreterCollectionManager::new());

    let first = Arc::new(Interpreter::new(&demo::build_program()));
    manager.insert(7, first.clone()).unwrap();
    assert!(
        manager.insert(7, first.clone()).is_err(),
        "refuses to clobber a live interpreter"
    );

    // Drive the first interpreter to completion by hand.
    first.inbound.extend_back(b"1\n".iter().copied());
    first.drive();
    let (name, args) = first.callback_requests.pop_front().unwrap();
    assert_eq!(name, "double");
    first.complete_callback(Value::Int32(match args[0] {
        Value::Int32(n) => n * 2,
        _ => panic!("expected Int32"),
    }));
    first.drive();
    assert!(first.has_exited());

    let second = Arc::new(Interpreter::new(&demo::build_program()));
    manager
        .insert(7, second)
        .expect("may reinsert once the prior interpreter has exited");
    assert_eq!(manager.snapshot().len(), 1);
}

/// A callback name with no registered handler surfaces as a name error
/// instead of hanging the interpreter.
#[tokio::test]
async fn test_unregistered_callback_yields_name_error() {
    let interpreter = Arc::new(Interpreter::new(&demo::build_program()));
    interpreter.inbound.extend_back(b"5\n".iter().copied());
    interpreter.drive();

    let (name, _args) = interpreter.callback_requests.pop_front().unwrap();
    assert_eq!(name, "double");
    interpreter.complete_callback(Value::name_error(name));
    interpreter.drive();

    assert!(interpreter.has_exited());
}
