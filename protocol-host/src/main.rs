mod demo;

use std::collections::BTreeMap;
use std::sync::Arc;

use protocol_core::collection::{ConnectionId, InterpreterCollectionManager};
use protocol_core::interpreter::Interpreter;
use protocol_core::runner::{CallbackFn, InterpreterRunner};
use protocol_core::value::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let addr = listen_address();

    let manager = Arc::new(InterpreterCollectionManager::new());

    let mut callbacks: BTreeMap<String, CallbackFn> = BTreeMap::new();
    callbacks.insert(
        "double".to_string(),
        Arc::new(|args: Vec<Value>| match args.first() {
            Some(Value::Int32(n)) => Value::Int32(n.saturating_mul(2)),
            _ => Value::type_error("double expects a single Int32 argument"),
        }),
    );

    let runner = Arc::new(InterpreterRunner::new(manager.clone(), callbacks));
    let _handles = runner.clone().spawn();

    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "protocol-host listening");

    let program = demo::build_program();
    let mut next_id: ConnectionId = 0;
    loop {
        let (socket, peer) = listener.accept().await?;
        let id = next_id;
        next_id += 1;

        let interpreter = Arc::new(Interpreter::new(&program));
        let result_rx = interpreter.take_result_receiver();
        manager.insert(id, interpreter.clone())?;

        tracing::info!(connection = id, %peer, "accepted connection");
        let wake = manager.wake_up_interpreter.clone();
        tokio::spawn(serve_connection(socket, interpreter, wake, result_rx, id));
    }
}

async fn serve_connection(
    mut socket: tokio::net::TcpStream,
    interpreter: Arc<Interpreter>,
    wake_up_interpreter: Arc<protocol_core::support::notify::NotificationSignal>,
    result_rx: tokio::sync::oneshot::Receiver<Value>,
    id: ConnectionId,
) {
    let (mut read_half, mut write_half) = socket.split();
    let mut buf = [0u8; 4096];

    let read_task = async {
        loop {
            match read_half.read(&mut buf).await {
                Ok(0) => {
                    interpreter.inbound.close();
                    wake_up_interpreter.notify();
                    break;
                }
                Ok(n) => {
                    interpreter.inbound.extend_back(buf[..n].iter().copied());
                    wake_up_interpreter.notify();
                }
                Err(e) => {
                    tracing::warn!(connection = id, error = %e, "read error");
                    break;
                }
            }
        }
    };

    let write_task = async {
        loop {
            let pending = interpreter.outbound.drain_all();
            if pending.is_empty() {
                if interpreter.has_exited() {
                    break;
                }
                tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                continue;
            }
            if write_half.write_all(&pending).await.is_err() {
                break;
            }
        }
    };

    tokio::select! {
        _ = read_task => {}
        _ = write_task => {}
        _ = result_rx => {}
    }
    tracing::info!(connection = id, "connection finished");
}

/// `--listen <addr>` CLI arg or `PROTOCOL_HOST_LISTEN` env var, default `127.0.0.1:7878`.
fn listen_address() -> String {
    let args: Vec<String> = std::env::args().collect();
    if let Some(addr) = args.windows(2).find(|w| w[0] == "--listen").map(|w| w[1].clone()) {
        return addr;
    }
    std::env::var("PROTOCOL_HOST_LISTEN").unwrap_or_else(|_| "127.0.0.1:7878".to_string())
}
