#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::net::SocketAddr;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use udprpc_core::error::StatusCode;
use udprpc_core::Operation;
use udprpc_server::app_state::AppState;
use udprpc_server::client::{ClientOptions, RpcClient};
use udprpc_server::config;
use udprpc_server::transport::UdpServer;

struct Running {
    addr: SocketAddr,
    state: AppState,
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<udprpc_core::Result<()>>,
}

impl Running {
    async fn shutdown(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        self.task.await.unwrap().unwrap();
    }
}

async fn start(extra: &str) -> Running {
    let yaml = format!(
        r#"
version: 1
server:
  listen: "127.0.0.1:0"
{extra}
facilities:
  - name: F1
    open:
      - {{ day: MONDAY, start: "08:00", end: "17:00" }}
"#
    );
    let cfg = config::load_from_str(&yaml).unwrap();
    let state = AppState::new(cfg).unwrap();
    let server = UdpServer::bind(state.clone()).await.unwrap();
    let addr = server.local_addr().unwrap();
    let (tx, rx) = oneshot::channel::<()>();
    let task = tokio::spawn(server.serve(async move {
        let _ = rx.await;
    }));
    Running {
        addr,
        state,
        stop: Some(tx),
        task,
    }
}

fn quick() -> ClientOptions {
    ClientOptions {
        timeout: Duration::from_millis(300),
        max_attempts: 3,
        ..ClientOptions::default()
    }
}

#[tokio::test]
async fn call_and_duplicate_over_loopback() {
    let srv = start("").await;
    let client = RpcClient::with_options(srv.addr, quick()).await.unwrap();

    let reply = client.call(Operation::Read, "facility,ALL").await.unwrap();
    assert_eq!(reply.operation(), Operation::Read);
    assert_eq!(reply.payload(), "status:SUCCESS\nfacilityNames:F1,");

    let first = client
        .call_with_id(Operation::Write, 100, "F1,MONDAY,9,0,10,0")
        .await
        .unwrap();
    let again = client
        .call_with_id(Operation::Write, 100, "F1,MONDAY,9,0,10,0")
        .await
        .unwrap();
    assert_eq!(first, again);
    assert!(first.payload().starts_with("status:SUCCESS"));
    assert_eq!(
        srv.state.metrics().replays.get(&[("op", "WRITE")]),
        1
    );

    srv.shutdown().await;
}

#[tokio::test]
async fn echo_round_trips() {
    let srv = start("").await;
    let client = RpcClient::with_options(srv.addr, quick()).await.unwrap();

    let reply = client.call(Operation::Echo, "hello").await.unwrap();
    assert_eq!(reply.operation(), Operation::Echo);
    assert_eq!(reply.payload(), "hello");

    srv.shutdown().await;
}

#[tokio::test]
async fn garbage_datagram_gets_error_reply() {
    let srv = start("").await;
    let client = RpcClient::with_options(srv.addr, quick()).await.unwrap();

    client.send_raw(&[0x01, 0x01]).await.unwrap();
    let reply = client
        .recv_any(Duration::from_secs(1))
        .await
        .unwrap()
        .expect("error reply");
    assert_eq!(reply.request_id(), 0);
    assert!(reply.payload().starts_with("status:ERROR\nmessage:Bad request:"));

    srv.shutdown().await;
}

#[tokio::test]
async fn monitor_gets_notified_over_loopback() {
    let srv = start("").await;
    let watcher = RpcClient::with_options(srv.addr, quick()).await.unwrap();
    let booker = RpcClient::with_options(srv.addr, quick()).await.unwrap();

    let reg = watcher
        .call_with_id(Operation::Monitor, 9, "register,F1,30")
        .await
        .unwrap();
    assert!(reg.payload().starts_with("status:SUCCESS"), "{}", reg.payload());

    let listening = tokio::spawn(async move {
        watcher.listen_notifications(Duration::from_millis(800)).await
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    booker
        .call(Operation::Write, "F1,MONDAY,14,0,15,0")
        .await
        .unwrap();

    let notes = listening.await.unwrap().unwrap();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].request_id(), 9);
    assert!(notes[0].payload().contains("MONDAY:0800 - 1400,1500 - 1700,"));

    srv.shutdown().await;
}

#[tokio::test]
async fn client_gives_up_when_everything_is_dropped() {
    let srv = start("simulation:\n  drop_rate: 1.0").await;
    let client = RpcClient::with_options(
        srv.addr,
        ClientOptions {
            timeout: Duration::from_millis(100),
            max_attempts: 2,
            ..ClientOptions::default()
        },
    )
    .await
    .unwrap();

    let err = client
        .call(Operation::Read, "facility,ALL")
        .await
        .expect_err("all datagrams dropped");
    assert_eq!(err.status_code(), StatusCode::Io);
    assert_eq!(
        srv.state.metrics().simulated_drops.get(&[]),
        2
    );

    srv.shutdown().await;
}
