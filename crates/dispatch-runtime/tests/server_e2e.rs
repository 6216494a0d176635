//! End-to-end tests over a real socket

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use dispatch_core::{Action, State};
use dispatch_runtime::{ClientFrame, DispatchServer, HubStats, ServerConfig, ServerFrame, ServerResult};
use dispatch_state::{FileSnapshot, MemorySnapshot, SnapshotStore};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct Running {
    addr: SocketAddr,
    stop: oneshot::Sender<()>,
    task: JoinHandle<ServerResult<HubStats>>,
}

impl Running {
    async fn stop(self) -> HubStats {
        let _ = self.stop.send(());
        self.task.await.unwrap().unwrap()
    }
}

async fn start<S: SnapshotStore + 'static>(snapshot: S) -> Running {
    let config = ServerConfig {
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        ..ServerConfig::default()
    };
    let server = DispatchServer::bind(&config, snapshot).await.unwrap();
    let addr = server.local_addr().unwrap();
    let (stop, stopped) = oneshot::channel::<()>();
    let task = tokio::spawn(server.run(async move {
        let _ = stopped.await;
    }));
    Running { addr, stop, task }
}

async fn connect(addr: SocketAddr) -> Client {
    let (client, _) = connect_async(format!("ws://{addr}/ws")).await.unwrap();
    client
}

async fn next_board(client: &mut Client) -> State {
    loop {
        let message = tokio::time::timeout(Duration::from_secs(5), client.next())
            .await
            .expect("timed out waiting for sync")
            .expect("socket closed")
            .unwrap();
        if let Message::Text(text) = message {
            let ServerFrame::Sync(state) = ServerFrame::decode(&text).unwrap();
            return state;
        }
    }
}

async fn send(client: &mut Client, action: Action) {
    let text = ClientFrame::Action(action).encode().unwrap();
    client.send(Message::Text(text)).await.unwrap();
}

#[tokio::test]
async fn test_three_clients_see_identical_sync() {
    let snapshot = MemorySnapshot::new();
    let server = start(snapshot.clone()).await;

    let mut clients = Vec::new();
    for _ in 0..3 {
        let mut client = connect(server.addr).await;
        assert_eq!(next_board(&mut client).await, State::initial());
        clients.push(client);
    }

    send(&mut clients[1], Action::add_doctor("Dr. Martin", "Pneumologie")).await;

    let mut boards = Vec::new();
    for client in &mut clients {
        boards.push(next_board(client).await);
    }
    assert_eq!(boards[0], boards[1]);
    assert_eq!(boards[1], boards[2]);
    assert_eq!(boards[0].doctors.len(), 1);
    assert_eq!(snapshot.writes(), 1);

    for mut client in clients {
        client.close(None).await.unwrap();
    }
    let stats = server.stop().await;
    assert_eq!(stats.actions_applied, 1);
    assert_eq!(stats.sessions_opened, 3);
}

#[tokio::test]
async fn test_move_is_broadcast_to_sender() {
    let server = start(MemorySnapshot::new()).await;
    let mut client = connect(server.addr).await;
    next_board(&mut client).await;

    send(&mut client, Action::add_doctor("Dr. Petit", "Urgences")).await;
    let board = next_board(&mut client).await;
    let doctor = board.doctors[0].id.clone();

    send(&mut client, Action::move_doctor(doctor.clone(), None, Some("intervention".into()))).await;
    let board = next_board(&mut client).await;
    assert_eq!(board.location_of(&doctor).map(|id| id.as_str()), Some("intervention"));

    server.stop().await;
}

#[tokio::test]
async fn test_garbage_frames_are_ignored() {
    let snapshot = MemorySnapshot::new();
    let server = start(snapshot.clone()).await;
    let mut client = connect(server.addr).await;
    next_board(&mut client).await;

    client.send(Message::Text("hello".to_string())).await.unwrap();
    client
        .send(Message::Text(json!({"event": "chat", "data": "hi"}).to_string()))
        .await
        .unwrap();
    // Unknown kinds are still confirmed with a sync
    client
        .send(Message::Text(
            json!({"event": "action", "data": {"type": "UNDO"}}).to_string(),
        ))
        .await
        .unwrap();

    assert_eq!(next_board(&mut client).await, State::initial());
    assert_eq!(snapshot.writes(), 1);

    server.stop().await;
}

#[tokio::test]
async fn test_odd_action_data_is_confirmed() {
    let snapshot = MemorySnapshot::new();
    let server = start(snapshot.clone()).await;
    let mut client = connect(server.addr).await;
    next_board(&mut client).await;

    for data in [json!(5), json!("x"), json!({"type": 5})] {
        client
            .send(Message::Text(json!({"event": "action", "data": data}).to_string()))
            .await
            .unwrap();
        assert_eq!(next_board(&mut client).await, State::initial());
    }
    assert_eq!(snapshot.writes(), 3);

    server.stop().await;
}

#[tokio::test]
async fn test_board_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data.json");

    let server = start(FileSnapshot::new(&path)).await;
    let mut client = connect(server.addr).await;
    next_board(&mut client).await;
    send(&mut client, Action::add_location("Bloc B", "intervention")).await;
    let saved = next_board(&mut client).await;
    client.close(None).await.unwrap();
    server.stop().await;

    let server = start(FileSnapshot::new(&path)).await;
    let mut client = connect(server.addr).await;
    assert_eq!(next_board(&mut client).await, saved);
    server.stop().await;
}

#[tokio::test]
async fn test_ping() {
    let server = start(MemorySnapshot::new()).await;

    let body: Value = reqwest::get(format!("http://{}/api/ping", server.addr))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body, json!({"message": "pong"}));

    server.stop().await;
}
