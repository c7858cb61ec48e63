//! End-to-end tests for the ChatServer actor and the WebSocket handler.

use std::time::Duration;

use futures_util::{SinkExt, Stream, StreamExt};
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;

use pairchat::{
    handle_connection, ChatServer, ClientId, ErrorCode, LobbyStats, Presence, RoomId,
    ServerCommand, ServerMessage, ServerStats,
};

const RECV_TIMEOUT: Duration = Duration::from_secs(2);

/// A client attached directly to the actor, bypassing WebSocket
struct TestClient {
    id: ClientId,
    rx: mpsc::Receiver<ServerMessage>,
}

impl TestClient {
    async fn connect(cmd_tx: &mpsc::Sender<ServerCommand>) -> Self {
        Self::connect_with_capacity(cmd_tx, 32).await
    }

    async fn connect_with_capacity(cmd_tx: &mpsc::Sender<ServerCommand>, capacity: usize) -> Self {
        let id = ClientId::new();
        let (tx, rx) = mpsc::channel(capacity);
        cmd_tx
            .send(ServerCommand::Connect {
                client_id: id,
                sender: tx,
            })
            .await
            .unwrap();
        Self { id, rx }
    }

    async fn recv(&mut self) -> ServerMessage {
        timeout(RECV_TIMEOUT, self.rx.recv())
            .await
            .expect("timed out waiting for message")
            .expect("channel closed")
    }

    /// Assert nothing else is queued, after the actor has drained its inbox
    async fn assert_idle(&mut self, cmd_tx: &mpsc::Sender<ServerCommand>) {
        inspect(cmd_tx, self.id).await;
        assert!(self.rx.try_recv().is_err());
    }
}

fn start_server() -> mpsc::Sender<ServerCommand> {
    let (cmd_tx, cmd_rx) = mpsc::channel(256);
    tokio::spawn(ChatServer::new(cmd_rx).run());
    cmd_tx
}

async fn inspect(cmd_tx: &mpsc::Sender<ServerCommand>, client_id: ClientId) -> (Presence, LobbyStats) {
    let (reply, rx) = oneshot::channel();
    cmd_tx
        .send(ServerCommand::Inspect { client_id, reply })
        .await
        .unwrap();
    rx.await.unwrap()
}

async fn join(cmd_tx: &mpsc::Sender<ServerCommand>, client: &TestClient, name: &str, interest: &str) {
    cmd_tx
        .send(ServerCommand::Join {
            client_id: client.id,
            display_name: name.to_string(),
            interest: interest.to_string(),
        })
        .await
        .unwrap();
}

/// Joins alice then bob on "music" and drains the match notifications
async fn matched_pair(cmd_tx: &mpsc::Sender<ServerCommand>) -> (TestClient, TestClient, RoomId) {
    let mut alice = TestClient::connect(cmd_tx).await;
    let mut bob = TestClient::connect(cmd_tx).await;

    join(cmd_tx, &alice, "alice", "music").await;
    assert!(matches!(alice.recv().await, ServerMessage::Waiting { .. }));
    join(cmd_tx, &bob, "bob", "music").await;

    for client in [&mut alice, &mut bob] {
        assert!(matches!(client.recv().await, ServerMessage::Matched { .. }));
        assert!(matches!(client.recv().await, ServerMessage::Chat { .. }));
    }

    let room_id = RoomId::for_pair(alice.id, bob.id);
    (alice, bob, room_id)
}

#[tokio::test]
async fn test_match_then_notice_then_chat() {
    let cmd_tx = start_server();
    let mut alice = TestClient::connect(&cmd_tx).await;
    let mut bob = TestClient::connect(&cmd_tx).await;

    join(&cmd_tx, &alice, "alice", "music").await;
    assert_eq!(
        alice.recv().await,
        ServerMessage::Waiting {
            interest: "music".into()
        }
    );

    join(&cmd_tx, &bob, "bob", "music").await;
    let room_id = RoomId::for_pair(alice.id, bob.id);

    assert_eq!(
        bob.recv().await,
        ServerMessage::Matched {
            room_id: room_id.to_string(),
            partner: "alice".into()
        }
    );
    assert_eq!(
        alice.recv().await,
        ServerMessage::Matched {
            room_id: room_id.to_string(),
            partner: "bob".into()
        }
    );

    for client in [&mut alice, &mut bob] {
        match client.recv().await {
            ServerMessage::Chat { display_name, body } => {
                assert_eq!(display_name, "System");
                assert!(body.contains("music"));
            }
            other => panic!("expected system notice, got {:?}", other),
        }
    }

    cmd_tx
        .send(ServerCommand::Chat {
            client_id: bob.id,
            room_id: room_id.clone(),
            display_name: "bob".into(),
            body: "hey".into(),
        })
        .await
        .unwrap();

    let expected = ServerMessage::Chat {
        display_name: "bob".into(),
        body: "hey".into(),
    };
    assert_eq!(alice.recv().await, expected);
    assert_eq!(bob.recv().await, expected);
}

#[tokio::test]
async fn test_leave_notifies_partner_once() {
    let cmd_tx = start_server();
    let (mut alice, mut bob, room_id) = matched_pair(&cmd_tx).await;

    cmd_tx
        .send(ServerCommand::LeaveRoom {
            client_id: alice.id,
            room_id: room_id.clone(),
        })
        .await
        .unwrap();
    assert_eq!(bob.recv().await, ServerMessage::PartnerDisconnected);

    // Chat into the closed room and a repeated leave both go nowhere
    cmd_tx
        .send(ServerCommand::Chat {
            client_id: bob.id,
            room_id: room_id.clone(),
            display_name: "bob".into(),
            body: "anyone?".into(),
        })
        .await
        .unwrap();
    cmd_tx
        .send(ServerCommand::LeaveRoom {
            client_id: alice.id,
            room_id,
        })
        .await
        .unwrap();

    alice.assert_idle(&cmd_tx).await;
    bob.assert_idle(&cmd_tx).await;

    let (presence, stats) = inspect(&cmd_tx, bob.id).await;
    assert_eq!(presence, Presence::Idle);
    assert_eq!(stats, LobbyStats::default());
}

#[tokio::test]
async fn test_disconnect_while_matched() {
    let cmd_tx = start_server();
    let (alice, mut bob, _) = matched_pair(&cmd_tx).await;

    cmd_tx
        .send(ServerCommand::Disconnect { client_id: alice.id })
        .await
        .unwrap();
    assert_eq!(bob.recv().await, ServerMessage::PartnerDisconnected);

    cmd_tx
        .send(ServerCommand::Disconnect { client_id: alice.id })
        .await
        .unwrap();
    bob.assert_idle(&cmd_tx).await;
}

#[tokio::test]
async fn test_disconnect_while_waiting() {
    let cmd_tx = start_server();
    let mut alice = TestClient::connect(&cmd_tx).await;
    let mut bob = TestClient::connect(&cmd_tx).await;

    join(&cmd_tx, &alice, "alice", "books").await;
    assert!(matches!(alice.recv().await, ServerMessage::Waiting { .. }));

    cmd_tx
        .send(ServerCommand::Disconnect { client_id: alice.id })
        .await
        .unwrap();

    join(&cmd_tx, &bob, "bob", "books").await;
    assert_eq!(
        bob.recv().await,
        ServerMessage::Waiting {
            interest: "books".into()
        }
    );

    let (presence, stats) = inspect(&cmd_tx, bob.id).await;
    assert_eq!(
        presence,
        Presence::Waiting {
            interest: "books".into()
        }
    );
    assert_eq!(stats, LobbyStats { waiting: 1, rooms: 0 });
}

#[tokio::test]
async fn test_double_join_rejected() {
    let cmd_tx = start_server();
    let mut alice = TestClient::connect(&cmd_tx).await;

    join(&cmd_tx, &alice, "alice", "music").await;
    assert!(matches!(alice.recv().await, ServerMessage::Waiting { .. }));

    join(&cmd_tx, &alice, "alice", "music").await;
    match alice.recv().await {
        ServerMessage::Error { code, .. } => assert_eq!(code, ErrorCode::AlreadyWaiting),
        other => panic!("expected error, got {:?}", other),
    }

    let (_, stats) = inspect(&cmd_tx, alice.id).await;
    assert_eq!(stats.waiting, 1);
}

#[tokio::test]
async fn test_concurrent_joins_always_pair() {
    let cmd_tx = start_server();
    let mut clients = Vec::new();
    for _ in 0..10 {
        clients.push(TestClient::connect(&cmd_tx).await);
    }

    let mut tasks = Vec::new();
    for client in &clients {
        let cmd_tx = cmd_tx.clone();
        let client_id = client.id;
        tasks.push(tokio::spawn(async move {
            cmd_tx
                .send(ServerCommand::Join {
                    client_id,
                    display_name: "anon".into(),
                    interest: "chess".into(),
                })
                .await
                .unwrap();
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    let (_, stats) = inspect(&cmd_tx, clients[0].id).await;
    assert_eq!(stats, LobbyStats { waiting: 0, rooms: 5 });
}

async fn stats(cmd_tx: &mpsc::Sender<ServerCommand>) -> ServerStats {
    let (reply, rx) = oneshot::channel();
    cmd_tx.send(ServerCommand::Stats { reply }).await.unwrap();
    rx.await.unwrap()
}

#[tokio::test]
async fn test_stalled_client_does_not_block_server() {
    let cmd_tx = start_server();
    // Alice never reads her channel
    let alice = TestClient::connect_with_capacity(&cmd_tx, 4).await;
    let mut bob = TestClient::connect_with_capacity(&cmd_tx, 128).await;
    let carol = TestClient::connect(&cmd_tx).await;

    join(&cmd_tx, &alice, "alice", "music").await;
    join(&cmd_tx, &bob, "bob", "music").await;

    let room_id = RoomId::for_pair(alice.id, bob.id);
    for i in 0..40 {
        cmd_tx
            .send(ServerCommand::Chat {
                client_id: bob.id,
                room_id: room_id.clone(),
                display_name: "bob".into(),
                body: format!("msg {}", i),
            })
            .await
            .unwrap();
    }

    // The actor still answers commands about unrelated clients
    let (presence, _) = timeout(RECV_TIMEOUT, inspect(&cmd_tx, carol.id))
        .await
        .expect("server blocked by a client that stopped reading");
    assert_eq!(presence, Presence::Idle);

    // Alice was dropped once her channel filled, and her room torn down
    let (presence, lobby) = inspect(&cmd_tx, alice.id).await;
    assert_eq!(presence, Presence::Idle);
    assert_eq!(lobby, LobbyStats::default());
    assert_eq!(
        stats(&cmd_tx).await,
        ServerStats {
            clients: 2,
            waiting: 0,
            rooms: 0
        }
    );

    let mut received = Vec::new();
    while let Ok(msg) = bob.rx.try_recv() {
        received.push(msg);
    }
    let chat = |body: &str| ServerMessage::Chat {
        display_name: "bob".into(),
        body: body.into(),
    };
    assert!(matches!(received[0], ServerMessage::Matched { .. }));
    assert_eq!(
        received[2..].to_vec(),
        vec![chat("msg 0"), chat("msg 1"), ServerMessage::PartnerDisconnected]
    );
}

#[tokio::test]
async fn test_stats_counts_clients() {
    let cmd_tx = start_server();
    let alice = TestClient::connect(&cmd_tx).await;
    let _bob = TestClient::connect(&cmd_tx).await;

    join(&cmd_tx, &alice, "alice", "films").await;

    assert_eq!(
        stats(&cmd_tx).await,
        ServerStats {
            clients: 2,
            waiting: 1,
            rooms: 0
        }
    );
}

/// Read the next JSON text frame from a WebSocket client
async fn next_json<S>(ws: &mut S) -> Value
where
    S: Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    loop {
        let msg = timeout(RECV_TIMEOUT, ws.next())
            .await
            .expect("timed out waiting for frame")
            .expect("stream ended")
            .expect("websocket error");
        if let Message::Text(text) = msg {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

#[tokio::test]
async fn test_websocket_pairing() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let cmd_tx = start_server();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(handle_connection(stream, cmd_tx.clone()));
        }
    });

    let url = format!("ws://{}", addr);
    let (mut alice, _) = tokio_tungstenite::connect_async(url.as_str()).await.unwrap();
    let (mut bob, _) = tokio_tungstenite::connect_async(url.as_str()).await.unwrap();

    assert_eq!(next_json(&mut alice).await["type"], "connected");
    assert_eq!(next_json(&mut bob).await["type"], "connected");

    // Malformed frames produce an error but keep the socket open
    alice
        .send(Message::Text(r#"{"type":"join"}"#.into()))
        .await
        .unwrap();
    let err = next_json(&mut alice).await;
    assert_eq!(err["type"], "error");
    assert_eq!(err["code"], "invalid_message");

    alice
        .send(Message::Text(
            r#"{"type":"join","display_name":"alice","interest":"music"}"#.into(),
        ))
        .await
        .unwrap();
    assert_eq!(next_json(&mut alice).await["type"], "waiting");

    bob.send(Message::Text(
        r#"{"type":"join","display_name":"bob","interest":"music"}"#.into(),
    ))
    .await
    .unwrap();

    let matched = next_json(&mut bob).await;
    assert_eq!(matched["type"], "matched");
    assert_eq!(matched["partner"], "alice");
    let room_id = matched["room_id"].as_str().unwrap().to_string();

    let alice_matched = next_json(&mut alice).await;
    assert_eq!(alice_matched["room_id"], room_id.as_str());
    assert_eq!(alice_matched["partner"], "bob");

    for ws in [&mut alice, &mut bob] {
        let notice = next_json(ws).await;
        assert_eq!(notice["type"], "chat");
        assert_eq!(notice["display_name"], "System");
    }

    // Dropping alice's socket must notify bob
    alice.close(None).await.unwrap();
    drop(alice);

    assert_eq!(next_json(&mut bob).await["type"], "partner_disconnected");
}
