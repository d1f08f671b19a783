//! End-to-end push tests against a local WebSocket server.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::Response;
use axum::routing::get;
use parking_lot::Mutex;
use stackit_notify::{
    ConnectionState, CredentialStore, MemorySource, NotificationStore, PushClient, PushEndpoint,
    RetryPolicy, StoreConfig,
};
use tokio::sync::watch;

#[derive(Default)]
struct ServerLog {
    tokens: Vec<String>,
    client_close_codes: Vec<u16>,
}

type SharedLog = Arc<Mutex<ServerLog>>;

async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<HashMap<String, String>>,
    State(log): State<SharedLog>,
) -> Response {
    let token = params.get("token").cloned().unwrap_or_default();
    ws.on_upgrade(move |socket| serve_socket(socket, token, log))
}

/// First connection: one event, then an abnormal server close (1011).
/// Token "rejected": close 4001. Later connections: one event, then stay
/// open until the client closes.
async fn serve_socket(mut socket: WebSocket, token: String, log: SharedLog) {
    let connection = {
        let mut log = log.lock();
        log.tokens.push(token.clone());
        log.tokens.len()
    };

    if token == "rejected" {
        let _ = socket
            .send(Message::Close(Some(CloseFrame {
                code: 4001,
                reason: "invalid token".to_string().into(),
            })))
            .await;
        return;
    }

    let payload = format!(r#"{{"msg":"event {}","unread_count":{}}}"#, connection, connection);
    if socket.send(Message::Text(payload.into())).await.is_err() {
        return;
    }

    if connection == 1 {
        let _ = socket
            .send(Message::Close(Some(CloseFrame {
                code: 1011,
                reason: "restarting".to_string().into(),
            })))
            .await;
        return;
    }

    while let Some(Ok(message)) = socket.recv().await {
        if let Message::Close(frame) = message {
            let code = frame.map(|f| f.code).unwrap_or(1005);
            log.lock().client_close_codes.push(code);
            break;
        }
    }
}

async fn start_server() -> (SocketAddr, SharedLog) {
    let log = SharedLog::default();
    let app = Router::new()
        .route("/notifications/ws", get(ws_handler))
        .with_state(log.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, log)
}

fn client_for(addr: SocketAddr, session: &CredentialStore) -> PushClient {
    let store = NotificationStore::new(Arc::new(MemorySource::default()), StoreConfig::default());
    let endpoint = PushEndpoint::from_base(&format!("http://{}", addr)).unwrap();
    PushClient::builder(Arc::new(session.clone()), store, endpoint)
        .retry_policy(RetryPolicy::fixed(Duration::from_millis(100)))
        .connect_timeout(Some(Duration::from_secs(5)))
        .spawn()
}

async fn wait_for(status: &mut watch::Receiver<ConnectionState>, state: ConnectionState) {
    tokio::time::timeout(Duration::from_secs(5), status.wait_for(|s| *s == state))
        .await
        .expect("timed out waiting for state")
        .expect("driver stopped");
}

#[tokio::test]
async fn test_receives_events_and_reconnects_after_abnormal_close() {
    let (addr, log) = start_server().await;
    let session = CredentialStore::with_token("good");
    let client = client_for(addr, &session);
    let mut events = client.subscribe();

    let first = tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.message, "event 1");
    assert_eq!(client.store().unread_count(), 1);

    // The server drops the first connection with 1011; the client comes back.
    let second = tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(second.unread_count, 2);
    assert_eq!(client.store().unread_count(), 2);

    let mut status = client.status_receiver();
    wait_for(&mut status, ConnectionState::Open).await;
    assert_eq!(log.lock().tokens, vec!["good".to_string(), "good".to_string()]);

    client.shutdown().await;
}

#[tokio::test]
async fn test_logout_closes_with_normal_code_and_stays_closed() {
    let (addr, log) = start_server().await;
    // Skip the scripted abnormal close on connection 1.
    log.lock().tokens.push("warmup".to_string());

    let session = CredentialStore::with_token("good");
    let client = client_for(addr, &session);
    let mut status = client.status_receiver();
    wait_for(&mut status, ConnectionState::Open).await;

    session.logout();
    wait_for(&mut status, ConnectionState::Idle).await;

    tokio::time::sleep(Duration::from_millis(500)).await;
    let log = log.lock();
    assert_eq!(log.tokens.len(), 2);
    assert_eq!(log.client_close_codes, vec![1000]);
    drop(log);

    client.shutdown().await;
}

#[tokio::test]
async fn test_rejected_credential_is_retried() {
    let (addr, log) = start_server().await;
    let session = CredentialStore::with_token("rejected");
    let client = client_for(addr, &session);

    tokio::time::timeout(Duration::from_secs(5), async {
        while log.lock().tokens.len() < 3 {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("client did not retry after 4001");

    client.shutdown().await;
}

#[tokio::test]
async fn test_unreachable_server_keeps_retrying_until_shutdown() {
    // Bind then drop to get a port nobody listens on.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let session = CredentialStore::with_token("good");
    let client = client_for(addr, &session);
    let mut status = client.status_receiver();
    wait_for(&mut status, ConnectionState::WaitingToRetry).await;

    client.shutdown().await;
    assert_eq!(*status.borrow(), ConnectionState::Idle);
}
