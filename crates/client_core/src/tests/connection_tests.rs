use super::*;
use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
        State,
    },
    routing::get,
    Router,
};
use shared::protocol::{Command, CraneState, MoveTarget};
use tokio::{net::TcpListener, time::timeout};

const WAIT: Duration = Duration::from_secs(5);

#[test]
fn backoff_schedule_doubles_up_to_the_cap() {
    let delays: Vec<u64> = (0..MAX_RECONNECT_ATTEMPTS)
        .map(|retry| backoff_delay(retry).as_millis() as u64)
        .collect();
    assert_eq!(delays, vec![1_000, 2_000, 4_000, 8_000, 10_000]);
}

#[test]
fn session_url_rewrites_the_scheme_and_appends_the_connect_path() {
    let id = CraneId::new("tower-1");
    assert_eq!(
        session_url("http://localhost:7777", &id).expect("url").as_str(),
        "ws://localhost:7777/v1/robot/tower-1/connect"
    );
    assert_eq!(
        session_url("https://cranes.example/", &id)
            .expect("url")
            .as_str(),
        "wss://cranes.example/v1/robot/tower-1/connect"
    );
    assert!(session_url("ftp://cranes.example", &id).is_err());
}

#[derive(Clone)]
struct AuthorityState {
    script: Arc<Vec<String>>,
    received: mpsc::UnboundedSender<String>,
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AuthorityState>,
) -> impl axum::response::IntoResponse {
    ws.on_upgrade(move |socket| serve_socket(state, socket))
}

async fn serve_socket(state: AuthorityState, mut socket: WebSocket) {
    for frame in state.script.iter() {
        if socket
            .send(WsMessage::Text(frame.clone()))
            .await
            .is_err()
        {
            return;
        }
    }
    while let Some(Ok(frame)) = socket.recv().await {
        if let WsMessage::Text(text) = frame {
            let _ = state.received.send(text);
        }
    }
}

fn spawn_authority_on(
    listener: TcpListener,
    script: Vec<String>,
) -> (String, mpsc::UnboundedReceiver<String>) {
    let (received_tx, received_rx) = mpsc::unbounded_channel();
    let state = AuthorityState {
        script: Arc::new(script),
        received: received_tx,
    };
    let app = Router::new()
        .route("/v1/robot/:id/connect", get(ws_handler))
        .with_state(state);
    let addr = listener.local_addr().expect("listener addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("test authority");
    });
    (format!("http://{addr}"), received_rx)
}

async fn spawn_authority(script: Vec<String>) -> (String, mpsc::UnboundedReceiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    spawn_authority_on(listener, script)
}

async fn wait_for(
    state: &mut watch::Receiver<SceneState>,
    what: &str,
    pred: impl Fn(&SceneState) -> bool,
) {
    timeout(WAIT, async {
        loop {
            if pred(&state.borrow()) {
                return;
            }
            state.changed().await.expect("session task alive");
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {what}"));
}

fn update_frame(swing_deg: f64) -> String {
    serde_json::to_string(&Action::Update(CraneState {
        swing_deg,
        ..CraneState::default()
    }))
    .expect("frame")
}

#[tokio::test]
async fn connecting_dispatches_liveness_and_applies_updates_in_order() {
    let (url, _received) = spawn_authority(vec![update_frame(10.0), update_frame(20.0)]).await;
    let session =
        CraneSession::connect(&url, &CraneId::new("c1"), SceneState::default()).expect("session");

    let mut state = session.state();
    wait_for(&mut state, "second update", |s| s.crane.swing_deg == 20.0).await;
    assert!(state.borrow().connected);
}

#[tokio::test]
async fn malformed_frames_are_dropped_without_killing_the_session() {
    let script = vec![
        "not json at all".to_string(),
        r#"{"type":"teleport","payload":{}}"#.to_string(),
        update_frame(33.0),
    ];
    let (url, _received) = spawn_authority(script).await;
    let session =
        CraneSession::connect(&url, &CraneId::new("c1"), SceneState::default()).expect("session");

    let mut state = session.state();
    wait_for(&mut state, "update after malformed frames", |s| {
        s.crane.swing_deg == 33.0
    })
    .await;
    assert!(state.borrow().connected);
}

#[tokio::test]
async fn local_only_actions_from_the_peer_are_refused() {
    let script = vec![
        r#"{"type":"debug-mode","payload":true}"#.to_string(),
        r#"{"type":"connect","payload":false}"#.to_string(),
        update_frame(5.0),
    ];
    let (url, _received) = spawn_authority(script).await;
    let session =
        CraneSession::connect(&url, &CraneId::new("c1"), SceneState::default()).expect("session");

    let mut state = session.state();
    wait_for(&mut state, "trailing update", |s| s.crane.swing_deg == 5.0).await;
    let scene = state.borrow().clone();
    assert!(!scene.debug_mode);
    assert!(scene.connected);
}

#[tokio::test]
async fn wire_intents_reach_the_authority_and_local_actions_do_not() {
    let (url, mut received) = spawn_authority(Vec::new()).await;
    let session =
        CraneSession::connect(&url, &CraneId::new("c1"), SceneState::default()).expect("session");
    let mut state = session.state();
    wait_for(&mut state, "open link", |s| s.connected).await;

    let updater = session.updater();
    updater.update(Action::DebugMode(true));
    updater.update(Action::Command(vec![Command::LiftUp]));
    updater.update(Action::Move(MoveTarget {
        x: 1.0,
        y: 2.0,
        z: 3.0,
    }));

    let first = timeout(WAIT, received.recv()).await.expect("frame").expect("open");
    assert_eq!(
        serde_json::from_str::<Action>(&first).expect("action"),
        Action::Command(vec![Command::LiftUp])
    );
    let second = timeout(WAIT, received.recv()).await.expect("frame").expect("open");
    assert!(matches!(
        serde_json::from_str::<Action>(&second).expect("action"),
        Action::Move(_)
    ));

    // The debug toggle was applied locally instead of being transmitted.
    wait_for(&mut state, "local debug flag", |s| s.debug_mode).await;
    assert!(received.try_recv().is_err());
}

#[tokio::test]
async fn intents_sent_while_disconnected_are_dropped_not_replayed() {
    // Reserve a port, then bring the authority up only after the first
    // connection attempt has already failed.
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let session = CraneSession::connect(
        &format!("http://{addr}"),
        &CraneId::new("c1"),
        SceneState::default(),
    )
    .expect("session");
    let mut state = session.state();
    wait_for(&mut state, "first failure", |s| !s.connected).await;

    session.updater().update(Action::Command(vec![Command::LiftUp]));

    let listener = TcpListener::bind(addr).await.expect("rebind reserved port");
    let (_url, mut received) = spawn_authority_on(listener, Vec::new());
    wait_for(&mut state, "reconnect", |s| s.connected).await;

    session
        .updater()
        .update(Action::Command(vec![Command::SwingLeft]));
    let frame = timeout(WAIT, received.recv()).await.expect("frame").expect("open");
    assert_eq!(
        serde_json::from_str::<Action>(&frame).expect("action"),
        Action::Command(vec![Command::SwingLeft])
    );
    assert!(
        received.try_recv().is_err(),
        "the pre-reconnect intent must not have been queued"
    );
}
