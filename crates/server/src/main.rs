use std::{
    net::SocketAddr,
    sync::Arc,
    time::{Duration, Instant},
};

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    http::{HeaderValue, Method, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use futures::{stream::SplitSink, SinkExt, StreamExt};
use serde::Serialize;
use shared::{
    domain::{CraneId, UserId},
    error::{ApiError, ErrorCode},
    protocol::{Action, CraneDetails},
};
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

mod config;
mod crane;
mod fleet;
mod registry;

use config::load_settings;
use crane::CraneHandle;
use fleet::Fleet;
use registry::Registry;

// Every ten seconds, check whether the client is still alive.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(10);
const CLIENT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone)]
struct AppState {
    registry: Arc<Registry>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let settings = load_settings();
    let fleet = Fleet::load(std::path::Path::new(&settings.robot_config_dir))?;
    info!(cranes = fleet.len(), "fleet loaded");

    let state = AppState {
        registry: Arc::new(Registry::new(fleet)),
    };
    let app = build_router(state, &settings.cors_allow_origin);

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, "server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: AppState, cors_allow_origin: &str) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/v1/robot", get(list_robots))
        .route("/v1/robot/:id", get(robot_details))
        .route("/v1/robot/:id/connect", get(ws_handler))
        .layer(cors_config(cors_allow_origin))
        .with_state(state)
}

fn cors_config(allow_origin: &str) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET])
        .allow_headers(Any);
    match allow_origin.parse::<HeaderValue>() {
        Ok(origin) => layer.allow_origin(origin),
        Err(_) => {
            warn!(allow_origin, "invalid CORS origin; refusing cross-origin requests");
            layer
        }
    }
}

#[derive(Serialize)]
struct Health {
    status: String,
    version: String,
    timestamp: DateTime<Utc>,
}

async fn healthz() -> Json<Health> {
    Json(Health {
        status: "Ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
    })
}

async fn list_robots(State(state): State<AppState>) -> Json<Vec<CraneDetails>> {
    Json(state.registry.all_details().await)
}

async fn robot_details(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<CraneDetails>, (StatusCode, Json<ApiError>)> {
    let handle = state.registry.get_or_create(&CraneId::new(id)).await;
    match handle.details().await {
        Some(details) => Ok(Json(details)),
        None => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiError::new(
                ErrorCode::Internal,
                "crane room is unavailable",
            )),
        )),
    }
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| ws_connection(state, socket, CraneId::new(id)))
}

async fn ws_connection(state: AppState, socket: WebSocket, id: CraneId) {
    let user = UserId::random();
    let room = state.registry.get_or_create(&id).await;
    // Subscribe before joining so nothing between the replay and the live
    // stream is missed.
    let mut events = room.subscribe();
    let (mut sender, mut receiver) = socket.split();

    for action in room.join(user).await {
        if send_action(&mut sender, &action).await.is_err() {
            room.leave(user);
            return;
        }
    }
    info!(%id, %user, "operator connected");

    let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
    let mut last_pong = Instant::now();

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(action) => {
                    if send_action(&mut sender, &action).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(%id, %user, skipped, "operator stream lagged; events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            frame = receiver.next() => match frame {
                Some(Ok(Message::Text(text))) => handle_inbound(&room, user, &text),
                Some(Ok(Message::Pong(_))) => last_pong = Instant::now(),
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    warn!(%id, %user, %err, "operator receive failed");
                    break;
                }
            },
            _ = heartbeat.tick() => {
                if last_pong.elapsed() > CLIENT_TIMEOUT {
                    warn!(%id, %user, "operator heartbeat timed out");
                    break;
                }
                if sender.send(Message::Ping(Vec::new())).await.is_err() {
                    break;
                }
            }
        }
    }

    room.leave(user);
    info!(%id, %user, "operator disconnected");
}

/// Only intents may come in from operators; anything else is dropped at this
/// boundary without touching the room.
fn handle_inbound(room: &CraneHandle, user: UserId, text: &str) {
    match serde_json::from_str::<Action>(text) {
        Ok(Action::Command(commands)) => room.set_intents(user, commands),
        Ok(Action::Move(target)) => room.move_to(target),
        Ok(other) => warn!(%user, ?other, "unexpected action from operator; dropped"),
        Err(err) => warn!(%user, %err, "dropping malformed operator frame"),
    }
}

async fn send_action(
    sender: &mut SplitSink<WebSocket, Message>,
    action: &Action,
) -> Result<(), axum::Error> {
    let text = match serde_json::to_string(action) {
        Ok(text) => text,
        Err(err) => {
            warn!(%err, "failed to serialize event; skipped");
            return Ok(());
        }
    };
    sender.send(Message::Text(text)).await
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
