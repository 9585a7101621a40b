use std::time::Duration;

use anyhow::anyhow;
use futures::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use shared::{domain::CraneId, protocol::Action};
use tokio::{
    net::TcpStream,
    sync::{mpsc, watch},
    task::JoinHandle,
};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};
use url::Url;

use crate::reducer::{reduce, SceneState};

/// After this many consecutive failed connection attempts the session stays
/// disconnected until its owning scope is dropped and recreated.
pub const MAX_RECONNECT_ATTEMPTS: u32 = 5;

const BACKOFF_BASE_MS: u64 = 1_000;
const BACKOFF_CAP_MS: u64 = 10_000;

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type WsStream = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// Delay before reconnect attempt number `retry` (zero-based):
/// `min(1000 * 2^retry, 10000)` milliseconds.
pub fn backoff_delay(retry: u32) -> Duration {
    let exp = BACKOFF_BASE_MS.saturating_mul(1u64 << retry.min(32));
    Duration::from_millis(exp.min(BACKOFF_CAP_MS))
}

/// Send-and-apply handle for one crane session.
///
/// Wire-bound intents (`command`, `move`) are serialized and transmitted only
/// while the transport is open and dropped otherwise (no outbound queue —
/// at-most-once from the client). Every other variant is dispatched straight
/// into the reducer and never put on the wire.
#[derive(Clone)]
pub struct Updater {
    tx: mpsc::UnboundedSender<Action>,
}

impl Updater {
    pub fn update(&self, action: Action) {
        if self.tx.send(action).is_err() {
            debug!("crane session is gone; dropping action");
        }
    }
}

#[cfg(test)]
pub(crate) fn test_updater() -> (Updater, mpsc::UnboundedReceiver<Action>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Updater { tx }, rx)
}

/// One logical connection to the authority for a single crane identifier.
///
/// Owns the session task: all reducer application happens there, serialized
/// on one event loop, and the latest [`SceneState`] is published through a
/// watch channel for renderers to read. Dropping the session aborts the task,
/// which closes the socket and cancels any pending backoff timer.
pub struct CraneSession {
    state: watch::Receiver<SceneState>,
    updater: Updater,
    task: JoinHandle<()>,
}

impl CraneSession {
    /// Opens a session against `{server_url}/v1/robot/{id}/connect`, with the
    /// `http(s)` scheme rewritten to `ws(s)`. Must be called from within a
    /// tokio runtime.
    pub fn connect(
        server_url: &str,
        id: &CraneId,
        initial: SceneState,
    ) -> anyhow::Result<Self> {
        let url = session_url(server_url, id)?;
        let (action_tx, action_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(initial);
        let task = tokio::spawn(run_session(url, state_tx, action_rx));
        Ok(Self {
            state: state_rx,
            updater: Updater { tx: action_tx },
            task,
        })
    }

    /// Latest reconciled view model. Read-only for consumers; all mutation
    /// goes through [`CraneSession::updater`].
    pub fn state(&self) -> watch::Receiver<SceneState> {
        self.state.clone()
    }

    pub fn updater(&self) -> Updater {
        self.updater.clone()
    }
}

impl Drop for CraneSession {
    fn drop(&mut self) {
        self.task.abort();
    }
}

pub(crate) fn session_url(server_url: &str, id: &CraneId) -> anyhow::Result<Url> {
    let ws_base = if let Some(rest) = server_url.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = server_url.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        return Err(anyhow!("server url must start with http:// or https://"));
    };
    let ws_base = ws_base.trim_end_matches('/');
    Ok(Url::parse(&format!("{ws_base}/v1/robot/{id}/connect"))?)
}

async fn run_session(
    url: Url,
    state: watch::Sender<SceneState>,
    mut actions: mpsc::UnboundedReceiver<Action>,
) {
    let mut retries: u32 = 0;
    loop {
        match connect_async(url.as_str()).await {
            Ok((socket, _)) => {
                retries = 0;
                info!(%url, "crane session established");
                apply(&state, &Action::Connect(true));
                let (sink, stream) = socket.split();
                let open = serve_link(&state, &mut actions, sink, stream).await;
                info!(%url, "crane session lost");
                apply(&state, &Action::Connect(false));
                if !open {
                    return;
                }
            }
            Err(err) => {
                warn!(%url, %err, "crane session connect failed");
                apply(&state, &Action::Connect(false));
            }
        }

        if retries >= MAX_RECONNECT_ATTEMPTS {
            info!(%url, "max reconnection attempts reached");
            break;
        }

        let delay = backoff_delay(retries);
        retries += 1;
        info!(
            delay_ms = delay.as_millis() as u64,
            attempt = retries,
            max_attempts = MAX_RECONNECT_ATTEMPTS,
            "scheduling crane session reconnect"
        );
        if !wait_for_reconnect(&state, &mut actions, delay).await {
            return;
        }
    }

    // Terminal for this session instance: keep serving local dispatches and
    // dropping wire-bound intents until the owning scope is torn down.
    while let Some(action) = actions.recv().await {
        route(&state, None, action).await;
    }
}

/// Serves one open link until it closes. Returns false when the session scope
/// itself has gone away (every updater dropped).
async fn serve_link(
    state: &watch::Sender<SceneState>,
    actions: &mut mpsc::UnboundedReceiver<Action>,
    mut sink: WsSink,
    mut stream: WsStream,
) -> bool {
    loop {
        tokio::select! {
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => receive(state, &text),
                Some(Ok(Message::Close(_))) | None => return true,
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    warn!(%err, "crane session receive failed");
                    return true;
                }
            },
            action = actions.recv() => match action {
                Some(action) => route(state, Some(&mut sink), action).await,
                None => {
                    let _ = sink.send(Message::Close(None)).await;
                    return false;
                }
            },
        }
    }
}

/// Sleeps out the backoff window while still draining the action channel so
/// wire-bound intents are dropped instead of piling up. Returns false when
/// the session scope has gone away.
async fn wait_for_reconnect(
    state: &watch::Sender<SceneState>,
    actions: &mut mpsc::UnboundedReceiver<Action>,
    delay: Duration,
) -> bool {
    let sleep = tokio::time::sleep(delay);
    tokio::pin!(sleep);
    loop {
        tokio::select! {
            _ = &mut sleep => return true,
            action = actions.recv() => match action {
                Some(action) => route(state, None, action).await,
                None => return false,
            },
        }
    }
}

/// Inbound boundary: malformed or unknown frames are dropped here and never
/// reach the reducer; local-only variants from the peer are refused.
fn receive(state: &watch::Sender<SceneState>, text: &str) {
    match serde_json::from_str::<Action>(text) {
        Ok(Action::Connect(_)) | Ok(Action::DebugMode(_)) => {
            warn!("dropping local-only action received from peer");
        }
        Ok(action) => apply(state, &action),
        Err(err) => warn!(%err, "dropping malformed session frame"),
    }
}

async fn route(state: &watch::Sender<SceneState>, sink: Option<&mut WsSink>, action: Action) {
    match action {
        wire @ (Action::Command(_) | Action::Move(_)) => match sink {
            Some(sink) => match serde_json::to_string(&wire) {
                Ok(text) => {
                    if sink.send(Message::Text(text)).await.is_err() {
                        warn!("crane session send failed; dropping action");
                    }
                }
                Err(err) => warn!(%err, "failed to serialize outbound action"),
            },
            None => debug!("link closed; dropping wire-bound action"),
        },
        local => apply(state, &local),
    }
}

fn apply(state: &watch::Sender<SceneState>, action: &Action) {
    state.send_modify(|scene| *scene = reduce(scene, action));
}

#[cfg(test)]
#[path = "tests/connection_tests.rs"]
mod tests;
