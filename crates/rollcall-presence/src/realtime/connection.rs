//! Socket lifecycle: connect, authenticate, forward requests, reconnect.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::handler::{decode, encode, Inbound, PendingRequests, Reply};
use super::types::{Op, RealtimeClientConfig};
use crate::error::PresenceError;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// A request queued by the client handle.
pub(crate) struct Outbound {
    pub op: Op,
    pub path: Option<String>,
    pub payload: serde_json::Value,
    pub reply: Reply,
}

enum SessionResult {
    Shutdown,
    /// `established` is true when the socket got past authentication.
    Disconnected { reason: String, established: bool },
}

/// Run the connection with auto-reconnect until `cancel` fires or every
/// client handle is dropped.
pub(crate) async fn run_connection(
    config: RealtimeClientConfig,
    mut commands: mpsc::Receiver<Outbound>,
    connected: watch::Sender<bool>,
    cancel: CancellationToken,
) {
    let mut backoff = config.reconnect_delay;

    loop {
        info!(url = %config.url, "connecting to realtime channel");

        let attempt = tokio::select! {
            _ = cancel.cancelled() => break,
            r = tokio::time::timeout(config.connect_timeout, connect_async(config.url.as_str())) => r,
        };

        match attempt {
            Ok(Ok((ws, _))) => {
                let result = session(ws, &config, &mut commands, &connected, &cancel).await;
                connected.send_replace(false);
                match result {
                    SessionResult::Shutdown => break,
                    SessionResult::Disconnected {
                        reason,
                        established,
                    } => {
                        warn!(reason = %reason, "realtime connection lost");
                        if established {
                            backoff = config.reconnect_delay;
                        }
                    }
                }
            }
            Ok(Err(e)) => warn!(error = %e, "failed to connect to realtime channel"),
            Err(_) => warn!(
                timeout = ?config.connect_timeout,
                "realtime connect timed out"
            ),
        }

        if !wait_rejecting(backoff, &mut commands, &cancel).await {
            break;
        }
        backoff = (backoff * 2).min(config.max_reconnect_delay);
    }

    connected.send_replace(false);
    commands.close();
    while let Ok(cmd) = commands.try_recv() {
        let _ = cmd.reply.send(Err(PresenceError::Closed));
    }
    debug!("realtime connection loop stopped");
}

/// Sleep for `delay`, failing any request that arrives meanwhile.
/// Returns `false` if the loop should stop.
async fn wait_rejecting(
    delay: Duration,
    commands: &mut mpsc::Receiver<Outbound>,
    cancel: &CancellationToken,
) -> bool {
    let sleep = tokio::time::sleep(delay);
    tokio::pin!(sleep);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return false,
            _ = &mut sleep => return true,
            cmd = commands.recv() => match cmd {
                Some(cmd) => {
                    let _ = cmd.reply.send(Err(PresenceError::Disconnected));
                }
                None => return false,
            },
        }
    }
}

async fn session(
    ws: Socket,
    config: &RealtimeClientConfig,
    commands: &mut mpsc::Receiver<Outbound>,
    connected: &watch::Sender<bool>,
    cancel: &CancellationToken,
) -> SessionResult {
    let (mut sink, mut stream) = ws.split();
    let mut pending = PendingRequests::new();

    // Authenticate first; requests wait until the server accepts the token.
    let mut auth_ref = None;
    if let Some(token) = &config.access_token {
        let r = pending.next_ref();
        let text = match encode(r, Op::Auth, None, &json!({ "token": token })) {
            Ok(t) => t,
            Err(e) => return disconnected(format!("auth encode failed: {e}"), false),
        };
        if sink.send(Message::Text(text.into())).await.is_err() {
            return disconnected("failed to send auth".into(), false);
        }
        auth_ref = Some(r);
    } else {
        connected.send_replace(true);
        info!("realtime channel connected");
    }

    let auth_deadline = tokio::time::sleep(config.request_timeout);
    tokio::pin!(auth_deadline);

    let mut heartbeat = tokio::time::interval_at(
        Instant::now() + config.heartbeat_interval,
        config.heartbeat_interval,
    );
    let mut last_seen = Instant::now();

    let result = loop {
        let authed = auth_ref.is_none();
        tokio::select! {
            _ = cancel.cancelled() => {
                let _ = sink.close().await;
                break SessionResult::Shutdown;
            }

            _ = &mut auth_deadline, if !authed => {
                break disconnected("auth timed out".into(), false);
            }

            cmd = commands.recv(), if authed => {
                let Some(cmd) = cmd else {
                    let _ = sink.close().await;
                    break SessionResult::Shutdown;
                };
                let r = pending.next_ref();
                match encode(r, cmd.op, cmd.path.as_deref(), &cmd.payload) {
                    Ok(text) => {
                        pending.insert(r, cmd.reply);
                        if sink.send(Message::Text(text.into())).await.is_err() {
                            break disconnected("send failed".into(), true);
                        }
                    }
                    Err(e) => {
                        let _ = cmd.reply.send(Err(e));
                    }
                }
            }

            frame = stream.next() => {
                last_seen = Instant::now();
                match frame {
                    Some(Ok(Message::Text(text))) => match decode(&text) {
                        Ok(Inbound::Reply { ref_id, result }) if Some(ref_id) == auth_ref => {
                            match result {
                                Ok(_) => {
                                    auth_ref = None;
                                    connected.send_replace(true);
                                    info!("realtime channel authenticated");
                                }
                                Err(e) => break disconnected(format!("auth rejected: {e}"), false),
                            }
                        }
                        Ok(Inbound::Reply { ref_id, result }) => {
                            if !pending.resolve(ref_id, result) {
                                trace!(ref_id, "reply for unknown or abandoned request");
                            }
                        }
                        Ok(Inbound::Other(_)) => {}
                        Err(e) => debug!(error = %e, "bad frame from realtime channel"),
                    },
                    Some(Ok(Message::Ping(data))) => {
                        let _ = sink.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        break disconnected("server closed connection".into(), authed);
                    }
                    Some(Err(e)) => break disconnected(format!("ws error: {e}"), authed),
                    _ => {}
                }
            }

            _ = heartbeat.tick() => {
                if last_seen.elapsed() > config.heartbeat_interval * 2 {
                    break disconnected("heartbeat timeout".into(), authed);
                }
                if sink.send(Message::Ping(Default::default())).await.is_err() {
                    break disconnected("heartbeat send failed".into(), authed);
                }
            }
        }
    };

    connected.send_replace(false);
    pending.fail_all(PresenceError::Disconnected);
    result
}

fn disconnected(reason: String, established: bool) -> SessionResult {
    SessionResult::Disconnected {
        reason,
        established,
    }
}
