use std::time::{Duration, Instant};

use axum::extract::State;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::{Router, routing::get};
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use uuid::Uuid;

use crate::bootstrap::app_context::AppContext;
use crate::infrastructure::realtime::Frame;

/// First frame queued for every connection: the layer's session handshake
/// carrying the session id and the keepalive parameters the client should
/// expect.
#[derive(Debug, Serialize)]
struct SessionHello {
    sid: Uuid,
    ping_interval_ms: u64,
    ping_timeout_ms: u64,
}

pub fn routes(ctx: AppContext) -> Router {
    Router::new().route("/ws", get(ws_entry)).with_state(ctx)
}

#[utoipa::path(
    get,
    path = "/ws",
    tag = "Realtime",
    responses(
        (status = 101, description = "Switching Protocols (WebSocket upgrade)"),
        (status = 403, description = "Origin not allowed")
    )
)]
pub async fn ws_entry(
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
    headers: HeaderMap,
    State(state): State<AppContext>,
) -> Response {
    let origin = headers
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_owned());

    // Policy before transport: a disallowed Origin is rejected even when the
    // request is not upgradable.
    if !state.cfg.origin_allowed(origin.as_deref()) {
        tracing::debug!(
            origin = origin.as_deref().unwrap_or("-"),
            "WS handshake rejected"
        );
        return StatusCode::FORBIDDEN.into_response();
    }

    match ws {
        Ok(upgrade) => upgrade
            .on_upgrade(move |socket| peer(socket, state, origin))
            .into_response(),
        Err(rejection) => rejection.into_response(),
    }
}

// WS peer loop: hello, then relay until the client goes away or times out.
async fn peer(socket: WebSocket, ctx: AppContext, origin: Option<String>) {
    let hub = ctx.hub();
    let (sid, mut outbound) = hub.register(origin).await;
    let sessions = hub.session_count().await;
    tracing::debug!(%sid, sessions, "WS session open");

    let hello = SessionHello {
        sid,
        ping_interval_ms: ctx.cfg.ping_interval_secs.saturating_mul(1_000),
        ping_timeout_ms: ctx.cfg.ping_timeout_secs.saturating_mul(1_000),
    };
    match serde_json::to_string(&hello) {
        Ok(payload) => {
            if let Err(e) = hub.send_to(sid, Frame::Text(payload)).await {
                tracing::warn!(%sid, error = %e, "failed to queue session hello");
            }
        }
        Err(e) => tracing::error!(%sid, error = %e, "failed to encode session hello"),
    }

    let (mut sink, mut stream) = socket.split();
    let ping_interval = Duration::from_secs(ctx.cfg.ping_interval_secs);
    let idle_limit = ping_interval.saturating_add(Duration::from_secs(ctx.cfg.ping_timeout_secs));
    let mut ping = tokio::time::interval(ping_interval);
    // The first tick completes immediately; consume it so pings start one
    // interval from now.
    ping.tick().await;
    let mut last_heard = Instant::now();
    let mut frames_in: u64 = 0;

    loop {
        tokio::select! {
            queued = outbound.recv() => {
                // A closed queue means the hub dropped the session.
                let Some(frame) = queued else { break };
                let msg = match frame {
                    Frame::Text(t) => Message::Text(t),
                    Frame::Binary(b) => Message::Binary(b),
                };
                if let Err(e) = sink.send(msg).await {
                    tracing::debug!(%sid, error = %e, "WS send failed");
                    break;
                }
            }
            incoming = stream.next() => {
                match incoming {
                    Some(Ok(msg)) => {
                        last_heard = Instant::now();
                        match msg {
                            Message::Text(_) | Message::Binary(_) => {
                                // No handlers are registered against the
                                // layer here; data frames are dropped.
                                frames_in += 1;
                                tracing::debug!(%sid, frames_in, "dropping data frame without handler");
                            }
                            Message::Close(_) => break,
                            Message::Ping(_) | Message::Pong(_) => {}
                        }
                    }
                    Some(Err(e)) => {
                        tracing::debug!(%sid, error = %e, "WS read failed");
                        break;
                    }
                    None => break,
                }
            }
            _ = ping.tick() => {
                if last_heard.elapsed() > idle_limit {
                    tracing::info!(%sid, "WS session timed out");
                    break;
                }
                if sink.send(Message::Ping(Vec::new())).await.is_err() {
                    break;
                }
            }
        }
    }

    let _ = sink.send(Message::Close(None)).await;
    let summary = hub.deregister(sid).await;
    let (origin, connected_for) = match &summary {
        Some(s) => (s.origin.as_deref().unwrap_or("-"), s.connected_for),
        None => ("-", Duration::ZERO),
    };
    tracing::info!(%sid, origin, ?connected_for, frames_in, "WS connection closed");
}
