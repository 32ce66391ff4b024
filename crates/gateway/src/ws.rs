//! `/agent/ws` endpoint: authenticates the agent and runs its session.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use mission_protocol::Frame;
use mission_protocol::constants::HEARTBEAT;

use crate::TransportError;
use crate::auth::authorize;
use crate::connection::{Connection, FrameSink, SinkFuture};
use crate::registry::ConnectionRegistry;
use crate::server::AppState;

pub(crate) async fn agent_ws(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    if !authorize(&headers, &state.settings.agent_secret) {
        tracing::warn!(%peer, "rejected agent connection: bad credentials");
        return (StatusCode::UNAUTHORIZED, "unauthorized").into_response();
    }

    let registry = Arc::clone(&state.registry);
    ws.on_upgrade(move |socket| run_agent_session(socket, peer, registry))
}

/// Installs the upgraded socket as the active connection and reads from it
/// until either side closes.
async fn run_agent_session(socket: WebSocket, peer: SocketAddr, registry: Arc<ConnectionRegistry>) {
    let (sink, stream) = socket.split();
    let conn = Connection::new(peer.to_string(), WsFrameSink(sink));

    registry.install(Arc::clone(&conn)).await;
    tracing::info!(id = conn.id(), %peer, "agent connected");

    read_loop(&conn, stream).await;

    if registry.release(&conn).await {
        tracing::info!(id = conn.id(), %peer, "agent disconnected");
    } else {
        tracing::debug!(id = conn.id(), "replaced connection ended");
    }
    conn.close().await;
}

/// Drains inbound messages. The agent sends nothing but heartbeats, so
/// the loop only exists to notice the peer going away.
async fn read_loop(conn: &Connection, mut stream: SplitStream<WebSocket>) {
    loop {
        let msg = tokio::select! {
            _ = conn.closed() => return,
            msg = stream.next() => msg,
        };

        match msg {
            Some(Ok(Message::Text(text))) if text.as_str() == HEARTBEAT => {
                tracing::trace!(id = conn.id(), "heartbeat");
            }
            Some(Ok(Message::Text(text))) => {
                tracing::debug!(id = conn.id(), len = text.len(), "ignoring text from agent");
            }
            Some(Ok(Message::Binary(data))) => {
                tracing::debug!(id = conn.id(), len = data.len(), "ignoring binary from agent");
            }
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
            Some(Ok(Message::Close(_))) | None => return,
            Some(Err(e)) => {
                tracing::debug!(id = conn.id(), "read error: {e}");
                return;
            }
        }
    }
}

/// Write half of an axum WebSocket.
struct WsFrameSink(SplitSink<WebSocket, Message>);

impl FrameSink for WsFrameSink {
    fn send_frame(&mut self, frame: Frame) -> SinkFuture<'_> {
        Box::pin(async move {
            let msg = match frame {
                Frame::Control(control) => Message::Text(control.to_json()?.into()),
                Frame::Chunk(data) => Message::Binary(data.into()),
                Frame::Heartbeat => Message::Text(HEARTBEAT.into()),
            };
            self.0.send(msg).await.map_err(TransportError::from)
        })
    }

    fn close(&mut self) -> SinkFuture<'_> {
        Box::pin(async move { self.0.close().await.map_err(TransportError::from) })
    }
}
