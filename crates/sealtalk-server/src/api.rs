use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
    routing::get,
    Json, Router,
};
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use sealtalk_shared::constants::{MAX_MESSAGE_SIZE, WS_PATH};

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::relay::{ConnectionHandle, RelaySession};

#[derive(Clone)]
pub struct AppState {
    pub relay: RelaySession,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            relay: RelaySession::new(config.outbound_queue),
            config: Arc::new(config),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(WS_PATH, get(ws_upgrade))
        .route("/health", get(health_check))
        .route("/info", get(server_info))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Serialize)]
struct ServerInfoResponse {
    name: String,
    version: &'static str,
    connections: usize,
    participants: usize,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn server_info(State(state): State<AppState>) -> Json<ServerInfoResponse> {
    Json(ServerInfoResponse {
        name: state.config.instance_name.clone(),
        version: env!("CARGO_PKG_VERSION"),
        connections: state.relay.connection_count().await,
        participants: state.relay.participant_count().await,
    })
}

async fn ws_upgrade(
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> Result<Response, ServerError> {
    let connections = state.relay.connection_count().await;
    if state.config.at_capacity(connections) {
        warn!(connections, "Connection rejected: at capacity");
        return Err(ServerError::TooManyConnections {
            max: state.config.max_connections,
        });
    }

    Ok(ws
        .max_message_size(MAX_MESSAGE_SIZE)
        .on_upgrade(move |socket| handle_socket(socket, state.relay)))
}

/// Drive one WebSocket connection until either side closes it.
async fn handle_socket(socket: WebSocket, relay: RelaySession) {
    let (handle, mut outbound) = relay.connect().await;
    let (mut ws_tx, mut ws_rx) = socket.split();

    let mut writer = tokio::spawn(async move {
        while let Some(text) = outbound.recv().await {
            if ws_tx.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
        let _ = ws_tx.close().await;
    });

    loop {
        tokio::select! {
            frame = ws_rx.next() => match frame {
                Some(Ok(Message::Text(text))) => dispatch(&relay, handle, &text).await,
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!(handle, error = %e, "WebSocket read failed");
                    break;
                }
            },
            // Writer ended first: the socket is gone.
            _ = &mut writer => break,
        }
    }

    relay.disconnect(handle).await;
    writer.abort();
}

async fn dispatch(relay: &RelaySession, handle: ConnectionHandle, text: &str) {
    if let Err(e) = relay.handle_frame(handle, text).await {
        match &e {
            ServerError::Malformed(_) => debug!(handle, error = %e, "Discarding malformed frame"),
            _ => warn!(handle, error = %e, "Failed to handle frame"),
        }
    }
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting relay HTTP server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
