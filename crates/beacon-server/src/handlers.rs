//! Connection and HTTP handlers for the Beacon server.
//!
//! This module wires the relay core to axum: the WebSocket endpoint that
//! feeds sessions, the site-data and group-invite routes backed by the
//! record stores, and the static asset fallback that serves the home
//! page.

use crate::config::Config;
use crate::metrics::{self, ConnectionMetricsGuard};
use crate::store::{
    GroupStore, InviteStatus, MemoryStore, NewInvite, RecordStore, StoreError, SITE_DATA_KEY,
};
use anyhow::Result;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Json, Router,
};
use beacon_core::{ClientHandle, ConnectionId, Relay, Session};
use beacon_protocol::{codec, Frame};
use bytes::BytesMut;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, services::ServeDir};
use tracing::{debug, error, info, warn};

/// Shared server state.
pub struct AppState {
    /// The presence relay.
    pub relay: Arc<Relay>,
    /// Site-data blob storage.
    pub site_data: Arc<dyn RecordStore>,
    /// Group-invite storage.
    pub groups: Arc<dyn GroupStore>,
    /// Server configuration.
    pub config: Config,
}

impl AppState {
    /// Create app state backed by an in-memory store.
    #[must_use]
    pub fn new(config: Config) -> Self {
        let store = Arc::new(MemoryStore::new());
        Self {
            relay: Arc::new(Relay::new()),
            site_data: store.clone(),
            groups: store,
            config,
        }
    }
}

/// Build the axum application.
#[must_use]
pub fn app(state: Arc<AppState>) -> Router {
    // API routes take precedence over the static fallback
    Router::new()
        .route(&state.config.transport.websocket_path, get(ws_handler))
        .route("/health", get(health_handler))
        .route("/get-data", get(get_data))
        .route("/save-data", post(save_data))
        .route("/groups/invites", post(create_invite).get(list_invites))
        .route("/groups/invites/:id", patch(update_invite))
        .route("/admin/reset", post(admin_reset))
        .fallback_service(ServeDir::new(&state.config.http.static_dir))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Run the HTTP/WebSocket server.
///
/// # Errors
///
/// Returns an error if the server fails to start.
pub async fn run_server(config: Config) -> Result<()> {
    let state = Arc::new(AppState::new(config.clone()));

    // Start metrics server if enabled
    if config.metrics.enabled {
        if let Err(e) = metrics::start_metrics_server(config.metrics.port) {
            error!("Failed to start metrics server: {}", e);
        }
    }

    let app = app(state);

    let addr = config.bind_addr();
    let listener = TcpListener::bind(addr).await?;

    info!("Beacon server listening on {}", addr);
    info!(
        "WebSocket endpoint: ws://{}{}",
        addr, config.transport.websocket_path
    );

    axum::serve(listener, app).await?;

    Ok(())
}

/// Health check handler.
async fn health_handler() -> impl IntoResponse {
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// WebSocket upgrade handler.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    if state.relay.stats().connections >= state.config.limits.max_connections {
        warn!("Connection limit reached, rejecting upgrade");
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }
    ws.on_upgrade(move |socket| handle_websocket(socket, state))
        .into_response()
}

/// Handle a WebSocket connection.
async fn handle_websocket(socket: WebSocket, state: Arc<AppState>) {
    let _metrics_guard = ConnectionMetricsGuard::new();

    let connection_id = ConnectionId::generate();
    debug!(connection = %connection_id, "WebSocket connected");

    let (handle, mut outbound) = ClientHandle::channel(connection_id.clone());
    let mut session = Session::open(Arc::clone(&state.relay), handle);

    let (mut sender, mut receiver) = socket.split();

    // Read buffer for partial frames
    let mut read_buffer = BytesMut::with_capacity(4096);

    loop {
        tokio::select! {
            biased;

            // Frames the relay queued for this connection
            Some(frame) = outbound.recv() => {
                match codec::encode(&frame) {
                    Ok(data) => {
                        metrics::record_event(data.len(), "outbound");
                        if sender.send(Message::Binary(data.to_vec())).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        error!(connection = %connection_id, error = %e, "Failed to encode frame");
                        metrics::record_error("encode");
                    }
                }
            }

            // Receive from WebSocket
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Binary(data))) => {
                        if data.len() > state.config.limits.max_message_size {
                            warn!(connection = %connection_id, size = data.len(), "Message too large, closing");
                            break;
                        }
                        read_buffer.extend_from_slice(&data);
                        if !drain_frames(&mut read_buffer, &mut session, &state) {
                            break;
                        }
                    }
                    Some(Ok(Message::Text(text))) => {
                        // Treat text as binary
                        read_buffer.extend_from_slice(text.as_bytes());
                        if !drain_frames(&mut read_buffer, &mut session, &state) {
                            break;
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Pong(_))) => {
                        // Ignore pongs
                    }
                    Some(Ok(Message::Close(_))) => {
                        debug!(connection = %connection_id, "Received close frame");
                        break;
                    }
                    Some(Err(e)) => {
                        warn!(connection = %connection_id, error = %e, "WebSocket error");
                        metrics::record_error("websocket");
                        break;
                    }
                    None => {
                        debug!(connection = %connection_id, "WebSocket stream ended");
                        break;
                    }
                }
            }
        }
    }

    // A mid-send transport fault and a clean close end up here the same
    // way: remove the directory entry once and broadcast.
    session.close();
    metrics::set_online_users(state.relay.stats().online);

    debug!(connection = %connection_id, "WebSocket disconnected");
}

/// Decode and dispatch every complete frame in the buffer.
///
/// Returns `false` if the connection should be torn down.
fn drain_frames(read_buffer: &mut BytesMut, session: &mut Session, state: &Arc<AppState>) -> bool {
    loop {
        let buffered = read_buffer.len();
        match codec::decode_from(read_buffer) {
            Ok(Some(frame)) => {
                let start = Instant::now();
                let event = frame.event();
                metrics::record_event(buffered - read_buffer.len(), "inbound");

                let is_presence = matches!(frame, Frame::GoOnline(_));
                let delivered = session.handle_frame(frame);
                if !delivered {
                    metrics::record_drop(event);
                }
                if is_presence {
                    metrics::set_online_users(state.relay.stats().online);
                }

                metrics::record_latency(start.elapsed().as_secs_f64());
            }
            Ok(None) => return true,
            Err(e) => {
                warn!(connection = %session.handle().id(), error = %e, "Protocol error, closing");
                metrics::record_error("protocol");
                return false;
            }
        }
    }
}

/// Error wrapper mapping store failures to HTTP responses.
struct AppError(StoreError);

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        Self(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        error!(error = %self.0, "Store error");
        metrics::record_error("store");
        (StatusCode::INTERNAL_SERVER_ERROR, self.0.to_string()).into_response()
    }
}

/// Fetch the site-data blob. An empty store reads as an empty array.
async fn get_data(State(state): State<Arc<AppState>>) -> Result<Json<Value>, AppError> {
    let data = state.site_data.get(SITE_DATA_KEY).await?;
    Ok(Json(data.unwrap_or_else(|| Value::Array(Vec::new()))))
}

/// Replace the site-data blob.
async fn save_data(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, AppError> {
    state.site_data.put(SITE_DATA_KEY, body).await?;
    Ok(Json(serde_json::json!({ "status": "Saved!" })))
}

/// Clear the site-data blob.
async fn admin_reset(State(state): State<Arc<AppState>>) -> Result<Json<Value>, AppError> {
    state
        .site_data
        .put(SITE_DATA_KEY, Value::Array(Vec::new()))
        .await?;
    info!("Site data reset");
    Ok(Json(serde_json::json!({ "status": "reset" })))
}

#[derive(Debug, Deserialize)]
struct InviteFilter {
    to: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InviteUpdate {
    status: InviteStatus,
}

/// Create a pending group invite.
async fn create_invite(
    State(state): State<Arc<AppState>>,
    Json(invite): Json<NewInvite>,
) -> Result<impl IntoResponse, AppError> {
    let record = state.groups.create(invite).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// List group invites, optionally filtered by invitee.
async fn list_invites(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<InviteFilter>,
) -> Result<impl IntoResponse, AppError> {
    let invites = state.groups.query(filter.to.as_deref()).await?;
    Ok(Json(invites))
}

/// Update an invite's status.
async fn update_invite(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
    Json(update): Json<InviteUpdate>,
) -> Result<Response, AppError> {
    match state.groups.update(id, update.status).await? {
        Some(record) => Ok(Json(record).into_response()),
        None => Ok(StatusCode::NOT_FOUND.into_response()),
    }
}
