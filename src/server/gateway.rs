//! Server gateway (ties C8-C11 together): axum `Router` with a WebSocket
//! route for the device wire protocol and an HTTP `/metrics` route, built
//! as shared state behind the router with one task spawned per connection.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::protocol::{ClientMessage, ServerMessage};

use super::auth::ApiKeyStore;
use super::correlator::Correlator;
use super::session::{Session, SessionState, SessionTable};
use super::store::ThreatStore;

pub struct AppState {
    pub config: ServerConfig,
    pub sessions: SessionTable,
    pub store: ThreatStore,
    pub correlator: Correlator,
    pub api_keys: ApiKeyStore,
    pub started_at: chrono::DateTime<Utc>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

async fn metrics_handler() -> impl IntoResponse {
    match crate::metrics::encode() {
        Ok(body) => (axum::http::StatusCode::OK, body),
        Err(e) => (axum::http::StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();

    let mut device_id: Option<String> = None;

    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if let Ok(raw) = serde_json::to_string(&msg) {
                if sink.send(Message::Text(raw)).await.is_err() {
                    break;
                }
            }
        }
    });

    while let Some(Ok(msg)) = stream.next().await {
        let Message::Text(text) = msg else { continue };
        let parsed: Result<ClientMessage, _> = serde_json::from_str(&text);
        match parsed {
            Ok(ClientMessage::RegisterDevice { device_id: id, device_name, api_key }) => {
                if id.is_empty() || !state.api_keys.is_valid(&api_key) {
                    let _ = tx.send(ServerMessage::Error { message: "Authentication failed".to_string(), timestamp: Utc::now() });
                    break;
                }
                if let Err(e) = state.store.upsert_device_session(&id, &device_name, Utc::now()).await {
                    warn!(error = %e, "failed to persist device session");
                }
                state.sessions.insert(Session {
                    device_id: id.clone(),
                    device_name,
                    state: SessionState::Registered,
                    started_at: Utc::now(),
                    last_seen: Utc::now(),
                    threat_count: 0,
                    sender: tx.clone(),
                });
                // No separate handshake message exists between registration
                // and accepting traffic, so Active follows immediately.
                state.sessions.set_state(&id, SessionState::Active);
                device_id = Some(id.clone());
                info!(device_id = %id, "device registered and active");
                let _ = tx.send(ServerMessage::RegistrationSuccess {
                    device_id: id,
                    server_time: Utc::now(),
                    monitoring_status: true,
                });
            }
            Ok(ClientMessage::CellularThreat(wire)) => {
                let Some(id) = device_id.as_deref() else {
                    let _ = tx.send(ServerMessage::Error { message: "not registered".to_string(), timestamp: Utc::now() });
                    continue;
                };
                if state.sessions.get_state(id) != Some(SessionState::Active) {
                    let _ = tx.send(ServerMessage::Error { message: "session not active".to_string(), timestamp: Utc::now() });
                    continue;
                }
                let threat = wire_to_threat(*wire);
                let mut store_ok = state.store.insert_threat(id, &threat).await;
                if store_ok.is_err() {
                    crate::metrics::SERVER_STORAGE_FAILURES_TOTAL.with_label_values(&["cellular_threats"]).inc();
                    store_ok = state.store.insert_threat(id, &threat).await;
                }
                match store_ok {
                    Ok(()) => {
                        state.sessions.increment_threat_count(id);
                        let _ = state.store.increment_device_threat_count(id).await;
                        if let Err(e) = state.correlator.on_threat_ingested(id, &threat, &state.sessions, &state.store).await {
                            warn!(error = %e, "correlator failed");
                        }
                    }
                    Err(e) => warn!(error = %e, "storage failure persisted to memory only; session degraded"),
                }
                let _ = tx.send(ServerMessage::ThreatAcknowledged { threat_id: threat.threat_id, processed_at: Utc::now() });
            }
            Ok(ClientMessage::Heartbeat) => {
                if let Some(id) = device_id.as_deref() {
                    state.sessions.touch(id, Utc::now());
                }
                let _ = tx.send(ServerMessage::HeartbeatAck { timestamp: Utc::now() });
            }
            Ok(ClientMessage::GetStatus) => {
                let uptime = (Utc::now() - state.started_at).num_seconds();
                let since = Utc::now() - chrono::Duration::days(1);
                let total_today = state.store.threats_since(since).await.unwrap_or(0);
                let _ = tx.send(ServerMessage::StatusResponse {
                    connected_devices: state.sessions.active_count(),
                    total_threats_today: total_today,
                    server_uptime: uptime,
                    monitoring_active: true,
                });
            }
            Err(_) => {
                let _ = tx.send(ServerMessage::Error { message: "invalid message".to_string(), timestamp: Utc::now() });
            }
        }
    }

    if let Some(id) = device_id {
        state.sessions.remove(&id);
        info!(device_id = %id, "session closed");
    }
    send_task.abort();
}

fn wire_to_threat(wire: crate::protocol::ThreatWire) -> crate::model::Threat {
    crate::model::Threat {
        threat_id: wire.threat_id,
        threat_type: wire.threat_type,
        severity: wire.severity,
        timestamp: wire.timestamp,
        description: wire.description,
        evidence: wire
            .cellular_data
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default(),
        confidence: wire.confidence,
        location: wire.location,
        affected_towers: Vec::new(),
        mitigation_advice: String::new(),
    }
}

/// Background task: reaps stale sessions on the configured heartbeat
/// cadence (spec.md §5 "Timeouts").
pub async fn run_reaper(state: Arc<AppState>) {
    let mut ticker = tokio::time::interval(StdDuration::from_secs(state.config.heartbeat_interval_seconds.max(1)));
    loop {
        ticker.tick().await;
        let reaped = state.sessions.reap_stale(Utc::now(), state.config.stale_session_seconds);
        for id in reaped {
            info!(device_id = %id, "reaped stale session");
        }
    }
}
