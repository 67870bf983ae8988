//! Aggregation-server integration tests (C8-C11): a real axum server bound
//! to an ephemeral port, driven by a real WebSocket client speaking the
//! wire protocol exactly as an edge device would.

use std::sync::Arc;

use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

use cellular_sentinel::config::ServerConfig;
use cellular_sentinel::model::{Evidence, GeoPoint, Severity, Threat, ThreatType, TowerId};
use cellular_sentinel::protocol::{ClientMessage, ServerMessage, ThreatWire};
use cellular_sentinel::server::{router, ApiKeyStore, AppState, Correlator, SessionTable, ThreatStore};

async fn start_server(config: ServerConfig, api_key: &str) -> (String, Arc<AppState>) {
    let dir = tempfile::tempdir().unwrap();
    let key_path = dir.path().join("keys.txt");
    std::fs::write(&key_path, format!("{api_key}\n")).unwrap();
    let api_keys = ApiKeyStore::load_or_generate(key_path.to_str().unwrap()).unwrap();

    let store = ThreatStore::open(":memory:").await.unwrap();
    let state = Arc::new(AppState {
        correlator: Correlator::new(config.clone()),
        sessions: SessionTable::new(),
        started_at: Utc::now(),
        config,
        store,
        api_keys,
    });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = router(state.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("ws://{addr}/ws"), state)
}

fn threat_wire(threat_type: ThreatType, severity: Severity) -> ThreatWire {
    let t = Threat::new(
        threat_type,
        severity,
        Utc::now(),
        "integration test threat",
        Evidence::new().with("probe", 1_i64).build(),
        0.8,
        Some(GeoPoint { latitude: 1.0, longitude: 2.0 }),
        vec![TowerId::new("1", 1, 310, 260)],
        "advice",
    );
    ThreatWire::from(&t)
}

#[tokio::test]
async fn register_submit_threat_and_get_status_round_trip() {
    let (url, _state) = start_server(ServerConfig::default(), "test-key").await;
    let (mut ws, _) = tokio_tungstenite::connect_async(&url).await.unwrap();

    let register = ClientMessage::RegisterDevice {
        device_id: "dev-a".to_string(),
        device_name: "Test Phone".to_string(),
        api_key: "test-key".to_string(),
    };
    ws.send(Message::Text(serde_json::to_string(&register).unwrap())).await.unwrap();

    let reply: ServerMessage = recv(&mut ws).await;
    assert!(matches!(reply, ServerMessage::RegistrationSuccess { device_id, .. } if device_id == "dev-a"));

    let threat_msg = ClientMessage::CellularThreat(Box::new(threat_wire(ThreatType::TimingAdvanceZero, Severity::Medium)));
    ws.send(Message::Text(serde_json::to_string(&threat_msg).unwrap())).await.unwrap();
    let ack: ServerMessage = recv(&mut ws).await;
    assert!(matches!(ack, ServerMessage::ThreatAcknowledged { .. }));

    ws.send(Message::Text(serde_json::to_string(&ClientMessage::GetStatus).unwrap())).await.unwrap();
    let status: ServerMessage = recv(&mut ws).await;
    match status {
        ServerMessage::StatusResponse { connected_devices, total_threats_today, .. } => {
            assert_eq!(connected_devices, 1);
            assert_eq!(total_threats_today, 1);
        }
        other => panic!("unexpected reply: {other:?}"),
    }
}

/// Re-submitting the identical `cellular_threat` frame is acknowledged both
/// times but leaves exactly one stored row, since storage is keyed by
/// `threat_id` (spec.md §4.7).
#[tokio::test]
async fn resubmitting_identical_threat_acks_twice_but_stores_once() {
    let (url, state) = start_server(ServerConfig::default(), "test-key").await;
    let (mut ws, _) = tokio_tungstenite::connect_async(&url).await.unwrap();

    let register = ClientMessage::RegisterDevice {
        device_id: "dev-b".to_string(),
        device_name: "Test Phone".to_string(),
        api_key: "test-key".to_string(),
    };
    ws.send(Message::Text(serde_json::to_string(&register).unwrap())).await.unwrap();
    let _reply: ServerMessage = recv(&mut ws).await;

    // Medium severity avoids the high-priority correlator fan-out so this
    // test only exercises the acknowledgement/idempotency path.
    let wire = threat_wire(ThreatType::PotentialJamming, Severity::Medium);
    for _ in 0..2 {
        let msg = ClientMessage::CellularThreat(Box::new(wire.clone()));
        ws.send(Message::Text(serde_json::to_string(&msg).unwrap())).await.unwrap();
        let ack: ServerMessage = recv(&mut ws).await;
        assert!(matches!(ack, ServerMessage::ThreatAcknowledged { .. }));
    }

    let count = state.store.threats_since(Utc::now() - chrono::Duration::hours(1)).await.unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn unregistered_connection_cannot_submit_threats() {
    let (url, _state) = start_server(ServerConfig::default(), "test-key").await;
    let (mut ws, _) = tokio_tungstenite::connect_async(&url).await.unwrap();

    let msg = ClientMessage::CellularThreat(Box::new(threat_wire(ThreatType::PotentialJamming, Severity::High)));
    ws.send(Message::Text(serde_json::to_string(&msg).unwrap())).await.unwrap();
    let reply: ServerMessage = recv(&mut ws).await;
    assert!(matches!(reply, ServerMessage::Error { .. }));
}

#[tokio::test]
async fn bad_api_key_is_rejected() {
    let (url, _state) = start_server(ServerConfig::default(), "test-key").await;
    let (mut ws, _) = tokio_tungstenite::connect_async(&url).await.unwrap();

    let register = ClientMessage::RegisterDevice {
        device_id: "dev-c".to_string(),
        device_name: "Test Phone".to_string(),
        api_key: "wrong-key".to_string(),
    };
    ws.send(Message::Text(serde_json::to_string(&register).unwrap())).await.unwrap();
    let reply: ServerMessage = recv(&mut ws).await;
    assert!(matches!(reply, ServerMessage::Error { .. }));
}

/// S4: coordinated IMSI-catcher attack. Two devices report IMSI-related
/// high-severity threats; a third correlated report crosses
/// `correlation_min_related` and fans out `coordinated_attack_detected` to
/// every active session, including the two that never themselves triggered
/// the pattern.
#[tokio::test]
async fn s4_coordinated_imsi_attack_fans_out_to_all_active_sessions() {
    let (url, _state) = start_server(ServerConfig::default(), "test-key").await;

    let mut clients = Vec::new();
    for id in ["dev-1", "dev-2", "dev-3"] {
        let (mut ws, _) = tokio_tungstenite::connect_async(&url).await.unwrap();
        let register = ClientMessage::RegisterDevice {
            device_id: id.to_string(),
            device_name: id.to_string(),
            api_key: "test-key".to_string(),
        };
        ws.send(Message::Text(serde_json::to_string(&register).unwrap())).await.unwrap();
        let _ack: ServerMessage = recv(&mut ws).await;
        clients.push(ws);
    }

    for ws in clients.iter_mut().take(2) {
        let msg = ClientMessage::CellularThreat(Box::new(threat_wire(ThreatType::ImsiCatcherSuspected, Severity::High)));
        ws.send(Message::Text(serde_json::to_string(&msg).unwrap())).await.unwrap();
        // Each submission acks plus fans a high-priority alert out to every
        // active session (including the submitter); drain both for this
        // connection without assuming an exact order.
        drain_idle(ws, 2).await;
    }

    // Third device's report should push the related-device count to 2 and
    // trigger the coordinated-attack fan-out to every active session.
    let msg = ClientMessage::CellularThreat(Box::new(threat_wire(ThreatType::ImsiCatcherSuspected, Severity::High)));
    clients[2].send(Message::Text(serde_json::to_string(&msg).unwrap())).await.unwrap();

    for ws in clients.iter_mut() {
        let messages = drain_idle(ws, 32).await;
        let coordinated = messages.iter().find_map(|m| match m {
            ServerMessage::CoordinatedAttackDetected { device_count, related_threats, .. } => {
                Some((*device_count, related_threats.clone()))
            }
            _ => None,
        });
        let (device_count, related_threats) = coordinated.expect("every active session should observe the coordinated attack alert");
        assert_eq!(device_count, 3);
        assert_eq!(related_threats.len(), 2, "related_threats should carry the two other devices' IMSI threats");
        assert!(related_threats.iter().all(|t| t.threat_type == ThreatType::ImsiCatcherSuspected));
    }
}

async fn recv(ws: &mut (impl StreamExt<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin)) -> ServerMessage {
    loop {
        match ws.next().await.expect("connection closed unexpectedly").unwrap() {
            Message::Text(text) => return serde_json::from_str(&text).unwrap(),
            _ => continue,
        }
    }
}

/// Drains up to `max` frames from `ws`, stopping early once no further frame
/// arrives within a short window. Used where fan-out ordering across
/// connections isn't guaranteed but eventual delivery is.
async fn drain_idle(
    ws: &mut (impl StreamExt<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin),
    max: usize,
) -> Vec<ServerMessage> {
    let mut out = Vec::new();
    for _ in 0..max {
        match tokio::time::timeout(std::time::Duration::from_millis(500), ws.next()).await {
            Ok(Some(Ok(Message::Text(text)))) => {
                if let Ok(parsed) = serde_json::from_str(&text) {
                    out.push(parsed);
                }
            }
            Ok(Some(Ok(_))) => continue,
            _ => break,
        }
    }
    out
}
