//! Wire protocol (spec.md §6): UTF-8 JSON text frames tagged by a `type`
//! field, shared between the edge client and the aggregation server.
//!
//! Modeled as a `#[serde(tag = "type")]` enum pair rather than a loose JSON
//! map (spec.md §9 "dynamic records → tagged variants"), so a malformed or
//! unknown frame fails to deserialize instead of silently matching nothing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{GeoPoint, Severity, Threat, ThreatType};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
#[serde(rename_all = "snake_case")]
pub enum ClientMessage {
    RegisterDevice { device_id: String, device_name: String, api_key: String },
    CellularThreat(Box<ThreatWire>),
    Heartbeat,
    GetStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreatWire {
    pub threat_id: String,
    pub threat_type: ThreatType,
    pub severity: Severity,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<GeoPoint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cellular_data: Option<serde_json::Value>,
    pub description: String,
    pub confidence: f64,
}

impl From<&Threat> for ThreatWire {
    fn from(t: &Threat) -> Self {
        ThreatWire {
            threat_id: t.threat_id.clone(),
            threat_type: t.threat_type,
            severity: t.severity,
            timestamp: t.timestamp,
            location: t.location,
            cellular_data: if t.evidence.is_empty() {
                None
            } else {
                Some(serde_json::to_value(&t.evidence).unwrap_or(serde_json::Value::Null))
            },
            description: t.description.clone(),
            confidence: t.confidence,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
#[serde(rename_all = "snake_case")]
pub enum ServerMessage {
    RegistrationSuccess { device_id: String, server_time: DateTime<Utc>, monitoring_status: bool },
    ThreatAcknowledged { threat_id: String, processed_at: DateTime<Utc> },
    HeartbeatAck { timestamp: DateTime<Utc> },
    StatusResponse { connected_devices: usize, total_threats_today: i64, server_uptime: i64, monitoring_active: bool },
    HighPriorityAlert { threat: ThreatWire, alert_level: String, message: String, timestamp: DateTime<Utc> },
    CoordinatedAttackDetected {
        primary_threat: ThreatWire,
        related_threats: Vec<ThreatWire>,
        attack_pattern: String,
        device_count: usize,
        message: String,
        timestamp: DateTime<Utc>,
    },
    Error { message: String, timestamp: DateTime<Utc> },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_message_round_trips_through_json() {
        let msg = ClientMessage::Heartbeat;
        let raw = serde_json::to_string(&msg).unwrap();
        assert_eq!(raw, r#"{"type":"heartbeat"}"#);
        let back: ClientMessage = serde_json::from_str(&raw).unwrap();
        assert!(matches!(back, ClientMessage::Heartbeat));
    }

    #[test]
    fn register_device_carries_required_fields() {
        let msg = ClientMessage::RegisterDevice {
            device_id: "dev-1".into(),
            device_name: "Pixel".into(),
            api_key: "key".into(),
        };
        let raw = serde_json::to_string(&msg).unwrap();
        let back: ClientMessage = serde_json::from_str(&raw).unwrap();
        match back {
            ClientMessage::RegisterDevice { device_id, .. } => assert_eq!(device_id, "dev-1"),
            _ => panic!("wrong variant"),
        }
    }
}
