//! Outbound wire-protocol client (the edge side of C8): connects to the
//! aggregation server, registers the device, forwards threats, and sends
//! periodic heartbeats. Forwarding is fire-and-forget from the orchestrator's
//! point of view — a send failure is logged and the tick proceeds (spec.md
//! §5 "no detector may block on I/O"; the outbound send is a suspension
//! point, not a hard dependency of detection).

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{info, warn};

use crate::config::EdgeConfig;
use crate::error::EdgeError;
use crate::model::Threat;
use crate::protocol::{ClientMessage, ServerMessage, ThreatWire};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Maintains (and lazily reconnects) the outbound session to the server.
pub struct ThreatForwarder {
    server_url: String,
    device_id: String,
    device_name: String,
    api_key: String,
    socket: Option<WsStream>,
}

impl ThreatForwarder {
    pub fn new(cfg: &EdgeConfig) -> Self {
        ThreatForwarder {
            server_url: cfg.server_url.clone(),
            device_id: cfg.device_id.clone(),
            device_name: cfg.device_name.clone(),
            api_key: cfg.api_key.clone(),
            socket: None,
        }
    }

    async fn ensure_connected(&mut self) -> Result<(), EdgeError> {
        if self.socket.is_some() {
            return Ok(());
        }
        let (mut ws, _) = tokio_tungstenite::connect_async(&self.server_url)
            .await
            .map_err(|e| EdgeError::AcquisitionUnavailable(format!("server connect failed: {e}")))?;

        let register = ClientMessage::RegisterDevice {
            device_id: self.device_id.clone(),
            device_name: self.device_name.clone(),
            api_key: self.api_key.clone(),
        };
        let raw = serde_json::to_string(&register)?;
        ws.send(Message::Text(raw)).await.map_err(|e| EdgeError::AcquisitionUnavailable(e.to_string()))?;

        if let Some(Ok(Message::Text(reply))) = ws.next().await {
            match serde_json::from_str::<ServerMessage>(&reply) {
                Ok(ServerMessage::RegistrationSuccess { .. }) => {
                    info!(device_id = %self.device_id, "registered with server");
                }
                Ok(ServerMessage::Error { message, .. }) => {
                    warn!(%message, "server rejected registration");
                    return Err(EdgeError::AcquisitionUnavailable(message));
                }
                _ => {}
            }
        }

        self.socket = Some(ws);
        Ok(())
    }

    /// Sends one `cellular_threat` frame. Drops the socket on failure so the
    /// next call reconnects and re-registers.
    pub async fn forward(&mut self, threat: &Threat) -> Result<(), EdgeError> {
        self.ensure_connected().await?;
        let msg = ClientMessage::CellularThreat(Box::new(ThreatWire::from(threat)));
        let raw = serde_json::to_string(&msg)?;
        let socket = self.socket.as_mut().expect("just connected");
        if socket.send(Message::Text(raw)).await.is_err() {
            self.socket = None;
            return Err(EdgeError::AcquisitionUnavailable("threat forward send failed".to_string()));
        }
        Ok(())
    }

    pub async fn heartbeat(&mut self) -> Result<(), EdgeError> {
        self.ensure_connected().await?;
        let raw = serde_json::to_string(&ClientMessage::Heartbeat)?;
        let socket = self.socket.as_mut().expect("just connected");
        if socket.send(Message::Text(raw)).await.is_err() {
            self.socket = None;
            return Err(EdgeError::AcquisitionUnavailable("heartbeat send failed".to_string()));
        }
        Ok(())
    }
}
