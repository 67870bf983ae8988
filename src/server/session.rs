//! Server session layer (C8): per-connection state machine and the shared
//! session table.
//!
//! The session table is a `DashMap<String, Session>` rather than a
//! mutex-wrapped `HashMap` (spec.md §5's "writer-preferring exclusive
//! policy" generalized to per-bucket locking) — the same structure the
//! teacher uses for its agent registry.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::mpsc;

use crate::protocol::ServerMessage;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum SessionState {
    Connected,
    Registered,
    Active,
    Closed,
}

/// Device session (spec.md §3): identity, liveness, and the outbound
/// channel used for alert fan-out.
pub struct Session {
    pub device_id: String,
    pub device_name: String,
    pub state: SessionState,
    pub started_at: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub threat_count: u64,
    pub sender: mpsc::UnboundedSender<ServerMessage>,
}

impl Session {
    pub fn is_stale(&self, now: DateTime<Utc>, stale_after_seconds: u64) -> bool {
        (now - self.last_seen).num_seconds() > stale_after_seconds as i64
    }
}

/// Table of sessions keyed by `device_id`, shared across connection tasks.
#[derive(Clone, Default)]
pub struct SessionTable {
    sessions: Arc<DashMap<String, Session>>,
}

impl SessionTable {
    pub fn new() -> Self {
        SessionTable { sessions: Arc::new(DashMap::new()) }
    }

    pub fn insert(&self, session: Session) {
        crate::metrics::SERVER_ACTIVE_SESSIONS.set(self.sessions.len() as i64 + 1);
        self.sessions.insert(session.device_id.clone(), session);
    }

    pub fn remove(&self, device_id: &str) {
        self.sessions.remove(device_id);
        crate::metrics::SERVER_ACTIVE_SESSIONS.set(self.sessions.len() as i64);
    }

    pub fn touch(&self, device_id: &str, now: DateTime<Utc>) {
        if let Some(mut s) = self.sessions.get_mut(device_id) {
            s.last_seen = now;
        }
    }

    pub fn active_count(&self) -> usize {
        self.sessions.iter().filter(|s| s.state == SessionState::Active).count()
    }

    /// Fans `msg` out to every `Active` session. Best-effort: a send failure
    /// to one session does not stop delivery to the others (spec.md §5); the
    /// failing session is pruned so the next heartbeat cycle won't retry it.
    pub fn fan_out_active(&self, msg: ServerMessage) {
        let mut dead = Vec::new();
        for entry in self.sessions.iter() {
            if entry.state != SessionState::Active {
                continue;
            }
            if entry.sender.send(msg.clone()).is_err() {
                dead.push(entry.device_id.clone());
            }
        }
        for id in dead {
            self.remove(&id);
        }
    }

    pub fn reap_stale(&self, now: DateTime<Utc>, stale_after_seconds: u64) -> Vec<String> {
        let stale: Vec<String> = self
            .sessions
            .iter()
            .filter(|s| s.is_stale(now, stale_after_seconds))
            .map(|s| s.device_id.clone())
            .collect();
        for id in &stale {
            self.remove(id);
        }
        stale
    }

    pub fn get_state(&self, device_id: &str) -> Option<SessionState> {
        self.sessions.get(device_id).map(|s| s.state)
    }

    pub fn set_state(&self, device_id: &str, state: SessionState) {
        if let Some(mut s) = self.sessions.get_mut(device_id) {
            s.state = state;
        }
    }

    pub fn increment_threat_count(&self, device_id: &str) {
        if let Some(mut s) = self.sessions.get_mut(device_id) {
            s.threat_count += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(id: &str) -> (Session, mpsc::UnboundedReceiver<ServerMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Session {
                device_id: id.to_string(),
                device_name: "dev".to_string(),
                state: SessionState::Active,
                started_at: Utc::now(),
                last_seen: Utc::now(),
                threat_count: 0,
                sender: tx,
            },
            rx,
        )
    }

    #[test]
    fn fan_out_reaches_only_active_sessions() {
        let table = SessionTable::new();
        let (s1, mut rx1) = session("dev-1");
        table.insert(s1);
        let (mut s2, _rx2) = session("dev-2");
        s2.state = SessionState::Registered;
        table.insert(s2);

        table.fan_out_active(ServerMessage::HeartbeatAck { timestamp: Utc::now() });
        assert!(rx1.try_recv().is_ok());
        assert_eq!(table.active_count(), 1);
    }

    #[test]
    fn stale_sessions_are_reaped() {
        let table = SessionTable::new();
        let (mut s, _rx) = session("dev-1");
        s.last_seen = Utc::now() - chrono::Duration::seconds(200);
        table.insert(s);
        let reaped = table.reap_stale(Utc::now(), 90);
        assert_eq!(reaped, vec!["dev-1".to_string()]);
        assert!(table.get_state("dev-1").is_none());
    }
}
