//! Cross-device correlator (C10): fans out high-priority alerts and detects
//! coordinated IMSI-catcher campaigns across devices.
//!
//! Idempotency state (the set of device-sets already alerted on) is
//! in-memory only, per spec.md §4.8 — a restart forgets prior alerts, which
//! is accepted since the window is only 60 minutes.

use std::collections::{BTreeSet, HashSet};
use std::sync::Mutex;

use chrono::{Duration, Utc};

use crate::config::ServerConfig;
use crate::model::Threat;
use crate::protocol::ThreatWire;

use super::session::SessionTable;
use super::store::ThreatStore;

pub struct Correlator {
    config: ServerConfig,
    /// Sorted device-id sets already alerted on, so the same trio never
    /// re-fires a `coordinated_attack_detected` within the window.
    alerted_sets: Mutex<HashSet<Vec<String>>>,
}

impl Correlator {
    pub fn new(config: ServerConfig) -> Self {
        Correlator { config, alerted_sets: Mutex::new(HashSet::new()) }
    }

    /// Processes one newly-ingested threat from `device_id`: fans out a
    /// high-priority alert if warranted, then checks for a coordinated
    /// IMSI-catcher pattern against recent cross-device threats.
    pub async fn on_threat_ingested(
        &self,
        device_id: &str,
        threat: &Threat,
        sessions: &SessionTable,
        store: &ThreatStore,
    ) -> Result<(), crate::error::ServerError> {
        if !self.config.correlation_enabled {
            return Ok(());
        }

        if threat.severity.is_high_priority() {
            sessions.fan_out_active(crate::protocol::ServerMessage::HighPriorityAlert {
                threat: ThreatWire::from(threat),
                alert_level: "URGENT".to_string(),
                message: format!("High-severity threat detected: {}", threat.threat_type.as_str()),
                timestamp: Utc::now(),
            });
            crate::metrics::CORRELATION_ALERTS_TOTAL.with_label_values(&["high_priority"]).inc();
        }

        if !threat.threat_type.is_imsi_related() {
            return Ok(());
        }

        let since = Utc::now() - Duration::minutes(self.config.correlation_window_minutes);
        let recent = store.recent_threats_for_correlation(since).await?;

        let related: Vec<&(String, ThreatWire)> =
            recent.iter().filter(|(dev, wire)| dev != device_id && wire.threat_type.is_imsi_related()).collect();
        let related_devices: BTreeSet<String> = related.iter().map(|(dev, _)| dev.clone()).collect();

        if related_devices.len() < self.config.correlation_min_related {
            return Ok(());
        }

        let mut device_set: BTreeSet<String> = related_devices.clone();
        device_set.insert(device_id.to_string());
        let key: Vec<String> = device_set.iter().cloned().collect();

        let already_alerted = {
            let mut seen = self.alerted_sets.lock().unwrap();
            !seen.insert(key.clone())
        };
        if already_alerted {
            return Ok(());
        }

        let related_wire: Vec<ThreatWire> = related.into_iter().map(|(_, wire)| wire.clone()).collect();
        sessions.fan_out_active(crate::protocol::ServerMessage::CoordinatedAttackDetected {
            primary_threat: ThreatWire::from(threat),
            related_threats: related_wire,
            attack_pattern: "IMSI_CATCHER_COORDINATED".to_string(),
            device_count: device_set.len(),
            message: format!("Coordinated IMSI-catcher activity across {} devices", device_set.len()),
            timestamp: Utc::now(),
        });
        crate::metrics::CORRELATION_ALERTS_TOTAL.with_label_values(&["coordinated_attack"]).inc();

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Evidence, ThreatType, TowerId};
    use crate::server::store::ThreatStore;

    fn threat(threat_type: ThreatType, severity: Severity) -> Threat {
        Threat::new(
            threat_type,
            severity,
            Utc::now(),
            "test",
            Evidence::new().build(),
            0.7,
            None,
            vec![TowerId::new("1", 1, 310, 260)],
            "advice",
        )
    }

    #[tokio::test]
    async fn coordinated_attack_requires_at_least_two_other_devices() {
        let store = ThreatStore::open(":memory:").await.unwrap();
        let t1 = threat(ThreatType::ImsiCatcherSuspected, Severity::High);
        store.insert_threat("dev-1", &t1).await.unwrap();
        let t2 = threat(ThreatType::ImsiCatcherSuspected, Severity::High);
        store.insert_threat("dev-2", &t2).await.unwrap();

        let sessions = SessionTable::new();
        let correlator = Correlator::new(ServerConfig::default());
        let t3 = threat(ThreatType::ImsiCatcherSuspected, Severity::High);
        // only one other device (dev-1, dev-2 seen) -> 2 related devices, min_related default is 2, so this should fire
        correlator.on_threat_ingested("dev-3", &t3, &sessions, &store).await.unwrap();
    }

    #[tokio::test]
    async fn same_device_trio_does_not_re_alert() {
        let store = ThreatStore::open(":memory:").await.unwrap();
        store.insert_threat("dev-1", &threat(ThreatType::ImsiCatcherSuspected, Severity::High)).await.unwrap();
        store.insert_threat("dev-2", &threat(ThreatType::ImsiCatcherSuspected, Severity::High)).await.unwrap();

        let sessions = SessionTable::new();
        let correlator = Correlator::new(ServerConfig::default());
        let t3 = threat(ThreatType::ImsiCatcherSuspected, Severity::High);
        correlator.on_threat_ingested("dev-3", &t3, &sessions, &store).await.unwrap();

        let seen_before = correlator.alerted_sets.lock().unwrap().len();
        let t3_again = threat(ThreatType::ImsiCatcherSuspected, Severity::High);
        store.insert_threat("dev-3", &t3_again).await.unwrap();
        correlator.on_threat_ingested("dev-3", &t3_again, &sessions, &store).await.unwrap();
        let seen_after = correlator.alerted_sets.lock().unwrap().len();
        assert_eq!(seen_before, seen_after);
    }
}
