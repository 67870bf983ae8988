//! Server threat store (C9): SQLite-backed persistence for threats, device
//! sessions, and monitoring events, per spec.md §4.7's three-relation schema.
//!
//! Uses a single `SqlitePool` capped at one connection (spec.md §5's
//! "database connection pool of capacity 1"); each row write is wrapped in
//! its own transaction so cancellation never leaves a half-written row.

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};

use crate::error::ServerError;
use crate::model::{GeoPoint, Severity, Threat, ThreatType};
use crate::protocol::ThreatWire;

#[derive(Clone)]
pub struct ThreatStore {
    pool: SqlitePool,
}

pub struct DeviceSessionRow {
    pub device_id: String,
    pub device_name: String,
    pub last_seen: DateTime<Utc>,
    pub connection_count: i64,
    pub threat_count: i64,
}

impl ThreatStore {
    pub async fn open(database_path: &str) -> Result<Self, ServerError> {
        let options = SqliteConnectOptions::new().filename(database_path).create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| ServerError::DatabaseOpenFailure(e.to_string()))?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS cellular_threats (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                device_id TEXT NOT NULL,
                threat_id TEXT NOT NULL UNIQUE,
                threat_type TEXT NOT NULL,
                severity TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                location_lat REAL,
                location_lon REAL,
                cellular_data_blob TEXT,
                description TEXT NOT NULL,
                confidence REAL NOT NULL,
                created_at TEXT NOT NULL
            )",
        )
        .execute(&pool)
        .await
        .map_err(ServerError::Database)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS device_sessions (
                device_id TEXT PRIMARY KEY,
                device_name TEXT NOT NULL,
                last_seen TEXT NOT NULL,
                connection_count INTEGER NOT NULL DEFAULT 0,
                threat_count INTEGER NOT NULL DEFAULT 0
            )",
        )
        .execute(&pool)
        .await
        .map_err(ServerError::Database)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS monitoring_events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                event_type TEXT NOT NULL,
                device_id TEXT,
                event_data_blob TEXT,
                timestamp TEXT NOT NULL
            )",
        )
        .execute(&pool)
        .await
        .map_err(ServerError::Database)?;

        Ok(ThreatStore { pool })
    }

    /// Inserts a threat, replacing any existing row with the same
    /// `threat_id` (spec.md §4.7 "inserts are idempotent by threat_id").
    pub async fn insert_threat(&self, device_id: &str, threat: &Threat) -> Result<(), ServerError> {
        let mut tx = self.pool.begin().await.map_err(ServerError::Database)?;
        let cellular_data_blob = if threat.evidence.is_empty() {
            None
        } else {
            Some(serde_json::to_string(&threat.evidence)?)
        };
        sqlx::query(
            "INSERT INTO cellular_threats
                (device_id, threat_id, threat_type, severity, timestamp, location_lat, location_lon,
                 cellular_data_blob, description, confidence, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
             ON CONFLICT(threat_id) DO UPDATE SET
                device_id = excluded.device_id,
                threat_type = excluded.threat_type,
                severity = excluded.severity,
                timestamp = excluded.timestamp,
                location_lat = excluded.location_lat,
                location_lon = excluded.location_lon,
                cellular_data_blob = excluded.cellular_data_blob,
                description = excluded.description,
                confidence = excluded.confidence",
        )
        .bind(device_id)
        .bind(&threat.threat_id)
        .bind(threat.threat_type.as_str())
        .bind(severity_str(threat.severity))
        .bind(threat.timestamp.to_rfc3339())
        .bind(threat.location.map(|l| l.latitude))
        .bind(threat.location.map(|l| l.longitude))
        .bind(cellular_data_blob)
        .bind(&threat.description)
        .bind(threat.confidence)
        .bind(Utc::now().to_rfc3339())
        .execute(&mut *tx)
        .await
        .map_err(ServerError::Database)?;
        tx.commit().await.map_err(ServerError::Database)?;
        Ok(())
    }

    pub async fn upsert_device_session(&self, device_id: &str, device_name: &str, now: DateTime<Utc>) -> Result<(), ServerError> {
        let mut tx = self.pool.begin().await.map_err(ServerError::Database)?;
        sqlx::query(
            "INSERT INTO device_sessions (device_id, device_name, last_seen, connection_count, threat_count)
             VALUES (?1, ?2, ?3, 1, 0)
             ON CONFLICT(device_id) DO UPDATE SET
                device_name = excluded.device_name,
                last_seen = excluded.last_seen,
                connection_count = device_sessions.connection_count + 1",
        )
        .bind(device_id)
        .bind(device_name)
        .bind(now.to_rfc3339())
        .execute(&mut *tx)
        .await
        .map_err(ServerError::Database)?;
        tx.commit().await.map_err(ServerError::Database)?;
        Ok(())
    }

    pub async fn increment_device_threat_count(&self, device_id: &str) -> Result<(), ServerError> {
        sqlx::query("UPDATE device_sessions SET threat_count = threat_count + 1 WHERE device_id = ?1")
            .bind(device_id)
            .execute(&self.pool)
            .await
            .map_err(ServerError::Database)?;
        Ok(())
    }

    pub async fn record_monitoring_event(&self, event_type: &str, device_id: Option<&str>, event_data: &str) -> Result<(), ServerError> {
        sqlx::query(
            "INSERT INTO monitoring_events (event_type, device_id, event_data_blob, timestamp) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(event_type)
        .bind(device_id)
        .bind(event_data)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(ServerError::Database)?;
        Ok(())
    }

    pub async fn threats_since(&self, since: DateTime<Utc>) -> Result<i64, ServerError> {
        let row = sqlx::query("SELECT COUNT(*) as c FROM cellular_threats WHERE timestamp >= ?1")
            .bind(since.to_rfc3339())
            .fetch_one(&self.pool)
            .await
            .map_err(ServerError::Database)?;
        Ok(row.get::<i64, _>("c"))
    }

    pub async fn threats_since_by_type(&self, since: DateTime<Utc>) -> Result<Vec<(String, i64)>, ServerError> {
        let rows = sqlx::query(
            "SELECT threat_type, COUNT(*) as c FROM cellular_threats WHERE timestamp >= ?1 GROUP BY threat_type",
        )
        .bind(since.to_rfc3339())
        .fetch_all(&self.pool)
        .await
        .map_err(ServerError::Database)?;
        Ok(rows.into_iter().map(|r| (r.get::<String, _>("threat_type"), r.get::<i64, _>("c"))).collect())
    }

    /// Threats since `since`, reconstructed as wire-ready records, used by
    /// the correlator to examine the trailing 60-minute IMSI window
    /// (spec.md §4.8) and to populate `coordinated_attack_detected`'s
    /// `related_threats`.
    pub async fn recent_threats_for_correlation(&self, since: DateTime<Utc>) -> Result<Vec<(String, ThreatWire)>, ServerError> {
        let rows = sqlx::query(
            "SELECT device_id, threat_id, threat_type, severity, timestamp, location_lat, location_lon,
                    cellular_data_blob, description, confidence
             FROM cellular_threats WHERE timestamp >= ?1",
        )
        .bind(since.to_rfc3339())
        .fetch_all(&self.pool)
        .await
        .map_err(ServerError::Database)?;
        Ok(rows
            .into_iter()
            .filter_map(|r| {
                let device_id: String = r.get("device_id");
                let threat_type = Self::threat_type_from_str(&r.get::<String, _>("threat_type"))?;
                let severity = severity_from_str(&r.get::<String, _>("severity"))?;
                let ts: String = r.get("timestamp");
                let timestamp = DateTime::parse_from_rfc3339(&ts).map(|d| d.with_timezone(&Utc)).unwrap_or(Utc::now());
                let lat: Option<f64> = r.get("location_lat");
                let lon: Option<f64> = r.get("location_lon");
                let location = match (lat, lon) {
                    (Some(latitude), Some(longitude)) => Some(GeoPoint { latitude, longitude }),
                    _ => None,
                };
                let cellular_data: Option<String> = r.get("cellular_data_blob");
                let cellular_data = cellular_data.and_then(|blob| serde_json::from_str(&blob).ok());
                let wire = ThreatWire {
                    threat_id: r.get("threat_id"),
                    threat_type,
                    severity,
                    timestamp,
                    location,
                    cellular_data,
                    description: r.get("description"),
                    confidence: r.get("confidence"),
                };
                Some((device_id, wire))
            })
            .collect())
    }

    pub fn threat_type_from_str(s: &str) -> Option<ThreatType> {
        serde_json::from_value(serde_json::Value::String(s.to_string())).ok()
    }

    pub async fn device_session(&self, device_id: &str) -> Result<Option<DeviceSessionRow>, ServerError> {
        let row = sqlx::query(
            "SELECT device_id, device_name, last_seen, connection_count, threat_count FROM device_sessions WHERE device_id = ?1",
        )
        .bind(device_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(ServerError::Database)?;
        Ok(row.map(|r| {
            let last_seen: String = r.get("last_seen");
            DeviceSessionRow {
                device_id: r.get("device_id"),
                device_name: r.get("device_name"),
                last_seen: DateTime::parse_from_rfc3339(&last_seen).map(|d| d.with_timezone(&Utc)).unwrap_or(Utc::now()),
                connection_count: r.get("connection_count"),
                threat_count: r.get("threat_count"),
            }
        }))
    }

    /// Exports the last 100 threats plus summary counters as a single JSON
    /// object (spec.md §6 export format), appended by the caller to a
    /// timestamped export file.
    pub async fn export_snapshot(&self, connected_devices: usize) -> Result<serde_json::Value, ServerError> {
        let rows = sqlx::query(
            "SELECT device_id, threat_id, threat_type, severity, timestamp, description, confidence
             FROM cellular_threats ORDER BY id DESC LIMIT 100",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(ServerError::Database)?;

        let threats: Vec<serde_json::Value> = rows
            .into_iter()
            .map(|r| {
                serde_json::json!({
                    "device_id": r.get::<String, _>("device_id"),
                    "threat_id": r.get::<String, _>("threat_id"),
                    "threat_type": r.get::<String, _>("threat_type"),
                    "severity": r.get::<String, _>("severity"),
                    "timestamp": r.get::<String, _>("timestamp"),
                    "description": r.get::<String, _>("description"),
                    "confidence": r.get::<f64, _>("confidence"),
                })
            })
            .collect();
        let total: i64 = sqlx::query("SELECT COUNT(*) as c FROM cellular_threats")
            .fetch_one(&self.pool)
            .await
            .map_err(ServerError::Database)?
            .get("c");

        Ok(serde_json::json!({
            "export_timestamp": Utc::now().to_rfc3339(),
            "total_threats": total,
            "connected_devices": connected_devices,
            "threats": threats,
        }))
    }
}

fn severity_str(s: Severity) -> &'static str {
    match s {
        Severity::Low => "low",
        Severity::Medium => "medium",
        Severity::High => "high",
        Severity::Critical => "critical",
    }
}

fn severity_from_str(s: &str) -> Option<Severity> {
    serde_json::from_value(serde_json::Value::String(s.to_string())).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Evidence, TowerId};

    async fn store() -> ThreatStore {
        ThreatStore::open(":memory:").await.unwrap()
    }

    fn threat() -> Threat {
        Threat::new(
            ThreatType::TimingAdvanceZero,
            Severity::Medium,
            Utc::now(),
            "test",
            Evidence::new().with("ta", 0).build(),
            0.6,
            None,
            vec![TowerId::new("1", 1, 310, 260)],
            "advice",
        )
    }

    #[tokio::test]
    async fn reinserting_same_threat_id_leaves_one_row() {
        let s = store().await;
        let t = threat();
        s.insert_threat("dev-1", &t).await.unwrap();
        s.insert_threat("dev-1", &t).await.unwrap();
        let count = s.threats_since(Utc::now() - chrono::Duration::hours(1)).await.unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn device_session_increments_connection_count_on_reregister() {
        let s = store().await;
        s.upsert_device_session("dev-1", "Pixel", Utc::now()).await.unwrap();
        s.upsert_device_session("dev-1", "Pixel", Utc::now()).await.unwrap();
        let row = s.device_session("dev-1").await.unwrap().unwrap();
        assert_eq!(row.connection_count, 2);
        assert_eq!(row.threat_count, 0);
    }
}
