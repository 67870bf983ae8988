//! Statistics endpoint (C11): aggregate threat counts over 1h/24h/7d windows,
//! by type.

use chrono::{Duration, Utc};
use serde::Serialize;

use crate::error::ServerError;

use super::store::ThreatStore;

#[derive(Debug, Serialize)]
pub struct WindowStats {
    pub total: i64,
    pub by_type: Vec<(String, i64)>,
}

#[derive(Debug, Serialize)]
pub struct AggregateStats {
    pub last_1h: WindowStats,
    pub last_24h: WindowStats,
    pub last_7d: WindowStats,
}

pub async fn aggregate(store: &ThreatStore) -> Result<AggregateStats, ServerError> {
    let now = Utc::now();
    let windows = [
        ("1h", Duration::hours(1)),
        ("24h", Duration::hours(24)),
        ("7d", Duration::days(7)),
    ];
    let mut results = Vec::with_capacity(3);
    for (_, window) in windows {
        let since = now - window;
        let total = store.threats_since(since).await?;
        let by_type = store.threats_since_by_type(since).await?;
        results.push(WindowStats { total, by_type });
    }
    let mut it = results.into_iter();
    Ok(AggregateStats {
        last_1h: it.next().expect("3 windows"),
        last_24h: it.next().expect("3 windows"),
        last_7d: it.next().expect("3 windows"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Evidence, Severity, Threat, ThreatType, TowerId};

    #[tokio::test]
    async fn aggregate_counts_threats_within_each_window() {
        let store = ThreatStore::open(":memory:").await.unwrap();
        let t = Threat::new(
            ThreatType::PotentialJamming,
            Severity::High,
            Utc::now(),
            "test",
            Evidence::new().build(),
            0.7,
            None,
            vec![TowerId::new("1", 1, 310, 260)],
            "advice",
        );
        store.insert_threat("dev-1", &t).await.unwrap();
        let stats = aggregate(&store).await.unwrap();
        assert_eq!(stats.last_1h.total, 1);
        assert_eq!(stats.last_24h.total, 1);
        assert_eq!(stats.last_7d.total, 1);
    }
}
