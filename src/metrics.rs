//! Prometheus metrics for the cellular threat detection pipeline.

use lazy_static::lazy_static;
use prometheus::{Encoder, Gauge, Histogram, HistogramOpts, IntCounterVec, IntGauge, Opts, TextEncoder};

lazy_static! {
    pub static ref METRICS_REGISTRY: prometheus::Registry = {
        let registry = prometheus::Registry::new();

        registry.register(Box::new(THREATS_DETECTED_TOTAL.clone())).unwrap();
        registry.register(Box::new(DETECTOR_LATENCY_SECONDS.clone())).unwrap();
        registry.register(Box::new(EDGE_TICKS_TOTAL.clone())).unwrap();
        registry.register(Box::new(EDGE_TICKS_SKIPPED_TOTAL.clone())).unwrap();
        registry.register(Box::new(EDGE_MEMORY_USAGE_BYTES.clone())).unwrap();
        registry.register(Box::new(SERVER_ACTIVE_SESSIONS.clone())).unwrap();
        registry.register(Box::new(SERVER_STORAGE_FAILURES_TOTAL.clone())).unwrap();
        registry.register(Box::new(CORRELATION_ALERTS_TOTAL.clone())).unwrap();

        registry
    };

    /// Threats detected, labeled by type and severity (edge) or ingested
    /// (server); `source` distinguishes the two.
    pub static ref THREATS_DETECTED_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("cellular_threats_detected_total", "Total threats detected or ingested"),
        &["threat_type", "severity", "source"]
    ).unwrap();

    pub static ref DETECTOR_LATENCY_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new("cellular_detector_latency_seconds", "Time to run the full detector pipeline over one sample")
            .buckets(vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0])
    ).unwrap();

    pub static ref EDGE_TICKS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("cellular_edge_ticks_total", "Orchestrator ticks processed"),
        &["outcome"]
    ).unwrap();

    pub static ref EDGE_TICKS_SKIPPED_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("cellular_edge_ticks_skipped_total", "Orchestrator ticks skipped"),
        &["reason"]
    ).unwrap();

    pub static ref EDGE_MEMORY_USAGE_BYTES: Gauge = Gauge::new(
        "cellular_edge_memory_usage_bytes",
        "Resident memory usage of the edge process"
    ).unwrap();

    pub static ref SERVER_ACTIVE_SESSIONS: IntGauge = IntGauge::new(
        "cellular_server_active_sessions",
        "Number of device sessions currently in the Active state"
    ).unwrap();

    pub static ref SERVER_STORAGE_FAILURES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("cellular_server_storage_failures_total", "Storage write failures, by table"),
        &["table"]
    ).unwrap();

    pub static ref CORRELATION_ALERTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("cellular_correlation_alerts_total", "Correlation alerts fanned out, by kind"),
        &["kind"]
    ).unwrap();
}

/// Refreshes the edge memory gauge from the current process's resident set.
pub fn refresh_edge_memory_gauge(sys: &mut sysinfo::System) {
    use sysinfo::Pid;
    sys.refresh_process(Pid::from_u32(std::process::id()));
    if let Some(proc_) = sys.process(Pid::from_u32(std::process::id())) {
        EDGE_MEMORY_USAGE_BYTES.set(proc_.memory() as f64 * 1024.0);
    }
}

/// Renders the registry in Prometheus text-exposition format.
pub fn encode() -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&METRICS_REGISTRY.gather(), &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}
