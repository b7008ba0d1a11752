//! Telemetry: in-memory collection of logs and metrics, with optional
//! forwarding to Datadog.
//!
//! The in-memory collector is always active and backs `/api/metrics`.
//! A remote sink is attached at startup when Datadog is configured.

mod collector;
mod datadog;
mod summary;

pub use collector::{DEFAULT_LOG_CAPACITY, DEFAULT_METRIC_CAPACITY, InMemoryCollector};
pub use datadog::DatadogSink;
pub use summary::{ApiStats, LlmStats, MetricsSummary, SummaryStats, SystemStats};

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::{TelemetryBackend, TelemetrySettings};

/// Prefix applied to every metric name.
pub const METRIC_PREFIX: &str = "agentceo.";

/// How a metric point aggregates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Gauge,
    Count,
}

/// A single metric observation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricPoint {
    /// Fully prefixed name, e.g. `agentceo.llm.request.count`.
    pub name: String,
    pub value: f64,
    pub kind: MetricKind,
    /// Unix seconds.
    pub timestamp: i64,
    pub tags: Vec<String>,
}

impl MetricPoint {
    /// Value of the first `key:value` tag with this key.
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.iter().find_map(|t| {
            t.strip_prefix(key)
                .and_then(|rest| rest.strip_prefix(':'))
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Debug => write!(f, "debug"),
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// A structured log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogRecord {
    pub level: LogLevel,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

/// Remote destination for telemetry. Delivery failures are the sink's problem;
/// callers never see them.
#[async_trait]
pub trait TelemetrySink: Send + Sync {
    async fn send_log(&self, record: &LogRecord);
    async fn send_metric(&self, point: &MetricPoint);
}

/// Telemetry handle shared across the service.
pub struct Telemetry {
    collector: InMemoryCollector,
    sink: Option<Arc<dyn TelemetrySink>>,
    service: String,
    env: String,
    started_at: DateTime<Utc>,
}

impl Telemetry {
    /// Build from settings, attaching the Datadog sink when configured.
    pub fn from_settings(settings: &TelemetrySettings) -> Self {
        let sink: Option<Arc<dyn TelemetrySink>> = match &settings.backend {
            TelemetryBackend::Datadog { api_key, site } => {
                tracing::info!(site = %site, "Forwarding telemetry to Datadog");
                Some(Arc::new(DatadogSink::new(
                    api_key.clone(),
                    site,
                    &settings.service,
                    &settings.env,
                )))
            }
            TelemetryBackend::InMemory => None,
        };
        Self {
            collector: InMemoryCollector::default(),
            sink,
            service: settings.service.clone(),
            env: settings.env.clone(),
            started_at: Utc::now(),
        }
    }

    /// In-memory only, with default tags.
    pub fn in_memory() -> Self {
        Self::from_settings(&TelemetrySettings::default())
    }

    /// Attach a remote sink.
    pub fn with_sink(mut self, sink: Arc<dyn TelemetrySink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Whether events leave the process.
    pub fn is_remote(&self) -> bool {
        self.sink.is_some()
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn env(&self) -> &str {
        &self.env
    }

    pub fn collector(&self) -> &InMemoryCollector {
        &self.collector
    }

    /// Record a log entry. `attributes` must be a JSON object; anything else is
    /// stored under `"value"`.
    pub async fn log(&self, level: LogLevel, message: impl Into<String>, attributes: Value) {
        let attributes = match attributes {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                let mut map = Map::new();
                map.insert("value".to_string(), other);
                map
            }
        };
        let record = LogRecord {
            level,
            message: message.into(),
            timestamp: Utc::now(),
            attributes,
        };
        self.collector.record_log(record.clone()).await;
        if let Some(sink) = &self.sink {
            sink.send_log(&record).await;
        }
    }

    /// Record a metric. The name is prefixed and the env/service tags added.
    pub async fn metric(&self, name: &str, value: f64, kind: MetricKind, tags: &[String]) {
        let mut all_tags = vec![
            format!("env:{}", self.env),
            format!("service:{}", self.service),
        ];
        all_tags.extend(tags.iter().cloned());

        let point = MetricPoint {
            name: format!("{METRIC_PREFIX}{name}"),
            value,
            kind,
            timestamp: Utc::now().timestamp(),
            tags: all_tags,
        };
        self.collector.record_metric(point.clone()).await;
        if let Some(sink) = &self.sink {
            sink.send_metric(&point).await;
        }
    }

    /// Record one API request (duration gauge + count).
    pub async fn track_api_request(&self, endpoint: &str, method: &str, status: u16, duration_ms: u64) {
        self.log(
            LogLevel::Info,
            format!("API request: {method} {endpoint}"),
            serde_json::json!({
                "endpoint": endpoint,
                "method": method,
                "status_code": status,
                "duration_ms": duration_ms,
                "type": "api_request",
            }),
        )
        .await;
        self.metric(
            "api.request.duration",
            duration_ms as f64,
            MetricKind::Gauge,
            &[format!("endpoint:{endpoint}"), format!("method:{method}")],
        )
        .await;
        self.metric(
            "api.request.count",
            1.0,
            MetricKind::Count,
            &[format!("endpoint:{endpoint}"), format!("status:{status}")],
        )
        .await;
    }

    /// Aggregate view of everything collected so far.
    pub async fn summary(&self) -> MetricsSummary {
        let metrics = self.collector.metrics().await;
        let logs = self.collector.logs().await;
        MetricsSummary::compute(&metrics, &logs, self.started_at, Utc::now())
    }
}
