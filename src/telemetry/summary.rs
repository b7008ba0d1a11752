//! Aggregated metrics view served by `/api/metrics`.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{LogRecord, METRIC_PREFIX, MetricPoint};

const RECENT_METRICS: usize = 20;
const RECENT_LOGS: usize = 10;

#[derive(Debug, Clone, Serialize)]
pub struct LlmStats {
    pub total_calls: usize,
    /// `None` until a call has completed.
    pub avg_duration_ms: Option<f64>,
    /// Percentage of calls that succeeded; `None` with no calls.
    pub success_rate: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ApiStats {
    pub total_calls: usize,
    pub avg_duration_ms: Option<f64>,
    /// Percentage of requests answered with a 4xx or 5xx status.
    pub error_rate: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SystemStats {
    pub uptime_seconds: i64,
    /// Human form, e.g. `"2h 34m"`.
    pub uptime: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SummaryStats {
    pub llm: LlmStats,
    pub api: ApiStats,
    pub system: SystemStats,
}

/// Response body of `/api/metrics`.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSummary {
    pub summary: SummaryStats,
    pub recent_metrics: Vec<MetricPoint>,
    pub recent_logs: Vec<LogRecord>,
}

impl MetricsSummary {
    pub fn compute(
        metrics: &[MetricPoint],
        logs: &[LogRecord],
        started_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Self {
        let named = |suffix: &str| {
            let name = format!("{METRIC_PREFIX}{suffix}");
            metrics
                .iter()
                .filter(move |m| m.name == name)
                .collect::<Vec<_>>()
        };

        let llm_counts = named("llm.request.count");
        let llm_successes = llm_counts
            .iter()
            .filter(|m| m.tag("status") == Some("success"))
            .count();
        let llm = LlmStats {
            total_calls: llm_counts.len(),
            avg_duration_ms: average(&named("llm.request.duration")),
            success_rate: percentage(llm_successes, llm_counts.len()),
        };

        let api_counts = named("api.request.count");
        let api_errors = api_counts
            .iter()
            .filter(|m| {
                m.tag("status")
                    .and_then(|s| s.parse::<u16>().ok())
                    .is_some_and(|code| code >= 400)
            })
            .count();
        let api = ApiStats {
            total_calls: api_counts.len(),
            avg_duration_ms: average(&named("api.request.duration")),
            error_rate: percentage(api_errors, api_counts.len()),
        };

        let uptime_seconds = (now - started_at).num_seconds().max(0);
        let system = SystemStats {
            uptime_seconds,
            uptime: format_uptime(uptime_seconds),
        };

        Self {
            summary: SummaryStats { llm, api, system },
            recent_metrics: tail(metrics, RECENT_METRICS),
            recent_logs: tail(logs, RECENT_LOGS),
        }
    }
}

fn average(points: &[&MetricPoint]) -> Option<f64> {
    if points.is_empty() {
        return None;
    }
    let sum: f64 = points.iter().map(|m| m.value).sum();
    Some((sum / points.len() as f64).round())
}

fn percentage(part: usize, total: usize) -> Option<f64> {
    if total == 0 {
        return None;
    }
    let pct = part as f64 / total as f64 * 100.0;
    Some((pct * 10.0).round() / 10.0)
}

fn tail<T: Clone>(items: &[T], n: usize) -> Vec<T> {
    items[items.len().saturating_sub(n)..].to_vec()
}

fn format_uptime(seconds: i64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    if hours > 0 {
        format!("{hours}h {minutes}m")
    } else if minutes > 0 {
        format!("{minutes}m")
    } else {
        format!("{seconds}s")
    }
}
