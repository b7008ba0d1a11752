//! Bounded in-memory telemetry buffers.

use std::collections::VecDeque;

use tokio::sync::RwLock;

use super::{LogRecord, MetricPoint};

pub const DEFAULT_METRIC_CAPACITY: usize = 1000;
pub const DEFAULT_LOG_CAPACITY: usize = 500;

/// Append-only ring buffers of recent metrics and logs. The oldest entries
/// are evicted once a buffer is full.
pub struct InMemoryCollector {
    metrics: RwLock<VecDeque<MetricPoint>>,
    logs: RwLock<VecDeque<LogRecord>>,
    metric_capacity: usize,
    log_capacity: usize,
}

impl InMemoryCollector {
    pub fn new(metric_capacity: usize, log_capacity: usize) -> Self {
        Self {
            metrics: RwLock::new(VecDeque::with_capacity(metric_capacity)),
            logs: RwLock::new(VecDeque::with_capacity(log_capacity)),
            metric_capacity,
            log_capacity,
        }
    }

    pub async fn record_metric(&self, point: MetricPoint) {
        let mut metrics = self.metrics.write().await;
        if metrics.len() >= self.metric_capacity {
            metrics.pop_front();
        }
        metrics.push_back(point);
    }

    pub async fn record_log(&self, record: LogRecord) {
        let mut logs = self.logs.write().await;
        if logs.len() >= self.log_capacity {
            logs.pop_front();
        }
        logs.push_back(record);
    }

    /// All buffered metrics, oldest first.
    pub async fn metrics(&self) -> Vec<MetricPoint> {
        self.metrics.read().await.iter().cloned().collect()
    }

    /// All buffered logs, oldest first.
    pub async fn logs(&self) -> Vec<LogRecord> {
        self.logs.read().await.iter().cloned().collect()
    }
}

impl Default for InMemoryCollector {
    fn default() -> Self {
        Self::new(DEFAULT_METRIC_CAPACITY, DEFAULT_LOG_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::telemetry::{LogLevel, MetricKind};

    fn point(value: f64) -> MetricPoint {
        MetricPoint {
            name: "agentceo.test".into(),
            value,
            kind: MetricKind::Gauge,
            timestamp: 0,
            tags: Vec::new(),
        }
    }

    #[tokio::test]
    async fn evicts_oldest_metric_when_full() {
        let collector = InMemoryCollector::new(3, 3);
        for v in 0..5 {
            collector.record_metric(point(v as f64)).await;
        }
        let values: Vec<f64> = collector.metrics().await.iter().map(|m| m.value).collect();
        assert_eq!(values, vec![2.0, 3.0, 4.0]);
    }

    #[tokio::test]
    async fn evicts_oldest_log_when_full() {
        let collector = InMemoryCollector::new(10, 2);
        for msg in ["a", "b", "c"] {
            collector
                .record_log(LogRecord {
                    level: LogLevel::Info,
                    message: msg.into(),
                    timestamp: Utc::now(),
                    attributes: Default::default(),
                })
                .await;
        }
        let messages: Vec<String> = collector.logs().await.into_iter().map(|l| l.message).collect();
        assert_eq!(messages, vec!["b", "c"]);
    }
}
