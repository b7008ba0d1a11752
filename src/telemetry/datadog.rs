//! Datadog HTTP intake sink (no agent required).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use tracing::warn;

use super::{LogRecord, MetricKind, MetricPoint, TelemetrySink};

const HOSTNAME: &str = "agentceo-app";

/// Delivery is best-effort; a slow intake must not hold up the caller.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

fn http_client(timeout: Duration) -> Client {
    Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|_| Client::new())
}

/// Posts logs to the logs intake and metrics to the v2 series API.
pub struct DatadogSink {
    client: Client,
    api_key: SecretString,
    logs_url: String,
    metrics_url: String,
    service: String,
    env: String,
}

impl DatadogSink {
    pub fn new(api_key: SecretString, site: &str, service: &str, env: &str) -> Self {
        Self::with_endpoints(
            api_key,
            format!("https://http-intake.logs.{site}/api/v2/logs"),
            format!("https://api.{site}/api/v2/series"),
            service,
            env,
        )
    }

    /// Sink with explicit endpoint URLs.
    pub fn with_endpoints(
        api_key: SecretString,
        logs_url: impl Into<String>,
        metrics_url: impl Into<String>,
        service: &str,
        env: &str,
    ) -> Self {
        Self {
            client: http_client(DEFAULT_TIMEOUT),
            api_key,
            logs_url: logs_url.into(),
            metrics_url: metrics_url.into(),
            service: service.to_string(),
            env: env.to_string(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = http_client(timeout);
        self
    }

    async fn post(&self, url: &str, body: &serde_json::Value, what: &str) {
        let result = self
            .client
            .post(url)
            .header("DD-API-KEY", self.api_key.expose_secret())
            .json(body)
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {}
            Ok(response) => {
                let status = response.status();
                let text = response.text().await.unwrap_or_default();
                warn!(status = %status, body = %text, "Datadog {what} delivery rejected");
            }
            Err(e) => warn!(error = %e, "Datadog {what} delivery failed"),
        }
    }
}

/// Datadog v2 series metric type.
fn series_type(kind: MetricKind) -> u8 {
    match kind {
        MetricKind::Count => 1,
        MetricKind::Gauge => 3,
    }
}

#[async_trait]
impl TelemetrySink for DatadogSink {
    async fn send_log(&self, record: &LogRecord) {
        let mut message = record.attributes.clone();
        message.insert("message".into(), json!(record.message));
        message.insert("level".into(), json!(record.level));
        message.insert("timestamp".into(), json!(record.timestamp.to_rfc3339()));

        let body = json!([{
            "ddsource": "rust",
            "ddtags": format!("env:{},service:{}", self.env, self.service),
            "hostname": HOSTNAME,
            "message": serde_json::Value::Object(message).to_string(),
            "service": self.service,
            "status": record.level,
        }]);
        self.post(&self.logs_url, &body, "log").await;
    }

    async fn send_metric(&self, point: &MetricPoint) {
        let body = json!({
            "series": [{
                "metric": point.name,
                "type": series_type(point.kind),
                "points": [{"timestamp": point.timestamp, "value": point.value}],
                "tags": point.tags,
            }]
        });
        self.post(&self.metrics_url, &body, "metric").await;
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::telemetry::LogLevel;

    fn sink(server: &MockServer) -> DatadogSink {
        DatadogSink::with_endpoints(
            SecretString::from("dd-key"),
            format!("{}/api/v2/logs", server.uri()),
            format!("{}/api/v2/series", server.uri()),
            "agentceo",
            "test",
        )
    }

    #[test]
    fn site_determines_endpoints() {
        let sink = DatadogSink::new(SecretString::from("k"), "datadoghq.eu", "s", "e");
        assert_eq!(sink.logs_url, "https://http-intake.logs.datadoghq.eu/api/v2/logs");
        assert_eq!(sink.metrics_url, "https://api.datadoghq.eu/api/v2/series");
    }

    #[tokio::test]
    async fn posts_metric_series_with_api_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v2/series"))
            .and(header("DD-API-KEY", "dd-key"))
            .and(body_partial_json(json!({
                "series": [{
                    "metric": "agentceo.llm.request.count",
                    "type": 1,
                    "tags": ["status:success"]
                }]
            })))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&server)
            .await;

        sink(&server)
            .send_metric(&MetricPoint {
                name: "agentceo.llm.request.count".into(),
                value: 1.0,
                kind: MetricKind::Count,
                timestamp: 1_700_000_000,
                tags: vec!["status:success".into()],
            })
            .await;
    }

    #[tokio::test]
    async fn posts_log_batch() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v2/logs"))
            .and(body_partial_json(json!([{
                "ddtags": "env:test,service:agentceo",
                "service": "agentceo"
            }])))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&server)
            .await;

        sink(&server)
            .send_log(&LogRecord {
                level: LogLevel::Info,
                message: "started".into(),
                timestamp: Utc::now(),
                attributes: Default::default(),
            })
            .await;
    }

    #[tokio::test]
    async fn rejected_delivery_does_not_panic() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_string("bad key"))
            .mount(&server)
            .await;

        sink(&server)
            .send_log(&LogRecord {
                level: LogLevel::Error,
                message: "boom".into(),
                timestamp: Utc::now(),
                attributes: Default::default(),
            })
            .await;
    }

    #[tokio::test]
    async fn slow_intake_gives_up_after_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(202).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let started = std::time::Instant::now();
        sink(&server)
            .with_timeout(Duration::from_millis(100))
            .send_log(&LogRecord {
                level: LogLevel::Info,
                message: "slow".into(),
                timestamp: Utc::now(),
                attributes: Default::default(),
            })
            .await;
        assert!(started.elapsed() < Duration::from_secs(3));
    }
}
