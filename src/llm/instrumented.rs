//! Telemetry decorator for any [`TextGenerator`].

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde_json::json;

use crate::drafts::model::{ReplySource, Tone};
use crate::error::LlmError;
use crate::llm::generator::{ChatContext, TextGenerator};
use crate::llm::provider::ChatMessage;
use crate::telemetry::{LogLevel, MetricKind, Telemetry};
use crate::triage::{Classification, TriageInput};

/// Records start/complete/error logs plus duration and count metrics for
/// every generation call.
pub struct InstrumentedGenerator {
    inner: Arc<dyn TextGenerator>,
    telemetry: Arc<Telemetry>,
}

impl InstrumentedGenerator {
    pub fn new(inner: Arc<dyn TextGenerator>, telemetry: Arc<Telemetry>) -> Self {
        Self { inner, telemetry }
    }

    async fn traced<T, F>(&self, operation: &str, call: F) -> Result<T, LlmError>
    where
        F: Future<Output = Result<T, LlmError>>,
    {
        let model = self.inner.model_name().to_string();
        let started = Instant::now();

        self.telemetry
            .log(
                LogLevel::Info,
                format!("LLM call started: {operation}"),
                json!({"operation": operation, "model": model, "type": "llm_request_start"}),
            )
            .await;

        let result = call.await;
        let duration_ms = started.elapsed().as_millis() as u64;

        match &result {
            Ok(_) => {
                self.telemetry
                    .log(
                        LogLevel::Info,
                        format!("LLM call completed: {operation}"),
                        json!({
                            "operation": operation,
                            "model": model,
                            "duration_ms": duration_ms,
                            "type": "llm_request_complete",
                            "status": "success",
                        }),
                    )
                    .await;
                self.telemetry
                    .metric(
                        "llm.request.duration",
                        duration_ms as f64,
                        MetricKind::Gauge,
                        &[format!("operation:{operation}"), format!("model:{model}")],
                    )
                    .await;
                self.telemetry
                    .metric(
                        "llm.request.count",
                        1.0,
                        MetricKind::Count,
                        &[format!("operation:{operation}"), "status:success".to_string()],
                    )
                    .await;
            }
            Err(e) => {
                tracing::warn!(operation, model = %model, error = %e, "LLM call failed");
                self.telemetry
                    .log(
                        LogLevel::Error,
                        format!("LLM call failed: {operation}"),
                        json!({
                            "operation": operation,
                            "model": model,
                            "duration_ms": duration_ms,
                            "type": "llm_request_error",
                            "error": e.to_string(),
                        }),
                    )
                    .await;
                self.telemetry
                    .metric(
                        "llm.request.count",
                        1.0,
                        MetricKind::Count,
                        &[format!("operation:{operation}"), "status:error".to_string()],
                    )
                    .await;
            }
        }

        result
    }
}

#[async_trait]
impl TextGenerator for InstrumentedGenerator {
    fn model_name(&self) -> &str {
        self.inner.model_name()
    }

    async fn classify(&self, input: &TriageInput) -> Result<Classification, LlmError> {
        self.traced("triage", self.inner.classify(input)).await
    }

    async fn draft_reply(&self, source: &ReplySource, tone: Tone) -> Result<String, LlmError> {
        self.traced("generate_draft", self.inner.draft_reply(source, tone))
            .await
    }

    async fn chat(
        &self,
        messages: &[ChatMessage],
        context: Option<&ChatContext>,
    ) -> Result<String, LlmError> {
        self.traced("chat", self.inner.chat(messages, context)).await
    }
}
