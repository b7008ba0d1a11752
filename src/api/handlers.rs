//! REST handlers for health, inbox, triage, chat, metrics, audit, and feed.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{info, warn};

use super::AppState;
use super::auth::{optional_session, require_session};
use crate::error::ApiError;
use crate::feed::{FeedAggregator, FeedView, Provider};
use crate::llm::{ChatContext, ChatMessage};
use crate::providers::OutboundMessage;
use crate::session::StoredSession;
use crate::telemetry::{LogLevel, MetricsSummary};
use crate::triage::{Classification, TriageInput};

/// Strict approval check: only a JSON `true` counts.
pub(super) fn is_approved(flag: Option<&Value>) -> bool {
    matches!(flag, Some(Value::Bool(true)))
}

pub(super) fn approval_required() -> ApiError {
    ApiError::ApprovalRequired("Message must be explicitly approved before sending".to_string())
}

/// Gate a send body on `"approved": true`. A missing or malformed body is
/// treated as unapproved rather than rejected by the extractor.
pub(super) fn approved_body(body: Result<Json<Value>, JsonRejection>) -> Result<Value, ApiError> {
    let value = match body {
        Ok(Json(value)) => value,
        Err(rejection) => {
            warn!(error = %rejection, "Unreadable send body");
            return Err(approval_required());
        }
    };
    if !is_approved(value.get("approved")) {
        return Err(approval_required());
    }
    Ok(value)
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

// ── Health ──────────────────────────────────────────────────────────

pub async fn health(State(state): State<AppState>, jar: CookieJar) -> Json<Value> {
    let authenticated = StoredSession::from_jar(&jar).is_present();
    Json(json!({
        "status": "ok",
        "timestamp": Utc::now(),
        "services": {
            "generator": {
                "configured": !state.config.generation.is_mock(),
                "model": state.generator.model_name(),
            },
            "telemetry": {
                "configured": state.telemetry.is_remote(),
            },
            "gmail": {
                "configured": state.oauth.is_some(),
                "authenticated": authenticated,
            },
        },
    }))
}

// ── Gmail ───────────────────────────────────────────────────────────

/// `GET /api/gmail/emails`: fetch and triage the caller's inbox.
pub async fn gmail_emails(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<Value>), ApiError> {
    let (session, jar) = require_session(&state, jar).await?;
    let items = state.mail_feed.fetch_live(&session).await?;
    let emails = FeedAggregator::default().aggregate(vec![items]);

    state
        .telemetry
        .log(
            LogLevel::Info,
            "Emails fetched and triaged",
            json!({ "count": emails.len() }),
        )
        .await;
    Ok((jar, Json(json!({ "emails": emails }))))
}

#[derive(Debug, Deserialize)]
pub struct SendRequest {
    #[serde(default)]
    to: Option<String>,
    #[serde(default)]
    subject: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default, alias = "threadId")]
    thread_id: Option<String>,
}

/// `POST /api/gmail/send`: send an approved message with no draft.
///
/// The approval flag is checked before anything else, including the session.
pub async fn gmail_send(
    State(state): State<AppState>,
    jar: CookieJar,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<(CookieJar, Json<Value>), ApiError> {
    let body: SendRequest = serde_json::from_value(approved_body(body)?)
        .map_err(|e| ApiError::Validation(format!("Invalid send request: {e}")))?;

    let (to, subject, content) = match (
        present(&body.to),
        present(&body.subject),
        present(&body.content),
    ) {
        (Some(to), Some(subject), Some(content)) => (to, subject, content),
        _ => {
            return Err(ApiError::Validation(
                "Missing required fields: to, subject, content".to_string(),
            ));
        }
    };

    let (session, jar) = require_session(&state, jar).await?;
    let message = OutboundMessage {
        to: to.to_string(),
        subject: subject.to_string(),
        body: content.to_string(),
        thread_id: body.thread_id.clone(),
    };
    let sent = state.workflow.send_message(&session, &message, true).await?;

    Ok((
        jar,
        Json(json!({
            "success": true,
            "message_id": sent.id,
            "thread_id": sent.thread_id,
        })),
    ))
}

// ── Triage ──────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct TriageRequest {
    #[serde(default)]
    from: Option<String>,
    #[serde(default)]
    subject: Option<String>,
    #[serde(default)]
    body: Option<String>,
}

/// `POST /api/triage`: classify one item.
pub async fn triage(
    State(state): State<AppState>,
    Json(req): Json<TriageRequest>,
) -> Result<Json<Classification>, ApiError> {
    let (Some(from), Some(subject)) = (present(&req.from), present(&req.subject)) else {
        return Err(ApiError::Validation(
            "Missing required fields: from, subject".to_string(),
        ));
    };

    let input = TriageInput::new(from, subject, req.body.unwrap_or_default());
    let classification = state.triage.classify(&input).await;
    info!(urgency = %classification.urgency, "Triage completed");
    Ok(Json(classification))
}

// ── Chat ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    messages: Option<Value>,
    #[serde(default)]
    context: Option<ChatContext>,
}

/// `POST /api/chat`: answer the latest user message.
pub async fn chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<Value>, ApiError> {
    let messages: Vec<ChatMessage> = match req.messages {
        Some(value @ Value::Array(_)) => serde_json::from_value(value)
            .map_err(|e| ApiError::Validation(format!("Invalid messages: {e}")))?,
        _ => return Err(ApiError::Validation("Messages array is required".to_string())),
    };

    let response = state.generator.chat(&messages, req.context.as_ref()).await?;
    Ok(Json(json!({
        "response": response,
        "timestamp": Utc::now(),
    })))
}

// ── Observability ───────────────────────────────────────────────────

/// `GET /api/metrics`: summary computed from the in-memory collector.
pub async fn metrics(State(state): State<AppState>) -> Json<MetricsSummary> {
    Json(state.telemetry.summary().await)
}

#[derive(Debug, Deserialize)]
pub struct AuditParams {
    #[serde(default)]
    limit: Option<usize>,
}

const DEFAULT_AUDIT_LIMIT: usize = 100;

/// `GET /api/audit`: newest entries first.
pub async fn audit(
    State(state): State<AppState>,
    Query(params): Query<AuditParams>,
) -> Json<Value> {
    let entries = state
        .workflow
        .audit()
        .recent(params.limit.unwrap_or(DEFAULT_AUDIT_LIMIT))
        .await;
    Json(json!({ "entries": entries }))
}

// ── Feed ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct FeedParams {
    #[serde(default)]
    provider: Option<String>,
}

/// `GET /api/feed?provider=`: the aggregated, ordered feed.
pub async fn feed(
    State(state): State<AppState>,
    Query(params): Query<FeedParams>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<FeedView>), ApiError> {
    let provider = match params.provider.as_deref() {
        None | Some("") | Some("all") => None,
        Some(raw) => Some(raw.parse::<Provider>().map_err(ApiError::Validation)?),
    };

    let (session, jar) = optional_session(&state, jar).await;
    let view = state.feed.view(session.as_ref(), provider).await;
    Ok((jar, Json(view)))
}
