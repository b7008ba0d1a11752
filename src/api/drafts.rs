//! Draft endpoints: create, review, and send replies.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;
use uuid::Uuid;

use super::AppState;
use super::auth::{optional_session, require_session};
use super::handlers::approved_body;
use crate::drafts::{Draft, DraftStatus, ReplySource, Tone};
use crate::error::ApiError;

fn parse_id(id: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(id).map_err(|_| ApiError::Validation("Invalid draft ID".to_string()))
}

// ── Gmail draft ─────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct OriginalEmail {
    #[serde(default)]
    from: Option<String>,
    #[serde(default)]
    subject: Option<String>,
    #[serde(default)]
    body: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GmailDraftRequest {
    #[serde(default, alias = "originalEmail")]
    original_email: Option<OriginalEmail>,
    #[serde(default)]
    tone: Tone,
    #[serde(default, alias = "threadId")]
    thread_id: Option<String>,
    #[serde(default, alias = "sourceId")]
    source_id: Option<String>,
}

/// `POST /api/gmail/draft`: generate a reply and save it in Gmail drafts.
pub async fn gmail_draft(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<GmailDraftRequest>,
) -> Result<(CookieJar, Json<Value>), ApiError> {
    let (session, jar) = require_session(&state, jar).await?;

    let original = req.original_email.ok_or_else(|| {
        ApiError::Validation("Missing required field: original_email".to_string())
    })?;
    let (Some(from), Some(subject)) = (
        original.from.filter(|v| !v.trim().is_empty()),
        original.subject.filter(|v| !v.trim().is_empty()),
    ) else {
        return Err(ApiError::Validation(
            "Missing required fields: from, subject".to_string(),
        ));
    };

    let source = ReplySource {
        source_id: req
            .source_id
            .or_else(|| req.thread_id.clone())
            .unwrap_or_default(),
        from,
        subject,
        body: original.body.unwrap_or_default(),
        thread_id: req.thread_id,
    };
    let draft = state
        .workflow
        .create_draft(Some(&session), &source, req.tone)
        .await?;
    info!(draft_id = %draft.id, tone = %draft.tone, "Gmail draft created");
    Ok((jar, Json(json!({ "draft": draft }))))
}

// ── Draft queue ─────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(default)]
    status: Option<DraftStatus>,
}

/// `GET /api/drafts?status=`
pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Json<Value> {
    let mut drafts = state.workflow.queue().list().await;
    if let Some(status) = params.status {
        drafts.retain(|d| d.status == status);
    }
    Json(json!({ "drafts": drafts }))
}

#[derive(Debug, Deserialize)]
pub struct CreateRequest {
    source: ReplySource,
    #[serde(default)]
    tone: Tone,
}

/// `POST /api/drafts`: generate a draft. Mirrored to Gmail only when the
/// caller has a session.
pub async fn create(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<CreateRequest>,
) -> Result<(StatusCode, CookieJar, Json<Draft>), ApiError> {
    if req.source.from.trim().is_empty() {
        return Err(ApiError::Validation("Missing required field: from".to_string()));
    }
    let (session, jar) = optional_session(&state, jar).await;
    let draft = state
        .workflow
        .create_draft(session.as_ref(), &req.source, req.tone)
        .await?;
    Ok((StatusCode::CREATED, jar, Json(draft)))
}

/// `GET /api/drafts/{id}`
pub async fn get_one(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Draft>, ApiError> {
    let id = parse_id(&id)?;
    state
        .workflow
        .queue()
        .get(id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Draft not found: {id}")))
}

#[derive(Debug, Deserialize)]
pub struct EditRequest {
    body: String,
}

/// `POST /api/drafts/{id}/edit`
pub async fn edit(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<EditRequest>,
) -> Result<Json<Draft>, ApiError> {
    let id = parse_id(&id)?;
    Ok(Json(state.workflow.edit_draft(id, req.body).await?))
}

/// `POST /api/drafts/{id}/approve`
pub async fn approve(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Draft>, ApiError> {
    let id = parse_id(&id)?;
    Ok(Json(state.workflow.approve(id).await?))
}

/// `POST /api/drafts/{id}/reject`
pub async fn reject(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Draft>, ApiError> {
    let id = parse_id(&id)?;
    Ok(Json(state.workflow.reject(id).await?))
}

/// `POST /api/drafts/{id}/send`: deliver an approved draft.
///
/// Requires `{"approved": true}` in the body; checked before the session.
pub async fn send(
    State(state): State<AppState>,
    Path(id): Path<String>,
    jar: CookieJar,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<(CookieJar, Json<Draft>), ApiError> {
    let id = parse_id(&id)?;
    approved_body(body)?;

    let (session, jar) = require_session(&state, jar).await?;
    let draft = state.workflow.send(&session, id, true).await?;
    Ok((jar, Json(draft)))
}
