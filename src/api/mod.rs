//! HTTP + WebSocket surface.

mod auth;
mod connections;
mod drafts;
mod handlers;
mod middleware;
mod ws;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::AppConfig;
use crate::drafts::{AuditLog, DraftQueue, DraftWorkflow};
use crate::error::Error;
use crate::feed::{FeedService, MailFeedSource};
use crate::llm::{TextGenerator, create_generator};
use crate::providers::{ConnectionRegistry, GmailClient, GoogleOAuth, MailProvider};
use crate::telemetry::Telemetry;
use crate::triage::TriageEngine;

pub use auth::resolve_session;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub generator: Arc<dyn TextGenerator>,
    pub triage: TriageEngine,
    pub feed: Arc<FeedService>,
    /// Email source, also used directly by the inbox endpoint.
    pub mail_feed: Arc<MailFeedSource>,
    pub workflow: Arc<DraftWorkflow>,
    pub connections: Arc<ConnectionRegistry>,
    pub telemetry: Arc<Telemetry>,
    /// Present only when Google credentials are configured.
    pub oauth: Option<Arc<GoogleOAuth>>,
    pub mail: Option<Arc<dyn MailProvider>>,
}

impl AppState {
    /// Wire every component from configuration. Backends are chosen here
    /// and nowhere else.
    pub fn from_config(config: AppConfig) -> Result<Self, Error> {
        let telemetry = Arc::new(Telemetry::from_settings(&config.telemetry));
        let generator = create_generator(&config.generation, telemetry.clone());
        let triage = TriageEngine::new(generator.clone());

        let (oauth, mail) = match &config.google {
            Some(google) => {
                let mail: Arc<dyn MailProvider> = Arc::new(GmailClient::new(&google.gmail_api_base));
                (Some(Arc::new(GoogleOAuth::new(google))), Some(mail))
            }
            None => (None, None),
        };

        let connections = Arc::new(ConnectionRegistry::new());
        let mail_feed = Arc::new(MailFeedSource::new(mail.clone(), triage.clone())?);
        let feed = Arc::new(
            FeedService::with_bundled(mail_feed.clone(), triage.clone())?
                .with_connections(connections.clone()),
        );
        let workflow = Arc::new(DraftWorkflow::new(
            DraftQueue::new(),
            generator.clone(),
            mail.clone(),
            Arc::new(AuditLog::default()),
        ));

        Ok(Self {
            config: Arc::new(config),
            generator,
            triage,
            feed,
            mail_feed,
            workflow,
            connections,
            telemetry,
            oauth,
            mail,
        })
    }
}

/// Build the Axum router with every REST route and the draft event socket.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(handlers::health))
        .route("/api/auth/google", get(auth::start))
        .route("/api/auth/callback/google", get(auth::callback))
        .route("/api/gmail/emails", get(handlers::gmail_emails))
        .route("/api/gmail/draft", post(drafts::gmail_draft))
        .route("/api/gmail/send", post(handlers::gmail_send))
        .route("/api/triage", post(handlers::triage))
        .route("/api/chat", post(handlers::chat))
        .route("/api/metrics", get(handlers::metrics))
        .route("/api/audit", get(handlers::audit))
        .route("/api/feed", get(handlers::feed))
        .route("/api/connections", get(connections::list))
        .route(
            "/api/connections/{provider}/{action}",
            post(connections::action),
        )
        .route("/api/drafts", get(drafts::list).post(drafts::create))
        .route("/api/drafts/{id}", get(drafts::get_one))
        .route("/api/drafts/{id}/edit", post(drafts::edit))
        .route("/api/drafts/{id}/approve", post(drafts::approve))
        .route("/api/drafts/{id}/reject", post(drafts::reject))
        .route("/api/drafts/{id}/send", post(drafts::send))
        .route("/ws", get(ws::ws_handler))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::track_requests,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use tower::ServiceExt;

    fn app() -> Router {
        let state = AppState::from_config(AppConfig::default()).unwrap();
        router(state)
    }

    async fn body_json(resp: axum::response::Response) -> Value {
        let body = axum::body::to_bytes(resp.into_body(), 1_000_000)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn health_reports_mock_services() {
        let req = Request::builder()
            .uri("/api/health")
            .body(Body::empty())
            .unwrap();
        let resp = app().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let parsed = body_json(resp).await;
        assert_eq!(parsed["status"], "ok");
        assert_eq!(parsed["services"]["generator"]["configured"], false);
        assert_eq!(parsed["services"]["gmail"]["configured"], false);
        assert_eq!(parsed["services"]["gmail"]["authenticated"], false);
    }

    #[tokio::test]
    async fn gmail_endpoints_require_session() {
        let req = Request::builder()
            .uri("/api/gmail/emails")
            .body(Body::empty())
            .unwrap();
        let resp = app().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(resp).await["kind"], "authentication_required");
    }

    #[tokio::test]
    async fn unapproved_send_fails_before_auth() {
        let req = post_json(
            "/api/gmail/send",
            serde_json::json!({"to": "a@b.com", "subject": "s", "content": "c", "approved": "true"}),
        );
        let resp = app().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(resp).await["kind"], "approval_required");
    }

    #[tokio::test]
    async fn bodyless_send_requires_approval() {
        let draft_uri = format!("/api/drafts/{}/send", uuid::Uuid::new_v4());
        for uri in ["/api/gmail/send", draft_uri.as_str()] {
            let req = Request::builder()
                .method("POST")
                .uri(uri)
                .body(Body::empty())
                .unwrap();
            let resp = app().oneshot(req).await.unwrap();
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{uri}");
            assert_eq!(body_json(resp).await["kind"], "approval_required");
        }
    }

    #[tokio::test]
    async fn empty_or_invalid_json_send_requires_approval() {
        for raw in ["", "not json", "[true]"] {
            let req = Request::builder()
                .method("POST")
                .uri("/api/gmail/send")
                .header("content-type", "application/json")
                .body(Body::from(raw))
                .unwrap();
            let resp = app().oneshot(req).await.unwrap();
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{raw:?}");
            assert_eq!(body_json(resp).await["kind"], "approval_required");
        }
    }

    #[tokio::test]
    async fn approved_send_with_missing_fields_is_validation_error() {
        let req = post_json(
            "/api/gmail/send",
            serde_json::json!({"to": "a@b.com", "approved": true}),
        );
        let resp = app().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let parsed = body_json(resp).await;
        assert_eq!(parsed["kind"], "validation_error");
        assert_eq!(parsed["error"], "Missing required fields: to, subject, content");
    }

    #[tokio::test]
    async fn triage_requires_from_and_subject() {
        let req = post_json("/api/triage", serde_json::json!({"from": "a@b.com"}));
        let resp = app().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let req = post_json(
            "/api/triage",
            serde_json::json!({"from": "ceo@x.com", "subject": "URGENT: sign today", "body": ""}),
        );
        let resp = app().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await["urgency"], "urgent");
    }

    #[tokio::test]
    async fn chat_requires_message_array() {
        let req = post_json("/api/chat", serde_json::json!({"messages": "hi"}));
        let resp = app().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(resp).await["error"], "Messages array is required");
    }

    #[tokio::test]
    async fn invalid_draft_id_is_rejected() {
        let req = Request::builder()
            .uri("/api/drafts/not-a-uuid")
            .body(Body::empty())
            .unwrap();
        let resp = app().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(resp).await["error"], "Invalid draft ID");
    }

    #[tokio::test]
    async fn unknown_feed_provider_is_rejected() {
        let req = Request::builder()
            .uri("/api/feed?provider=myspace")
            .body(Body::empty())
            .unwrap();
        let resp = app().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn gmail_connect_without_credentials_is_not_configured() {
        let req = Request::builder()
            .method("POST")
            .uri("/api/connections/gmail/connect")
            .body(Body::empty())
            .unwrap();
        let resp = app().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn disconnected_provider_drops_out_of_feed() {
        let state = AppState::from_config(AppConfig::default()).unwrap();
        let get_feed = || {
            Request::builder()
                .uri("/api/feed")
                .body(Body::empty())
                .unwrap()
        };
        let has_slack = |feed: &Value| {
            feed["items"]
                .as_array()
                .unwrap()
                .iter()
                .any(|i| i["provider"] == "slack")
        };

        let resp = router(state.clone()).oneshot(get_feed()).await.unwrap();
        assert!(has_slack(&body_json(resp).await));

        let req = Request::builder()
            .method("POST")
            .uri("/api/connections/slack/disconnect")
            .body(Body::empty())
            .unwrap();
        let resp = router(state.clone()).oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = router(state).oneshot(get_feed()).await.unwrap();
        assert!(!has_slack(&body_json(resp).await));
    }
}
