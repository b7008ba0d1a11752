//! Integration tests for the dashboard REST + WebSocket surface.
//!
//! Each test spins up an Axum server on a random port and exercises the
//! real HTTP / WS contract. Gmail and Google OAuth are stood in for by a
//! wiremock server.

use std::time::Duration;

use futures_util::StreamExt;
use secrecy::SecretString;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use agentceo::api::{AppState, router};
use agentceo::config::{AppConfig, GoogleConfig};

/// Maximum time any test is allowed to run before we consider it hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(10);

const SESSION_COOKIE: &str = "gmail_access_token=access-123; gmail_account=me@agentceo.dev";

/// Start the server on a random port and return its base URL.
async fn start_server(config: AppConfig) -> String {
    let state = AppState::from_config(config).unwrap();
    let app = router(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Give the server a moment to start accepting connections.
    tokio::time::sleep(Duration::from_millis(50)).await;

    format!("127.0.0.1:{port}")
}

/// Config whose Google endpoints all point at `mock`.
fn google_config(mock: &MockServer) -> AppConfig {
    AppConfig {
        google: Some(GoogleConfig {
            client_id: "client-1".into(),
            client_secret: SecretString::from("secret-1"),
            redirect_uri: "http://localhost/api/auth/callback/google".into(),
            auth_url: format!("{}/auth", mock.uri()),
            token_url: format!("{}/token", mock.uri()),
            gmail_api_base: mock.uri(),
        }),
        ..AppConfig::default()
    }
}

fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}

/// Parse a WS text frame into a serde_json::Value.
fn parse_ws_json(msg: &Message) -> Value {
    match msg {
        Message::Text(txt) => serde_json::from_str(txt).expect("invalid JSON from server"),
        other => panic!("expected Text frame, got {:?}", other),
    }
}

fn reply_source() -> Value {
    json!({
        "source_id": "email-1",
        "from": "Sarah Chen <sarah@techcorp.com>",
        "subject": "Meeting next week",
        "body": "Can we meet Tuesday?",
        "thread_id": "thread-1"
    })
}

// ── Feed ────────────────────────────────────────────────────────────

#[tokio::test]
async fn feed_is_ordered_and_filterable() {
    timeout(TEST_TIMEOUT, async {
        let addr = start_server(AppConfig::default()).await;
        let http = client();

        let view: Value = http
            .get(format!("http://{addr}/api/feed"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        let items = view["items"].as_array().unwrap();
        assert!(items.len() >= 10, "all four providers are present");
        let scores: Vec<u64> = items
            .iter()
            .map(|i| i["priority_score"].as_u64().unwrap())
            .collect();
        assert!(scores.windows(2).all(|w| w[0] >= w[1]), "{scores:?}");

        let focus = view["focus"].as_array().unwrap();
        assert!(focus.len() <= 5);
        assert!(focus.iter().all(|i| i["priority_score"].as_u64().unwrap() >= 60));

        let slack: Value = http
            .get(format!("http://{addr}/api/feed?provider=slack"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let slack_items = slack["items"].as_array().unwrap();
        assert!(!slack_items.is_empty());
        assert!(slack_items.iter().all(|i| i["provider"] == "slack"));
        // Focus is computed over the whole feed, not the filtered list.
        assert_eq!(slack["focus"], view["focus"]);
    })
    .await
    .expect("test timed out");
}

// ── Drafts ──────────────────────────────────────────────────────────

#[tokio::test]
async fn ws_receives_sync_then_created_draft() {
    timeout(TEST_TIMEOUT, async {
        let addr = start_server(AppConfig::default()).await;

        let (mut ws, _resp) = connect_async(format!("ws://{addr}/ws"))
            .await
            .expect("WS connect failed");

        let sync = parse_ws_json(&ws.next().await.unwrap().unwrap());
        assert_eq!(sync["type"], "drafts_sync");
        assert!(sync["drafts"].as_array().unwrap().is_empty());

        let resp = client()
            .post(format!("http://{addr}/api/drafts"))
            .json(&json!({ "source": reply_source(), "tone": "friendly" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 201);
        let draft: Value = resp.json().await.unwrap();

        let created = parse_ws_json(&ws.next().await.unwrap().unwrap());
        assert_eq!(created["type"], "draft_created");
        assert_eq!(created["draft"]["id"], draft["id"]);
        assert_eq!(created["draft"]["status"], "pending");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn draft_lifecycle_enforces_approval() {
    timeout(TEST_TIMEOUT, async {
        let addr = start_server(AppConfig::default()).await;
        let http = client();
        let base = format!("http://{addr}/api/drafts");

        let draft: Value = http
            .post(&base)
            .json(&json!({ "source": reply_source() }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let id = draft["id"].as_str().unwrap().to_string();
        assert_eq!(draft["subject"], "Re: Meeting next week");
        assert_eq!(draft["tone"], "professional");
        assert!(draft.get("provider_draft_id").is_none());

        // Pending drafts cannot be sent, and approval is checked first.
        let resp = http
            .post(format!("{base}/{id}/send"))
            .json(&json!({}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["kind"], "approval_required");

        let edited: Value = http
            .post(format!("{base}/{id}/edit"))
            .json(&json!({ "body": "Tuesday at 10 works." }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(edited["body"], "Tuesday at 10 works.");

        let resp = http
            .post(format!("{base}/{id}/edit"))
            .json(&json!({ "body": "   " }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);

        let approved: Value = http
            .post(format!("{base}/{id}/approve"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(approved["status"], "approved");

        // Approved drafts can no longer be edited or rejected.
        let resp = http
            .post(format!("{base}/{id}/reject"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 409);

        // Approved flag present but no Gmail session.
        let resp = http
            .post(format!("{base}/{id}/send"))
            .json(&json!({ "approved": true }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 401);

        let listed: Value = http
            .get(format!("{base}?status=approved"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(listed["drafts"].as_array().unwrap().len(), 1);

        let audit: Value = http
            .get(format!("http://{addr}/api/audit"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let actions: Vec<&str> = audit["entries"]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["action"].as_str().unwrap())
            .collect();
        assert_eq!(actions, ["draft_approved", "draft_edited", "draft_created"]);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn missing_draft_is_not_found() {
    timeout(TEST_TIMEOUT, async {
        let addr = start_server(AppConfig::default()).await;
        let resp = client()
            .get(format!(
                "http://{addr}/api/drafts/00000000-0000-0000-0000-000000000000"
            ))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 404);
    })
    .await
    .expect("test timed out");
}

// ── Gmail ───────────────────────────────────────────────────────────

#[tokio::test]
async fn approved_draft_is_sent_through_gmail_once() {
    timeout(TEST_TIMEOUT, async {
        let mock = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/gmail/v1/users/me/drafts"))
            .and(header("authorization", "Bearer access-123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "gdraft-1",
                "message": {"id": "gmsg-1", "threadId": "thread-1"}
            })))
            .expect(1)
            .mount(&mock)
            .await;
        Mock::given(method("POST"))
            .and(path("/gmail/v1/users/me/messages/send"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "sent-1",
                "threadId": "thread-1"
            })))
            .expect(1)
            .mount(&mock)
            .await;

        let addr = start_server(google_config(&mock)).await;
        let http = client();

        let created: Value = http
            .post(format!("http://{addr}/api/gmail/draft"))
            .header("cookie", SESSION_COOKIE)
            .json(&json!({
                "originalEmail": {
                    "from": "Sarah Chen <sarah@techcorp.com>",
                    "subject": "Meeting next week",
                    "body": "Can we meet Tuesday?"
                },
                "tone": "concise",
                "threadId": "thread-1"
            }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let draft = &created["draft"];
        assert_eq!(draft["provider_draft_id"], "gdraft-1");
        assert_eq!(draft["tone"], "brief");
        let id = draft["id"].as_str().unwrap().to_string();

        http.post(format!("http://{addr}/api/drafts/{id}/approve"))
            .send()
            .await
            .unwrap();

        let sent: Value = http
            .post(format!("http://{addr}/api/drafts/{id}/send"))
            .header("cookie", SESSION_COOKIE)
            .json(&json!({ "approved": true }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(sent["status"], "sent");
        assert_eq!(sent["sent_message_id"], "sent-1");

        // A second send is a conflict and never reaches Gmail.
        let resp = http
            .post(format!("http://{addr}/api/drafts/{id}/send"))
            .header("cookie", SESSION_COOKIE)
            .json(&json!({ "approved": true }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 409);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn direct_send_requires_boolean_approval() {
    timeout(TEST_TIMEOUT, async {
        let mock = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/gmail/v1/users/me/messages/send"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "sent-9",
                "threadId": "t9"
            })))
            .expect(1)
            .mount(&mock)
            .await;

        let addr = start_server(google_config(&mock)).await;
        let http = client();
        let url = format!("http://{addr}/api/gmail/send");
        let message = json!({
            "to": "sarah@techcorp.com",
            "subject": "Hello",
            "content": "Hi Sarah"
        });

        for flag in [json!(null), json!(false), json!("true"), json!(1)] {
            let mut body = message.clone();
            body["approved"] = flag;
            let resp = http
                .post(&url)
                .header("cookie", SESSION_COOKIE)
                .json(&body)
                .send()
                .await
                .unwrap();
            assert_eq!(resp.status(), 400);
        }

        let mut body = message.clone();
        body["approved"] = json!(true);
        let sent: Value = http
            .post(&url)
            .header("cookie", SESSION_COOKIE)
            .json(&body)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(sent["success"], true);
        assert_eq!(sent["message_id"], "sent-9");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn expired_session_is_refreshed_for_inbox() {
    timeout(TEST_TIMEOUT, async {
        let mock = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "fresh-token",
                "expires_in": 3600
            })))
            .expect(1)
            .mount(&mock)
            .await;
        Mock::given(method("GET"))
            .and(path("/gmail/v1/users/me/messages"))
            .and(header("authorization", "Bearer fresh-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&mock)
            .await;

        let addr = start_server(google_config(&mock)).await;
        let resp = client()
            .get(format!("http://{addr}/api/gmail/emails"))
            .header("cookie", "gmail_refresh_token=refresh-1")
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);

        let cookies: Vec<String> = resp
            .headers()
            .get_all("set-cookie")
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect();
        assert!(
            cookies.iter().any(|c| c.starts_with("gmail_access_token=fresh-token")),
            "{cookies:?}"
        );

        let body: Value = resp.json().await.unwrap();
        assert!(body["emails"].as_array().unwrap().is_empty());
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn failed_refresh_requires_authentication() {
    timeout(TEST_TIMEOUT, async {
        let mock = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(
                ResponseTemplate::new(400).set_body_json(json!({ "error": "invalid_grant" })),
            )
            .expect(1)
            .mount(&mock)
            .await;

        let addr = start_server(google_config(&mock)).await;
        let resp = client()
            .get(format!("http://{addr}/api/gmail/emails"))
            .header("cookie", "gmail_refresh_token=dead")
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 401);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn oauth_callback_stores_session_and_connects_gmail() {
    timeout(TEST_TIMEOUT, async {
        let mock = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=authorization_code"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "access-new",
                "refresh_token": "refresh-new",
                "expires_in": 3600
            })))
            .mount(&mock)
            .await;
        Mock::given(method("GET"))
            .and(path("/gmail/v1/users/me/profile"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "emailAddress": "me@agentceo.dev",
                "messagesTotal": 42
            })))
            .mount(&mock)
            .await;

        let addr = start_server(google_config(&mock)).await;
        let http = client();

        let start = http
            .get(format!("http://{addr}/api/auth/google"))
            .send()
            .await
            .unwrap();
        assert!(start.status().is_redirection());
        let location = start.headers()["location"].to_str().unwrap();
        assert!(location.starts_with(&format!("{}/auth?", mock.uri())));
        assert!(location.contains("access_type=offline"));

        let resp = http
            .get(format!("http://{addr}/api/auth/callback/google?code=abc"))
            .send()
            .await
            .unwrap();
        assert!(resp.status().is_redirection());
        let location = resp.headers()["location"].to_str().unwrap();
        assert!(location.starts_with("/connections?success=gmail"));
        assert!(location.contains("me%40agentceo.dev"));
        let cookies: Vec<&str> = resp
            .headers()
            .get_all("set-cookie")
            .iter()
            .map(|v| v.to_str().unwrap())
            .collect();
        assert!(cookies.iter().any(|c| c.starts_with("gmail_refresh_token=refresh-new")));

        let connections: Value = http
            .get(format!("http://{addr}/api/connections"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let gmail = connections["connections"]
            .as_array()
            .unwrap()
            .iter()
            .find(|c| c["provider"] == "gmail")
            .unwrap()
            .clone();
        assert_eq!(gmail["status"], "connected");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn callback_error_redirects_with_reason() {
    timeout(TEST_TIMEOUT, async {
        let mock = MockServer::start().await;
        let addr = start_server(google_config(&mock)).await;

        let resp = client()
            .get(format!(
                "http://{addr}/api/auth/callback/google?error=access_denied"
            ))
            .send()
            .await
            .unwrap();
        assert!(resp.status().is_redirection());
        assert_eq!(
            resp.headers()["location"],
            "/connections?error=access_denied"
        );
    })
    .await
    .expect("test timed out");
}

// ── Observability ───────────────────────────────────────────────────

#[tokio::test]
async fn metrics_count_api_requests() {
    timeout(TEST_TIMEOUT, async {
        let addr = start_server(AppConfig::default()).await;
        let http = client();

        for _ in 0..2 {
            http.get(format!("http://{addr}/api/health"))
                .send()
                .await
                .unwrap();
        }
        http.post(format!("http://{addr}/api/triage"))
            .json(&json!({ "from": "a@b.com" }))
            .send()
            .await
            .unwrap();

        let metrics: Value = http
            .get(format!("http://{addr}/api/metrics"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let api = &metrics["summary"]["api"];
        assert_eq!(api["total_calls"], 3);
        let error_rate = api["error_rate"].as_f64().unwrap();
        assert!((error_rate - 100.0 / 3.0).abs() < 0.1, "{error_rate}");
    })
    .await
    .expect("test timed out");
}
