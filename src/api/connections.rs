//! Connection endpoints.

use axum::Json;
use axum::extract::{Path, State};
use axum_extra::extract::cookie::CookieJar;
use serde_json::{Value, json};
use tracing::info;

use super::AppState;
use super::auth::resolve_session;
use crate::error::{ApiError, ProviderError};
use crate::feed::Provider;
use crate::providers::ConnectionAction;
use crate::session::clear_tokens;

/// Where the browser goes to start the Gmail OAuth flow.
const GMAIL_AUTH_START: &str = "/api/auth/google";

/// `GET /api/connections`
pub async fn list(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "connections": state.connections.list().await }))
}

/// `POST /api/connections/{provider}/{connect|disconnect|test}`
pub async fn action(
    State(state): State<AppState>,
    Path((provider, action)): Path<(String, String)>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<Value>), ApiError> {
    let provider: Provider = provider.parse().map_err(ApiError::Validation)?;
    let action: ConnectionAction = action.parse().map_err(ApiError::Validation)?;
    info!(provider = %provider, action = ?action, "Connection action");

    match (action, provider) {
        // Gmail connects only through the OAuth callback.
        (ConnectionAction::Connect, Provider::Gmail) => {
            if state.oauth.is_none() {
                return Err(ProviderError::NotConfigured {
                    provider: "gmail".to_string(),
                }
                .into());
            }
            let connection = state.connections.get(provider).await;
            Ok((
                jar,
                Json(json!({ "connection": connection, "redirect": GMAIL_AUTH_START })),
            ))
        }
        (ConnectionAction::Connect, _) => {
            let connection = state.connections.connect_fixture(provider).await;
            Ok((jar, Json(json!({ "connection": connection }))))
        }
        (ConnectionAction::Disconnect, _) => {
            let jar = if provider == Provider::Gmail {
                clear_tokens(jar)
            } else {
                jar
            };
            let connection = state.connections.disconnect(provider).await;
            Ok((jar, Json(json!({ "connection": connection }))))
        }
        (ConnectionAction::Test, Provider::Gmail) => {
            let (outcome, jar) = match resolve_session(&state, jar.clone()).await {
                Ok((Some(session), jar)) => {
                    let outcome = match &state.mail {
                        Some(mail) => mail
                            .profile(&session)
                            .await
                            .map(|p| Some(p.email_address))
                            .map_err(|e| e.to_string()),
                        None => Err("Gmail is not configured".to_string()),
                    };
                    (outcome, jar)
                }
                Ok((None, jar)) => (Err("Not authenticated with Gmail".to_string()), jar),
                Err(e) => (Err(e.to_string()), jar),
            };
            let connection = state.connections.record_test(provider, outcome).await;
            Ok((jar, Json(json!({ "connection": connection }))))
        }
        (ConnectionAction::Test, _) => {
            let connection = state.connections.record_test(provider, Ok(None)).await;
            Ok((jar, Json(json!({ "connection": connection }))))
        }
    }
}
