//! OAuth start/callback and per-request session resolution.

use axum::extract::{Query, State};
use axum::response::{IntoResponse, Redirect, Response};
use axum_extra::extract::cookie::CookieJar;
use reqwest::Url;
use serde::Deserialize;
use tracing::{info, warn};

use super::AppState;
use crate::error::{ApiError, ProviderError};
use crate::feed::Provider;
use crate::session::{ProviderSession, StoredSession, store_tokens};

/// Dashboard page the OAuth flow returns to.
const CONNECTIONS_PAGE: &str = "/connections";

fn not_configured() -> ApiError {
    ProviderError::NotConfigured {
        provider: "gmail".to_string(),
    }
    .into()
}

/// Resolve the caller's Gmail session from cookies.
///
/// An expired access token is refreshed once through the OAuth client and
/// the new token is set on the returned jar. A failed refresh is
/// `AuthenticationRequired`, never retried.
pub async fn resolve_session(
    state: &AppState,
    jar: CookieJar,
) -> Result<(Option<ProviderSession>, CookieJar), ApiError> {
    match StoredSession::from_jar(&jar) {
        StoredSession::Active(session) => Ok((Some(session), jar)),
        StoredSession::Missing => Ok((None, jar)),
        StoredSession::Expired {
            refresh_token,
            account,
        } => {
            let oauth = state.oauth.as_ref().ok_or_else(not_configured)?;
            let tokens = oauth.refresh(&refresh_token).await.map_err(|e| {
                ApiError::AuthenticationRequired(format!("Gmail session expired: {e}"))
            })?;

            let jar = store_tokens(
                jar,
                &tokens.access_token,
                tokens.refresh_token.as_deref(),
                None,
                state.config.cookie_secure,
            );
            let mut session = ProviderSession::new(tokens.access_token)
                .with_refresh_token(match tokens.refresh_token {
                    Some(rotated) => rotated.into(),
                    None => refresh_token,
                });
            if let Some(account) = account {
                session = session.with_account(account);
            }
            info!("Gmail session refreshed");
            Ok((Some(session), jar))
        }
    }
}

/// Like [`resolve_session`], but a missing session is an error.
pub async fn require_session(
    state: &AppState,
    jar: CookieJar,
) -> Result<(ProviderSession, CookieJar), ApiError> {
    match resolve_session(state, jar).await? {
        (Some(session), jar) => Ok((session, jar)),
        (None, _) => Err(ApiError::AuthenticationRequired(
            "Not authenticated with Gmail".to_string(),
        )),
    }
}

/// Optional session for endpoints that work without one. A refresh
/// failure degrades to "no session".
pub async fn optional_session(state: &AppState, jar: CookieJar) -> (Option<ProviderSession>, CookieJar) {
    let fallback = jar.clone();
    match resolve_session(state, jar).await {
        Ok(resolved) => resolved,
        Err(e) => {
            warn!(error = %e, "Session refresh failed, continuing without Gmail");
            (None, fallback)
        }
    }
}

fn connections_redirect(params: &[(&str, &str)]) -> Redirect {
    let target = Url::parse_with_params(&format!("http://localhost{CONNECTIONS_PAGE}"), params)
        .ok()
        .and_then(|url| url.query().map(|q| format!("{CONNECTIONS_PAGE}?{q}")))
        .unwrap_or_else(|| CONNECTIONS_PAGE.to_string());
    Redirect::to(&target)
}

// ── Handlers ────────────────────────────────────────────────────────

/// `GET /api/auth/google`: redirect to the consent screen.
pub async fn start(State(state): State<AppState>) -> Result<Redirect, ApiError> {
    let oauth = state.oauth.as_ref().ok_or_else(not_configured)?;
    let url = oauth.auth_url()?;
    info!("Starting Google OAuth");
    Ok(Redirect::to(&url))
}

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    code: Option<String>,
    error: Option<String>,
}

/// `GET /api/auth/callback/google`: exchange the code, store tokens, and
/// return to the connections page.
pub async fn callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
    jar: CookieJar,
) -> Response {
    if let Some(error) = params.error {
        warn!(error = %error, "OAuth consent denied");
        return connections_redirect(&[("error", error.as_str())]).into_response();
    }
    let Some(code) = params.code else {
        return connections_redirect(&[("error", "missing_code")]).into_response();
    };
    let Some(oauth) = state.oauth.as_ref() else {
        return connections_redirect(&[("error", "not_configured")]).into_response();
    };

    let tokens = match oauth.exchange_code(&code).await {
        Ok(tokens) => tokens,
        Err(e) => {
            warn!(error = %e, "OAuth code exchange failed");
            return connections_redirect(&[("error", "token_exchange_failed")]).into_response();
        }
    };

    let session = ProviderSession::new(tokens.access_token.clone());
    let account = match &state.mail {
        Some(mail) => match mail.profile(&session).await {
            Ok(profile) => Some(profile.email_address),
            Err(e) => {
                warn!(error = %e, "Could not read Gmail profile");
                None
            }
        },
        None => None,
    };

    let jar = store_tokens(
        jar,
        &tokens.access_token,
        tokens.refresh_token.as_deref(),
        account.as_deref(),
        state.config.cookie_secure,
    );
    state
        .connections
        .mark_authenticated(Provider::Gmail, account.clone())
        .await;
    info!(account = ?account, "Gmail connected");

    let email = account.unwrap_or_default();
    (
        jar,
        connections_redirect(&[("success", "gmail"), ("email", email.as_str())]),
    )
        .into_response()
}
