//! Explicit provider sessions.
//!
//! Handlers read OAuth tokens from cookies once, build a [`ProviderSession`],
//! and pass it to every provider and workflow call. Nothing below the HTTP
//! layer reads cookies.

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use secrecy::{ExposeSecret, SecretString};

use crate::error::ProviderError;

pub const ACCESS_COOKIE: &str = "gmail_access_token";
pub const REFRESH_COOKIE: &str = "gmail_refresh_token";
pub const ACCOUNT_COOKIE: &str = "gmail_account";

/// Access token lifetime (1 hour).
const ACCESS_MAX_AGE_SECS: i64 = 60 * 60;
/// Refresh token lifetime (30 days).
const REFRESH_MAX_AGE_SECS: i64 = 60 * 60 * 24 * 30;

/// Authenticated caller context for a mail provider.
#[derive(Debug, Clone)]
pub struct ProviderSession {
    access_token: SecretString,
    refresh_token: Option<SecretString>,
    /// Mailbox address, when known.
    account: Option<String>,
}

impl ProviderSession {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: SecretString::from(access_token.into()),
            refresh_token: None,
            account: None,
        }
    }

    pub fn with_refresh_token(mut self, token: SecretString) -> Self {
        self.refresh_token = Some(token);
        self
    }

    pub fn with_account(mut self, account: impl Into<String>) -> Self {
        self.account = Some(account.into());
        self
    }

    pub fn access_token(&self) -> &str {
        self.access_token.expose_secret()
    }

    pub fn refresh_token(&self) -> Option<&SecretString> {
        self.refresh_token.as_ref()
    }

    pub fn account(&self) -> Option<&str> {
        self.account.as_deref()
    }
}

/// What the cookie jar holds for the Gmail session.
#[derive(Debug)]
pub enum StoredSession {
    /// A live access token.
    Active(ProviderSession),
    /// Access token expired, refresh token still present.
    Expired {
        refresh_token: SecretString,
        account: Option<String>,
    },
    /// Nothing stored.
    Missing,
}

impl StoredSession {
    pub fn from_jar(jar: &CookieJar) -> Self {
        let value = |name: &str| {
            jar.get(name)
                .map(|c| c.value().to_string())
                .filter(|v| !v.is_empty())
        };
        let account = value(ACCOUNT_COOKIE);
        let refresh = value(REFRESH_COOKIE).map(SecretString::from);

        match (value(ACCESS_COOKIE), refresh) {
            (Some(access), refresh) => {
                let mut session = ProviderSession::new(access);
                if let Some(token) = refresh {
                    session = session.with_refresh_token(token);
                }
                if let Some(account) = account {
                    session = session.with_account(account);
                }
                Self::Active(session)
            }
            (None, Some(refresh_token)) => Self::Expired {
                refresh_token,
                account,
            },
            (None, None) => Self::Missing,
        }
    }

    /// Whether the caller has any Gmail credentials.
    pub fn is_present(&self) -> bool {
        !matches!(self, Self::Missing)
    }

    /// The live session, or `NotAuthenticated`.
    pub fn require_active(self) -> Result<ProviderSession, ProviderError> {
        match self {
            Self::Active(session) => Ok(session),
            _ => Err(ProviderError::NotAuthenticated {
                provider: "gmail".to_string(),
            }),
        }
    }
}

fn session_cookie(name: &'static str, value: String, max_age_secs: i64, secure: bool) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(time::Duration::seconds(max_age_secs))
        .build()
}

/// Store freshly issued tokens on the jar.
pub fn store_tokens(
    jar: CookieJar,
    access_token: &str,
    refresh_token: Option<&str>,
    account: Option<&str>,
    secure: bool,
) -> CookieJar {
    let mut jar = jar.add(session_cookie(
        ACCESS_COOKIE,
        access_token.to_string(),
        ACCESS_MAX_AGE_SECS,
        secure,
    ));
    if let Some(refresh) = refresh_token {
        jar = jar.add(session_cookie(
            REFRESH_COOKIE,
            refresh.to_string(),
            REFRESH_MAX_AGE_SECS,
            secure,
        ));
    }
    if let Some(account) = account {
        jar = jar.add(session_cookie(
            ACCOUNT_COOKIE,
            account.to_string(),
            REFRESH_MAX_AGE_SECS,
            secure,
        ));
    }
    jar
}

/// Remove every session cookie.
pub fn clear_tokens(jar: CookieJar) -> CookieJar {
    [ACCESS_COOKIE, REFRESH_COOKIE, ACCOUNT_COOKIE]
        .into_iter()
        .fold(jar, |jar, name| jar.remove(Cookie::build(name).path("/")))
}
