//! Error types for AgentCEO.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use uuid::Uuid;

/// Top-level error type for the service.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Draft error: {0}")]
    Draft(#[from] DraftError),

    #[error("Fixture error: {0}")]
    Fixture(#[from] serde_json::Error),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Text-generation backend errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Provider {provider} rate limited")]
    RateLimited { provider: String },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors from external account providers (mail, OAuth, telemetry intake).
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("Not authenticated with {provider}")]
    NotAuthenticated { provider: String },

    #[error("{provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Invalid outbound message: {0}")]
    InvalidMessage(String),

    #[error("{provider} is not configured")]
    NotConfigured { provider: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Draft workflow errors.
#[derive(Debug, thiserror::Error)]
pub enum DraftError {
    #[error("Draft {id} not found")]
    NotFound { id: Uuid },

    #[error("Draft {id} is {state}, cannot transition to {target}")]
    InvalidTransition {
        id: Uuid,
        state: String,
        target: String,
    },

    #[error("Draft {id} is already being sent")]
    SendInProgress { id: Uuid },

    #[error("Message must be explicitly approved before sending")]
    ApprovalRequired,

    #[error("Draft body must not be empty")]
    EmptyBody,

    #[error("Draft generation failed: {0}")]
    Generation(#[from] LlmError),

    #[error("Provider call failed: {0}")]
    Provider(#[from] ProviderError),
}

/// Errors surfaced to HTTP callers.
///
/// `AuthenticationRequired` and `Validation` are never retried by the server.
/// `ApprovalRequired` is a hard failure that no configuration can bypass.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    AuthenticationRequired(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    UpstreamFailure(String),

    #[error("{0}")]
    ApprovalRequired(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    NotConfigured(String),
}

impl ApiError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::AuthenticationRequired(_) => StatusCode::UNAUTHORIZED,
            Self::Validation(_) | Self::ApprovalRequired(_) => StatusCode::BAD_REQUEST,
            Self::UpstreamFailure(_) => StatusCode::BAD_GATEWAY,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::NotConfigured(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Stable machine-readable kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AuthenticationRequired(_) => "authentication_required",
            Self::Validation(_) => "validation_error",
            Self::UpstreamFailure(_) => "upstream_failure",
            Self::ApprovalRequired(_) => "approval_required",
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::NotConfigured(_) => "not_configured",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": self.to_string(),
            "kind": self.kind(),
        });
        (self.status(), Json(body)).into_response()
    }
}

impl From<ProviderError> for ApiError {
    fn from(e: ProviderError) -> Self {
        match e {
            ProviderError::NotAuthenticated { provider } => {
                Self::AuthenticationRequired(format!("Not authenticated with {provider}"))
            }
            ProviderError::NotConfigured { provider } => {
                Self::NotConfigured(format!("{provider} is not configured"))
            }
            ProviderError::InvalidMessage(m) => Self::Validation(m),
            other => Self::UpstreamFailure(other.to_string()),
        }
    }
}

impl From<LlmError> for ApiError {
    fn from(e: LlmError) -> Self {
        Self::UpstreamFailure(e.to_string())
    }
}

impl From<DraftError> for ApiError {
    fn from(e: DraftError) -> Self {
        match e {
            DraftError::NotFound { .. } => Self::NotFound(e.to_string()),
            DraftError::InvalidTransition { .. } | DraftError::SendInProgress { .. } => {
                Self::Conflict(e.to_string())
            }
            DraftError::ApprovalRequired => Self::ApprovalRequired(e.to_string()),
            DraftError::EmptyBody => Self::Validation(e.to_string()),
            DraftError::Generation(inner) => inner.into(),
            DraftError::Provider(inner) => inner.into(),
        }
    }
}

/// Result type alias for the service.
pub type Result<T> = std::result::Result<T, Error>;
