//! Configuration types.
//!
//! Everything is read from the environment once at startup. The choice between
//! real and mock backends happens here and nowhere else.

use std::path::PathBuf;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Which text-generation backend to use.
#[derive(Debug, Clone)]
pub enum GenerationBackend {
    /// Anthropic Messages API.
    Anthropic {
        api_key: SecretString,
        base_url: String,
        model: String,
    },
    /// Deterministic rule-based responses, no network.
    Mock,
}

impl GenerationBackend {
    pub fn is_mock(&self) -> bool {
        matches!(self, Self::Mock)
    }
}

/// Which telemetry backend receives logs and metrics.
#[derive(Debug, Clone)]
pub enum TelemetryBackend {
    /// Datadog HTTP intake.
    Datadog { api_key: SecretString, site: String },
    /// In-memory collector only.
    InMemory,
}

/// Telemetry settings.
#[derive(Debug, Clone)]
pub struct TelemetrySettings {
    pub backend: TelemetryBackend,
    /// Service tag attached to every log and metric.
    pub service: String,
    /// Environment tag attached to every log and metric.
    pub env: String,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            backend: TelemetryBackend::InMemory,
            service: "agentceo".to_string(),
            env: "development".to_string(),
        }
    }
}

/// Google OAuth + Gmail settings. Present only when all credentials are set.
#[derive(Debug, Clone)]
pub struct GoogleConfig {
    pub client_id: String,
    pub client_secret: SecretString,
    pub redirect_uri: String,
    pub auth_url: String,
    pub token_url: String,
    pub gmail_api_base: String,
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// HTTP listen port.
    pub port: u16,
    pub generation: GenerationBackend,
    pub telemetry: TelemetrySettings,
    pub google: Option<GoogleConfig>,
    /// Whether session cookies carry the `Secure` attribute.
    pub cookie_secure: bool,
    /// Directory for the rolling log file, if any.
    pub log_dir: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            generation: GenerationBackend::Mock,
            telemetry: TelemetrySettings::default(),
            google: None,
            cookie_secure: false,
            log_dir: None,
        }
    }
}

pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
pub const DEFAULT_ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";
pub const DEFAULT_GMAIL_API_BASE: &str = "https://gmail.googleapis.com";
pub const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

impl AppConfig {
    /// Build config from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port = match get("AGENTCEO_PORT") {
            Some(raw) => raw.parse::<u16>().map_err(|e| ConfigError::InvalidValue {
                key: "AGENTCEO_PORT".into(),
                message: format!("{e}"),
            })?,
            None => 3000,
        };

        let use_mock_llm = parse_flag(get("USE_MOCK_LLM"));
        let generation = match get("ANTHROPIC_API_KEY") {
            Some(key) if !use_mock_llm => GenerationBackend::Anthropic {
                api_key: SecretString::from(key),
                base_url: get("ANTHROPIC_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_ANTHROPIC_BASE_URL.to_string()),
                model: get("AGENTCEO_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            },
            _ => GenerationBackend::Mock,
        };

        let use_mock_telemetry = parse_flag(get("USE_MOCK_DATADOG"));
        let backend = match get("DD_API_KEY") {
            Some(key) if !use_mock_telemetry => TelemetryBackend::Datadog {
                api_key: SecretString::from(key),
                site: get("DD_SITE").unwrap_or_else(|| "datadoghq.com".to_string()),
            },
            _ => TelemetryBackend::InMemory,
        };
        let telemetry = TelemetrySettings {
            backend,
            service: get("DD_SERVICE").unwrap_or_else(|| "agentceo".to_string()),
            env: get("DD_ENV").unwrap_or_else(|| "development".to_string()),
        };

        let google = match (
            get("GOOGLE_CLIENT_ID"),
            get("GOOGLE_CLIENT_SECRET"),
            get("GOOGLE_REDIRECT_URI"),
        ) {
            (Some(client_id), Some(secret), Some(redirect_uri)) => Some(GoogleConfig {
                client_id,
                client_secret: SecretString::from(secret),
                redirect_uri,
                auth_url: GOOGLE_AUTH_URL.to_string(),
                token_url: GOOGLE_TOKEN_URL.to_string(),
                gmail_api_base: get("GMAIL_API_BASE")
                    .unwrap_or_else(|| DEFAULT_GMAIL_API_BASE.to_string()),
            }),
            _ => None,
        };

        Ok(Self {
            port,
            generation,
            telemetry,
            google,
            cookie_secure: parse_flag(get("AGENTCEO_COOKIE_SECURE")),
            log_dir: get("AGENTCEO_LOG_DIR").map(PathBuf::from),
        })
    }
}

fn parse_flag(value: Option<String>) -> bool {
    value
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(false)
}
