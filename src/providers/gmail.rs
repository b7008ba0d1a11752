//! Gmail REST client.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use lettre::Message;
use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, info};

use super::{MailProfile, MailProvider, OutboundMessage, ProviderDraft, RawEmail, SentMessage};
use crate::error::ProviderError;
use crate::session::ProviderSession;

const PROVIDER: &str = "gmail";

/// Inbox query used for the feed.
const INBOX_QUERY: &str = "in:inbox is:unread";

/// Body text kept per message.
const MAX_BODY_CHARS: usize = 1000;

// ── Wire types ──────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct MessageList {
    #[serde(default)]
    messages: Vec<MessageRef>,
}

#[derive(Debug, Deserialize)]
struct MessageRef {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GmailMessage {
    id: String,
    #[serde(default)]
    thread_id: String,
    #[serde(default)]
    label_ids: Vec<String>,
    #[serde(default)]
    snippet: String,
    /// Milliseconds since the epoch, as a string.
    #[serde(default)]
    internal_date: Option<String>,
    #[serde(default)]
    payload: Option<MessagePart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessagePart {
    #[serde(default)]
    mime_type: String,
    #[serde(default)]
    headers: Vec<Header>,
    #[serde(default)]
    body: Option<PartBody>,
    #[serde(default)]
    parts: Vec<MessagePart>,
}

#[derive(Debug, Deserialize)]
struct Header {
    name: String,
    value: String,
}

#[derive(Debug, Deserialize)]
struct PartBody {
    #[serde(default)]
    data: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendResponse {
    id: String,
    #[serde(default)]
    thread_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DraftResponse {
    id: String,
    #[serde(default)]
    message: Option<SendResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProfileResponse {
    email_address: String,
    #[serde(default)]
    messages_total: Option<u64>,
}

impl MessagePart {
    fn header(&self, name: &str) -> String {
        self.headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.clone())
            .unwrap_or_default()
    }

    /// First `text/plain` body, searching nested parts depth-first.
    fn plain_text(&self) -> Option<String> {
        if self.mime_type == "text/plain" {
            return self
                .body
                .as_ref()
                .and_then(|b| b.data.as_deref())
                .and_then(decode_body);
        }
        self.parts.iter().find_map(MessagePart::plain_text)
    }
}

fn decode_body(data: &str) -> Option<String> {
    let bytes = URL_SAFE_NO_PAD.decode(data.trim_end_matches('=')).ok()?;
    Some(String::from_utf8_lossy(&bytes).into_owned())
}

impl GmailMessage {
    fn into_raw(self) -> RawEmail {
        let (from, to, subject, date, body) = match &self.payload {
            Some(p) => (
                p.header("From"),
                p.header("To"),
                p.header("Subject"),
                p.header("Date"),
                p.plain_text().unwrap_or_default(),
            ),
            None => Default::default(),
        };
        let received_at = self
            .internal_date
            .as_deref()
            .and_then(|ms| ms.parse::<i64>().ok())
            .and_then(DateTime::<Utc>::from_timestamp_millis);

        RawEmail {
            id: self.id,
            thread_id: self.thread_id,
            from,
            to,
            subject,
            date,
            snippet: self.snippet,
            body: body.chars().take(MAX_BODY_CHARS).collect(),
            labels: self.label_ids,
            received_at,
        }
    }
}

// ── Client ──────────────────────────────────────────────────────────

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

fn http_client(timeout: Duration) -> Client {
    Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|_| Client::new())
}

/// Gmail v1 API client acting on behalf of the session's user.
pub struct GmailClient {
    client: Client,
    base_url: String,
}

impl GmailClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: http_client(DEFAULT_TIMEOUT),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = http_client(timeout);
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}/gmail/v1/users/me/{}", self.base_url, path)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        session: &ProviderSession,
    ) -> Result<T, ProviderError> {
        let response = request.bearer_auth(session.access_token()).send().await?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED {
            return Err(ProviderError::NotAuthenticated {
                provider: PROVIDER.to_string(),
            });
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ProviderError::RequestFailed {
                provider: PROVIDER.to_string(),
                reason: format!("HTTP {status}: {text}"),
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ProviderError::InvalidResponse {
                provider: PROVIDER.to_string(),
                reason: e.to_string(),
            })
    }

    async fn get_message(
        &self,
        session: &ProviderSession,
        id: &str,
    ) -> Result<RawEmail, ProviderError> {
        let request = self
            .client
            .get(self.url(&format!("messages/{id}")))
            .query(&[("format", "full")]);
        let message: GmailMessage = self.call(request, session).await?;
        Ok(message.into_raw())
    }

    /// Sender mailbox: the session's account, or the profile address.
    async fn sender(&self, session: &ProviderSession) -> Result<String, ProviderError> {
        match session.account() {
            Some(account) => Ok(account.to_string()),
            None => Ok(self.profile(session).await?.email_address),
        }
    }

    /// RFC 5322 message, base64url-encoded for the `raw` field.
    fn encode_raw(from: &str, message: &OutboundMessage) -> Result<String, ProviderError> {
        let from: Mailbox = from
            .parse()
            .map_err(|e| invalid_message("from address", e))?;
        let to: Mailbox = message
            .to
            .parse()
            .map_err(|e| invalid_message("recipient", e))?;

        let email = Message::builder()
            .from(from)
            .to(to)
            .subject(message.subject.as_str())
            .header(ContentType::TEXT_PLAIN)
            .body(message.body.clone())
            .map_err(|e| invalid_message("message", e))?;

        Ok(URL_SAFE_NO_PAD.encode(email.formatted()))
    }
}

fn invalid_message(what: &str, err: impl std::fmt::Display) -> ProviderError {
    ProviderError::InvalidMessage(format!("Invalid {what}: {err}"))
}

#[async_trait]
impl MailProvider for GmailClient {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn fetch_inbox(
        &self,
        session: &ProviderSession,
        max_results: u32,
    ) -> Result<Vec<RawEmail>, ProviderError> {
        let request = self.client.get(self.url("messages")).query(&[
            ("maxResults", max_results.to_string()),
            ("q", INBOX_QUERY.to_string()),
        ]);
        let list: MessageList = self.call(request, session).await?;
        debug!(count = list.messages.len(), "Gmail inbox listed");

        try_join_all(
            list.messages
                .iter()
                .map(|m| self.get_message(session, &m.id)),
        )
        .await
    }

    async fn send_message(
        &self,
        session: &ProviderSession,
        message: &OutboundMessage,
    ) -> Result<SentMessage, ProviderError> {
        message.validate()?;
        let from = self.sender(session).await?;
        let raw = Self::encode_raw(&from, message)?;

        let mut body = json!({ "raw": raw });
        if let Some(thread_id) = &message.thread_id {
            body["threadId"] = json!(thread_id);
        }

        let request = self.client.post(self.url("messages/send")).json(&body);
        let sent: SendResponse = self.call(request, session).await?;
        info!(message_id = %sent.id, "Gmail message sent");

        Ok(SentMessage {
            id: sent.id,
            thread_id: sent.thread_id,
        })
    }

    async fn create_draft(
        &self,
        session: &ProviderSession,
        message: &OutboundMessage,
    ) -> Result<ProviderDraft, ProviderError> {
        message.validate()?;
        let from = self.sender(session).await?;
        let raw = Self::encode_raw(&from, message)?;

        let mut inner = json!({ "raw": raw });
        if let Some(thread_id) = &message.thread_id {
            inner["threadId"] = json!(thread_id);
        }

        let request = self
            .client
            .post(self.url("drafts"))
            .json(&json!({ "message": inner }));
        let draft: DraftResponse = self.call(request, session).await?;
        info!(draft_id = %draft.id, "Gmail draft created");

        Ok(ProviderDraft {
            id: draft.id,
            message_id: draft.message.map(|m| m.id),
        })
    }

    async fn profile(&self, session: &ProviderSession) -> Result<MailProfile, ProviderError> {
        let request = self.client.get(self.url("profile"));
        let profile: ProfileResponse = self.call(request, session).await?;
        Ok(MailProfile {
            email_address: profile.email_address,
            messages_total: profile.messages_total,
        })
    }
}
