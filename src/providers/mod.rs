//! Provider adapters: mail access, OAuth, and the connection registry.

pub mod connections;
pub mod gmail;
pub mod oauth;

pub use connections::{Connection, ConnectionAction, ConnectionRegistry, ConnectionStatus};
pub use gmail::GmailClient;
pub use oauth::{GoogleOAuth, TokenSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::feed::model::{EmailDetails, ItemKind};
use crate::session::ProviderSession;

/// An inbox message as fetched from the provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawEmail {
    pub id: String,
    pub thread_id: String,
    /// Raw `From` header (`Name <addr>` or bare address).
    pub from: String,
    pub to: String,
    pub subject: String,
    pub date: String,
    pub snippet: String,
    /// Plain-text body, truncated.
    pub body: String,
    pub labels: Vec<String>,
    pub received_at: Option<DateTime<Utc>>,
}

impl RawEmail {
    /// Split the `From` header into display name and address.
    pub fn sender_parts(&self) -> (String, String) {
        let from = self.from.trim();
        match (from.find('<'), from.rfind('>')) {
            (Some(start), Some(end)) if end > start => {
                let name = from[..start].trim().trim_matches('"').to_string();
                let address = from[start + 1..end].trim().to_string();
                (name, address)
            }
            _ => (String::new(), from.to_string()),
        }
    }

    /// When the message arrived: internal date, then `Date` header, then `now`.
    pub fn timestamp(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.received_at
            .or_else(|| {
                DateTime::parse_from_rfc2822(self.date.trim())
                    .ok()
                    .map(|d| d.with_timezone(&Utc))
            })
            .unwrap_or(now)
    }

    pub fn into_kind(self) -> ItemKind {
        let (from_name, from) = self.sender_parts();
        let is_read = !self.labels.iter().any(|l| l == "UNREAD");
        let to = self
            .to
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        ItemKind::Email(EmailDetails {
            from,
            from_name,
            to,
            subject: self.subject,
            snippet: self.snippet,
            body: self.body,
            thread_id: self.thread_id,
            is_read,
            labels: self.labels,
        })
    }
}

/// A message to send or save as a draft.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
    #[serde(default)]
    pub thread_id: Option<String>,
}

impl OutboundMessage {
    /// Reject messages with a blank recipient, subject, or body.
    pub fn validate(&self) -> Result<(), ProviderError> {
        let mut missing = Vec::new();
        if self.to.trim().is_empty() {
            missing.push("to");
        }
        if self.subject.trim().is_empty() {
            missing.push("subject");
        }
        if self.body.trim().is_empty() {
            missing.push("content");
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ProviderError::InvalidMessage(format!(
                "Missing required fields: {}",
                missing.join(", ")
            )))
        }
    }
}

/// Provider response to a send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentMessage {
    pub id: String,
    pub thread_id: Option<String>,
}

/// A draft stored in the provider's mailbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderDraft {
    pub id: String,
    pub message_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailProfile {
    pub email_address: String,
    pub messages_total: Option<u64>,
}

/// Mail provider operations. Every call carries the caller's session.
#[async_trait]
pub trait MailProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Unread inbox messages, newest first.
    async fn fetch_inbox(
        &self,
        session: &ProviderSession,
        max_results: u32,
    ) -> Result<Vec<RawEmail>, ProviderError>;

    async fn send_message(
        &self,
        session: &ProviderSession,
        message: &OutboundMessage,
    ) -> Result<SentMessage, ProviderError>;

    async fn create_draft(
        &self,
        session: &ProviderSession,
        message: &OutboundMessage,
    ) -> Result<ProviderDraft, ProviderError>;

    async fn profile(&self, session: &ProviderSession) -> Result<MailProfile, ProviderError>;
}
