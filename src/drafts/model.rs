//! Draft data model: reply drafts, lifecycle states, and event stream messages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::triage::TriageInput;

/// Voice of a generated reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    Professional,
    Friendly,
    /// Short and direct. Accepts `"concise"` on input.
    #[serde(alias = "concise")]
    Brief,
}

impl Default for Tone {
    fn default() -> Self {
        Self::Professional
    }
}

impl std::fmt::Display for Tone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Professional => write!(f, "professional"),
            Self::Friendly => write!(f, "friendly"),
            Self::Brief => write!(f, "brief"),
        }
    }
}

impl std::str::FromStr for Tone {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "professional" => Ok(Self::Professional),
            "friendly" => Ok(Self::Friendly),
            "brief" | "concise" => Ok(Self::Brief),
            _ => Err(format!("Unknown tone: {}", s)),
        }
    }
}

/// Lifecycle state of a draft.
///
/// `pending → approved → sent` and `pending → rejected`. `sent` and
/// `rejected` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DraftStatus {
    /// Waiting for the user.
    Pending,
    /// Approved; awaiting send confirmation.
    Approved,
    /// Discarded by the user.
    Rejected,
    /// Delivered through the provider.
    Sent,
}

impl DraftStatus {
    /// Whether a draft in this state may move to `next`.
    pub fn can_transition_to(self, next: DraftStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Approved)
                | (Self::Pending, Self::Rejected)
                | (Self::Approved, Self::Sent)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Sent | Self::Rejected)
    }
}

impl std::fmt::Display for DraftStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Approved => write!(f, "approved"),
            Self::Rejected => write!(f, "rejected"),
            Self::Sent => write!(f, "sent"),
        }
    }
}

/// The inbound item a draft replies to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplySource {
    /// Identifier of the source item (feed item or provider message id).
    pub source_id: String,
    /// Original sender; becomes the reply recipient.
    pub from: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub body: String,
    /// Provider thread to reply into.
    #[serde(default)]
    pub thread_id: Option<String>,
}

impl ReplySource {
    /// The fields the generator sees.
    pub fn as_triage_input(&self) -> TriageInput {
        TriageInput::new(&self.from, &self.subject, &self.body)
    }

    /// Subject line for the reply (`Re: ` prefixed once).
    pub fn reply_subject(&self) -> String {
        let subject = self.subject.trim();
        if subject.is_empty() {
            "Re:".to_string()
        } else if subject.to_ascii_lowercase().starts_with("re:") {
            subject.to_string()
        } else {
            format!("Re: {subject}")
        }
    }
}

/// A proposed outbound reply awaiting approval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Draft {
    pub id: Uuid,
    /// Identifier of the item being replied to.
    pub source_id: String,
    pub recipient: String,
    pub subject: String,
    pub body: String,
    pub tone: Tone,
    pub status: DraftStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    /// Draft id in the provider's mailbox, when mirrored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_draft_id: Option<String>,
    /// Provider message id, set once the draft is sent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sent_message_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Draft {
    /// Create a new pending draft replying to `source`.
    pub fn new(source: &ReplySource, body: impl Into<String>, tone: Tone) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            source_id: source.source_id.clone(),
            recipient: source.from.clone(),
            subject: source.reply_subject(),
            body: body.into(),
            tone,
            status: DraftStatus::Pending,
            thread_id: source.thread_id.clone(),
            provider_draft_id: None,
            sent_message_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Record the mirrored provider draft id.
    pub fn with_provider_draft_id(mut self, id: impl Into<String>) -> Self {
        self.provider_draft_id = Some(id.into());
        self
    }
}

/// Messages streamed to `/ws` subscribers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DraftEvent {
    /// Full draft list (sent on connect and after lag).
    DraftsSync { drafts: Vec<Draft> },
    /// A new draft was created.
    DraftCreated { draft: Draft },
    /// A draft's body or status changed.
    DraftUpdated { draft: Draft },
}
