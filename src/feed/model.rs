//! Feed data model: the unified item type across all providers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::triage::{scoring, Classification, TriageInput};

pub use crate::triage::Urgency;

/// External account/service that items come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Gmail,
    Gcal,
    Slack,
    Youtube,
}

impl Provider {
    pub const ALL: [Provider; 4] = [Self::Gmail, Self::Gcal, Self::Slack, Self::Youtube];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gmail => "gmail",
            Self::Gcal => "gcal",
            Self::Slack => "slack",
            Self::Youtube => "youtube",
        }
    }

    /// Display name.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Gmail => "Gmail",
            Self::Gcal => "Google Calendar",
            Self::Slack => "Slack",
            Self::Youtube => "YouTube",
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Provider {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gmail" => Ok(Self::Gmail),
            "gcal" => Ok(Self::Gcal),
            "slack" => Ok(Self::Slack),
            "youtube" => Ok(Self::Youtube),
            _ => Err(format!("Unknown provider: {}", s)),
        }
    }
}

// ── Variant details ─────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailDetails {
    /// Sender address.
    pub from: String,
    #[serde(default)]
    pub from_name: String,
    #[serde(default)]
    pub to: Vec<String>,
    pub subject: String,
    #[serde(default)]
    pub snippet: String,
    /// Plain-text body, truncated.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub body: String,
    #[serde(default)]
    pub thread_id: String,
    #[serde(default)]
    pub is_read: bool,
    #[serde(default)]
    pub labels: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatDetails {
    pub channel: String,
    pub from: String,
    #[serde(default)]
    pub avatar: String,
    pub content: String,
    #[serde(default)]
    pub thread_count: u32,
    #[serde(default)]
    pub reactions: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoCategory {
    Learning,
    Entertainment,
    News,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoDetails {
    pub title: String,
    pub channel_name: String,
    #[serde(default)]
    pub thumbnail: String,
    pub duration: String,
    #[serde(default)]
    pub views: String,
    pub published_at: DateTime<Utc>,
    pub category: VideoCategory,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attendee {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventDetails {
    pub title: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub attendees: Vec<Attendee>,
    #[serde(default)]
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meeting_link: Option<String>,
    #[serde(default)]
    pub description: String,
}

/// Provider-specific payload of a feed item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ItemKind {
    Email(EmailDetails),
    Message(ChatDetails),
    Video(VideoDetails),
    Event(EventDetails),
}

impl ItemKind {
    /// The provider every item of this kind comes from.
    pub fn provider(&self) -> Provider {
        match self {
            Self::Email(_) => Provider::Gmail,
            Self::Message(_) => Provider::Slack,
            Self::Video(_) => Provider::Youtube,
            Self::Event(_) => Provider::Gcal,
        }
    }

    /// The text the triage engine classifies.
    pub fn triage_input(&self) -> TriageInput {
        match self {
            Self::Email(e) => {
                let sender = if e.from_name.is_empty() {
                    e.from.clone()
                } else {
                    format!("{} <{}>", e.from_name, e.from)
                };
                let body = if e.body.is_empty() { &e.snippet } else { &e.body };
                TriageInput::new(sender, &e.subject, body)
            }
            Self::Message(m) => TriageInput::new(&m.from, "", &m.content),
            Self::Video(v) => TriageInput::new(&v.channel_name, &v.title, ""),
            Self::Event(ev) => {
                let organizer = ev
                    .attendees
                    .first()
                    .map(|a| a.name.as_str())
                    .unwrap_or("calendar");
                TriageInput::new(organizer, &ev.title, &ev.description)
            }
        }
    }
}

// ── Feed item ───────────────────────────────────────────────────────

/// A triaged item from any provider.
///
/// `priority_score` is computed once, when the item is triaged, and only
/// changes through [`FeedItem::retriage`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedItem {
    pub id: String,
    pub provider: Provider,
    pub timestamp: DateTime<Utc>,
    pub priority_score: u32,
    #[serde(default)]
    pub needs_response: bool,
    #[serde(flatten)]
    pub classification: Classification,
    #[serde(flatten)]
    pub kind: ItemKind,
}

impl FeedItem {
    /// Build an item from a fresh classification, scoring it as of `now`.
    pub fn triaged(
        id: impl Into<String>,
        timestamp: DateTime<Utc>,
        kind: ItemKind,
        classification: Classification,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            provider: kind.provider(),
            timestamp,
            priority_score: scoring::priority_score(classification.urgency, timestamp, now),
            needs_response: false,
            classification,
            kind,
        }
    }

    pub fn with_needs_response(mut self, needs_response: bool) -> Self {
        self.needs_response = needs_response;
        self
    }

    pub fn urgency(&self) -> Urgency {
        self.classification.urgency
    }

    /// Replace the classification and recompute the score.
    pub fn retriage(&mut self, classification: Classification, now: DateTime<Utc>) {
        self.priority_score = scoring::priority_score(classification.urgency, self.timestamp, now);
        self.classification = classification;
    }

    pub fn triage_input(&self) -> TriageInput {
        self.kind.triage_input()
    }
}
