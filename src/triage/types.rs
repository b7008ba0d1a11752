//! Shared types for triage.

use serde::{Deserialize, Serialize};

// ── Urgency ─────────────────────────────────────────────────────────

/// Ordinal severity of an inbound item. Declaration order is the sort order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Low,
    Normal,
    High,
    Urgent,
}

impl Urgency {
    /// All tiers, lowest first.
    pub const ALL: [Urgency; 4] = [Self::Low, Self::Normal, Self::High, Self::Urgent];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
            Self::Urgent => "urgent",
        }
    }
}

impl Default for Urgency {
    fn default() -> Self {
        Self::Normal
    }
}

impl std::fmt::Display for Urgency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Urgency {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "normal" => Ok(Self::Normal),
            "high" => Ok(Self::High),
            "urgent" => Ok(Self::Urgent),
            other => Err(format!("Unknown urgency: {}", other)),
        }
    }
}

// ── Triage input ────────────────────────────────────────────────────

/// The text of an item as the triage engine sees it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TriageInput {
    /// Sender display string (`Name <addr>` for email, handle for chat).
    pub sender: String,
    /// Subject line; empty for chat messages.
    #[serde(default)]
    pub subject: String,
    /// Message body or chat content.
    #[serde(default)]
    pub body: String,
}

impl TriageInput {
    pub fn new(
        sender: impl Into<String>,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            sender: sender.into(),
            subject: subject.into(),
            body: body.into(),
        }
    }

    /// Subject if present, otherwise the first 80 characters of the body.
    pub fn headline(&self) -> String {
        let subject = self.subject.trim();
        if !subject.is_empty() {
            return subject.to_string();
        }
        let body = self.body.trim();
        let preview: String = body.chars().take(80).collect();
        if preview.len() < body.len() {
            format!("{preview}…")
        } else {
            preview
        }
    }

    /// Sender name without the address part (`"Sarah Chen <s@x.com>"` → `"Sarah Chen"`).
    pub fn sender_name(&self) -> &str {
        let name = self.sender.split('<').next().unwrap_or("").trim();
        if name.is_empty() {
            self.sender.trim()
        } else {
            name.trim_matches('"')
        }
    }
}

// ── Classification ──────────────────────────────────────────────────

/// Result of triaging one item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub urgency: Urgency,
    pub summary: String,
    #[serde(alias = "whyItMatters")]
    pub why_it_matters: String,
    #[serde(alias = "suggestedAction")]
    pub suggested_action: String,
}

impl Classification {
    /// Safe default used whenever the generative path fails.
    pub fn fallback(input: &TriageInput) -> Self {
        Self {
            urgency: Urgency::Normal,
            summary: input.headline(),
            why_it_matters: "Requires your attention".to_string(),
            suggested_action: "Review and respond".to_string(),
        }
    }

    /// True when every text field carries content.
    pub fn is_complete(&self) -> bool {
        !self.summary.trim().is_empty()
            && !self.why_it_matters.trim().is_empty()
            && !self.suggested_action.trim().is_empty()
    }
}
