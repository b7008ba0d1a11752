//! Append-only audit trail of draft and send actions.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// Entries kept before the oldest are dropped.
pub const DEFAULT_AUDIT_CAPACITY: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    DraftCreated,
    DraftEdited,
    DraftApproved,
    DraftRejected,
    DraftSent,
    /// Approved send that did not go through a draft.
    MessageSent,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub action: AuditAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub draft_id: Option<Uuid>,
    /// Provider message id for sends.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_message_id: Option<String>,
    pub recipient: String,
    pub subject: String,
}

impl AuditEntry {
    pub fn new(action: AuditAction, recipient: impl Into<String>, subject: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            action,
            draft_id: None,
            provider_message_id: None,
            recipient: recipient.into(),
            subject: subject.into(),
        }
    }

    pub fn with_draft(mut self, draft_id: Uuid) -> Self {
        self.draft_id = Some(draft_id);
        self
    }

    pub fn with_message_id(mut self, message_id: impl Into<String>) -> Self {
        self.provider_message_id = Some(message_id.into());
        self
    }
}

/// Bounded, append-only log. Entries are never modified.
pub struct AuditLog {
    entries: RwLock<VecDeque<AuditEntry>>,
    capacity: usize,
}

impl AuditLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(VecDeque::with_capacity(capacity.min(64))),
            capacity: capacity.max(1),
        }
    }

    pub async fn record(&self, entry: AuditEntry) {
        debug!(action = ?entry.action, draft_id = ?entry.draft_id, "Audit entry");
        let mut entries = self.entries.write().await;
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    /// Newest first.
    pub async fn recent(&self, limit: usize) -> Vec<AuditEntry> {
        let entries = self.entries.read().await;
        entries.iter().rev().take(limit).cloned().collect()
    }

    /// Entries for one draft, oldest first.
    pub async fn for_draft(&self, draft_id: Uuid) -> Vec<AuditEntry> {
        let entries = self.entries.read().await;
        entries
            .iter()
            .filter(|e| e.draft_id == Some(draft_id))
            .cloned()
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new(DEFAULT_AUDIT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn recent_is_newest_first() {
        let log = AuditLog::default();
        log.record(AuditEntry::new(AuditAction::DraftCreated, "a@x.com", "one"))
            .await;
        log.record(AuditEntry::new(AuditAction::MessageSent, "b@x.com", "two").with_message_id("m1"))
            .await;

        let recent = log.recent(10).await;
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].action, AuditAction::MessageSent);
        assert_eq!(recent[0].provider_message_id.as_deref(), Some("m1"));
    }

    #[tokio::test]
    async fn capacity_drops_oldest() {
        let log = AuditLog::new(3);
        for i in 0..5 {
            log.record(AuditEntry::new(AuditAction::DraftEdited, "a@x.com", format!("s{i}")))
                .await;
        }
        assert_eq!(log.len().await, 3);
        let subjects: Vec<String> = log.recent(10).await.into_iter().map(|e| e.subject).collect();
        assert_eq!(subjects, ["s4", "s3", "s2"]);
    }

    #[tokio::test]
    async fn filters_by_draft() {
        let log = AuditLog::default();
        let id = Uuid::new_v4();
        log.record(AuditEntry::new(AuditAction::DraftCreated, "a", "s").with_draft(id))
            .await;
        log.record(AuditEntry::new(AuditAction::DraftCreated, "b", "s").with_draft(Uuid::new_v4()))
            .await;
        log.record(
            AuditEntry::new(AuditAction::DraftSent, "a", "s")
                .with_draft(id)
                .with_message_id("m9"),
        )
        .await;

        let trail = log.for_draft(id).await;
        assert_eq!(trail.len(), 2);
        assert_eq!(trail[1].action, AuditAction::DraftSent);

        let json = serde_json::to_value(&trail[1]).unwrap();
        assert_eq!(json["action"], "draft_sent");
        assert_eq!(json["provider_message_id"], "m9");
    }
}
