//! Draft queue: in-memory draft store with broadcast to WebSocket clients.
//!
//! Every state change happens under one write lock, so a transition either
//! fully applies or not at all.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{RwLock, broadcast};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::model::{Draft, DraftEvent, DraftStatus};
use crate::error::DraftError;

/// Default broadcast channel capacity.
const DEFAULT_BROADCAST_CAPACITY: usize = 256;

/// Sent and rejected drafts kept for history; older ones are pruned.
pub const DEFAULT_TERMINAL_HISTORY: usize = 100;

struct Inner {
    drafts: Vec<Draft>,
    /// Drafts with a provider send in flight.
    sending: HashSet<Uuid>,
    /// Max number of terminal drafts retained.
    history: usize,
}

impl Inner {
    /// Remove the oldest terminal drafts beyond `history`. Pending and
    /// approved drafts are never pruned.
    fn prune_terminal(&mut self) -> usize {
        let terminal = self.drafts.iter().filter(|d| d.status.is_terminal()).count();
        let to_remove = terminal.saturating_sub(self.history);
        if to_remove == 0 {
            return 0;
        }

        let mut removed = 0;
        self.drafts.retain(|d| {
            if d.status.is_terminal() && removed < to_remove {
                removed += 1;
                false
            } else {
                true
            }
        });
        debug!(removed, "Pruned terminal drafts");
        removed
    }

    fn find_mut(&mut self, id: Uuid) -> Result<&mut Draft, DraftError> {
        self.drafts
            .iter_mut()
            .find(|d| d.id == id)
            .ok_or(DraftError::NotFound { id })
    }
}

fn invalid(draft: &Draft, target: DraftStatus) -> DraftError {
    DraftError::InvalidTransition {
        id: draft.id,
        state: draft.status.to_string(),
        target: target.to_string(),
    }
}

/// In-memory draft queue backed by a broadcast channel for fan-out to WS clients.
pub struct DraftQueue {
    inner: RwLock<Inner>,
    tx: broadcast::Sender<DraftEvent>,
}

impl DraftQueue {
    pub fn new() -> Arc<Self> {
        Self::with_history(DEFAULT_TERMINAL_HISTORY)
    }

    /// A queue retaining at most `history` sent or rejected drafts.
    pub fn with_history(history: usize) -> Arc<Self> {
        let (tx, _rx) = broadcast::channel(DEFAULT_BROADCAST_CAPACITY);
        Arc::new(Self {
            inner: RwLock::new(Inner {
                drafts: Vec::new(),
                sending: HashSet::new(),
                history,
            }),
            tx,
        })
    }

    /// Subscribe to draft events. Each WS client calls this.
    pub fn subscribe(&self) -> broadcast::Receiver<DraftEvent> {
        self.tx.subscribe()
    }

    fn broadcast(&self, event: DraftEvent) {
        // No receivers is fine.
        let _ = self.tx.send(event);
    }

    /// Store a new draft and announce it.
    pub async fn insert(&self, draft: Draft) {
        info!(
            draft_id = %draft.id,
            source_id = %draft.source_id,
            recipient = %draft.recipient,
            tone = %draft.tone,
            "Draft queued"
        );
        {
            let mut inner = self.inner.write().await;
            inner.drafts.push(draft.clone());
            inner.prune_terminal();
        }
        self.broadcast(DraftEvent::DraftCreated { draft });
    }

    pub async fn get(&self, id: Uuid) -> Option<Draft> {
        let inner = self.inner.read().await;
        inner.drafts.iter().find(|d| d.id == id).cloned()
    }

    /// All drafts, oldest first.
    pub async fn list(&self) -> Vec<Draft> {
        self.inner.read().await.drafts.clone()
    }

    pub async fn pending(&self) -> Vec<Draft> {
        let inner = self.inner.read().await;
        inner
            .drafts
            .iter()
            .filter(|d| d.status == DraftStatus::Pending)
            .cloned()
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.drafts.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.drafts.is_empty()
    }

    /// Replace the body of a pending draft. The status does not change.
    pub async fn edit(&self, id: Uuid, body: String) -> Result<Draft, DraftError> {
        if body.trim().is_empty() {
            return Err(DraftError::EmptyBody);
        }

        let updated = {
            let mut inner = self.inner.write().await;
            let draft = inner.find_mut(id)?;
            if draft.status != DraftStatus::Pending {
                warn!(draft_id = %id, status = %draft.status, "Cannot edit non-pending draft");
                return Err(invalid(draft, DraftStatus::Pending));
            }
            draft.body = body;
            draft.updated_at = Utc::now();
            draft.clone()
        };

        info!(draft_id = %id, "Draft edited");
        self.broadcast(DraftEvent::DraftUpdated {
            draft: updated.clone(),
        });
        Ok(updated)
    }

    /// Apply a status change permitted by [`DraftStatus::can_transition_to`].
    pub async fn transition(&self, id: Uuid, target: DraftStatus) -> Result<Draft, DraftError> {
        let updated = {
            let mut inner = self.inner.write().await;
            if inner.sending.contains(&id) {
                return Err(DraftError::SendInProgress { id });
            }
            let draft = inner.find_mut(id)?;
            if !draft.status.can_transition_to(target) {
                debug!(draft_id = %id, from = %draft.status, to = %target, "Rejected transition");
                return Err(invalid(draft, target));
            }
            draft.status = target;
            draft.updated_at = Utc::now();
            let updated = draft.clone();
            inner.prune_terminal();
            updated
        };

        info!(draft_id = %id, status = %target, "Draft status changed");
        self.broadcast(DraftEvent::DraftUpdated {
            draft: updated.clone(),
        });
        Ok(updated)
    }

    /// Reserve an approved draft for sending. Only one caller can hold the
    /// claim; it ends with [`DraftQueue::complete_send`] or
    /// [`DraftQueue::release_send`].
    pub async fn claim_for_send(&self, id: Uuid) -> Result<Draft, DraftError> {
        let mut inner = self.inner.write().await;
        if inner.sending.contains(&id) {
            return Err(DraftError::SendInProgress { id });
        }
        let draft = inner.find_mut(id)?;
        if !draft.status.can_transition_to(DraftStatus::Sent) {
            return Err(invalid(draft, DraftStatus::Sent));
        }
        let claimed = draft.clone();
        inner.sending.insert(id);
        debug!(draft_id = %id, "Draft claimed for send");
        Ok(claimed)
    }

    /// Drop a send claim after a failed delivery. The draft stays approved.
    pub async fn release_send(&self, id: Uuid) {
        let mut inner = self.inner.write().await;
        inner.sending.remove(&id);
    }

    /// Mark a claimed draft sent and link the provider message id.
    pub async fn complete_send(&self, id: Uuid, message_id: String) -> Result<Draft, DraftError> {
        let updated = {
            let mut inner = self.inner.write().await;
            inner.sending.remove(&id);
            let draft = inner.find_mut(id)?;
            if !draft.status.can_transition_to(DraftStatus::Sent) {
                return Err(invalid(draft, DraftStatus::Sent));
            }
            draft.status = DraftStatus::Sent;
            draft.sent_message_id = Some(message_id);
            draft.updated_at = Utc::now();
            let updated = draft.clone();
            inner.prune_terminal();
            updated
        };

        info!(draft_id = %id, "Draft sent");
        self.broadcast(DraftEvent::DraftUpdated {
            draft: updated.clone(),
        });
        Ok(updated)
    }
}
