//! Draft workflow: generate, review, and send replies.
//!
//! Nothing is transmitted unless the caller passes an explicit approval
//! flag, and a draft can only be sent once it is `approved`.

use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use super::audit::{AuditAction, AuditEntry, AuditLog};
use super::model::{Draft, DraftStatus, ReplySource, Tone};
use super::queue::DraftQueue;
use crate::error::{DraftError, ProviderError};
use crate::llm::TextGenerator;
use crate::providers::{MailProvider, OutboundMessage, SentMessage};
use crate::session::ProviderSession;

pub struct DraftWorkflow {
    queue: Arc<DraftQueue>,
    generator: Arc<dyn TextGenerator>,
    mail: Option<Arc<dyn MailProvider>>,
    audit: Arc<AuditLog>,
}

impl DraftWorkflow {
    pub fn new(
        queue: Arc<DraftQueue>,
        generator: Arc<dyn TextGenerator>,
        mail: Option<Arc<dyn MailProvider>>,
        audit: Arc<AuditLog>,
    ) -> Self {
        Self {
            queue,
            generator,
            mail,
            audit,
        }
    }

    pub fn queue(&self) -> &Arc<DraftQueue> {
        &self.queue
    }

    pub fn audit(&self) -> &Arc<AuditLog> {
        &self.audit
    }

    fn mail(&self) -> Result<&Arc<dyn MailProvider>, DraftError> {
        self.mail.as_ref().ok_or_else(|| {
            DraftError::Provider(ProviderError::NotConfigured {
                provider: "gmail".to_string(),
            })
        })
    }

    fn outbound(draft: &Draft) -> OutboundMessage {
        OutboundMessage {
            to: draft.recipient.clone(),
            subject: draft.subject.clone(),
            body: draft.body.clone(),
            thread_id: draft.thread_id.clone(),
        }
    }

    /// Generate a pending draft replying to `source`.
    ///
    /// With a session the draft is also saved in the provider mailbox; if
    /// that fails nothing is stored locally.
    pub async fn create_draft(
        &self,
        session: Option<&ProviderSession>,
        source: &ReplySource,
        tone: Tone,
    ) -> Result<Draft, DraftError> {
        let body = self.generator.draft_reply(source, tone).await?;
        if body.trim().is_empty() {
            return Err(DraftError::EmptyBody);
        }
        let mut draft = Draft::new(source, body, tone);

        if let Some(session) = session {
            let mirrored = self
                .mail()?
                .create_draft(session, &Self::outbound(&draft))
                .await?;
            draft = draft.with_provider_draft_id(mirrored.id);
        }

        self.audit
            .record(
                AuditEntry::new(AuditAction::DraftCreated, &draft.recipient, &draft.subject)
                    .with_draft(draft.id),
            )
            .await;
        self.queue.insert(draft.clone()).await;
        Ok(draft)
    }

    pub async fn edit_draft(&self, id: Uuid, body: String) -> Result<Draft, DraftError> {
        let draft = self.queue.edit(id, body).await?;
        self.record(AuditAction::DraftEdited, &draft).await;
        Ok(draft)
    }

    pub async fn approve(&self, id: Uuid) -> Result<Draft, DraftError> {
        let draft = self.queue.transition(id, DraftStatus::Approved).await?;
        self.record(AuditAction::DraftApproved, &draft).await;
        Ok(draft)
    }

    pub async fn reject(&self, id: Uuid) -> Result<Draft, DraftError> {
        let draft = self.queue.transition(id, DraftStatus::Rejected).await?;
        self.record(AuditAction::DraftRejected, &draft).await;
        Ok(draft)
    }

    /// Send an approved draft through the provider.
    ///
    /// Fails with `ApprovalRequired` before touching the provider when
    /// `approved` is false. Exactly one provider send is issued per draft.
    pub async fn send(
        &self,
        session: &ProviderSession,
        id: Uuid,
        approved: bool,
    ) -> Result<Draft, DraftError> {
        if !approved {
            warn!(draft_id = %id, "Send refused without approval");
            return Err(DraftError::ApprovalRequired);
        }

        let mail = self.mail()?;
        let draft = self.queue.claim_for_send(id).await?;

        let sent = match mail.send_message(session, &Self::outbound(&draft)).await {
            Ok(sent) => sent,
            Err(e) => {
                self.queue.release_send(id).await;
                warn!(draft_id = %id, error = %e, "Draft send failed");
                return Err(e.into());
            }
        };

        let draft = self.queue.complete_send(id, sent.id.clone()).await?;
        self.audit
            .record(
                AuditEntry::new(AuditAction::DraftSent, &draft.recipient, &draft.subject)
                    .with_draft(id)
                    .with_message_id(&sent.id),
            )
            .await;
        info!(draft_id = %id, message_id = %sent.id, "Draft delivered");
        Ok(draft)
    }

    /// Send a message that has no draft, under the same approval gate.
    pub async fn send_message(
        &self,
        session: &ProviderSession,
        message: &OutboundMessage,
        approved: bool,
    ) -> Result<SentMessage, DraftError> {
        if !approved {
            warn!(to = %message.to, "Send refused without approval");
            return Err(DraftError::ApprovalRequired);
        }
        message.validate()?;

        let sent = self.mail()?.send_message(session, message).await?;
        self.audit
            .record(
                AuditEntry::new(AuditAction::MessageSent, &message.to, &message.subject)
                    .with_message_id(&sent.id),
            )
            .await;
        info!(message_id = %sent.id, "Message delivered");
        Ok(sent)
    }

    async fn record(&self, action: AuditAction, draft: &Draft) {
        self.audit
            .record(AuditEntry::new(action, &draft.recipient, &draft.subject).with_draft(draft.id))
            .await;
    }
}
