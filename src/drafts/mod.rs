//! Reply drafts: the approval workflow and its event stream.

pub mod audit;
pub mod model;
pub mod queue;
pub mod workflow;

pub use audit::{AuditAction, AuditEntry, AuditLog};
pub use model::{Draft, DraftEvent, DraftStatus, ReplySource, Tone};
pub use queue::DraftQueue;
pub use workflow::DraftWorkflow;
