//! AgentCEO: a triaged executive feed with human-approved replies.

pub mod api;
pub mod config;
pub mod drafts;
pub mod error;
pub mod feed;
pub mod llm;
pub mod providers;
pub mod session;
pub mod telemetry;
pub mod triage;
