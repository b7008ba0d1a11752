//! Triage: urgency classification and priority scoring.
//!
//! Flow:
//! 1. [`TriageEngine`] asks the injected generator for a classification
//! 2. Any failure degrades to [`Classification::fallback`]
//! 3. [`scoring::priority_score`] turns tier + recency into a sort key

pub mod engine;
pub mod rules;
pub mod scoring;
pub mod types;

pub use engine::TriageEngine;
pub use rules::{RuleField, RulesEngine, UrgencyRule};
pub use scoring::priority_score;
pub use types::{Classification, TriageInput, Urgency};
