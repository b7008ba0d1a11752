//! Keyword rules engine for deterministic triage.
//!
//! Rules run in order and the first match decides the urgency tier:
//! - urgency markers ("urgent", "asap", "deadline") → urgent
//! - approval/review markers ("review", "approve", "sign") → high
//! - scheduling markers ("meeting", "calendar", "invite") → normal
//! - bulk mail markers and noreply senders → low
//!
//! Anything unmatched is `normal`. This is the whole classifier for the mock
//! backend and does not depend on any network call.

use regex::Regex;
use tracing::debug;

use super::types::{Classification, TriageInput, Urgency};

/// Which field a rule matches against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleField {
    Sender,
    Subject,
    Content,
    /// Subject when present, otherwise content.
    Headline,
}

/// A single classification rule with a compiled regex.
///
/// `summary` may contain `{sender}` and `{subject}` placeholders.
#[derive(Debug, Clone)]
pub struct UrgencyRule {
    /// Human-readable rule name for logs.
    pub name: String,
    pub regex: Regex,
    pub field: RuleField,
    pub urgency: Urgency,
    pub summary: String,
    pub why_it_matters: String,
    pub suggested_action: String,
}

impl UrgencyRule {
    fn matches(&self, input: &TriageInput) -> bool {
        let value = match self.field {
            RuleField::Sender => input.sender.as_str(),
            RuleField::Subject => input.subject.as_str(),
            RuleField::Content => input.body.as_str(),
            RuleField::Headline => {
                if input.subject.trim().is_empty() {
                    input.body.as_str()
                } else {
                    input.subject.as_str()
                }
            }
        };
        self.regex.is_match(value)
    }

    fn classify(&self, input: &TriageInput) -> Classification {
        let summary = self
            .summary
            .replace("{sender}", input.sender_name())
            .replace("{subject}", &input.headline());
        Classification {
            urgency: self.urgency,
            summary,
            why_it_matters: self.why_it_matters.clone(),
            suggested_action: self.suggested_action.clone(),
        }
    }
}

/// Ordered rule list; first match wins.
pub struct RulesEngine {
    rules: Vec<UrgencyRule>,
}

impl RulesEngine {
    /// Create a rules engine with the default keyword sets.
    pub fn default_rules() -> Self {
        let rules = vec![
            UrgencyRule {
                name: "urgency markers".into(),
                regex: Regex::new(r"(?i)\b(urgent|asap|deadline)\b").unwrap(),
                field: RuleField::Headline,
                urgency: Urgency::Urgent,
                summary: "Urgent request from {sender}".into(),
                why_it_matters:
                    "This message requires immediate attention based on urgency indicators.".into(),
                suggested_action: "Review and respond within the hour".into(),
            },
            UrgencyRule {
                name: "approval markers".into(),
                regex: Regex::new(r"(?i)\b(review|approve|approval|sign)\b").unwrap(),
                field: RuleField::Headline,
                urgency: Urgency::High,
                summary: "Action needed: {subject}".into(),
                why_it_matters: "Requires your approval or review to proceed.".into(),
                suggested_action: "Review the attached materials and provide feedback".into(),
            },
            UrgencyRule {
                name: "scheduling markers".into(),
                regex: Regex::new(r"(?i)\b(meeting|calendar|invite|invitation|schedule)\b")
                    .unwrap(),
                field: RuleField::Headline,
                urgency: Urgency::Normal,
                summary: "Meeting request: {subject}".into(),
                why_it_matters: "Calendar coordination needed.".into(),
                suggested_action: "Check your availability and respond".into(),
            },
            UrgencyRule {
                name: "bulk mail markers".into(),
                regex: Regex::new(r"(?i)\b(newsletter|unsubscribe|digest)\b").unwrap(),
                field: RuleField::Headline,
                urgency: Urgency::Low,
                summary: "{subject}".into(),
                why_it_matters: "Bulk mail; nothing is waiting on you.".into(),
                suggested_action: "Skim later or archive".into(),
            },
            UrgencyRule {
                name: "noreply sender".into(),
                regex: Regex::new(r"(?i)(^|<)\s*no[\-_.]?reply@").unwrap(),
                field: RuleField::Sender,
                urgency: Urgency::Low,
                summary: "{subject}".into(),
                why_it_matters: "Automated message; replies are not read.".into(),
                suggested_action: "Skim later or archive".into(),
            },
        ];

        Self { rules }
    }

    /// Create an empty rules engine (for testing).
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// Append a custom rule. It runs after all existing rules.
    pub fn add_rule(
        &mut self,
        pattern: &str,
        field: RuleField,
        urgency: Urgency,
        summary: &str,
    ) -> Result<(), regex::Error> {
        self.rules.push(UrgencyRule {
            name: pattern.into(),
            regex: Regex::new(pattern)?,
            field,
            urgency,
            summary: summary.into(),
            why_it_matters: "Matched a custom triage rule.".into(),
            suggested_action: "Review and respond as needed".into(),
        });
        Ok(())
    }

    /// Find the first rule matching this input, if any.
    pub fn evaluate(&self, input: &TriageInput) -> Option<&UrgencyRule> {
        let rule = self.rules.iter().find(|rule| rule.matches(input))?;
        debug!(
            sender = %input.sender,
            rule = %rule.name,
            urgency = %rule.urgency,
            "Triage rule matched"
        );
        Some(rule)
    }

    /// Classify an input. Never fails; unmatched input is `normal`.
    pub fn classify(&self, input: &TriageInput) -> Classification {
        match self.evaluate(input) {
            Some(rule) => rule.classify(input),
            None => Classification {
                urgency: Urgency::Normal,
                summary: input.headline(),
                why_it_matters: "Standard communication requiring your attention.".to_string(),
                suggested_action: "Review and respond as needed".to_string(),
            },
        }
    }
}

impl Default for RulesEngine {
    fn default() -> Self {
        Self::default_rules()
    }
}
