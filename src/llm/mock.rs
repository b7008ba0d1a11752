//! Deterministic [`TextGenerator`] used when no generative backend is configured.
//!
//! Classification runs the keyword [`RulesEngine`]. Replies and chat answers
//! come from fixed templates keyed on subject and message keywords.

use async_trait::async_trait;

use crate::drafts::model::{ReplySource, Tone};
use crate::error::LlmError;
use crate::llm::generator::{ChatContext, TextGenerator};
use crate::llm::provider::{ChatMessage, Role};
use crate::triage::{Classification, RulesEngine, TriageInput};

pub const MOCK_MODEL: &str = "mock";

/// Rule- and template-based generator. Never fails and never touches the network.
pub struct MockTextGenerator {
    rules: RulesEngine,
}

impl MockTextGenerator {
    pub fn new() -> Self {
        Self {
            rules: RulesEngine::default_rules(),
        }
    }
}

impl Default for MockTextGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TextGenerator for MockTextGenerator {
    fn model_name(&self) -> &str {
        MOCK_MODEL
    }

    async fn classify(&self, input: &TriageInput) -> Result<Classification, LlmError> {
        Ok(self.rules.classify(input))
    }

    async fn draft_reply(&self, source: &ReplySource, tone: Tone) -> Result<String, LlmError> {
        Ok(template_reply(source, tone))
    }

    async fn chat(
        &self,
        messages: &[ChatMessage],
        context: Option<&ChatContext>,
    ) -> Result<String, LlmError> {
        let last = messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or("");
        Ok(canned_chat_reply(last, context))
    }
}

fn template_reply(source: &ReplySource, tone: Tone) -> String {
    let input = source.as_triage_input();
    let sender = match input.sender_name() {
        "" => "there",
        name => name,
    };
    let subject = source.subject.to_lowercase();
    let has = |words: &[&str]| words.iter().any(|w| subject.contains(w));
    let brief = tone == Tone::Brief;

    let greeting = match tone {
        Tone::Professional => format!("Dear {sender},"),
        Tone::Friendly => format!("Hi {sender}!"),
        Tone::Brief => "Hi,".to_string(),
    };
    let closing = match tone {
        Tone::Professional => "Best regards",
        Tone::Friendly => "Thanks!",
        Tone::Brief => "Thanks",
    };

    let body = if has(&["meeting", "schedule"]) {
        if brief {
            "That time works for me. I'll send a calendar invite."
        } else {
            "Thank you for reaching out about scheduling a meeting. I've reviewed my calendar \
             and would be happy to find a time that works for both of us.\n\n\
             Please let me know your availability, or feel free to send a calendar invite directly."
        }
    } else if has(&["review", "feedback"]) {
        if brief {
            "I'll review this and get back to you by EOD."
        } else {
            "Thank you for sending this over for review. I'll take a thorough look at the \
             materials and provide my feedback.\n\n\
             I should be able to get back to you with my thoughts by end of day. \
             Please let me know if you need anything sooner."
        }
    } else if has(&["question", "help"]) {
        if brief {
            "Happy to help. Let me look into this and get back to you."
        } else {
            "Thank you for reaching out with your question. I'd be happy to help clarify this \
             for you.\n\n\
             Let me look into the details and I'll follow up with a comprehensive response shortly."
        }
    } else if brief {
        "Thanks for your email. I'll review and follow up soon."
    } else {
        "Thank you for your email. I've received your message and will review the details \
         carefully.\n\n\
         I'll follow up with you shortly with any questions or next steps."
    };

    format!("{greeting}\n\n{body}\n\n{closing}")
}

fn canned_chat_reply(last: &str, context: Option<&ChatContext>) -> String {
    let lower = last.to_lowercase();
    let has = |words: &[&str]| words.iter().any(|w| lower.contains(w));

    if has(&["urgent", "attention"]) {
        return "Based on your feed, the items marked **urgent** and **high** need attention \
                first. Open **Today's Focus** to see them in priority order.\n\n\
                Would you like me to draft a response for any of them?"
            .to_string();
    }

    if has(&["summarize", "summary", "day"]) {
        let emails = context.and_then(|c| c.emails).unwrap_or(0);
        let tasks = context.and_then(|c| c.tasks).unwrap_or(0);
        let meetings = context.and_then(|c| c.meetings).unwrap_or(0);
        return format!(
            "Here's your day at a glance:\n\n\
             - **{emails} emails** needing response\n\
             - **{tasks} tasks** open\n\
             - **{meetings} meetings** on the calendar\n\n\
             Want me to help with any of these?"
        );
    }

    if has(&["calendar", "schedule", "meeting"]) {
        return "Your upcoming events are listed in the feed under **Calendar**. \
                Would you like me to protect focus time or schedule something?"
            .to_string();
    }

    if has(&["draft", "reply", "email"]) {
        return "I can help you draft a reply! Please tell me:\n\n\
                1. Which email should I respond to?\n\
                2. What tone would you prefer? (professional, friendly, or brief)\n\n\
                Every draft waits for your approval before anything is sent."
            .to_string();
    }

    if has(&["help", "what can"]) {
        return "I'm AgentCEO, your personal operations assistant! I can help you:\n\n\
                - **Triage messages**: prioritize what needs attention\n\
                - **Draft replies**: generate responses in your tone\n\
                - **Manage calendar**: see what's coming up\n\
                - **Track tasks**: stay on top of action items\n\n\
                Just ask me something like \"What needs attention?\" or \"Summarize my day\"."
            .to_string();
    }

    let preview: String = last.chars().take(50).collect();
    format!(
        "I understand you're asking about \"{preview}...\"\n\n\
         I can help you with:\n\
         - Checking urgent items\n\
         - Summarizing your day\n\
         - Drafting email replies\n\
         - Managing your calendar\n\n\
         What would you like to focus on?"
    )
}
