//! Feed aggregation: merge, order, and derived views.

use std::cmp::Ordering;

use serde::Serialize;
use tracing::debug;

use super::model::{FeedItem, Provider};

/// Minimum score for the focus view (urgent and high tiers).
pub const DEFAULT_FOCUS_THRESHOLD: u32 = 60;

/// Maximum number of focus items.
pub const DEFAULT_FOCUS_LIMIT: usize = 5;

/// Total feed order: score descending, then newer first, then id ascending.
pub fn feed_order(a: &FeedItem, b: &FeedItem) -> Ordering {
    b.priority_score
        .cmp(&a.priority_score)
        .then_with(|| b.timestamp.cmp(&a.timestamp))
        .then_with(|| a.id.cmp(&b.id))
}

/// A rendered feed: the focus subset plus the (optionally filtered) item list.
#[derive(Debug, Clone, Serialize)]
pub struct FeedView {
    pub focus: Vec<FeedItem>,
    pub items: Vec<FeedItem>,
}

/// Merges provider item sets into one ordered feed.
#[derive(Debug, Clone)]
pub struct FeedAggregator {
    focus_threshold: u32,
    focus_limit: usize,
}

impl FeedAggregator {
    pub fn new(focus_threshold: u32, focus_limit: usize) -> Self {
        Self {
            focus_threshold,
            focus_limit,
        }
    }

    /// Concatenate all sets and sort by [`feed_order`].
    pub fn aggregate(&self, item_sets: Vec<Vec<FeedItem>>) -> Vec<FeedItem> {
        let mut items: Vec<FeedItem> = item_sets.into_iter().flatten().collect();
        items.sort_by(feed_order);
        debug!(count = items.len(), "Aggregated feed");
        items
    }

    /// Items at or above the focus threshold, capped to the focus limit.
    /// `ordered` must already be in feed order.
    pub fn focus(&self, ordered: &[FeedItem]) -> Vec<FeedItem> {
        ordered
            .iter()
            .filter(|item| item.priority_score >= self.focus_threshold)
            .take(self.focus_limit)
            .cloned()
            .collect()
    }

    /// Items from one provider, keeping their order and cached triage.
    pub fn by_provider(&self, ordered: &[FeedItem], provider: Provider) -> Vec<FeedItem> {
        ordered
            .iter()
            .filter(|item| item.provider == provider)
            .cloned()
            .collect()
    }

    /// Aggregate and build the view. The focus subset always spans every
    /// provider; `provider` only filters `items`.
    pub fn view(&self, item_sets: Vec<Vec<FeedItem>>, provider: Option<Provider>) -> FeedView {
        let ordered = self.aggregate(item_sets);
        let focus = self.focus(&ordered);
        let items = match provider {
            Some(p) => self.by_provider(&ordered, p),
            None => ordered,
        };
        FeedView { focus, items }
    }
}

impl Default for FeedAggregator {
    fn default() -> Self {
        Self::new(DEFAULT_FOCUS_THRESHOLD, DEFAULT_FOCUS_LIMIT)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, Utc};

    use super::*;
    use crate::feed::model::{ChatDetails, EmailDetails, EventDetails, ItemKind};
    use crate::triage::{Classification, Urgency};

    fn classification() -> Classification {
        Classification {
            urgency: Urgency::Normal,
            summary: "s".into(),
            why_it_matters: "w".into(),
            suggested_action: "a".into(),
        }
    }

    fn item(id: &str, kind: ItemKind, score: u32, timestamp: DateTime<Utc>) -> FeedItem {
        FeedItem {
            id: id.into(),
            provider: kind.provider(),
            timestamp,
            priority_score: score,
            needs_response: false,
            classification: classification(),
            kind,
        }
    }

    fn email_kind() -> ItemKind {
        ItemKind::Email(EmailDetails {
            from: "a@x.com".into(),
            from_name: String::new(),
            to: Vec::new(),
            subject: "Contract".into(),
            snippet: String::new(),
            body: String::new(),
            thread_id: String::new(),
            is_read: false,
            labels: Vec::new(),
        })
    }

    fn chat_kind() -> ItemKind {
        ItemKind::Message(ChatDetails {
            channel: "#general".into(),
            from: "alex".into(),
            avatar: String::new(),
            content: "hi".into(),
            thread_count: 0,
            reactions: Vec::new(),
        })
    }

    fn event_kind(now: DateTime<Utc>) -> ItemKind {
        ItemKind::Event(EventDetails {
            title: "Standup".into(),
            start_time: now,
            end_time: now + Duration::minutes(15),
            attendees: Vec::new(),
            location: String::new(),
            meeting_link: None,
            description: String::new(),
        })
    }

    #[test]
    fn orders_by_score_across_providers() {
        let now = Utc::now();
        let feed = FeedAggregator::default().aggregate(vec![
            vec![item("email", email_kind(), 90, now)],
            vec![item("chat", chat_kind(), 40, now)],
            vec![item("event", event_kind(now), 70, now)],
        ]);
        let ids: Vec<&str> = feed.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, ["email", "event", "chat"]);
    }

    #[test]
    fn ties_break_by_recency_then_id() {
        let now = Utc::now();
        let feed = FeedAggregator::default().aggregate(vec![vec![
            item("b", chat_kind(), 50, now - Duration::hours(1)),
            item("c", chat_kind(), 50, now),
            item("a", chat_kind(), 50, now - Duration::hours(1)),
        ]]);
        let ids: Vec<&str> = feed.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, ["c", "a", "b"]);
    }

    #[test]
    fn aggregation_is_idempotent_and_input_order_independent() {
        let now = Utc::now();
        let sets = vec![
            vec![item("x", chat_kind(), 45, now), item("y", email_kind(), 45, now)],
            vec![item("z", event_kind(now), 80, now)],
        ];
        let aggregator = FeedAggregator::default();
        let first = aggregator.aggregate(sets.clone());
        let second = aggregator.aggregate(sets.clone());
        assert_eq!(first, second);

        let reversed: Vec<Vec<FeedItem>> = sets.into_iter().rev().collect();
        assert_eq!(aggregator.aggregate(reversed), first);
    }

    #[test]
    fn focus_applies_threshold_and_cap() {
        let now = Utc::now();
        let items: Vec<FeedItem> = (0..8)
            .map(|i| item(&format!("i{i}"), chat_kind(), 55 + i * 5, now))
            .collect();
        let aggregator = FeedAggregator::default();
        let ordered = aggregator.aggregate(vec![items]);
        let focus = aggregator.focus(&ordered);

        assert_eq!(focus.len(), 5);
        assert!(focus.iter().all(|i| i.priority_score >= DEFAULT_FOCUS_THRESHOLD));
        assert_eq!(focus[0].priority_score, 90);
    }

    #[test]
    fn provider_filter_keeps_scores_and_focus_spans_all() {
        let now = Utc::now();
        let view = FeedAggregator::default().view(
            vec![
                vec![item("email", email_kind(), 90, now)],
                vec![item("chat", chat_kind(), 40, now)],
            ],
            Some(Provider::Slack),
        );
        assert_eq!(view.items.len(), 1);
        assert_eq!(view.items[0].id, "chat");
        assert_eq!(view.items[0].priority_score, 40);
        assert_eq!(view.focus.len(), 1);
        assert_eq!(view.focus[0].id, "email");
    }
}
