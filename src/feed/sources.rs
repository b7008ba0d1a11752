//! Feed sources: where items come from before aggregation.
//!
//! Chat, calendar, and video are fixture-backed. Email comes from the live
//! mail provider when the caller has a session, and from fixtures otherwise.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use futures::future::join_all;
use serde::Deserialize;
use tokio::sync::{OnceCell, RwLock};
use tracing::{debug, info, warn};

use super::aggregator::{FeedAggregator, FeedView};
use super::model::{
    Attendee, ChatDetails, EmailDetails, EventDetails, FeedItem, ItemKind, Provider, Urgency,
    VideoCategory, VideoDetails,
};
use crate::error::ProviderError;
use crate::providers::{ConnectionRegistry, ConnectionStatus, MailProvider};
use crate::session::ProviderSession;
use crate::triage::TriageEngine;

const EMAIL_FIXTURES: &str = include_str!("../../fixtures/emails.json");
const SLACK_FIXTURES: &str = include_str!("../../fixtures/slack.json");
const CALENDAR_FIXTURES: &str = include_str!("../../fixtures/calendar.json");
const YOUTUBE_FIXTURES: &str = include_str!("../../fixtures/youtube.json");

/// Default number of inbox messages fetched per request.
pub const DEFAULT_INBOX_LIMIT: u32 = 10;

/// A provider of feed items.
#[async_trait]
pub trait FeedSource: Send + Sync {
    fn provider(&self) -> Provider;

    /// Triaged items for this provider. Sources that need no account
    /// ignore `session`.
    async fn fetch(&self, session: Option<&ProviderSession>) -> Result<Vec<FeedItem>, ProviderError>;

    /// Already-triaged items, if any, without calling out or classifying.
    async fn snapshot(&self, _session: Option<&ProviderSession>) -> Option<Vec<FeedItem>> {
        None
    }
}

// ── Fixtures ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
struct VideoFixture {
    title: String,
    channel_name: String,
    #[serde(default)]
    thumbnail: String,
    duration: String,
    #[serde(default)]
    views: String,
    category: VideoCategory,
}

#[derive(Debug, Clone, Deserialize)]
struct EventFixture {
    title: String,
    duration_minutes: i64,
    #[serde(default)]
    attendees: Vec<Attendee>,
    #[serde(default)]
    location: String,
    #[serde(default)]
    meeting_link: Option<String>,
    #[serde(default)]
    description: String,
}

/// Fixture payloads. Times are relative so the data stays fresh.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum FixtureKind {
    Email(EmailDetails),
    Message(ChatDetails),
    Video(VideoFixture),
    Event(EventFixture),
}

#[derive(Debug, Clone, Deserialize)]
struct FixtureEntry {
    id: String,
    /// Minutes before now; negative for upcoming events.
    #[serde(default)]
    age_minutes: i64,
    #[serde(default)]
    needs_response: bool,
    #[serde(flatten)]
    kind: FixtureKind,
}

impl FixtureEntry {
    fn provider(&self) -> Provider {
        match self.kind {
            FixtureKind::Email(_) => Provider::Gmail,
            FixtureKind::Message(_) => Provider::Slack,
            FixtureKind::Video(_) => Provider::Youtube,
            FixtureKind::Event(_) => Provider::Gcal,
        }
    }

    /// Resolve relative times against `now`.
    fn materialize(&self, now: DateTime<Utc>) -> (DateTime<Utc>, ItemKind) {
        let timestamp = now - Duration::minutes(self.age_minutes);
        let kind = match &self.kind {
            FixtureKind::Email(e) => ItemKind::Email(e.clone()),
            FixtureKind::Message(m) => ItemKind::Message(m.clone()),
            FixtureKind::Video(v) => ItemKind::Video(VideoDetails {
                title: v.title.clone(),
                channel_name: v.channel_name.clone(),
                thumbnail: v.thumbnail.clone(),
                duration: v.duration.clone(),
                views: v.views.clone(),
                published_at: timestamp,
                category: v.category,
            }),
            FixtureKind::Event(ev) => ItemKind::Event(EventDetails {
                title: ev.title.clone(),
                start_time: timestamp,
                end_time: timestamp + Duration::minutes(ev.duration_minutes),
                attendees: ev.attendees.clone(),
                location: ev.location.clone(),
                meeting_link: ev.meeting_link.clone(),
                description: ev.description.clone(),
            }),
        };
        (timestamp, kind)
    }
}

/// Classify `(id, timestamp, kind, needs_response)` tuples and build items.
async fn triage_items(
    triage: &TriageEngine,
    raw: Vec<(String, DateTime<Utc>, ItemKind, bool)>,
) -> Vec<FeedItem> {
    let inputs: Vec<_> = raw.iter().map(|(_, _, kind, _)| kind.triage_input()).collect();
    let classifications = triage.classify_batch(&inputs).await;
    let now = Utc::now();

    raw.into_iter()
        .zip(classifications)
        .map(|((id, timestamp, kind, needs_response), classification)| {
            FeedItem::triaged(id, timestamp, kind, classification, now)
                .with_needs_response(needs_response)
        })
        .collect()
}

/// A source backed by a fixture file. Items are triaged on first fetch
/// and cached, so later fetches and filters never re-triage.
pub struct FixtureSource {
    provider: Provider,
    entries: Vec<FixtureEntry>,
    triage: TriageEngine,
    items: OnceCell<Vec<FeedItem>>,
}

impl FixtureSource {
    /// Parse fixture JSON. Every entry must belong to `provider`.
    pub fn from_json(
        provider: Provider,
        json: &str,
        triage: TriageEngine,
    ) -> Result<Self, serde_json::Error> {
        let entries: Vec<FixtureEntry> = serde_json::from_str(json)?;
        if let Some(stray) = entries.iter().find(|e| e.provider() != provider) {
            return Err(serde::de::Error::custom(format!(
                "Fixture {} belongs to {}, not {}",
                stray.id,
                stray.provider(),
                provider
            )));
        }
        Ok(Self {
            provider,
            entries,
            triage,
            items: OnceCell::new(),
        })
    }

    /// The bundled fixture set for `provider`.
    pub fn bundled(provider: Provider, triage: TriageEngine) -> Result<Self, serde_json::Error> {
        let json = match provider {
            Provider::Gmail => EMAIL_FIXTURES,
            Provider::Slack => SLACK_FIXTURES,
            Provider::Gcal => CALENDAR_FIXTURES,
            Provider::Youtube => YOUTUBE_FIXTURES,
        };
        Self::from_json(provider, json, triage)
    }

    pub async fn items(&self) -> Vec<FeedItem> {
        self.items
            .get_or_init(|| async {
                let now = Utc::now();
                let raw = self
                    .entries
                    .iter()
                    .map(|e| {
                        let (timestamp, kind) = e.materialize(now);
                        (e.id.clone(), timestamp, kind, e.needs_response)
                    })
                    .collect();
                let items = triage_items(&self.triage, raw).await;
                info!(provider = %self.provider, count = items.len(), "Fixture items triaged");
                items
            })
            .await
            .clone()
    }
}

#[async_trait]
impl FeedSource for FixtureSource {
    fn provider(&self) -> Provider {
        self.provider
    }

    async fn fetch(&self, _session: Option<&ProviderSession>) -> Result<Vec<FeedItem>, ProviderError> {
        Ok(self.items().await)
    }

    async fn snapshot(&self, _session: Option<&ProviderSession>) -> Option<Vec<FeedItem>> {
        Some(self.items().await)
    }
}

// ── Mail ────────────────────────────────────────────────────────────

/// Email source: the live inbox when a session is present, fixtures otherwise.
///
/// Live items are cached per account; a message is classified once and
/// reused on later fetches while it stays in the inbox.
pub struct MailFeedSource {
    mail: Option<Arc<dyn MailProvider>>,
    triage: TriageEngine,
    fallback: FixtureSource,
    limit: u32,
    live: RwLock<HashMap<String, Vec<FeedItem>>>,
}

impl MailFeedSource {
    pub fn new(
        mail: Option<Arc<dyn MailProvider>>,
        triage: TriageEngine,
    ) -> Result<Self, serde_json::Error> {
        let fallback = FixtureSource::bundled(Provider::Gmail, triage.clone())?;
        Ok(Self {
            mail,
            triage,
            fallback,
            limit: DEFAULT_INBOX_LIMIT,
            live: RwLock::new(HashMap::new()),
        })
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    /// Fetch and triage the caller's unread inbox.
    pub async fn fetch_live(&self, session: &ProviderSession) -> Result<Vec<FeedItem>, ProviderError> {
        let mail = self.mail.as_ref().ok_or_else(|| ProviderError::NotConfigured {
            provider: "gmail".to_string(),
        })?;

        let emails = mail.fetch_inbox(session, self.limit).await?;
        let key = session.account().unwrap_or_default().to_string();

        let mut known: HashMap<String, FeedItem> = self
            .live
            .read()
            .await
            .get(&key)
            .map(|items| items.iter().map(|i| (i.id.clone(), i.clone())).collect())
            .unwrap_or_default();

        let now = Utc::now();
        let order: Vec<String> = emails.iter().map(|e| e.id.clone()).collect();
        let raw: Vec<_> = emails
            .into_iter()
            .filter(|email| !known.contains_key(&email.id))
            .map(|email| {
                let timestamp = email.timestamp(now);
                let id = email.id.clone();
                (id, timestamp, email.into_kind(), false)
            })
            .collect();
        debug!(count = order.len(), unseen = raw.len(), "Inbox fetched");

        for item in triage_items(&self.triage, raw).await {
            let needs_response = item.urgency() >= Urgency::High;
            known.insert(item.id.clone(), item.with_needs_response(needs_response));
        }

        // Inbox order; messages no longer returned fall out of the cache.
        let items: Vec<FeedItem> = order.iter().filter_map(|id| known.remove(id)).collect();
        self.live.write().await.insert(key, items.clone());
        Ok(items)
    }
}

#[async_trait]
impl FeedSource for MailFeedSource {
    fn provider(&self) -> Provider {
        Provider::Gmail
    }

    async fn fetch(&self, session: Option<&ProviderSession>) -> Result<Vec<FeedItem>, ProviderError> {
        match (session, &self.mail) {
            (Some(session), Some(_)) => self.fetch_live(session).await,
            _ => self.fallback.fetch(None).await,
        }
    }

    /// Only sessions with a known account have a live snapshot.
    async fn snapshot(&self, session: Option<&ProviderSession>) -> Option<Vec<FeedItem>> {
        match (session, &self.mail) {
            (Some(session), Some(_)) => {
                let account = session.account()?;
                self.live.read().await.get(account).cloned()
            }
            _ => self.fallback.snapshot(None).await,
        }
    }
}

// ── Service ─────────────────────────────────────────────────────────

/// Fans out to every source and aggregates the results.
pub struct FeedService {
    sources: Vec<Arc<dyn FeedSource>>,
    aggregator: FeedAggregator,
    connections: Option<Arc<ConnectionRegistry>>,
}

impl FeedService {
    pub fn new(sources: Vec<Arc<dyn FeedSource>>) -> Self {
        Self {
            sources,
            aggregator: FeedAggregator::default(),
            connections: None,
        }
    }

    /// Email plus the bundled chat, calendar, and video fixtures.
    pub fn with_bundled(
        mail: Arc<MailFeedSource>,
        triage: TriageEngine,
    ) -> Result<Self, serde_json::Error> {
        let mut sources: Vec<Arc<dyn FeedSource>> = vec![mail];
        for provider in [Provider::Gcal, Provider::Slack, Provider::Youtube] {
            sources.push(Arc::new(FixtureSource::bundled(provider, triage.clone())?));
        }
        Ok(Self::new(sources))
    }

    pub fn with_aggregator(mut self, aggregator: FeedAggregator) -> Self {
        self.aggregator = aggregator;
        self
    }

    /// Leave out fixture providers the user has disconnected. Gmail is
    /// governed by the session instead.
    pub fn with_connections(mut self, connections: Arc<ConnectionRegistry>) -> Self {
        self.connections = Some(connections);
        self
    }

    async fn is_disconnected(&self, provider: Provider) -> bool {
        let Some(registry) = &self.connections else {
            return false;
        };
        if provider == Provider::Gmail {
            return false;
        }
        matches!(
            registry.get(provider).await,
            Some(conn) if conn.status == ConnectionStatus::Disconnected
        )
    }

    /// Fetch the relevant sources concurrently. A failing source is logged
    /// and skipped.
    ///
    /// With a provider filter, the other sources only contribute what they
    /// already hold, so the focus section still spans every provider
    /// without re-fetching or re-triaging.
    pub async fn view(
        &self,
        session: Option<&ProviderSession>,
        provider: Option<Provider>,
    ) -> FeedView {
        let mut active = Vec::with_capacity(self.sources.len());
        for source in &self.sources {
            if self.is_disconnected(source.provider()).await {
                debug!(provider = %source.provider(), "Source disconnected, skipping");
                continue;
            }
            active.push(source);
        }

        let results = join_all(active.iter().map(|source| async move {
            match provider {
                Some(p) if p != source.provider() => {
                    Ok(source.snapshot(session).await.unwrap_or_default())
                }
                _ => source.fetch(session).await,
            }
        }))
        .await;

        let sets = active
            .iter()
            .zip(results)
            .filter_map(|(source, result)| match result {
                Ok(items) => Some(items),
                Err(e) => {
                    warn!(provider = %source.provider(), error = %e, "Feed source failed, skipping");
                    None
                }
            })
            .collect();

        self.aggregator.view(sets, provider)
    }
}
