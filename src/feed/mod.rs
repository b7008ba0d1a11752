//! Unified cross-provider feed.

pub mod aggregator;
pub mod model;
pub mod sources;

pub use aggregator::{FeedAggregator, FeedView, feed_order};
pub use model::{FeedItem, ItemKind, Provider};
pub use sources::{FeedService, FeedSource, FixtureSource, MailFeedSource};
