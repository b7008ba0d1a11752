//! Priority score derivation.
//!
//! A score is a pure function of urgency tier and recency. Each tier owns a
//! band of [`TIER_BAND`] points and the recency bonus never leaves the band,
//! so any urgent item outranks any high item, and so on down.

use chrono::{DateTime, Utc};

use super::types::Urgency;

/// Width of the score band owned by one tier.
pub const TIER_BAND: u32 = 20;

/// Largest recency bonus, awarded to items less than an hour old.
pub const MAX_RECENCY_BONUS: u32 = TIER_BAND - 1;

/// Lowest score in a tier's band.
pub fn tier_base(urgency: Urgency) -> u32 {
    match urgency {
        Urgency::Urgent => 80,
        Urgency::High => 60,
        Urgency::Normal => 40,
        Urgency::Low => 20,
    }
}

/// Recency bonus: one point lost per hour of age, floored at zero.
/// Items dated in the future (upcoming events) count as brand new.
pub fn recency_bonus(timestamp: DateTime<Utc>, now: DateTime<Utc>) -> u32 {
    let age_hours = now.signed_duration_since(timestamp).num_hours().max(0);
    let age_hours = u32::try_from(age_hours).unwrap_or(u32::MAX);
    MAX_RECENCY_BONUS.saturating_sub(age_hours)
}

/// Priority score for an item of the given tier and timestamp, as seen at `now`.
pub fn priority_score(urgency: Urgency, timestamp: DateTime<Utc>, now: DateTime<Utc>) -> u32 {
    tier_base(urgency) + recency_bonus(timestamp, now)
}
