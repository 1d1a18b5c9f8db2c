use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Graded answers a free-tier account may submit per rolling 24h window.
pub const FREE_DAILY_LIMIT: u32 = 5;

/// Errors that can occur when decoding tiers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TierError {
    #[error("unknown account tier: {0}")]
    Unknown(String),
}

/// Billing tier of an account, as far as this engine cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Free,
    Premium,
}

impl Tier {
    /// Stable string form used for storage columns.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Tier::Free => "free",
            Tier::Premium => "premium",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = TierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "free" => Ok(Tier::Free),
            "premium" => Ok(Tier::Premium),
            other => Err(TierError::Unknown(other.to_string())),
        }
    }
}

/// Daily answer allowance state for one account.
///
/// The decisions here are pure; the matching mutations happen through
/// atomic storage-layer operations so concurrent devices cannot gain
/// extra answers from a stale client copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaRecord {
    pub tier: Tier,
    pub answered_today: u32,
    pub reset_at: DateTime<Utc>,
    pub premium_expires_at: Option<DateTime<Utc>>,
}

impl QuotaRecord {
    /// Fresh free-tier record with its window anchored at `now`.
    #[must_use]
    pub fn free(now: DateTime<Utc>) -> Self {
        Self {
            tier: Tier::Free,
            answered_today: 0,
            reset_at: now,
            premium_expires_at: None,
        }
    }

    /// Premium record valid until `expires_at`.
    #[must_use]
    pub fn premium(now: DateTime<Utc>, expires_at: DateTime<Utc>) -> Self {
        Self {
            tier: Tier::Premium,
            answered_today: 0,
            reset_at: now,
            premium_expires_at: Some(expires_at),
        }
    }

    /// True once a full 24h window has elapsed since `reset_at`.
    #[must_use]
    pub fn window_expired(&self, now: DateTime<Utc>) -> bool {
        now - self.reset_at >= Duration::hours(24)
    }

    /// Starts a new window at `now` with the counter cleared.
    pub fn reset_window(&mut self, now: DateTime<Utc>) {
        self.answered_today = 0;
        self.reset_at = now;
    }

    /// Whether another graded answer is allowed right now.
    ///
    /// Premium is fail-closed: a premium record with no expiry is treated
    /// as not entitled, never as unlimited.
    #[must_use]
    pub fn can_answer(&self, now: DateTime<Utc>) -> bool {
        match self.tier {
            Tier::Premium => self.premium_expires_at.is_some_and(|expires| expires > now),
            Tier::Free => self.answered_today < FREE_DAILY_LIMIT,
        }
    }
}
