//! Loyalty tiers
//!
//! A tier is a pure function of lifetime points, looked up in a [`TierTable`].
use super::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    minicbor::Encode,
    minicbor::Decode,
)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    #[default]
    #[n(0)]
    Bronze,
    #[n(1)]
    Silver,
    #[n(2)]
    Gold,
    #[n(3)]
    Platinum,
    #[n(4)]
    Diamond,
}

impl Tier {
    pub const ALL: [Tier; 5] = [
        Tier::Bronze,
        Tier::Silver,
        Tier::Gold,
        Tier::Platinum,
        Tier::Diamond,
    ];

    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn next(&self) -> Option<Tier> {
        Self::ALL.get(self.index() + 1).copied()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Bronze => "bronze",
            Tier::Silver => "silver",
            Tier::Gold => "gold",
            Tier::Platinum => "platinum",
            Tier::Diamond => "diamond",
        }
    }

    pub fn from_raw(raw: &str) -> Option<Self> {
        let normalised = raw.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|tier| tier.as_str() == normalised)
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Inclusive lower bound, in lifetime points, of every tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TierTable {
    pub bronze: i64,
    pub silver: i64,
    pub gold: i64,
    pub platinum: i64,
    pub diamond: i64,
}

impl Default for TierTable {
    fn default() -> Self {
        Self {
            bronze: 0,
            silver: 1_000,
            gold: 5_000,
            platinum: 20_000,
            diamond: 50_000,
        }
    }
}

impl TierTable {
    pub fn threshold(&self, tier: Tier) -> i64 {
        match tier {
            Tier::Bronze => self.bronze,
            Tier::Silver => self.silver,
            Tier::Gold => self.gold,
            Tier::Platinum => self.platinum,
            Tier::Diamond => self.diamond,
        }
    }

    /// Threshold of the tier above, `None` at the top.
    pub fn next_threshold(&self, tier: Tier) -> Option<i64> {
        tier.next().map(|next| self.threshold(next))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bronze != 0 {
            return Err(ConfigError::TierOrder);
        }
        let ascending = Tier::ALL
            .windows(2)
            .all(|pair| self.threshold(pair[0]) < self.threshold(pair[1]));
        if !ascending {
            return Err(ConfigError::TierOrder);
        }
        Ok(())
    }

    /// Highest tier whose threshold is at or below `lifetime_points`. Bronze is the floor.
    pub fn tier_for_points(&self, lifetime_points: i64) -> Tier {
        Tier::ALL
            .into_iter()
            .rev()
            .find(|tier| self.threshold(*tier) <= lifetime_points)
            .unwrap_or(Tier::Bronze)
    }

    /// Whole percent of the way from `tier`'s threshold to the next one.
    pub fn progress_to_next_tier(&self, lifetime_points: i64, tier: Tier) -> u8 {
        let Some(next) = self.next_threshold(tier) else {
            return 100;
        };
        let current = self.threshold(tier);
        let span = next - current;
        if span <= 0 {
            return 100;
        }

        let progress = (lifetime_points - current) as f64 / span as f64 * 100.0;
        progress.clamp(0.0, 100.0).round() as u8
    }
}
