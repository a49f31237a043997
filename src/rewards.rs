//! Reward catalog and achievement definitions
use super::loyalty::Tier;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reward {
    pub id: String,
    pub name: String,
    pub required_tier: Tier,
    pub points_cost: i64,
}

/// Both the tier and the balance must clear the reward's bar.
pub fn is_redeemable(tier: Tier, available_points: i64, reward: &Reward) -> bool {
    tier.index() >= reward.required_tier.index() && available_points >= reward.points_cost
}

/// Same check over a stored tier label. Unknown labels are never eligible.
pub fn is_redeemable_raw(tier: &str, available_points: i64, reward: &Reward) -> bool {
    Tier::from_raw(tier).is_some_and(|tier| is_redeemable(tier, available_points, reward))
}

/// The user stats an achievement can be gated on.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AchievementStats {
    pub deals_completed: u32,
    pub total_volume: Decimal,
    pub current_streak: u32,
    pub is_verified: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "requirement_type", content = "requirement_value", rename_all = "snake_case")]
pub enum Requirement {
    DealsCompleted(u32),
    TotalVolume(Decimal),
    Streak(u32),
    Verification(bool),
}

impl Requirement {
    /// Build from a stored `(requirement_type, requirement_value)` pair.
    pub fn from_parts(kind: &str, value: &str) -> Option<Self> {
        let value = value.trim();
        match kind.trim().to_ascii_lowercase().as_str() {
            "deals" | "deals_completed" => value.parse().ok().map(Requirement::DealsCompleted),
            "volume" | "total_volume" => Decimal::from_str(value).ok().map(Requirement::TotalVolume),
            "streak" => value.parse().ok().map(Requirement::Streak),
            "verification" | "verified" => match value.to_ascii_lowercase().as_str() {
                "true" | "1" => Some(Requirement::Verification(true)),
                "false" | "0" => Some(Requirement::Verification(false)),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn is_met(&self, stats: &AchievementStats) -> bool {
        match self {
            Requirement::DealsCompleted(needed) => stats.deals_completed >= *needed,
            Requirement::TotalVolume(needed) => stats.total_volume >= *needed,
            Requirement::Streak(needed) => stats.current_streak >= *needed,
            Requirement::Verification(expected) => stats.is_verified == *expected,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Achievement {
    pub id: String,
    pub name: String,
    #[serde(flatten)]
    pub requirement: Requirement,
    pub points_reward: i64,
}
