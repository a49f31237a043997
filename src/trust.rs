//! Counterparty trust scoring
//!
//! A trust score is a weighted blend of five performance metrics, each
//! normalised to `[0, 1]` and the total scaled onto `[0.0, 5.0]` with one
//! decimal of precision. The score is then classified into a [`TrustLevel`]
//! used for badge rendering.
use super::error::ConfigError;
use super::utils::round1;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const MAX_TRUST_SCORE: f64 = 5.0;

/// Relative weight of each metric. Must sum to 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrustWeights {
    pub on_time_delivery: f64,
    pub quality_compliance: f64,
    pub payment_performance: f64,
    pub honor_points: f64,
    pub completed_deals: f64,
}

impl Default for TrustWeights {
    fn default() -> Self {
        Self {
            on_time_delivery: 0.30,
            quality_compliance: 0.25,
            payment_performance: 0.25,
            honor_points: 0.10,
            completed_deals: 0.10,
        }
    }
}

impl TrustWeights {
    pub fn sum(&self) -> f64 {
        self.on_time_delivery
            + self.quality_compliance
            + self.payment_performance
            + self.honor_points
            + self.completed_deals
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let named = [
            ("on_time_delivery", self.on_time_delivery),
            ("quality_compliance", self.quality_compliance),
            ("payment_performance", self.payment_performance),
            ("honor_points", self.honor_points),
            ("completed_deals", self.completed_deals),
        ];
        for (name, weight) in named {
            if !weight.is_finite() || weight < 0.0 {
                return Err(ConfigError::InvalidWeight(name));
            }
        }

        let sum = self.sum();
        if (sum - 1.0).abs() > 1e-9 {
            return Err(ConfigError::WeightSum(sum));
        }
        Ok(())
    }
}

/// Weights plus the caps count-style metrics are normalised against, and the
/// honor bookkeeping applied when a deal settles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrustConfig {
    pub weights: TrustWeights,
    pub honor_points_cap: u32,
    pub completed_deals_cap: u32,
    pub honor_per_clean_deal: u32,
    pub dishonor_per_breach: u32,
}

impl Default for TrustConfig {
    fn default() -> Self {
        Self {
            weights: TrustWeights::default(),
            honor_points_cap: 100,
            completed_deals_cap: 50,
            honor_per_clean_deal: 5,
            dishonor_per_breach: 10,
        }
    }
}

impl TrustConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.weights.validate()?;
        if self.honor_points_cap == 0 {
            return Err(ConfigError::InvalidCap("honor_points_cap"));
        }
        if self.completed_deals_cap == 0 {
            return Err(ConfigError::InvalidCap("completed_deals_cap"));
        }
        Ok(())
    }
}

/// Raw inputs to the score. Rates are percentages.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TrustMetrics {
    pub on_time_rate: f64,
    pub quality_rate: f64,
    pub payment_rate: f64,
    pub honor_points: u32,
    pub completed_deals: u32,
}

fn normalise_rate(rate: f64) -> f64 {
    if rate.is_nan() {
        return 0.0;
    }
    rate.clamp(0.0, 100.0) / 100.0
}

fn normalise_count(count: u32, cap: u32) -> f64 {
    if cap == 0 {
        return 0.0;
    }
    f64::from(count.min(cap)) / f64::from(cap)
}

/// Weighted trust score in `[0.0, 5.0]`, rounded to one decimal.
pub fn trust_score(metrics: &TrustMetrics, config: &TrustConfig) -> f64 {
    let w = &config.weights;
    let weighted = normalise_rate(metrics.on_time_rate) * w.on_time_delivery
        + normalise_rate(metrics.quality_rate) * w.quality_compliance
        + normalise_rate(metrics.payment_rate) * w.payment_performance
        + normalise_count(metrics.honor_points, config.honor_points_cap) * w.honor_points
        + normalise_count(metrics.completed_deals, config.completed_deals_cap) * w.completed_deals;

    let scaled = weighted * MAX_TRUST_SCORE;
    if !scaled.is_finite() {
        return 0.0;
    }
    round1(scaled.clamp(0.0, MAX_TRUST_SCORE))
}

/// Clamp a persisted score into the displayable range.
pub fn clamp_score(score: f64) -> f64 {
    if score.is_nan() {
        return 0.0;
    }
    score.clamp(0.0, MAX_TRUST_SCORE)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrustLevel {
    Warning,
    Elite,
    Premium,
    Verified,
    Standard,
    New,
}

impl TrustLevel {
    pub fn classify(score: f64, has_warning: bool, is_verified: bool) -> Self {
        if has_warning {
            return TrustLevel::Warning;
        }
        // NaN fails every comparison and lands on New
        if score >= 4.5 {
            TrustLevel::Elite
        } else if score >= 4.0 {
            TrustLevel::Premium
        } else if score >= 3.5 && is_verified {
            TrustLevel::Verified
        } else if score >= 2.5 {
            TrustLevel::Standard
        } else {
            TrustLevel::New
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TrustLevel::Warning => "warning",
            TrustLevel::Elite => "elite",
            TrustLevel::Premium => "premium",
            TrustLevel::Verified => "verified",
            TrustLevel::Standard => "standard",
            TrustLevel::New => "new",
        }
    }
}

impl fmt::Display for TrustLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DealMilestone {
    pub deals: u32,
    pub label: String,
}

/// Thresholds for the additive badge labels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BadgeRules {
    pub deal_milestones: Vec<DealMilestone>,
    pub high_volume: Decimal,
    pub top_trader_volume: Decimal,
}

impl Default for BadgeRules {
    fn default() -> Self {
        Self {
            deal_milestones: vec![
                DealMilestone {
                    deals: 10,
                    label: "10+ Deals".to_string(),
                },
                DealMilestone {
                    deals: 100,
                    label: "100+ Deals".to_string(),
                },
            ],
            high_volume: Decimal::from(1_000_000),
            top_trader_volume: Decimal::from(10_000_000),
        }
    }
}

/// Labels earned by deal count and traded volume. `year_volume` is the
/// volume traded in `year` and drives the yearly top trader badge.
pub fn badges_for(
    total_deals: u32,
    total_volume: Decimal,
    year_volume: Decimal,
    year: i32,
    rules: &BadgeRules,
) -> Vec<String> {
    let mut badges: Vec<String> = rules
        .deal_milestones
        .iter()
        .filter(|milestone| total_deals >= milestone.deals)
        .map(|milestone| milestone.label.clone())
        .collect();

    if total_volume >= rules.high_volume {
        badges.push("High Volume".to_string());
    }
    if year_volume >= rules.top_trader_volume {
        badges.push(format!("Top Trader {year}"));
    }
    badges
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strong_metrics() -> TrustMetrics {
        TrustMetrics {
            on_time_rate: 95.0,
            quality_rate: 98.0,
            payment_rate: 99.0,
            honor_points: 80,
            completed_deals: 60,
        }
    }

    #[test]
    fn default_weights_sum_to_one() {
        let weights = TrustWeights::default();
        assert!((weights.sum() - 1.0).abs() < 1e-12);
        assert!(weights.validate().is_ok());
    }

    #[test]
    fn strong_counterparty_is_elite() {
        let score = trust_score(&strong_metrics(), &TrustConfig::default());
        // 0.9575 * 5 = 4.7875
        assert_eq!(score, 4.8);
        assert_eq!(TrustLevel::classify(score, false, false), TrustLevel::Elite);
    }

    #[test]
    fn outliers_are_capped() {
        let mut metrics = strong_metrics();
        metrics.honor_points = 10_000;
        metrics.completed_deals = 10_000;
        metrics.on_time_rate = 400.0;
        assert_eq!(trust_score(&metrics, &TrustConfig::default()), 5.0);

        metrics.on_time_rate = -20.0;
        metrics.quality_rate = f64::NAN;
        assert!(trust_score(&metrics, &TrustConfig::default()) >= 0.0);
    }

    #[test]
    fn empty_profile_scores_zero() {
        let score = trust_score(&TrustMetrics::default(), &TrustConfig::default());
        assert_eq!(score, 0.0);
        assert_eq!(TrustLevel::classify(score, false, true), TrustLevel::New);
    }

    #[test]
    fn verified_level_needs_the_flag() {
        assert_eq!(TrustLevel::classify(3.7, false, true), TrustLevel::Verified);
        assert_eq!(TrustLevel::classify(3.7, false, false), TrustLevel::Standard);
        assert_eq!(TrustLevel::classify(4.0, false, false), TrustLevel::Premium);
        assert_eq!(TrustLevel::classify(2.4, false, true), TrustLevel::New);
        assert_eq!(TrustLevel::classify(f64::NAN, false, true), TrustLevel::New);
    }

    #[test]
    fn warning_overrides_score() {
        assert_eq!(TrustLevel::classify(5.0, true, true), TrustLevel::Warning);
    }

    #[test]
    fn skewed_weights_are_rejected() {
        let mut weights = TrustWeights::default();
        weights.honor_points = 0.2;
        assert!(matches!(weights.validate(), Err(ConfigError::WeightSum(_))));

        weights.honor_points = -0.1;
        assert!(matches!(
            weights.validate(),
            Err(ConfigError::InvalidWeight("honor_points"))
        ));
    }

    #[test]
    fn badges_follow_thresholds() {
        let rules = BadgeRules::default();
        let badges = badges_for(
            120,
            Decimal::from(2_000_000),
            Decimal::from(12_000_000),
            2024,
            &rules,
        );
        assert_eq!(
            badges,
            vec!["10+ Deals", "100+ Deals", "High Volume", "Top Trader 2024"]
        );

        assert!(badges_for(3, Decimal::ZERO, Decimal::ZERO, 2024, &rules).is_empty());
    }
}
