//! Counterparty profiles tracked by a trader
use super::loyalty::Tier;
use super::trust::{self, BadgeRules, TrustConfig, TrustLevel, TrustMetrics};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// How a counterparty behaved on a single settled deal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DealOutcome {
    pub completed: bool,
    pub on_time: bool,
    pub quality_ok: bool,
    pub paid_on_time: bool,
    pub value: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Counterparty {
    pub company_name: String,
    /// Last computed score, shown until [`Counterparty::recompute_trust_score`] runs.
    pub trust_score: f64,
    pub is_verified: bool,
    pub total_deals: u32,
    pub completed_deals: u32,
    pub success_rate: f64,
    pub on_time_rate: f64,
    pub quality_rate: f64,
    pub payment_rate: f64,
    pub honor_points: u32,
    pub dishonor_points: u32,
    pub total_volume: Decimal,
    pub badges: BTreeSet<String>,
    pub loyalty_tier: Tier,
    pub loyalty_points: i64,
    pub has_warning: bool,
    pub blocked: bool,
}

impl Default for Counterparty {
    fn default() -> Self {
        Self {
            company_name: String::new(),
            trust_score: 0.0,
            is_verified: false,
            total_deals: 0,
            completed_deals: 0,
            success_rate: 0.0,
            on_time_rate: 0.0,
            quality_rate: 0.0,
            payment_rate: 0.0,
            honor_points: 0,
            dishonor_points: 0,
            total_volume: Decimal::ZERO,
            badges: BTreeSet::new(),
            loyalty_tier: Tier::Bronze,
            loyalty_points: 0,
            has_warning: false,
            blocked: false,
        }
    }
}

// running mean of a percentage after the nth sample
fn fold_rate(rate: f64, n: u32, hit: bool) -> f64 {
    let sample = if hit { 100.0 } else { 0.0 };
    let previous = f64::from(n.saturating_sub(1));
    (rate.clamp(0.0, 100.0) * previous + sample) / f64::from(n)
}

impl Counterparty {
    pub fn new(company_name: &str) -> Self {
        Self {
            company_name: company_name.to_string(),
            ..Self::default()
        }
    }

    pub fn metrics(&self) -> TrustMetrics {
        TrustMetrics {
            on_time_rate: self.on_time_rate,
            quality_rate: self.quality_rate,
            payment_rate: self.payment_rate,
            honor_points: self.honor_points,
            completed_deals: self.completed_deals,
        }
    }

    pub fn display_score(&self) -> f64 {
        trust::clamp_score(self.trust_score)
    }

    pub fn recompute_trust_score(&mut self, config: &TrustConfig) -> f64 {
        self.trust_score = trust::trust_score(&self.metrics(), config);
        self.trust_score
    }

    pub fn trust_level(&self) -> TrustLevel {
        TrustLevel::classify(self.display_score(), self.has_warning, self.is_verified)
    }

    /// Fold a settled deal into counts, rates and honor. The stored score is
    /// left alone until it is recomputed.
    pub fn record_deal(&mut self, outcome: DealOutcome, config: &TrustConfig) {
        self.total_deals = self.total_deals.saturating_add(1);

        if outcome.completed {
            self.completed_deals = self.completed_deals.saturating_add(1);
            let n = self.completed_deals;
            self.on_time_rate = fold_rate(self.on_time_rate, n, outcome.on_time);
            self.quality_rate = fold_rate(self.quality_rate, n, outcome.quality_ok);
            self.payment_rate = fold_rate(self.payment_rate, n, outcome.paid_on_time);
            self.total_volume = self
                .total_volume
                .saturating_add(outcome.value.max(Decimal::ZERO));
        }

        let clean = outcome.completed && outcome.on_time && outcome.quality_ok && outcome.paid_on_time;
        if clean {
            self.honor_points = self.honor_points.saturating_add(config.honor_per_clean_deal);
        } else {
            self.dishonor_points = self.dishonor_points.saturating_add(config.dishonor_per_breach);
        }

        self.success_rate = f64::from(self.completed_deals) / f64::from(self.total_deals) * 100.0;
    }

    /// Merge in any newly earned badges. Badges are never taken away.
    pub fn refresh_badges(&mut self, year_volume: Decimal, year: i32, rules: &BadgeRules) {
        let earned = trust::badges_for(self.total_deals, self.total_volume, year_volume, year, rules);
        self.badges.extend(earned);
    }

    pub fn flag_warning(&mut self) {
        self.has_warning = true;
    }

    /// Counterparties are never deleted, only blocked.
    pub fn block(&mut self) {
        self.blocked = true;
        self.has_warning = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn clean(value: Decimal) -> DealOutcome {
        DealOutcome {
            completed: true,
            on_time: true,
            quality_ok: true,
            paid_on_time: true,
            value,
        }
    }

    #[test]
    fn stored_score_is_shown_until_recomputed() {
        let config = TrustConfig::default();
        let mut cp = Counterparty::new("Baltic Grain AG");
        cp.trust_score = 3.9;
        cp.record_deal(clean(dec!(1000)), &config);
        assert_eq!(cp.display_score(), 3.9);

        let score = cp.recompute_trust_score(&config);
        assert_eq!(cp.display_score(), score);
    }

    #[test]
    fn rates_follow_outcomes() {
        let config = TrustConfig::default();
        let mut cp = Counterparty::new("Baltic Grain AG");
        cp.record_deal(clean(dec!(1000)), &config);
        cp.record_deal(
            DealOutcome {
                on_time: false,
                ..clean(dec!(500))
            },
            &config,
        );
        cp.record_deal(
            DealOutcome {
                completed: false,
                ..clean(dec!(900))
            },
            &config,
        );

        assert_eq!(cp.total_deals, 3);
        assert_eq!(cp.completed_deals, 2);
        assert_eq!(cp.on_time_rate, 50.0);
        assert_eq!(cp.quality_rate, 100.0);
        assert_eq!(cp.honor_points, 5);
        assert_eq!(cp.dishonor_points, 20);
        assert_eq!(cp.total_volume, dec!(1500));
        assert!((cp.success_rate - 66.666).abs() < 0.01);
    }

    #[test]
    fn blocked_counterparty_shows_warning() {
        let mut cp = Counterparty::new("Shady Oil Ltd");
        cp.trust_score = 4.9;
        assert_eq!(cp.trust_level(), TrustLevel::Elite);
        cp.block();
        assert_eq!(cp.trust_level(), TrustLevel::Warning);
    }

    #[test]
    fn badges_only_accumulate() {
        let rules = BadgeRules::default();
        let mut cp = Counterparty::new("Baltic Grain AG");
        cp.total_deals = 12;
        cp.total_volume = dec!(2000000);
        cp.refresh_badges(dec!(12000000), 2024, &rules);
        cp.refresh_badges(dec!(0), 2025, &rules);

        assert!(cp.badges.contains("Top Trader 2024"));
        assert!(cp.badges.contains("10+ Deals"));
        assert!(cp.badges.contains("High Volume"));
        assert_eq!(cp.badges.len(), 3);
    }

    #[test]
    fn volume_saturates_instead_of_overflowing() {
        let config = TrustConfig::default();
        let mut cp = Counterparty::new("Baltic Grain AG");
        cp.record_deal(clean(Decimal::MAX), &config);
        cp.record_deal(clean(Decimal::MAX), &config);
        assert_eq!(cp.total_volume, Decimal::MAX);
        assert_eq!(cp.completed_deals, 2);
    }

    #[test]
    fn reads_a_backend_row() {
        let row = r#"{
            "company_name": "Nordic Metals",
            "trust_score": 4.2,
            "is_verified": true,
            "loyalty_tier": "gold",
            "badges": ["100+ Deals"]
        }"#;
        let cp: Counterparty = serde_json::from_str(row).unwrap();
        assert_eq!(cp.loyalty_tier, Tier::Gold);
        assert_eq!(cp.trust_level(), TrustLevel::Premium);
        assert_eq!(cp.total_volume, Decimal::ZERO);
    }
}
