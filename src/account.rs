//! A user's loyalty account: profile, ledger and unlocked achievements
use super::deal::Amount;
use super::error::{ConfigError, LedgerError};
use super::ledger::{LedgerBalance, LoyaltyTransaction};
use super::loyalty::{Tier, TierTable};
use super::rewards::{Achievement, AchievementStats, Reward};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

/// How many points a completed deal or a referral is worth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EarnPolicy {
    pub points_per_deal: i64,
    /// One extra point per this much traded value.
    pub value_per_point: Decimal,
    pub referral_points: i64,
}

impl Default for EarnPolicy {
    fn default() -> Self {
        Self {
            points_per_deal: 100,
            value_per_point: Decimal::from(1_000),
            referral_points: 250,
        }
    }
}

impl EarnPolicy {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.value_per_point <= Decimal::ZERO {
            return Err(ConfigError::ValuePerPoint);
        }
        Ok(())
    }

    pub fn points_for_deal(&self, total_value: Decimal) -> i64 {
        let by_value = if self.value_per_point > Decimal::ZERO && total_value > Decimal::ZERO {
            // an overflowing quotient is larger than any i64 anyway
            total_value
                .checked_div(self.value_per_point)
                .and_then(|points| points.floor().to_i64())
                .unwrap_or(i64::MAX)
        } else {
            0
        };
        self.points_per_deal.max(0).saturating_add(by_value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct UserLoyalty {
    #[n(0)]
    pub tier: Tier,
    #[n(1)]
    pub total_points: i64, // signed sum of the ledger
    #[n(2)]
    pub available_points: i64,
    #[n(3)]
    pub lifetime_points: i64,
    #[n(4)]
    pub deals_completed: u32,
    #[n(5)]
    pub total_volume: Amount,
    #[n(6)]
    pub current_streak: u32,
    #[n(7)]
    pub longest_streak: u32,
    #[n(8)]
    pub tier_progress: u8,
    #[n(9)]
    pub next_tier_threshold: Option<i64>,
}

impl Default for UserLoyalty {
    fn default() -> Self {
        Self {
            tier: Tier::Bronze,
            total_points: 0,
            available_points: 0,
            lifetime_points: 0,
            deals_completed: 0,
            total_volume: Amount::default(),
            current_streak: 0,
            longest_streak: 0,
            tier_progress: 0,
            next_tier_threshold: None,
        }
    }
}

impl UserLoyalty {
    /// Refresh balances from a fold. The tier only ever moves up.
    fn sync(&mut self, balance: LedgerBalance, tiers: &TierTable) {
        self.total_points = balance.net_points;
        self.available_points = balance.available_points;
        self.lifetime_points = balance.lifetime_points;
        self.tier = self.tier.max(tiers.tier_for_points(balance.lifetime_points));
        self.tier_progress = tiers.progress_to_next_tier(balance.lifetime_points, self.tier);
        self.next_tier_threshold = tiers.next_threshold(self.tier);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct LoyaltyAccount {
    #[n(0)]
    pub user_id: String,
    #[n(1)]
    pub profile: UserLoyalty,
    #[n(2)]
    pub transactions: Vec<LoyaltyTransaction>,
    #[n(3)]
    pub unlocked: BTreeSet<String>, // achievement ids
    #[n(4)]
    pub credited_deals: BTreeSet<String>,
}

impl LoyaltyAccount {
    pub fn new(user_id: String, tiers: &TierTable) -> Self {
        let mut profile = UserLoyalty::default();
        profile.sync(LedgerBalance::default(), tiers);
        Self {
            user_id,
            profile,
            transactions: vec![],
            unlocked: BTreeSet::new(),
            credited_deals: BTreeSet::new(),
        }
    }

    pub fn balance(&self) -> LedgerBalance {
        LedgerBalance::fold(&self.transactions)
    }

    /// Append a transaction. A debit the balance cannot cover is rejected and
    /// leaves the account untouched.
    pub fn apply(
        &mut self,
        transaction: LoyaltyTransaction,
        tiers: &TierTable,
    ) -> Result<LedgerBalance, LedgerError> {
        if transaction.points < 0 {
            self.balance().check_debit(-transaction.points)?;
        }
        debug!(
            user = %self.user_id,
            kind = %transaction.kind,
            points = transaction.points,
            "applying loyalty transaction"
        );
        self.transactions.push(transaction);

        let balance = self.balance();
        self.profile.sync(balance, tiers);
        Ok(balance)
    }

    /// Credit a completed deal and extend the streak. Each deal is credited
    /// at most once, a repeat leaves the account untouched.
    pub fn record_deal_completion(
        &mut self,
        deal_id: &str,
        total_value: Decimal,
        policy: &EarnPolicy,
        tiers: &TierTable,
    ) -> Result<LedgerBalance, LedgerError> {
        if self.credited_deals.contains(deal_id) {
            return Err(LedgerError::DealAlreadyCredited(deal_id.to_string()));
        }
        let points = policy.points_for_deal(total_value);
        let transaction = match points {
            0 => None,
            points => Some(LoyaltyTransaction::earn(
                points,
                format!("Completed deal {deal_id}"),
                Some(deal_id.to_string()),
            )?),
        };

        let profile = &mut self.profile;
        profile.deals_completed = profile.deals_completed.saturating_add(1);
        profile.total_volume =
            Amount(profile.total_volume.0.saturating_add(total_value.max(Decimal::ZERO)));
        profile.current_streak = profile.current_streak.saturating_add(1);
        profile.longest_streak = profile.longest_streak.max(profile.current_streak);

        self.credited_deals.insert(deal_id.to_string());

        match transaction {
            Some(transaction) => self.apply(transaction, tiers),
            None => Ok(self.balance()),
        }
    }

    /// A cancelled or disputed deal breaks the streak.
    pub fn record_deal_lapse(&mut self) {
        self.profile.current_streak = 0;
    }

    pub fn record_referral(
        &mut self,
        referred_user: &str,
        policy: &EarnPolicy,
        tiers: &TierTable,
    ) -> Result<LedgerBalance, LedgerError> {
        let transaction = LoyaltyTransaction::referral(
            policy.referral_points,
            format!("Referred {referred_user}"),
        )?;
        self.apply(transaction, tiers)
    }

    pub fn redeem(
        &mut self,
        reward: &Reward,
        tiers: &TierTable,
    ) -> Result<LedgerBalance, LedgerError> {
        if self.profile.tier.index() < reward.required_tier.index() {
            return Err(LedgerError::TierTooLow {
                reward: reward.id.clone(),
                current: self.profile.tier.to_string(),
                required: reward.required_tier.to_string(),
            });
        }
        let transaction =
            LoyaltyTransaction::redeem(reward.points_cost, format!("Redeemed {}", reward.name))?;
        self.apply(transaction, tiers)
    }

    pub fn stats(&self, is_verified: bool) -> AchievementStats {
        AchievementStats {
            deals_completed: self.profile.deals_completed,
            total_volume: self.profile.total_volume.0,
            current_streak: self.profile.current_streak,
            is_verified,
        }
    }

    /// Unlock every achievement whose requirement is now met, granting its
    /// bonus once. Returns the ids unlocked by this call.
    pub fn evaluate_achievements(
        &mut self,
        achievements: &[Achievement],
        is_verified: bool,
        tiers: &TierTable,
    ) -> Result<Vec<String>, LedgerError> {
        let stats = self.stats(is_verified);
        let mut newly_unlocked = vec![];

        for achievement in achievements {
            if self.unlocked.contains(&achievement.id) || !achievement.requirement.is_met(&stats) {
                continue;
            }
            if achievement.points_reward > 0 {
                let transaction = LoyaltyTransaction::bonus(
                    achievement.points_reward,
                    format!("Achievement unlocked: {}", achievement.name),
                )?;
                self.apply(transaction, tiers)?;
            }
            self.unlocked.insert(achievement.id.clone());
            newly_unlocked.push(achievement.id.clone());
        }
        Ok(newly_unlocked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rewards::Requirement;
    use rust_decimal_macros::dec;

    fn account_with(points: i64) -> LoyaltyAccount {
        let tiers = TierTable::default();
        let mut account = LoyaltyAccount::new("user_a".into(), &tiers);
        account
            .apply(
                LoyaltyTransaction::earn(points, "seed".into(), None).unwrap(),
                &tiers,
            )
            .unwrap();
        account
    }

    fn ten_deals() -> Achievement {
        Achievement {
            id: "ach_ten".into(),
            name: "Complete 10 deals".into(),
            requirement: Requirement::DealsCompleted(10),
            points_reward: 500,
        }
    }

    #[test]
    fn deal_points_scale_with_value() {
        let policy = EarnPolicy::default();
        assert_eq!(policy.points_for_deal(dec!(265606.20)), 365);
        assert_eq!(policy.points_for_deal(dec!(-10)), 100);
    }

    #[test]
    fn tiny_value_per_point_saturates() {
        let policy = EarnPolicy {
            value_per_point: dec!(0.0000000001),
            ..EarnPolicy::default()
        };
        assert!(policy.validate().is_ok());
        assert_eq!(policy.points_for_deal(Decimal::MAX), i64::MAX);
        assert_eq!(policy.points_for_deal(dec!(100000000000000000000)), i64::MAX);
    }

    #[test]
    fn huge_volumes_saturate() {
        let tiers = TierTable::default();
        let policy = EarnPolicy::default();
        let mut account = LoyaltyAccount::new("user_a".into(), &tiers);
        account
            .record_deal_completion("deal_1", Decimal::MAX, &policy, &tiers)
            .unwrap();
        account
            .record_deal_completion("deal_2", Decimal::MAX, &policy, &tiers)
            .unwrap();

        assert_eq!(account.profile.total_volume, Amount(Decimal::MAX));
        assert_eq!(account.profile.deals_completed, 2);
        assert_eq!(account.profile.lifetime_points, i64::MAX);
    }

    #[test]
    fn a_deal_is_credited_once() {
        let tiers = TierTable::default();
        let policy = EarnPolicy::default();
        let mut account = LoyaltyAccount::new("user_a".into(), &tiers);
        account
            .record_deal_completion("deal_1", dec!(0), &policy, &tiers)
            .unwrap();
        let before = account.clone();

        let err = account
            .record_deal_completion("deal_1", dec!(0), &policy, &tiers)
            .unwrap_err();
        assert_eq!(err, LedgerError::DealAlreadyCredited("deal_1".into()));
        assert_eq!(account, before);
        assert_eq!(account.profile.deals_completed, 1);
        assert_eq!(account.profile.lifetime_points, 100);
    }

    #[test]
    fn overdrawn_redemption_changes_nothing() {
        let tiers = TierTable::default();
        let mut account = account_with(500);
        let before = account.clone();
        let reward = Reward {
            id: "rw_voucher".into(),
            name: "Voucher".into(),
            required_tier: Tier::Bronze,
            points_cost: 1_000,
        };

        let err = account.redeem(&reward, &tiers).unwrap_err();
        assert_eq!(
            err,
            LedgerError::InsufficientPoints {
                available: 500,
                requested: 1_000
            }
        );
        assert_eq!(account, before);
        assert_eq!(account.profile.available_points, 500);
    }

    #[test]
    fn tier_survives_spending() {
        let tiers = TierTable::default();
        let mut account = account_with(6_000);
        assert_eq!(account.profile.tier, Tier::Gold);

        let reward = Reward {
            id: "rw_all".into(),
            name: "Everything".into(),
            required_tier: Tier::Gold,
            points_cost: 6_000,
        };
        account.redeem(&reward, &tiers).unwrap();
        assert_eq!(account.profile.available_points, 0);
        assert_eq!(account.profile.lifetime_points, 6_000);
        assert_eq!(account.profile.tier, Tier::Gold);
    }

    #[test]
    fn redemption_needs_the_tier() {
        let tiers = TierTable::default();
        let mut account = account_with(900);
        let reward = Reward {
            id: "rw_gold".into(),
            name: "Gold only".into(),
            required_tier: Tier::Gold,
            points_cost: 100,
        };
        assert!(matches!(
            account.redeem(&reward, &tiers),
            Err(LedgerError::TierTooLow { .. })
        ));
        assert_eq!(account.transactions.len(), 1);
    }

    #[test]
    fn achievement_grants_once() {
        let tiers = TierTable::default();
        let policy = EarnPolicy::default();
        let mut account = LoyaltyAccount::new("user_a".into(), &tiers);
        for n in 0..10 {
            account
                .record_deal_completion(&format!("deal_{n}"), dec!(0), &policy, &tiers)
                .unwrap();
        }
        assert_eq!(account.profile.deals_completed, 10);
        assert_eq!(account.profile.available_points, 1_000);

        let first = account
            .evaluate_achievements(&[ten_deals()], false, &tiers)
            .unwrap();
        let second = account
            .evaluate_achievements(&[ten_deals()], false, &tiers)
            .unwrap();

        assert_eq!(first, vec!["ach_ten".to_string()]);
        assert!(second.is_empty());
        assert_eq!(account.profile.available_points, 1_500);
        assert_eq!(account.profile.tier, Tier::Silver);
    }

    #[test]
    fn lapse_resets_current_streak_only() {
        let tiers = TierTable::default();
        let policy = EarnPolicy::default();
        let mut account = LoyaltyAccount::new("user_a".into(), &tiers);
        for n in 0..3 {
            account
                .record_deal_completion(&format!("deal_{n}"), dec!(5000), &policy, &tiers)
                .unwrap();
        }
        account.record_deal_lapse();
        account
            .record_deal_completion("deal_9", dec!(5000), &policy, &tiers)
            .unwrap();

        assert_eq!(account.profile.current_streak, 1);
        assert_eq!(account.profile.longest_streak, 3);
        assert_eq!(account.profile.total_volume, Amount(dec!(20000)));
    }

    #[test]
    fn referral_counts_toward_lifetime() {
        let tiers = TierTable::default();
        let mut account = LoyaltyAccount::new("user_a".into(), &tiers);
        account
            .record_referral("user_b", &EarnPolicy::default(), &tiers)
            .unwrap();
        assert_eq!(account.profile.lifetime_points, 250);
        assert_eq!(account.profile.next_tier_threshold, Some(1_000));
        assert_eq!(account.profile.tier_progress, 25);
    }
}
