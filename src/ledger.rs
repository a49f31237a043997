//! Append-only loyalty ledger
//!
//! Balances are never stored on their own, they are a fold over the log.
use super::deal::TimeStamp;
use super::error::LedgerError;
use chrono::Utc;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, minicbor::Encode, minicbor::Decode)]
pub enum TransactionKind {
    #[n(0)]
    Earn,
    #[n(1)]
    Redeem,
    #[n(2)]
    Bonus,
    #[n(3)]
    Referral,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Earn => "earn",
            TransactionKind::Redeem => "redeem",
            TransactionKind::Bonus => "bonus",
            TransactionKind::Referral => "referral",
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, PartialEq, Eq, minicbor::Encode, minicbor::Decode, Clone)]
pub struct LoyaltyTransaction {
    #[n(0)]
    pub points: i64, // negative for redemptions
    #[n(1)]
    pub kind: TransactionKind,
    #[n(2)]
    pub description: String,
    #[n(3)]
    pub deal_id: Option<String>,
    #[n(4)]
    pub created_at: TimeStamp<Utc>,
}

impl LoyaltyTransaction {
    /// `points` is the magnitude, redemptions are stored negated.
    pub fn new(
        kind: TransactionKind,
        points: i64,
        description: String,
        deal_id: Option<String>,
    ) -> Result<Self, LedgerError> {
        if points <= 0 {
            return Err(LedgerError::InvalidAmount(points));
        }
        let points = match kind {
            TransactionKind::Redeem => -points,
            _ => points,
        };

        Ok(Self {
            points,
            kind,
            description,
            deal_id,
            created_at: TimeStamp::new(),
        })
    }

    pub fn earn(points: i64, description: String, deal_id: Option<String>) -> Result<Self, LedgerError> {
        Self::new(TransactionKind::Earn, points, description, deal_id)
    }

    pub fn redeem(points: i64, description: String) -> Result<Self, LedgerError> {
        Self::new(TransactionKind::Redeem, points, description, None)
    }

    pub fn bonus(points: i64, description: String) -> Result<Self, LedgerError> {
        Self::new(TransactionKind::Bonus, points, description, None)
    }

    pub fn referral(points: i64, description: String) -> Result<Self, LedgerError> {
        Self::new(TransactionKind::Referral, points, description, None)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedgerBalance {
    /// Sum of every positive entry, redemptions never lower it.
    pub lifetime_points: i64,
    /// Spendable balance, never below zero.
    pub available_points: i64,
    /// Signed sum of every entry.
    pub net_points: i64,
}

impl LedgerBalance {
    pub fn fold(transactions: &[LoyaltyTransaction]) -> Self {
        let (lifetime_points, net_points) =
            transactions
                .iter()
                .fold((0i64, 0i64), |(lifetime, net), tx| {
                    let lifetime = if tx.points > 0 {
                        lifetime.saturating_add(tx.points)
                    } else {
                        lifetime
                    };
                    (lifetime, net.saturating_add(tx.points))
                });

        Self {
            lifetime_points,
            available_points: net_points.max(0),
            net_points,
        }
    }

    /// Reject a debit the balance cannot cover instead of clamping it.
    pub fn check_debit(&self, points: i64) -> Result<(), LedgerError> {
        if points > self.available_points {
            return Err(LedgerError::InsufficientPoints {
                available: self.available_points,
                requested: points,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redemptions_are_negated() {
        let tx = LoyaltyTransaction::redeem(300, "gift card".into()).unwrap();
        assert_eq!(tx.points, -300);
        assert_eq!(tx.kind, TransactionKind::Redeem);
    }

    #[test]
    fn zero_and_negative_amounts_are_rejected() {
        assert_eq!(
            LoyaltyTransaction::earn(0, "nothing".into(), None),
            Err(LedgerError::InvalidAmount(0))
        );
        assert!(LoyaltyTransaction::bonus(-5, "oops".into()).is_err());
    }

    #[test]
    fn fold_separates_lifetime_from_available() {
        let log = vec![
            LoyaltyTransaction::earn(1_200, "deal".into(), Some("deal_1".into())).unwrap(),
            LoyaltyTransaction::redeem(1_000, "reward".into()).unwrap(),
            LoyaltyTransaction::bonus(500, "achievement".into()).unwrap(),
        ];
        let balance = LedgerBalance::fold(&log);
        assert_eq!(balance.lifetime_points, 1_700);
        assert_eq!(balance.available_points, 700);
        assert_eq!(balance.net_points, 700);
    }

    #[test]
    fn fold_clamps_an_overdrawn_log() {
        let log = vec![
            LoyaltyTransaction::earn(100, "deal".into(), None).unwrap(),
            LoyaltyTransaction::redeem(400, "imported".into()).unwrap(),
        ];
        let balance = LedgerBalance::fold(&log);
        assert_eq!(balance.available_points, 0);
        assert_eq!(balance.net_points, -300);
    }

    #[test]
    fn empty_log_is_zero() {
        assert_eq!(LedgerBalance::fold(&[]), LedgerBalance::default());
    }

    #[test]
    fn debit_check_reports_shortfall() {
        let balance = LedgerBalance {
            lifetime_points: 500,
            available_points: 500,
            net_points: 500,
        };
        assert_eq!(
            balance.check_debit(1_000),
            Err(LedgerError::InsufficientPoints {
                available: 500,
                requested: 1_000
            })
        );
        assert!(balance.check_debit(500).is_ok());
    }
}
