//! Service layer over the sled store
//!
//! The engines are pure; these services persist their inputs and outputs and
//! serialize writes per deal and per loyalty account through sled transactions.
use super::account::LoyaltyAccount;
use super::config::EngineConfig;
use super::deal::Deal;
use super::error::{DealError, LedgerError};
use super::ledger::LedgerBalance;
use super::lifecycle::{DealContext, DealStatus};
use super::rewards::{Achievement, Reward};
use rust_decimal::Decimal;
use sled::transaction::{
    ConflictableTransactionError, ConflictableTransactionResult, TransactionError,
};
use sled::{Batch, Tree};
use std::sync::Arc;
use tracing::{debug, info, warn};

const DEALS_TREE: &str = "deals";
const ACCOUNTS_TREE: &str = "loyalty_accounts";

fn corrupt<E: std::fmt::Display>(err: E) -> ConflictableTransactionError<LedgerError> {
    ConflictableTransactionError::Abort(LedgerError::Corrupt(err.to_string()))
}

pub struct DealService {
    deals: Tree,
}

impl DealService {
    pub fn new(instance: Arc<sled::Db>) -> anyhow::Result<Self> {
        let deals = instance.open_tree(DEALS_TREE)?;
        Ok(Self { deals })
    }

    /// Store a new deal as a draft owned by `owner`
    pub fn create_deal(&self, mut deal: Deal, owner: String) -> anyhow::Result<DealContext> {
        // Validate, fix the total value and serialize the details
        let (details_hash, details_cbor) = deal.validate_and_finalise()?;

        let context = DealContext::new(details_hash.clone(), owner)?;

        // Batch insert: deal details and deal context
        let mut batch = Batch::default();
        batch.insert(details_hash.as_bytes(), details_cbor);
        batch.insert(context.deal_id.as_bytes(), minicbor::to_vec(&context)?);
        self.deals.apply_batch(batch)?;

        info!(deal = %context.deal_id, owner = %context.owner, "deal created");
        Ok(context)
    }

    pub fn load_deal(&self, deal_id: &str) -> anyhow::Result<Option<DealContext>> {
        match self.deals.get(deal_id.as_bytes())? {
            Some(bytes) => Ok(Some(minicbor::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn load_details(&self, details_hash: &str) -> anyhow::Result<Option<Deal>> {
        match self.deals.get(details_hash.as_bytes())? {
            Some(bytes) => Ok(Some(minicbor::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Move a deal to `to`, checked against the transition table inside a
    /// transaction so concurrent updates cannot both apply.
    pub fn advance_deal(
        &self,
        deal_id: &str,
        to: DealStatus,
        changed_by: String,
        note: Option<String>,
    ) -> anyhow::Result<DealContext> {
        let outcome = self
            .deals
            .transaction(|tree| -> ConflictableTransactionResult<DealContext, DealError> {
                let bytes = tree.get(deal_id.as_bytes())?.ok_or_else(|| {
                    ConflictableTransactionError::Abort(DealError::NotFound(deal_id.to_string()))
                })?;
                let mut context: DealContext = minicbor::decode(&bytes).map_err(|err| {
                    ConflictableTransactionError::Abort(DealError::Corrupt(err.to_string()))
                })?;

                context
                    .advance(to, changed_by.clone(), note.clone())
                    .map_err(ConflictableTransactionError::Abort)?;

                let encoded = minicbor::to_vec(&context).map_err(|err| {
                    ConflictableTransactionError::Abort(DealError::Corrupt(err.to_string()))
                })?;
                tree.insert(deal_id.as_bytes(), encoded)?;
                Ok(context)
            });

        match outcome {
            Ok(context) => {
                info!(deal = %deal_id, status = %to, "deal advanced");
                Ok(context)
            }
            Err(TransactionError::Abort(err)) => {
                warn!(deal = %deal_id, status = %to, error = %err, "deal transition rejected");
                Err(err.into())
            }
            Err(TransactionError::Storage(err)) => Err(err.into()),
        }
    }

    /// Total value of a stored deal, as fixed when it was created.
    pub fn deal_value(&self, context: &DealContext) -> anyhow::Result<Decimal> {
        let details = self
            .load_details(&context.details_hash)?
            .ok_or_else(|| DealError::NotFound(context.deal_id.clone()))?;
        Ok(details.total_value().unwrap_or(Decimal::ZERO))
    }
}

pub struct LoyaltyService {
    accounts: Tree,
    config: EngineConfig,
}

impl LoyaltyService {
    pub fn new(instance: Arc<sled::Db>, config: EngineConfig) -> anyhow::Result<Self> {
        let accounts = instance.open_tree(ACCOUNTS_TREE)?;
        Ok(Self { accounts, config })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// `None` when the user has no loyalty activity yet. Callers decide what
    /// to show in that case, no sample data is substituted here.
    pub fn load_account(&self, user_id: &str) -> anyhow::Result<Option<LoyaltyAccount>> {
        match self.accounts.get(user_id.as_bytes())? {
            Some(bytes) => Ok(Some(minicbor::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Run `op` against the user's account inside a sled transaction. The
    /// account is created on first activity and only written back if `op`
    /// succeeds.
    fn update_account<T, F>(&self, user_id: &str, op: F) -> anyhow::Result<T>
    where
        F: Fn(&mut LoyaltyAccount) -> Result<T, LedgerError>,
    {
        let tiers = &self.config.tiers;
        let outcome = self
            .accounts
            .transaction(|tree| -> ConflictableTransactionResult<T, LedgerError> {
                let mut account = match tree.get(user_id.as_bytes())? {
                    Some(bytes) => minicbor::decode::<LoyaltyAccount>(&bytes).map_err(corrupt)?,
                    None => LoyaltyAccount::new(user_id.to_string(), tiers),
                };

                let value = op(&mut account).map_err(ConflictableTransactionError::Abort)?;

                let encoded = minicbor::to_vec(&account).map_err(corrupt)?;
                tree.insert(user_id.as_bytes(), encoded)?;
                Ok(value)
            });

        match outcome {
            Ok(value) => Ok(value),
            Err(TransactionError::Abort(err)) => {
                warn!(user = %user_id, error = %err, "loyalty update rejected");
                Err(err.into())
            }
            Err(TransactionError::Storage(err)) => Err(err.into()),
        }
    }

    pub fn record_deal_completion(
        &self,
        user_id: &str,
        deal_id: &str,
        total_value: Decimal,
    ) -> anyhow::Result<LedgerBalance> {
        let balance = self.update_account(user_id, |account| {
            account.record_deal_completion(
                deal_id,
                total_value,
                &self.config.earning,
                &self.config.tiers,
            )
        })?;
        info!(user = %user_id, deal = %deal_id, available = balance.available_points, "deal points credited");
        Ok(balance)
    }

    pub fn record_deal_lapse(&self, user_id: &str) -> anyhow::Result<()> {
        self.update_account(user_id, |account| {
            account.record_deal_lapse();
            Ok(())
        })
    }

    pub fn record_referral(&self, user_id: &str, referred_user: &str) -> anyhow::Result<LedgerBalance> {
        self.update_account(user_id, |account| {
            account.record_referral(referred_user, &self.config.earning, &self.config.tiers)
        })
    }

    pub fn redeem(&self, user_id: &str, reward: &Reward) -> anyhow::Result<LedgerBalance> {
        let balance = self.update_account(user_id, |account| {
            account.redeem(reward, &self.config.tiers)
        })?;
        info!(user = %user_id, reward = %reward.id, available = balance.available_points, "reward redeemed");
        Ok(balance)
    }

    pub fn evaluate_achievements(
        &self,
        user_id: &str,
        achievements: &[Achievement],
        is_verified: bool,
    ) -> anyhow::Result<Vec<String>> {
        let unlocked = self.update_account(user_id, |account| {
            account.evaluate_achievements(achievements, is_verified, &self.config.tiers)
        })?;
        if !unlocked.is_empty() {
            debug!(user = %user_id, ?unlocked, "achievements unlocked");
        }
        Ok(unlocked)
    }
}
