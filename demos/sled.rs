//! Walks one deal through its lifecycle against a throwaway sled store,
//! credits the owner's loyalty account and scores the counterparty.
//!
//! Pass a path to a JSON engine config as the first argument to override the defaults.

use deal_scoring::{
    config::EngineConfig,
    counterparty::{Counterparty, DealOutcome},
    deal::{Deal, TimeStamp},
    lifecycle::DealStatus,
    loyalty::Tier,
    rewards::{Achievement, Requirement, Reward},
    service::{DealService, LoyaltyService},
    telemetry, utils,
};
use rust_decimal::Decimal;
use std::sync::Arc;

fn main() -> anyhow::Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    telemetry::init(&config.log_level)?;

    let temp_dir = tempfile::tempdir()?;
    let db = Arc::new(sled::open(temp_dir.path().join("demo.db"))?);
    let deals = DealService::new(db.clone())?;
    let loyalty = LoyaltyService::new(db, config.clone())?;

    let owner = utils::new_uuid_to_bech32("user_")?;
    let deal = Deal::new()
        .set_commodity("natural gas")
        .set_buyer("Harbour Gas")
        .set_seller("Baltic Pipeline AG")
        .set_volume(Decimal::from(120_000))
        .set_price_per_unit(Decimal::new(3125, 2))
        .set_contract_date(TimeStamp::new_with(2024, 9, 1, 0, 0, 0))
        .set_injection_date(TimeStamp::new_with(2024, 9, 15, 0, 0, 0))
        .set_delivery_date(TimeStamp::new_with(2024, 10, 1, 0, 0, 0));

    let mut ctx = deals.create_deal(deal, owner.clone())?;
    for status in &DealStatus::HAPPY_PATH[1..] {
        ctx = deals.advance_deal(&ctx.deal_id, *status, owner.clone(), None)?;
        println!("{:<22} {:>3}%", status, ctx.progress());
    }

    let value = deals.deal_value(&ctx)?;
    let balance = loyalty.record_deal_completion(&owner, &ctx.deal_id, value)?;
    println!("deal value {value}, available points {}", balance.available_points);

    let first_deal = Achievement {
        id: "ach_first".into(),
        name: "First deal".into(),
        requirement: Requirement::DealsCompleted(1),
        points_reward: 250,
    };
    loyalty.evaluate_achievements(&owner, &[first_deal], false)?;

    let reward = Reward {
        id: "rw_report".into(),
        name: "Market report".into(),
        required_tier: Tier::Silver,
        points_cost: 1_000,
    };
    if let Err(err) = loyalty.redeem(&owner, &reward) {
        println!("redeem {}: {err}", reward.name);
    }

    if let Some(account) = loyalty.load_account(&owner)? {
        let profile = account.profile;
        println!(
            "tier {} ({}% to next), lifetime {}, available {}",
            profile.tier, profile.tier_progress, profile.lifetime_points, profile.available_points
        );
    }

    let mut counterparty = Counterparty::new("Baltic Pipeline AG");
    counterparty.record_deal(
        DealOutcome {
            completed: true,
            on_time: true,
            quality_ok: true,
            paid_on_time: true,
            value,
        },
        &config.trust,
    );
    counterparty.refresh_badges(value, 2024, &config.badges);
    let score = counterparty.recompute_trust_score(&config.trust);
    println!(
        "{} trust {score:.1} ({})",
        counterparty.company_name,
        counterparty.trust_level()
    );

    Ok(())
}
