pub mod account;
pub mod config;
pub mod counterparty;
pub mod deal;
pub mod error;
pub mod ledger;
pub mod lifecycle;
pub mod loyalty;
pub mod rewards;
pub mod service;
pub mod telemetry;
pub mod trust;
pub mod utils;
