use rust_decimal::Decimal;

use crate::lifecycle::DealStatus;

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum DealError {
    #[error("Deal is missing required field: {0}")]
    MissingField(&'static str),
    #[error("{0} must be greater than zero")]
    NonPositive(&'static str),
    #[error("Total value {given} does not equal volume x price ({expected})")]
    TotalValueMismatch { given: Decimal, expected: Decimal },
    #[error("Contract Date <= Injection Date <= Delivery Date failed")]
    InvalidDates,
    #[error("Deal cannot move from {from} to {to}")]
    InvalidTransition { from: DealStatus, to: DealStatus },
    #[error("Deal {0} was not found")]
    NotFound(String),
    #[error("Stored deal is corrupt: {0}")]
    Corrupt(String),
}

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum LedgerError {
    #[error("Insufficient points: {available} available, {requested} requested")]
    InsufficientPoints { available: i64, requested: i64 },
    #[error("Transaction points must be positive, got {0}")]
    InvalidAmount(i64),
    #[error("Tier {current} does not meet the {required} requirement of reward {reward}")]
    TierTooLow {
        reward: String,
        current: String,
        required: String,
    },
    #[error("Deal {0} has already been credited")]
    DealAlreadyCredited(String),
    #[error("Loyalty account {0} was not found")]
    UnknownAccount(String),
    #[error("Stored loyalty account is corrupt: {0}")]
    Corrupt(String),
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("Trust weights must sum to 1.0, got {0}")]
    WeightSum(f64),
    #[error("Trust weight {0} is negative or not finite")]
    InvalidWeight(&'static str),
    #[error("Normalization cap {0} must be greater than zero")]
    InvalidCap(&'static str),
    #[error("Tier thresholds must start at 0 and strictly increase")]
    TierOrder,
    #[error("Value per point must be greater than zero")]
    ValuePerPoint,
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config")]
    Parse(#[from] serde_json::Error),
}

#[derive(thiserror::Error, Debug)]
pub enum TelemetryError {
    #[error("invalid log level/filter '{value}'")]
    EnvFilter {
        value: String,
        #[source]
        source: tracing_subscriber::filter::ParseError,
    },
    #[error("failed to install subscriber: {0}")]
    Subscriber(Box<dyn std::error::Error + Send + Sync>),
}
