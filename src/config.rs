use super::account::EarnPolicy;
use super::error::ConfigError;
use super::loyalty::TierTable;
use super::trust::{BadgeRules, TrustConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Every tunable constant of the engines. Missing sections fall back to the defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub trust: TrustConfig,
    pub tiers: TierTable,
    pub earning: EarnPolicy,
    pub badges: BadgeRules,
    pub log_level: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            trust: TrustConfig::default(),
            tiers: TierTable::default(),
            earning: EarnPolicy::default(),
            badges: BadgeRules::default(),
            log_level: "info".to_string(),
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.trust.validate()?;
        self.tiers.validate()?;
        self.earning.validate()?;
        Ok(())
    }
}
