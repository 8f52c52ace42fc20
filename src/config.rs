// 7.0 config.rs: per-market risk and settlement parameters, plus the top-level settings file.
// 7.1 MarketParams, 7.2 LoggingConfig, 7.3 Settings (toml).

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use crate::engine::ManagerConfig;
use crate::types::MarketId;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid market params: {reason}")]
    InvalidMarket { reason: String },
    #[error("invalid manager config: {reason}")]
    InvalidManager { reason: String },
    #[error("duplicate market id {0:?}")]
    DuplicateMarket(MarketId),
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Longest settlement period a market may configure, one year.
pub const MAX_PERIOD_SECS: u64 = 365 * 24 * 60 * 60;

// 7.1: one market's knobs. fractions are plain decimals, 0.0015 = 15 bps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketParams {
    pub leverage_max: u8,
    /// Cap on settled plus queued notional, per side.
    pub oi_cap: Decimal,
    /// Charged on gross collateral times leverage.
    pub fee_rate: Decimal,
    pub maintenance_margin_fraction: Decimal,
    /// Share of a liquidated position's value paid to the liquidator.
    pub maintenance_margin_reward_fraction: Decimal,
    pub update_period_secs: u64,
    pub compounding_period_secs: u64,
    /// Funding constant. the imbalance shrinks by (1 - 2k) per compounding period.
    pub k: Decimal,
    pub price_frame_cap: Decimal,
}

impl Default for MarketParams {
    fn default() -> Self {
        Self::weth_dai()
    }
}

impl MarketParams {
    // WETH/DAI market as deployed on the test network
    pub fn weth_dai() -> Self {
        Self {
            leverage_max: 100,
            oi_cap: dec!(800_000),
            fee_rate: dec!(0.0015),
            maintenance_margin_fraction: dec!(0.006),
            maintenance_margin_reward_fraction: dec!(0.5),
            update_period_secs: 100,
            compounding_period_secs: 600,
            k: dec!(0.000003293944666953),
            price_frame_cap: dec!(5),
        }
    }

    // no funding drift, handy when the exact numbers matter
    pub fn without_funding() -> Self {
        Self {
            k: Decimal::ZERO,
            ..Self::weth_dai()
        }
    }

    pub fn update_period_ms(&self) -> i64 {
        period_ms(self.update_period_secs)
    }

    pub fn compounding_period_ms(&self) -> i64 {
        period_ms(self.compounding_period_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: &str| -> Result<(), ConfigError> {
            Err(ConfigError::InvalidMarket {
                reason: reason.to_string(),
            })
        };

        if self.leverage_max == 0 {
            return invalid("leverage_max must be at least 1");
        }
        if self.oi_cap <= Decimal::ZERO {
            return invalid("oi_cap must be positive");
        }
        if self.fee_rate < Decimal::ZERO || self.fee_rate * Decimal::from(self.leverage_max) >= Decimal::ONE {
            return invalid("fee_rate times leverage_max must be in [0, 1)");
        }
        if self.maintenance_margin_fraction <= Decimal::ZERO
            || self.maintenance_margin_fraction * Decimal::from(self.leverage_max) >= Decimal::ONE
        {
            // a position at max leverage would start out liquidatable
            return invalid("maintenance margin times leverage_max must be in (0, 1)");
        }
        if self.maintenance_margin_reward_fraction < Decimal::ZERO
            || self.maintenance_margin_reward_fraction > Decimal::ONE
        {
            return invalid("reward fraction must be in [0, 1]");
        }
        if self.update_period_secs == 0 {
            return invalid("update period must be positive");
        }
        if self.compounding_period_secs < self.update_period_secs {
            return invalid("compounding period must not be shorter than the update period");
        }
        if self.compounding_period_secs > MAX_PERIOD_SECS {
            return invalid("compounding period must not exceed one year");
        }
        if self.k < Decimal::ZERO || self.k >= dec!(0.5) {
            return invalid("k must be in [0, 0.5)");
        }
        if self.price_frame_cap < Decimal::ONE {
            return invalid("price frame cap must be at least 1");
        }
        Ok(())
    }
}

// saturates instead of wrapping. validate() keeps real configs far below the limit.
fn period_ms(secs: u64) -> i64 {
    i64::try_from(secs)
        .ok()
        .and_then(|s| s.checked_mul(1000))
        .unwrap_or(i64::MAX)
}

// 7.2: tracing setup for the simulation binary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "pretty".into(),
        }
    }
}

impl LoggingConfig {
    /// RUST_LOG wins over the configured level.
    pub fn init(&self) {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.level));

        let builder = tracing_subscriber::fmt().with_env_filter(filter);
        let result = match self.format.as_str() {
            "compact" => builder.compact().try_init(),
            _ => builder.try_init(),
        };
        if result.is_err() {
            tracing::debug!("tracing subscriber already installed");
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSettings {
    pub id: u32,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub params: MarketParams,
}

// 7.3: everything the simulation reads from disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub manager: ManagerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub markets: Vec<MarketSettings>,
}

impl Settings {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let settings: Settings = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.manager.validate()?;
        let mut seen = std::collections::HashSet::new();
        for market in &self.markets {
            if !seen.insert(market.id) {
                return Err(ConfigError::DuplicateMarket(MarketId(market.id)));
            }
            market.params.validate()?;
        }
        Ok(())
    }
}
