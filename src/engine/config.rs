//! Collateral manager configuration options.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

/// Protocol-wide settings shared by every market.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Smallest net collateral (after fees) a build may lock.
    pub min_collateral: Decimal,
    /// Maximum number of events to retain in memory.
    pub max_events: usize,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            min_collateral: dec!(0.0001),
            max_events: 100_000,
        }
    }
}

impl ManagerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_collateral <= Decimal::ZERO {
            return Err(ConfigError::InvalidManager {
                reason: "min_collateral must be positive".to_string(),
            });
        }
        if self.max_events == 0 {
            return Err(ConfigError::InvalidManager {
                reason: "max_events must be positive".to_string(),
            });
        }
        Ok(())
    }
}
