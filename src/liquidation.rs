//! Liquidation conditions and the reward/pot split.
//!
//! A position can be liquidated once its value drops below the maintenance margin on the
//! notional it was built with. The liquidator keeps a fixed fraction of whatever value is
//! left; the remainder stays in custody as the market's liquidation pot.

use crate::types::Quote;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Value below which a position with `original_oi` outstanding can be liquidated.
pub fn maintenance_threshold(original_oi: Quote, maintenance_margin_fraction: Decimal) -> Quote {
    original_oi.mul(maintenance_margin_fraction)
}

pub fn is_liquidatable(value: Quote, original_oi: Quote, maintenance_margin_fraction: Decimal) -> bool {
    value < maintenance_threshold(original_oi, maintenance_margin_fraction)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidationSplit {
    pub reward: Quote,
    pub pot: Quote,
}

// reward rounds down, the pot takes the dust
pub fn split_liquidation(value: Quote, reward_fraction: Decimal) -> LiquidationSplit {
    let reward = value.mul(reward_fraction).min(value);
    LiquidationSplit {
        reward,
        pot: value.saturating_sub(reward),
    }
}
