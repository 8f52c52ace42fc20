// 8.0.2: result types and errors for collateral manager operations.

use crate::config::ConfigError;
use crate::token::LedgerError;
use crate::types::{AccountId, MarketId, PositionId, Quote};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildResult {
    pub position_id: PositionId,
    pub market_id: MarketId,
    /// Notional queued for the position. equal to the shares minted to the owner.
    pub oi_adjusted: Decimal,
    pub fee: Quote,
    /// Collateral locked after the fee.
    pub collateral: Quote,
    pub debt: Quote,
    pub entry_price_index: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnwindResult {
    pub position_id: PositionId,
    pub market_id: MarketId,
    pub shares: Decimal,
    pub notional: Decimal,
    pub frame: Decimal,
    pub payout: Quote,
    pub cost: Quote,
    pub minted: Quote,
    pub burned: Quote,
    /// No shares left, the position is terminal.
    pub closed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiquidationResult {
    pub position_id: PositionId,
    pub market_id: MarketId,
    pub liquidator: AccountId,
    pub value: Quote,
    pub threshold: Quote,
    pub reward: Quote,
    /// Value kept by the market's liquidation pot.
    pub pot: Quote,
    pub minted: Quote,
    pub burned: Quote,
}

#[derive(Debug, thiserror::Error)]
pub enum ManagerError {
    #[error("Market {0:?} not found")]
    MarketNotFound(MarketId),

    #[error("Leverage must be at least 1x")]
    InvalidLeverage,

    #[error("Leverage {requested}x exceeds max {max}x")]
    LeverageExceeded { requested: u8, max: u8 },

    #[error("Collateral {net} below minimum {minimum}")]
    CollateralBelowMinimum { net: Quote, minimum: Decimal },

    #[error("Open interest {requested} exceeds cap {cap}")]
    OpenInterestCapExceeded { requested: Decimal, cap: Decimal },

    #[error("Insufficient shares on position {position}: requested {requested}, available {available}")]
    InsufficientShares {
        position: PositionId,
        requested: Decimal,
        available: Decimal,
    },

    #[error("Position not liquidatable: value {value}, threshold {threshold}")]
    NotLiquidatable { value: Quote, threshold: Quote },

    #[error("No price point at index {index} for market {market:?}")]
    PriceUnavailable { market: MarketId, index: u64 },

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}
