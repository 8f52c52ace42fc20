// 11.0: every committed state change produces an event. audit trail for builds, unwinds,
// liquidations and the two settlement folds. the EventPayload enum lists all event types.

use crate::types::{AccountId, Leverage, MarketId, PositionId, Quote, Side, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(pub u64);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub timestamp: Timestamp,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(id: EventId, timestamp: Timestamp, payload: EventPayload) -> Self {
        Self {
            id,
            timestamp,
            payload,
        }
    }

    pub fn market_id(&self) -> MarketId {
        match &self.payload {
            EventPayload::Build(e) => e.market_id,
            EventPayload::Unwind(e) => e.market_id,
            EventPayload::Liquidate(e) => e.market_id,
            EventPayload::Update(e) => e.market_id,
            EventPayload::Compound(e) => e.market_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    // Position events
    Build(BuildEvent),
    Unwind(UnwindEvent),
    Liquidate(LiquidateEvent),

    // Settlement events
    Update(UpdateEvent),
    Compound(CompoundEvent),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildEvent {
    pub market_id: MarketId,
    pub position_id: PositionId,
    pub owner: AccountId,
    pub side: Side,
    pub leverage: Leverage,
    pub collateral: Quote,
    pub fee: Quote,
    pub oi_adjusted: Decimal,
    pub debt: Quote,
    pub entry_price_index: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnwindEvent {
    pub market_id: MarketId,
    pub position_id: PositionId,
    pub owner: AccountId,
    pub shares: Decimal,
    pub notional: Decimal,
    pub frame: Decimal,
    pub payout: Quote,
    pub cost: Quote,
    /// Positive when minted, negative when burned.
    pub delta: Decimal,
    pub closed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidateEvent {
    pub market_id: MarketId,
    pub position_id: PositionId,
    pub liquidator: AccountId,
    pub value: Quote,
    pub threshold: Quote,
    pub reward: Quote,
    pub pot: Quote,
    pub delta: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateEvent {
    pub market_id: MarketId,
    pub queued_long: Decimal,
    pub queued_short: Decimal,
    pub shares_minted_long: Decimal,
    pub shares_minted_short: Decimal,
    pub positions_converted: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompoundEvent {
    pub market_id: MarketId,
    pub epochs: u64,
    pub payer: Option<Side>,
    pub paid: Decimal,
    pub burned: Decimal,
    pub oi_long: Decimal,
    pub oi_short: Decimal,
}
