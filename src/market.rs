//! Per-market state.
//!
//! Everything one market owns lives in a single `MarketState` behind the manager's per-market
//! lock: the open interest ledger, the fee bucket, the liquidation pot, the funding
//! accumulator and the index of positions still waiting in the queued bucket.

use crate::config::MarketParams;
use crate::funding::FundingAccumulator;
use crate::open_interest::{FoldReport, OpenInterestLedger};
use crate::price_feed::PriceFeed;
use crate::types::{MarketId, PositionId, Quote, Side, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug)]
pub struct MarketState {
    pub id: MarketId,
    pub name: String,
    pub params: MarketParams,
    pub feed: Arc<dyn PriceFeed>,
    pub oi: OpenInterestLedger,
    pub fee_bucket: Quote,
    pub liquidation_pot: Quote,
    pub funding: FundingAccumulator,
    queued_long: Vec<PositionId>,
    queued_short: Vec<PositionId>,
}

impl MarketState {
    pub fn new(
        id: MarketId,
        name: impl Into<String>,
        params: MarketParams,
        feed: Arc<dyn PriceFeed>,
        now: Timestamp,
    ) -> Self {
        let oi = OpenInterestLedger::new(
            params.update_period_ms(),
            params.compounding_period_ms(),
            params.k,
            now,
        );
        Self {
            id,
            name: name.into(),
            params,
            feed,
            oi,
            fee_bucket: Quote::zero(),
            liquidation_pot: Quote::zero(),
            funding: FundingAccumulator::new(),
            queued_long: Vec::new(),
            queued_short: Vec::new(),
        }
    }

    pub fn queued_positions(&self, side: Side) -> &[PositionId] {
        match side {
            Side::Long => &self.queued_long,
            Side::Short => &self.queued_short,
        }
    }

    pub fn track_queued(&mut self, side: Side, id: PositionId) {
        match side {
            Side::Long => self.queued_long.push(id),
            Side::Short => self.queued_short.push(id),
        }
    }

    /// Hands back the queued index for `side`, leaving it empty.
    pub fn take_queued(&mut self, side: Side) -> Vec<PositionId> {
        match side {
            Side::Long => std::mem::take(&mut self.queued_long),
            Side::Short => std::mem::take(&mut self.queued_short),
        }
    }

    /// Folds whatever windows have elapsed. the caller converts the queued positions.
    pub fn fold_if_due(&mut self, now: Timestamp) -> FoldReport {
        self.oi.fold_if_due(now)
    }

    pub fn snapshot(&self) -> MarketSnapshot {
        MarketSnapshot {
            id: self.id,
            oi_long: self.oi.long.oi,
            oi_short: self.oi.short.oi,
            oi_shares_long: self.oi.long.oi_shares,
            oi_shares_short: self.oi.short.oi_shares,
            queued_oi_long: self.oi.long.queued_oi,
            queued_oi_short: self.oi.short.queued_oi,
            fee_bucket: self.fee_bucket,
            liquidation_pot: self.liquidation_pot,
            brrrrd: self.funding.value(),
            last_update_fold: self.oi.last_update_fold,
            last_compound_fold: self.oi.last_compound_fold,
        }
    }
}

/// Read-only copy of a market's totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub id: MarketId,
    pub oi_long: Decimal,
    pub oi_short: Decimal,
    pub oi_shares_long: Decimal,
    pub oi_shares_short: Decimal,
    pub queued_oi_long: Decimal,
    pub queued_oi_short: Decimal,
    pub fee_bucket: Quote,
    pub liquidation_pot: Quote,
    pub brrrrd: Decimal,
    pub last_update_fold: Timestamp,
    pub last_compound_fold: Timestamp,
}

impl MarketSnapshot {
    pub fn oi(&self, side: Side) -> Decimal {
        match side {
            Side::Long => self.oi_long,
            Side::Short => self.oi_short,
        }
    }

    pub fn queued_oi(&self, side: Side) -> Decimal {
        match side {
            Side::Long => self.queued_oi_long,
            Side::Short => self.queued_oi_short,
        }
    }

    pub fn oi_shares(&self, side: Side) -> Decimal {
        match side {
            Side::Long => self.oi_shares_long,
            Side::Short => self.oi_shares_short,
        }
    }
}
