// 8.0 engine/core.rs: the collateral manager. holds every market, the position registry and
// the event log. lock order is always market -> registry -> events.

use super::config::ManagerConfig;
use super::results::ManagerError;
use crate::clock::Clock;
use crate::config::{ConfigError, MarketParams};
use crate::custody::BalanceLedger;
use crate::events::{Event, EventId, EventPayload};
use crate::market::{MarketSnapshot, MarketState};
use crate::position::{Position, PositionRegistry};
use crate::price_feed::PriceFeed;
use crate::types::{AccountId, MarketId, PositionId, Quote, Timestamp};
use parking_lot::{Mutex, MutexGuard, RwLock};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Default)]
pub(super) struct EventLog {
    events: Vec<Event>,
    next_id: u64,
}

/** 8.1: main manager struct. markets are locked one at a time, each for a whole call */
#[derive(Debug)]
pub struct CollateralManager {
    pub(super) config: ManagerConfig,
    pub(super) ledger: Arc<dyn BalanceLedger>,
    pub(super) clock: Arc<dyn Clock>,
    pub(super) markets: HashMap<MarketId, Mutex<MarketState>>,
    pub(super) registry: RwLock<PositionRegistry>,
    pub(super) events: Mutex<EventLog>,
}

impl CollateralManager {
    pub fn new(
        config: ManagerConfig,
        ledger: Arc<dyn BalanceLedger>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ManagerError> {
        config.validate()?;
        Ok(Self {
            config,
            ledger,
            clock,
            markets: HashMap::new(),
            registry: RwLock::new(PositionRegistry::new()),
            events: Mutex::new(EventLog {
                events: Vec::new(),
                next_id: 1,
            }),
        })
    }

    pub fn add_market(
        &mut self,
        market_id: MarketId,
        name: impl Into<String>,
        params: MarketParams,
        feed: Arc<dyn PriceFeed>,
    ) -> Result<MarketId, ManagerError> {
        params.validate()?;
        if self.markets.contains_key(&market_id) {
            return Err(ConfigError::DuplicateMarket(market_id).into());
        }

        let name = name.into();
        info!(market = ?market_id, %name, leverage_max = params.leverage_max, oi_cap = %params.oi_cap, "market added");

        let state = MarketState::new(market_id, name, params, feed, self.clock.now());
        self.markets.insert(market_id, Mutex::new(state));
        Ok(market_id)
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Account the balance ledger keeps custody in.
    pub fn custody_account(&self) -> AccountId {
        self.ledger.custodian()
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    pub fn market_ids(&self) -> Vec<MarketId> {
        let mut ids: Vec<MarketId> = self.markets.keys().copied().collect();
        ids.sort();
        ids
    }

    pub(super) fn lock_market(&self, market_id: MarketId) -> Result<MutexGuard<'_, MarketState>, ManagerError> {
        self.markets
            .get(&market_id)
            .map(|m| m.lock())
            .ok_or(ManagerError::MarketNotFound(market_id))
    }

    // 8.2: read operations

    pub fn position_info(&self, position_id: PositionId) -> Option<Position> {
        self.registry.read().get(position_id).cloned()
    }

    pub fn shares_of(&self, owner: AccountId, position_id: PositionId) -> Decimal {
        self.registry.read().balance_of(owner, position_id)
    }

    pub fn position_count(&self) -> usize {
        self.registry.read().len()
    }

    pub fn market_oi(&self, market_id: MarketId) -> Result<MarketSnapshot, ManagerError> {
        Ok(self.lock_market(market_id)?.snapshot())
    }

    pub fn market_params(&self, market_id: MarketId) -> Result<MarketParams, ManagerError> {
        Ok(self.lock_market(market_id)?.params.clone())
    }

    pub fn price_point_current_index(&self, market_id: MarketId) -> Result<u64, ManagerError> {
        Ok(self.lock_market(market_id)?.feed.current_index())
    }

    pub fn market_fee_bucket(&self, market_id: MarketId) -> Result<Quote, ManagerError> {
        Ok(self.lock_market(market_id)?.fee_bucket)
    }

    pub fn market_liquidation_pot(&self, market_id: MarketId) -> Result<Quote, ManagerError> {
        Ok(self.lock_market(market_id)?.liquidation_pot)
    }

    pub fn market_funding_accumulator(&self, market_id: MarketId) -> Result<Decimal, ManagerError> {
        Ok(self.lock_market(market_id)?.funding.value())
    }

    pub fn fee_bucket(&self) -> Quote {
        self.markets.values().map(|m| m.lock().fee_bucket).sum()
    }

    pub fn liquidation_pot(&self) -> Quote {
        self.markets.values().map(|m| m.lock().liquidation_pot).sum()
    }

    /// brrrrd summed over every market. positive = net minted.
    pub fn funding_accumulator(&self) -> Decimal {
        self.markets.values().map(|m| m.lock().funding.value()).sum()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().events.clone()
    }

    pub fn recent_events(&self, count: usize) -> Vec<Event> {
        let log = self.events.lock();
        let start = log.events.len().saturating_sub(count);
        log.events[start..].to_vec()
    }

    pub(super) fn emit_event(&self, timestamp: Timestamp, payload: EventPayload) {
        let mut log = self.events.lock();
        let event = Event::new(EventId(log.next_id), timestamp, payload);
        log.next_id += 1;

        tracing::trace!(id = event.id.0, payload = ?event.payload, "event");

        log.events.push(event);

        if log.events.len() > self.config.max_events {
            let drain_count = log.events.len() - self.config.max_events;
            log.events.drain(0..drain_count);
        }
    }
}
