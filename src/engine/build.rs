//! Building positions.

use super::core::CollateralManager;
use super::results::{BuildResult, ManagerError};
use crate::events::{BuildEvent, EventPayload};
use crate::position::Position;
use crate::types::{AccountId, Leverage, MarketId, Quote, Side};
use rust_decimal::Decimal;
use tracing::{debug, info};

impl CollateralManager {
    /// Locks `collateral` from `owner` and opens a leveraged position on `side`.
    ///
    /// The fee is charged on collateral times leverage and stays in custody. The rest is the
    /// position's cost; leverage on top of it is debt. New notional waits in the queued bucket
    /// until the next update fold.
    pub fn build(
        &self,
        market_id: MarketId,
        owner: AccountId,
        collateral: Quote,
        leverage: u8,
        side: Side,
    ) -> Result<BuildResult, ManagerError> {
        let now = self.now();
        let mut market = self.lock_market(market_id)?;
        self.settle_if_due(&mut market, now);

        // 8.3.1: leverage
        let leverage = Leverage::new(leverage).ok_or(ManagerError::InvalidLeverage)?;
        if leverage.value() > market.params.leverage_max {
            return Err(ManagerError::LeverageExceeded {
                requested: leverage.value(),
                max: market.params.leverage_max,
            });
        }

        // 8.3.2: fee and net collateral
        let fee = collateral.mul(leverage.as_decimal() * market.params.fee_rate);
        let net = collateral.saturating_sub(fee);
        if net.value() < self.config.min_collateral {
            return Err(ManagerError::CollateralBelowMinimum {
                net,
                minimum: self.config.min_collateral,
            });
        }

        // 8.3.3: cap on settled plus queued exposure. notional past Decimal range is over any cap
        let cap = market.params.oi_cap;
        let oi_adjusted = net
            .value()
            .checked_mul(leverage.as_decimal())
            .ok_or(ManagerError::OpenInterestCapExceeded {
                requested: Decimal::MAX,
                cap,
            })?;
        let requested = market
            .oi
            .side(side)
            .exposure()
            .checked_add(oi_adjusted)
            .unwrap_or(Decimal::MAX);
        if requested > cap {
            return Err(ManagerError::OpenInterestCapExceeded { requested, cap });
        }

        // 8.3.4: escrow is the only step that can fail from here on
        let entry_price_index = market.feed.current_index();
        self.ledger.escrow(owner, collateral)?;

        market.fee_bucket = market.fee_bucket.add(fee);
        market.oi.queue(side, oi_adjusted);

        let position = Position::new(market_id, side, leverage, entry_price_index, oi_adjusted, net, now);
        let debt = position.debt;
        let position_id = self.registry.write().open(position, owner);
        market.track_queued(side, position_id);

        info!(
            market = ?market_id,
            position = %position_id,
            owner = owner.0,
            ?side,
            %leverage,
            %collateral,
            %fee,
            %oi_adjusted,
            "build"
        );
        debug!(queued_oi = %market.oi.side(side).queued_oi, fee_bucket = %market.fee_bucket, "market after build");

        self.emit_event(
            now,
            EventPayload::Build(BuildEvent {
                market_id,
                position_id,
                owner,
                side,
                leverage,
                collateral,
                fee,
                oi_adjusted,
                debt,
                entry_price_index,
            }),
        );

        Ok(BuildResult {
            position_id,
            market_id,
            oi_adjusted,
            fee,
            collateral: net,
            debt,
            entry_price_index,
        })
    }
}
