//! Liquidation of positions below maintenance margin, and the read-side valuation helpers.

use super::core::CollateralManager;
use super::results::{LiquidationResult, ManagerError};
use super::unwind::value_shares;
use crate::events::{EventPayload, LiquidateEvent};
use crate::liquidation::{maintenance_threshold, split_liquidation};
use crate::position::{Position, Valuation};
use crate::types::{AccountId, MarketId, PositionId};
use rust_decimal::Decimal;
use tracing::{debug, warn};

impl CollateralManager {
    /// Seizes a position whose value fell below maintenance margin. `recipient` gets the reward.
    pub fn liquidate(
        &self,
        position_id: PositionId,
        recipient: AccountId,
    ) -> Result<LiquidationResult, ManagerError> {
        let now = self.now();
        let not_found = ManagerError::InsufficientShares {
            position: position_id,
            requested: Decimal::ZERO,
            available: Decimal::ZERO,
        };
        let market_id = self
            .registry
            .read()
            .get(position_id)
            .map(|p| p.market_id)
            .ok_or(not_found)?;

        let mut market = self.lock_market(market_id)?;
        self.settle_if_due(&mut market, now);

        let mut registry = self.registry.write();
        let position = match registry.get(position_id) {
            Some(p) if !p.is_terminal() => p.clone(),
            _ => {
                return Err(ManagerError::InsufficientShares {
                    position: position_id,
                    requested: Decimal::ZERO,
                    available: Decimal::ZERO,
                })
            }
        };

        // 8.5.1: all remaining shares against maintenance on the outstanding notional
        let valuation = value_shares(&market, &position, position.oi_shares)?;
        let threshold = maintenance_threshold(
            position.original_oi(),
            market.params.maintenance_margin_fraction,
        );
        if valuation.value >= threshold {
            return Err(ManagerError::NotLiquidatable {
                value: valuation.value,
                threshold,
            });
        }

        // 8.5.2: settle against cost, pay the liquidator, keep the rest in the pot
        let split = split_liquidation(
            valuation.value,
            market.params.maintenance_margin_reward_fraction,
        );
        let (minted, burned) = self.settle_and_pay(&mut market, &valuation, recipient, split.reward)?;
        market.liquidation_pot = market.liquidation_pot.add(split.pot);

        market.oi.remove(
            position.side,
            position.bucket(),
            valuation.notional,
            valuation.shares,
        );
        let wiped = registry.close(position_id);
        drop(registry);

        warn!(
            market = ?market_id,
            position = %position_id,
            liquidator = recipient.0,
            value = %valuation.value,
            %threshold,
            reward = %split.reward,
            pot = %split.pot,
            holders = wiped.len(),
            "liquidated"
        );

        self.emit_event(
            now,
            EventPayload::Liquidate(LiquidateEvent {
                market_id,
                position_id,
                liquidator: recipient,
                value: valuation.value,
                threshold,
                reward: split.reward,
                pot: split.pot,
                delta: valuation.delta(),
            }),
        );

        Ok(LiquidationResult {
            position_id,
            market_id,
            liquidator: recipient,
            value: valuation.value,
            threshold,
            reward: split.reward,
            pot: split.pot,
            minted,
            burned,
        })
    }

    /// Current value of every remaining share of a position. folds due windows first.
    pub fn position_value(&self, position_id: PositionId) -> Result<Valuation, ManagerError> {
        let now = self.now();
        let (market_id, _) = self.live_position(position_id)?;
        let mut market = self.lock_market(market_id)?;
        self.settle_if_due(&mut market, now);

        let position = self.live_position(position_id)?.1;
        value_shares(&market, &position, position.oi_shares)
    }

    pub fn is_liquidatable(&self, position_id: PositionId) -> Result<bool, ManagerError> {
        let valuation = self.position_value(position_id)?;
        let position = self.live_position(position_id)?.1;
        let params = self.market_params(position.market_id)?;
        let threshold =
            maintenance_threshold(position.original_oi(), params.maintenance_margin_fraction);
        debug!(position = %position_id, value = %valuation.value, %threshold, "liquidation check");
        Ok(valuation.value < threshold)
    }

    fn live_position(&self, position_id: PositionId) -> Result<(MarketId, Position), ManagerError> {
        match self.registry.read().get(position_id) {
            Some(p) if !p.is_terminal() => Ok((p.market_id, p.clone())),
            _ => Err(ManagerError::InsufficientShares {
                position: position_id,
                requested: Decimal::ZERO,
                available: Decimal::ZERO,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::engine::test_support::{fixture, price, CUSTODY, MARKET, OTHER, TRADER};
    use crate::engine::ManagerError;
    use crate::token::LedgerError;
    use crate::types::{Quote, Side};
    use rust_decimal_macros::dec;

    #[test]
    fn healthy_position_is_not_liquidatable() {
        let f = fixture();
        let built = f.manager.build(MARKET, TRADER, Quote::new(dec!(10)), 5, Side::Long).unwrap();
        assert!(!f.manager.is_liquidatable(built.position_id).unwrap());

        let err = f.manager.liquidate(built.position_id, OTHER).unwrap_err();
        assert!(matches!(err, ManagerError::NotLiquidatable { .. }));
    }

    #[test]
    fn liquidation_pays_reward_and_fills_pot() {
        let f = fixture();
        let built = f.manager.build(MARKET, TRADER, Quote::new(dec!(10)), 5, Side::Long).unwrap();
        f.feed.push(price(dec!(100)));
        f.feed.push(price(dec!(80.2)));

        assert!(f.manager.is_liquidatable(built.position_id).unwrap());
        let result = f.manager.liquidate(built.position_id, OTHER).unwrap();

        // 49.625 * 0.802 - 39.7
        assert_eq!(result.value.value(), dec!(0.09925));
        assert_eq!(result.threshold.value(), dec!(0.29775));
        assert_eq!(result.reward.value(), dec!(0.049625));
        assert_eq!(result.pot.value(), dec!(0.049625));
        assert_eq!(result.burned.value(), dec!(9.82575));

        assert_eq!(f.token.balance_of(OTHER).value(), dec!(0.049625));
        assert_eq!(f.manager.liquidation_pot().value(), dec!(0.049625));
        assert_eq!(f.manager.funding_accumulator(), dec!(-9.82575));
        assert!(f.manager.shares_of(TRADER, built.position_id).is_zero());
    }

    #[test]
    fn liquidated_position_is_terminal() {
        let f = fixture();
        let built = f.manager.build(MARKET, TRADER, Quote::new(dec!(10)), 5, Side::Long).unwrap();
        f.feed.push(price(dec!(100)));
        f.feed.push(price(dec!(80.2)));
        f.manager.liquidate(built.position_id, OTHER).unwrap();

        let err = f.manager.unwind(TRADER, built.position_id, dec!(1)).unwrap_err();
        assert!(matches!(err, ManagerError::InsufficientShares { .. }));
        let err = f.manager.liquidate(built.position_id, OTHER).unwrap_err();
        assert!(matches!(err, ManagerError::InsufficientShares { .. }));

        let snap = f.manager.market_oi(MARKET).unwrap();
        assert!(snap.queued_oi(Side::Long).is_zero());
    }

    #[test]
    fn failed_reward_payout_reverses_the_burn() {
        let f = fixture();
        let built = f.manager.build(MARKET, TRADER, Quote::new(dec!(10)), 5, Side::Long).unwrap();
        f.feed.push(price(dec!(100)));
        f.feed.push(price(dec!(80.2)));

        // 9.84 left covers the 9.82575 burn but not the 0.049625 reward
        f.token.transfer(CUSTODY, OTHER, Quote::new(dec!(0.16))).unwrap();
        let supply = f.token.total_supply();

        let err = f.manager.liquidate(built.position_id, OTHER).unwrap_err();
        assert!(matches!(
            err,
            ManagerError::Ledger(LedgerError::InsufficientBalance { .. })
        ));

        assert_eq!(f.token.total_supply(), supply);
        assert_eq!(f.custody.held().value(), dec!(9.84));
        assert!(f.manager.funding_accumulator().is_zero());
        assert!(f.manager.liquidation_pot().is_zero());
        assert_eq!(f.manager.shares_of(TRADER, built.position_id), dec!(49.625));
    }
}
