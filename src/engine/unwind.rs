//! Unwinding positions, and the valuation and mint/burn settlement shared with liquidation.

use super::core::CollateralManager;
use super::results::{ManagerError, UnwindResult};
use crate::events::{EventPayload, UnwindEvent};
use crate::market::MarketState;
use crate::position::{value_position, Position, Valuation};
use crate::price_feed::price_frame;
use crate::types::{AccountId, PositionId, Quote};
use rust_decimal::Decimal;
use tracing::{error, info};

impl CollateralManager {
    /// Closes `shares` of a position held by `owner` and pays out their value.
    pub fn unwind(
        &self,
        owner: AccountId,
        position_id: PositionId,
        shares: Decimal,
    ) -> Result<UnwindResult, ManagerError> {
        let now = self.now();
        let market_id = self
            .registry
            .read()
            .get(position_id)
            .map(|p| p.market_id)
            .ok_or(ManagerError::InsufficientShares {
                position: position_id,
                requested: shares,
                available: Decimal::ZERO,
            })?;

        let mut market = self.lock_market(market_id)?;
        self.settle_if_due(&mut market, now);

        let mut registry = self.registry.write();
        let position = registry
            .get(position_id)
            .cloned()
            .ok_or(ManagerError::InsufficientShares {
                position: position_id,
                requested: shares,
                available: Decimal::ZERO,
            })?;

        // 8.4.1: shares must be live on the position and held by the owner
        let held = registry.balance_of(owner, position_id);
        let available = held.min(position.oi_shares);
        if shares <= Decimal::ZERO || shares > available {
            return Err(ManagerError::InsufficientShares {
                position: position_id,
                requested: shares,
                available,
            });
        }

        // 8.4.2: value against the bucket the shares live in
        let valuation = value_shares(&market, &position, shares)?;

        // 8.4.3: ledger first, it is the only fallible step
        let (minted, burned) = self.settle_and_pay(&mut market, &valuation, owner, valuation.value)?;

        market
            .oi
            .remove(position.side, position.bucket(), valuation.notional, shares);
        registry.reduce(position_id, owner, shares, valuation.debt, valuation.cost);
        let closed = registry
            .get(position_id)
            .map(Position::is_terminal)
            .unwrap_or(true);
        drop(registry);

        info!(
            market = ?market_id,
            position = %position_id,
            owner = owner.0,
            %shares,
            frame = %valuation.frame,
            payout = %valuation.value,
            %minted,
            %burned,
            closed,
            "unwind"
        );

        self.emit_event(
            now,
            EventPayload::Unwind(UnwindEvent {
                market_id,
                position_id,
                owner,
                shares,
                notional: valuation.notional,
                frame: valuation.frame,
                payout: valuation.value,
                cost: valuation.cost,
                delta: valuation.delta(),
                closed,
            }),
        );

        Ok(UnwindResult {
            position_id,
            market_id,
            shares,
            notional: valuation.notional,
            frame: valuation.frame,
            payout: valuation.value,
            cost: valuation.cost,
            minted,
            burned,
            closed,
        })
    }

    // 8.4.4: value above the locked cost is minted into custody, value below it is burned out
    // of custody, then `payout` goes to `recipient`. a failed payout reverses the mint or burn.
    // brrrrd only moves once every ledger call went through.
    pub(super) fn settle_and_pay(
        &self,
        market: &mut MarketState,
        valuation: &Valuation,
        recipient: AccountId,
        payout: Quote,
    ) -> Result<(Quote, Quote), ManagerError> {
        let minted = valuation.value.saturating_sub(valuation.cost);
        let burned = valuation.cost.saturating_sub(valuation.value);

        // at most one of the two is non-zero, the other call is a no-op
        self.ledger.mint(minted)?;
        self.ledger.burn(burned)?;

        if let Err(err) = self.ledger.payout(recipient, payout) {
            let reversed = self.ledger.burn(minted).and_then(|_| self.ledger.mint(burned));
            if let Err(reverse_err) = reversed {
                error!(
                    market = ?market.id,
                    %minted,
                    %burned,
                    error = %reverse_err,
                    "failed to reverse settlement after payout error"
                );
            }
            return Err(err.into());
        }

        if !minted.is_zero() {
            market.funding.record_mint(minted);
        }
        if !burned.is_zero() {
            market.funding.record_burn(burned);
        }
        Ok((minted, burned))
    }
}

/// Values `shares` of `position` against the market's current totals and price frame.
pub(super) fn value_shares(
    market: &MarketState,
    position: &Position,
    shares: Decimal,
) -> Result<Valuation, ManagerError> {
    let notional = market.oi.claim(position.side, position.bucket(), shares);
    let frame = price_frame(
        market.feed.as_ref(),
        position.entry_price_index,
        market.params.price_frame_cap,
    )
    .ok_or(ManagerError::PriceUnavailable {
        market: market.id,
        index: position.entry_price_index,
    })?;
    Ok(value_position(position, shares, notional, frame))
}

#[cfg(test)]
mod tests {
    use crate::engine::test_support::{fixture, price, CUSTODY, MARKET, OTHER, TRADER};
    use crate::engine::ManagerError;
    use crate::token::LedgerError;
    use crate::types::{PositionId, Quote, Side};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    #[test]
    fn unwind_on_empty_registry_fails() {
        let f = fixture();
        let err = f.manager.unwind(TRADER, PositionId(1), dec!(1)).unwrap_err();
        assert!(matches!(err, ManagerError::InsufficientShares { .. }));
    }

    #[test]
    fn zero_shares_rejected() {
        let f = fixture();
        let built = f.manager.build(MARKET, TRADER, Quote::new(dec!(1)), 1, Side::Long).unwrap();
        let err = f.manager.unwind(TRADER, built.position_id, Decimal::ZERO).unwrap_err();
        assert!(matches!(err, ManagerError::InsufficientShares { .. }));
    }

    #[test]
    fn other_owner_cannot_unwind() {
        let f = fixture();
        let built = f.manager.build(MARKET, TRADER, Quote::new(dec!(1)), 1, Side::Long).unwrap();
        let err = f.manager.unwind(OTHER, built.position_id, dec!(0.1)).unwrap_err();
        assert!(matches!(
            err,
            ManagerError::InsufficientShares { available, .. } if available.is_zero()
        ));
    }

    #[test]
    fn flat_unwind_in_window_returns_cost() {
        let f = fixture();
        let built = f.manager.build(MARKET, TRADER, Quote::new(dec!(10)), 2, Side::Long).unwrap();
        let before = f.token.balance_of(TRADER);

        let result = f
            .manager
            .unwind(TRADER, built.position_id, built.oi_adjusted)
            .unwrap();

        assert_eq!(result.frame, Decimal::ONE);
        assert_eq!(result.payout, built.collateral);
        assert!(result.minted.is_zero() && result.burned.is_zero());
        assert!(result.closed);
        assert_eq!(f.token.balance_of(TRADER).saturating_sub(before), built.collateral);

        let snap = f.manager.market_oi(MARKET).unwrap();
        assert!(snap.queued_oi(Side::Long).is_zero());
        assert!(snap.oi(Side::Long).is_zero());
    }

    #[test]
    fn profitable_long_mints_difference() {
        let f = fixture();
        let built = f.manager.build(MARKET, TRADER, Quote::new(dec!(10)), 2, Side::Long).unwrap();
        f.feed.push(price(dec!(100)));
        f.feed.push(price(dec!(110)));

        let supply = f.token.total_supply();
        let result = f
            .manager
            .unwind(TRADER, built.position_id, built.oi_adjusted)
            .unwrap();

        // notional 19.94 * 1.1 - debt 9.97
        assert_eq!(result.payout.value(), dec!(11.964));
        assert_eq!(result.minted.value(), dec!(1.994));
        assert_eq!(f.token.total_supply().value() - supply.value(), dec!(1.994));
        assert_eq!(f.manager.funding_accumulator(), dec!(1.994));
    }

    #[test]
    fn losing_short_burns_difference() {
        let f = fixture();
        let built = f.manager.build(MARKET, TRADER, Quote::new(dec!(10)), 2, Side::Short).unwrap();
        f.feed.push(price(dec!(100)));
        f.feed.push(price(dec!(105)));

        let result = f
            .manager
            .unwind(TRADER, built.position_id, built.oi_adjusted)
            .unwrap();

        // 2 * 19.94 - (9.97 + 19.94 * 1.05)
        assert_eq!(result.payout.value(), dec!(8.973));
        assert_eq!(result.burned.value(), dec!(0.997));
        assert_eq!(f.manager.funding_accumulator(), dec!(-0.997));
    }

    #[test]
    fn partial_unwind_takes_proportional_slice() {
        let f = fixture();
        let built = f.manager.build(MARKET, TRADER, Quote::new(dec!(10)), 2, Side::Long).unwrap();
        let half = built.oi_adjusted / dec!(2);

        let result = f.manager.unwind(TRADER, built.position_id, half).unwrap();
        assert!(!result.closed);
        assert_eq!(result.cost.value(), dec!(4.985));

        let position = f.manager.position_info(built.position_id).unwrap();
        assert_eq!(position.oi_shares, half);
        assert_eq!(position.cost.value(), dec!(4.985));
        assert_eq!(f.manager.shares_of(TRADER, built.position_id), half);
    }

    #[test]
    fn terminal_position_cannot_unwind_again() {
        let f = fixture();
        let built = f.manager.build(MARKET, TRADER, Quote::new(dec!(1)), 1, Side::Long).unwrap();
        f.manager.unwind(TRADER, built.position_id, built.oi_adjusted).unwrap();

        let position = f.manager.position_info(built.position_id).unwrap();
        assert!(position.oi_shares.is_zero());

        let err = f.manager.unwind(TRADER, built.position_id, dec!(0.1)).unwrap_err();
        assert!(matches!(err, ManagerError::InsufficientShares { .. }));
    }

    #[test]
    fn queued_and_settled_buckets_unwind_independently() {
        let f = fixture();
        let settled = f.manager.build(MARKET, TRADER, Quote::new(dec!(10)), 2, Side::Long).unwrap();
        f.clock.advance_secs(100);
        f.manager.update(MARKET).unwrap();
        let queued = f.manager.build(MARKET, TRADER, Quote::new(dec!(10)), 2, Side::Long).unwrap();

        let snap = f.manager.market_oi(MARKET).unwrap();
        assert_eq!(snap.oi(Side::Long), dec!(19.94));
        assert_eq!(snap.queued_oi(Side::Long), dec!(19.94));

        // half of the settled position leaves the queued bucket alone
        let result = f.manager.unwind(TRADER, settled.position_id, dec!(9.97)).unwrap();
        assert_eq!(result.notional, dec!(9.97));
        assert_eq!(result.payout.value(), dec!(4.985));
        let snap = f.manager.market_oi(MARKET).unwrap();
        assert_eq!(snap.oi(Side::Long), dec!(9.97));
        assert_eq!(snap.oi_shares(Side::Long), dec!(9.97));
        assert_eq!(snap.queued_oi(Side::Long), dec!(19.94));

        // the queued position leaves the settled bucket alone
        let result = f
            .manager
            .unwind(TRADER, queued.position_id, queued.oi_adjusted)
            .unwrap();
        assert!(result.closed);
        let snap = f.manager.market_oi(MARKET).unwrap();
        assert_eq!(snap.oi(Side::Long), dec!(9.97));
        assert_eq!(snap.oi_shares(Side::Long), dec!(9.97));
        assert!(snap.queued_oi(Side::Long).is_zero());
    }

    #[test]
    fn failed_payout_leaves_supply_and_brrrrd_untouched() {
        let f = fixture();
        assert_eq!(f.manager.custody_account(), CUSTODY);
        let built = f.manager.build(MARKET, TRADER, Quote::new(dec!(10)), 2, Side::Long).unwrap();
        f.feed.push(price(dec!(100)));
        f.feed.push(price(dec!(150)));

        // custody can no longer cover a 19.94 payout after minting 9.97
        f.token.transfer(CUSTODY, OTHER, Quote::new(dec!(10))).unwrap();
        let supply = f.token.total_supply();
        let events = f.manager.events().len();

        let err = f
            .manager
            .unwind(TRADER, built.position_id, built.oi_adjusted)
            .unwrap_err();
        assert!(matches!(
            err,
            ManagerError::Ledger(LedgerError::InsufficientBalance { .. })
        ));

        assert_eq!(f.token.total_supply(), supply);
        assert!(f.custody.held().is_zero());
        assert!(f.manager.funding_accumulator().is_zero());
        assert_eq!(f.manager.shares_of(TRADER, built.position_id), dec!(19.94));
        assert_eq!(
            f.manager.market_oi(MARKET).unwrap().queued_oi(Side::Long),
            dec!(19.94)
        );
        assert_eq!(f.manager.events().len(), events);
    }
}
