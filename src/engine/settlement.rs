//! Update and compounding folds.
//!
//! Nothing runs in the background. Every mutating call, and the explicit `update`, first folds
//! whatever windows have elapsed on its market: compounding funding on the settled buckets, then
//! queued notional into settled shares, rescaling the positions that were waiting in the queue.

use super::core::CollateralManager;
use super::results::ManagerError;
use crate::events::{CompoundEvent, EventPayload, UpdateEvent};
use crate::market::MarketState;
use crate::open_interest::FoldReport;
use crate::types::{MarketId, Side, Timestamp};
use rust_decimal::Decimal;
use tracing::{debug, info};

impl CollateralManager {
    /// Folds any due windows on `market_id` and reports what moved.
    pub fn update(&self, market_id: MarketId) -> Result<FoldReport, ManagerError> {
        let now = self.now();
        let mut market = self.lock_market(market_id)?;
        Ok(self.settle_if_due(&mut market, now))
    }

    /// Runs `update` on every market.
    pub fn update_all(&self) -> Vec<(MarketId, FoldReport)> {
        let now = self.now();
        self.market_ids()
            .into_iter()
            .filter_map(|id| {
                let mut market = self.lock_market(id).ok()?;
                Some((id, self.settle_if_due(&mut market, now)))
            })
            .collect()
    }

    // caller holds the market lock. takes the registry lock only when queued positions move.
    pub(super) fn settle_if_due(&self, market: &mut MarketState, now: Timestamp) -> FoldReport {
        let report = market.fold_if_due(now);
        if report.is_empty() {
            return report;
        }

        if let Some(funding) = &report.compounding {
            info!(
                market = ?market.id,
                epochs = funding.epochs,
                payer = ?funding.payer,
                paid = %funding.paid,
                burned = %funding.burned,
                "compounding fold"
            );
            self.emit_event(
                now,
                EventPayload::Compound(CompoundEvent {
                    market_id: market.id,
                    epochs: funding.epochs,
                    payer: funding.payer,
                    paid: funding.paid,
                    burned: funding.burned,
                    oi_long: funding.oi_long,
                    oi_short: funding.oi_short,
                }),
            );
        }

        if report.update_windows > 0 {
            let mut converted = 0;
            {
                let mut registry = self.registry.write();
                for side in [Side::Long, Side::Short] {
                    let ids = market.take_queued(side);
                    let minted = report
                        .folded(side)
                        .map(|fold| fold.shares_minted)
                        .unwrap_or(Decimal::ZERO);
                    converted += registry.convert_queued(&ids, minted);
                }
            }

            let (queued_long, minted_long) = report
                .long
                .map(|f| (f.notional, f.shares_minted))
                .unwrap_or_default();
            let (queued_short, minted_short) = report
                .short
                .map(|f| (f.notional, f.shares_minted))
                .unwrap_or_default();

            if converted > 0 || report.long.is_some() || report.short.is_some() {
                info!(
                    market = ?market.id,
                    %queued_long,
                    %queued_short,
                    positions = converted,
                    "update fold"
                );
                self.emit_event(
                    now,
                    EventPayload::Update(UpdateEvent {
                        market_id: market.id,
                        queued_long,
                        queued_short,
                        shares_minted_long: minted_long,
                        shares_minted_short: minted_short,
                        positions_converted: converted,
                    }),
                );
            } else {
                debug!(market = ?market.id, windows = report.update_windows, "empty update window");
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use crate::config::MarketParams;
    use crate::engine::test_support::{fixture, fixture_with, MARKET, TRADER};
    use crate::engine::ManagerError;
    use crate::events::EventPayload;
    use crate::types::{MarketId, Quote, Side};
    use rust_decimal_macros::dec;

    #[test]
    fn update_inside_window_is_a_no_op() {
        let f = fixture();
        f.manager.build(MARKET, TRADER, Quote::new(dec!(10)), 2, Side::Long).unwrap();
        f.clock.advance_secs(99);

        let report = f.manager.update(MARKET).unwrap();
        assert!(report.is_empty());
        assert_eq!(f.manager.market_oi(MARKET).unwrap().queued_oi(Side::Long), dec!(19.94));
    }

    #[test]
    fn update_settles_queued_positions() {
        let f = fixture();
        let built = f.manager.build(MARKET, TRADER, Quote::new(dec!(10)), 2, Side::Long).unwrap();
        f.clock.advance_secs(100);

        let report = f.manager.update(MARKET).unwrap();
        assert_eq!(report.long.unwrap().shares_minted, dec!(19.94));

        let snap = f.manager.market_oi(MARKET).unwrap();
        assert_eq!(snap.oi(Side::Long), dec!(19.94));
        assert_eq!(snap.oi_shares(Side::Long), dec!(19.94));
        assert!(snap.queued_oi(Side::Long).is_zero());

        let position = f.manager.position_info(built.position_id).unwrap();
        assert!(!position.queued);
        assert!(f
            .manager
            .events()
            .iter()
            .any(|e| matches!(e.payload, EventPayload::Update(ref u) if u.positions_converted == 1)));
    }

    #[test]
    fn funding_applies_before_queued_fold() {
        let f = fixture_with(MarketParams {
            k: dec!(0.1),
            ..MarketParams::without_funding()
        });
        let first = f.manager.build(MARKET, TRADER, Quote::new(dec!(10)), 2, Side::Long).unwrap();
        f.clock.advance_secs(100);
        f.manager.update(MARKET).unwrap();

        let second = f.manager.build(MARKET, TRADER, Quote::new(dec!(10)), 2, Side::Long).unwrap();
        f.clock.advance_secs(500);
        let report = f.manager.update(MARKET).unwrap();

        // one-sided book burns 20% of settled oi, then the new notional joins at 0.8 per share
        let funding = report.compounding.unwrap();
        assert_eq!(funding.burned, dec!(3.988));
        assert_eq!(report.long.unwrap().shares_minted, dec!(24.925));

        let snap = f.manager.market_oi(MARKET).unwrap();
        assert_eq!(snap.oi(Side::Long), dec!(35.892));
        assert_eq!(snap.oi_shares(Side::Long), dec!(44.865));
        assert_eq!(
            f.manager.position_info(second.position_id).unwrap().oi_shares,
            dec!(24.925)
        );

        let result = f.manager.unwind(TRADER, first.position_id, dec!(19.94)).unwrap();
        assert_eq!(result.notional, dec!(15.952));
        assert_eq!(result.payout.value(), dec!(5.982));
        assert_eq!(result.burned.value(), dec!(3.988));
    }

    #[test]
    fn update_all_reports_every_market() {
        let f = fixture();
        f.clock.advance_secs(100);
        let reports = f.manager.update_all();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].0, MARKET);
    }

    #[test]
    fn update_unknown_market() {
        let f = fixture();
        let err = f.manager.update(MarketId(42)).unwrap_err();
        assert!(matches!(err, ManagerError::MarketNotFound(MarketId(42))));
    }
}
