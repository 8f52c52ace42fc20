//! Solvency tests
//!
//! Every token the engine mints or burns shows up in brrrrd, and custody always holds exactly
//! the fees, the liquidation pots and the cost still locked in live positions.

use ovl_collateral::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

const MARKET: MarketId = MarketId(1);
const ADMIN: AccountId = AccountId(1_000);
const CUSTODY: AccountId = AccountId(0);
const KEEPER: AccountId = AccountId(99);

struct Setup {
    manager: CollateralManager,
    token: Arc<Token>,
    feed: Arc<PricePointFeed>,
    clock: Arc<ManualClock>,
}

fn setup(params: MarketParams, traders: &[AccountId]) -> Setup {
    let token = Arc::new(Token::new("OVL", ADMIN));
    token.grant_role(ADMIN, Role::Minter, ADMIN).unwrap();
    token.grant_role(ADMIN, Role::Minter, CUSTODY).unwrap();
    token.grant_role(ADMIN, Role::Burner, CUSTODY).unwrap();
    for trader in traders {
        token.mint(ADMIN, *trader, Quote::new(dec!(100_000))).unwrap();
    }

    let custody = Arc::new(TokenCustody::new(token.clone(), CUSTODY));
    let clock = Arc::new(ManualClock::new(Timestamp::from_millis(0)));
    let feed = Arc::new(PricePointFeed::with_points([Price::new_unchecked(dec!(2000))]));

    let mut manager = CollateralManager::new(ManagerConfig::default(), custody, clock.clone()).unwrap();
    manager.add_market(MARKET, "WETH/DAI", params, feed.clone()).unwrap();
    Setup {
        manager,
        token,
        feed,
        clock,
    }
}

impl Setup {
    fn tick(&self, price: Decimal) {
        self.clock.advance_secs(100);
        self.feed.push(Price::new_unchecked(price));
        self.manager.update(MARKET).unwrap();
    }

    fn locked_cost(&self, ids: &[PositionId]) -> Decimal {
        ids.iter()
            .filter_map(|id| self.manager.position_info(*id))
            .map(|p| p.cost.value())
            .sum()
    }

    fn assert_custody_balanced(&self, ids: &[PositionId]) {
        let expected = self.manager.fee_bucket().value()
            + self.manager.liquidation_pot().value()
            + self.locked_cost(ids);
        assert_eq!(self.token.balance_of(CUSTODY).value(), expected);
    }
}

/// Supply change always equals the accumulator.
mod accumulator_tests {
    use super::*;

    #[test]
    fn supply_delta_matches_brrrrd() {
        let traders: Vec<AccountId> = (1..=6).map(AccountId).collect();
        let s = setup(MarketParams::weth_dai(), &traders);
        let supply_before = s.token.total_supply().value();

        let mut ids = Vec::new();
        for (i, trader) in traders.iter().enumerate() {
            let side = Side::from_is_long(i % 2 == 0);
            let leverage = (i as u8 + 1) * 2;
            let built = s
                .manager
                .build(MARKET, *trader, Quote::new(dec!(500)), leverage, side)
                .unwrap();
            ids.push((*trader, built.position_id));
        }

        for price in [dec!(2010), dec!(2040), dec!(1990), dec!(2100), dec!(2075)] {
            s.tick(price);
        }

        for (trader, id) in &ids {
            let shares = s.manager.shares_of(*trader, *id);
            s.manager.unwind(*trader, *id, shares).unwrap();
        }

        let supply_after = s.token.total_supply().value();
        assert_eq!(supply_after - supply_before, s.manager.funding_accumulator());
        assert_ne!(s.manager.funding_accumulator(), Decimal::ZERO);
    }

    #[test]
    fn accumulator_sign_follows_payout() {
        let s = setup(MarketParams::without_funding(), &[AccountId(1), AccountId(2)]);
        let long = s.manager.build(MARKET, AccountId(1), Quote::new(dec!(100)), 3, Side::Long).unwrap();
        let short = s.manager.build(MARKET, AccountId(2), Quote::new(dec!(100)), 3, Side::Short).unwrap();
        s.tick(dec!(2000));
        s.tick(dec!(2200));

        let before = s.manager.funding_accumulator();
        let won = s.manager.unwind(AccountId(1), long.position_id, s.manager.shares_of(AccountId(1), long.position_id)).unwrap();
        assert!(won.payout > won.cost);
        assert_eq!(s.manager.funding_accumulator() - before, won.minted.value());

        let before = s.manager.funding_accumulator();
        let lost = s.manager.unwind(AccountId(2), short.position_id, s.manager.shares_of(AccountId(2), short.position_id)).unwrap();
        assert!(lost.payout < lost.cost);
        assert_eq!(before - s.manager.funding_accumulator(), lost.burned.value());
    }
}

/// Custody holds exactly what the books say it should.
mod custody_tests {
    use super::*;

    #[test]
    fn custody_covers_fees_pots_and_locked_cost() {
        let traders: Vec<AccountId> = (1..=4).map(AccountId).collect();
        let s = setup(MarketParams::weth_dai(), &traders);

        let mut ids = Vec::new();
        for trader in &traders {
            let built = s
                .manager
                .build(MARKET, *trader, Quote::new(dec!(250)), 10, Side::Long)
                .unwrap();
            ids.push(built.position_id);
        }
        s.assert_custody_balanced(&ids);

        s.tick(dec!(2000));
        s.tick(dec!(2030));

        // partial unwind of the first
        let half = s.manager.shares_of(traders[0], ids[0]) / dec!(2);
        s.manager.unwind(traders[0], ids[0], half).unwrap();
        s.assert_custody_balanced(&ids);

        // crash until the rest are liquidatable
        s.tick(dec!(1700));
        for id in &ids[1..] {
            assert!(s.manager.is_liquidatable(*id).unwrap());
            s.manager.liquidate(*id, KEEPER).unwrap();
            s.assert_custody_balanced(&ids);
        }

        let shares = s.manager.shares_of(traders[0], ids[0]);
        s.manager.unwind(traders[0], ids[0], shares).unwrap();
        s.assert_custody_balanced(&ids);

        let snap = s.manager.market_oi(MARKET).unwrap();
        assert!(snap.oi(Side::Long).is_zero());
        assert!(snap.oi_shares(Side::Long).is_zero());
        assert!(s.token.balance_of(KEEPER) > Quote::zero());
    }

    #[test]
    fn token_balances_sum_to_supply() {
        let traders: Vec<AccountId> = (1..=3).map(AccountId).collect();
        let s = setup(MarketParams::weth_dai(), &traders);
        for (i, trader) in traders.iter().enumerate() {
            let built = s
                .manager
                .build(MARKET, *trader, Quote::new(dec!(40)), 5, Side::from_is_long(i != 1))
                .unwrap();
            s.tick(dec!(2000) + Decimal::from(i as u32 * 25));
            let shares = s.manager.shares_of(*trader, built.position_id);
            s.manager.unwind(*trader, built.position_id, shares).unwrap();
        }
        assert_eq!(s.token.balances_total(), s.token.total_supply().value());
    }
}

/// Token role and transfer-burn semantics.
mod token_tests {
    use super::*;

    #[test]
    fn only_minter_can_mint() {
        let token = Token::new("OVL", ADMIN);
        let err = token.mint(AccountId(5), AccountId(5), Quote::new(dec!(1))).unwrap_err();
        assert_eq!(err, LedgerError::OnlyMinter);
        assert_eq!(err.to_string(), "only minter");
    }

    #[test]
    fn only_burner_can_burn() {
        let token = Token::new("OVL", ADMIN);
        token.grant_role(ADMIN, Role::Minter, ADMIN).unwrap();
        token.mint(ADMIN, AccountId(5), Quote::new(dec!(1))).unwrap();
        let err = token.burn(AccountId(5), AccountId(5), Quote::new(dec!(1))).unwrap_err();
        assert_eq!(err.to_string(), "only burner");
    }

    #[test]
    fn transfer_burn_moves_and_destroys() {
        let token = Token::new("OVL", ADMIN);
        let sender = AccountId(5);
        let receiver = AccountId(6);
        token.grant_role(ADMIN, Role::Minter, ADMIN).unwrap();
        token.grant_role(ADMIN, Role::Burner, sender).unwrap();
        token.mint(ADMIN, sender, Quote::new(dec!(100))).unwrap();

        token
            .transfer_burn(sender, receiver, Quote::new(dec!(30)), Quote::new(dec!(20)))
            .unwrap();

        assert_eq!(token.balance_of(sender).value(), dec!(50));
        assert_eq!(token.balance_of(receiver).value(), dec!(30));
        assert_eq!(token.total_supply().value(), dec!(80));
    }
}
