// shared fixture for the engine's unit tests

use super::{CollateralManager, ManagerConfig};
use crate::clock::ManualClock;
use crate::config::MarketParams;
use crate::custody::TokenCustody;
use crate::price_feed::PricePointFeed;
use crate::token::{Role, Token};
use crate::types::{AccountId, MarketId, Price, Quote, Timestamp};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

pub const MARKET: MarketId = MarketId(1);
pub const CUSTODY: AccountId = AccountId(0);
pub const TRADER: AccountId = AccountId(1);
pub const OTHER: AccountId = AccountId(2);
pub const ADMIN: AccountId = AccountId(1000);

pub struct Fixture {
    pub manager: CollateralManager,
    pub token: Arc<Token>,
    pub custody: Arc<TokenCustody>,
    pub feed: Arc<PricePointFeed>,
    pub clock: Arc<ManualClock>,
}

pub fn price(value: Decimal) -> Price {
    Price::new(value).unwrap()
}

pub fn fixture() -> Fixture {
    fixture_with(MarketParams::without_funding())
}

pub fn fixture_with(params: MarketParams) -> Fixture {
    let token = Arc::new(Token::new("OVL", ADMIN));
    token.grant_role(ADMIN, Role::Minter, ADMIN).unwrap();
    token.grant_role(ADMIN, Role::Minter, CUSTODY).unwrap();
    token.grant_role(ADMIN, Role::Burner, CUSTODY).unwrap();
    token.mint(ADMIN, TRADER, Quote::new(dec!(1_000_000))).unwrap();

    let custody = Arc::new(TokenCustody::new(token.clone(), CUSTODY));
    let feed = Arc::new(PricePointFeed::with_points([price(dec!(100))]));
    let clock = Arc::new(ManualClock::new(Timestamp::from_millis(0)));

    let mut manager = CollateralManager::new(ManagerConfig::default(), custody.clone(), clock.clone()).unwrap();
    manager.add_market(MARKET, "WETH/DAI", params, feed.clone()).unwrap();

    Fixture {
        manager,
        token,
        custody,
        feed,
        clock,
    }
}
